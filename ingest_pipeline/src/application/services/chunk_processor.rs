// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Processor
//!
//! Fetches one bounded slice of one table for one tenant from the source API
//! and writes raw Parquet objects. This is the hot path and the most
//! failure-prone component of the pipeline.
//!
//! ## Algorithm
//!
//! 1. Resolve credentials once; they are cached for the lifetime of this
//!    chunk and never shared across chunks.
//! 2. Page loop, strictly sequential (pagination forbids parallelism within
//!    a chunk): fetch one page in `ordering_field` order with the bounds'
//!    range filter applied, buffer the records, and flush the buffer to a
//!    snappy-compressed Parquet object when it crosses the record or byte
//!    threshold. A syntactically empty page is the one and only end-of-data
//!    signal; short pages keep the loop going.
//! 3. On the empty-page signal, flush the residual batch and complete.
//!
//! ## Suspension
//!
//! The deadline and the cancellation token are consulted at the top of every
//! page iteration (the suspension points). When the remaining budget falls
//! inside the safety margin, the residual batch is flushed, the resumption
//! cursor is journaled, and the chunk returns `timed_out`; the continuation
//! re-enters from `last_page + 1`. The chunk never aborts mid-write.
//!
//! ## Durability Ordering
//!
//! The journal row is written after each object-store flush, never before:
//! object writes are the non-idempotent side effect, so the journal may
//! under-report progress after a crash but never claims files that do not
//! exist. The cursor only ever points at fully flushed pages, which is what
//! makes resumption safe.
//!
//! This component never triggers downstream canonical transforms; that is
//! the tenant processor's job, after every chunk of the table has settled.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use ingest_pipeline_bootstrap::CancellationToken;
use ingest_pipeline_domain::config::{EndpointConfig, ServiceBinding};
use ingest_pipeline_domain::entities::{ChunkProgress, ChunkRunOutcome, ChunkStatus, ResumptionCursor};
use ingest_pipeline_domain::repositories::ChunkJournal;
use ingest_pipeline_domain::services::{
    BlobStore, PageFetcher, PageQuery, RecordCodec, SecretsProvider, SourceCredentials,
};
use ingest_pipeline_domain::value_objects::{RawObjectKey, Watermark};
use ingest_pipeline_domain::IngestError;

use crate::infrastructure::metrics::MetricsService;
use crate::infrastructure::runtime::Deadline;

/// Tunables for chunk execution.
#[derive(Debug, Clone, Copy)]
pub struct ChunkSettings {
    /// Flush the raw batch at this record count
    pub batch_flush_records: usize,
    /// Flush the raw batch at this uncompressed size
    pub batch_flush_bytes: usize,
    /// Fail the chunk once skipped records exceed this share
    pub data_format_skip_quota: f64,
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            batch_flush_records: 5_000,
            batch_flush_bytes: 50 * 1024 * 1024,
            data_format_skip_quota: 0.05,
        }
    }
}

/// Per-invocation inputs shared down the processing hierarchy.
#[derive(Clone)]
pub struct RunContext {
    pub deadline: Deadline,
    pub cancel: CancellationToken,
    /// Request-level page-size override (`chunk_size_override`)
    pub page_size_override: Option<u32>,
}

/// Executes one chunk attempt against the source API.
pub struct ChunkProcessor {
    fetcher: Arc<dyn PageFetcher>,
    secrets: Arc<dyn SecretsProvider>,
    blobs: Arc<dyn BlobStore>,
    codec: Arc<dyn RecordCodec>,
    journal: Arc<dyn ChunkJournal>,
    metrics: MetricsService,
    settings: ChunkSettings,
}

impl ChunkProcessor {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        secrets: Arc<dyn SecretsProvider>,
        blobs: Arc<dyn BlobStore>,
        codec: Arc<dyn RecordCodec>,
        journal: Arc<dyn ChunkJournal>,
        metrics: MetricsService,
        settings: ChunkSettings,
    ) -> Self {
        Self {
            fetcher,
            secrets,
            blobs,
            codec,
            journal,
            metrics,
            settings,
        }
    }

    /// Runs one attempt of `progress`, mutating and journaling it.
    ///
    /// Returns `Ok` with a `completed` or `timed_out` outcome; `Err` means
    /// the attempt failed and the caller decides between retry and marking
    /// the chunk failed. The journal is consistent either way.
    pub async fn process(
        &self,
        progress: &mut ChunkProgress,
        binding: &ServiceBinding,
        endpoint: &EndpointConfig,
        ctx: &RunContext,
    ) -> Result<ChunkRunOutcome, IngestError> {
        progress.begin_attempt()?;
        self.journal.put(progress).await?;
        self.metrics.chunk_started();

        let result = self.run_attempt(progress, binding, endpoint, ctx).await;
        match &result {
            Ok(outcome) if outcome.status == ChunkStatus::Completed => {
                self.metrics.chunk_completed();
            }
            Ok(_) => self.metrics.chunk_suspended(),
            Err(e) => self.metrics.chunk_failed(e.kind().as_str()),
        }
        result
    }

    async fn run_attempt(
        &self,
        progress: &mut ChunkProgress,
        binding: &ServiceBinding,
        endpoint: &EndpointConfig,
        ctx: &RunContext,
    ) -> Result<ChunkRunOutcome, IngestError> {
        // Credentials are scoped to this chunk's lifetime
        let credentials: SourceCredentials =
            self.secrets.fetch(&binding.credentials_secret_ref).await?;

        let page_size = endpoint
            .pagination
            .effective_page_size(ctx.page_size_override.or(binding.page_size_override()));
        let rate_limit = binding
            .rate_limit_override()
            .unwrap_or(endpoint.rate_limit_per_minute);

        // Resume from the journaled cursor when the prior attempt suspended
        let (start_page, start_offset) = match &progress.cursor {
            Some(cursor) => (cursor.last_page + 1, cursor.last_offset),
            None => (1, 0),
        };
        let mut query = PageQuery {
            endpoint_path: endpoint.path.clone(),
            strategy: endpoint.pagination.strategy,
            page: start_page,
            offset: start_offset,
            page_size,
            ordering_field: endpoint.ordering_field.clone(),
            incremental_field: endpoint.incremental_field.clone(),
            range: progress.bounds.range(),
            rate_limit_per_minute: rate_limit,
        };

        debug!(
            chunk_id = %progress.chunk_id,
            tenant = %progress.tenant_id,
            table = %progress.table_name,
            attempt = progress.attempt,
            start_page,
            "chunk attempt starting"
        );

        let mut batch: Vec<Map<String, Value>> = Vec::new();
        let mut batch_bytes: usize = 0;
        // In-chunk sequence continues across attempts so keys stay unique
        let mut sequence = progress.files_written.len() as u32;
        let mut fetched: u64 = 0;
        let mut skipped: u64 = 0;

        loop {
            if ctx.cancel.is_cancelled() || ctx.deadline.margin_reached() {
                return self
                    .suspend(progress, &mut batch, &mut batch_bytes, &mut sequence)
                    .await;
            }

            let page = self
                .fetcher
                .fetch_page(&binding.service, &credentials, &query)
                .await?;
            self.metrics.page_fetched(
                page.records.len() as u64,
                page.malformed,
                Duration::from_millis(page.latency_ms).as_secs_f64(),
            );
            debug!(
                chunk_id = %progress.chunk_id,
                page = query.page,
                records = page.records.len(),
                latency_ms = page.latency_ms,
                body_bytes = page.body_bytes,
                cumulative = progress.records_processed,
                "page fetched"
            );

            if page.is_end_of_data() {
                break;
            }

            let returned = page.records.len() as u64;
            fetched += returned;
            skipped += page.malformed;
            if page.malformed > 0 {
                warn!(
                    chunk_id = %progress.chunk_id,
                    malformed = page.malformed,
                    "skipped malformed source records"
                );
            }
            let seen = fetched + skipped;
            if skipped > 0 && (skipped as f64) / (seen as f64) > self.settings.data_format_skip_quota {
                return Err(IngestError::data_format(format!(
                    "{} of {} records unparseable, above the skip quota",
                    skipped, seen
                )));
            }

            let observed_max = Self::max_incremental(&page.records, endpoint.incremental_field.as_deref());
            for record in &page.records {
                batch_bytes += serde_json::to_vec(record).map(|v| v.len()).unwrap_or(0);
            }
            batch.extend(page.records);
            progress.record_page(returned, query.page, query.offset + returned, observed_max)?;

            if batch.len() >= self.settings.batch_flush_records
                || batch_bytes >= self.settings.batch_flush_bytes
            {
                self.flush(progress, &mut batch, &mut batch_bytes, &mut sequence)
                    .await?;
            }

            query = query.advance(returned);
        }

        // Final flush after the empty-page signal
        self.flush(progress, &mut batch, &mut batch_bytes, &mut sequence)
            .await?;
        progress.complete()?;
        self.journal.put(progress).await?;

        info!(
            chunk_id = %progress.chunk_id,
            tenant = %progress.tenant_id,
            table = %progress.table_name,
            records = progress.records_processed,
            pages = progress.pages_fetched,
            files = progress.files_written.len(),
            "chunk completed"
        );
        Ok(Self::outcome(progress))
    }

    /// Serializes and writes the buffered batch, then journals progress.
    ///
    /// Journal-after-write: the object write is the non-idempotent effect.
    async fn flush(
        &self,
        progress: &mut ChunkProgress,
        batch: &mut Vec<Map<String, Value>>,
        batch_bytes: &mut usize,
        sequence: &mut u32,
    ) -> Result<(), IngestError> {
        if batch.is_empty() {
            return Ok(());
        }
        let key = RawObjectKey::build(
            &progress.tenant_id,
            &progress.service,
            &progress.table_name,
            Utc::now(),
            progress.attempt,
            *sequence,
        );
        let bytes = self.codec.encode_records(batch)?;
        let written = bytes.len() as u64;
        self.blobs.put(key.as_str(), bytes).await?;
        progress.append_file(key.as_str())?;
        self.journal.put(progress).await?;
        self.metrics.raw_file_written(written);
        debug!(
            chunk_id = %progress.chunk_id,
            key = %key,
            records = batch.len(),
            bytes = written,
            "raw batch flushed"
        );
        batch.clear();
        *batch_bytes = 0;
        *sequence += 1;
        Ok(())
    }

    /// Flushes the residual batch, journals the cursor, returns `timed_out`
    async fn suspend(
        &self,
        progress: &mut ChunkProgress,
        batch: &mut Vec<Map<String, Value>>,
        batch_bytes: &mut usize,
        sequence: &mut u32,
    ) -> Result<ChunkRunOutcome, IngestError> {
        self.flush(progress, batch, batch_bytes, sequence).await?;
        let cursor = progress.cursor.clone().unwrap_or(ResumptionCursor {
            last_page: 0,
            last_offset: 0,
            last_batch_key: None,
        });
        progress.suspend(cursor)?;
        self.journal.put(progress).await?;
        info!(
            chunk_id = %progress.chunk_id,
            tenant = %progress.tenant_id,
            table = %progress.table_name,
            last_page = progress.cursor.as_ref().map(|c| c.last_page).unwrap_or(0),
            files = progress.files_written.len(),
            "chunk suspended on execution budget"
        );
        Ok(Self::outcome(progress))
    }

    /// Highest parseable incremental-field value on the page
    fn max_incremental(
        records: &[Map<String, Value>],
        incremental_field: Option<&str>,
    ) -> Option<Watermark> {
        let field = incremental_field?;
        records
            .iter()
            .filter_map(|record| record.get(field))
            .filter_map(|value| value.as_str())
            .filter_map(|raw| Watermark::parse(raw).ok())
            .max()
    }

    fn outcome(progress: &ChunkProgress) -> ChunkRunOutcome {
        let (final_page, final_offset) = progress
            .cursor
            .as_ref()
            .map(|c| (c.last_page, c.last_offset))
            .unwrap_or((0, 0));
        ChunkRunOutcome {
            chunk_id: progress.chunk_id.clone(),
            status: progress.status,
            records_processed: progress.records_processed,
            pages_fetched: progress.pages_fetched,
            files_written: progress.files_written.clone(),
            final_page,
            final_offset,
            error_kind: progress.last_error_kind,
        }
    }
}
