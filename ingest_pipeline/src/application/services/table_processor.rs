// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Table Processor
//!
//! Plans and executes the chunk set for one (tenant, table) pair.
//!
//! ## Chunk Planning
//!
//! - Incremental endpoint with a date range (backfill, or full sync because
//!   no watermark exists or `force_full_sync` is set): the range is divided
//!   into fixed-width date chunks.
//! - Incremental endpoint on a routine run: one open-ended chunk from the
//!   stored watermark to now.
//! - Master data (no incremental field): one unbounded full-refresh chunk.
//!
//! ## Execution
//!
//! Chunks run with bounded concurrency (default 3; more risks breaching
//! per-service rate limits). Transient failures retry with exponential
//! backoff and full jitter up to the attempt cap, each retry resuming from
//! the journaled cursor so flushed files are never refetched. Permanent
//! failures mark the chunk failed with its error kind.
//!
//! ## Watermark Safety
//!
//! The watermark advances to the maximum end-watermark across chunks, and
//! only when every chunk completed. A timed-out or failed chunk leaves the
//! watermark untouched, so the next run re-attempts the range rather than
//! risking a gap.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use ingest_pipeline_domain::config::{EndpointConfig, ServiceBinding};
use ingest_pipeline_domain::entities::{
    ChunkBounds, ChunkProgress, ChunkRunOutcome, ProcessingJob, TableRunResult,
};
use ingest_pipeline_domain::repositories::{ChunkJournal, WatermarkRepository};
use ingest_pipeline_domain::value_objects::{TenantId, Watermark};
use ingest_pipeline_domain::IngestError;

use crate::application::services::chunk_processor::{ChunkProcessor, RunContext};
use crate::infrastructure::runtime::RetryPolicy;

/// Tunables for table execution.
#[derive(Debug, Clone, Copy)]
pub struct TableSettings {
    /// Chunks processed concurrently per table
    pub chunk_fanout: usize,
    /// Width of date-range chunks in days
    pub chunk_backfill_days: u32,
    /// Lower bound for full syncs with no stored watermark
    pub initial_lookback_days: i64,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            chunk_fanout: 3,
            chunk_backfill_days: 30,
            initial_lookback_days: 730,
        }
    }
}

/// Runs the chunk set of one (tenant, table).
pub struct TableProcessor {
    journal: Arc<dyn ChunkJournal>,
    watermarks: Arc<dyn WatermarkRepository>,
    chunks: Arc<ChunkProcessor>,
    retry: RetryPolicy,
    settings: TableSettings,
}

impl TableProcessor {
    pub fn new(
        journal: Arc<dyn ChunkJournal>,
        watermarks: Arc<dyn WatermarkRepository>,
        chunks: Arc<ChunkProcessor>,
        retry: RetryPolicy,
        settings: TableSettings,
    ) -> Self {
        Self {
            journal,
            watermarks,
            chunks,
            retry,
            settings,
        }
    }

    /// Plans, journals, and executes every chunk of the table, then advances
    /// the watermark if all of them completed.
    pub async fn process_table(
        &self,
        job: &ProcessingJob,
        tenant_id: &TenantId,
        binding: &ServiceBinding,
        endpoint: &EndpointConfig,
        ctx: &RunContext,
    ) -> Result<TableRunResult, IngestError> {
        let watermark = self
            .watermarks
            .get(tenant_id, &binding.service, &endpoint.table_name)
            .await?;

        let planned = self.plan_chunks(job, tenant_id, binding, endpoint, watermark);
        info!(
            tenant = %tenant_id,
            service = %binding.service,
            table = %endpoint.table_name,
            chunks = planned.len(),
            watermark = ?watermark.map(|w| w.to_rfc3339()),
            "table run planned"
        );
        for chunk in &planned {
            self.journal.put(chunk).await?;
        }

        let mut outcomes: Vec<ChunkRunOutcome> = stream::iter(planned)
            .map(|progress| self.run_chunk(progress, binding, endpoint, ctx))
            .buffer_unordered(self.settings.chunk_fanout)
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.chunk_id.cmp(&b.chunk_id));

        let all_completed = outcomes.iter().all(ChunkRunOutcome::completed);
        if all_completed {
            if let Some(max_end) = self.max_end_watermark(job, tenant_id, endpoint, &outcomes).await? {
                self.watermarks
                    .set(tenant_id, &binding.service, &endpoint.table_name, &max_end)
                    .await?;
                info!(
                    tenant = %tenant_id,
                    table = %endpoint.table_name,
                    watermark = %max_end,
                    "watermark advanced"
                );
            }
        } else {
            warn!(
                tenant = %tenant_id,
                table = %endpoint.table_name,
                "watermark held back; not every chunk completed"
            );
        }

        let records_processed = outcomes.iter().map(|o| o.records_processed).sum();
        let files_written = outcomes
            .iter()
            .filter(|o| o.completed())
            .flat_map(|o| o.files_written.iter().cloned())
            .collect();

        Ok(TableRunResult {
            service: binding.service.clone(),
            table_name: endpoint.table_name.clone(),
            chunks: outcomes,
            records_processed,
            files_written,
            error_kind: None,
        })
    }

    /// Pure chunk planning; unit-tested separately from execution.
    fn plan_chunks(
        &self,
        job: &ProcessingJob,
        tenant_id: &TenantId,
        binding: &ServiceBinding,
        endpoint: &EndpointConfig,
        watermark: Option<Watermark>,
    ) -> Vec<ChunkProgress> {
        let now = Utc::now();
        let new_chunk = |index: u32, bounds: ChunkBounds| {
            ChunkProgress::new(
                job.job_id,
                tenant_id.clone(),
                binding.service.clone(),
                endpoint.table_name.clone(),
                index,
                bounds,
            )
        };

        if !endpoint.is_incremental() {
            return vec![new_chunk(0, ChunkBounds::FullRefresh)];
        }

        if let Some(backfill) = &job.backfill {
            return Self::date_windows(backfill.start, backfill.end, backfill.chunk_days)
                .into_iter()
                .enumerate()
                .map(|(i, (start, end))| new_chunk(i as u32, ChunkBounds::DateRange { start, end }))
                .collect();
        }

        match watermark {
            Some(wm) if !job.force_full_sync => vec![new_chunk(
                0,
                ChunkBounds::Incremental {
                    start: wm,
                    end: Watermark::at(now),
                },
            )],
            _ => {
                // Full sync: no watermark to trust, or the run forces one
                let start = now - ChronoDuration::days(self.settings.initial_lookback_days);
                Self::date_windows(start, now, self.settings.chunk_backfill_days)
                    .into_iter()
                    .enumerate()
                    .map(|(i, (start, end))| {
                        new_chunk(i as u32, ChunkBounds::DateRange { start, end })
                    })
                    .collect()
            }
        }
    }

    fn date_windows(
        start: chrono::DateTime<Utc>,
        end: chrono::DateTime<Utc>,
        chunk_days: u32,
    ) -> Vec<(chrono::DateTime<Utc>, chrono::DateTime<Utc>)> {
        let width = ChronoDuration::days(chunk_days.max(1) as i64);
        let mut windows = Vec::new();
        let mut cursor = start;
        while cursor < end {
            let window_end = (cursor + width).min(end);
            windows.push((cursor, window_end));
            cursor = window_end;
        }
        windows
    }

    /// Runs one chunk to a terminal outcome, retrying transient failures.
    async fn run_chunk(
        &self,
        planned: ChunkProgress,
        binding: &ServiceBinding,
        endpoint: &EndpointConfig,
        ctx: &RunContext,
    ) -> ChunkRunOutcome {
        let job_id = planned.job_id;
        let chunk_id = planned.chunk_id.clone();
        let mut progress = planned;

        loop {
            match self.chunks.process(&mut progress, binding, endpoint, ctx).await {
                Ok(outcome) => return outcome,
                Err(error) => {
                    let attempts_used = progress.attempt;
                    if self.retry.allows_retry(&error, attempts_used) {
                        let delay = self.retry.backoff_delay(attempts_used, &error);
                        warn!(
                            chunk_id = %chunk_id,
                            attempt = attempts_used,
                            delay_secs = delay.as_secs(),
                            error = %error,
                            "transient chunk failure, backing off"
                        );
                        tokio::time::sleep(delay).await;
                        // Resume from the journaled state, not the in-memory
                        // one that ran ahead of the last durable flush
                        match self.journal.find(&job_id, &chunk_id).await {
                            Ok(Some(row)) => progress = row,
                            Ok(None) | Err(_) => {}
                        }
                        continue;
                    }

                    let kind = error.kind();
                    warn!(
                        chunk_id = %chunk_id,
                        attempt = attempts_used,
                        kind = kind.as_str(),
                        error = %error,
                        cursor = ?progress.cursor,
                        "chunk failed"
                    );
                    if progress.fail(kind).is_ok() {
                        if let Err(journal_error) = self.journal.put(&progress).await {
                            warn!(
                                chunk_id = %chunk_id,
                                error = %journal_error,
                                "failed to journal chunk failure"
                            );
                        }
                    }
                    return ChunkRunOutcome {
                        chunk_id: progress.chunk_id.clone(),
                        status: progress.status,
                        records_processed: progress.records_processed,
                        pages_fetched: progress.pages_fetched,
                        files_written: progress.files_written.clone(),
                        final_page: progress.cursor.as_ref().map(|c| c.last_page).unwrap_or(0),
                        final_offset: progress.cursor.as_ref().map(|c| c.last_offset).unwrap_or(0),
                        error_kind: Some(kind),
                    };
                }
            }
        }
    }

    /// Highest end-watermark across the table's chunks for this job.
    ///
    /// Reads the journal rather than trusting the in-memory outcomes so a
    /// resumed run sees chunks completed by earlier invocations too.
    async fn max_end_watermark(
        &self,
        job: &ProcessingJob,
        tenant_id: &TenantId,
        endpoint: &EndpointConfig,
        _outcomes: &[ChunkRunOutcome],
    ) -> Result<Option<Watermark>, IngestError> {
        let rows = self.journal.list_for_job(&job.job_id, None).await?;
        Ok(rows
            .iter()
            .filter(|r| &r.tenant_id == tenant_id && r.table_name == endpoint.table_name)
            .filter_map(|r| r.contributed_watermark())
            .max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_windows_cover_the_range_without_overlap() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        let windows = TableProcessor::date_windows(start, end, 30);

        assert_eq!(windows.first().unwrap().0, start);
        assert_eq!(windows.last().unwrap().1, end);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
        for (s, e) in &windows {
            assert!(s < e);
            assert!(*e - *s <= ChronoDuration::days(30));
        }
    }

    #[test]
    fn short_range_plans_a_single_window() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap();
        let windows = TableProcessor::date_windows(start, end, 30);
        assert_eq!(windows, vec![(start, end)]);
    }

    proptest::proptest! {
        #[test]
        fn windows_partition_any_range(
            start_offset_days in 0i64..3650,
            range_days in 1i64..1200,
            chunk_days in 1u32..120,
        ) {
            let start = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap()
                + ChronoDuration::days(start_offset_days);
            let end = start + ChronoDuration::days(range_days);
            let windows = TableProcessor::date_windows(start, end, chunk_days);

            proptest::prop_assert!(!windows.is_empty());
            proptest::prop_assert_eq!(windows.first().unwrap().0, start);
            proptest::prop_assert_eq!(windows.last().unwrap().1, end);
            for pair in windows.windows(2) {
                proptest::prop_assert_eq!(pair[0].1, pair[1].0);
            }
            for (s, e) in &windows {
                proptest::prop_assert!(s < e);
                proptest::prop_assert!(*e - *s <= ChronoDuration::days(chunk_days as i64));
            }
        }
    }
}
