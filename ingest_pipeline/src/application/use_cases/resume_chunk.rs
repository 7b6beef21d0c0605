// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Resume Chunk Use Case
//!
//! Continuation entry point for a chunk that suspended on its execution
//! budget. Idempotent: resuming a chunk that already completed returns its
//! journaled outcome without side effects; resuming a failed chunk is
//! rejected (failed is terminal for the run, the next pipeline run re-plans
//! the range).
//!
//! When the resumed chunk completes its table (every sibling chunk of the
//! same job is now `completed`), this use case performs the completion
//! duties the table processor would have: it advances the watermark and
//! triggers the canonical transform over the union of the table's raw
//! files. That keeps the at-most-once trigger guarantee, because the table
//! only reaches all-completed once per job.

use std::sync::Arc;

use tracing::{info, warn};

use ingest_pipeline_domain::entities::{ChunkProgress, ChunkRunOutcome, ChunkStatus};
use ingest_pipeline_domain::repositories::{
    ChunkJournal, JobRepository, TenantRepository, WatermarkRepository,
};
use ingest_pipeline_domain::services::MappingStore;
use ingest_pipeline_domain::value_objects::{ChunkId, JobId};
use ingest_pipeline_domain::IngestError;

use crate::application::services::canonical_transformer::CanonicalTransformer;
use crate::application::services::chunk_processor::{ChunkProcessor, RunContext};

pub struct ResumeChunkUseCase {
    journal: Arc<dyn ChunkJournal>,
    jobs: Arc<dyn JobRepository>,
    tenants: Arc<dyn TenantRepository>,
    catalogs: Arc<dyn MappingStore>,
    watermarks: Arc<dyn WatermarkRepository>,
    chunks: Arc<ChunkProcessor>,
    transformer: Arc<CanonicalTransformer>,
}

impl ResumeChunkUseCase {
    pub fn new(
        journal: Arc<dyn ChunkJournal>,
        jobs: Arc<dyn JobRepository>,
        tenants: Arc<dyn TenantRepository>,
        catalogs: Arc<dyn MappingStore>,
        watermarks: Arc<dyn WatermarkRepository>,
        chunks: Arc<ChunkProcessor>,
        transformer: Arc<CanonicalTransformer>,
    ) -> Self {
        Self {
            journal,
            jobs,
            tenants,
            catalogs,
            watermarks,
            chunks,
            transformer,
        }
    }

    pub async fn execute(
        &self,
        job_id: &JobId,
        chunk_id: &ChunkId,
        ctx: &RunContext,
    ) -> Result<ChunkRunOutcome, IngestError> {
        let mut progress = self
            .journal
            .find(job_id, chunk_id)
            .await?
            .ok_or_else(|| {
                IngestError::invalid_request(format!(
                    "no chunk '{}' journaled for job '{}'",
                    chunk_id, job_id
                ))
            })?;

        match progress.status {
            ChunkStatus::Completed => {
                info!(chunk_id = %chunk_id, "chunk already completed, nothing to resume");
                return Ok(Self::outcome(&progress));
            }
            ChunkStatus::Failed => {
                return Err(IngestError::invalid_request(format!(
                    "chunk '{}' failed; failed chunks are re-planned by the next run",
                    chunk_id
                )));
            }
            // timed_out is the expected case; pending and an abandoned
            // in_progress row resume from whatever cursor was journaled
            ChunkStatus::Pending | ChunkStatus::InProgress | ChunkStatus::TimedOut => {}
        }

        self.jobs.find_by_id(job_id).await?.ok_or_else(|| {
            IngestError::invalid_request(format!("unknown job '{}'", job_id))
        })?;
        let tenant = self
            .tenants
            .find_by_id(&progress.tenant_id)
            .await?
            .ok_or_else(|| {
                IngestError::configuration(format!(
                    "tenant '{}' no longer configured",
                    progress.tenant_id
                ))
            })?;
        let binding = tenant.binding_for(&progress.service).ok_or_else(|| {
            IngestError::configuration(format!(
                "tenant '{}' has no binding for service '{}'",
                progress.tenant_id, progress.service
            ))
        })?;
        let catalog = self
            .catalogs
            .endpoint_catalog(&progress.service)
            .await?
            .ok_or_else(|| {
                IngestError::configuration(format!(
                    "no endpoint catalog for service '{}'",
                    progress.service
                ))
            })?;
        let endpoint = catalog
            .endpoint_for_table(&progress.table_name)
            .ok_or_else(|| {
                IngestError::configuration(format!(
                    "service '{}' no longer declares table '{}'",
                    progress.service, progress.table_name
                ))
            })?
            .clone();

        let outcome = match self.chunks.process(&mut progress, binding, &endpoint, ctx).await {
            Ok(outcome) => outcome,
            Err(error) => {
                let kind = error.kind();
                if progress.fail(kind).is_ok() {
                    let _ = self.journal.put(&progress).await;
                }
                return Err(error);
            }
        };

        if outcome.completed() {
            self.finish_table_if_settled(&progress, &endpoint.canonical_table)
                .await?;
        }
        Ok(outcome)
    }

    /// Watermark advance and transform trigger once the whole table settled.
    async fn finish_table_if_settled(
        &self,
        progress: &ChunkProgress,
        canonical_table: &ingest_pipeline_domain::value_objects::TableName,
    ) -> Result<(), IngestError> {
        let rows = self.journal.list_for_job(&progress.job_id, None).await?;
        let table_rows: Vec<&ChunkProgress> = rows
            .iter()
            .filter(|r| {
                r.tenant_id == progress.tenant_id
                    && r.service == progress.service
                    && r.table_name == progress.table_name
            })
            .collect();
        if !table_rows
            .iter()
            .all(|r| r.status == ChunkStatus::Completed)
        {
            info!(
                chunk_id = %progress.chunk_id,
                "table still has unsettled chunks; watermark and transform deferred"
            );
            return Ok(());
        }

        if let Some(watermark) = table_rows.iter().filter_map(|r| r.contributed_watermark()).max() {
            self.watermarks
                .set(
                    &progress.tenant_id,
                    &progress.service,
                    &progress.table_name,
                    &watermark,
                )
                .await?;
            info!(
                tenant = %progress.tenant_id,
                table = %progress.table_name,
                watermark = %watermark,
                "watermark advanced after resumption"
            );
        }

        let files: Vec<String> = table_rows
            .iter()
            .flat_map(|r| r.files_written.iter().cloned())
            .collect();
        if files.is_empty() {
            return Ok(());
        }
        match self
            .transformer
            .transform_and_load(&progress.tenant_id, &progress.service, canonical_table, &files)
            .await
        {
            Ok(stats) => {
                info!(
                    tenant = %progress.tenant_id,
                    table = %progress.table_name,
                    inserted = stats.inserted,
                    versioned = stats.versioned,
                    skipped = stats.skipped,
                    "canonical transform completed after resumption"
                );
                Ok(())
            }
            Err(error) => {
                warn!(
                    tenant = %progress.tenant_id,
                    table = %progress.table_name,
                    error = %error,
                    "canonical transform failed after resumption"
                );
                Err(error)
            }
        }
    }

    fn outcome(progress: &ChunkProgress) -> ChunkRunOutcome {
        ChunkRunOutcome {
            chunk_id: progress.chunk_id.clone(),
            status: progress.status,
            records_processed: progress.records_processed,
            pages_fetched: progress.pages_fetched,
            files_written: progress.files_written.clone(),
            final_page: progress.cursor.as_ref().map(|c| c.last_page).unwrap_or(0),
            final_offset: progress.cursor.as_ref().map(|c| c.last_offset).unwrap_or(0),
            error_kind: progress.last_error_kind,
        }
    }
}
