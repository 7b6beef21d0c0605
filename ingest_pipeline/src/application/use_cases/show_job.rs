// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Show Job Use Case
//!
//! Read-only inspection of one journaled job and its chunk rows.

use std::sync::Arc;

use serde::Serialize;

use ingest_pipeline_domain::entities::{ChunkStatus, ProcessingJob};
use ingest_pipeline_domain::repositories::{ChunkJournal, JobRepository};
use ingest_pipeline_domain::value_objects::{ChunkId, JobId, TableName, TenantId};
use ingest_pipeline_domain::IngestError;

/// One chunk row, summarized for inspection output.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkSummary {
    pub chunk_id: ChunkId,
    pub tenant_id: TenantId,
    pub service: String,
    pub table_name: TableName,
    pub status: ChunkStatus,
    pub records_processed: u64,
    pub pages_fetched: u32,
    pub files_written: usize,
    pub attempt: u32,
    pub last_error_kind: Option<String>,
}

/// A job and its chunk breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub job: ProcessingJob,
    pub chunks: Vec<ChunkSummary>,
}

pub struct ShowJobUseCase {
    jobs: Arc<dyn JobRepository>,
    journal: Arc<dyn ChunkJournal>,
}

impl ShowJobUseCase {
    pub fn new(jobs: Arc<dyn JobRepository>, journal: Arc<dyn ChunkJournal>) -> Self {
        Self { jobs, journal }
    }

    pub async fn execute(&self, job_id: &JobId) -> Result<Option<JobView>, IngestError> {
        let Some(job) = self.jobs.find_by_id(job_id).await? else {
            return Ok(None);
        };
        let mut rows = self.journal.list_for_job(job_id, None).await?;
        rows.sort_by(|a, b| {
            (&a.tenant_id, &a.table_name, a.chunk_index).cmp(&(
                &b.tenant_id,
                &b.table_name,
                b.chunk_index,
            ))
        });
        let chunks = rows
            .into_iter()
            .map(|row| ChunkSummary {
                chunk_id: row.chunk_id,
                tenant_id: row.tenant_id,
                service: row.service,
                table_name: row.table_name,
                status: row.status,
                records_processed: row.records_processed,
                pages_fetched: row.pages_fetched,
                files_written: row.files_written.len(),
                attempt: row.attempt,
                last_error_kind: row.last_error_kind.map(|k| k.as_str().to_string()),
            })
            .collect();
        Ok(Some(JobView { job, chunks }))
    }
}
