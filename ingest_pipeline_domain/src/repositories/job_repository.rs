// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Port for the `ProcessingJobs` journal table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::ProcessingJob;
use crate::value_objects::JobId;
use crate::IngestError;

/// Journal store for pipeline jobs.
///
/// `update` is version-guarded: the write carries the version the caller
/// read, the store persists `version + 1`, and a stale version surfaces as a
/// `Journal` error so the caller can re-read and retry. This is how rollup
/// counters stay consistent when child components report concurrently.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Journals a freshly created job
    async fn create(&self, job: &ProcessingJob) -> Result<(), IngestError>;

    /// Reads one job
    async fn find_by_id(&self, job_id: &JobId) -> Result<Option<ProcessingJob>, IngestError>;

    /// Writes the job back, guarded on `job.version`; on success the
    /// store bumps `job.version` to the persisted value
    async fn update(&self, job: &mut ProcessingJob) -> Result<(), IngestError>;

    /// Lists unfinished jobs whose `updated_at` predates `cutoff`
    ///
    /// Used by the staleness supervisor to fail abandoned jobs.
    async fn list_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<ProcessingJob>, IngestError>;
}
