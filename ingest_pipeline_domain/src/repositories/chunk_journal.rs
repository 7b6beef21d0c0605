// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Port for the `ChunkProgress` journal table.

use async_trait::async_trait;

use crate::entities::{ChunkProgress, ChunkStatus};
use crate::value_objects::{ChunkId, JobId};
use crate::IngestError;

/// Journal store for chunk progress rows.
///
/// Rows are keyed `(job_id, chunk_id)` and written only by the owning chunk
/// processor, so a plain upsert is sufficient; the entity's state machine is
/// what prevents illegal writes.
#[async_trait]
pub trait ChunkJournal: Send + Sync {
    /// Upserts one chunk row
    async fn put(&self, progress: &ChunkProgress) -> Result<(), IngestError>;

    /// Reads one chunk row
    async fn find(
        &self,
        job_id: &JobId,
        chunk_id: &ChunkId,
    ) -> Result<Option<ChunkProgress>, IngestError>;

    /// Lists a job's chunks, optionally filtered by status
    ///
    /// Backed by the `(job_id, status)` index; used for rollup aggregation
    /// and for finding timed-out chunks to resume.
    async fn list_for_job(
        &self,
        job_id: &JobId,
        status: Option<ChunkStatus>,
    ) -> Result<Vec<ChunkProgress>, IngestError>;
}
