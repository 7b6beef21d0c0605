// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Progress Entity
//!
//! The journaled state of one bounded, independently processable slice of
//! one (tenant, table) ingestion job. This is the unit of suspension and
//! retry: a chunk that hits its execution budget persists a resumption
//! cursor and is re-entered later; a chunk that fails transiently is retried
//! with backoff; a chunk that fails permanently records its error kind and
//! stays failed for the rest of the run.
//!
//! ## State Machine
//!
//! ```text
//! pending -> in_progress -> (completed | failed | timed_out)
//!                ^                             |
//!                +--------- resumption --------+
//! ```
//!
//! `completed` and `failed` are terminal for the run. `timed_out` re-enters
//! `in_progress` when the continuation invocation arrives. Every transition
//! is enforced here so that no caller can write progress into a terminal
//! chunk (the journal persists whatever this entity allows, nothing more).
//!
//! ## Invariants
//!
//! - `files_written` is append-only; flushed raw objects are never
//!   forgotten, and resumption unions new files onto the existing list.
//! - A chunk is `completed` only after its final page was recognized as the
//!   end of data and every flushed batch was durably persisted.
//! - The attempt counter increments on retries, never on rate-limit waits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::services::datetime_serde;
use crate::value_objects::{ChunkId, JobId, TableName, TenantId, Watermark};
use crate::IngestError;

/// Journaled status of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    TimedOut,
}

impl ChunkStatus {
    /// Stable string form used in the journal
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStatus::Pending => "pending",
            ChunkStatus::InProgress => "in_progress",
            ChunkStatus::Completed => "completed",
            ChunkStatus::Failed => "failed",
            ChunkStatus::TimedOut => "timed_out",
        }
    }

    /// Whether the chunk has settled for this pipeline run
    ///
    /// `timed_out` counts as terminal for trigger coordination (the table is
    /// done dispatching work this run) even though a continuation may
    /// re-enter it later.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChunkStatus::Completed | ChunkStatus::Failed | ChunkStatus::TimedOut
        )
    }
}

impl std::str::FromStr for ChunkStatus {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChunkStatus::Pending),
            "in_progress" => Ok(ChunkStatus::InProgress),
            "completed" => Ok(ChunkStatus::Completed),
            "failed" => Ok(ChunkStatus::Failed),
            "timed_out" => Ok(ChunkStatus::TimedOut),
            other => Err(IngestError::serialization(format!(
                "unknown chunk status: {}",
                other
            ))),
        }
    }
}

/// Bounds of one chunk.
///
/// The variant is decided by the endpoint configuration and the run mode:
/// incremental endpoints get watermark ranges, backfills and forced full
/// syncs get fixed date windows, and master-data endpoints (no incremental
/// field) get a single unbounded full refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkBounds {
    /// Routine incremental sync: `[start, end)` over the incremental field
    Incremental { start: Watermark, end: Watermark },
    /// Backfill or full sync: one fixed-width date window
    DateRange {
        #[serde(with = "datetime_serde")]
        start: DateTime<Utc>,
        #[serde(with = "datetime_serde")]
        end: DateTime<Utc>,
    },
    /// Master data: unbounded, processed as a full refresh
    FullRefresh,
}

impl ChunkBounds {
    /// The filter range applied to the incremental field, if any
    pub fn range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match self {
            ChunkBounds::Incremental { start, end } => {
                Some((start.as_datetime(), end.as_datetime()))
            }
            ChunkBounds::DateRange { start, end } => Some((*start, *end)),
            ChunkBounds::FullRefresh => None,
        }
    }

    /// The watermark this chunk advances to when it completes
    pub fn end_watermark(&self) -> Option<Watermark> {
        self.range().map(|(_, end)| Watermark::at(end))
    }
}

/// Cursor persisted when a chunk suspends on its execution budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumptionCursor {
    /// Last fully persisted page (1-based; 0 means none)
    pub last_page: u32,
    /// Row offset corresponding to `last_page` under offset pagination
    pub last_offset: u64,
    /// Key of the last durably flushed batch, if any
    pub last_batch_key: Option<String>,
}

/// The journaled state of one chunk, owned by its chunk processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkProgress {
    pub job_id: JobId,
    pub chunk_id: ChunkId,
    pub tenant_id: TenantId,
    pub service: String,
    pub table_name: TableName,
    pub chunk_index: u32,
    pub bounds: ChunkBounds,
    pub status: ChunkStatus,
    pub records_processed: u64,
    pub pages_fetched: u32,
    /// Highest incremental-field value synced so far; the watermark this
    /// chunk contributes on completion (its bound end when no records)
    pub max_incremental_value: Option<Watermark>,
    pub cursor: Option<ResumptionCursor>,
    /// Raw object keys written by this chunk, in flush order (append-only)
    pub files_written: Vec<String>,
    pub attempt: u32,
    pub last_error_kind: Option<ErrorKind>,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_serde")]
    pub updated_at: DateTime<Utc>,
}

impl ChunkProgress {
    /// Creates a pending chunk for a freshly planned table run
    pub fn new(
        job_id: JobId,
        tenant_id: TenantId,
        service: impl Into<String>,
        table_name: TableName,
        chunk_index: u32,
        bounds: ChunkBounds,
    ) -> Self {
        let chunk_id = ChunkId::derive(&job_id, &tenant_id, &table_name, chunk_index);
        let now = Utc::now();
        Self {
            job_id,
            chunk_id,
            tenant_id,
            service: service.into(),
            table_name,
            chunk_index,
            bounds,
            status: ChunkStatus::Pending,
            records_processed: 0,
            pages_fetched: 0,
            max_incremental_value: None,
            cursor: None,
            files_written: Vec::new(),
            attempt: 0,
            last_error_kind: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Begins an attempt, transitioning `pending | timed_out -> in_progress`
    ///
    /// Increments the attempt counter. Rate-limit waits inside an attempt do
    /// not come through here.
    pub fn begin_attempt(&mut self) -> Result<(), IngestError> {
        match self.status {
            ChunkStatus::Pending | ChunkStatus::TimedOut | ChunkStatus::InProgress => {
                self.status = ChunkStatus::InProgress;
                self.attempt += 1;
                self.touch();
                Ok(())
            }
            ChunkStatus::Completed | ChunkStatus::Failed => Err(IngestError::unexpected(format!(
                "chunk {} cannot begin an attempt from terminal status {}",
                self.chunk_id,
                self.status.as_str()
            ))),
        }
    }

    /// Records one persisted page of progress
    pub fn record_page(
        &mut self,
        records: u64,
        page: u32,
        offset: u64,
        observed_max: Option<Watermark>,
    ) -> Result<(), IngestError> {
        self.ensure_in_progress("record progress")?;
        self.records_processed += records;
        self.pages_fetched += 1;
        if let Some(observed) = observed_max {
            self.max_incremental_value = Some(match self.max_incremental_value {
                Some(current) => current.max(observed),
                None => observed,
            });
        }
        self.cursor = Some(ResumptionCursor {
            last_page: page,
            last_offset: offset,
            last_batch_key: self.files_written.last().cloned(),
        });
        self.touch();
        Ok(())
    }

    /// The watermark this chunk contributes once completed: the highest
    /// observed incremental value, else the bound end
    pub fn contributed_watermark(&self) -> Option<Watermark> {
        self.max_incremental_value.or_else(|| self.bounds.end_watermark())
    }

    /// Appends a flushed raw object key (append-only)
    pub fn append_file(&mut self, key: impl Into<String>) -> Result<(), IngestError> {
        self.ensure_in_progress("append a file")?;
        let key = key.into();
        if let Some(cursor) = &mut self.cursor {
            cursor.last_batch_key = Some(key.clone());
        }
        self.files_written.push(key);
        self.touch();
        Ok(())
    }

    /// Marks the chunk completed after the empty-page signal and final flush
    pub fn complete(&mut self) -> Result<(), IngestError> {
        self.ensure_in_progress("complete")?;
        self.status = ChunkStatus::Completed;
        self.last_error_kind = None;
        self.touch();
        Ok(())
    }

    /// Suspends the chunk on its execution budget, keeping the cursor
    pub fn suspend(&mut self, cursor: ResumptionCursor) -> Result<(), IngestError> {
        self.ensure_in_progress("suspend")?;
        self.status = ChunkStatus::TimedOut;
        self.cursor = Some(cursor);
        self.last_error_kind = Some(ErrorKind::DeadlineElapsed);
        self.touch();
        Ok(())
    }

    /// Fails the chunk with the classifying error kind
    pub fn fail(&mut self, kind: ErrorKind) -> Result<(), IngestError> {
        self.ensure_in_progress("fail")?;
        self.status = ChunkStatus::Failed;
        self.last_error_kind = Some(kind);
        self.touch();
        Ok(())
    }

    /// Whether a continuation invocation should re-enter this chunk
    pub fn is_resumable(&self) -> bool {
        self.status == ChunkStatus::TimedOut
    }

    fn ensure_in_progress(&self, action: &str) -> Result<(), IngestError> {
        if self.status != ChunkStatus::InProgress {
            return Err(IngestError::unexpected(format!(
                "chunk {} cannot {} in status {}",
                self.chunk_id,
                action,
                self.status.as_str()
            )));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
