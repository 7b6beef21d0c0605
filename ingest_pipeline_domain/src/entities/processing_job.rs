// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processing Job Entity
//!
//! One pipeline invocation, journaled from creation to its terminal state.
//! The orchestrator owns this row; child components contribute rollup
//! counters through version-guarded updates.
//!
//! ## Lifecycle
//!
//! ```text
//! pending -> running -> (completed | partial_success | failed)
//! ```
//!
//! The rollup decides the terminal status: `completed` when every tenant
//! succeeded, `partial_success` when at least one tenant succeeded and at
//! least one failed, `failed` when all failed or initialization failed. A
//! supervisor may additionally mark a job `failed` when its `updated_at`
//! stops moving for longer than the staleness timeout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::datetime_serde;
use crate::value_objects::{JobId, TableName, TenantId};
use crate::IngestError;

/// Scope of one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobMode {
    SingleTenant,
    MultiTenant,
}

impl JobMode {
    /// Stable string form used in the journal
    pub fn as_str(&self) -> &'static str {
        match self {
            JobMode::SingleTenant => "single-tenant",
            JobMode::MultiTenant => "multi-tenant",
        }
    }
}

impl std::str::FromStr for JobMode {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single-tenant" => Ok(JobMode::SingleTenant),
            "multi-tenant" => Ok(JobMode::MultiTenant),
            other => Err(IngestError::serialization(format!("unknown job mode: {}", other))),
        }
    }
}

/// Journaled status of one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    PartialSuccess,
    Failed,
}

impl JobStatus {
    /// Stable string form used in the journal
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::PartialSuccess => "partial_success",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether this status ends the job
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::PartialSuccess | JobStatus::Failed
        )
    }
}

impl std::str::FromStr for JobStatus {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "partial_success" => Ok(JobStatus::PartialSuccess),
            "failed" => Ok(JobStatus::Failed),
            other => Err(IngestError::serialization(format!("unknown job status: {}", other))),
        }
    }
}

/// Historical date range processed by a backfill run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillRange {
    #[serde(with = "datetime_serde")]
    pub start: DateTime<Utc>,
    #[serde(with = "datetime_serde")]
    pub end: DateTime<Utc>,
    /// Width of the date chunks the range is divided into
    pub chunk_days: u32,
}

impl BackfillRange {
    /// Validates that the range is non-empty and the chunk width positive
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.end <= self.start {
            return Err(IngestError::invalid_request(format!(
                "backfill range end {} is not after start {}",
                self.end.to_rfc3339(),
                self.start.to_rfc3339()
            )));
        }
        if self.chunk_days == 0 {
            return Err(IngestError::invalid_request("backfill chunk_days must be positive"));
        }
        Ok(())
    }
}

/// Aggregated counters across every tenant of one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRollup {
    pub tenants_total: u32,
    pub tenants_succeeded: u32,
    pub tenants_failed: u32,
    pub records_processed: u64,
}

impl JobRollup {
    /// Terminal status implied by these counters
    pub fn terminal_status(&self) -> JobStatus {
        if self.tenants_total == 0 || self.tenants_failed == 0 {
            JobStatus::Completed
        } else if self.tenants_succeeded > 0 {
            JobStatus::PartialSuccess
        } else {
            JobStatus::Failed
        }
    }
}

/// One pipeline invocation.
///
/// Owned by the orchestrator. The `version` field implements optimistic
/// concurrency in the journal: every update carries the version it read, and
/// the store rejects writes whose version is stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub job_id: JobId,
    pub mode: JobMode,
    pub status: JobStatus,
    pub force_full_sync: bool,
    pub backfill: Option<BackfillRange>,
    /// Present in single-tenant mode
    pub tenant_filter: Option<TenantId>,
    /// Restricts the run to one table when present
    pub table_filter: Option<TableName>,
    pub rollup: JobRollup,
    #[serde(with = "datetime_serde")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_serde")]
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl ProcessingJob {
    /// Creates a new pending job
    pub fn new(
        mode: JobMode,
        tenant_filter: Option<TenantId>,
        table_filter: Option<TableName>,
        force_full_sync: bool,
        backfill: Option<BackfillRange>,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: JobId::new(),
            mode,
            status: JobStatus::Pending,
            force_full_sync,
            backfill,
            tenant_filter,
            table_filter,
            rollup: JobRollup::default(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Marks the job running
    pub fn start(&mut self) -> Result<(), IngestError> {
        if self.status != JobStatus::Pending {
            return Err(IngestError::unexpected(format!(
                "job {} cannot start from status {}",
                self.job_id,
                self.status.as_str()
            )));
        }
        self.status = JobStatus::Running;
        self.touch();
        Ok(())
    }

    /// Finishes the job with the rollup-implied terminal status
    pub fn finish(&mut self, rollup: JobRollup) -> Result<JobStatus, IngestError> {
        if self.status.is_terminal() {
            return Err(IngestError::unexpected(format!(
                "job {} already terminal with status {}",
                self.job_id,
                self.status.as_str()
            )));
        }
        self.rollup = rollup;
        self.status = rollup.terminal_status();
        self.touch();
        Ok(self.status)
    }

    /// Marks the job failed before any tenant ran
    pub fn fail(&mut self) {
        self.status = JobStatus::Failed;
        self.touch();
    }

    /// Bumps `updated_at`; journal writes also bump `version`
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Whether the job has gone stale: still unfinished with no
    /// `updated_at` movement since `cutoff`
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.updated_at < cutoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_job() -> ProcessingJob {
        ProcessingJob::new(JobMode::MultiTenant, None, None, false, None)
    }

    #[test]
    fn lifecycle_pending_running_terminal() {
        let mut job = pending_job();
        assert_eq!(job.status, JobStatus::Pending);
        job.start().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        let status = job
            .finish(JobRollup {
                tenants_total: 3,
                tenants_succeeded: 3,
                tenants_failed: 0,
                records_processed: 42,
            })
            .unwrap();
        assert_eq!(status, JobStatus::Completed);
        assert!(job.finish(JobRollup::default()).is_err());
    }

    #[test]
    fn rollup_decides_terminal_status() {
        let all_ok = JobRollup {
            tenants_total: 2,
            tenants_succeeded: 2,
            tenants_failed: 0,
            records_processed: 0,
        };
        let mixed = JobRollup {
            tenants_total: 2,
            tenants_succeeded: 1,
            tenants_failed: 1,
            records_processed: 0,
        };
        let all_failed = JobRollup {
            tenants_total: 2,
            tenants_succeeded: 0,
            tenants_failed: 2,
            records_processed: 0,
        };
        assert_eq!(all_ok.terminal_status(), JobStatus::Completed);
        assert_eq!(mixed.terminal_status(), JobStatus::PartialSuccess);
        assert_eq!(all_failed.terminal_status(), JobStatus::Failed);
    }

    #[test]
    fn zero_tenant_run_is_a_completed_no_op() {
        assert_eq!(JobRollup::default().terminal_status(), JobStatus::Completed);
    }

    #[test]
    fn backfill_range_validation() {
        let start = Utc::now();
        let bad = BackfillRange {
            start,
            end: start,
            chunk_days: 30,
        };
        assert!(bad.validate().is_err());
        let good = BackfillRange {
            start,
            end: start + chrono::Duration::days(90),
            chunk_days: 30,
        };
        assert!(good.validate().is_ok());
    }

    #[test]
    fn staleness_requires_unfinished_status() {
        let mut job = pending_job();
        let future = Utc::now() + chrono::Duration::hours(7);
        assert!(job.is_stale(future));
        job.start().unwrap();
        job.finish(JobRollup::default()).unwrap();
        assert!(!job.is_stale(future));
    }
}
