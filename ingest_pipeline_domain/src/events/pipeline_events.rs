// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Events
//!
//! Events the orchestrator publishes when a job reaches a terminal state.
//! The completion event carries the overall rollup plus the per-tenant,
//! per-table breakdown, so consumers can alert on partial successes without
//! re-reading the journal. There are no silent successes: every failed chunk
//! is reflected here through its table's error kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{JobRollup, JobStatus, TenantRunResult};
use crate::services::datetime_serde;
use crate::value_objects::JobId;

/// Published once per job, after all tenant runs settle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineCompletedEvent {
    pub event_id: Uuid,
    pub job_id: JobId,
    pub status: JobStatus,
    pub rollup: JobRollup,
    /// Per-tenant, per-table breakdown
    pub tenants: Vec<TenantRunResult>,
    #[serde(with = "datetime_serde")]
    pub occurred_at: DateTime<Utc>,
}

impl PipelineCompletedEvent {
    pub fn new(
        job_id: JobId,
        status: JobStatus,
        rollup: JobRollup,
        tenants: Vec<TenantRunResult>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            job_id,
            status,
            rollup,
            tenants,
            occurred_at: Utc::now(),
        }
    }
}
