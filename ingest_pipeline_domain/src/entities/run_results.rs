// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Run Result Types
//!
//! Outcome summaries returned upward through the processing hierarchy:
//! chunk -> table -> tenant -> orchestrator. These are plain data; the
//! completion notification embeds them for the per-tenant, per-table
//! breakdown it reports.

use serde::{Deserialize, Serialize};

use crate::entities::ChunkStatus;
use crate::error::ErrorKind;
use crate::value_objects::{ChunkId, TableName, TenantId};

/// Outcome of one chunk invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRunOutcome {
    pub chunk_id: ChunkId,
    pub status: ChunkStatus,
    pub records_processed: u64,
    pub pages_fetched: u32,
    /// Raw object keys written by this chunk, in flush order
    pub files_written: Vec<String>,
    pub final_page: u32,
    pub final_offset: u64,
    pub error_kind: Option<ErrorKind>,
}

impl ChunkRunOutcome {
    pub fn completed(&self) -> bool {
        self.status == ChunkStatus::Completed
    }
}

/// Outcome of one (tenant, table) run: every chunk settled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRunResult {
    pub service: String,
    pub table_name: TableName,
    pub chunks: Vec<ChunkRunOutcome>,
    pub records_processed: u64,
    /// Union of `files_written` across completed chunks, in chunk order
    pub files_written: Vec<String>,
    /// Set when the table's canonical transform failed after its chunks ran
    pub error_kind: Option<ErrorKind>,
}

impl TableRunResult {
    /// Whether every chunk completed and the downstream transform (if any)
    /// succeeded. Timed-out chunks resume next run but count against success
    /// for this run's rollup.
    pub fn succeeded(&self) -> bool {
        !self.chunks.is_empty()
            && self.chunks.iter().all(ChunkRunOutcome::completed)
            && self.error_kind.is_none()
    }

    /// Whether any chunk failed outright
    pub fn any_failed(&self) -> bool {
        self.chunks.iter().any(|c| c.status == ChunkStatus::Failed)
    }
}

/// Outcome of one tenant run: every table settled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRunResult {
    pub tenant_id: TenantId,
    pub tables: Vec<TableRunResult>,
    /// Services whose discovery failed before any table could run
    /// (missing endpoint catalog, unreadable configuration)
    pub failed_services: Vec<(String, ErrorKind)>,
    pub records_processed: u64,
    pub duration_ms: u64,
    /// True when the tenant had no enabled endpoints to process
    pub no_op: bool,
}

impl TenantRunResult {
    /// A tenant succeeds when discovery worked and every table it ran
    /// succeeded (a no-op tenant trivially succeeds)
    pub fn succeeded(&self) -> bool {
        self.failed_services.is_empty()
            && (self.no_op || self.tables.iter().all(TableRunResult::succeeded))
    }

    /// A failed tenant result for errors that precede any table run
    pub fn failed(tenant_id: TenantId, service: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            tenant_id,
            tables: Vec::new(),
            failed_services: vec![(service.into(), kind)],
            records_processed: 0,
            duration_ms: 0,
            no_op: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: ChunkStatus) -> ChunkRunOutcome {
        ChunkRunOutcome {
            chunk_id: ChunkId::from_string("00000000000000000000000000000000").unwrap(),
            status,
            records_processed: 0,
            pages_fetched: 0,
            files_written: vec![],
            final_page: 0,
            final_offset: 0,
            error_kind: None,
        }
    }

    #[test]
    fn table_success_requires_every_chunk_completed() {
        let table = TableRunResult {
            service: "psa".into(),
            table_name: TableName::new("tickets").unwrap(),
            chunks: vec![outcome(ChunkStatus::Completed), outcome(ChunkStatus::TimedOut)],
            records_processed: 0,
            files_written: vec![],
            error_kind: None,
        };
        assert!(!table.succeeded());
        assert!(!table.any_failed());
    }

    #[test]
    fn no_op_tenant_succeeds() {
        let tenant = TenantRunResult {
            tenant_id: TenantId::new("acme").unwrap(),
            tables: vec![],
            failed_services: vec![],
            records_processed: 0,
            duration_ms: 0,
            no_op: true,
        };
        assert!(tenant.succeeded());
    }

    #[test]
    fn discovery_failure_fails_the_tenant() {
        let tenant = TenantRunResult::failed(
            TenantId::new("acme").unwrap(),
            "psa",
            ErrorKind::Configuration,
        );
        assert!(!tenant.succeeded());
    }
}
