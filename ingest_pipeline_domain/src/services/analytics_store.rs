// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Analytics Store Port
//!
//! Operations the SCD-aware sink needs from the columnar analytics store.
//! The store's table engine is assumed to collapse duplicate sort keys on
//! background merges using a version column, so repeated loads of the same
//! raw file converge even when the application-level classification is
//! bypassed. Row-level tenant isolation is a query-layer concern: every
//! operation here is scoped by `tenant_id`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::CanonicalRecord;
use crate::value_objects::{TableName, TenantId};
use crate::IngestError;

/// Current-version row of an SCD type-2 table, as seen by the sink.
///
/// Business content is compared through `record_hash`, never by refetching
/// full rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentVersionRow {
    pub id: String,
    pub record_hash: String,
    pub record_version: u32,
}

/// Counters returned by one sink invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub inserted: u64,
    /// Type-1 only: rows whose mutable columns were updated in place
    pub updated: u64,
    /// Type-2 only: rows that received a new version
    pub versioned: u64,
    pub skipped: u64,
}

impl SinkStats {
    pub fn merge(&mut self, other: SinkStats) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.versioned += other.versioned;
        self.skipped += other.skipped;
    }
}

/// Port over the columnar analytics store.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Batch-reads the version column (`last_updated`) for the given ids
    ///
    /// Returns a map of id to version value; absent ids have no row yet.
    /// Used by the type-1 classification.
    async fn fetch_versions(
        &self,
        table: &TableName,
        tenant_id: &TenantId,
        ids: &[String],
    ) -> Result<HashMap<String, String>, IngestError>;

    /// Batch-reads the current version rows (`is_current = true`) for the
    /// given ids; used by the type-2 comparison
    async fn fetch_current_rows(
        &self,
        table: &TableName,
        tenant_id: &TenantId,
        ids: &[String],
    ) -> Result<HashMap<String, CurrentVersionRow>, IngestError>;

    /// Batch-inserts canonical rows under the tenant's partition
    async fn insert_rows(
        &self,
        table: &TableName,
        tenant_id: &TenantId,
        rows: &[CanonicalRecord],
    ) -> Result<(), IngestError>;

    /// Type-1: updates the mutable columns of existing rows in place
    async fn update_rows(
        &self,
        table: &TableName,
        tenant_id: &TenantId,
        rows: &[CanonicalRecord],
    ) -> Result<(), IngestError>;

    /// Type-2: expires the current versions of the given ids
    /// (`is_current = false`, `expiration_date = expired_at`)
    async fn expire_current(
        &self,
        table: &TableName,
        tenant_id: &TenantId,
        ids: &[String],
        expired_at: DateTime<Utc>,
    ) -> Result<(), IngestError>;
}
