// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Object Key Value Objects
//!
//! Key formats for raw and canonical Parquet objects. Objects are immutable
//! once written, so key uniqueness is what prevents overwrites:
//!
//! - Raw keys embed a nanosecond-resolved timestamp, the chunk attempt
//!   number, and a monotonically increasing in-chunk sequence. A retried
//!   chunk therefore never collides with the files of its prior attempt.
//! - Canonical keys embed only the nanosecond timestamp; one transform
//!   invocation writes at most one canonical object per table.
//!
//! Layout:
//!
//! ```text
//! {tenant_id}/raw/{service}/{table_name}/{YYYY-MM-DD}/{timestamp}-a{attempt}-{seq}.parquet
//! {tenant_id}/canonical/{table_name}/{YYYY-MM-DD}/{timestamp}.parquet
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{TableName, TenantId};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Key of one raw Parquet object, owned exclusively by the chunk that wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawObjectKey(String);

impl RawObjectKey {
    /// Builds the key for one flushed raw batch
    pub fn build(
        tenant_id: &TenantId,
        service: &str,
        table_name: &TableName,
        written_at: DateTime<Utc>,
        attempt: u32,
        sequence: u32,
    ) -> Self {
        Self(format!(
            "{}/raw/{}/{}/{}/{}-a{:02}-{:05}.parquet",
            tenant_id,
            service,
            table_name,
            written_at.format(DATE_FORMAT),
            written_at.format(TIMESTAMP_FORMAT),
            attempt,
            sequence,
        ))
    }

    /// Returns the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key, returning the underlying string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for RawObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of one canonical Parquet object, owned by the transform invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalObjectKey(String);

impl CanonicalObjectKey {
    /// Builds the key for one canonical record set
    pub fn build(tenant_id: &TenantId, table_name: &TableName, written_at: DateTime<Utc>) -> Self {
        Self(format!(
            "{}/canonical/{}/{}/{}.parquet",
            tenant_id,
            table_name,
            written_at.format(DATE_FORMAT),
            written_at.format(TIMESTAMP_FORMAT),
        ))
    }

    /// Returns the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key, returning the underlying string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CanonicalObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
