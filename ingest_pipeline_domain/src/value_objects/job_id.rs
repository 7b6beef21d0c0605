// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Identifier Value Object
//!
//! ULID-backed identifier for one pipeline invocation. ULIDs are used instead
//! of plain UUIDs because they sort lexicographically by creation time, which
//! keeps journal scans over recent jobs cheap and makes job listings naturally
//! chronological.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::IngestError;

/// Identifier of one `ProcessingJob`.
///
/// Immutable once created. The embedded timestamp is the job creation time at
/// millisecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Ulid);

impl JobId {
    /// Creates a new identifier stamped with the current time
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parses an identifier from its canonical 26-character string form
    pub fn from_string(s: &str) -> Result<Self, IngestError> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| IngestError::invalid_request(format!("invalid job id '{}': {}", s, e)))
    }

    /// Returns the underlying ULID
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }

    /// Returns the creation timestamp embedded in the identifier
    pub fn datetime(&self) -> chrono::DateTime<chrono::Utc> {
        let millis = self.0.timestamp_ms();
        chrono::DateTime::from_timestamp_millis(millis as i64).unwrap_or_default()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}
