// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Watermark Value Object
//!
//! The highest value of a table's incremental field that has been durably
//! synced. Watermarks are stored in the journal as RFC 3339 strings and
//! compared chronologically; a watermark only ever advances, and only when
//! every chunk of its table completed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::IngestError;

/// High-water mark of a (tenant, service, table) incremental sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(DateTime<Utc>);

impl Watermark {
    /// Creates a watermark from an explicit instant
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    /// Creates a watermark at the current instant
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parses a watermark from its RFC 3339 journal form
    pub fn parse(s: &str) -> Result<Self, IngestError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| {
                IngestError::serialization(format!("invalid watermark '{}': {}", s, e))
            })
    }

    /// Returns the underlying instant
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Returns the RFC 3339 journal form
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    }

    /// Returns the later of two watermarks
    pub fn max(self, other: Self) -> Self {
        if other.0 > self.0 {
            other
        } else {
            self
        }
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Watermark {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}
