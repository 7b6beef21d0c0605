// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Table Name Value Object
//!
//! Canonical snake_case table identifier. Table names are always declared
//! explicitly in endpoint configuration and never derived from endpoint
//! paths; deriving them historically produced inconsistent names for the
//! same logical table (`entries` vs `time_entries`), and the explicit name
//! is the fix.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::IngestError;

static TABLE_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,63}$").expect("valid table name pattern"));

/// Snake_case identifier of one canonical or raw table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    /// Creates a validated table name
    ///
    /// Accepts 1-64 characters matching `[a-z][a-z0-9_]*`.
    pub fn new(name: impl Into<String>) -> Result<Self, IngestError> {
        let name = name.into();
        if !TABLE_NAME_PATTERN.is_match(&name) {
            return Err(IngestError::configuration(format!(
                "invalid table name '{}': must be snake_case matching [a-z][a-z0-9_]*",
                name
            )));
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TableName {
    type Error = IngestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.0
    }
}

impl std::str::FromStr for TableName {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_snake_case() {
        assert!(TableName::new("tickets").is_ok());
        assert!(TableName::new("time_entries").is_ok());
        assert!(TableName::new("companies_v2").is_ok());
    }

    #[test]
    fn rejects_non_snake_case() {
        assert!(TableName::new("Tickets").is_err());
        assert!(TableName::new("service/tickets").is_err());
        assert!(TableName::new("_private").is_err());
        assert!(TableName::new("").is_err());
    }
}
