// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tenant Identifier Value Object
//!
//! Opaque customer-workspace identifier, the root isolation unit of the
//! pipeline. The identifier is embedded verbatim in object-store keys and in
//! every journal row, so its character set is restricted to values that are
//! safe in both places.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::IngestError;

static TENANT_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").expect("valid tenant id pattern"));

/// Identifier of one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Creates a validated tenant identifier
    ///
    /// Accepts 1-64 characters from `[A-Za-z0-9_-]`, starting with an
    /// alphanumeric character.
    pub fn new(id: impl Into<String>) -> Result<Self, IngestError> {
        let id = id.into();
        if !TENANT_ID_PATTERN.is_match(&id) {
            return Err(IngestError::invalid_request(format!(
                "invalid tenant id '{}': must be 1-64 characters of [A-Za-z0-9_-] starting alphanumeric",
                id
            )));
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = IngestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

impl std::str::FromStr for TenantId {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_identifiers() {
        assert!(TenantId::new("acme").is_ok());
        assert!(TenantId::new("acme-west_2").is_ok());
        assert!(TenantId::new("T0001").is_ok());
    }

    #[test]
    fn rejects_key_unsafe_identifiers() {
        assert!(TenantId::new("").is_err());
        assert!(TenantId::new("acme/west").is_err());
        assert!(TenantId::new("-leading-dash").is_err());
        assert!(TenantId::new("a".repeat(65)).is_err());
    }
}
