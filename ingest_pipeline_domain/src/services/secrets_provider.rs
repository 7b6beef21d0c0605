// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Port over the secrets store (get-by-reference only).
//!
//! Credentials are cached in memory for the lifetime of one chunk and never
//! shared across chunks; storage and rotation belong to the secrets store.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::IngestError;

/// Opaque key/value credential material for one source API.
#[derive(Clone, Default)]
pub struct SourceCredentials(HashMap<String, String>);

impl SourceCredentials {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self(values)
    }

    /// Reads one credential field
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Reads one credential field, erroring with a configuration failure
    /// when it is absent
    pub fn require(&self, key: &str) -> Result<&str, IngestError> {
        self.get(key).ok_or_else(|| {
            IngestError::configuration(format!("credential field '{}' is missing", key))
        })
    }
}

// Credentials never appear in logs or error chains
impl std::fmt::Debug for SourceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCredentials")
            .field("fields", &self.0.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Port over the secrets store.
#[async_trait]
pub trait SecretsProvider: Send + Sync {
    /// Resolves one opaque secret reference
    async fn fetch(&self, secret_ref: &str) -> Result<SourceCredentials, IngestError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_values() {
        let mut values = HashMap::new();
        values.insert("api_key".to_string(), "hunter2".to_string());
        let creds = SourceCredentials::new(values);
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("api_key"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn require_reports_missing_fields() {
        let creds = SourceCredentials::default();
        assert!(creds.require("api_key").is_err());
    }
}
