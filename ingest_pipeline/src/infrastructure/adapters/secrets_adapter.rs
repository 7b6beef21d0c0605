// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Secrets Providers
//!
//! [`SecretsProvider`] implementations. The file-backed provider reads one
//! JSON document mapping secret references to key/value credential maps;
//! storage and rotation belong to the deployment's secrets store, the
//! pipeline only ever resolves references. The static provider serves tests
//! and local development.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use ingest_pipeline_domain::services::{SecretsProvider, SourceCredentials};
use ingest_pipeline_domain::IngestError;

/// Secrets resolved from a JSON file:
/// `{ "secret/acme/psa": { "base_url": "...", "api_key": "..." } }`
pub struct FileSecretsProvider {
    secrets: HashMap<String, HashMap<String, String>>,
}

impl FileSecretsProvider {
    pub fn from_file(path: &Path) -> Result<Self, IngestError> {
        let raw = std::fs::read(path).map_err(|e| {
            IngestError::configuration(format!(
                "secrets file '{}' unreadable: {}",
                path.display(),
                e
            ))
        })?;
        let secrets: HashMap<String, HashMap<String, String>> = serde_json::from_slice(&raw)
            .map_err(|e| {
                IngestError::configuration(format!(
                    "secrets file '{}' is not a secret map: {}",
                    path.display(),
                    e
                ))
            })?;
        Ok(Self { secrets })
    }
}

#[async_trait]
impl SecretsProvider for FileSecretsProvider {
    async fn fetch(&self, secret_ref: &str) -> Result<SourceCredentials, IngestError> {
        self.secrets
            .get(secret_ref)
            .cloned()
            .map(SourceCredentials::new)
            .ok_or_else(|| {
                IngestError::configuration(format!("secret reference '{}' not found", secret_ref))
            })
    }
}

/// In-memory secrets for tests and local development.
#[derive(Default)]
pub struct StaticSecretsProvider {
    secrets: HashMap<String, HashMap<String, String>>,
}

impl StaticSecretsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(
        mut self,
        secret_ref: impl Into<String>,
        values: HashMap<String, String>,
    ) -> Self {
        self.secrets.insert(secret_ref.into(), values);
        self
    }
}

#[async_trait]
impl SecretsProvider for StaticSecretsProvider {
    async fn fetch(&self, secret_ref: &str) -> Result<SourceCredentials, IngestError> {
        self.secrets
            .get(secret_ref)
            .cloned()
            .map(SourceCredentials::new)
            .ok_or_else(|| {
                IngestError::configuration(format!("secret reference '{}' not found", secret_ref))
            })
    }
}
