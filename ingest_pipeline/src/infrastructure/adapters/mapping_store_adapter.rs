// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Mapping Store Adapter
//!
//! Loads declarative configuration documents from the object store:
//!
//! - endpoint catalogs under `config/endpoints/{service}.json`
//! - canonical mappings under `config/mappings/{canonical_table}.json`
//!
//! Documents are validated on first load and cached for the process
//! lifetime; mappings are data interpreted at run time, never code.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use ingest_pipeline_domain::config::{CanonicalMapping, EndpointCatalog};
use ingest_pipeline_domain::services::{BlobStore, MappingStore};
use ingest_pipeline_domain::value_objects::TableName;
use ingest_pipeline_domain::IngestError;

pub struct BlobMappingStore {
    blobs: Arc<dyn BlobStore>,
    catalog_cache: RwLock<HashMap<String, EndpointCatalog>>,
    mapping_cache: RwLock<HashMap<String, CanonicalMapping>>,
}

impl BlobMappingStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            catalog_cache: RwLock::new(HashMap::new()),
            mapping_cache: RwLock::new(HashMap::new()),
        }
    }

    fn catalog_key(service: &str) -> String {
        format!("config/endpoints/{}.json", service)
    }

    fn mapping_key(canonical_table: &TableName) -> String {
        format!("config/mappings/{}.json", canonical_table)
    }
}

#[async_trait]
impl MappingStore for BlobMappingStore {
    async fn endpoint_catalog(
        &self,
        service: &str,
    ) -> Result<Option<EndpointCatalog>, IngestError> {
        if let Some(catalog) = self.catalog_cache.read().get(service) {
            return Ok(Some(catalog.clone()));
        }
        let Some(bytes) = self.blobs.get(&Self::catalog_key(service)).await? else {
            return Ok(None);
        };
        let catalog: EndpointCatalog = serde_json::from_slice(&bytes).map_err(|e| {
            IngestError::configuration(format!(
                "endpoint catalog for '{}' unparseable: {}",
                service, e
            ))
        })?;
        catalog.validate()?;
        self.catalog_cache
            .write()
            .insert(service.to_string(), catalog.clone());
        Ok(Some(catalog))
    }

    async fn canonical_mapping(
        &self,
        canonical_table: &TableName,
    ) -> Result<Option<CanonicalMapping>, IngestError> {
        if let Some(mapping) = self.mapping_cache.read().get(canonical_table.as_str()) {
            return Ok(Some(mapping.clone()));
        }
        let Some(bytes) = self.blobs.get(&Self::mapping_key(canonical_table)).await? else {
            return Ok(None);
        };
        let mapping: CanonicalMapping = serde_json::from_slice(&bytes).map_err(|e| {
            IngestError::configuration(format!(
                "canonical mapping for '{}' unparseable: {}",
                canonical_table, e
            ))
        })?;
        mapping.validate()?;
        self.mapping_cache
            .write()
            .insert(canonical_table.as_str().to_string(), mapping.clone());
        Ok(Some(mapping))
    }
}
