// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Port over the declarative configuration documents.
//!
//! Endpoint catalogs and canonical mappings are data, kept as JSON documents
//! in the object store and interpreted at run time. Implementations validate
//! documents on load and may cache them for the process lifetime.

use async_trait::async_trait;

use crate::config::{CanonicalMapping, EndpointCatalog};
use crate::value_objects::TableName;
use crate::IngestError;

/// Loader for endpoint catalogs and canonical mappings.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Loads the endpoint catalog of one service; `None` when the service
    /// declares no catalog
    async fn endpoint_catalog(&self, service: &str) -> Result<Option<EndpointCatalog>, IngestError>;

    /// Loads the mapping of one canonical table; `None` when absent
    async fn canonical_mapping(
        &self,
        canonical_table: &TableName,
    ) -> Result<Option<CanonicalMapping>, IngestError>;
}
