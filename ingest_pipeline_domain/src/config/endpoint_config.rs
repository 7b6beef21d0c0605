// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Endpoint Configuration
//!
//! Declarative description of one source-API endpoint: its pagination
//! strategy, rate limit, ordering field, and the explicit canonical table
//! name it feeds. Endpoint catalogs are loaded per service from the object
//! store and validated before any tenant work is planned.

use serde::{Deserialize, Serialize};

use crate::value_objects::TableName;
use crate::IngestError;

/// How an endpoint paginates its result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationStrategy {
    /// 1-based page numbers
    Page,
    /// Row offsets
    Offset,
}

/// Pagination parameters of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub strategy: PaginationStrategy,
    pub page_size_default: u32,
    pub page_size_max: u32,
}

impl PaginationConfig {
    /// Clamps a requested page size into the endpoint's allowed range
    pub fn effective_page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.page_size_default)
            .clamp(1, self.page_size_max)
    }
}

/// Declarative configuration of one (service, endpoint path) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub enabled: bool,
    /// Resource path on the source API, e.g. `service/tickets`
    pub path: String,
    /// Explicit canonical table identifier; never derived from `path`
    pub table_name: TableName,
    /// Canonical target name, usually equal to `table_name`
    pub canonical_table: TableName,
    pub pagination: PaginationConfig,
    /// Requests per minute ceiling for this service
    pub rate_limit_per_minute: u32,
    /// Source timestamp field used for incremental sync; absent for master
    /// data, which is always synced in full
    #[serde(default)]
    pub incremental_field: Option<String>,
    /// Field that stably sorts the paginated sequence
    pub ordering_field: String,
}

impl EndpointConfig {
    /// Whether this endpoint supports incremental sync
    pub fn is_incremental(&self) -> bool {
        self.incremental_field.is_some()
    }

    fn validate(&self) -> Result<(), IngestError> {
        if self.path.trim().is_empty() {
            return Err(IngestError::configuration(format!(
                "endpoint for table '{}' has an empty path",
                self.table_name
            )));
        }
        if self.ordering_field.trim().is_empty() {
            return Err(IngestError::configuration(format!(
                "endpoint '{}' has no ordering_field",
                self.path
            )));
        }
        if self.pagination.page_size_default == 0
            || self.pagination.page_size_max == 0
            || self.pagination.page_size_default > self.pagination.page_size_max
        {
            return Err(IngestError::configuration(format!(
                "endpoint '{}' has an invalid page-size range {}..{}",
                self.path, self.pagination.page_size_default, self.pagination.page_size_max
            )));
        }
        if self.rate_limit_per_minute == 0 {
            return Err(IngestError::configuration(format!(
                "endpoint '{}' has a zero rate limit",
                self.path
            )));
        }
        Ok(())
    }
}

/// The endpoint catalog of one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointCatalog {
    pub service: String,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl EndpointCatalog {
    /// Validates every endpoint and checks table-name uniqueness
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.service.trim().is_empty() {
            return Err(IngestError::configuration("endpoint catalog with empty service name"));
        }
        let mut seen = std::collections::HashSet::new();
        for endpoint in &self.endpoints {
            endpoint.validate()?;
            if !seen.insert(endpoint.table_name.clone()) {
                return Err(IngestError::configuration(format!(
                    "service '{}' declares table '{}' twice",
                    self.service, endpoint.table_name
                )));
            }
        }
        Ok(())
    }

    /// Iterates the endpoints eligible for processing
    pub fn enabled_endpoints(&self) -> impl Iterator<Item = &EndpointConfig> {
        self.endpoints.iter().filter(|e| e.enabled)
    }

    /// Finds one endpoint by its table name
    pub fn endpoint_for_table(&self, table_name: &TableName) -> Option<&EndpointConfig> {
        self.endpoints.iter().find(|e| &e.table_name == table_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(table: &str) -> EndpointConfig {
        EndpointConfig {
            enabled: true,
            path: format!("service/{}", table),
            table_name: TableName::new(table).unwrap(),
            canonical_table: TableName::new(table).unwrap(),
            pagination: PaginationConfig {
                strategy: PaginationStrategy::Page,
                page_size_default: 1000,
                page_size_max: 1000,
            },
            rate_limit_per_minute: 60,
            incremental_field: Some("last_updated".into()),
            ordering_field: "id".into(),
        }
    }

    #[test]
    fn page_size_is_clamped() {
        let pagination = PaginationConfig {
            strategy: PaginationStrategy::Offset,
            page_size_default: 100,
            page_size_max: 500,
        };
        assert_eq!(pagination.effective_page_size(None), 100);
        assert_eq!(pagination.effective_page_size(Some(9999)), 500);
        assert_eq!(pagination.effective_page_size(Some(0)), 1);
    }

    #[test]
    fn duplicate_table_names_are_rejected() {
        let catalog = EndpointCatalog {
            service: "psa".into(),
            endpoints: vec![endpoint("tickets"), endpoint("tickets")],
        };
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn invalid_page_size_range_is_rejected() {
        let mut bad = endpoint("tickets");
        bad.pagination.page_size_default = 2000;
        let catalog = EndpointCatalog {
            service: "psa".into(),
            endpoints: vec![bad],
        };
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn master_data_has_no_incremental_field() {
        let mut master = endpoint("companies");
        master.incremental_field = None;
        assert!(!master.is_incremental());
    }
}
