// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tenant Configuration
//!
//! Strongly-typed tenant bindings: which services a tenant has enabled and
//! where its credentials live. Instead of open-ended dynamic records, the
//! schema is fixed with an explicit `extras` map for the handful of
//! per-tenant overrides (page size, rate limit) that operators actually set.
//! Everything is validated at load time; the pipeline treats tenant
//! configuration as read-only.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value_objects::TenantId;
use crate::IngestError;

/// Extras key for a per-tenant page-size override.
pub const EXTRA_PAGE_SIZE: &str = "page_size";
/// Extras key for a per-tenant rate-limit override (requests per minute).
pub const EXTRA_RATE_LIMIT: &str = "rate_limit_per_minute";

/// One (tenant, service) binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceBinding {
    pub service: String,
    pub enabled: bool,
    /// Opaque reference resolved through the secrets store
    pub credentials_secret_ref: String,
    /// Per-tenant overrides; unknown keys are rejected at validation
    #[serde(default)]
    pub extras: HashMap<String, Value>,
}

impl ServiceBinding {
    /// Page-size override, when present and sensible
    pub fn page_size_override(&self) -> Option<u32> {
        self.extras
            .get(EXTRA_PAGE_SIZE)
            .and_then(Value::as_u64)
            .map(|v| v as u32)
    }

    /// Rate-limit override in requests per minute, when present
    pub fn rate_limit_override(&self) -> Option<u32> {
        self.extras
            .get(EXTRA_RATE_LIMIT)
            .and_then(Value::as_u64)
            .map(|v| v as u32)
    }

    fn validate(&self) -> Result<(), IngestError> {
        if self.service.trim().is_empty() {
            return Err(IngestError::configuration("service binding with empty service name"));
        }
        if self.enabled && self.credentials_secret_ref.trim().is_empty() {
            return Err(IngestError::configuration(format!(
                "enabled service '{}' has no credentials_secret_ref",
                self.service
            )));
        }
        for key in self.extras.keys() {
            if key != EXTRA_PAGE_SIZE && key != EXTRA_RATE_LIMIT {
                return Err(IngestError::configuration(format!(
                    "unknown extras key '{}' on service '{}'",
                    key, self.service
                )));
            }
        }
        Ok(())
    }
}

/// Full configuration of one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: TenantId,
    #[serde(default)]
    pub services: Vec<ServiceBinding>,
}

impl TenantConfig {
    /// Validates every binding; called once at load time
    pub fn validate(&self) -> Result<(), IngestError> {
        for binding in &self.services {
            binding.validate()?;
        }
        Ok(())
    }

    /// Iterates the enabled service bindings
    pub fn enabled_services(&self) -> impl Iterator<Item = &ServiceBinding> {
        self.services.iter().filter(|b| b.enabled)
    }

    /// Whether this tenant participates in multi-tenant runs
    pub fn has_enabled_service(&self) -> bool {
        self.services.iter().any(|b| b.enabled)
    }

    /// Finds the binding for one service, enabled or not
    pub fn binding_for(&self, service: &str) -> Option<&ServiceBinding> {
        self.services.iter().find(|b| b.service == service)
    }
}
