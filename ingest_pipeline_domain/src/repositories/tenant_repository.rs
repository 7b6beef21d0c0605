// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Port for the `TenantServices` journal table (read-only).

use async_trait::async_trait;

use crate::config::TenantConfig;
use crate::value_objects::TenantId;
use crate::IngestError;

/// Read-only access to tenant configuration.
#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Reads one tenant's configuration
    async fn find_by_id(&self, tenant_id: &TenantId) -> Result<Option<TenantConfig>, IngestError>;

    /// Lists every tenant with at least one enabled service
    ///
    /// This is the multi-tenant fan-out set.
    async fn list_with_enabled_services(&self) -> Result<Vec<TenantConfig>, IngestError>;
}
