// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Tenant Repository
//!
//! Read-only view over the `TenantServices` journal table. The pipeline
//! never writes tenant configuration; the `seed_binding` helper exists for
//! operational bootstrapping and tests only.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use ingest_pipeline_domain::config::{ServiceBinding, TenantConfig};
use ingest_pipeline_domain::repositories::TenantRepository;
use ingest_pipeline_domain::value_objects::TenantId;
use ingest_pipeline_domain::IngestError;

pub struct SqliteTenantRepository {
    pool: SqlitePool,
}

impl SqliteTenantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upserts one (tenant, service) binding; bootstrap/test helper, not
    /// part of the repository port
    pub async fn seed_binding(
        &self,
        tenant_id: &TenantId,
        binding: &ServiceBinding,
    ) -> Result<(), IngestError> {
        let extras = serde_json::to_string(&binding.extras)
            .map_err(|e| IngestError::serialization(format!("extras unserializable: {}", e)))?;
        sqlx::query(
            "INSERT OR REPLACE INTO tenant_services \
             (tenant_id, service, enabled, credentials_secret_ref, extras) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(tenant_id.as_str())
        .bind(&binding.service)
        .bind(binding.enabled)
        .bind(&binding.credentials_secret_ref)
        .bind(&extras)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            IngestError::journal(format!("failed to seed binding for {}: {}", tenant_id, e))
        })?;
        Ok(())
    }

    fn binding_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ServiceBinding, IngestError> {
        let extras_raw: String = row.get("extras");
        let extras: HashMap<String, serde_json::Value> = serde_json::from_str(&extras_raw)
            .map_err(|e| IngestError::serialization(format!("binding extras unreadable: {}", e)))?;
        Ok(ServiceBinding {
            service: row.get("service"),
            enabled: row.get("enabled"),
            credentials_secret_ref: row.get("credentials_secret_ref"),
            extras,
        })
    }

    async fn load_tenant(&self, tenant_id: &TenantId) -> Result<Option<TenantConfig>, IngestError> {
        let rows = sqlx::query(
            "SELECT service, enabled, credentials_secret_ref, extras \
             FROM tenant_services WHERE tenant_id = ? ORDER BY service",
        )
        .bind(tenant_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IngestError::journal(format!("failed to read tenant {}: {}", tenant_id, e)))?;

        if rows.is_empty() {
            return Ok(None);
        }
        let services = rows
            .iter()
            .map(Self::binding_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let config = TenantConfig {
            tenant_id: tenant_id.clone(),
            services,
        };
        config.validate()?;
        Ok(Some(config))
    }
}

#[async_trait]
impl TenantRepository for SqliteTenantRepository {
    async fn find_by_id(&self, tenant_id: &TenantId) -> Result<Option<TenantConfig>, IngestError> {
        self.load_tenant(tenant_id).await
    }

    async fn list_with_enabled_services(&self) -> Result<Vec<TenantConfig>, IngestError> {
        let rows = sqlx::query(
            "SELECT DISTINCT tenant_id FROM tenant_services WHERE enabled = true ORDER BY tenant_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IngestError::journal(format!("failed to list tenants: {}", e)))?;

        let mut tenants = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: String = row.get("tenant_id");
            let tenant_id = TenantId::new(raw)?;
            if let Some(config) = self.load_tenant(&tenant_id).await? {
                if config.has_enabled_service() {
                    tenants.push(config);
                }
            }
        }
        Ok(tenants)
    }
}
