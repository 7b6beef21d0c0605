// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Watermark Repository
//!
//! `LastUpdated` journal table, keyed `(tenant_id, "{service}#{table}")`
//! with the watermark stored as an RFC 3339 string.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use ingest_pipeline_domain::repositories::WatermarkRepository;
use ingest_pipeline_domain::value_objects::{TableName, TenantId, Watermark};
use ingest_pipeline_domain::IngestError;

pub struct SqliteWatermarkRepository {
    pool: SqlitePool,
}

impl SqliteWatermarkRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn service_table(service: &str, table_name: &TableName) -> String {
        format!("{}#{}", service, table_name)
    }
}

#[async_trait]
impl WatermarkRepository for SqliteWatermarkRepository {
    async fn get(
        &self,
        tenant_id: &TenantId,
        service: &str,
        table_name: &TableName,
    ) -> Result<Option<Watermark>, IngestError> {
        let row = sqlx::query(
            "SELECT last_updated FROM last_updated WHERE tenant_id = ? AND service_table = ?",
        )
        .bind(tenant_id.as_str())
        .bind(Self::service_table(service, table_name))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            IngestError::journal(format!(
                "failed to read watermark for {}/{}/{}: {}",
                tenant_id, service, table_name, e
            ))
        })?;
        match row {
            Some(row) => {
                let value: String = row.get("last_updated");
                Ok(Some(Watermark::parse(&value)?))
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        tenant_id: &TenantId,
        service: &str,
        table_name: &TableName,
        watermark: &Watermark,
    ) -> Result<(), IngestError> {
        sqlx::query(
            "INSERT OR REPLACE INTO last_updated (tenant_id, service_table, last_updated) \
             VALUES (?, ?, ?)",
        )
        .bind(tenant_id.as_str())
        .bind(Self::service_table(service, table_name))
        .bind(watermark.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            IngestError::journal(format!(
                "failed to advance watermark for {}/{}/{}: {}",
                tenant_id, service, table_name, e
            ))
        })?;
        Ok(())
    }
}
