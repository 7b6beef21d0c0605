// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # ClickHouse Analytics Store
//!
//! [`AnalyticsStore`] implementation over the ClickHouse HTTP client.
//!
//! Canonical tables are expected to use a collapsing engine
//! (ReplacingMergeTree-style) partitioned by `(tenant_id, toDate(...))` with
//! a sort key beginning `tenant_id, id, <version column>`, so background
//! merges deduplicate on the version column (`last_updated` for type-1
//! tables, `record_version` for type-2). Timestamp columns are
//! `DateTime64(3)`; values arrive as RFC 3339 strings and server-side
//! `parseDateTimeBestEffort` handles the conversion where SQL needs a typed
//! value.
//!
//! Canonical tables have per-table columns, so inserts are built as SQL
//! text with escaped literals (the union of row columns, absent values as
//! NULL). Lookups select fixed column sets and decode through typed rows.
//! Every operation is scoped by `tenant_id`; tenant isolation is a query
//! discipline here, not a storage property.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse::{Client, Row};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use ingest_pipeline_domain::entities::CanonicalRecord;
use ingest_pipeline_domain::services::{AnalyticsStore, CurrentVersionRow};
use ingest_pipeline_domain::value_objects::{TableName, TenantId};
use ingest_pipeline_domain::IngestError;

#[derive(Debug, Clone)]
pub struct ClickHouseSettings {
    pub url: String,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl Default for ClickHouseSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".into(),
            database: "canonical".into(),
            user: "default".into(),
            password: String::new(),
        }
    }
}

#[derive(Row, Deserialize)]
struct VersionRow {
    id: String,
    version: String,
}

#[derive(Row, Deserialize)]
struct CurrentRow {
    id: String,
    record_hash: String,
    record_version: u32,
}

pub struct ClickHouseStore {
    client: Client,
}

impl ClickHouseStore {
    pub fn new(settings: &ClickHouseSettings) -> Self {
        let client = Client::default()
            .with_url(&settings.url)
            .with_database(&settings.database)
            .with_user(&settings.user)
            .with_password(&settings.password);
        Self { client }
    }

    fn map_error(context: &str, error: clickhouse::error::Error) -> IngestError {
        match error {
            clickhouse::error::Error::Network(_) => {
                IngestError::transient(format!("{}: {}", context, error))
            }
            other => IngestError::unexpected(format!("{}: {}", context, other)),
        }
    }

    fn quote(s: &str) -> String {
        format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
    }

    /// SQL literal for one JSON value
    fn literal(value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "1".to_string(),
            Value::Bool(false) => "0".to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => Self::quote(s),
            other => Self::quote(&other.to_string()),
        }
    }

    fn id_list(ids: &[String]) -> String {
        ids.iter()
            .map(|id| Self::quote(id))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[async_trait]
impl AnalyticsStore for ClickHouseStore {
    async fn fetch_versions(
        &self,
        table: &TableName,
        tenant_id: &TenantId,
        ids: &[String],
    ) -> Result<HashMap<String, String>, IngestError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        // max() per id keeps the lookup correct against not-yet-merged
        // duplicate rows. The rendered form must be RFC 3339: a bare
        // toString() on DateTime64 yields the space-separated form, which
        // the sink's version comparison would misorder against source
        // timestamps.
        let sql = format!(
            "SELECT id, formatDateTime(max(last_updated), '%Y-%m-%dT%H:%i:%SZ', 'UTC') AS version \
             FROM {table} \
             WHERE tenant_id = {tenant} AND id IN ({ids}) GROUP BY id",
            table = table,
            tenant = Self::quote(tenant_id.as_str()),
            ids = Self::id_list(ids),
        );
        let rows: Vec<VersionRow> = self
            .client
            .query(&sql)
            .fetch_all()
            .await
            .map_err(|e| Self::map_error("version lookup failed", e))?;
        Ok(rows.into_iter().map(|r| (r.id, r.version)).collect())
    }

    async fn fetch_current_rows(
        &self,
        table: &TableName,
        tenant_id: &TenantId,
        ids: &[String],
    ) -> Result<HashMap<String, CurrentVersionRow>, IngestError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT id, record_hash, record_version FROM {table} \
             WHERE tenant_id = {tenant} AND id IN ({ids}) \
             AND is_current = 1 AND expiration_date IS NULL \
             ORDER BY record_version DESC",
            table = table,
            tenant = Self::quote(tenant_id.as_str()),
            ids = Self::id_list(ids),
        );
        let rows: Vec<CurrentRow> = self
            .client
            .query(&sql)
            .fetch_all()
            .await
            .map_err(|e| Self::map_error("current-row lookup failed", e))?;

        // Highest record_version wins when merges have not collapsed yet
        let mut current = HashMap::new();
        for row in rows {
            current.entry(row.id.clone()).or_insert(CurrentVersionRow {
                id: row.id,
                record_hash: row.record_hash,
                record_version: row.record_version,
            });
        }
        Ok(current)
    }

    async fn insert_rows(
        &self,
        table: &TableName,
        tenant_id: &TenantId,
        rows: &[CanonicalRecord],
    ) -> Result<(), IngestError> {
        if rows.is_empty() {
            return Ok(());
        }
        let flats: Vec<serde_json::Map<String, Value>> =
            rows.iter().map(|r| r.to_flat_json()).collect();
        let mut columns: BTreeSet<String> = flats.iter().flat_map(|f| f.keys().cloned()).collect();
        columns.insert("tenant_id".to_string());
        let column_list = columns.iter().cloned().collect::<Vec<_>>().join(", ");

        let values = flats
            .iter()
            .map(|flat| {
                let row = columns
                    .iter()
                    .map(|column| {
                        if column == "tenant_id" {
                            Self::quote(tenant_id.as_str())
                        } else {
                            flat.get(column).map(Self::literal).unwrap_or_else(|| "NULL".into())
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({})", row)
            })
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!("INSERT INTO {} ({}) VALUES {}", table, column_list, values);
        debug!(table = %table, rows = rows.len(), "inserting canonical rows");
        self.client
            .query(&sql)
            .execute()
            .await
            .map_err(|e| Self::map_error("insert failed", e))
    }

    async fn update_rows(
        &self,
        table: &TableName,
        tenant_id: &TenantId,
        rows: &[CanonicalRecord],
    ) -> Result<(), IngestError> {
        // ALTER UPDATE is heavy but gives type-1 read-after-write
        // correctness; merge-tolerant deployments can disable the update
        // path operationally and lean on the collapsing engine
        for record in rows {
            let Some(id) = record.id() else { continue };
            let assignments = record
                .business
                .iter()
                .filter(|(field, _)| field.as_str() != "id")
                .map(|(field, value)| format!("{} = {}", field, Self::literal(value)))
                .chain(std::iter::once(format!(
                    "record_hash = {}",
                    Self::quote(&record.metadata.record_hash)
                )))
                .chain(std::iter::once(format!(
                    "ingestion_timestamp = parseDateTimeBestEffort({})",
                    Self::quote(&record.metadata.ingestion_timestamp.to_rfc3339())
                )))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "ALTER TABLE {table} UPDATE {assignments} \
                 WHERE tenant_id = {tenant} AND id = {id}",
                table = table,
                assignments = assignments,
                tenant = Self::quote(tenant_id.as_str()),
                id = Self::quote(&id),
            );
            self.client
                .query(&sql)
                .execute()
                .await
                .map_err(|e| Self::map_error("in-place update failed", e))?;
        }
        Ok(())
    }

    async fn expire_current(
        &self,
        table: &TableName,
        tenant_id: &TenantId,
        ids: &[String],
        expired_at: DateTime<Utc>,
    ) -> Result<(), IngestError> {
        if ids.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "ALTER TABLE {table} UPDATE is_current = 0, \
             expiration_date = parseDateTimeBestEffort({ts}) \
             WHERE tenant_id = {tenant} AND id IN ({ids}) AND is_current = 1",
            table = table,
            ts = Self::quote(&expired_at.to_rfc3339()),
            tenant = Self::quote(tenant_id.as_str()),
            ids = Self::id_list(ids),
        );
        self.client
            .query(&sql)
            .execute()
            .await
            .map_err(|e| Self::map_error("expiration failed", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literals_are_escaped() {
        assert_eq!(ClickHouseStore::literal(&json!("plain")), "'plain'");
        assert_eq!(
            ClickHouseStore::literal(&json!("it's ok")),
            "'it\\'s ok'"
        );
        assert_eq!(ClickHouseStore::literal(&json!(42)), "42");
        assert_eq!(ClickHouseStore::literal(&json!(true)), "1");
        assert_eq!(ClickHouseStore::literal(&Value::Null), "NULL");
    }

    #[test]
    fn nested_values_store_as_json_strings() {
        let literal = ClickHouseStore::literal(&json!({"a": 1}));
        assert!(literal.starts_with('\''));
        assert!(literal.contains("{\"a\":1}"));
    }

    #[test]
    fn id_lists_quote_every_entry() {
        let list = ClickHouseStore::id_list(&["a".into(), "b'c".into()]);
        assert_eq!(list, "'a', 'b\\'c'");
    }
}
