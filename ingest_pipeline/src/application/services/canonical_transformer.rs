// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Canonical Transformer
//!
//! Converts a list of raw object keys into a canonical record set and hands
//! it to the SCD sink. One invocation per (tenant, service, table), scheduled
//! by the tenant processor after every chunk of the table settled, or run
//! manually for repair.
//!
//! ## Fault Containment
//!
//! - A missing or unreadable raw object is a warning, not a failure; the
//!   invocation proceeds with the remaining files.
//! - A record that fails a coercion or lacks an `id` is skipped with a
//!   warning.
//! - A missing canonical mapping (or missing rules for the source system) is
//!   a `ConfigurationError` and fails the invocation; without rules nothing
//!   meaningful can be produced.
//!
//! ## Output
//!
//! The canonical record set is written as one snappy Parquet object under
//! the canonical key layout, then upserted through the sink. An empty record
//! set writes no object and touches no store.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{info, warn};

use ingest_pipeline_domain::config::{CanonicalMapping, ScdType, SourceMapping};
use ingest_pipeline_domain::entities::{CanonicalRecord, RecordMetadata};
use ingest_pipeline_domain::services::{BlobStore, MappingStore, RecordCodec, SinkStats};
use ingest_pipeline_domain::value_objects::{CanonicalObjectKey, TableName, TenantId};
use ingest_pipeline_domain::IngestError;

use crate::application::services::scd_sink::ScdSink;

/// Transforms raw objects into canonical records and loads them.
pub struct CanonicalTransformer {
    blobs: Arc<dyn BlobStore>,
    codec: Arc<dyn RecordCodec>,
    mappings: Arc<dyn MappingStore>,
    sink: Arc<ScdSink>,
}

impl CanonicalTransformer {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        codec: Arc<dyn RecordCodec>,
        mappings: Arc<dyn MappingStore>,
        sink: Arc<ScdSink>,
    ) -> Self {
        Self {
            blobs,
            codec,
            mappings,
            sink,
        }
    }

    /// Transforms `source_files` and upserts the result.
    pub async fn transform_and_load(
        &self,
        tenant_id: &TenantId,
        service: &str,
        table_name: &TableName,
        source_files: &[String],
    ) -> Result<SinkStats, IngestError> {
        let mapping = self
            .mappings
            .canonical_mapping(table_name)
            .await?
            .ok_or_else(|| {
                IngestError::configuration(format!(
                    "no canonical mapping for table '{}'",
                    table_name
                ))
            })?;
        let source = mapping.source_for(service).ok_or_else(|| {
            IngestError::configuration(format!(
                "mapping for '{}' has no rules for source '{}'",
                table_name, service
            ))
        })?;

        let ingested_at = Utc::now();
        let mut records = Vec::new();
        let mut skipped = 0u64;
        for key in source_files {
            let raw = match self.blobs.get(key).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    warn!(key = %key, "raw object missing, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "raw object unreadable, skipping");
                    continue;
                }
            };
            let rows = match self.codec.decode_records(&raw) {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(key = %key, error = %e, "raw object undecodable, skipping");
                    continue;
                }
            };
            for row in rows {
                match self.map_record(&row, &mapping, source, service, table_name, ingested_at) {
                    Some(record) => records.push(record),
                    None => skipped += 1,
                }
            }
        }

        if records.is_empty() {
            info!(
                tenant = %tenant_id,
                table = %table_name,
                files = source_files.len(),
                skipped,
                "transform produced no canonical records; nothing written"
            );
            return Ok(SinkStats::default());
        }

        let flat: Vec<Map<String, Value>> = records.iter().map(|r| r.to_flat_json()).collect();
        let bytes = self.codec.encode_records(&flat)?;
        let key = CanonicalObjectKey::build(tenant_id, table_name, ingested_at);
        self.blobs.put(key.as_str(), bytes).await?;
        info!(
            tenant = %tenant_id,
            table = %table_name,
            key = %key,
            records = records.len(),
            skipped,
            "canonical object written"
        );

        self.sink
            .apply(mapping.scd_type, table_name, tenant_id, &records)
            .await
    }

    /// Maps one raw record; `None` means skipped (counted by the caller).
    fn map_record(
        &self,
        row: &Map<String, Value>,
        mapping: &CanonicalMapping,
        source: &SourceMapping,
        service: &str,
        table_name: &TableName,
        ingested_at: chrono::DateTime<Utc>,
    ) -> Option<CanonicalRecord> {
        let mut business = Map::new();
        for rule in &source.field_rules {
            let Some(value) = row.get(&rule.source_field) else {
                continue;
            };
            let value = match &rule.coerce {
                Some(coercion) => match coercion.apply(value) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(
                            table = %table_name,
                            field = %rule.source_field,
                            error = %e,
                            "coercion failed, record skipped"
                        );
                        return None;
                    }
                },
                None => value.clone(),
            };
            business.insert(rule.canonical_field.clone(), value);
        }
        for (field, value) in &source.constants {
            business.insert(field.clone(), value.clone());
        }

        if !business
            .get("id")
            .map(|v| v.is_string() || v.is_number())
            .unwrap_or(false)
        {
            warn!(table = %table_name, "record without usable id, skipped");
            return None;
        }

        let record_hash = CanonicalRecord::compute_hash(&business);
        let metadata = match mapping.scd_type {
            ScdType::Type1 => RecordMetadata {
                source_system: service.to_string(),
                source_table: table_name.to_string(),
                canonical_table: mapping.canonical_table.to_string(),
                ingestion_timestamp: ingested_at,
                effective_start_date: None,
                expiration_date: None,
                is_current: None,
                record_hash,
                record_version: None,
            },
            // Sink may override version and effective dates against the
            // store's current row
            ScdType::Type2 => RecordMetadata {
                source_system: service.to_string(),
                source_table: table_name.to_string(),
                canonical_table: mapping.canonical_table.to_string(),
                ingestion_timestamp: ingested_at,
                effective_start_date: Some(ingested_at),
                expiration_date: None,
                is_current: Some(true),
                record_hash,
                record_version: Some(1),
            },
        };

        Some(CanonicalRecord { business, metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_pipeline_domain::config::{Coercion, FieldRule};
    use serde_json::json;
    use std::collections::HashMap;

    fn transformer_parts() -> (CanonicalMapping, SourceMapping) {
        let source = SourceMapping {
            field_rules: vec![
                FieldRule {
                    source_field: "id".into(),
                    canonical_field: "id".into(),
                    coerce: Some(Coercion::String),
                },
                FieldRule {
                    source_field: "lastUpdated".into(),
                    canonical_field: "last_updated".into(),
                    coerce: None,
                },
            ],
            constants: HashMap::from([("region".to_string(), json!("us"))]),
        };
        let mapping = CanonicalMapping {
            canonical_table: TableName::new("tickets").unwrap(),
            scd_type: ScdType::Type2,
            sources: HashMap::from([("psa".to_string(), source.clone())]),
        };
        (mapping, source)
    }

    fn dummy_transformer() -> CanonicalTransformer {
        // map_record is pure; the ports are never touched by these tests
        struct NoBlobs;
        #[async_trait::async_trait]
        impl BlobStore for NoBlobs {
            async fn put(&self, _: &str, _: Vec<u8>) -> Result<(), IngestError> {
                unreachable!()
            }
            async fn get(&self, _: &str) -> Result<Option<Vec<u8>>, IngestError> {
                unreachable!()
            }
            async fn exists(&self, _: &str) -> Result<bool, IngestError> {
                unreachable!()
            }
        }
        struct NoCodec;
        impl RecordCodec for NoCodec {
            fn encode_records(&self, _: &[Map<String, Value>]) -> Result<Vec<u8>, IngestError> {
                unreachable!()
            }
            fn decode_records(&self, _: &[u8]) -> Result<Vec<Map<String, Value>>, IngestError> {
                unreachable!()
            }
        }
        struct NoMappings;
        #[async_trait::async_trait]
        impl MappingStore for NoMappings {
            async fn endpoint_catalog(
                &self,
                _: &str,
            ) -> Result<Option<ingest_pipeline_domain::config::EndpointCatalog>, IngestError>
            {
                unreachable!()
            }
            async fn canonical_mapping(
                &self,
                _: &TableName,
            ) -> Result<Option<CanonicalMapping>, IngestError> {
                unreachable!()
            }
        }
        struct NoStore;
        #[async_trait::async_trait]
        impl ingest_pipeline_domain::services::AnalyticsStore for NoStore {
            async fn fetch_versions(
                &self,
                _: &TableName,
                _: &TenantId,
                _: &[String],
            ) -> Result<HashMap<String, String>, IngestError> {
                unreachable!()
            }
            async fn fetch_current_rows(
                &self,
                _: &TableName,
                _: &TenantId,
                _: &[String],
            ) -> Result<
                HashMap<String, ingest_pipeline_domain::services::CurrentVersionRow>,
                IngestError,
            > {
                unreachable!()
            }
            async fn insert_rows(
                &self,
                _: &TableName,
                _: &TenantId,
                _: &[CanonicalRecord],
            ) -> Result<(), IngestError> {
                unreachable!()
            }
            async fn update_rows(
                &self,
                _: &TableName,
                _: &TenantId,
                _: &[CanonicalRecord],
            ) -> Result<(), IngestError> {
                unreachable!()
            }
            async fn expire_current(
                &self,
                _: &TableName,
                _: &TenantId,
                _: &[String],
                _: chrono::DateTime<Utc>,
            ) -> Result<(), IngestError> {
                unreachable!()
            }
        }

        let metrics = crate::infrastructure::metrics::MetricsService::new().unwrap();
        CanonicalTransformer::new(
            Arc::new(NoBlobs),
            Arc::new(NoCodec),
            Arc::new(NoMappings),
            Arc::new(ScdSink::new(Arc::new(NoStore), metrics)),
        )
    }

    #[test]
    fn renames_coerces_and_adds_constants() {
        let (mapping, source) = transformer_parts();
        let transformer = dummy_transformer();
        let mut row = Map::new();
        row.insert("id".into(), json!(42));
        row.insert("lastUpdated".into(), json!("2025-01-02T00:00:00Z"));
        row.insert("ignored".into(), json!("noise"));

        let record = transformer
            .map_record(
                &row,
                &mapping,
                &source,
                "psa",
                &TableName::new("tickets").unwrap(),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(record.business.get("id"), Some(&json!("42")));
        assert_eq!(
            record.business.get("last_updated"),
            Some(&json!("2025-01-02T00:00:00Z"))
        );
        assert_eq!(record.business.get("region"), Some(&json!("us")));
        assert!(!record.business.contains_key("ignored"));
        assert_eq!(record.metadata.record_version, Some(1));
        assert_eq!(record.metadata.is_current, Some(true));
    }

    #[test]
    fn records_without_id_are_skipped() {
        let (mapping, source) = transformer_parts();
        let transformer = dummy_transformer();
        let mut row = Map::new();
        row.insert("lastUpdated".into(), json!("2025-01-02T00:00:00Z"));
        assert!(transformer
            .map_record(
                &row,
                &mapping,
                &source,
                "psa",
                &TableName::new("tickets").unwrap(),
                Utc::now(),
            )
            .is_none());
    }

    #[test]
    fn hash_excludes_metadata_columns() {
        let (mapping, source) = transformer_parts();
        let transformer = dummy_transformer();
        let mut row = Map::new();
        row.insert("id".into(), json!("t1"));
        row.insert("lastUpdated".into(), json!("2025-01-02T00:00:00Z"));

        let a = transformer
            .map_record(
                &row,
                &mapping,
                &source,
                "psa",
                &TableName::new("tickets").unwrap(),
                Utc::now(),
            )
            .unwrap();
        let b = transformer
            .map_record(
                &row,
                &mapping,
                &source,
                "psa",
                &TableName::new("tickets").unwrap(),
                Utc::now() + chrono::Duration::seconds(5),
            )
            .unwrap();
        assert_eq!(a.metadata.record_hash, b.metadata.record_hash);
    }
}
