// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SCD-Aware Sink
//!
//! Upserts one canonical record batch into the analytics store honoring the
//! table's slowly-changing-dimension type. The `scd_type` tag of the mapping
//! selects the strategy; there is no per-record dispatch.
//!
//! ## Type 1 (overwrite)
//!
//! Records are grouped by id, existing versions are batch-fetched, and each
//! input classifies as NEW (insert), UPDATE (existing version strictly older)
//! or SKIP. Updates touch mutable columns in place.
//!
//! ## Type 2 (versioning)
//!
//! The current row per id is fetched and compared through `record_hash`
//! (business fields only). Identical content skips; changed content expires
//! the current row and inserts `record_version + 1`; absent ids insert
//! version 1. Expirations and inserts are grouped into one request batch
//! each, best effort: a crash between them leaves rows the engine's
//! collapsing merge corrects, and readers filter on
//! `is_current = true AND expiration_date IS NULL` meanwhile.
//!
//! ## Idempotence
//!
//! Replaying the same batch classifies every record as SKIP, so repeated
//! loads of the same raw file converge to the same row set under both
//! types. The engine-level dedup on the version column is the safety net
//! beneath that.
//!
//! A `SinkConflict` from the store is retried once, then escalated to
//! `TransientExternal` for the caller's retry policy.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use ingest_pipeline_domain::config::ScdType;
use ingest_pipeline_domain::entities::CanonicalRecord;
use ingest_pipeline_domain::services::{AnalyticsStore, SinkStats};
use ingest_pipeline_domain::value_objects::{TableName, TenantId};
use ingest_pipeline_domain::IngestError;

use crate::infrastructure::metrics::MetricsService;

/// Applies canonical batches to the analytics store with SCD semantics.
pub struct ScdSink {
    store: Arc<dyn AnalyticsStore>,
    metrics: MetricsService,
}

impl ScdSink {
    pub fn new(store: Arc<dyn AnalyticsStore>, metrics: MetricsService) -> Self {
        Self { store, metrics }
    }

    /// Upserts `batch` into `table` under the given SCD type.
    ///
    /// Records without an `id` never reach this point; the transformer
    /// skips them with a warning.
    pub async fn apply(
        &self,
        scd_type: ScdType,
        table: &TableName,
        tenant_id: &TenantId,
        batch: &[CanonicalRecord],
    ) -> Result<SinkStats, IngestError> {
        if batch.is_empty() {
            return Ok(SinkStats::default());
        }
        let deduped = Self::latest_per_id(batch);
        let stats = match scd_type {
            ScdType::Type1 => self.apply_type1(table, tenant_id, &deduped).await?,
            ScdType::Type2 => self.apply_type2(table, tenant_id, &deduped).await?,
        };
        self.metrics.sink_applied(&stats);
        info!(
            table = %table,
            tenant = %tenant_id,
            scd = scd_type.as_str(),
            inserted = stats.inserted,
            updated = stats.updated,
            versioned = stats.versioned,
            skipped = stats.skipped,
            "sink batch applied"
        );
        Ok(stats)
    }

    /// Collapses the batch to one record per id, keeping the newest by the
    /// version column; the sink processes each id atomically and must not
    /// interleave two versions of the same record within one invocation.
    fn latest_per_id(batch: &[CanonicalRecord]) -> Vec<CanonicalRecord> {
        let mut by_id: HashMap<String, CanonicalRecord> = HashMap::new();
        for record in batch {
            let Some(id) = record.id() else { continue };
            match by_id.get(&id) {
                Some(existing)
                    if !Self::version_older(
                        existing.version_value().as_deref(),
                        record.version_value().as_deref(),
                    ) => {}
                _ => {
                    by_id.insert(id, record.clone());
                }
            }
        }
        let mut records: Vec<CanonicalRecord> = by_id.into_values().collect();
        records.sort_by_key(|r| r.id());
        records
    }

    /// Whether `existing` is strictly older than `candidate`.
    ///
    /// Both sides are normalized through [`Self::parse_version_instant`]
    /// before comparing, so the store's rendering of the version column and
    /// the source's RFC 3339 strings order consistently; an identical
    /// instant in two renderings must classify as SKIP, never UPDATE. Only
    /// when neither side parses do strings compare directly. An absent
    /// version on either side is treated as not-older (SKIP wins on ties
    /// and unknowns).
    fn version_older(existing: Option<&str>, candidate: Option<&str>) -> bool {
        let (Some(existing), Some(candidate)) = (existing, candidate) else {
            return false;
        };
        match (
            Self::parse_version_instant(existing),
            Self::parse_version_instant(candidate),
        ) {
            (Some(a), Some(b)) => a < b,
            _ => existing < candidate,
        }
    }

    /// Parses a version-column value as an instant.
    ///
    /// Accepts RFC 3339 and the space-separated `YYYY-MM-DD HH:MM:SS[.fff]`
    /// form columnar stores render for DateTime columns (taken as UTC).
    fn parse_version_instant(value: &str) -> Option<chrono::DateTime<Utc>> {
        if let Ok(instant) = chrono::DateTime::parse_from_rfc3339(value) {
            return Some(instant.with_timezone(&Utc));
        }
        chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    async fn apply_type1(
        &self,
        table: &TableName,
        tenant_id: &TenantId,
        batch: &[CanonicalRecord],
    ) -> Result<SinkStats, IngestError> {
        let ids: Vec<String> = batch.iter().filter_map(|r| r.id()).collect();
        let existing = self
            .with_conflict_retry(|| self.store.fetch_versions(table, tenant_id, &ids))
            .await?;

        let mut inserts = Vec::new();
        let mut updates = Vec::new();
        let mut skipped = 0u64;
        for record in batch {
            let Some(id) = record.id() else { continue };
            match existing.get(&id) {
                None => inserts.push(record.clone()),
                Some(current_version) => {
                    if Self::version_older(
                        Some(current_version.as_str()),
                        record.version_value().as_deref(),
                    ) {
                        updates.push(record.clone());
                    } else {
                        skipped += 1;
                    }
                }
            }
        }
        debug!(
            table = %table,
            new = inserts.len(),
            update = updates.len(),
            skip = skipped,
            "type-1 batch classified"
        );

        if !inserts.is_empty() {
            self.with_conflict_retry(|| self.store.insert_rows(table, tenant_id, &inserts))
                .await?;
        }
        if !updates.is_empty() {
            self.with_conflict_retry(|| self.store.update_rows(table, tenant_id, &updates))
                .await?;
        }

        Ok(SinkStats {
            inserted: inserts.len() as u64,
            updated: updates.len() as u64,
            versioned: 0,
            skipped,
        })
    }

    async fn apply_type2(
        &self,
        table: &TableName,
        tenant_id: &TenantId,
        batch: &[CanonicalRecord],
    ) -> Result<SinkStats, IngestError> {
        let ids: Vec<String> = batch.iter().filter_map(|r| r.id()).collect();
        let current = self
            .with_conflict_retry(|| self.store.fetch_current_rows(table, tenant_id, &ids))
            .await?;

        let now = Utc::now();
        let mut expire_ids = Vec::new();
        let mut inserts = Vec::new();
        let mut inserted = 0u64;
        let mut versioned = 0u64;
        let mut skipped = 0u64;

        for record in batch {
            let Some(id) = record.id() else { continue };
            match current.get(&id) {
                None => {
                    inserts.push(Self::as_version(record, 1, now));
                    inserted += 1;
                }
                Some(row) if record.business_equals(&row.record_hash) => {
                    skipped += 1;
                }
                Some(row) => {
                    expire_ids.push(id);
                    inserts.push(Self::as_version(record, row.record_version + 1, now));
                    versioned += 1;
                }
            }
        }
        debug!(
            table = %table,
            insert = inserted,
            version = versioned,
            skip = skipped,
            "type-2 batch classified"
        );

        // Expire-then-insert, grouped per phase; see module docs for the
        // crash window and how readers stay correct through it
        if !expire_ids.is_empty() {
            self.with_conflict_retry(|| {
                self.store.expire_current(table, tenant_id, &expire_ids, now)
            })
            .await?;
        }
        if !inserts.is_empty() {
            self.with_conflict_retry(|| self.store.insert_rows(table, tenant_id, &inserts))
                .await?;
        }

        Ok(SinkStats {
            inserted,
            updated: 0,
            versioned,
            skipped,
        })
    }

    /// Stamps the SCD type-2 metadata for a row entering as `version`
    fn as_version(
        record: &CanonicalRecord,
        version: u32,
        now: chrono::DateTime<Utc>,
    ) -> CanonicalRecord {
        let mut row = record.clone();
        row.metadata.record_version = Some(version);
        row.metadata.is_current = Some(true);
        row.metadata.effective_start_date = Some(now);
        row.metadata.expiration_date = None;
        row
    }

    /// Runs a store operation, retrying one conflict before escalating
    async fn with_conflict_retry<T, F, Fut>(&self, mut op: F) -> Result<T, IngestError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, IngestError>>,
    {
        match op().await {
            Err(IngestError::SinkConflict(first)) => {
                debug!(error = %first, "sink conflict, retrying once");
                op().await.map_err(|e| match e {
                    IngestError::SinkConflict(msg) => IngestError::transient(format!(
                        "sink conflict persisted after retry: {}",
                        msg
                    )),
                    other => other,
                })
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_pipeline_domain::entities::RecordMetadata;
    use serde_json::{json, Map, Value};

    fn record(id: &str, last_updated: &str) -> CanonicalRecord {
        let mut business = Map::new();
        business.insert("id".into(), json!(id));
        business.insert("last_updated".into(), json!(last_updated));
        let record_hash = CanonicalRecord::compute_hash(&business);
        CanonicalRecord {
            business,
            metadata: RecordMetadata {
                source_system: "psa".into(),
                source_table: "tickets".into(),
                canonical_table: "tickets".into(),
                ingestion_timestamp: Utc::now(),
                effective_start_date: None,
                expiration_date: None,
                is_current: None,
                record_hash,
                record_version: None,
            },
        }
    }

    #[test]
    fn version_comparison_is_strict() {
        assert!(ScdSink::version_older(
            Some("2025-01-01T00:00:00Z"),
            Some("2025-01-02T00:00:00Z")
        ));
        assert!(!ScdSink::version_older(
            Some("2025-01-02T00:00:00Z"),
            Some("2025-01-02T00:00:00Z")
        ));
        assert!(!ScdSink::version_older(
            Some("2025-01-03T00:00:00Z"),
            Some("2025-01-02T00:00:00Z")
        ));
        assert!(!ScdSink::version_older(None, Some("2025-01-02T00:00:00Z")));
    }

    #[test]
    fn version_comparison_spans_datetime_renderings() {
        // Stores render DateTime columns space-separated; the same instant
        // in either form is a tie and must classify as SKIP
        assert!(!ScdSink::version_older(
            Some("2025-01-04 12:30:05"),
            Some("2025-01-04T12:30:05Z")
        ));
        assert!(!ScdSink::version_older(
            Some("2025-01-04 12:30:05.000"),
            Some("2025-01-04T12:30:05Z")
        ));
        assert!(ScdSink::version_older(
            Some("2025-01-04 12:30:05"),
            Some("2025-01-04T12:30:06Z")
        ));
        assert!(!ScdSink::version_older(
            Some("2025-01-04 12:30:07"),
            Some("2025-01-04T12:30:06Z")
        ));
    }

    #[test]
    fn version_instants_parse_both_forms() {
        let rfc = ScdSink::parse_version_instant("2025-01-04T12:30:05Z").unwrap();
        let spaced = ScdSink::parse_version_instant("2025-01-04 12:30:05").unwrap();
        let fractional = ScdSink::parse_version_instant("2025-01-04 12:30:05.000").unwrap();
        assert_eq!(rfc, spaced);
        assert_eq!(rfc, fractional);
        assert!(ScdSink::parse_version_instant("not a timestamp").is_none());
    }

    #[test]
    fn batch_collapses_to_newest_version_per_id() {
        let batch = vec![
            record("t1", "2025-01-02T00:00:00Z"),
            record("t1", "2025-01-04T00:00:00Z"),
            record("t2", "2025-01-03T00:00:00Z"),
        ];
        let deduped = ScdSink::latest_per_id(&batch);
        assert_eq!(deduped.len(), 2);
        let t1 = deduped.iter().find(|r| r.id().as_deref() == Some("t1")).unwrap();
        assert_eq!(
            t1.business.get("last_updated"),
            Some(&Value::String("2025-01-04T00:00:00Z".into()))
        );
    }

    #[test]
    fn records_without_ids_are_dropped() {
        let mut anonymous = record("x", "2025-01-01T00:00:00Z");
        anonymous.business.remove("id");
        let deduped = ScdSink::latest_per_id(&[anonymous]);
        assert!(deduped.is_empty());
    }
}
