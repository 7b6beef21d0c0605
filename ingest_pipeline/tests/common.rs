// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Common Test Helpers
//!
//! Shared fixtures for the end-to-end pipeline tests: a scripted page
//! fetcher standing in for the source API, an in-memory analytics store
//! with SCD-aware assertions, and a harness that wires the real journal
//! (SQLite in memory), the real Parquet codec, and the real in-memory
//! object store through the full processing hierarchy.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use ingest_pipeline_bootstrap::CancellationToken;
use ingest_pipeline_domain::config::{CanonicalMapping, EndpointCatalog, ScdType};
use ingest_pipeline_domain::entities::CanonicalRecord;
use ingest_pipeline_domain::repositories::{
    ChunkJournal, JobRepository, TenantRepository, WatermarkRepository,
};
use ingest_pipeline_domain::services::{
    AnalyticsStore, BlobStore, CurrentVersionRow, MappingStore, PageFetcher, PageQuery,
    RecordCodec, SourceCredentials, SourcePage,
};
use ingest_pipeline_domain::value_objects::{TableName, TenantId};
use ingest_pipeline_domain::IngestError;

use ingest_pipeline::infrastructure::adapters::{ObjectStoreAdapter, StaticSecretsProvider};
use ingest_pipeline::infrastructure::adapters::mapping_store_adapter::BlobMappingStore;
use ingest_pipeline::infrastructure::metrics::MetricsService;
use ingest_pipeline::infrastructure::repositories::{
    schema, SqliteChunkJournal, SqliteJobRepository, SqliteTenantRepository,
    SqliteWatermarkRepository,
};
use ingest_pipeline::infrastructure::runtime::{Deadline, RetryPolicy};
use ingest_pipeline::infrastructure::services::ParquetRecordCodec;
use ingest_pipeline::{
    CanonicalTransformer, ChunkProcessor, ChunkSettings, OrchestratorSettings,
    PipelineOrchestrator, ResumeChunkUseCase, RunContext, ScdSink, TableProcessor, TableSettings,
    TenantProcessor,
};

pub const SECRET_REF: &str = "secret/test/psa";

/// Scripted source API: pages pop in order per endpoint path; an exhausted
/// script returns the empty page that signals end of data.
pub struct ScriptedPageFetcher {
    pages: Mutex<HashMap<String, VecDeque<Result<SourcePage, IngestError>>>>,
    fetches: AtomicU64,
    /// Cancel this token after N fetches (deterministic budget exhaustion)
    cancel_after: Mutex<Option<(u64, CancellationToken)>>,
}

impl ScriptedPageFetcher {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            fetches: AtomicU64::new(0),
            cancel_after: Mutex::new(None),
        }
    }

    pub fn page(records: Vec<Value>) -> SourcePage {
        let mut maps = Vec::new();
        let mut malformed = 0;
        for record in records {
            match record {
                Value::Object(map) => maps.push(map),
                _ => malformed += 1,
            }
        }
        SourcePage {
            records: maps,
            malformed,
            latency_ms: 5,
            body_bytes: 128,
        }
    }

    pub fn script_page(&self, path: &str, records: Vec<Value>) {
        self.pages
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(Ok(Self::page(records)));
    }

    pub fn script_error(&self, path: &str, error: IngestError) {
        self.pages
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(Err(error));
    }

    pub fn cancel_after(&self, fetches: u64, token: CancellationToken) {
        *self.cancel_after.lock() = Some((fetches, token));
    }

    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for ScriptedPageFetcher {
    async fn fetch_page(
        &self,
        _service: &str,
        _credentials: &SourceCredentials,
        query: &PageQuery,
    ) -> Result<SourcePage, IngestError> {
        let count = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = self.cancel_after.lock().as_ref() {
            if count >= *limit {
                token.cancel();
            }
        }
        let next = self
            .pages
            .lock()
            .get_mut(&query.endpoint_path)
            .and_then(VecDeque::pop_front);
        match next {
            Some(result) => result,
            None => Ok(SourcePage {
                records: vec![],
                malformed: 0,
                latency_ms: 1,
                body_bytes: 2,
            }),
        }
    }
}

/// One row as the fake analytics store holds it.
#[derive(Debug, Clone)]
pub struct StoredRow {
    pub id: String,
    pub record: CanonicalRecord,
    pub is_current: bool,
    pub expiration: Option<DateTime<Utc>>,
}

/// In-memory analytics store keyed by (table, tenant).
#[derive(Default)]
pub struct InMemoryAnalyticsStore {
    rows: Mutex<HashMap<(String, String), Vec<StoredRow>>>,
    conflict_on_next_insert: AtomicBool,
}

impl InMemoryAnalyticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_insert_with_conflict(&self) {
        self.conflict_on_next_insert.store(true, Ordering::SeqCst);
    }

    fn key(table: &TableName, tenant_id: &TenantId) -> (String, String) {
        (table.to_string(), tenant_id.to_string())
    }

    pub fn row_count(&self, table: &TableName, tenant_id: &TenantId) -> usize {
        self.rows
            .lock()
            .get(&Self::key(table, tenant_id))
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn rows_for(&self, table: &TableName, tenant_id: &TenantId, id: &str) -> Vec<StoredRow> {
        self.rows
            .lock()
            .get(&Self::key(table, tenant_id))
            .map(|rows| rows.iter().filter(|r| r.id == id).cloned().collect())
            .unwrap_or_default()
    }

    pub fn current_rows_for(
        &self,
        table: &TableName,
        tenant_id: &TenantId,
        id: &str,
    ) -> Vec<StoredRow> {
        self.rows_for(table, tenant_id, id)
            .into_iter()
            .filter(|r| r.is_current && r.expiration.is_none())
            .collect()
    }
}

#[async_trait]
impl AnalyticsStore for InMemoryAnalyticsStore {
    async fn fetch_versions(
        &self,
        table: &TableName,
        tenant_id: &TenantId,
        ids: &[String],
    ) -> Result<HashMap<String, String>, IngestError> {
        let rows = self.rows.lock();
        let mut versions = HashMap::new();
        if let Some(stored) = rows.get(&Self::key(table, tenant_id)) {
            for row in stored {
                if !ids.contains(&row.id) {
                    continue;
                }
                if let Some(version) = row.record.version_value() {
                    versions
                        .entry(row.id.clone())
                        .and_modify(|existing: &mut String| {
                            if *existing < version {
                                *existing = version.clone();
                            }
                        })
                        .or_insert(version);
                }
            }
        }
        Ok(versions)
    }

    async fn fetch_current_rows(
        &self,
        table: &TableName,
        tenant_id: &TenantId,
        ids: &[String],
    ) -> Result<HashMap<String, CurrentVersionRow>, IngestError> {
        let rows = self.rows.lock();
        let mut current = HashMap::new();
        if let Some(stored) = rows.get(&Self::key(table, tenant_id)) {
            for row in stored {
                if !ids.contains(&row.id) || !row.is_current || row.expiration.is_some() {
                    continue;
                }
                let version = row.record.metadata.record_version.unwrap_or(1);
                let entry = current.entry(row.id.clone()).or_insert(CurrentVersionRow {
                    id: row.id.clone(),
                    record_hash: row.record.metadata.record_hash.clone(),
                    record_version: version,
                });
                if version > entry.record_version {
                    entry.record_hash = row.record.metadata.record_hash.clone();
                    entry.record_version = version;
                }
            }
        }
        Ok(current)
    }

    async fn insert_rows(
        &self,
        table: &TableName,
        tenant_id: &TenantId,
        rows: &[CanonicalRecord],
    ) -> Result<(), IngestError> {
        if self.conflict_on_next_insert.swap(false, Ordering::SeqCst) {
            return Err(IngestError::sink_conflict("simulated write collision"));
        }
        let mut stored = self.rows.lock();
        let entry = stored.entry(Self::key(table, tenant_id)).or_default();
        for record in rows {
            let Some(id) = record.id() else { continue };
            entry.push(StoredRow {
                id,
                record: record.clone(),
                is_current: record.metadata.is_current.unwrap_or(true),
                expiration: record.metadata.expiration_date,
            });
        }
        Ok(())
    }

    async fn update_rows(
        &self,
        table: &TableName,
        tenant_id: &TenantId,
        rows: &[CanonicalRecord],
    ) -> Result<(), IngestError> {
        let mut stored = self.rows.lock();
        let entry = stored.entry(Self::key(table, tenant_id)).or_default();
        for record in rows {
            let Some(id) = record.id() else { continue };
            for row in entry.iter_mut().filter(|r| r.id == id) {
                row.record = record.clone();
            }
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
        let mut stored = self.rows.lock();
        if let Some(entry) = stored.get_mut(&Self::key(table, tenant_id)) {
            for row in entry.iter_mut() {
                if ids.contains(&row.id) && row.is_current {
                    row.is_current = false;
                    row.expiration = Some(expired_at);
                }
            }
        }
        Ok(())
    }
}

/// Counts canonical-mapping lookups: one per transform invocation, which is
/// how the duplicate-trigger tests observe scheduling.
pub struct CountingMappingStore {
    inner: BlobMappingStore,
    mapping_lookups: AtomicU64,
}

impl CountingMappingStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            inner: BlobMappingStore::new(blobs),
            mapping_lookups: AtomicU64::new(0),
        }
    }

    pub fn transform_invocations(&self) -> u64 {
        self.mapping_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MappingStore for CountingMappingStore {
    async fn endpoint_catalog(&self, service: &str) -> Result<Option<EndpointCatalog>, IngestError> {
        self.inner.endpoint_catalog(service).await
    }

    async fn canonical_mapping(
        &self,
        canonical_table: &TableName,
    ) -> Result<Option<CanonicalMapping>, IngestError> {
        self.mapping_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.canonical_mapping(canonical_table).await
    }
}

/// The full pipeline wired over in-memory collaborators.
pub struct TestHarness {
    pub jobs: Arc<dyn JobRepository>,
    pub journal: Arc<dyn ChunkJournal>,
    pub watermarks: Arc<dyn WatermarkRepository>,
    pub tenant_repo: Arc<SqliteTenantRepository>,
    pub blobs: Arc<dyn BlobStore>,
    pub codec: Arc<dyn RecordCodec>,
    pub fetcher: Arc<ScriptedPageFetcher>,
    pub analytics: Arc<InMemoryAnalyticsStore>,
    pub mappings: Arc<CountingMappingStore>,
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub resume_chunk: Arc<ResumeChunkUseCase>,
    pub transformer: Arc<CanonicalTransformer>,
    pub sink: Arc<ScdSink>,
}

impl TestHarness {
    /// Default harness: flush threshold 3 records so multi-file chunks are
    /// easy to provoke, single-chunk fan-outs kept at their defaults.
    pub async fn new() -> Self {
        Self::with_chunk_settings(ChunkSettings {
            batch_flush_records: 3,
            batch_flush_bytes: 50 * 1024 * 1024,
            data_format_skip_quota: 0.05,
        })
        .await
    }

    pub async fn with_chunk_settings(chunk_settings: ChunkSettings) -> Self {
        let pool = schema::in_memory_pool().await.expect("journal pool");
        let jobs: Arc<dyn JobRepository> = Arc::new(SqliteJobRepository::new(pool.clone()));
        let journal: Arc<dyn ChunkJournal> = Arc::new(SqliteChunkJournal::new(pool.clone()));
        let watermarks: Arc<dyn WatermarkRepository> =
            Arc::new(SqliteWatermarkRepository::new(pool.clone()));
        let tenant_repo = Arc::new(SqliteTenantRepository::new(pool));
        let tenants: Arc<dyn TenantRepository> = tenant_repo.clone();

        let blobs: Arc<dyn BlobStore> = Arc::new(ObjectStoreAdapter::in_memory());
        let codec: Arc<dyn RecordCodec> = Arc::new(ParquetRecordCodec::new());
        let fetcher = Arc::new(ScriptedPageFetcher::new());
        let analytics = Arc::new(InMemoryAnalyticsStore::new());
        let mappings = Arc::new(CountingMappingStore::new(blobs.clone()));
        let secrets = Arc::new(StaticSecretsProvider::new().with_secret(
            SECRET_REF,
            HashMap::from([(
                "base_url".to_string(),
                "https://api.test.invalid".to_string(),
            )]),
        ));
        let metrics = MetricsService::new().expect("metrics");

        let sink = Arc::new(ScdSink::new(analytics.clone(), metrics.clone()));
        let transformer = Arc::new(CanonicalTransformer::new(
            blobs.clone(),
            codec.clone(),
            mappings.clone(),
            sink.clone(),
        ));
        let chunk_processor = Arc::new(ChunkProcessor::new(
            fetcher.clone(),
            secrets,
            blobs.clone(),
            codec.clone(),
            journal.clone(),
            metrics,
            chunk_settings,
        ));
        let table_processor = Arc::new(TableProcessor::new(
            journal.clone(),
            watermarks.clone(),
            chunk_processor.clone(),
            RetryPolicy::new(3, Duration::from_millis(5), 2.0),
            TableSettings::default(),
        ));
        let tenant_processor = Arc::new(TenantProcessor::new(
            mappings.clone(),
            table_processor,
            transformer.clone(),
            4,
        ));
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            jobs.clone(),
            tenants.clone(),
            tenant_processor,
            Arc::new(ingest_pipeline::infrastructure::adapters::LogNotifier::new()),
            OrchestratorSettings {
                tenant_fanout: 10,
                job_deadline: Duration::from_secs(300),
                deadline_margin: Duration::from_secs(1),
                staleness_timeout: Duration::from_secs(21_600),
            },
        ));
        let resume_chunk = Arc::new(ResumeChunkUseCase::new(
            journal.clone(),
            jobs.clone(),
            tenants,
            mappings.clone(),
            watermarks.clone(),
            chunk_processor,
            transformer.clone(),
        ));

        Self {
            jobs,
            journal,
            watermarks,
            tenant_repo,
            blobs,
            codec,
            fetcher,
            analytics,
            mappings,
            orchestrator,
            resume_chunk,
            transformer,
            sink,
        }
    }

    pub fn run_context(&self) -> RunContext {
        RunContext {
            deadline: Deadline::within(Duration::from_secs(300), Duration::from_secs(1)),
            cancel: CancellationToken::new(),
            page_size_override: None,
        }
    }

    pub async fn seed_tenant(&self, tenant: &str, service: &str) -> TenantId {
        let tenant_id = TenantId::new(tenant).unwrap();
        let binding = ingest_pipeline_domain::config::ServiceBinding {
            service: service.to_string(),
            enabled: true,
            credentials_secret_ref: SECRET_REF.to_string(),
            extras: HashMap::new(),
        };
        self.tenant_repo
            .seed_binding(&tenant_id, &binding)
            .await
            .unwrap();
        tenant_id
    }

    /// One incremental endpoint `service/{table}` ordered by id over
    /// `lastUpdated`.
    pub async fn seed_incremental_endpoint(&self, service: &str, table: &str) {
        let catalog = json!({
            "service": service,
            "endpoints": [{
                "enabled": true,
                "path": format!("service/{}", table),
                "table_name": table,
                "canonical_table": table,
                "pagination": {
                    "strategy": "page",
                    "page_size_default": 1000,
                    "page_size_max": 1000
                },
                "rate_limit_per_minute": 600,
                "incremental_field": "lastUpdated",
                "ordering_field": "id"
            }]
        });
        self.blobs
            .put(
                &format!("config/endpoints/{}.json", service),
                serde_json::to_vec(&catalog).unwrap(),
            )
            .await
            .unwrap();
    }

    pub async fn seed_mapping(&self, service: &str, table: &str, scd_type: ScdType) {
        let mapping = json!({
            "canonical_table": table,
            "scd_type": match scd_type { ScdType::Type1 => "type_1", ScdType::Type2 => "type_2" },
            "sources": {
                service: {
                    "field_rules": [
                        {"source_field": "id", "canonical_field": "id", "coerce": "string"},
                        {"source_field": "status", "canonical_field": "status"},
                        {"source_field": "lastUpdated", "canonical_field": "last_updated"}
                    ],
                    "constants": {}
                }
            }
        });
        self.blobs
            .put(
                &format!("config/mappings/{}.json", table),
                serde_json::to_vec(&mapping).unwrap(),
            )
            .await
            .unwrap();
    }
}

/// A source record as the scripted PSA returns it.
pub fn source_record(id: &str, status: &str, last_updated: &str) -> Value {
    json!({
        "id": id,
        "status": status,
        "lastUpdated": last_updated,
    })
}

/// A canonical record shaped like the transformer's output.
pub fn canonical_record(id: &str, status: &str, last_updated: &str) -> CanonicalRecord {
    let mut business = Map::new();
    business.insert("id".into(), json!(id));
    business.insert("status".into(), json!(status));
    business.insert("last_updated".into(), json!(last_updated));
    let record_hash = CanonicalRecord::compute_hash(&business);
    CanonicalRecord {
        business,
        metadata: ingest_pipeline_domain::entities::RecordMetadata {
            source_system: "psa".into(),
            source_table: "tickets".into(),
            canonical_table: "tickets".into(),
            ingestion_timestamp: Utc::now(),
            effective_start_date: Some(Utc::now()),
            expiration_date: None,
            is_current: Some(true),
            record_hash,
            record_version: Some(1),
        },
    }
}
