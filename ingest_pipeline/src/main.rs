// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Ingestion Pipeline Binary
//!
//! Composition root: parses the CLI, initializes logging, wires the journal,
//! adapters, and processors together, installs signal handlers, and
//! dispatches the requested command. All orchestration logic lives in the
//! library crates; this file only assembles them.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::error;

use ingest_pipeline_bootstrap::{parse_cli, init_tracing, ExitCode, ShutdownCoordinator};
use ingest_pipeline_domain::repositories::{
    ChunkJournal, JobRepository, TenantRepository, WatermarkRepository,
};
use ingest_pipeline_domain::services::{
    AnalyticsStore, BlobStore, MappingStore, PageFetcher, RecordCodec, SecretsProvider,
};
use ingest_pipeline_domain::IngestError;

use ingest_pipeline::application::services::{
    CanonicalTransformer, ChunkProcessor, PipelineOrchestrator, ScdSink, TableProcessor,
    TenantProcessor,
};
use ingest_pipeline::application::use_cases::{
    ResumeChunkUseCase, ShowJobUseCase, StartPipelineUseCase, TransformAndLoadUseCase,
};
use ingest_pipeline::infrastructure::adapters::{
    BlobMappingStore, ClickHouseStore, FileSecretsProvider, HttpPageFetcher, LogNotifier,
    ObjectStoreAdapter, StaticSecretsProvider,
};
use ingest_pipeline::infrastructure::config::PipelineSettings;
use ingest_pipeline::infrastructure::metrics::MetricsService;
use ingest_pipeline::infrastructure::repositories::{
    schema, SqliteChunkJournal, SqliteJobRepository, SqliteTenantRepository,
    SqliteWatermarkRepository,
};
use ingest_pipeline::infrastructure::services::ParquetRecordCodec;
use ingest_pipeline::presentation::{dispatch, exit_code_for, AppContext};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = parse_cli();
    init_tracing(cli.verbose);

    let settings = match PipelineSettings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "settings unusable");
            return ExitCode::Config.into();
        }
    };

    let app = match build_app(settings).await {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "composition failed");
            return exit_code_for(&e).into();
        }
    };

    let coordinator = ShutdownCoordinator::new(Duration::from_secs(30));
    coordinator.install_signal_handlers();

    match dispatch(cli.command, &app, coordinator.token()).await {
        Ok(()) => ExitCode::Success.into(),
        Err(e) => {
            error!(error = %e, kind = e.kind().as_str(), "command failed");
            exit_code_for(&e).into()
        }
    }
}

async fn build_app(settings: PipelineSettings) -> Result<AppContext, IngestError> {
    let pool = schema::initialize_database(&settings.journal_database_url)
        .await
        .map_err(|e| IngestError::journal(format!("journal initialization failed: {}", e)))?;

    let jobs: Arc<dyn JobRepository> = Arc::new(SqliteJobRepository::new(pool.clone()));
    let journal: Arc<dyn ChunkJournal> = Arc::new(SqliteChunkJournal::new(pool.clone()));
    let watermarks: Arc<dyn WatermarkRepository> =
        Arc::new(SqliteWatermarkRepository::new(pool.clone()));
    let tenants: Arc<dyn TenantRepository> = Arc::new(SqliteTenantRepository::new(pool));

    let blobs: Arc<dyn BlobStore> =
        Arc::new(ObjectStoreAdapter::local(&settings.object_store_root)?);
    let codec: Arc<dyn RecordCodec> = Arc::new(ParquetRecordCodec::new());
    let mappings: Arc<dyn MappingStore> = Arc::new(BlobMappingStore::new(blobs.clone()));
    let secrets: Arc<dyn SecretsProvider> = match &settings.secrets_file {
        Some(path) => Arc::new(FileSecretsProvider::from_file(Path::new(path))?),
        None => Arc::new(StaticSecretsProvider::new()),
    };
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpPageFetcher::new()?);
    let analytics: Arc<dyn AnalyticsStore> =
        Arc::new(ClickHouseStore::new(&settings.clickhouse_settings()));

    let metrics = MetricsService::new()?;
    let sink = Arc::new(ScdSink::new(analytics, metrics.clone()));
    let transformer = Arc::new(CanonicalTransformer::new(
        blobs.clone(),
        codec.clone(),
        mappings.clone(),
        sink,
    ));
    let chunk_processor = Arc::new(ChunkProcessor::new(
        fetcher,
        secrets,
        blobs,
        codec,
        journal.clone(),
        metrics,
        settings.chunk_settings(),
    ));
    let table_processor = Arc::new(TableProcessor::new(
        journal.clone(),
        watermarks.clone(),
        chunk_processor.clone(),
        settings.retry_policy(),
        settings.table_settings(),
    ));
    let tenant_processor = Arc::new(TenantProcessor::new(
        mappings.clone(),
        table_processor,
        transformer.clone(),
        settings.table_fanout,
    ));
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        jobs.clone(),
        tenants.clone(),
        tenant_processor,
        Arc::new(LogNotifier::new()),
        settings.orchestrator_settings(),
    ));

    Ok(AppContext {
        start_pipeline: Arc::new(StartPipelineUseCase::new(orchestrator.clone())),
        resume_chunk: Arc::new(ResumeChunkUseCase::new(
            journal.clone(),
            jobs.clone(),
            tenants,
            mappings,
            watermarks,
            chunk_processor,
            transformer.clone(),
        )),
        transform_and_load: Arc::new(TransformAndLoadUseCase::new(transformer)),
        show_job: Arc::new(ShowJobUseCase::new(jobs, journal)),
        settings,
    })
}
