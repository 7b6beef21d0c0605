// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Multi-Tenant Ingestion Pipeline
//!
//! Orchestration and chunked-processing engine for a multi-tenant SaaS data
//! ingestion and canonicalization pipeline. The engine continually pulls
//! records from per-tenant paginated REST APIs, persists raw Parquet
//! snapshots in an object store, transforms them into canonical per-tenant
//! tables with slowly-changing-dimension semantics, and upserts them into a
//! columnar analytics store with engine-level deduplication.
//!
//! ## Architecture
//!
//! Clean Architecture layering across the workspace:
//!
//! - `ingest-pipeline-domain` - entities, value objects, declarative
//!   configuration, and the ports every external collaborator hides behind
//! - this crate's [`application`] - the processing hierarchy (pipeline ->
//!   tenant -> table -> chunk), the canonical transformer, the SCD sink, and
//!   the use cases
//! - this crate's [`infrastructure`] - the adapters, journal repositories,
//!   Parquet codec, metrics, and runtime helpers
//! - `ingest-pipeline-bootstrap` - CLI parsing, logging, shutdown, exit
//!   codes
//!
//! ## Guarantees
//!
//! - At-least-once processing with idempotent sinks; repeated loads of the
//!   same raw files converge in the analytics store.
//! - Chunks suspend on their execution budget with a journaled cursor and
//!   resume without refetching flushed pages.
//! - Watermarks advance only when every chunk of a table completed.
//! - Canonical transforms trigger at most once per (tenant, table) per job.

pub mod application;
pub mod infrastructure;
pub mod presentation;

// Re-export commonly used types for integration tests and embedders
pub use application::services::{
    CanonicalTransformer, ChunkProcessor, ChunkSettings, OrchestratorSettings,
    PipelineOrchestrator, RunContext, ScdSink, StartPipelineRequest, TableProcessor,
    TableSettings, TenantProcessor,
};
pub use application::use_cases::{
    ResumeChunkUseCase, ShowJobUseCase, StartPipelineUseCase, TransformAndLoadUseCase,
};
pub use infrastructure::config::PipelineSettings;
