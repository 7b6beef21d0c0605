// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Ingestion Pipeline Domain Layer
//!
//! Pure business logic for the multi-tenant data ingestion and
//! canonicalization pipeline. This crate holds the entities, value objects,
//! declarative configuration schemas, and the ports (repository and service
//! traits) that the application and infrastructure layers implement.
//!
//! ## Overview
//!
//! The pipeline pulls paginated records from per-tenant source APIs, persists
//! them as raw Parquet snapshots, transforms them into canonical per-tenant
//! tables, and upserts them into a columnar analytics store with
//! slowly-changing-dimension semantics. The domain layer models that flow
//! without performing any I/O:
//!
//! - **Value objects**: [`JobId`], [`ChunkId`], [`TenantId`], [`TableName`],
//!   [`Watermark`], and the raw/canonical object key formats.
//! - **Entities**: [`ProcessingJob`] (one pipeline invocation),
//!   [`ChunkProgress`] (the journaled state of one bounded slice of one
//!   table), and [`CanonicalRecord`] (one transformed record plus metadata).
//! - **Configuration**: strongly-typed tenant bindings, endpoint catalogs,
//!   and canonical mappings, all validated at load time.
//! - **Ports**: async traits for the journal store, the source API page
//!   fetcher, the object store, the secrets store, and the analytics sink.
//!
//! ## Layering
//!
//! Nothing in this crate depends on tokio, HTTP, SQL, or Parquet. The
//! `async_trait` ports are the only concession to the I/O-bound nature of the
//! system; every implementation lives in the infrastructure layer of the
//! `ingest-pipeline` crate.

pub mod config;
pub mod entities;
pub mod error;
pub mod events;
pub mod repositories;
pub mod services;
pub mod value_objects;

// Re-export commonly used types for convenience
pub use config::{
    CanonicalMapping, Coercion, EndpointCatalog, EndpointConfig, FieldRule, PaginationConfig,
    PaginationStrategy, ScdType, ServiceBinding, SourceMapping, TenantConfig,
};
pub use entities::{
    BackfillRange, CanonicalRecord, ChunkBounds, ChunkProgress, ChunkRunOutcome, ChunkStatus,
    JobMode, JobRollup, JobStatus, ProcessingJob, RecordMetadata, ResumptionCursor,
    TableRunResult, TenantRunResult,
};
pub use error::{ErrorKind, IngestError};
pub use events::PipelineCompletedEvent;
pub use value_objects::{
    CanonicalObjectKey, ChunkId, JobId, RawObjectKey, TableName, TenantId, Watermark,
};
