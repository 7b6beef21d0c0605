// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transform And Load Use Case
//!
//! Manual repair entry point: re-runs the canonical transform and sink over
//! an explicit raw file list. Safe to repeat; the sink's classification and
//! the engine-level dedup make reloads converge.

use std::sync::Arc;

use ingest_pipeline_domain::services::SinkStats;
use ingest_pipeline_domain::value_objects::{TableName, TenantId};
use ingest_pipeline_domain::IngestError;

use crate::application::services::canonical_transformer::CanonicalTransformer;

pub struct TransformAndLoadUseCase {
    transformer: Arc<CanonicalTransformer>,
}

impl TransformAndLoadUseCase {
    pub fn new(transformer: Arc<CanonicalTransformer>) -> Self {
        Self { transformer }
    }

    pub async fn execute(
        &self,
        tenant_id: &TenantId,
        service: &str,
        table_name: &TableName,
        source_files: &[String],
    ) -> Result<SinkStats, IngestError> {
        if source_files.is_empty() {
            return Err(IngestError::invalid_request(
                "transform-and-load requires at least one source file",
            ));
        }
        self.transformer
            .transform_and_load(tenant_id, service, table_name, source_files)
            .await
    }
}
