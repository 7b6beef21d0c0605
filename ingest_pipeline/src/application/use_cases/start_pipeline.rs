// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Start Pipeline Use Case
//!
//! Entry wrapper around the orchestrator: sweeps stale jobs left behind by
//! crashed workers, then runs the requested pipeline invocation.

use std::sync::Arc;

use tracing::warn;

use ingest_pipeline_bootstrap::CancellationToken;
use ingest_pipeline_domain::value_objects::JobId;
use ingest_pipeline_domain::IngestError;

use crate::application::services::pipeline_orchestrator::{
    PipelineOrchestrator, StartPipelineRequest,
};

pub struct StartPipelineUseCase {
    orchestrator: Arc<PipelineOrchestrator>,
}

impl StartPipelineUseCase {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn execute(
        &self,
        request: StartPipelineRequest,
        cancel: CancellationToken,
    ) -> Result<JobId, IngestError> {
        let swept = self.orchestrator.mark_stale_jobs().await?;
        if !swept.is_empty() {
            warn!(count = swept.len(), "stale jobs failed before this run");
        }
        self.orchestrator.start_pipeline(request, cancel).await
    }
}
