// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Log Notifier
//!
//! Completion-notification sink that emits the event as one structured log
//! line. Deployments wanting a topic or webhook implement the same port;
//! the orchestrator does not care which sink is wired in.

use async_trait::async_trait;
use tracing::info;

use ingest_pipeline_domain::events::PipelineCompletedEvent;
use ingest_pipeline_domain::services::CompletionNotifier;
use ingest_pipeline_domain::IngestError;

pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionNotifier for LogNotifier {
    async fn publish(&self, event: &PipelineCompletedEvent) -> Result<(), IngestError> {
        let payload = serde_json::to_string(event)?;
        info!(
            target: "pipeline_completion",
            job_id = %event.job_id,
            status = event.status.as_str(),
            tenants_total = event.rollup.tenants_total,
            tenants_succeeded = event.rollup.tenants_succeeded,
            tenants_failed = event.rollup.tenants_failed,
            records = event.rollup.records_processed,
            event = %payload,
            "pipeline completed"
        );
        Ok(())
    }
}
