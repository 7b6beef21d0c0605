// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Port for the completion notification sink.
//!
//! The sink is arbitrary (topic, webhook, log line); the orchestrator only
//! requires that publishing is fire-and-forget safe. A notification failure
//! never changes a job's terminal status.

use async_trait::async_trait;

use crate::events::PipelineCompletedEvent;
use crate::IngestError;

/// Publisher for job completion notifications.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    /// Publishes one completion event carrying the rollup and breakdown
    async fn publish(&self, event: &PipelineCompletedEvent) -> Result<(), IngestError>;
}
