// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Task Supervision
//!
//! Thin wrappers around `tokio::spawn` that keep task lifecycles observable:
//! every supervised task logs its start and outcome, and joining converts
//! panics and cancellations into `IngestError` instead of propagating a
//! `JoinError` upward. The orchestrator uses this for tenant fan-out so a
//! panicking tenant is contained exactly like a failing one.

use tokio::task::JoinHandle;
use tracing::{debug, error};

use ingest_pipeline_domain::IngestError;

pub type AppResult<T> = Result<T, IngestError>;

/// Spawns a named task whose outcome is logged
pub fn spawn_supervised<F, T>(name: &'static str, fut: F) -> JoinHandle<AppResult<T>>
where
    F: std::future::Future<Output = AppResult<T>> + Send + 'static,
    T: Send + 'static,
{
    debug!(task = name, "task starting");
    tokio::spawn(async move {
        let result = fut.await;
        match &result {
            Ok(_) => debug!(task = name, "task completed successfully"),
            Err(e) => error!(task = name, error = ?e, "task failed"),
        }
        result
    })
}

/// Joins a supervised task, converting join failures into domain errors
pub async fn join_supervised<T>(handle: JoinHandle<AppResult<T>>) -> AppResult<T> {
    let join_result: Result<AppResult<T>, tokio::task::JoinError> = handle.await;
    match join_result {
        Ok(task_result) => task_result,
        Err(e) => {
            if e.is_panic() {
                Err(IngestError::unexpected(format!("task panicked: {}", e)))
            } else if e.is_cancelled() {
                Err(IngestError::cancelled("task cancelled"))
            } else {
                Err(IngestError::unexpected(format!("task join failed: {}", e)))
            }
        }
    }
}
