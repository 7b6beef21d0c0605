// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Orchestrator
//!
//! Entry point of the processing hierarchy: decides single-tenant versus
//! multi-tenant scope, journals the job, fans out tenant processors with
//! bounded concurrency, aggregates the rollup, and publishes the completion
//! notification.
//!
//! The orchestrator is a fan-out coordinator, not a worker; keeping it thin
//! isolates the blast radius of multi-tenant processing. Tenant failures are
//! contained: one tenant can never abort its peers or fail the whole job by
//! itself. Only initialization failures (malformed request, unknown tenant)
//! reject the invocation before any tenant runs.
//!
//! A supervisor concern rides along: jobs whose `updated_at` stops moving
//! for longer than the staleness timeout are marked failed by
//! [`PipelineOrchestrator::mark_stale_jobs`], which the binary runs before
//! starting new work.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use ingest_pipeline_bootstrap::CancellationToken;
use ingest_pipeline_domain::entities::{
    BackfillRange, JobMode, JobRollup, ProcessingJob, TenantRunResult,
};
use ingest_pipeline_domain::events::PipelineCompletedEvent;
use ingest_pipeline_domain::repositories::{JobRepository, TenantRepository};
use ingest_pipeline_domain::services::CompletionNotifier;
use ingest_pipeline_domain::value_objects::{JobId, TableName, TenantId};
use ingest_pipeline_domain::IngestError;

use crate::application::services::chunk_processor::RunContext;
use crate::application::services::tenant_processor::TenantProcessor;
use crate::infrastructure::runtime::{join_supervised, spawn_supervised, Deadline};

/// Scheduling hint recorded on the run for external queueing systems.
/// The core itself processes every request the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPriority {
    Low,
    Normal,
    High,
}

impl RunPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPriority::Low => "low",
            RunPriority::Normal => "normal",
            RunPriority::High => "high",
        }
    }
}

/// One pipeline invocation request.
#[derive(Debug, Clone, Default)]
pub struct StartPipelineRequest {
    /// Single-tenant mode when present
    pub tenant_id: Option<TenantId>,
    /// Restrict the run to one table
    pub table_name: Option<TableName>,
    pub force_full_sync: bool,
    pub backfill: Option<BackfillRange>,
    /// Page-size override applied to every endpoint of this run
    pub chunk_size_override: Option<u32>,
    pub priority: Option<RunPriority>,
}

/// Tunables for orchestration.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    /// Tenants processed concurrently
    pub tenant_fanout: usize,
    /// Wall-clock budget of one pipeline invocation
    pub job_deadline: Duration,
    /// Safety margin reserved for cursor persistence
    pub deadline_margin: Duration,
    /// Unfinished jobs with no `updated_at` movement for this long are failed
    pub staleness_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            tenant_fanout: 10,
            job_deadline: Duration::from_secs(900),
            deadline_margin: Duration::from_secs(60),
            staleness_timeout: Duration::from_secs(21_600),
        }
    }
}

/// Fan-out coordinator for pipeline invocations.
pub struct PipelineOrchestrator {
    jobs: Arc<dyn JobRepository>,
    tenants: Arc<dyn TenantRepository>,
    tenant_processor: Arc<TenantProcessor>,
    notifier: Arc<dyn CompletionNotifier>,
    settings: OrchestratorSettings,
}

impl PipelineOrchestrator {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        tenants: Arc<dyn TenantRepository>,
        tenant_processor: Arc<TenantProcessor>,
        notifier: Arc<dyn CompletionNotifier>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            jobs,
            tenants,
            tenant_processor,
            notifier,
            settings,
        }
    }

    /// Runs one pipeline invocation to its terminal state.
    ///
    /// Returns the job id; the journaled job carries the rollup. Errors
    /// before the job starts surface as `InvalidRequest`; after that point
    /// failures are contained per tenant and reflected in the rollup.
    pub async fn start_pipeline(
        &self,
        request: StartPipelineRequest,
        cancel: CancellationToken,
    ) -> Result<JobId, IngestError> {
        if let Some(backfill) = &request.backfill {
            backfill.validate()?;
        }

        let tenant_configs = match &request.tenant_id {
            Some(tenant_id) => {
                let config = self.tenants.find_by_id(tenant_id).await?.ok_or_else(|| {
                    IngestError::invalid_request(format!("unknown tenant '{}'", tenant_id))
                })?;
                vec![config]
            }
            None => self.tenants.list_with_enabled_services().await?,
        };
        let mode = if request.tenant_id.is_some() {
            JobMode::SingleTenant
        } else {
            JobMode::MultiTenant
        };

        let mut job = ProcessingJob::new(
            mode,
            request.tenant_id.clone(),
            request.table_name.clone(),
            request.force_full_sync,
            request.backfill.clone(),
        );
        self.jobs.create(&job).await?;
        job.start()?;
        self.jobs.update(&mut job).await?;
        let job_id = job.job_id;
        info!(
            job_id = %job_id,
            mode = mode.as_str(),
            tenants = tenant_configs.len(),
            force_full_sync = request.force_full_sync,
            backfill = request.backfill.is_some(),
            priority = request.priority.map(|p| p.as_str()).unwrap_or("normal"),
            "pipeline job starting"
        );

        let ctx = RunContext {
            deadline: Deadline::within(self.settings.job_deadline, self.settings.deadline_margin),
            cancel,
            page_size_override: request.chunk_size_override,
        };

        let semaphore = Arc::new(Semaphore::new(self.settings.tenant_fanout.max(1)));
        let mut handles = Vec::with_capacity(tenant_configs.len());
        for tenant in tenant_configs {
            let tenant_id = tenant.tenant_id.clone();
            let semaphore = semaphore.clone();
            let processor = self.tenant_processor.clone();
            let job = job.clone();
            let ctx = ctx.clone();
            let handle = spawn_supervised("tenant-processor", async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| IngestError::unexpected(format!("fan-out semaphore closed: {}", e)))?;
                Ok(processor.process_tenant(&job, &tenant, &ctx).await)
            });
            handles.push((tenant_id, handle));
        }

        let mut results: Vec<TenantRunResult> = Vec::with_capacity(handles.len());
        for (tenant_id, handle) in handles {
            match join_supervised(handle).await {
                Ok(result) => results.push(result),
                // A panicking tenant is contained exactly like a failing one
                Err(error) => {
                    warn!(tenant = %tenant_id, error = %error, "tenant run aborted");
                    results.push(TenantRunResult::failed(tenant_id, "tenant_run", error.kind()));
                }
            }
        }

        let rollup = JobRollup {
            tenants_total: results.len() as u32,
            tenants_succeeded: results.iter().filter(|r| r.succeeded()).count() as u32,
            tenants_failed: results.iter().filter(|r| !r.succeeded()).count() as u32,
            records_processed: results.iter().map(|r| r.records_processed).sum(),
        };
        let status = job.finish(rollup)?;
        self.jobs.update(&mut job).await?;
        info!(
            job_id = %job_id,
            status = status.as_str(),
            tenants_succeeded = rollup.tenants_succeeded,
            tenants_failed = rollup.tenants_failed,
            records = rollup.records_processed,
            "pipeline job finished"
        );

        let event = PipelineCompletedEvent::new(job_id, status, rollup, results);
        if let Err(error) = self.notifier.publish(&event).await {
            // Notification failures never change a job's terminal status
            warn!(job_id = %job_id, error = %error, "completion notification failed");
        }

        Ok(job_id)
    }

    /// Read-only job inspection.
    pub async fn get_job(&self, job_id: &JobId) -> Result<Option<ProcessingJob>, IngestError> {
        self.jobs.find_by_id(job_id).await
    }

    /// Fails unfinished jobs whose `updated_at` has not moved within the
    /// staleness timeout; returns the ids that were swept.
    pub async fn mark_stale_jobs(&self) -> Result<Vec<JobId>, IngestError> {
        let timeout = chrono::Duration::from_std(self.settings.staleness_timeout)
            .map_err(|e| IngestError::unexpected(format!("invalid staleness timeout: {}", e)))?;
        let cutoff = Utc::now() - timeout;
        let stale = self.jobs.list_stale(cutoff).await?;
        let mut swept = Vec::with_capacity(stale.len());
        for mut job in stale {
            warn!(
                job_id = %job.job_id,
                status = job.status.as_str(),
                updated_at = %job.updated_at.to_rfc3339(),
                "marking stale job failed"
            );
            job.fail();
            self.jobs.update(&mut job).await?;
            swept.push(job.job_id);
        }
        Ok(swept)
    }
}
