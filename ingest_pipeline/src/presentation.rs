// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Presentation Layer
//!
//! Maps CLI subcommands onto use cases and domain errors onto exit codes.
//! Command output is JSON on stdout; everything diagnostic goes through
//! tracing.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::json;

use ingest_pipeline_bootstrap::cli::Command;
use ingest_pipeline_bootstrap::{CancellationToken, ExitCode};
use ingest_pipeline_domain::entities::BackfillRange;
use ingest_pipeline_domain::value_objects::{ChunkId, JobId, TableName, TenantId};
use ingest_pipeline_domain::{ErrorKind, IngestError};

use crate::application::services::pipeline_orchestrator::StartPipelineRequest;
use crate::application::services::RunContext;
use crate::application::use_cases::{
    ResumeChunkUseCase, ShowJobUseCase, StartPipelineUseCase, TransformAndLoadUseCase,
};
use crate::infrastructure::config::PipelineSettings;
use crate::infrastructure::runtime::Deadline;

/// The wired use cases the CLI dispatches into.
pub struct AppContext {
    pub settings: PipelineSettings,
    pub start_pipeline: Arc<StartPipelineUseCase>,
    pub resume_chunk: Arc<ResumeChunkUseCase>,
    pub transform_and_load: Arc<TransformAndLoadUseCase>,
    pub show_job: Arc<ShowJobUseCase>,
}

/// Runs one CLI command to completion.
pub async fn dispatch(
    command: Command,
    app: &AppContext,
    cancel: CancellationToken,
) -> Result<(), IngestError> {
    match command {
        Command::Start {
            tenant,
            table,
            force_full_sync,
            backfill_start,
            backfill_end,
            backfill_chunk_days,
            chunk_size,
        } => {
            let backfill = match (backfill_start, backfill_end) {
                (Some(start), Some(end)) => Some(BackfillRange {
                    start,
                    end,
                    chunk_days: backfill_chunk_days
                        .unwrap_or(app.settings.chunk_backfill_days),
                }),
                _ => None,
            };
            let request = StartPipelineRequest {
                tenant_id: tenant.map(TenantId::new).transpose()?,
                table_name: table.map(TableName::new).transpose()?,
                force_full_sync,
                backfill,
                chunk_size_override: chunk_size,
                priority: None,
            };
            let job_id = app.start_pipeline.execute(request, cancel).await?;
            println!("{}", json!({ "job_id": job_id.to_string() }));
            Ok(())
        }

        Command::ResumeChunk { job, chunk } => {
            let job_id = JobId::from_str(&job)?;
            let chunk_id = ChunkId::from_string(&chunk)?;
            let ctx = RunContext {
                deadline: Deadline::within(
                    std::time::Duration::from_secs(app.settings.job_deadline_sec),
                    std::time::Duration::from_secs(app.settings.chunk_deadline_margin_sec),
                ),
                cancel,
                page_size_override: None,
            };
            let outcome = app.resume_chunk.execute(&job_id, &chunk_id, &ctx).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }

        Command::Transform {
            tenant,
            service,
            table,
            files,
        } => {
            let tenant_id = TenantId::new(tenant)?;
            let table_name = TableName::new(table)?;
            let stats = app
                .transform_and_load
                .execute(&tenant_id, &service, &table_name, &files)
                .await?;
            println!(
                "{}",
                json!({
                    "inserted": stats.inserted,
                    "updated": stats.updated,
                    "versioned": stats.versioned,
                    "skipped": stats.skipped,
                })
            );
            Ok(())
        }

        Command::ShowJob { job } => {
            let job_id = JobId::from_str(&job)?;
            let view = app.show_job.execute(&job_id).await?.ok_or_else(|| {
                IngestError::invalid_request(format!("no job '{}' journaled", job_id))
            })?;
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(())
        }
    }
}

/// Exit code for a failed command.
pub fn exit_code_for(error: &IngestError) -> ExitCode {
    match error.kind() {
        ErrorKind::InvalidRequest => ExitCode::UsageError,
        ErrorKind::Configuration => ExitCode::Config,
        ErrorKind::TransientExternal | ErrorKind::RateLimited => ExitCode::TempFail,
        ErrorKind::DeadlineElapsed => ExitCode::TempFail,
        ErrorKind::DataFormat => ExitCode::DataError,
        ErrorKind::Journal | ErrorKind::Storage => ExitCode::IoError,
        ErrorKind::Serialization => ExitCode::DataError,
        ErrorKind::Cancelled => ExitCode::Interrupted,
        ErrorKind::SinkConflict | ErrorKind::Unexpected => ExitCode::Software,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_error_taxonomy() {
        assert_eq!(
            exit_code_for(&IngestError::invalid_request("bad")),
            ExitCode::UsageError
        );
        assert_eq!(
            exit_code_for(&IngestError::configuration("no mapping")),
            ExitCode::Config
        );
        assert_eq!(
            exit_code_for(&IngestError::transient("503")),
            ExitCode::TempFail
        );
        assert_eq!(
            exit_code_for(&IngestError::cancelled("signal")),
            ExitCode::Interrupted
        );
    }
}
