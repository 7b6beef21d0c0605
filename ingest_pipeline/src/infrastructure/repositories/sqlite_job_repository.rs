// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Job Repository
//!
//! `ProcessingJobs` journal table. Jobs are stored as JSON with the status
//! and `updated_at` extracted for the staleness index. Updates are
//! version-guarded: the write carries the version the caller read and the
//! store persists `version + 1`; a stale write affects zero rows and
//! surfaces as a `Journal` error so the caller re-reads.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use ingest_pipeline_domain::entities::ProcessingJob;
use ingest_pipeline_domain::repositories::JobRepository;
use ingest_pipeline_domain::value_objects::JobId;
use ingest_pipeline_domain::IngestError;

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn serialize(job: &ProcessingJob) -> Result<String, IngestError> {
        serde_json::to_string(job)
            .map_err(|e| IngestError::serialization(format!("job {} unserializable: {}", job.job_id, e)))
    }

    fn deserialize(data: &str) -> Result<ProcessingJob, IngestError> {
        serde_json::from_str(data)
            .map_err(|e| IngestError::serialization(format!("journaled job unreadable: {}", e)))
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn create(&self, job: &ProcessingJob) -> Result<(), IngestError> {
        let data = Self::serialize(job)?;
        sqlx::query(
            "INSERT INTO processing_jobs (job_id, data, status, updated_at, version) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(job.job_id.to_string())
        .bind(&data)
        .bind(job.status.as_str())
        .bind(job.updated_at.to_rfc3339())
        .bind(job.version as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| IngestError::journal(format!("failed to journal job {}: {}", job.job_id, e)))?;
        Ok(())
    }

    async fn find_by_id(&self, job_id: &JobId) -> Result<Option<ProcessingJob>, IngestError> {
        let row = sqlx::query("SELECT data FROM processing_jobs WHERE job_id = ?")
            .bind(job_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IngestError::journal(format!("failed to read job {}: {}", job_id, e)))?;
        match row {
            Some(row) => {
                let data: String = row.get("data");
                Ok(Some(Self::deserialize(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, job: &mut ProcessingJob) -> Result<(), IngestError> {
        let guarded_version = job.version;
        job.version = guarded_version + 1;
        let data = Self::serialize(job)?;
        let result = sqlx::query(
            "UPDATE processing_jobs SET data = ?, status = ?, updated_at = ?, version = ? \
             WHERE job_id = ? AND version = ?",
        )
        .bind(&data)
        .bind(job.status.as_str())
        .bind(job.updated_at.to_rfc3339())
        .bind(job.version as i64)
        .bind(job.job_id.to_string())
        .bind(guarded_version as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| IngestError::journal(format!("failed to update job {}: {}", job.job_id, e)))?;

        if result.rows_affected() == 0 {
            job.version = guarded_version;
            return Err(IngestError::journal(format!(
                "stale version {} for job {}; re-read before updating",
                guarded_version, job.job_id
            )));
        }
        Ok(())
    }

    async fn list_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<ProcessingJob>, IngestError> {
        let rows = sqlx::query(
            "SELECT data FROM processing_jobs \
             WHERE status IN ('pending', 'running') AND updated_at < ?",
        )
        .bind(cutoff.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IngestError::journal(format!("failed to list stale jobs: {}", e)))?;

        rows.iter()
            .map(|row| {
                let data: String = row.get("data");
                Self::deserialize(&data)
            })
            .collect()
    }
}
