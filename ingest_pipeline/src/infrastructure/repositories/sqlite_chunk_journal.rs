// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Chunk Journal
//!
//! `ChunkProgress` journal table, keyed `(job_id, chunk_id)` with the
//! status extracted for the aggregation index. Writes are plain upserts:
//! each row has exactly one owner (its chunk processor) and the entity's
//! state machine already rejects writes into terminal chunks.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use ingest_pipeline_domain::entities::{ChunkProgress, ChunkStatus};
use ingest_pipeline_domain::repositories::ChunkJournal;
use ingest_pipeline_domain::value_objects::{ChunkId, JobId};
use ingest_pipeline_domain::IngestError;

pub struct SqliteChunkJournal {
    pool: SqlitePool,
}

impl SqliteChunkJournal {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn deserialize(data: &str) -> Result<ChunkProgress, IngestError> {
        serde_json::from_str(data)
            .map_err(|e| IngestError::serialization(format!("journaled chunk unreadable: {}", e)))
    }
}

#[async_trait]
impl ChunkJournal for SqliteChunkJournal {
    async fn put(&self, progress: &ChunkProgress) -> Result<(), IngestError> {
        let data = serde_json::to_string(progress).map_err(|e| {
            IngestError::serialization(format!(
                "chunk {} unserializable: {}",
                progress.chunk_id, e
            ))
        })?;
        sqlx::query(
            "INSERT OR REPLACE INTO chunk_progress (job_id, chunk_id, data, status, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(progress.job_id.to_string())
        .bind(progress.chunk_id.as_str())
        .bind(&data)
        .bind(progress.status.as_str())
        .bind(progress.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            IngestError::journal(format!("failed to journal chunk {}: {}", progress.chunk_id, e))
        })?;
        Ok(())
    }

    async fn find(
        &self,
        job_id: &JobId,
        chunk_id: &ChunkId,
    ) -> Result<Option<ChunkProgress>, IngestError> {
        let row = sqlx::query("SELECT data FROM chunk_progress WHERE job_id = ? AND chunk_id = ?")
            .bind(job_id.to_string())
            .bind(chunk_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                IngestError::journal(format!("failed to read chunk {}: {}", chunk_id, e))
            })?;
        match row {
            Some(row) => {
                let data: String = row.get("data");
                Ok(Some(Self::deserialize(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn list_for_job(
        &self,
        job_id: &JobId,
        status: Option<ChunkStatus>,
    ) -> Result<Vec<ChunkProgress>, IngestError> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT data FROM chunk_progress WHERE job_id = ? AND status = ? \
                     ORDER BY chunk_id",
                )
                .bind(job_id.to_string())
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT data FROM chunk_progress WHERE job_id = ? ORDER BY chunk_id",
                )
                .bind(job_id.to_string())
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| {
            IngestError::journal(format!("failed to list chunks for job {}: {}", job_id, e))
        })?;

        rows.iter()
            .map(|row| {
                let data: String = row.get("data");
                Self::deserialize(&data)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::schema::in_memory_pool;
    use ingest_pipeline_domain::entities::ChunkBounds;
    use ingest_pipeline_domain::value_objects::{TableName, TenantId};

    async fn journal() -> SqliteChunkJournal {
        SqliteChunkJournal::new(in_memory_pool().await.unwrap())
    }

    fn chunk(job_id: JobId, index: u32) -> ChunkProgress {
        ChunkProgress::new(
            job_id,
            TenantId::new("acme").unwrap(),
            "psa",
            TableName::new("tickets").unwrap(),
            index,
            ChunkBounds::FullRefresh,
        )
    }

    #[tokio::test]
    async fn upsert_and_read_round_trip() {
        let journal = journal().await;
        let job_id = JobId::new();
        let mut progress = chunk(job_id, 0);
        journal.put(&progress).await.unwrap();

        progress.begin_attempt().unwrap();
        progress.record_page(10, 1, 10, None).unwrap();
        journal.put(&progress).await.unwrap();

        let read = journal
            .find(&job_id, &progress.chunk_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.records_processed, 10);
        assert_eq!(read.status, ChunkStatus::InProgress);
        assert_eq!(read.cursor.as_ref().unwrap().last_page, 1);
    }

    #[tokio::test]
    async fn status_filter_uses_the_journaled_status() {
        let journal = journal().await;
        let job_id = JobId::new();

        let mut done = chunk(job_id, 0);
        done.begin_attempt().unwrap();
        done.complete().unwrap();
        journal.put(&done).await.unwrap();

        let pending = chunk(job_id, 1);
        journal.put(&pending).await.unwrap();

        let completed = journal
            .list_for_job(&job_id, Some(ChunkStatus::Completed))
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].chunk_id, done.chunk_id);

        let all = journal.list_for_job(&job_id, None).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
