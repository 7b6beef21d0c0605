// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Journal Schema
//!
//! SQLite schema for the four journal tables. Rows follow the key-value
//! pattern: the primary key plus a JSON `data` column holding the full
//! entity, with the attributes queries filter on (status, updated_at)
//! extracted into indexed columns. Creation is idempotent and runs at
//! process start.

use sqlx::migrate::MigrateDatabase;
use sqlx::SqlitePool;
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tenant_services (
        tenant_id TEXT NOT NULL,
        service TEXT NOT NULL,
        enabled BOOLEAN NOT NULL DEFAULT true,
        credentials_secret_ref TEXT NOT NULL,
        extras TEXT NOT NULL DEFAULT '{}',
        PRIMARY KEY (tenant_id, service)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS last_updated (
        tenant_id TEXT NOT NULL,
        service_table TEXT NOT NULL,
        last_updated TEXT NOT NULL,
        PRIMARY KEY (tenant_id, service_table)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS processing_jobs (
        job_id TEXT PRIMARY KEY,
        data TEXT NOT NULL,
        status TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        version INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_processing_jobs_status
        ON processing_jobs(status, updated_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chunk_progress (
        job_id TEXT NOT NULL,
        chunk_id TEXT NOT NULL,
        data TEXT NOT NULL,
        status TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (job_id, chunk_id)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_chunk_progress_job_status
        ON chunk_progress(job_id, status)
    "#,
];

/// Applies the journal schema (idempotent)
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    debug!("Ensuring journal schema is up to date");
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Journal schema is up to date");
    Ok(())
}

/// Creates the SQLite database file when absent
pub async fn create_database_if_missing(database_url: &str) -> Result<(), sqlx::Error> {
    if !sqlx::Sqlite::database_exists(database_url).await? {
        debug!("Database does not exist, creating: {}", database_url);
        sqlx::Sqlite::create_database(database_url).await?;
        info!("Created new SQLite database: {}", database_url);
    } else {
        debug!("Database already exists: {}", database_url);
    }
    Ok(())
}

/// Creates (if needed), connects, and migrates the journal database
pub async fn initialize_database(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    create_database_if_missing(database_url).await?;
    let pool = SqlitePool::connect(database_url).await?;
    ensure_schema(&pool).await?;
    Ok(pool)
}

/// In-memory journal for tests; a single connection keeps the shared state
pub async fn in_memory_pool() -> Result<SqlitePool, sqlx::Error> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    ensure_schema(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_creates_all_journal_tables() {
        let pool = in_memory_pool().await.unwrap();
        for table in ["tenant_services", "last_updated", "processing_jobs", "chunk_progress"] {
            let count: i32 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert_eq!(count, 1, "{} table should exist", table);
        }
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let pool = in_memory_pool().await.unwrap();
        ensure_schema(&pool).await.unwrap();
        ensure_schema(&pool).await.unwrap();
    }
}
