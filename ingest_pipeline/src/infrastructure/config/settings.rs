// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Settings
//!
//! Typed runtime configuration with every tunable and its default. Settings
//! layer a TOML file (when given) under `INGEST_*` environment overrides,
//! e.g. `INGEST_TENANT_FANOUT=4` or `INGEST_CLICKHOUSE__URL=http://ch:8123`.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use ingest_pipeline_domain::IngestError;

use crate::application::services::chunk_processor::ChunkSettings;
use crate::application::services::pipeline_orchestrator::OrchestratorSettings;
use crate::application::services::table_processor::TableSettings;
use crate::infrastructure::adapters::clickhouse_store::ClickHouseSettings;
use crate::infrastructure::runtime::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClickHouseConfig {
    pub url: String,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".into(),
            database: "canonical".into(),
            user: "default".into(),
            password: String::new(),
        }
    }
}

/// Every runtime tunable of the pipeline, with its documented default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Tenants processed concurrently
    pub tenant_fanout: usize,
    /// Tables per tenant concurrently
    pub table_fanout: usize,
    /// Chunks per table concurrently
    pub chunk_fanout: usize,
    /// Force flush of the raw batch at this record count
    pub batch_flush_records: usize,
    /// Force flush of the raw batch at this uncompressed byte size
    pub batch_flush_bytes: usize,
    /// Time reserved for cursor persistence before the deadline
    pub chunk_deadline_margin_sec: u64,
    /// Default date-range chunk width
    pub chunk_backfill_days: u32,
    /// Lower bound for full syncs without a stored watermark
    pub initial_lookback_days: i64,
    /// Transient-failure attempts per chunk
    pub retry_max_attempts: u32,
    pub retry_backoff_base_sec: u64,
    pub retry_backoff_factor: f64,
    /// Unfinished jobs older than this are failed by the sweeper
    pub job_staleness_timeout_sec: u64,
    /// Wall-clock budget of one pipeline invocation
    pub job_deadline_sec: u64,
    /// Share of unparseable records a chunk tolerates
    pub data_format_skip_quota: f64,
    /// SQLite journal location
    pub journal_database_url: String,
    /// Object store root (local filesystem prefix)
    pub object_store_root: String,
    /// JSON secrets document resolved by the file secrets provider
    pub secrets_file: Option<String>,
    pub clickhouse: ClickHouseConfig,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            tenant_fanout: 10,
            table_fanout: 4,
            chunk_fanout: 3,
            batch_flush_records: 5_000,
            batch_flush_bytes: 50 * 1024 * 1024,
            chunk_deadline_margin_sec: 60,
            chunk_backfill_days: 30,
            initial_lookback_days: 730,
            retry_max_attempts: 3,
            retry_backoff_base_sec: 15,
            retry_backoff_factor: 2.0,
            job_staleness_timeout_sec: 21_600,
            job_deadline_sec: 900,
            data_format_skip_quota: 0.05,
            journal_database_url: "sqlite://ingest_journal.db".into(),
            object_store_root: "./data".into(),
            secrets_file: None,
            clickhouse: ClickHouseConfig::default(),
        }
    }
}

impl PipelineSettings {
    /// Loads settings from an optional TOML file plus `INGEST_*` overrides
    pub fn load(path: Option<&Path>) -> Result<Self, IngestError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path.to_path_buf()));
        }
        let config = builder
            .add_source(Environment::with_prefix("INGEST").separator("__"))
            .build()
            .map_err(|e| IngestError::configuration(format!("settings unreadable: {}", e)))?;
        let settings: PipelineSettings = config
            .try_deserialize()
            .map_err(|e| IngestError::configuration(format!("settings invalid: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), IngestError> {
        if self.tenant_fanout == 0 || self.table_fanout == 0 || self.chunk_fanout == 0 {
            return Err(IngestError::configuration("fan-out settings must be positive"));
        }
        if self.batch_flush_records == 0 || self.batch_flush_bytes == 0 {
            return Err(IngestError::configuration("flush thresholds must be positive"));
        }
        if !(0.0..=1.0).contains(&self.data_format_skip_quota) {
            return Err(IngestError::configuration(
                "data_format_skip_quota must be within [0, 1]",
            ));
        }
        Ok(())
    }

    pub fn chunk_settings(&self) -> ChunkSettings {
        ChunkSettings {
            batch_flush_records: self.batch_flush_records,
            batch_flush_bytes: self.batch_flush_bytes,
            data_format_skip_quota: self.data_format_skip_quota,
        }
    }

    pub fn table_settings(&self) -> TableSettings {
        TableSettings {
            chunk_fanout: self.chunk_fanout,
            chunk_backfill_days: self.chunk_backfill_days,
            initial_lookback_days: self.initial_lookback_days,
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            tenant_fanout: self.tenant_fanout,
            job_deadline: Duration::from_secs(self.job_deadline_sec),
            deadline_margin: Duration::from_secs(self.chunk_deadline_margin_sec),
            staleness_timeout: Duration::from_secs(self.job_staleness_timeout_sec),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_secs(self.retry_backoff_base_sec),
            self.retry_backoff_factor,
        )
    }

    pub fn clickhouse_settings(&self) -> ClickHouseSettings {
        ClickHouseSettings {
            url: self.clickhouse.url.clone(),
            database: self.clickhouse.database.clone(),
            user: self.clickhouse.user.clone(),
            password: self.clickhouse.password.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.tenant_fanout, 10);
        assert_eq!(settings.table_fanout, 4);
        assert_eq!(settings.chunk_fanout, 3);
        assert_eq!(settings.batch_flush_records, 5_000);
        assert_eq!(settings.batch_flush_bytes, 50 * 1024 * 1024);
        assert_eq!(settings.chunk_deadline_margin_sec, 60);
        assert_eq!(settings.chunk_backfill_days, 30);
        assert_eq!(settings.retry_max_attempts, 3);
        assert_eq!(settings.retry_backoff_base_sec, 15);
        assert_eq!(settings.job_staleness_timeout_sec, 21_600);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "tenant_fanout = 2\nchunk_backfill_days = 7\n").unwrap();
        let settings = PipelineSettings::load(Some(&path)).unwrap();
        assert_eq!(settings.tenant_fanout, 2);
        assert_eq!(settings.chunk_backfill_days, 7);
        assert_eq!(settings.table_fanout, 4);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "chunk_fanout = 0\n").unwrap();
        assert!(PipelineSettings::load(Some(&path)).is_err());
    }
}
