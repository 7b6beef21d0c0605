// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics Service
//!
//! Prometheus metrics for the ingestion pipeline. One registry per process;
//! the service is cheap to clone and shared across every processor. Chunk
//! processors record per-page counters and API latency, the sink records row
//! classifications, and errors are counted by kind so dashboards can
//! separate rate-limit pressure from real failures.

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Arc;

use ingest_pipeline_domain::services::SinkStats;
use ingest_pipeline_domain::IngestError;

const NAMESPACE: &str = "ingest_pipeline";

#[derive(Clone)]
pub struct MetricsService {
    registry: Arc<Registry>,
    chunks_completed_total: IntCounter,
    chunks_suspended_total: IntCounter,
    chunk_errors_total: IntCounterVec,
    pages_fetched_total: IntCounter,
    records_fetched_total: IntCounter,
    records_skipped_total: IntCounter,
    raw_bytes_written_total: IntCounter,
    raw_files_written_total: IntCounter,
    api_response_seconds: Histogram,
    sink_rows_total: IntCounterVec,
    active_chunks: IntGauge,
}

impl MetricsService {
    pub fn new() -> Result<Self, IngestError> {
        let registry = Registry::new();

        let chunks_completed_total = IntCounter::with_opts(
            Opts::new("chunks_completed_total", "Chunks that reached completed").namespace(NAMESPACE),
        )
        .map_err(|e| IngestError::unexpected(format!("Failed to create chunks_completed_total metric: {}", e)))?;

        let chunks_suspended_total = IntCounter::with_opts(
            Opts::new(
                "chunks_suspended_total",
                "Chunks suspended on their execution budget",
            )
            .namespace(NAMESPACE),
        )
        .map_err(|e| IngestError::unexpected(format!("Failed to create chunks_suspended_total metric: {}", e)))?;

        let chunk_errors_total = IntCounterVec::new(
            Opts::new("chunk_errors_total", "Chunk failures by error kind").namespace(NAMESPACE),
            &["kind"],
        )
        .map_err(|e| IngestError::unexpected(format!("Failed to create chunk_errors_total metric: {}", e)))?;

        let pages_fetched_total = IntCounter::with_opts(
            Opts::new("pages_fetched_total", "Source API pages fetched").namespace(NAMESPACE),
        )
        .map_err(|e| IngestError::unexpected(format!("Failed to create pages_fetched_total metric: {}", e)))?;

        let records_fetched_total = IntCounter::with_opts(
            Opts::new("records_fetched_total", "Source records fetched").namespace(NAMESPACE),
        )
        .map_err(|e| IngestError::unexpected(format!("Failed to create records_fetched_total metric: {}", e)))?;

        let records_skipped_total = IntCounter::with_opts(
            Opts::new(
                "records_skipped_total",
                "Malformed source records skipped with a warning",
            )
            .namespace(NAMESPACE),
        )
        .map_err(|e| IngestError::unexpected(format!("Failed to create records_skipped_total metric: {}", e)))?;

        let raw_bytes_written_total = IntCounter::with_opts(
            Opts::new("raw_bytes_written_total", "Raw Parquet bytes written").namespace(NAMESPACE),
        )
        .map_err(|e| IngestError::unexpected(format!("Failed to create raw_bytes_written_total metric: {}", e)))?;

        let raw_files_written_total = IntCounter::with_opts(
            Opts::new("raw_files_written_total", "Raw Parquet objects written").namespace(NAMESPACE),
        )
        .map_err(|e| IngestError::unexpected(format!("Failed to create raw_files_written_total metric: {}", e)))?;

        let api_response_seconds = Histogram::with_opts(
            HistogramOpts::new("api_response_seconds", "Source API response time")
                .namespace(NAMESPACE)
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )
        .map_err(|e| IngestError::unexpected(format!("Failed to create api_response_seconds metric: {}", e)))?;

        let sink_rows_total = IntCounterVec::new(
            Opts::new("sink_rows_total", "Analytics-store rows by classification").namespace(NAMESPACE),
            &["action"],
        )
        .map_err(|e| IngestError::unexpected(format!("Failed to create sink_rows_total metric: {}", e)))?;

        let active_chunks = IntGauge::with_opts(
            Opts::new("active_chunks", "Chunks currently in progress").namespace(NAMESPACE),
        )
        .map_err(|e| IngestError::unexpected(format!("Failed to create active_chunks metric: {}", e)))?;

        registry
            .register(Box::new(chunks_completed_total.clone()))
            .and_then(|_| registry.register(Box::new(chunks_suspended_total.clone())))
            .and_then(|_| registry.register(Box::new(chunk_errors_total.clone())))
            .and_then(|_| registry.register(Box::new(pages_fetched_total.clone())))
            .and_then(|_| registry.register(Box::new(records_fetched_total.clone())))
            .and_then(|_| registry.register(Box::new(records_skipped_total.clone())))
            .and_then(|_| registry.register(Box::new(raw_bytes_written_total.clone())))
            .and_then(|_| registry.register(Box::new(raw_files_written_total.clone())))
            .and_then(|_| registry.register(Box::new(api_response_seconds.clone())))
            .and_then(|_| registry.register(Box::new(sink_rows_total.clone())))
            .and_then(|_| registry.register(Box::new(active_chunks.clone())))
            .map_err(|e| IngestError::unexpected(format!("Failed to register metrics: {}", e)))?;

        Ok(Self {
            registry: Arc::new(registry),
            chunks_completed_total,
            chunks_suspended_total,
            chunk_errors_total,
            pages_fetched_total,
            records_fetched_total,
            records_skipped_total,
            raw_bytes_written_total,
            raw_files_written_total,
            api_response_seconds,
            sink_rows_total,
            active_chunks,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn chunk_started(&self) {
        self.active_chunks.inc();
    }

    pub fn chunk_completed(&self) {
        self.active_chunks.dec();
        self.chunks_completed_total.inc();
    }

    pub fn chunk_suspended(&self) {
        self.active_chunks.dec();
        self.chunks_suspended_total.inc();
    }

    pub fn chunk_failed(&self, kind: &str) {
        self.active_chunks.dec();
        self.chunk_errors_total.with_label_values(&[kind]).inc();
    }

    pub fn page_fetched(&self, records: u64, skipped: u64, latency_secs: f64) {
        self.pages_fetched_total.inc();
        self.records_fetched_total.inc_by(records);
        self.records_skipped_total.inc_by(skipped);
        self.api_response_seconds.observe(latency_secs);
    }

    pub fn raw_file_written(&self, bytes: u64) {
        self.raw_files_written_total.inc();
        self.raw_bytes_written_total.inc_by(bytes);
    }

    pub fn sink_applied(&self, stats: &SinkStats) {
        self.sink_rows_total
            .with_label_values(&["inserted"])
            .inc_by(stats.inserted);
        self.sink_rows_total
            .with_label_values(&["updated"])
            .inc_by(stats.updated);
        self.sink_rows_total
            .with_label_values(&["versioned"])
            .inc_by(stats.versioned);
        self.sink_rows_total
            .with_label_values(&["skipped"])
            .inc_by(stats.skipped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = MetricsService::new().unwrap();
        metrics.chunk_started();
        metrics.page_fetched(100, 2, 0.12);
        metrics.raw_file_written(4096);
        metrics.chunk_completed();
        metrics.sink_applied(&SinkStats {
            inserted: 7,
            updated: 0,
            versioned: 1,
            skipped: 2,
        });

        let families = metrics.registry().gather();
        assert!(!families.is_empty());
        let records = families
            .iter()
            .find(|f| f.get_name().contains("records_fetched_total"))
            .expect("records counter registered");
        assert_eq!(records.get_metric()[0].get_counter().value() as u64, 100);
    }
}
