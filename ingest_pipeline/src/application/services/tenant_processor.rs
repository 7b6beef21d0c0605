// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tenant Processor
//!
//! Processes every enabled (service, table) pair for one tenant, then
//! triggers downstream canonicalization.
//!
//! ## Discovery
//!
//! Endpoint catalogs are read per enabled service; only endpoints with
//! `enabled = true` are retained (table names are explicit by type). A
//! tenant with zero enabled endpoints returns a completed no-op. A service
//! whose catalog is missing is a contained configuration failure: it fails
//! the tenant's rollup without touching the other services.
//!
//! ## Trigger Coordination
//!
//! The canonical transform for a table is scheduled **exactly once** per
//! tenant invocation, only after every chunk of that table reached a
//! terminal state, and only when the run produced new raw files. Chunks
//! never trigger transforms themselves; a per-chunk trigger caused duplicate
//! transforms in an earlier design and the scenario tests guard against its
//! return. A partial-success tenant still triggers transforms for the
//! tables that succeeded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use ingest_pipeline_domain::config::{EndpointConfig, ServiceBinding, TenantConfig};
use ingest_pipeline_domain::entities::{ProcessingJob, TableRunResult, TenantRunResult};
use ingest_pipeline_domain::error::ErrorKind;
use ingest_pipeline_domain::services::MappingStore;
use ingest_pipeline_domain::value_objects::TableName;

use crate::application::services::canonical_transformer::CanonicalTransformer;
use crate::application::services::chunk_processor::RunContext;
use crate::application::services::table_processor::TableProcessor;

/// Runs all tables of one tenant and coordinates the downstream triggers.
pub struct TenantProcessor {
    catalogs: Arc<dyn MappingStore>,
    tables: Arc<TableProcessor>,
    transformer: Arc<CanonicalTransformer>,
    /// Tables processed concurrently per tenant
    table_fanout: usize,
}

impl TenantProcessor {
    pub fn new(
        catalogs: Arc<dyn MappingStore>,
        tables: Arc<TableProcessor>,
        transformer: Arc<CanonicalTransformer>,
        table_fanout: usize,
    ) -> Self {
        Self {
            catalogs,
            tables,
            transformer,
            table_fanout,
        }
    }

    /// Processes one tenant end to end. Infallible by design: every failure
    /// is contained into the returned result.
    pub async fn process_tenant(
        &self,
        job: &ProcessingJob,
        tenant: &TenantConfig,
        ctx: &RunContext,
    ) -> TenantRunResult {
        let started = Instant::now();
        let tenant_id = tenant.tenant_id.clone();

        let (pairs, failed_services) = self.discover(job, tenant).await;
        if pairs.is_empty() && failed_services.is_empty() {
            info!(tenant = %tenant_id, "no enabled endpoints, tenant is a no-op");
            return TenantRunResult {
                tenant_id,
                tables: Vec::new(),
                failed_services,
                records_processed: 0,
                duration_ms: started.elapsed().as_millis() as u64,
                no_op: true,
            };
        }

        // Canonical target per (service, table), needed again post-run
        let canonical_targets: HashMap<(String, TableName), TableName> = pairs
            .iter()
            .map(|(binding, endpoint)| {
                (
                    (binding.service.clone(), endpoint.table_name.clone()),
                    endpoint.canonical_table.clone(),
                )
            })
            .collect();

        let mut tables: Vec<TableRunResult> = stream::iter(pairs)
            .map(|(binding, endpoint)| {
                let tables = self.tables.clone();
                let job = job.clone();
                let tenant_id = tenant.tenant_id.clone();
                let ctx = ctx.clone();
                async move {
                    match tables
                        .process_table(&job, &tenant_id, &binding, &endpoint, &ctx)
                        .await
                    {
                        Ok(result) => result,
                        Err(error) => {
                            warn!(
                                tenant = %tenant_id,
                                table = %endpoint.table_name,
                                error = %error,
                                "table run failed before its chunks settled"
                            );
                            TableRunResult {
                                service: binding.service.clone(),
                                table_name: endpoint.table_name.clone(),
                                chunks: Vec::new(),
                                records_processed: 0,
                                files_written: Vec::new(),
                                error_kind: Some(error.kind()),
                            }
                        }
                    }
                }
            })
            .buffer_unordered(self.table_fanout)
            .collect()
            .await;

        // Post-table coordination: one transform per table with new raw
        // files, after every chunk of that table is terminal
        for table in &mut tables {
            if table.files_written.is_empty() {
                continue;
            }
            let canonical = canonical_targets
                .get(&(table.service.clone(), table.table_name.clone()))
                .cloned()
                .unwrap_or_else(|| table.table_name.clone());
            match self
                .transformer
                .transform_and_load(&tenant_id, &table.service, &canonical, &table.files_written)
                .await
            {
                Ok(stats) => {
                    info!(
                        tenant = %tenant_id,
                        table = %table.table_name,
                        inserted = stats.inserted,
                        updated = stats.updated,
                        versioned = stats.versioned,
                        skipped = stats.skipped,
                        "canonical transform completed"
                    );
                }
                Err(error) => {
                    warn!(
                        tenant = %tenant_id,
                        table = %table.table_name,
                        error = %error,
                        "canonical transform failed"
                    );
                    table.error_kind = Some(error.kind());
                }
            }
        }

        let records_processed = tables.iter().map(|t| t.records_processed).sum();
        TenantRunResult {
            tenant_id,
            tables,
            failed_services,
            records_processed,
            duration_ms: started.elapsed().as_millis() as u64,
            no_op: false,
        }
    }

    /// Reads endpoint catalogs for the tenant's enabled services.
    async fn discover(
        &self,
        job: &ProcessingJob,
        tenant: &TenantConfig,
    ) -> (
        Vec<(ServiceBinding, EndpointConfig)>,
        Vec<(String, ErrorKind)>,
    ) {
        let mut pairs = Vec::new();
        let mut failed = Vec::new();
        for binding in tenant.enabled_services() {
            let catalog = match self.catalogs.endpoint_catalog(&binding.service).await {
                Ok(Some(catalog)) => catalog,
                Ok(None) => {
                    warn!(
                        tenant = %tenant.tenant_id,
                        service = %binding.service,
                        "enabled service has no endpoint catalog"
                    );
                    failed.push((binding.service.clone(), ErrorKind::Configuration));
                    continue;
                }
                Err(error) => {
                    warn!(
                        tenant = %tenant.tenant_id,
                        service = %binding.service,
                        error = %error,
                        "endpoint catalog unreadable"
                    );
                    failed.push((binding.service.clone(), error.kind()));
                    continue;
                }
            };
            for endpoint in catalog.enabled_endpoints() {
                if let Some(filter) = &job.table_filter {
                    if &endpoint.table_name != filter {
                        continue;
                    }
                }
                pairs.push((binding.clone(), endpoint.clone()));
            }
        }
        (pairs, failed)
    }
}
