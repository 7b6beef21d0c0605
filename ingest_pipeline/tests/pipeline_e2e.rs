// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline End-To-End Tests
//!
//! Full runs through the orchestrator over scripted sources and in-memory
//! stores: the incremental happy path, trigger coordination, suspension and
//! resumption, and the containment of per-tenant failures.

mod common;

use common::{source_record, TestHarness};

use ingest_pipeline::StartPipelineRequest;
use ingest_pipeline_bootstrap::CancellationToken;
use ingest_pipeline_domain::config::ScdType;
use ingest_pipeline_domain::entities::{ChunkStatus, JobStatus};
use ingest_pipeline_domain::value_objects::{TableName, Watermark};
use ingest_pipeline_domain::ErrorKind;

#[tokio::test]
async fn incremental_happy_path_syncs_transforms_and_advances_watermark() {
    let harness = TestHarness::new().await;
    let tenant = harness.seed_tenant("acme", "psa").await;
    harness.seed_incremental_endpoint("psa", "tickets").await;
    harness.seed_mapping("psa", "tickets", ScdType::Type2).await;
    let table = TableName::new("tickets").unwrap();

    harness
        .watermarks
        .set(&tenant, "psa", &table, &Watermark::parse("2025-01-01T00:00:00Z").unwrap())
        .await
        .unwrap();

    // Seven new records spread over 2025-01-02 .. 2025-01-04, one page
    harness.fetcher.script_page(
        "service/tickets",
        (1..=7)
            .map(|i| {
                source_record(
                    &format!("t{}", i),
                    "Open",
                    &format!("2025-01-{:02}T00:00:00Z", 2 + (i % 3)),
                )
            })
            .collect(),
    );

    let job_id = harness
        .orchestrator
        .start_pipeline(
            StartPipelineRequest {
                tenant_id: Some(tenant.clone()),
                ..Default::default()
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let job = harness.jobs.find_by_id(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.rollup.tenants_succeeded, 1);
    assert_eq!(job.rollup.records_processed, 7);

    // Every journaled raw file exists in the object store
    let chunks = harness.journal.list_for_job(&job_id, None).await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].status, ChunkStatus::Completed);
    assert!(!chunks[0].files_written.is_empty());
    for key in &chunks[0].files_written {
        assert!(harness.blobs.exists(key).await.unwrap(), "missing {}", key);
    }

    // Sink inserted seven current version-1 rows
    assert_eq!(harness.analytics.row_count(&table, &tenant), 7);
    for i in 1..=7 {
        let current = harness
            .analytics
            .current_rows_for(&table, &tenant, &format!("t{}", i));
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].record.metadata.record_version, Some(1));
    }

    // Watermark advanced to the maximum observed incremental value
    let watermark = harness
        .watermarks
        .get(&tenant, "psa", &table)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(watermark.to_rfc3339(), "2025-01-04T00:00:00Z");

    // Exactly one canonical transform for the table
    assert_eq!(harness.mappings.transform_invocations(), 1);
}

#[tokio::test]
async fn multiple_raw_batches_trigger_exactly_one_transform() {
    // Flush threshold is 3 records; two full pages produce two raw files.
    // The tenant processor must issue one transform consuming both; the
    // per-chunk trigger of the earlier design would issue two.
    let harness = TestHarness::new().await;
    let tenant = harness.seed_tenant("acme", "psa").await;
    harness.seed_incremental_endpoint("psa", "tickets").await;
    harness.seed_mapping("psa", "tickets", ScdType::Type2).await;
    let table = TableName::new("tickets").unwrap();
    harness
        .watermarks
        .set(&tenant, "psa", &table, &Watermark::parse("2025-01-01T00:00:00Z").unwrap())
        .await
        .unwrap();

    harness.fetcher.script_page(
        "service/tickets",
        (1..=3)
            .map(|i| source_record(&format!("a{}", i), "Open", "2025-01-02T00:00:00Z"))
            .collect(),
    );
    harness.fetcher.script_page(
        "service/tickets",
        (1..=3)
            .map(|i| source_record(&format!("b{}", i), "Open", "2025-01-03T00:00:00Z"))
            .collect(),
    );

    let job_id = harness
        .orchestrator
        .start_pipeline(
            StartPipelineRequest {
                tenant_id: Some(tenant.clone()),
                ..Default::default()
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let chunks = harness.journal.list_for_job(&job_id, None).await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert!(
        chunks[0].files_written.len() >= 2,
        "expected multiple raw batches, got {:?}",
        chunks[0].files_written
    );

    assert_eq!(harness.mappings.transform_invocations(), 1);
    assert_eq!(harness.analytics.row_count(&table, &tenant), 6);
}

#[tokio::test]
async fn tenant_with_no_enabled_services_is_a_completed_no_op() {
    let harness = TestHarness::new().await;
    let tenant_id = harness.seed_tenant("idle", "psa").await;
    // Disable the only binding
    let binding = ingest_pipeline_domain::config::ServiceBinding {
        service: "psa".into(),
        enabled: false,
        credentials_secret_ref: common::SECRET_REF.into(),
        extras: Default::default(),
    };
    harness
        .tenant_repo
        .seed_binding(&tenant_id, &binding)
        .await
        .unwrap();

    let job_id = harness
        .orchestrator
        .start_pipeline(
            StartPipelineRequest {
                tenant_id: Some(tenant_id),
                ..Default::default()
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let job = harness.jobs.find_by_id(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.rollup.records_processed, 0);
    assert_eq!(harness.mappings.transform_invocations(), 0);
}

#[tokio::test]
async fn one_failing_tenant_yields_partial_success_without_cancelling_peers() {
    let harness = TestHarness::new().await;
    let healthy = harness.seed_tenant("acme", "psa").await;
    // Enabled service with no endpoint catalog: contained configuration
    // failure for this tenant only
    harness.seed_tenant("broken", "ghost_service").await;

    harness.seed_incremental_endpoint("psa", "tickets").await;
    harness.seed_mapping("psa", "tickets", ScdType::Type2).await;
    harness
        .watermarks
        .set(
            &healthy,
            "psa",
            &TableName::new("tickets").unwrap(),
            &Watermark::parse("2025-01-01T00:00:00Z").unwrap(),
        )
        .await
        .unwrap();
    harness.fetcher.script_page(
        "service/tickets",
        vec![source_record("t1", "Open", "2025-01-02T00:00:00Z")],
    );

    let job_id = harness
        .orchestrator
        .start_pipeline(StartPipelineRequest::default(), CancellationToken::new())
        .await
        .unwrap();

    let job = harness.jobs.find_by_id(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::PartialSuccess);
    assert_eq!(job.rollup.tenants_total, 2);
    assert_eq!(job.rollup.tenants_succeeded, 1);
    assert_eq!(job.rollup.tenants_failed, 1);

    // The healthy tenant still synced and transformed
    let table = TableName::new("tickets").unwrap();
    assert_eq!(harness.analytics.row_count(&table, &healthy), 1);
}

#[tokio::test]
async fn empty_first_page_completes_with_zero_records_and_no_files() {
    let harness = TestHarness::new().await;
    let tenant = harness.seed_tenant("acme", "psa").await;
    harness.seed_incremental_endpoint("psa", "tickets").await;
    harness.seed_mapping("psa", "tickets", ScdType::Type2).await;
    harness
        .watermarks
        .set(
            &tenant,
            "psa",
            &TableName::new("tickets").unwrap(),
            &Watermark::parse("2025-01-01T00:00:00Z").unwrap(),
        )
        .await
        .unwrap();
    // No scripted pages: the very first fetch returns the empty page

    let job_id = harness
        .orchestrator
        .start_pipeline(
            StartPipelineRequest {
                tenant_id: Some(tenant.clone()),
                ..Default::default()
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let job = harness.jobs.find_by_id(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    let chunks = harness.journal.list_for_job(&job_id, None).await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].status, ChunkStatus::Completed);
    assert_eq!(chunks[0].records_processed, 0);
    assert!(chunks[0].files_written.is_empty());
    assert_eq!(harness.mappings.transform_invocations(), 0);
}

#[tokio::test]
async fn exact_page_boundary_terminates_on_the_empty_page() {
    // Page size equals total records: the loop must run one more fetch and
    // terminate on the empty page, not on a short-page heuristic
    let harness = TestHarness::new().await;
    let tenant = harness.seed_tenant("acme", "psa").await;
    harness.seed_incremental_endpoint("psa", "tickets").await;
    harness.seed_mapping("psa", "tickets", ScdType::Type2).await;
    harness
        .watermarks
        .set(
            &tenant,
            "psa",
            &TableName::new("tickets").unwrap(),
            &Watermark::parse("2025-01-01T00:00:00Z").unwrap(),
        )
        .await
        .unwrap();

    harness.fetcher.script_page(
        "service/tickets",
        (1..=3)
            .map(|i| source_record(&format!("t{}", i), "Open", "2025-01-02T00:00:00Z"))
            .collect(),
    );

    let job_id = harness
        .orchestrator
        .start_pipeline(
            StartPipelineRequest {
                tenant_id: Some(tenant.clone()),
                ..Default::default()
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let job = harness.jobs.find_by_id(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.rollup.records_processed, 3);
    // One data page plus the terminating empty page
    assert_eq!(harness.fetcher.fetch_count(), 2);
}

#[tokio::test]
async fn suspended_chunk_resumes_from_its_cursor_and_finishes_the_table() {
    let harness = TestHarness::new().await;
    let tenant = harness.seed_tenant("acme", "psa").await;
    harness.seed_incremental_endpoint("psa", "tickets").await;
    harness.seed_mapping("psa", "tickets", ScdType::Type2).await;
    let table = TableName::new("tickets").unwrap();
    let initial = Watermark::parse("2025-01-01T00:00:00Z").unwrap();
    harness
        .watermarks
        .set(&tenant, "psa", &table, &initial)
        .await
        .unwrap();

    // Three full pages scripted; the budget dies after two fetches
    for batch in ["a", "b", "c"] {
        harness.fetcher.script_page(
            "service/tickets",
            (1..=3)
                .map(|i| source_record(&format!("{}{}", batch, i), "Open", "2025-01-03T00:00:00Z"))
                .collect(),
        );
    }
    let cancel = CancellationToken::new();
    harness.fetcher.cancel_after(2, cancel.clone());

    let job_id = harness
        .orchestrator
        .start_pipeline(
            StartPipelineRequest {
                tenant_id: Some(tenant.clone()),
                ..Default::default()
            },
            cancel,
        )
        .await
        .unwrap();

    // First invocation: suspended with a cursor, files flushed so far kept
    let chunks = harness.journal.list_for_job(&job_id, None).await.unwrap();
    assert_eq!(chunks.len(), 1);
    let suspended = &chunks[0];
    assert_eq!(suspended.status, ChunkStatus::TimedOut);
    assert_eq!(suspended.last_error_kind, Some(ErrorKind::DeadlineElapsed));
    let cursor = suspended.cursor.as_ref().expect("cursor persisted");
    assert_eq!(cursor.last_page, 2);
    assert_eq!(suspended.records_processed, 6);
    assert_eq!(suspended.files_written.len(), 2);
    // No transform while the table has an unfinished chunk
    assert_eq!(harness.mappings.transform_invocations(), 0);
    // Watermark untouched
    assert_eq!(
        harness.watermarks.get(&tenant, "psa", &table).await.unwrap(),
        Some(initial)
    );

    // Continuation: resumes from page 3, finishes, triggers the transform
    let outcome = harness
        .resume_chunk
        .execute(&job_id, &suspended.chunk_id, &harness.run_context())
        .await
        .unwrap();
    assert_eq!(outcome.status, ChunkStatus::Completed);
    assert_eq!(outcome.records_processed, 9);
    assert_eq!(outcome.files_written.len(), 3);

    assert_eq!(harness.mappings.transform_invocations(), 1);
    assert_eq!(harness.analytics.row_count(&table, &tenant), 9);
    assert_eq!(
        harness
            .watermarks
            .get(&tenant, "psa", &table)
            .await
            .unwrap()
            .unwrap()
            .to_rfc3339(),
        "2025-01-03T00:00:00Z"
    );

    // Idempotent: resuming a completed chunk is a no-op
    let again = harness
        .resume_chunk
        .execute(&job_id, &suspended.chunk_id, &harness.run_context())
        .await
        .unwrap();
    assert_eq!(again.status, ChunkStatus::Completed);
    assert_eq!(again.records_processed, 9);
    assert_eq!(harness.mappings.transform_invocations(), 1);
}

#[tokio::test]
async fn transient_failures_retry_and_permanent_failures_hold_the_watermark() {
    let harness = TestHarness::new().await;
    let tenant = harness.seed_tenant("acme", "psa").await;
    harness.seed_incremental_endpoint("psa", "tickets").await;
    harness.seed_mapping("psa", "tickets", ScdType::Type2).await;
    let table = TableName::new("tickets").unwrap();
    harness
        .watermarks
        .set(&tenant, "psa", &table, &Watermark::parse("2025-01-01T00:00:00Z").unwrap())
        .await
        .unwrap();

    // One transient failure, then data; the chunk retries and completes
    harness
        .fetcher
        .script_error("service/tickets", ingest_pipeline_domain::IngestError::transient("503"));
    harness.fetcher.script_page(
        "service/tickets",
        vec![source_record("t1", "Open", "2025-01-02T00:00:00Z")],
    );

    let job_id = harness
        .orchestrator
        .start_pipeline(
            StartPipelineRequest {
                tenant_id: Some(tenant.clone()),
                ..Default::default()
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();
    let job = harness.jobs.find_by_id(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    let chunks = harness.journal.list_for_job(&job_id, None).await.unwrap();
    assert_eq!(chunks[0].attempt, 2);

    // A permanently failing table holds the watermark back
    let before = harness
        .watermarks
        .get(&tenant, "psa", &table)
        .await
        .unwrap()
        .unwrap();
    harness.fetcher.script_error(
        "service/tickets",
        ingest_pipeline_domain::IngestError::configuration("credentials rejected"),
    );
    let failed_job = harness
        .orchestrator
        .start_pipeline(
            StartPipelineRequest {
                tenant_id: Some(tenant.clone()),
                ..Default::default()
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();
    let job = harness.jobs.find_by_id(&failed_job).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    let chunks = harness.journal.list_for_job(&failed_job, None).await.unwrap();
    assert_eq!(chunks[0].status, ChunkStatus::Failed);
    assert_eq!(chunks[0].last_error_kind, Some(ErrorKind::Configuration));
    assert_eq!(chunks[0].attempt, 1, "permanent failures are not retried");

    let after = harness
        .watermarks
        .get(&tenant, "psa", &table)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn unknown_tenant_is_rejected_before_any_work() {
    let harness = TestHarness::new().await;
    let error = harness
        .orchestrator
        .start_pipeline(
            StartPipelineRequest {
                tenant_id: Some(ingest_pipeline_domain::value_objects::TenantId::new("ghost").unwrap()),
                ..Default::default()
            },
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidRequest);
    assert_eq!(harness.fetcher.fetch_count(), 0);
}

#[tokio::test]
async fn malformed_records_beyond_the_quota_fail_the_chunk() {
    let harness = TestHarness::new().await;
    let tenant = harness.seed_tenant("acme", "psa").await;
    harness.seed_incremental_endpoint("psa", "tickets").await;
    harness.seed_mapping("psa", "tickets", ScdType::Type2).await;
    harness
        .watermarks
        .set(
            &tenant,
            "psa",
            &TableName::new("tickets").unwrap(),
            &Watermark::parse("2025-01-01T00:00:00Z").unwrap(),
        )
        .await
        .unwrap();

    // Two of three entries unparseable: far beyond the 5% quota
    harness.fetcher.script_page(
        "service/tickets",
        vec![
            source_record("t1", "Open", "2025-01-02T00:00:00Z"),
            serde_json::json!("noise"),
            serde_json::json!(42),
        ],
    );

    let job_id = harness
        .orchestrator
        .start_pipeline(
            StartPipelineRequest {
                tenant_id: Some(tenant),
                ..Default::default()
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();
    let chunks = harness.journal.list_for_job(&job_id, None).await.unwrap();
    assert_eq!(chunks[0].status, ChunkStatus::Failed);
    assert_eq!(chunks[0].last_error_kind, Some(ErrorKind::DataFormat));
}
