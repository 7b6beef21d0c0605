// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # HTTP Source API Client
//!
//! `reqwest`-backed implementation of the [`PageFetcher`] port for PSA-style
//! REST APIs: JSON array bodies, `page`/`pageSize` or `offset`/`pageSize`
//! pagination, `orderBy` sorting, and bracketed `conditions` range filters
//! over the incremental field.
//!
//! ## Rate-Limit Discipline
//!
//! One `governor` token bucket per service, sized by the query's declared
//! requests-per-minute ceiling, process-local (multiple workers against the
//! same service each run a fractional share of the ceiling; that split is an
//! operational configuration, not runtime coordination). The bucket gates
//! every request; a `429` with `Retry-After` is honored verbatim as a wait
//! and does not count as an attempt. A `429` without `Retry-After` surfaces
//! as `RateLimited` so the chunk retry policy backs off with jitter and the
//! attempt counter increments.
//!
//! ## Authentication
//!
//! Credentials arrive as an opaque map from the secrets store. `base_url` is
//! required; `username`/`password` select basic auth, otherwise `api_key`
//! sends a bearer token.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use ingest_pipeline_domain::config::PaginationStrategy;
use ingest_pipeline_domain::services::{PageFetcher, PageQuery, SourceCredentials, SourcePage};
use ingest_pipeline_domain::IngestError;

/// Credential map keys the client understands.
const CRED_BASE_URL: &str = "base_url";
const CRED_USERNAME: &str = "username";
const CRED_PASSWORD: &str = "password";
const CRED_API_KEY: &str = "api_key";

/// How many `Retry-After` waits one page fetch tolerates before giving up.
const MAX_RATE_LIMIT_WAITS: u32 = 5;

/// HTTP implementation of the page fetcher port.
pub struct HttpPageFetcher {
    client: reqwest::Client,
    limiters: RwLock<HashMap<String, Arc<DefaultDirectRateLimiter>>>,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| IngestError::unexpected(format!("http client construction failed: {}", e)))?;
        Ok(Self {
            client,
            limiters: RwLock::new(HashMap::new()),
        })
    }

    /// Token bucket for `service`, created on first use at `per_minute`.
    fn limiter_for(
        &self,
        service: &str,
        per_minute: u32,
    ) -> Result<Arc<DefaultDirectRateLimiter>, IngestError> {
        if let Some(limiter) = self.limiters.read().get(service) {
            return Ok(limiter.clone());
        }
        let quota = NonZeroU32::new(per_minute).ok_or_else(|| {
            IngestError::configuration(format!("service '{}' has a zero rate limit", service))
        })?;
        let mut limiters = self.limiters.write();
        let limiter = limiters
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::direct(Quota::per_minute(quota))))
            .clone();
        Ok(limiter)
    }

    fn request_params(query: &PageQuery) -> Vec<(String, String)> {
        let mut params = vec![
            (
                "orderBy".to_string(),
                format!("{} asc", query.ordering_field),
            ),
            ("pageSize".to_string(), query.page_size.to_string()),
        ];
        match query.strategy {
            PaginationStrategy::Page => params.push(("page".to_string(), query.page.to_string())),
            PaginationStrategy::Offset => {
                params.push(("offset".to_string(), query.offset.to_string()))
            }
        }
        if let (Some(field), Some((start, end))) = (&query.incremental_field, &query.range) {
            params.push((
                "conditions".to_string(),
                format!(
                    "{field} >= [{}] and {field} < [{}]",
                    start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                    end.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                ),
            ));
        }
        params
    }

    fn apply_auth(
        builder: reqwest::RequestBuilder,
        credentials: &SourceCredentials,
    ) -> Result<reqwest::RequestBuilder, IngestError> {
        if let (Some(user), Some(pass)) = (
            credentials.get(CRED_USERNAME),
            credentials.get(CRED_PASSWORD),
        ) {
            let token =
                base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, pass));
            return Ok(builder.header(reqwest::header::AUTHORIZATION, format!("Basic {}", token)));
        }
        if let Some(key) = credentials.get(CRED_API_KEY) {
            return Ok(builder.header(reqwest::header::AUTHORIZATION, format!("Bearer {}", key)));
        }
        Err(IngestError::configuration(
            "credentials carry neither username/password nor api_key",
        ))
    }

    /// Parses the JSON array body into records plus a malformed count.
    fn parse_body(body: &[u8]) -> Result<(Vec<Map<String, Value>>, u64), IngestError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| IngestError::data_format(format!("response is not JSON: {}", e)))?;
        let Value::Array(items) = value else {
            return Err(IngestError::data_format(
                "response body is not a JSON array",
            ));
        };
        let mut records = Vec::with_capacity(items.len());
        let mut malformed = 0u64;
        for item in items {
            match item {
                Value::Object(map) => records.push(map),
                _ => malformed += 1,
            }
        }
        Ok((records, malformed))
    }

    fn map_status(status: reqwest::StatusCode, retry_after: Option<u64>) -> IngestError {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return IngestError::rate_limited("source returned 429", retry_after);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return IngestError::configuration(format!(
                "source rejected the credentials ({})",
                status
            ));
        }
        if status.is_server_error() {
            return IngestError::transient(format!("source returned {}", status));
        }
        IngestError::unexpected(format!("source returned {}", status))
    }

    fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
        response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(
        &self,
        service: &str,
        credentials: &SourceCredentials,
        query: &PageQuery,
    ) -> Result<SourcePage, IngestError> {
        let base_url = credentials.require(CRED_BASE_URL)?;
        let url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            query.endpoint_path.trim_start_matches('/')
        );
        let params = Self::request_params(query);
        let limiter = self.limiter_for(service, query.rate_limit_per_minute)?;

        let mut waits = 0u32;
        loop {
            limiter.until_ready().await;

            let builder = Self::apply_auth(self.client.get(&url).query(&params), credentials)?;
            let started = Instant::now();
            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    IngestError::transient(format!("request to {} failed: {}", url, e))
                } else {
                    IngestError::unexpected(format!("request to {} failed: {}", url, e))
                }
            })?;
            let latency_ms = started.elapsed().as_millis() as u64;

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                // Retry-After is a wait, not an attempt; without the header
                // the chunk retry policy owns the backoff
                let retry_after = Self::retry_after_secs(&response);
                match retry_after {
                    Some(secs) if waits < MAX_RATE_LIMIT_WAITS => {
                        waits += 1;
                        warn!(
                            service,
                            url = %url,
                            retry_after_secs = secs,
                            wait = waits,
                            "rate limited, honoring Retry-After"
                        );
                        tokio::time::sleep(Duration::from_secs(secs)).await;
                        continue;
                    }
                    other => return Err(Self::map_status(status, other)),
                }
            }
            if !status.is_success() {
                return Err(Self::map_status(status, None));
            }

            let body = response.bytes().await.map_err(|e| {
                IngestError::transient(format!("reading response from {} failed: {}", url, e))
            })?;
            let (records, malformed) = Self::parse_body(&body)?;
            debug!(
                service,
                url = %url,
                page = query.page,
                records = records.len(),
                malformed,
                latency_ms,
                "page fetched"
            );
            return Ok(SourcePage {
                records,
                malformed,
                latency_ms,
                body_bytes: body.len() as u64,
            });
        }
    }
}
