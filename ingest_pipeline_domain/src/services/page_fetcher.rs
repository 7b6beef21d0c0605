// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Page Fetcher Port
//!
//! Abstraction over the paginated source API. One implementation exists per
//! pagination style rather than per endpoint; the query carries the declared
//! strategy and the implementation translates it into the wire parameters.
//!
//! The contract the chunk processor depends on:
//!
//! - pages are requested in `ordering_field` order,
//! - range filters are half-open: `incremental_field >= start` and
//!   `incremental_field < end`,
//! - a syntactically empty response array is the authoritative end-of-data
//!   signal (a short page is NOT; APIs legally return exact-size pages at
//!   the boundary),
//! - rate limits surface as `RateLimited` carrying any `Retry-After` delay.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::config::PaginationStrategy;
use crate::services::secrets_provider::SourceCredentials;
use crate::IngestError;

/// One page request against a source endpoint.
#[derive(Debug, Clone)]
pub struct PageQuery {
    /// Resource path on the source API, e.g. `service/tickets`
    pub endpoint_path: String,
    pub strategy: PaginationStrategy,
    /// 1-based page number (`strategy = Page`)
    pub page: u32,
    /// Row offset (`strategy = Offset`)
    pub offset: u64,
    pub page_size: u32,
    pub ordering_field: String,
    /// Range filter over the incremental field, when the chunk is bounded
    pub incremental_field: Option<String>,
    pub range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Requests-per-minute ceiling the fetcher must honor for this service
    pub rate_limit_per_minute: u32,
}

impl PageQuery {
    /// The query for the following page, advancing the row offset by the
    /// number of records actually returned (servers may under-fill pages)
    pub fn advance(&self, records_returned: u64) -> Self {
        let mut next = self.clone();
        next.page = self.page + 1;
        next.offset = self.offset + records_returned;
        next
    }
}

/// One fetched page.
#[derive(Debug, Clone)]
pub struct SourcePage {
    /// Records as returned by the API; empty means end of data
    pub records: Vec<Map<String, Value>>,
    /// Array entries that were not JSON objects, skipped with a warning;
    /// counted against the chunk's data-format quota
    pub malformed: u64,
    /// Round-trip latency, for metrics
    pub latency_ms: u64,
    /// Response body size in bytes, for metrics
    pub body_bytes: u64,
}

impl SourcePage {
    /// The authoritative end-of-stream test: a syntactically empty array.
    /// A page whose entries were all malformed is not the end; the skip
    /// quota decides its fate.
    pub fn is_end_of_data(&self) -> bool {
        self.records.is_empty() && self.malformed == 0
    }
}

/// Port over the paginated source API.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches one page, honoring the service rate limit
    ///
    /// Implementations wait on the token bucket and on `Retry-After` before
    /// returning; waits are not attempts and must not surface as errors
    /// unless the retry budget is genuinely exhausted.
    async fn fetch_page(
        &self,
        service: &str,
        credentials: &SourceCredentials,
        query: &PageQuery,
    ) -> Result<SourcePage, IngestError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_tracks_actual_record_counts() {
        let query = PageQuery {
            endpoint_path: "service/tickets".into(),
            strategy: PaginationStrategy::Page,
            page: 3,
            offset: 2000,
            page_size: 1000,
            ordering_field: "id".into(),
            incremental_field: None,
            range: None,
            rate_limit_per_minute: 60,
        };
        let next = query.advance(950);
        assert_eq!(next.page, 4);
        assert_eq!(next.offset, 2950);
    }

    #[test]
    fn empty_page_is_end_of_data() {
        let page = SourcePage {
            records: vec![],
            malformed: 0,
            latency_ms: 5,
            body_bytes: 2,
        };
        assert!(page.is_end_of_data());
    }
}
