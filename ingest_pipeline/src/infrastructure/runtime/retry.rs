// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Retry Policy
//!
//! Exponential backoff with full jitter for transient failures. The policy
//! governs chunk attempts: up to `max_attempts` per chunk, delay
//! `base * factor^(attempt-1)` drawn uniformly from zero (full jitter) so
//! concurrent chunks of the same service do not thunder in lockstep.
//!
//! Rate-limit waits honored by the page fetcher are not attempts and never
//! pass through this policy; a server-provided `Retry-After` on an error
//! that does reach the policy is honored as the delay floor.

use std::time::Duration;

use rand::Rng;

use ingest_pipeline_domain::IngestError;

/// Retry policy for transient chunk failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(15),
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            factor,
        }
    }

    /// Whether another attempt is allowed after `attempts_used`
    pub fn allows_retry(&self, error: &IngestError, attempts_used: u32) -> bool {
        error.is_retryable() && attempts_used < self.max_attempts
    }

    /// Full-jitter backoff delay before the attempt following `attempts_used`
    ///
    /// When the error carried a `Retry-After`, that value is the floor.
    pub fn backoff_delay(&self, attempts_used: u32, error: &IngestError) -> Duration {
        let exponent = attempts_used.saturating_sub(1);
        let ceiling = self.base_delay.as_secs_f64() * self.factor.powi(exponent as i32);
        let jittered = rand::rng().random_range(0.0..=ceiling);
        let delay = Duration::from_secs_f64(jittered);

        match error {
            IngestError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => delay.max(Duration::from_secs(*secs)),
            _ => delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_errors_are_never_retried() {
        let policy = RetryPolicy::default();
        assert!(!policy.allows_retry(&IngestError::configuration("no mapping"), 1));
        assert!(!policy.allows_retry(&IngestError::data_format("bad record"), 1));
    }

    #[test]
    fn transient_errors_retry_up_to_the_cap() {
        let policy = RetryPolicy::default();
        let err = IngestError::transient("503");
        assert!(policy.allows_retry(&err, 1));
        assert!(policy.allows_retry(&err, 2));
        assert!(!policy.allows_retry(&err, 3));
    }

    #[test]
    fn jittered_delay_stays_under_the_exponential_ceiling() {
        let policy = RetryPolicy::new(3, Duration::from_secs(15), 2.0);
        let err = IngestError::transient("timeout");
        for attempts_used in 1..=3 {
            let ceiling = 15.0 * 2.0_f64.powi(attempts_used as i32 - 1);
            for _ in 0..50 {
                let delay = policy.backoff_delay(attempts_used, &err);
                assert!(delay.as_secs_f64() <= ceiling + f64::EPSILON);
            }
        }
    }

    #[test]
    fn retry_after_is_the_delay_floor() {
        let policy = RetryPolicy::default();
        let err = IngestError::rate_limited("429", Some(120));
        let delay = policy.backoff_delay(1, &err);
        assert!(delay >= Duration::from_secs(120));
    }
}
