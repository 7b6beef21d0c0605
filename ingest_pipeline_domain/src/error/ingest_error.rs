// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! This module provides the hierarchical error system for the ingestion
//! pipeline domain. Every failure carries a machine-readable [`ErrorKind`]
//! plus human-readable detail, so callers branch on the kind and never on
//! message text.
//!
//! ## Error Taxonomy
//!
//! The taxonomy mirrors the propagation policy of the pipeline:
//!
//! - **InvalidRequest**: malformed pipeline invocation, unknown tenant,
//!   missing table configuration. Surfaced to the caller immediately and
//!   never retried.
//! - **Configuration**: missing canonical mapping, missing endpoint
//!   configuration, missing `table_name`. Fails the affected component only;
//!   peers continue.
//! - **TransientExternal**: network errors, 5xx responses, object-store
//!   throttling. Retried with exponential backoff.
//! - **RateLimited**: a 429 from the source API, optionally carrying the
//!   server-provided `Retry-After` delay. Honored as a wait, not counted as
//!   an attempt.
//! - **DeadlineElapsed**: the chunk execution budget was reached. Not a
//!   failure; triggers suspension with a resumption cursor.
//! - **DataFormat**: unparseable source response or unreadable raw object.
//!   Individual records are skipped with a warning; a chunk fails with this
//!   kind once the skip quota is exceeded.
//! - **SinkConflict**: analytics-store write collision. Retried once, then
//!   escalated to `TransientExternal`.
//! - **Journal / Storage / Serialization**: infrastructure failures from the
//!   key-value journal, the object store, and payload encoding respectively.
//! - **Cancelled**: external cancellation observed at a suspension point.
//! - **Unexpected**: anything else; treated as permanent for the current
//!   attempt.
//!
//! ## Recovery Semantics
//!
//! [`IngestError::is_retryable`] reflects the transient set. Code that
//! schedules retries consults it instead of matching variants, so the retry
//! policy stays in one place.

use thiserror::Error;

/// Machine-readable error classification.
///
/// The kind is journaled on failed chunks (`last_error_kind`) and reported in
/// the job rollup, so it must round-trip through its string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    Configuration,
    TransientExternal,
    RateLimited,
    DeadlineElapsed,
    DataFormat,
    SinkConflict,
    Journal,
    Storage,
    Serialization,
    Cancelled,
    Unexpected,
}

impl ErrorKind {
    /// Stable string form used in the journal and in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Configuration => "configuration",
            ErrorKind::TransientExternal => "transient_external",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::DeadlineElapsed => "deadline_elapsed",
            ErrorKind::DataFormat => "data_format",
            ErrorKind::SinkConflict => "sink_conflict",
            ErrorKind::Journal => "journal",
            ErrorKind::Storage => "storage",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invalid_request" => Ok(ErrorKind::InvalidRequest),
            "configuration" => Ok(ErrorKind::Configuration),
            "transient_external" => Ok(ErrorKind::TransientExternal),
            "rate_limited" => Ok(ErrorKind::RateLimited),
            "deadline_elapsed" => Ok(ErrorKind::DeadlineElapsed),
            "data_format" => Ok(ErrorKind::DataFormat),
            "sink_conflict" => Ok(ErrorKind::SinkConflict),
            "journal" => Ok(ErrorKind::Journal),
            "storage" => Ok(ErrorKind::Storage),
            "serialization" => Ok(ErrorKind::Serialization),
            "cancelled" => Ok(ErrorKind::Cancelled),
            "unexpected" => Ok(ErrorKind::Unexpected),
            other => Err(format!("unknown error kind: {}", other)),
        }
    }
}

/// Domain-specific errors for the ingestion pipeline.
///
/// Each variant includes a descriptive message. Variants map one-to-one onto
/// [`ErrorKind`] except `RateLimited`, which additionally carries the
/// server-provided retry delay when the source API supplied one.
#[derive(Error, Debug, Clone)]
pub enum IngestError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transient external failure: {0}")]
    TransientExternal(String),

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Deadline elapsed: {0}")]
    DeadlineElapsed(String),

    #[error("Data format error: {0}")]
    DataFormat(String),

    #[error("Sink conflict: {0}")]
    SinkConflict(String),

    #[error("Journal error: {0}")]
    Journal(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl IngestError {
    /// Creates a new invalid-request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Creates a new configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a new transient external error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientExternal(msg.into())
    }

    /// Creates a new rate-limited error with an optional `Retry-After` delay
    pub fn rate_limited(msg: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        Self::RateLimited {
            message: msg.into(),
            retry_after_secs,
        }
    }

    /// Creates a new deadline-elapsed error
    pub fn deadline_elapsed(msg: impl Into<String>) -> Self {
        Self::DeadlineElapsed(msg.into())
    }

    /// Creates a new data-format error
    pub fn data_format(msg: impl Into<String>) -> Self {
        Self::DataFormat(msg.into())
    }

    /// Creates a new sink-conflict error
    pub fn sink_conflict(msg: impl Into<String>) -> Self {
        Self::SinkConflict(msg.into())
    }

    /// Creates a new journal error
    pub fn journal(msg: impl Into<String>) -> Self {
        Self::Journal(msg.into())
    }

    /// Creates a new storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Creates a new serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates a new cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Creates a new unexpected error
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::Unexpected(msg.into())
    }

    /// Gets the machine-readable error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            IngestError::Configuration(_) => ErrorKind::Configuration,
            IngestError::TransientExternal(_) => ErrorKind::TransientExternal,
            IngestError::RateLimited { .. } => ErrorKind::RateLimited,
            IngestError::DeadlineElapsed(_) => ErrorKind::DeadlineElapsed,
            IngestError::DataFormat(_) => ErrorKind::DataFormat,
            IngestError::SinkConflict(_) => ErrorKind::SinkConflict,
            IngestError::Journal(_) => ErrorKind::Journal,
            IngestError::Storage(_) => ErrorKind::Storage,
            IngestError::Serialization(_) => ErrorKind::Serialization,
            IngestError::Cancelled(_) => ErrorKind::Cancelled,
            IngestError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// Checks if the error is retryable under the transient-failure policy
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IngestError::TransientExternal(_) | IngestError::RateLimited { .. }
        )
    }

    /// Checks if the error suspends the chunk rather than failing it
    pub fn is_suspension(&self) -> bool {
        matches!(self, IngestError::DeadlineElapsed(_))
    }

    /// Gets the error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            IngestError::InvalidRequest(_) => "request",
            IngestError::Configuration(_) => "configuration",
            IngestError::TransientExternal(_) => "external",
            IngestError::RateLimited { .. } => "external",
            IngestError::DeadlineElapsed(_) => "budget",
            IngestError::DataFormat(_) => "data",
            IngestError::SinkConflict(_) => "sink",
            IngestError::Journal(_) => "journal",
            IngestError::Storage(_) => "storage",
            IngestError::Serialization(_) => "serialization",
            IngestError::Cancelled(_) => "cancellation",
            IngestError::Unexpected(_) => "internal",
        }
    }
}

// Implement conversion from standard library errors
impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Serialization(err.to_string())
    }
}
