// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Canonical Record Entity
//!
//! One record produced by the canonical transform: the mapped business
//! fields plus the pipeline metadata that travels with them into the
//! canonical Parquet object and the analytics store.
//!
//! ## Record Hash
//!
//! `record_hash` is a SHA-256 digest computed over the business fields only,
//! never the metadata. Two records with identical business content always
//! hash identically regardless of when they were ingested, which is what the
//! SCD type-2 sink compares to decide whether a new version is warranted.
//! The digest input is the canonical JSON serialization of the business
//! map; `serde_json` keeps object keys sorted (BTreeMap-backed maps), so the
//! serialization is stable across runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::services::datetime_serde;

/// Pipeline metadata attached to every canonical record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub source_system: String,
    pub source_table: String,
    pub canonical_table: String,
    #[serde(with = "datetime_serde")]
    pub ingestion_timestamp: DateTime<Utc>,
    /// SCD type-2 only: when this version became current
    #[serde(with = "datetime_serde::optional", default)]
    pub effective_start_date: Option<DateTime<Utc>>,
    /// SCD type-2 only: when this version was superseded (null while current)
    #[serde(with = "datetime_serde::optional", default)]
    pub expiration_date: Option<DateTime<Utc>>,
    /// SCD type-2 only
    #[serde(default)]
    pub is_current: Option<bool>,
    pub record_hash: String,
    /// SCD type-2 only: 1-based version counter per (tenant, id)
    #[serde(default)]
    pub record_version: Option<u32>,
}

/// One transformed record: business fields plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub business: Map<String, Value>,
    pub metadata: RecordMetadata,
}

impl CanonicalRecord {
    /// Digest over business fields only, hex-encoded
    pub fn compute_hash(business: &Map<String, Value>) -> String {
        let bytes = serde_json::to_vec(business).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }

    /// The record's primary key, read from the canonical `id` field
    ///
    /// Source systems disagree on whether ids are strings or integers;
    /// both are accepted and normalized to their string form.
    pub fn id(&self) -> Option<String> {
        match self.business.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The type-1 version column value (`last_updated`), normalized to a string
    pub fn version_value(&self) -> Option<String> {
        match self.business.get("last_updated") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Whether two records carry identical business content
    pub fn business_equals(&self, other_hash: &str) -> bool {
        self.metadata.record_hash == other_hash
    }

    /// Flattens business fields and metadata into one JSON object for
    /// Parquet serialization and analytics-store inserts
    ///
    /// Metadata column names are fixed; a mapping that produces a business
    /// field with a colliding name is rejected at mapping validation, not
    /// here.
    pub fn to_flat_json(&self) -> Map<String, Value> {
        let mut flat = self.business.clone();
        flat.insert(
            "source_system".into(),
            Value::String(self.metadata.source_system.clone()),
        );
        flat.insert(
            "source_table".into(),
            Value::String(self.metadata.source_table.clone()),
        );
        flat.insert(
            "canonical_table".into(),
            Value::String(self.metadata.canonical_table.clone()),
        );
        flat.insert(
            "ingestion_timestamp".into(),
            Value::String(self.metadata.ingestion_timestamp.to_rfc3339()),
        );
        if let Some(start) = self.metadata.effective_start_date {
            flat.insert(
                "effective_start_date".into(),
                Value::String(start.to_rfc3339()),
            );
        }
        // Absent while current; omitted rather than null so Parquet schema
        // inference never sees an all-null column
        if let Some(end) = self.metadata.expiration_date {
            flat.insert("expiration_date".into(), Value::String(end.to_rfc3339()));
        }
        if let Some(is_current) = self.metadata.is_current {
            flat.insert("is_current".into(), Value::Bool(is_current));
        }
        flat.insert(
            "record_hash".into(),
            Value::String(self.metadata.record_hash.clone()),
        );
        if let Some(version) = self.metadata.record_version {
            flat.insert("record_version".into(), Value::Number(version.into()));
        }
        flat
    }
}

/// Metadata column names reserved by the pipeline.
///
/// Mapping validation rejects canonical fields that collide with these.
pub const RESERVED_METADATA_FIELDS: &[&str] = &[
    "source_system",
    "source_table",
    "canonical_table",
    "ingestion_timestamp",
    "effective_start_date",
    "expiration_date",
    "is_current",
    "record_hash",
    "record_version",
];
