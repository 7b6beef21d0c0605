// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Identifier Value Object
//!
//! Deterministic identifier for one bounded slice of one (tenant, table)
//! ingestion job. The identifier is a digest of
//! `(job_id, tenant_id, table_name, chunk_index)`, so re-planning the same
//! job always produces the same chunk identifiers. Resumption after a
//! timeout relies on this: the continuation invocation re-derives the
//! identifier and finds the persisted cursor under it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::value_objects::{JobId, TableName, TenantId};
use crate::IngestError;

/// Identifier of one `ChunkProgress` row, unique within its job.
///
/// 32 lowercase hex characters (the first 16 bytes of a SHA-256 digest).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    /// Derives the deterministic identifier for a planned chunk
    pub fn derive(job_id: &JobId, tenant_id: &TenantId, table_name: &TableName, chunk_index: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(job_id.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(tenant_id.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(table_name.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(chunk_index.to_be_bytes());
        let digest = hasher.finalize();
        Self(hex::encode(&digest[..16]))
    }

    /// Parses an identifier previously produced by [`ChunkId::derive`]
    pub fn from_string(s: &str) -> Result<Self, IngestError> {
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IngestError::invalid_request(format!(
                "invalid chunk id '{}': expected 32 hex characters",
                s
            )));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (JobId, TenantId, TableName) {
        (
            JobId::new(),
            TenantId::new("acme").unwrap(),
            TableName::new("tickets").unwrap(),
        )
    }

    #[test]
    fn derivation_is_deterministic() {
        let (job, tenant, table) = fixture();
        assert_eq!(
            ChunkId::derive(&job, &tenant, &table, 0),
            ChunkId::derive(&job, &tenant, &table, 0)
        );
    }

    #[test]
    fn index_discriminates_chunks() {
        let (job, tenant, table) = fixture();
        assert_ne!(
            ChunkId::derive(&job, &tenant, &table, 0),
            ChunkId::derive(&job, &tenant, &table, 1)
        );
    }

    #[test]
    fn parse_validates_shape() {
        let (job, tenant, table) = fixture();
        let id = ChunkId::derive(&job, &tenant, &table, 3);
        assert_eq!(ChunkId::from_string(id.as_str()).unwrap(), id);
        assert!(ChunkId::from_string("short").is_err());
        assert!(ChunkId::from_string("zz00000000000000000000000000000z").is_err());
    }
}
