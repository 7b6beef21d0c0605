// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Port over the object store holding raw and canonical Parquet objects.
//!
//! Objects are immutable after write and keys are chosen to prevent
//! collisions, so the port is put/get/exists only; deletion is out of scope.

use async_trait::async_trait;

use crate::IngestError;

/// Narrow object-store port.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes one immutable object
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), IngestError>;

    /// Reads one object; `None` when the key does not exist
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IngestError>;

    /// Checks key existence without fetching the body
    async fn exists(&self, key: &str) -> Result<bool, IngestError>;
}
