// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Port for record-set serialization.
//!
//! Raw and canonical objects are snappy-compressed Parquet whose schema is
//! derived from the record keys; historical raw objects may also be plain
//! JSON arrays. Encoding is CPU-bound, so the port is synchronous; callers
//! hold the bytes and hand them to the object store.

use serde_json::{Map, Value};

use crate::IngestError;

/// Encoder/decoder between JSON record sets and stored object bytes.
pub trait RecordCodec: Send + Sync {
    /// Encodes a non-empty record set to Parquet bytes (snappy)
    fn encode_records(&self, records: &[Map<String, Value>]) -> Result<Vec<u8>, IngestError>;

    /// Decodes stored object bytes, sniffing Parquet vs JSON by content
    fn decode_records(&self, bytes: &[u8]) -> Result<Vec<Map<String, Value>>, IngestError>;
}
