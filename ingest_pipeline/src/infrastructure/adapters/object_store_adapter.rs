// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Object Store Adapter
//!
//! [`BlobStore`] port implementation over the `object_store` crate. The
//! backing store is whatever the deployment configures (a local filesystem
//! prefix in development, S3-compatible storage in production, in-memory in
//! tests); this adapter only translates keys, bytes, and error shapes.
//! Store throttling surfaces as `TransientExternal` so the retry policy
//! treats it like any other transient external failure.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;

use ingest_pipeline_domain::services::BlobStore;
use ingest_pipeline_domain::IngestError;

/// Blob store backed by any `object_store` implementation.
pub struct ObjectStoreAdapter {
    inner: Arc<dyn ObjectStore>,
}

impl ObjectStoreAdapter {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner }
    }

    /// Local filesystem store rooted at `prefix` (development deployments)
    pub fn local(prefix: &str) -> Result<Self, IngestError> {
        std::fs::create_dir_all(prefix)?;
        let store = LocalFileSystem::new_with_prefix(prefix)
            .map_err(|e| IngestError::storage(format!("object store root unusable: {}", e)))?;
        Ok(Self::new(Arc::new(store)))
    }

    /// In-memory store (tests)
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    fn map_error(context: &str, error: object_store::Error) -> IngestError {
        match error {
            object_store::Error::Generic { .. } => {
                IngestError::transient(format!("{}: {}", context, error))
            }
            other => IngestError::storage(format!("{}: {}", context, other)),
        }
    }
}

#[async_trait]
impl BlobStore for ObjectStoreAdapter {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), IngestError> {
        let path = ObjectPath::from(key);
        self.inner
            .put(&path, Bytes::from(bytes).into())
            .await
            .map(|_| ())
            .map_err(|e| Self::map_error("object write failed", e))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IngestError> {
        let path = ObjectPath::from(key);
        match self.inner.get(&path).await {
            Ok(result) => {
                let bytes = result
                    .bytes()
                    .await
                    .map_err(|e| Self::map_error("object read failed", e))?;
                Ok(Some(bytes.to_vec()))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(Self::map_error("object read failed", e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, IngestError> {
        let path = ObjectPath::from(key);
        match self.inner.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(Self::map_error("object head failed", e)),
        }
    }
}
