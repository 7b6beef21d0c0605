// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Port for the `LastUpdated` journal table.

use async_trait::async_trait;

use crate::value_objects::{TableName, TenantId, Watermark};
use crate::IngestError;

/// Journal store for sync watermarks, keyed `(tenant_id, service, table)`.
///
/// Written by the table processor only, and only after every chunk of the
/// table completed. A failed chunk leaves the watermark untouched so the
/// next run re-attempts the range; this trades rework for safety against
/// data gaps.
#[async_trait]
pub trait WatermarkRepository: Send + Sync {
    /// Reads the current watermark, if the table has ever completed a sync
    async fn get(
        &self,
        tenant_id: &TenantId,
        service: &str,
        table_name: &TableName,
    ) -> Result<Option<Watermark>, IngestError>;

    /// Advances the watermark
    async fn set(
        &self,
        tenant_id: &TenantId,
        service: &str,
        table_name: &TableName,
        watermark: &Watermark,
    ) -> Result<(), IngestError>;
}
