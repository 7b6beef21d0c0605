// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Adapters
//!
//! Implementations of the domain ports over their external collaborators:
//! the HTTP source API, the object store, ClickHouse, the secrets store,
//! the declarative-configuration documents, and the notification sink.

pub mod clickhouse_store;
pub mod log_notifier;
pub mod mapping_store_adapter;
pub mod object_store_adapter;
pub mod secrets_adapter;
pub mod source_api_client;

pub use clickhouse_store::{ClickHouseSettings, ClickHouseStore};
pub use log_notifier::LogNotifier;
pub use mapping_store_adapter::BlobMappingStore;
pub use object_store_adapter::ObjectStoreAdapter;
pub use secrets_adapter::{FileSecretsProvider, StaticSecretsProvider};
pub use source_api_client::HttpPageFetcher;
