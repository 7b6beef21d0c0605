// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Layer
//!
//! Everything that touches the outside world: port adapters (HTTP source
//! client, object store, ClickHouse, secrets, mappings, notifications),
//! SQLite journal repositories, the Parquet codec, Prometheus metrics,
//! runtime helpers, and process settings.

pub mod adapters;
pub mod config;
pub mod metrics;
pub mod repositories;
pub mod runtime;
pub mod services;
