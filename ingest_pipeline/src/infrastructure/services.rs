// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Services
//!
//! Stateless technical services: the Arrow/Parquet record codec.

pub mod parquet_codec;

pub use parquet_codec::ParquetRecordCodec;
