// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

// Production code safety enforced via CI and `make lint-strict`
// (lib/bins checked separately from tests - tests may use unwrap/expect)

//! # Bootstrap Module
//!
//! The bootstrap module sits **outside** the enterprise application layers
//! (domain, application, infrastructure) and provides:
//!
//! - **Entry point** - Application lifecycle management
//! - **Argument parsing** - CLI argument parsing and validation
//! - **Logging** - Tracing subscriber initialization
//! - **Signal handling** - Graceful shutdown (SIGTERM, SIGINT)
//! - **Error handling** - Unix exit code mapping
//! - **Async coordination** - Shutdown coordination and cancellation
//!
//! ## Architecture Position
//!
//! The bootstrap layer depends on nothing inside the pipeline; the binary's
//! `main` parses arguments here, initializes logging here, builds the
//! composition root in the application crate, and maps the final result back
//! to an exit code here.

pub mod cli;
pub mod exit_code;
pub mod logger;
pub mod shutdown;

pub use cli::{parse_cli, Cli, Command};
pub use exit_code::ExitCode;
pub use logger::init_tracing;
pub use shutdown::{CancellationToken, ShutdownCoordinator};
