// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface Module
//!
//! Bootstrap-layer CLI parsing for the pipeline binary. The subcommands map
//! one-to-one onto the core's invocation surface: starting a pipeline run,
//! resuming a timed-out chunk, manually re-running a canonical transform for
//! repair, and inspecting a job.
//!
//! Date arguments accept either `YYYY-MM-DD` or full RFC 3339 timestamps;
//! bare dates are interpreted as UTC midnight.

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Multi-tenant data ingestion and canonicalization pipeline
#[derive(Debug, Parser)]
#[command(name = "ingest_pipeline", version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the pipeline settings file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Start a pipeline run (single-tenant when --tenant is given)
    Start {
        /// Restrict the run to one tenant
        #[arg(long)]
        tenant: Option<String>,

        /// Restrict the run to one table
        #[arg(long)]
        table: Option<String>,

        /// Ignore stored watermarks and sync from the initial lookback
        #[arg(long)]
        force_full_sync: bool,

        /// Backfill window start (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_datetime, requires = "backfill_end")]
        backfill_start: Option<DateTime<Utc>>,

        /// Backfill window end (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_datetime, requires = "backfill_start")]
        backfill_end: Option<DateTime<Utc>>,

        /// Width of backfill date chunks in days
        #[arg(long)]
        backfill_chunk_days: Option<u32>,

        /// Page-size override for every endpoint of this run
        #[arg(long)]
        chunk_size: Option<u32>,
    },

    /// Resume a timed-out chunk from its persisted cursor (idempotent)
    ResumeChunk {
        /// Job the chunk belongs to
        #[arg(long)]
        job: String,

        /// Chunk identifier
        #[arg(long)]
        chunk: String,
    },

    /// Transform and load raw files manually (repair path)
    Transform {
        #[arg(long)]
        tenant: String,

        #[arg(long)]
        service: String,

        #[arg(long)]
        table: String,

        /// Raw object keys to consume
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Show the journaled state of a job
    ShowJob {
        /// Job identifier
        job: String,
    },
}

/// Parses CLI arguments, exiting with a usage error on failure
pub fn parse_cli() -> Cli {
    Cli::parse()
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc())
        .map_err(|_| format!("'{}' is neither YYYY-MM-DD nor RFC 3339", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_dates_as_utc_midnight() {
        let dt = parse_datetime("2025-01-04").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-01-04T00:00:00+00:00");
    }

    #[test]
    fn parses_rfc3339() {
        let dt = parse_datetime("2025-01-04T12:30:00Z").unwrap();
        assert_eq!(dt.timestamp(), 1736001000);
    }

    #[test]
    fn rejects_other_formats() {
        assert!(parse_datetime("01/04/2025").is_err());
    }

    #[test]
    fn start_accepts_backfill_window() {
        let cli = Cli::try_parse_from([
            "ingest_pipeline",
            "start",
            "--tenant",
            "acme",
            "--backfill-start",
            "2024-01-01",
            "--backfill-end",
            "2024-06-30",
        ])
        .unwrap();
        match cli.command {
            Command::Start {
                tenant,
                backfill_start,
                backfill_end,
                ..
            } => {
                assert_eq!(tenant.as_deref(), Some("acme"));
                assert!(backfill_start.is_some());
                assert!(backfill_end.is_some());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn backfill_start_requires_end() {
        let result = Cli::try_parse_from([
            "ingest_pipeline",
            "start",
            "--backfill-start",
            "2024-01-01",
        ]);
        assert!(result.is_err());
    }
}
