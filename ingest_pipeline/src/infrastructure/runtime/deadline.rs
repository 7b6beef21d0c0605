// /////////////////////////////////////////////////////////////////////////////
// Multi-Tenant Ingestion Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Execution Deadlines
//!
//! Wall-clock budgets propagated down the processing hierarchy. Each layer
//! hands its children a deadline no later than its own; the chunk processor
//! additionally reserves a safety margin so it can flush its batch and
//! persist a resumption cursor before the budget truly runs out.
//!
//! Deadlines are consulted only at suspension points; nothing here
//! interrupts work preemptively.

use std::time::{Duration, Instant};

/// An absolute wall-clock budget with a suspension safety margin.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    margin: Duration,
}

impl Deadline {
    /// Creates a deadline `budget` from now with the given margin
    pub fn within(budget: Duration, margin: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            margin,
        }
    }

    /// Derives a child deadline: `min(remaining budget, child budget)`
    pub fn child(&self, budget: Duration, margin: Duration) -> Self {
        let remaining = self.remaining();
        Self {
            at: Instant::now() + remaining.min(budget),
            margin,
        }
    }

    /// Time left before the deadline (zero once passed)
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Whether the remaining budget is inside the safety margin
    ///
    /// This is the signal to persist the cursor and suspend.
    pub fn margin_reached(&self) -> bool {
        self.remaining() <= self.margin
    }
}
