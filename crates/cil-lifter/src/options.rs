// Copyright (c) The CilLift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lift configuration.

use serde::{Deserialize, Serialize};

/// Knobs for one lift run. The defaults give the hardened behavior; the
/// compatibility switch reproduces legacy ordering for side-by-side
/// output comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiftOptions {
    /// Flush residual stack values at forced block boundaries in LIFO pop
    /// order instead of source (FIFO) order.
    pub compat_lifo_flush: bool,
    /// Cooperative bound on decoded instructions per method, checked once
    /// per decode iteration. `None` means unbounded.
    pub step_limit: Option<usize>,
}

impl Default for LiftOptions {
    fn default() -> Self {
        Self {
            compat_lifo_flush: false,
            step_limit: None,
        }
    }
}
