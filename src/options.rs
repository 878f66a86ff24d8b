// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

use serde::Deserialize;

/// Options for an [`AggregateCollection`](crate::AggregateCollection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AggregateOptions {
    /// Stage each accumulated row in a copy of the compound record, so a data
    /// error in any member (an integer overflow, an ill-typed value) leaves the
    /// record as it was. Shape errors never touch the record either way.
    pub atomic_accumulate: bool,

    /// Clamp slightly negative variances, produced by floating-point
    /// cancellation in `E[x²] - E[x]²`, to zero.
    pub clamp_negative_variance: bool,
}

impl AggregateOptions {
    pub fn default_for_engine() -> Self {
        Self {
            atomic_accumulate: false,
            clamp_negative_variance: true,
        }
    }

    pub fn default_for_test() -> Self {
        Self {
            atomic_accumulate: true,
            clamp_negative_variance: true,
        }
    }
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self::default_for_engine()
    }
}
