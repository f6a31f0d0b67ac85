//! Resample pool construction
//!
//! Applies the recency window and records the effective pool size surfaced
//! to the caller.

use super::types::{ResamplePool, ReturnUnit};
use std::collections::BTreeMap;

/// Build the per-strategy pool, truncating each strategy to its last
/// `window` chronological units when a window is set.
pub(crate) fn build_pool(
    mut units: BTreeMap<String, Vec<ReturnUnit>>,
    window: Option<usize>,
) -> ResamplePool {
    if let Some(window) = window {
        for sequence in units.values_mut() {
            if sequence.len() > window {
                sequence.drain(..sequence.len() - window);
            }
        }
    }

    let effective_size = units.values().map(Vec::len).sum();
    ResamplePool {
        per_strategy: units,
        effective_size,
    }
}
