//! Trial engine
//!
//! Draws return units with replacement and folds them into cumulative-return
//! equity curves. Trials are independent once the pool and injection plan are
//! fixed, so they fan out across the rayon pool; each trial's generator is
//! derived purely from `(master_seed, trial_index)`, which keeps parallel and
//! sequential executions bit-identical.

use super::types::{CancelToken, InjectionPlan, ResamplePool, SimulationError};
use crate::config::{ResampleMethod, SimulationParams};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Run all trials, returning one cumulative-return curve per trial in
/// trial-index order.
pub(crate) fn run_trials(
    pool: &ResamplePool,
    plan: &InjectionPlan,
    params: &SimulationParams,
    initial_capital: f64,
    master_seed: u64,
    cancel: &CancelToken,
) -> Result<Vec<Vec<f64>>, SimulationError> {
    let draw_values = pool.flattened_values();
    let reserved: Vec<f64> = match plan {
        InjectionPlan::GuaranteedQuota { quotas } => quotas
            .values()
            .flat_map(|q| std::iter::repeat(q.loss_value).take(q.slots))
            .collect(),
        _ => Vec::new(),
    };
    let compounding = params.resample_method == ResampleMethod::Percentage;
    let length = params.simulation_length;

    (0..params.num_simulations)
        .into_par_iter()
        .map(|trial| {
            if cancel.is_cancelled() {
                return Err(SimulationError::Cancelled);
            }
            let seed = derive_trial_seed(master_seed, trial as u64);
            Ok(run_single_trial(
                seed,
                length,
                &draw_values,
                &reserved,
                initial_capital,
                compounding,
            ))
        })
        .collect()
}

/// SplitMix64 sub-seed derivation, part of the reproducibility contract
fn derive_trial_seed(master_seed: u64, trial_index: u64) -> u64 {
    let mut z = master_seed.wrapping_add(trial_index.wrapping_mul(0x9e3779b97f4a7c15));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

fn run_single_trial(
    seed: u64,
    length: usize,
    draw_values: &[f64],
    reserved: &[f64],
    initial_capital: f64,
    compounding: bool,
) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    // Reserved slots first, then ordinary draws, then a shuffle so the
    // guaranteed losses are interspersed rather than clustered.
    let mut steps: Vec<f64> = Vec::with_capacity(length);
    steps.extend_from_slice(reserved);
    for _ in reserved.len()..length {
        steps.push(draw_values[rng.gen_range(0..draw_values.len())]);
    }
    if !reserved.is_empty() {
        steps.shuffle(&mut rng);
    }

    let mut curve = Vec::with_capacity(length + 1);
    curve.push(0.0);
    if compounding {
        let mut equity = 1.0;
        for value in &steps {
            equity *= 1.0 + value;
            curve.push(equity - 1.0);
        }
    } else {
        let mut cumulative_pl = 0.0;
        for value in &steps {
            cumulative_pl += value;
            curve.push(cumulative_pl / initial_capital);
        }
    }
    curve
}
