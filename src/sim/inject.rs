//! Worst-case loss injection
//!
//! Synthesizes a catastrophic loss unit per strategy and resolves the
//! injection into a tagged plan before the trial loop runs, so the engine
//! stays branch-free per trial.

use super::types::{
    InjectionPlan, ResamplePool, ReturnUnit, SimulationWarning, StrategyQuota,
};
use crate::config::{
    ResampleMethod, SimulationParams, WorstCaseBasis, WorstCaseMode, WorstCaseSizing,
};
use crate::data::HistoricalTrade;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Loss magnitude plus the trade it was taken from, so relative sizing can
/// reference the account capital at that point in history.
struct LossReference<'a> {
    magnitude: Decimal,
    trade: &'a HistoricalTrade,
}

/// Resolve the injection into a plan, appending pool units in pool mode.
///
/// Must be called after the pool's effective size is recorded; pool-mode
/// augmentation changes the sampled population but not the reported size.
pub(crate) fn plan_injection(
    trades: &[&HistoricalTrade],
    pool: &mut ResamplePool,
    params: &SimulationParams,
    warnings: &mut Vec<SimulationWarning>,
) -> InjectionPlan {
    if !params.worst_case.enabled {
        return InjectionPlan::None;
    }

    let mut by_strategy: BTreeMap<&str, Vec<&HistoricalTrade>> = BTreeMap::new();
    for trade in trades {
        by_strategy
            .entry(trade.strategy.as_str())
            .or_default()
            .push(trade);
    }

    // Every pool strategy came from at least one filtered trade, so the
    // fallback chain always yields a magnitude here.
    let mut loss_values: BTreeMap<String, f64> = BTreeMap::new();
    for name in pool.per_strategy.keys() {
        let Some(strategy_trades) = by_strategy.get(name.as_str()) else {
            continue;
        };
        if let Some(value) = loss_value(name, strategy_trades, params, warnings) {
            loss_values.insert(name.clone(), value);
        }
    }

    let trade_counts: BTreeMap<&str, usize> = loss_values
        .keys()
        .map(|name| {
            let count = by_strategy.get(name.as_str()).map_or(0, Vec::len);
            (name.as_str(), count)
        })
        .collect();
    let allocations = allocate_budget(&trade_counts, params, warnings);

    match params.worst_case.mode {
        WorstCaseMode::Pool => {
            let mut units_per_strategy = BTreeMap::new();
            for (name, count) in allocations {
                if count == 0 {
                    continue;
                }
                let value = loss_values[name];
                if let Some(units) = pool.per_strategy.get_mut(name) {
                    for _ in 0..count {
                        units.push(ReturnUnit {
                            strategy: name.to_string(),
                            value,
                            basis: params.resample_method,
                            synthetic: true,
                        });
                    }
                    units_per_strategy.insert(name.to_string(), count);
                }
            }
            InjectionPlan::PoolAugmentation { units_per_strategy }
        }
        WorstCaseMode::Guarantee => {
            let quotas = allocations
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .map(|(name, count)| {
                    (
                        name.to_string(),
                        StrategyQuota {
                            slots: count,
                            loss_value: loss_values[name],
                        },
                    )
                })
                .collect();
            InjectionPlan::GuaranteedQuota { quotas }
        }
    }
}

/// Magnitude resolution order: margin requirement, reported max loss,
/// largest historical loss, then largest trade of any sign.
fn resolve_magnitude<'a>(trades: &[&'a HistoricalTrade]) -> Option<LossReference<'a>> {
    let mut best_margin: Option<&HistoricalTrade> = None;
    for trade in trades {
        if trade.margin_req > Decimal::ZERO
            && best_margin.is_none_or(|b| trade.margin_req > b.margin_req)
        {
            best_margin = Some(trade);
        }
    }
    if let Some(trade) = best_margin {
        return Some(LossReference {
            magnitude: trade.margin_req,
            trade,
        });
    }

    let mut best_max_loss: Option<(Decimal, &HistoricalTrade)> = None;
    for trade in trades {
        if let Some(max_loss) = trade.max_loss {
            let magnitude = max_loss.abs();
            if best_max_loss.is_none_or(|(b, _)| magnitude > b) {
                best_max_loss = Some((magnitude, trade));
            }
        }
    }
    if let Some((magnitude, trade)) = best_max_loss {
        return Some(LossReference { magnitude, trade });
    }

    let mut worst_loss: Option<&HistoricalTrade> = None;
    for trade in trades {
        if trade.pl < Decimal::ZERO && worst_loss.is_none_or(|b| trade.pl < b.pl) {
            worst_loss = Some(trade);
        }
    }
    if let Some(trade) = worst_loss {
        return Some(LossReference {
            magnitude: trade.pl.abs(),
            trade,
        });
    }

    // No losing trade on record: take the largest trade of any sign so the
    // chain still produces a magnitude.
    let mut largest: Option<&HistoricalTrade> = None;
    for trade in trades {
        if largest.is_none_or(|b| trade.pl.abs() > b.pl.abs()) {
            largest = Some(trade);
        }
    }
    largest.map(|trade| LossReference {
        magnitude: trade.pl.abs(),
        trade,
    })
}

/// Signed unit value for the synthetic loss, in the run's sampling basis
fn loss_value(
    strategy: &str,
    trades: &[&HistoricalTrade],
    params: &SimulationParams,
    warnings: &mut Vec<SimulationWarning>,
) -> Option<f64> {
    let reference = resolve_magnitude(trades)?;
    let magnitude = reference.magnitude;
    let percentage_basis = params.resample_method == ResampleMethod::Percentage;

    if params.worst_case.sizing == WorstCaseSizing::Relative {
        let reference_capital = reference.trade.capital_before();
        if reference_capital > Decimal::ZERO {
            let fraction = magnitude / reference_capital;
            let value = if percentage_basis {
                -fraction
            } else {
                -(fraction * params.initial_capital)
            };
            return value.to_f64().filter(|v| v.is_finite());
        }
        warnings.push(SimulationWarning::RelativeSizingFallback {
            strategy: strategy.to_string(),
        });
    }

    let value = if percentage_basis {
        -(magnitude / params.initial_capital)
    } else {
        -magnitude
    };
    value.to_f64().filter(|v| v.is_finite())
}

/// Per-strategy synthetic slot/unit counts under the horizon budget
///
/// `sim_budget = clamp(ceil(simulation_length * pct / 100), 1,
/// simulation_length)` is the hard cap either way; the stated percentage
/// always refers to the horizon, never to the uncapped historical figure.
fn allocate_budget<'a>(
    trade_counts: &BTreeMap<&'a str, usize>,
    params: &SimulationParams,
    warnings: &mut Vec<SimulationWarning>,
) -> BTreeMap<&'a str, usize> {
    let strategies: Vec<&str> = trade_counts.keys().copied().collect();
    if strategies.is_empty() {
        return BTreeMap::new();
    }

    let length = params.simulation_length;
    let pct = params.worst_case.percentage as usize;
    let sim_budget = ((length * pct).div_ceil(100)).clamp(1, length);

    match params.worst_case.based_on {
        WorstCaseBasis::Simulation => {
            // Even split, remainder round-robin in lexicographic order
            let base = sim_budget / strategies.len();
            let remainder = sim_budget % strategies.len();
            strategies
                .iter()
                .enumerate()
                .map(|(i, name)| (*name, base + usize::from(i < remainder)))
                .collect()
        }
        WorstCaseBasis::Historical => {
            let raw: Vec<usize> = strategies
                .iter()
                .map(|name| ((trade_counts[name] * pct + 50) / 100).max(1))
                .collect();
            let total_raw: usize = raw.iter().sum();
            if total_raw <= sim_budget {
                return strategies.iter().copied().zip(raw).collect();
            }

            warnings.push(SimulationWarning::WorstCaseBudgetCapped {
                requested: total_raw,
                budget: sim_budget,
            });
            redistribute(&strategies, &raw, total_raw, sim_budget)
        }
    }
}

/// Largest-remainder proportional redistribution of a capped budget,
/// preserving at least one slot per strategy when the budget allows
fn redistribute<'a>(
    strategies: &[&'a str],
    raw: &[usize],
    total_raw: usize,
    budget: usize,
) -> BTreeMap<&'a str, usize> {
    let scale = budget as f64 / total_raw as f64;
    let mut allocations: Vec<usize> = Vec::with_capacity(raw.len());
    let mut remainders: Vec<(f64, usize)> = Vec::with_capacity(raw.len());
    for (i, &request) in raw.iter().enumerate() {
        let exact = request as f64 * scale;
        let floor = exact.floor() as usize;
        allocations.push(floor);
        remainders.push((exact - floor as f64, i));
    }

    let leftover = budget - allocations.iter().sum::<usize>();
    remainders.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| strategies[a.1].cmp(strategies[b.1]))
    });
    for &(_, i) in remainders.iter().take(leftover) {
        allocations[i] += 1;
    }

    // Keep every strategy represented when the budget covers them all
    if budget >= strategies.len() {
        for i in 0..allocations.len() {
            while allocations[i] == 0 {
                let Some(donor) = allocations
                    .iter()
                    .enumerate()
                    .filter(|(_, a)| **a > 1)
                    .max_by_key(|(_, a)| **a)
                    .map(|(j, _)| j)
                else {
                    break;
                };
                allocations[donor] -= 1;
                allocations[i] += 1;
            }
        }
    }

    strategies.iter().copied().zip(allocations).collect()
}
