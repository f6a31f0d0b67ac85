//! Cross-trial aggregation
//!
//! Percentile bands per step plus summary statistics over final outcomes.

use super::types::{PercentileBands, SimulationTrial, SummaryStatistics, ValueAtRisk};

/// R-7 percentile: linear interpolation between order statistics on a sorted
/// slice, `p` in [0, 1]. This is the single interpolation rule used for both
/// the bands and VaR.
pub(crate) fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let h = p * (sorted.len() - 1) as f64;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Worst peak-to-trough decline of the equity multiplier implied by a
/// cumulative-return curve
fn max_drawdown(curve: &[f64]) -> f64 {
    let mut peak = 1.0f64;
    let mut worst = 0.0f64;
    for cumulative in curve {
        let equity = 1.0 + cumulative;
        if equity > peak {
            peak = equity;
        }
        let drawdown = (peak - equity) / peak;
        if drawdown > worst {
            worst = drawdown;
        }
    }
    worst
}

/// Per-trial Sharpe ratio over per-step returns of the equity multiplier,
/// annualized by sqrt(trades_per_year); population standard deviation, 0.0
/// when dispersion is 0 or the curve is degenerate.
fn sharpe_ratio(curve: &[f64], trades_per_year: u32) -> f64 {
    let mut step_returns = Vec::with_capacity(curve.len().saturating_sub(1));
    for i in 1..curve.len() {
        let prev = 1.0 + curve[i - 1];
        if prev <= 0.0 {
            continue;
        }
        let r = (1.0 + curve[i]) / prev - 1.0;
        if r.is_finite() {
            step_returns.push(r);
        }
    }
    if step_returns.len() < 2 {
        return 0.0;
    }
    let sd = std_dev(&step_returns);
    if sd == 0.0 {
        return 0.0;
    }
    mean(&step_returns) / sd * (trades_per_year as f64).sqrt()
}

/// Annualized return from a total return over the simulated horizon
fn annualize(total_return: f64, trades_per_year: u32, simulation_length: usize) -> f64 {
    let base = 1.0 + total_return;
    if base <= 0.0 {
        // The account is wiped out; compounding exponents are meaningless
        return -1.0;
    }
    base.powf(trades_per_year as f64 / simulation_length as f64) - 1.0
}

/// Fold raw curves into trials, percentile bands, and summary statistics
pub(crate) fn aggregate(
    curves: Vec<Vec<f64>>,
    initial_capital: f64,
    trades_per_year: u32,
    simulation_length: usize,
) -> (PercentileBands, SummaryStatistics, Vec<SimulationTrial>) {
    let trials: Vec<SimulationTrial> = curves
        .into_iter()
        .map(|curve| {
            let final_return = curve.last().copied().unwrap_or(0.0);
            let max_drawdown = max_drawdown(&curve);
            SimulationTrial {
                equity_curve: curve,
                final_return,
                max_drawdown,
            }
        })
        .collect();

    let steps: Vec<usize> = (0..=simulation_length).collect();
    let mut p5 = Vec::with_capacity(steps.len());
    let mut p25 = Vec::with_capacity(steps.len());
    let mut p50 = Vec::with_capacity(steps.len());
    let mut p75 = Vec::with_capacity(steps.len());
    let mut p95 = Vec::with_capacity(steps.len());
    let mut column = Vec::with_capacity(trials.len());
    for step in &steps {
        column.clear();
        column.extend(trials.iter().map(|t| t.equity_curve[*step]));
        column.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        p5.push(percentile(&column, 0.05));
        p25.push(percentile(&column, 0.25));
        p50.push(percentile(&column, 0.50));
        p75.push(percentile(&column, 0.75));
        p95.push(percentile(&column, 0.95));
    }
    let percentiles = PercentileBands {
        steps,
        p5,
        p25,
        p50,
        p75,
        p95,
    };

    let mut final_returns: Vec<f64> = trials.iter().map(|t| t.final_return).collect();
    final_returns.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let final_values: Vec<f64> = final_returns
        .iter()
        .map(|r| initial_capital * (1.0 + r))
        .collect();
    let drawdowns: Vec<f64> = {
        let mut d: Vec<f64> = trials.iter().map(|t| t.max_drawdown).collect();
        d.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        d
    };
    let sharpes: Vec<f64> = trials
        .iter()
        .map(|t| sharpe_ratio(&t.equity_curve, trades_per_year))
        .collect();

    let mean_total_return = mean(&final_returns);
    let median_total_return = percentile(&final_returns, 0.50);
    let profitable = final_returns.iter().filter(|r| **r > 0.0).count();

    let statistics = SummaryStatistics {
        mean_final_value: mean(&final_values),
        median_final_value: percentile(&final_values, 0.50),
        std_final_value: std_dev(&final_values),
        mean_total_return,
        median_total_return,
        mean_annualized_return: annualize(mean_total_return, trades_per_year, simulation_length),
        median_annualized_return: annualize(
            median_total_return,
            trades_per_year,
            simulation_length,
        ),
        mean_max_drawdown: mean(&drawdowns),
        median_max_drawdown: percentile(&drawdowns, 0.50),
        mean_sharpe_ratio: mean(&sharpes),
        probability_of_profit: profitable as f64 / trials.len().max(1) as f64,
        value_at_risk: ValueAtRisk {
            p5: percentile(&final_returns, 0.05),
            p10: percentile(&final_returns, 0.10),
            p25: percentile(&final_returns, 0.25),
        },
    };

    (percentiles, statistics, trials)
}
