//! Monte Carlo trade-resampling simulator
//!
//! Projects plausible account trajectories by resampling a trader's own
//! historical outcomes with replacement, instead of assuming a parametric
//! return distribution. Pipeline, strictly downward:
//! normalize → pool → inject → trials → aggregate.

mod engine;
mod inject;
mod normalize;
mod pool;
mod stats;
mod types;

pub use types::{
    CancelToken, ConfigurationError, DataInsufficiencyError, InjectionPlan, MonteCarloResult,
    PercentileBands, ResamplePool, ReturnUnit, SimulationError, SimulationTrial,
    SimulationWarning, StrategyQuota, SummaryStatistics, ValueAtRisk,
};

use crate::config::SimulationParams;
use crate::data::HistoricalTrade;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeSet;

/// Minimum filtered trades for a statistically meaningful pool
pub const MIN_TRADES: usize = 10;

/// Run a simulation to completion
pub fn simulate(
    trades: &[HistoricalTrade],
    params: &SimulationParams,
) -> Result<MonteCarloResult, SimulationError> {
    simulate_with_cancel(trades, params, &CancelToken::new())
}

/// Run a simulation with a cooperative cancellation token
///
/// The token is checked between trials; cancellation discards the whole run
/// and returns `SimulationError::Cancelled`, never a partial result.
pub fn simulate_with_cancel(
    trades: &[HistoricalTrade],
    params: &SimulationParams,
    cancel: &CancelToken,
) -> Result<MonteCarloResult, SimulationError> {
    params.validate()?;
    let initial_capital = params
        .initial_capital
        .to_f64()
        .filter(|c| c.is_finite() && *c > 0.0)
        .ok_or(ConfigurationError::NonPositiveCapital(params.initial_capital))?;

    let mut filtered: Vec<&HistoricalTrade> = match &params.strategies {
        Some(names) => {
            let selected: Vec<&HistoricalTrade> = trades
                .iter()
                .filter(|t| names.contains(&t.strategy))
                .collect();
            for name in names {
                if !selected.iter().any(|t| &t.strategy == name) {
                    return Err(DataInsufficiencyError::EmptyStrategyPool(name.clone()).into());
                }
            }
            selected
        }
        None => trades.iter().collect(),
    };
    filtered.sort_by_key(|t| t.date_closed);
    if filtered.len() < MIN_TRADES {
        return Err(DataInsufficiencyError::NotEnoughTrades(filtered.len()).into());
    }
    let subset_active = params.strategies.is_some() && filtered.len() < trades.len();

    let mut warnings = Vec::new();
    let units = normalize::normalize(
        &filtered,
        params.resample_method,
        params.normalize_to_1_lot,
        subset_active,
        params.historical_initial_capital,
        &mut warnings,
    );
    let mut pool = pool::build_pool(units, params.resample_window);

    // Dropped units may have emptied a strategy; that escalates from a
    // warning to a hard error before any sampling happens.
    let expected: BTreeSet<&str> = filtered.iter().map(|t| t.strategy.as_str()).collect();
    for name in expected {
        if pool.per_strategy.get(name).is_none_or(Vec::is_empty) {
            return Err(DataInsufficiencyError::EmptyStrategyPool(name.to_string()).into());
        }
    }

    let plan = inject::plan_injection(&filtered, &mut pool, params, &mut warnings);
    let master_seed = params
        .random_seed
        .unwrap_or_else(|| rand::thread_rng().gen());

    tracing::info!(
        trials = params.num_simulations,
        length = params.simulation_length,
        pool_size = pool.effective_size,
        reserved_slots = plan.reserved_slots(),
        "running simulation"
    );

    let curves = engine::run_trials(&pool, &plan, params, initial_capital, master_seed, cancel)?;
    let (percentiles, statistics, simulations) = stats::aggregate(
        curves,
        initial_capital,
        params.trades_per_year,
        params.simulation_length,
    );

    if !warnings.is_empty() {
        tracing::warn!(count = warnings.len(), "simulation completed with warnings");
    }

    Ok(MonteCarloResult {
        percentiles,
        statistics,
        simulations,
        actual_resample_pool_size: pool.effective_size,
        parameters: params.clone(),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ResampleMethod, WorstCaseBasis, WorstCaseConfig, WorstCaseMode, WorstCaseSizing,
    };
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn trade(strategy: &str, day: u32, pl: Decimal, funds_at_close: Decimal) -> HistoricalTrade {
        trade_with_margin(strategy, day, pl, funds_at_close, dec!(0))
    }

    fn trade_with_margin(
        strategy: &str,
        day: u32,
        pl: Decimal,
        funds_at_close: Decimal,
        margin_req: Decimal,
    ) -> HistoricalTrade {
        HistoricalTrade {
            strategy: strategy.to_string(),
            date_opened: Utc.with_ymd_and_hms(2024, 1, day, 14, 0, 0).unwrap(),
            date_closed: Utc.with_ymd_and_hms(2024, 1, day, 21, 0, 0).unwrap(),
            pl,
            num_contracts: 1,
            margin_req,
            funds_at_close,
            max_loss: None,
        }
    }

    fn base_params() -> SimulationParams {
        SimulationParams {
            num_simulations: 1000,
            simulation_length: 20,
            resample_method: ResampleMethod::Trades,
            resample_window: None,
            strategies: None,
            initial_capital: dec!(10000),
            historical_initial_capital: None,
            trades_per_year: 252,
            random_seed: Some(42),
            normalize_to_1_lot: false,
            worst_case: WorstCaseConfig {
                enabled: false,
                percentage: 5,
                mode: WorstCaseMode::Pool,
                based_on: WorstCaseBasis::Simulation,
                sizing: WorstCaseSizing::Absolute,
            },
        }
    }

    /// 10 winners of +100 (strategy A) and 10 losers of -50 (strategy B)
    fn mixed_log() -> Vec<HistoricalTrade> {
        let mut trades = Vec::new();
        for day in 1..=10 {
            trades.push(trade("alpha", day, dec!(100), dec!(10000)));
            trades.push(trade("beta", day + 10, dec!(-50), dec!(10000)));
        }
        trades
    }

    #[test]
    fn test_end_to_end_mixed_pool() {
        let result = simulate(&mixed_log(), &base_params()).unwrap();

        assert_eq!(result.simulations.len(), 1000);
        assert_eq!(result.actual_resample_pool_size, 20);
        assert!(result.statistics.probability_of_profit > 0.0);
        assert!(result.statistics.probability_of_profit < 1.0);

        // Pool mean is +25 per draw; the median after 20 draws should land
        // within 5% of 25 * 20 = 500 dollars, i.e. 0.05 cumulative return
        let median_final = result.percentiles.p50[20];
        assert!(
            (median_final - 0.05).abs() <= 0.05 * 0.05,
            "median final return {median_final} too far from 0.05"
        );

        let bands = &result.percentiles;
        for step in 0..bands.steps.len() {
            assert!(bands.p5[step] <= bands.p25[step]);
            assert!(bands.p25[step] <= bands.p50[step]);
            assert!(bands.p50[step] <= bands.p75[step]);
            assert!(bands.p75[step] <= bands.p95[step]);
        }
    }

    #[test]
    fn test_deterministic_with_seed() {
        let trades = mixed_log();
        let params = base_params();

        let a = simulate(&trades, &params).unwrap();
        let b = simulate(&trades, &params).unwrap();
        assert_eq!(a.simulations, b.simulations);
    }

    #[test]
    fn test_conservation_under_trades_basis() {
        // Identical +150 trades: no randomness left, every trial's final
        // dollar P/L is exactly 150 * length
        let trades: Vec<HistoricalTrade> = (1..=10)
            .map(|day| trade("alpha", day, dec!(150), dec!(10000)))
            .collect();
        let mut params = base_params();
        params.simulation_length = 7;
        params.num_simulations = 100;

        let result = simulate(&trades, &params).unwrap();
        for trial in &result.simulations {
            let final_pl = trial.final_return * 10000.0;
            assert!((final_pl - 1050.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_percentage_basis_compounds() {
        // Every unit is exactly +1%: all trials compound to 1.01^5 - 1
        let trades: Vec<HistoricalTrade> = (1..=10)
            .map(|day| trade("alpha", day, dec!(100), dec!(10100)))
            .collect();
        let mut params = base_params();
        params.resample_method = ResampleMethod::Percentage;
        params.simulation_length = 5;
        params.num_simulations = 100;

        let result = simulate(&trades, &params).unwrap();
        let expected = 1.01f64.powi(5) - 1.0;
        for trial in &result.simulations {
            assert!((trial.final_return - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_horizon_invariant_across_worst_case_modes() {
        let trades = mixed_log();
        for mode in [WorstCaseMode::Pool, WorstCaseMode::Guarantee] {
            let mut params = base_params();
            params.num_simulations = 100;
            params.worst_case.enabled = true;
            params.worst_case.mode = mode;

            let result = simulate(&trades, &params).unwrap();
            for trial in &result.simulations {
                assert_eq!(trial.equity_curve.len(), 21);
            }
        }
    }

    #[test]
    fn test_guarantee_budget_accuracy() {
        // Single always-winning strategy with a 250 margin requirement, so
        // every negative step is a synthetic -250 loss. The synthetic
        // fraction per trial must be exactly ceil(length * pct / 100) /
        // length for every combination.
        let trades: Vec<HistoricalTrade> = (1..=10)
            .map(|day| trade_with_margin("alpha", day, dec!(100), dec!(10000), dec!(250)))
            .collect();

        for length in [1usize, 10, 500] {
            for pct in [1u8, 20] {
                let mut params = base_params();
                params.num_simulations = 100;
                params.simulation_length = length;
                params.worst_case = WorstCaseConfig {
                    enabled: true,
                    percentage: pct,
                    mode: WorstCaseMode::Guarantee,
                    based_on: WorstCaseBasis::Simulation,
                    sizing: WorstCaseSizing::Absolute,
                };

                let budget = ((length * pct as usize).div_ceil(100)).clamp(1, length);
                let result = simulate(&trades, &params).unwrap();
                for trial in &result.simulations {
                    let mut synthetic = 0usize;
                    for i in 1..trial.equity_curve.len() {
                        let step_pl =
                            (trial.equity_curve[i] - trial.equity_curve[i - 1]) * 10000.0;
                        if step_pl < 0.0 {
                            synthetic += 1;
                        }
                    }
                    assert_eq!(
                        synthetic, budget,
                        "length {length} pct {pct}: expected {budget} synthetic draws"
                    );
                }
            }
        }
    }

    #[test]
    fn test_guarantee_budget_splits_across_strategies() {
        let trades = mixed_log();
        let mut params = base_params();
        params.num_simulations = 100;
        params.simulation_length = 100;
        params.worst_case = WorstCaseConfig {
            enabled: true,
            percentage: 5,
            mode: WorstCaseMode::Guarantee,
            based_on: WorstCaseBasis::Simulation,
            sizing: WorstCaseSizing::Absolute,
        };

        // Budget 5 over two strategies; horizon unchanged either way
        let result = simulate(&trades, &params).unwrap();
        for trial in &result.simulations {
            assert_eq!(trial.equity_curve.len(), 101);
        }
    }

    #[test]
    fn test_strategy_filter_subset() {
        let trades = mixed_log();
        let mut params = base_params();
        params.strategies = Some(vec!["alpha".to_string()]);

        let result = simulate(&trades, &params).unwrap();
        // Only the 10 winning trades remain; every draw is +100
        assert_eq!(result.actual_resample_pool_size, 10);
        assert_eq!(result.statistics.probability_of_profit, 1.0);
    }

    #[test]
    fn test_unknown_strategy_in_filter() {
        let trades = mixed_log();
        let mut params = base_params();
        params.strategies = Some(vec!["gamma".to_string()]);

        let err = simulate(&trades, &params).unwrap_err();
        assert_eq!(
            err,
            SimulationError::InsufficientData(DataInsufficiencyError::EmptyStrategyPool(
                "gamma".to_string()
            ))
        );
    }

    #[test]
    fn test_too_few_trades() {
        let trades: Vec<HistoricalTrade> = (1..=5)
            .map(|day| trade("alpha", day, dec!(100), dec!(10000)))
            .collect();

        let err = simulate(&trades, &base_params()).unwrap_err();
        assert_eq!(
            err,
            SimulationError::InsufficientData(DataInsufficiencyError::NotEnoughTrades(5))
        );
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut params = base_params();
        params.num_simulations = 10;

        let err = simulate(&mixed_log(), &params).unwrap_err();
        assert!(matches!(err, SimulationError::Configuration(_)));
    }

    #[test]
    fn test_cancellation() {
        let token = CancelToken::new();
        token.cancel();

        let err = simulate_with_cancel(&mixed_log(), &base_params(), &token).unwrap_err();
        assert_eq!(err, SimulationError::Cancelled);
    }

    #[test]
    fn test_resample_window_shrinks_pool() {
        let trades = mixed_log();
        let mut params = base_params();
        params.resample_window = Some(4);

        let result = simulate(&trades, &params).unwrap();
        // 4 most recent units per strategy
        assert_eq!(result.actual_resample_pool_size, 8);
    }

    #[test]
    fn test_parameters_echoed() {
        let result = simulate(&mixed_log(), &base_params()).unwrap();
        assert_eq!(result.parameters.random_seed, Some(42));
        assert_eq!(result.parameters.num_simulations, 1000);
        assert!(result.warnings.is_empty());
    }
}
