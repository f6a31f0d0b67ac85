//! Simulator types, warnings, and errors

use crate::config::{ResampleMethod, SimulationParams};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// The atom drawn during resampling
///
/// `value` is a dollar P/L under the trade/daily bases and a fractional
/// return under the percentage basis.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnUnit {
    pub strategy: String,
    pub value: f64,
    pub basis: ResampleMethod,
    pub synthetic: bool,
}

/// Per-strategy return units available for sampling
///
/// Strategies iterate in lexicographic order (BTreeMap), which is part of the
/// reproducibility contract. `effective_size` is recorded before any
/// worst-case units are appended.
#[derive(Debug, Clone, Default)]
pub struct ResamplePool {
    pub per_strategy: BTreeMap<String, Vec<ReturnUnit>>,
    pub effective_size: usize,
}

impl ResamplePool {
    /// All unit values, strategies concatenated in lexicographic order
    pub fn flattened_values(&self) -> Vec<f64> {
        self.per_strategy
            .values()
            .flat_map(|units| units.iter().map(|u| u.value))
            .collect()
    }
}

/// Guaranteed worst-case slots for one strategy
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyQuota {
    /// Draw slots reserved per trial
    pub slots: usize,
    /// Value of the synthetic unit filling those slots
    pub loss_value: f64,
}

/// Worst-case injection resolved ahead of the trial loop
#[derive(Debug, Clone, PartialEq)]
pub enum InjectionPlan {
    /// Injection disabled
    None,
    /// Synthetic units were appended to the pool; exposure is probabilistic
    PoolAugmentation {
        units_per_strategy: BTreeMap<String, usize>,
    },
    /// Slots are reserved at draw time; exposure is guaranteed per trial
    GuaranteedQuota {
        quotas: BTreeMap<String, StrategyQuota>,
    },
}

impl InjectionPlan {
    /// Total reserved slots per trial (zero outside guarantee mode)
    pub fn reserved_slots(&self) -> usize {
        match self {
            InjectionPlan::GuaranteedQuota { quotas } => {
                quotas.values().map(|q| q.slots).sum()
            }
            _ => 0,
        }
    }
}

/// One simulated equity trajectory
///
/// `equity_curve[0]` is the 0.0 cumulative-return baseline; every later entry
/// is the cumulative fractional return after that step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationTrial {
    pub equity_curve: Vec<f64>,
    pub final_return: f64,
    pub max_drawdown: f64,
}

/// Cross-trial percentile bands, one value per step per band
#[derive(Debug, Clone, Serialize)]
pub struct PercentileBands {
    pub steps: Vec<usize>,
    pub p5: Vec<f64>,
    pub p25: Vec<f64>,
    pub p50: Vec<f64>,
    pub p75: Vec<f64>,
    pub p95: Vec<f64>,
}

/// Final-return percentiles, reported as signed decimal fractions
#[derive(Debug, Clone, Serialize)]
pub struct ValueAtRisk {
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
}

/// Summary statistics over all trials
#[derive(Debug, Clone, Serialize)]
pub struct SummaryStatistics {
    pub mean_final_value: f64,
    pub median_final_value: f64,
    pub std_final_value: f64,
    pub mean_total_return: f64,
    pub median_total_return: f64,
    pub mean_annualized_return: f64,
    pub median_annualized_return: f64,
    pub mean_max_drawdown: f64,
    pub median_max_drawdown: f64,
    pub mean_sharpe_ratio: f64,
    pub probability_of_profit: f64,
    pub value_at_risk: ValueAtRisk,
}

/// Complete output of a simulation run
#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloResult {
    pub percentiles: PercentileBands,
    pub statistics: SummaryStatistics,
    pub simulations: Vec<SimulationTrial>,
    /// Retained historical units across strategies, before injection
    pub actual_resample_pool_size: usize,
    /// Input parameters echoed for audit/export
    pub parameters: SimulationParams,
    pub warnings: Vec<SimulationWarning>,
}

impl MonteCarloResult {
    /// Format summary statistics as a table for CLI output
    pub fn format_table(&self) -> String {
        let s = &self.statistics;
        format!(
            r#"
══════════════════════════════════════════════════════
             MONTE CARLO PROJECTION
══════════════════════════════════════════════════════

OUTCOME ({} trials x {} steps)
───────────────────────────────────────────────────────
Mean Final Value:     {:.2}
Median Final Value:   {:.2}
Std Final Value:      {:.2}
Mean Total Return:    {:+.2}%
Median Total Return:  {:+.2}%
Mean Annualized:      {:+.2}%

RISK
───────────────────────────────────────────────────────
Mean Max Drawdown:    {:.2}%
Median Max Drawdown:  {:.2}%
Mean Sharpe Ratio:    {:.2}
Prob. of Profit:      {:.1}%
VaR (5/10/25):        {:+.2}% / {:+.2}% / {:+.2}%

POOL
───────────────────────────────────────────────────────
Resample Pool Size:   {}
Warnings:             {}
══════════════════════════════════════════════════════
"#,
            self.simulations.len(),
            self.parameters.simulation_length,
            s.mean_final_value,
            s.median_final_value,
            s.std_final_value,
            s.mean_total_return * 100.0,
            s.median_total_return * 100.0,
            s.mean_annualized_return * 100.0,
            s.mean_max_drawdown * 100.0,
            s.median_max_drawdown * 100.0,
            s.mean_sharpe_ratio,
            s.probability_of_profit * 100.0,
            s.value_at_risk.p5 * 100.0,
            s.value_at_risk.p10 * 100.0,
            s.value_at_risk.p25 * 100.0,
            self.actual_resample_pool_size,
            self.warnings.len(),
        )
    }
}

/// Non-fatal conditions surfaced alongside the result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SimulationWarning {
    /// A return unit was dropped during normalization
    UnitDropped { strategy: String, reason: String },
    /// Historical worst-case requests exceeded the horizon budget
    WorstCaseBudgetCapped { requested: usize, budget: usize },
    /// Relative sizing had no usable reference capital; absolute used instead
    RelativeSizingFallback { strategy: String },
    /// Subset simulated without historical_initial_capital; per-trade
    /// denominators used for percentage returns
    MissingHistoricalCapital,
}

impl fmt::Display for SimulationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationWarning::UnitDropped { strategy, reason } => {
                write!(f, "dropped unit for {strategy}: {reason}")
            }
            SimulationWarning::WorstCaseBudgetCapped { requested, budget } => {
                write!(
                    f,
                    "worst-case requests ({requested}) capped at horizon budget ({budget})"
                )
            }
            SimulationWarning::RelativeSizingFallback { strategy } => {
                write!(
                    f,
                    "no usable reference capital for {strategy}; absolute sizing used"
                )
            }
            SimulationWarning::MissingHistoricalCapital => {
                write!(
                    f,
                    "strategy subset simulated without historical_initial_capital; \
                     per-trade capital denominators used"
                )
            }
        }
    }
}

/// Invalid or contradictory parameters; fatal, never retried
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("num_simulations must be between 100 and 10000, got {0}")]
    NumSimulationsOutOfRange(usize),
    #[error("simulation_length must be at least 1")]
    ZeroSimulationLength,
    #[error("initial_capital must be positive, got {0}")]
    NonPositiveCapital(Decimal),
    #[error("trades_per_year must be at least 1")]
    ZeroTradesPerYear,
    #[error("resample_window must be at least 1 when set")]
    ZeroResampleWindow,
    #[error("worst_case.percentage must be between 1 and 20, got {0}")]
    WorstCasePercentageOutOfRange(u8),
}

/// The trade log cannot support the requested simulation; fatal
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataInsufficiencyError {
    #[error("at least 10 trades are required after filtering, got {0}")]
    NotEnoughTrades(usize),
    #[error("strategy {0:?} has no return units to sample")]
    EmptyStrategyPool(String),
}

/// Top-level simulator error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    InsufficientData(#[from] DataInsufficiencyError),
    #[error("simulation cancelled before completion")]
    Cancelled,
}

/// Cooperative cancellation flag, checked between trials
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the in-flight run discards all partial output
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
