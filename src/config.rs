//! Configuration types for riskcast

use crate::sim::ConfigurationError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub simulation: SimulationParams,
    pub telemetry: TelemetryConfig,
}

/// Trade log location
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    pub trades_path: PathBuf,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Full parameter set for a simulation run
///
/// Every field is explicit; nothing is defaulted behind the caller's back.
/// The struct is echoed verbatim into the result for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Number of independent trials (100..=10000)
    pub num_simulations: usize,
    /// Number of return units drawn per trial
    pub simulation_length: usize,
    /// Sampling basis for return units
    pub resample_method: ResampleMethod,
    /// Keep only the last N units per strategy (absolute count; unset = full history)
    pub resample_window: Option<usize>,
    /// Strategy inclusion filter (unset = simulate every strategy in the log)
    pub strategies: Option<Vec<String>>,
    /// Starting account capital for the projected trajectories
    pub initial_capital: Decimal,
    /// Account capital at the start of the historical log; used to reconstruct
    /// percentage returns when only a subset of strategies is simulated
    pub historical_initial_capital: Option<Decimal>,
    /// Expected return units per year, for annualization
    pub trades_per_year: u32,
    /// Master seed; unset means a non-reproducible run
    pub random_seed: Option<u64>,
    /// Scale dollar P/L to a 1-lot equivalent before sampling
    pub normalize_to_1_lot: bool,
    /// Synthetic worst-case loss injection
    pub worst_case: WorstCaseConfig,
}

/// Worst-case injection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorstCaseConfig {
    pub enabled: bool,
    /// Share of the horizon reserved for synthetic losses (1..=20)
    pub percentage: u8,
    pub mode: WorstCaseMode,
    pub based_on: WorstCaseBasis,
    pub sizing: WorstCaseSizing,
}

/// Sampling basis for return units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleMethod {
    /// One unit per trade, dollar P/L
    Trades,
    /// One unit per (day, strategy), dollar P/L summed
    Daily,
    /// One unit per trade, fractional return on capital
    Percentage,
}

/// How synthetic losses enter a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorstCaseMode {
    /// Merge synthetic units into the pool; exposure is probabilistic
    Pool,
    /// Reserve exact draw slots per trial; exposure is guaranteed
    Guarantee,
}

/// What the worst-case budget percentage refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorstCaseBasis {
    /// Percentage of the simulation horizon
    Simulation,
    /// Percentage of each strategy's historical trade count, capped at the
    /// horizon budget
    Historical,
}

/// How the injected loss magnitude is scaled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorstCaseSizing {
    /// Raw historical dollar magnitude
    Absolute,
    /// Same fraction of capital as at the time of the historical loss
    Relative,
}

impl SimulationParams {
    /// Validate parameter ranges before a run
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.num_simulations < 100 || self.num_simulations > 10_000 {
            return Err(ConfigurationError::NumSimulationsOutOfRange(
                self.num_simulations,
            ));
        }
        if self.simulation_length < 1 {
            return Err(ConfigurationError::ZeroSimulationLength);
        }
        if self.initial_capital <= Decimal::ZERO {
            return Err(ConfigurationError::NonPositiveCapital(self.initial_capital));
        }
        if self.trades_per_year < 1 {
            return Err(ConfigurationError::ZeroTradesPerYear);
        }
        if self.resample_window == Some(0) {
            return Err(ConfigurationError::ZeroResampleWindow);
        }
        if self.worst_case.enabled
            && !(1..=20).contains(&self.worst_case.percentage)
        {
            return Err(ConfigurationError::WorstCasePercentageOutOfRange(
                self.worst_case.percentage,
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_params() -> SimulationParams {
        SimulationParams {
            num_simulations: 1000,
            simulation_length: 252,
            resample_method: ResampleMethod::Trades,
            resample_window: None,
            strategies: None,
            initial_capital: dec!(100000),
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

    #[test]
    fn test_config_deserialize() {
        let toml = r#"
            [data]
            trades_path = "./trades.csv"

            [simulation]
            num_simulations = 1000
            simulation_length = 252
            resample_method = "percentage"
            trades_per_year = 252
            initial_capital = 100000.0
            random_seed = 42
            normalize_to_1_lot = false

            [simulation.worst_case]
            enabled = true
            percentage = 5
            mode = "guarantee"
            based_on = "historical"
            sizing = "relative"

            [telemetry]
            log_level = "info"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.simulation.resample_method,
            ResampleMethod::Percentage
        );
        assert_eq!(config.simulation.worst_case.mode, WorstCaseMode::Guarantee);
        assert_eq!(
            config.simulation.worst_case.based_on,
            WorstCaseBasis::Historical
        );
        assert!(config.simulation.strategies.is_none());
        assert_eq!(config.simulation.random_seed, Some(42));
    }

    #[test]
    fn test_validate_ok() {
        assert!(base_params().validate().is_ok());
    }

    #[test]
    fn test_validate_trial_count() {
        let mut params = base_params();
        params.num_simulations = 99;
        assert!(matches!(
            params.validate(),
            Err(ConfigurationError::NumSimulationsOutOfRange(99))
        ));

        params.num_simulations = 10_001;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_length() {
        let mut params = base_params();
        params.simulation_length = 0;
        assert!(matches!(
            params.validate(),
            Err(ConfigurationError::ZeroSimulationLength)
        ));
    }

    #[test]
    fn test_validate_capital() {
        let mut params = base_params();
        params.initial_capital = dec!(0);
        assert!(matches!(
            params.validate(),
            Err(ConfigurationError::NonPositiveCapital(_))
        ));
    }

    #[test]
    fn test_validate_worst_case_percentage() {
        let mut params = base_params();
        params.worst_case.enabled = true;
        params.worst_case.percentage = 21;
        assert!(matches!(
            params.validate(),
            Err(ConfigurationError::WorstCasePercentageOutOfRange(21))
        ));

        // Out-of-range percentage is inert while injection is disabled
        params.worst_case.enabled = false;
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate_window() {
        let mut params = base_params();
        params.resample_window = Some(0);
        assert!(matches!(
            params.validate(),
            Err(ConfigurationError::ZeroResampleWindow)
        ));

        params.resample_window = Some(50);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }
}
