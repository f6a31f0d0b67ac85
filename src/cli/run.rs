//! Run command implementation

use crate::config::Config;
use crate::data::load_trades;
use crate::sim::simulate;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// CSV trade log (overrides the configured path)
    #[arg(long)]
    pub trades: Option<PathBuf>,

    /// Master random seed (overrides the configured seed)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of trials (overrides the configured count)
    #[arg(long)]
    pub simulations: Option<usize>,

    /// Steps per trial (overrides the configured length)
    #[arg(long)]
    pub length: Option<usize>,

    /// Output format: table or json
    #[arg(long, default_value = "table")]
    pub format: String,
}

impl RunArgs {
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut params = config.simulation.clone();
        if let Some(seed) = self.seed {
            params.random_seed = Some(seed);
        }
        if let Some(simulations) = self.simulations {
            params.num_simulations = simulations;
        }
        if let Some(length) = self.length {
            params.simulation_length = length;
        }

        let trades_path = self
            .trades
            .clone()
            .unwrap_or_else(|| config.data.trades_path.clone());
        let trades = load_trades(&trades_path)?;

        let result = simulate(&trades, &params)?;
        for warning in &result.warnings {
            tracing::warn!("{warning}");
        }

        match self.format.as_str() {
            "json" => {
                // The full per-trial curves stay in-process; the export
                // surface is the percentile/statistics summary.
                let report = serde_json::json!({
                    "percentiles": result.percentiles,
                    "statistics": result.statistics,
                    "actual_resample_pool_size": result.actual_resample_pool_size,
                    "parameters": result.parameters,
                    "warnings": result.warnings,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            _ => {
                println!("{}", result.format_table());
            }
        }

        Ok(())
    }
}
