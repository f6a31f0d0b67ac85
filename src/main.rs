use clap::Parser;
use riskcast::cli::{Cli, Commands};
use riskcast::config::Config;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        toml::from_str(include_str!("../config.toml.example")).expect("Invalid default config")
    });

    // Initialize telemetry
    riskcast::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting simulation run");
            args.execute(&config)?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  Trades: {}", config.data.trades_path.display());
            println!(
                "  Simulation: {} trials x {} steps ({:?} basis)",
                config.simulation.num_simulations,
                config.simulation.simulation_length,
                config.simulation.resample_method,
            );
            println!("  Initial capital: {}", config.simulation.initial_capital);
            println!(
                "  Worst case: {}",
                if config.simulation.worst_case.enabled {
                    format!(
                        "{}% ({:?}, {:?}, {:?})",
                        config.simulation.worst_case.percentage,
                        config.simulation.worst_case.mode,
                        config.simulation.worst_case.based_on,
                        config.simulation.worst_case.sizing,
                    )
                } else {
                    "disabled".to_string()
                }
            );
        }
    }

    Ok(())
}
