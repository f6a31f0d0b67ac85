//! Benchmarks for the trial engine

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use riskcast::config::{
    ResampleMethod, SimulationParams, WorstCaseBasis, WorstCaseConfig, WorstCaseMode,
    WorstCaseSizing,
};
use riskcast::data::HistoricalTrade;
use riskcast::sim::simulate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn sample_log() -> Vec<HistoricalTrade> {
    (0..200i64)
        .map(|i| {
            let pl = Decimal::from(((i * 37) % 401) - 150);
            HistoricalTrade {
                strategy: if i % 3 == 0 { "condor" } else { "strangle" }.to_string(),
                date_opened: Utc.with_ymd_and_hms(2024, 1, 1, 14, 0, 0).unwrap()
                    + chrono::Duration::days(i),
                date_closed: Utc.with_ymd_and_hms(2024, 1, 1, 21, 0, 0).unwrap()
                    + chrono::Duration::days(i),
                pl,
                num_contracts: 1 + (i % 3) as u32,
                margin_req: dec!(2000),
                funds_at_close: dec!(50000) + Decimal::from(i * 10),
                max_loss: None,
            }
        })
        .collect()
}

fn params(worst_case_enabled: bool) -> SimulationParams {
    SimulationParams {
        num_simulations: 1000,
        simulation_length: 252,
        resample_method: ResampleMethod::Trades,
        resample_window: None,
        strategies: None,
        initial_capital: dec!(50000),
        historical_initial_capital: None,
        trades_per_year: 252,
        random_seed: Some(42),
        normalize_to_1_lot: false,
        worst_case: WorstCaseConfig {
            enabled: worst_case_enabled,
            percentage: 5,
            mode: WorstCaseMode::Guarantee,
            based_on: WorstCaseBasis::Simulation,
            sizing: WorstCaseSizing::Relative,
        },
    }
}

fn benchmark_resample_trials(c: &mut Criterion) {
    let trades = sample_log();
    let params = params(false);

    c.bench_function("simulate_1000x252", |b| {
        b.iter(|| simulate(black_box(&trades), black_box(&params)))
    });
}

fn benchmark_guaranteed_injection(c: &mut Criterion) {
    let trades = sample_log();
    let params = params(true);

    c.bench_function("simulate_1000x252_guarantee", |b| {
        b.iter(|| simulate(black_box(&trades), black_box(&params)))
    });
}

criterion_group!(
    benches,
    benchmark_resample_trials,
    benchmark_guaranteed_injection
);
criterion_main!(benches);
