//! riskcast: Monte Carlo trade-resampling risk simulator
//!
//! This library provides the core components for:
//! - Normalizing a historical trade log into resampleable return units
//! - Per-strategy resample pools with recency windowing
//! - Synthetic worst-case loss injection (pool and guaranteed-quota modes)
//! - Seeded, parallel trial execution with cooperative cancellation
//! - Cross-trial percentile bands and summary statistics

pub mod cli;
pub mod config;
pub mod data;
pub mod sim;
pub mod telemetry;
