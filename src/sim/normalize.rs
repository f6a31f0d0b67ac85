//! Return normalization
//!
//! Converts historical trades into resampleable return units under the
//! selected sampling basis. Money math crosses from exact `Decimal` to `f64`
//! here; everything downstream is pure floating-point.

use super::types::{ReturnUnit, SimulationWarning};
use crate::config::ResampleMethod;
use crate::data::HistoricalTrade;
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Convert filtered trades (chronological by close date) into per-strategy
/// unit sequences, preserving chronological order within each strategy.
pub(crate) fn normalize(
    trades: &[&HistoricalTrade],
    method: ResampleMethod,
    normalize_to_1_lot: bool,
    subset_active: bool,
    historical_initial_capital: Option<Decimal>,
    warnings: &mut Vec<SimulationWarning>,
) -> BTreeMap<String, Vec<ReturnUnit>> {
    match method {
        ResampleMethod::Trades => per_trade_units(trades, normalize_to_1_lot, warnings),
        ResampleMethod::Daily => daily_units(trades, normalize_to_1_lot, warnings),
        ResampleMethod::Percentage => {
            percentage_units(trades, subset_active, historical_initial_capital, warnings)
        }
    }
}

/// Dollar P/L, optionally scaled to a 1-lot equivalent
fn scaled_pl(trade: &HistoricalTrade, normalize_to_1_lot: bool) -> Option<Decimal> {
    if !normalize_to_1_lot {
        return Some(trade.pl);
    }
    if trade.num_contracts == 0 {
        return None;
    }
    Some(trade.pl / Decimal::from(trade.num_contracts))
}

fn to_finite_f64(value: Decimal) -> Option<f64> {
    value.to_f64().filter(|v| v.is_finite())
}

fn push_unit(
    out: &mut BTreeMap<String, Vec<ReturnUnit>>,
    strategy: &str,
    value: f64,
    basis: ResampleMethod,
) {
    out.entry(strategy.to_string())
        .or_default()
        .push(ReturnUnit {
            strategy: strategy.to_string(),
            value,
            basis,
            synthetic: false,
        });
}

fn per_trade_units(
    trades: &[&HistoricalTrade],
    normalize_to_1_lot: bool,
    warnings: &mut Vec<SimulationWarning>,
) -> BTreeMap<String, Vec<ReturnUnit>> {
    let mut out = BTreeMap::new();
    for trade in trades {
        match scaled_pl(trade, normalize_to_1_lot).and_then(to_finite_f64) {
            Some(value) => push_unit(&mut out, &trade.strategy, value, ResampleMethod::Trades),
            None => warnings.push(SimulationWarning::UnitDropped {
                strategy: trade.strategy.clone(),
                reason: "cannot scale P/L to 1 lot".to_string(),
            }),
        }
    }
    out
}

fn daily_units(
    trades: &[&HistoricalTrade],
    normalize_to_1_lot: bool,
    warnings: &mut Vec<SimulationWarning>,
) -> BTreeMap<String, Vec<ReturnUnit>> {
    // Group by close date, one bucket per (strategy, day). BTreeMap keeps the
    // flattened per-strategy sequence chronological.
    let mut buckets: BTreeMap<String, BTreeMap<NaiveDate, Decimal>> = BTreeMap::new();
    for trade in trades {
        let Some(pl) = scaled_pl(trade, normalize_to_1_lot) else {
            warnings.push(SimulationWarning::UnitDropped {
                strategy: trade.strategy.clone(),
                reason: "cannot scale P/L to 1 lot".to_string(),
            });
            continue;
        };
        let day = trade.date_closed.date_naive();
        *buckets
            .entry(trade.strategy.clone())
            .or_default()
            .entry(day)
            .or_insert(Decimal::ZERO) += pl;
    }

    let mut out = BTreeMap::new();
    for (strategy, days) in buckets {
        for (_, total) in days {
            match to_finite_f64(total) {
                Some(value) => push_unit(&mut out, &strategy, value, ResampleMethod::Daily),
                None => warnings.push(SimulationWarning::UnitDropped {
                    strategy: strategy.clone(),
                    reason: "non-finite daily total".to_string(),
                }),
            }
        }
    }
    out
}

fn percentage_units(
    trades: &[&HistoricalTrade],
    subset_active: bool,
    historical_initial_capital: Option<Decimal>,
    warnings: &mut Vec<SimulationWarning>,
) -> BTreeMap<String, Vec<ReturnUnit>> {
    // When a strategy subset is simulated the per-trade funds_at_close field
    // includes excluded strategies' P/L, so the denominator is reconstructed
    // from the historical starting capital plus prior filtered P/L instead.
    let reconstruct = subset_active && historical_initial_capital.is_some();
    if subset_active && historical_initial_capital.is_none() {
        warnings.push(SimulationWarning::MissingHistoricalCapital);
    }

    let mut out = BTreeMap::new();
    let mut running = historical_initial_capital.unwrap_or(Decimal::ZERO);
    for trade in trades {
        let capital_before = if reconstruct {
            running
        } else {
            trade.capital_before()
        };
        // The trade's P/L moves the running account even if its own unit is
        // dropped below.
        running += trade.pl;

        if capital_before == Decimal::ZERO {
            warnings.push(SimulationWarning::UnitDropped {
                strategy: trade.strategy.clone(),
                reason: "zero capital denominator".to_string(),
            });
            continue;
        }
        match to_finite_f64(trade.pl / capital_before) {
            Some(value) => push_unit(&mut out, &trade.strategy, value, ResampleMethod::Percentage),
            None => warnings.push(SimulationWarning::UnitDropped {
                strategy: trade.strategy.clone(),
                reason: "non-finite percentage return".to_string(),
            }),
        }
    }
    out
}
