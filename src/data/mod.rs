//! Historical trade records
//!
//! Immutable input to the simulator; the caller owns the log and the
//! simulator never mutates it.

mod loader;

pub use loader::load_trades;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single closed trade from the trader's log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalTrade {
    /// Strategy the trade belongs to
    pub strategy: String,
    /// Entry timestamp
    pub date_opened: DateTime<Utc>,
    /// Exit timestamp
    pub date_closed: DateTime<Utc>,
    /// Realized dollar P/L
    pub pl: Decimal,
    /// Contracts traded
    pub num_contracts: u32,
    /// Margin requirement at entry, zero when not reported
    pub margin_req: Decimal,
    /// Account funds immediately after this trade closed
    pub funds_at_close: Decimal,
    /// Broker-reported maximum loss for the position, if any
    #[serde(default)]
    pub max_loss: Option<Decimal>,
}

impl HistoricalTrade {
    /// Account capital immediately before this trade closed
    pub fn capital_before(&self) -> Decimal {
        self.funds_at_close - self.pl
    }
}
