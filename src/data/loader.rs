//! CSV trade-log ingestion

use super::HistoricalTrade;
use std::path::Path;

/// Load a trade log from a CSV file
///
/// Expected header: `strategy,date_opened,date_closed,pl,num_contracts,
/// margin_req,funds_at_close,max_loss` with RFC 3339 timestamps. An empty
/// `max_loss` field means the broker did not report one.
pub fn load_trades(path: impl AsRef<Path>) -> anyhow::Result<Vec<HistoricalTrade>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut trades = Vec::new();
    for record in reader.deserialize() {
        let trade: HistoricalTrade = record?;
        trades.push(trade);
    }
    tracing::info!(count = trades.len(), "loaded trade log");
    Ok(trades)
}
