use tracing::{info, warn};

use crate::client::MarketData;
use crate::model::Instrument;

/// Discover every option instrument on `underlying`, live first, then expired.
///
/// The two listings are independent: a failing one is logged and the other is
/// still returned. Never fails; the worst case is an empty list. Entries that
/// appear in both listings are kept twice.
pub async fn discover(client: &dyn MarketData, underlying: &str) -> Vec<Instrument> {
    let mut instruments = Vec::new();

    for expired in [false, true] {
        let label = if expired { "expired" } else { "live" };
        match client.list_instruments(underlying, expired).await {
            Ok(batch) => {
                info!(underlying, listing = label, count = batch.len(), "listed instruments");
                instruments.extend(batch);
            }
            Err(e) => {
                warn!(underlying, listing = label, error = %e, "instrument listing failed");
            }
        }
    }

    info!(underlying, total = instruments.len(), "instrument discovery done");
    instruments
}

/// Look up instruments by exact name, preserving the order of `names`.
/// Returns the found instruments and the names that were not listed.
pub fn select_by_name(
    instruments: &[Instrument],
    names: &[String],
) -> (Vec<Instrument>, Vec<String>) {
    let mut found = Vec::new();
    let mut missing = Vec::new();
    for name in names {
        match instruments.iter().find(|i| &i.name == name) {
            Some(inst) => found.push(inst.clone()),
            None => missing.push(name.clone()),
        }
    }
    (found, missing)
}
