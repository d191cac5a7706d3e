use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::client::{MarketData, MAX_TRADES_PER_REQUEST};
use crate::model::{Instrument, TimeWindow};

/// Keep instruments that traded at least once in the last `lookback_days`.
pub async fn filter(
    client: &dyn MarketData,
    instruments: Vec<Instrument>,
    lookback_days: u32,
) -> Vec<Instrument> {
    filter_at(client, instruments, lookback_days, Utc::now()).await
}

/// [`filter`] with an explicit "now".
///
/// Runs one request per instrument, sequentially. A failed request counts as
/// no evidence of trading and drops the instrument.
pub async fn filter_at(
    client: &dyn MarketData,
    instruments: Vec<Instrument>,
    lookback_days: u32,
    now: DateTime<Utc>,
) -> Vec<Instrument> {
    let window = match TimeWindow::trailing(now, lookback_days) {
        Ok(w) => w,
        Err(e) => {
            warn!(error = %e, "empty lookback window, no instrument can qualify");
            return Vec::new();
        }
    };

    let total = instruments.len();
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  filtering [{bar:40}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut traded = Vec::new();
    let mut failed = 0usize;
    for inst in instruments {
        match client
            .fetch_trades(&inst.name, window, MAX_TRADES_PER_REQUEST)
            .await
        {
            Ok(page) if !page.trades.is_empty() => {
                debug!(instrument = %inst.name, trades = page.trades.len(), "keep");
                traded.push(inst);
            }
            Ok(_) => debug!(instrument = %inst.name, "no recent trades"),
            Err(e) => {
                failed += 1;
                warn!(instrument = %inst.name, error = %e, "activity check failed, dropping");
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        lookback_days,
        checked = total,
        kept = traded.len(),
        failed,
        "activity filter done"
    );
    traded
}
