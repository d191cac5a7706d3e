use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::client::{MarketData, MAX_TRADES_PER_REQUEST};
use crate::error::CollectError;
use crate::model::{Instrument, TimeWindow, TradeRecord};

/// Pause between two consecutive trade requests of one walk.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(100);

/// Everything one walk produced.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Day-ascending; within a day, in the order the exchange returned them.
    pub records: Vec<TradeRecord>,
    pub days_walked: u32,
    /// Days whose request failed. Their trades are missing from `records`.
    pub failed_days: Vec<NaiveDate>,
    /// Days that hit the page limit. Only the first page is in `records`.
    pub truncated_days: Vec<NaiveDate>,
}

impl WalkOutcome {
    /// True when every walked day failed.
    pub fn all_failed(&self) -> bool {
        self.days_walked > 0 && self.failed_days.len() == self.days_walked as usize
    }
}

/// Walks one instrument's history a day at a time.
#[derive(Debug, Clone, Copy)]
pub struct Walker {
    pub request_delay: Duration,
}

impl Default for Walker {
    fn default() -> Self {
        Walker {
            request_delay: DEFAULT_REQUEST_DELAY,
        }
    }
}

impl Walker {
    pub fn new(request_delay: Duration) -> Self {
        Walker { request_delay }
    }

    /// Fetch every day in `[start, end)` and concatenate the trades.
    ///
    /// A failed day is recorded and skipped; the cursor always advances, so a
    /// walk never aborts early. Not resumable: a new call starts over at `start`.
    pub async fn walk(
        &self,
        client: &dyn MarketData,
        instrument: &Instrument,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> WalkOutcome {
        let mut outcome = WalkOutcome::default();
        let mut cursor = start;

        while cursor < end {
            let window = TimeWindow::day_starting(cursor);
            let day = cursor.date_naive();

            match self.step(client, instrument, window).await {
                Ok((records, has_more)) => {
                    if has_more {
                        warn!(
                            instrument = %instrument.name,
                            %day,
                            kept = records.len(),
                            "day exceeds page limit, later trades not fetched"
                        );
                        outcome.truncated_days.push(day);
                    }
                    debug!(
                        instrument = %instrument.name,
                        %day,
                        trades = records.len(),
                        "day fetched"
                    );
                    outcome.records.extend(records);
                }
                Err(e) => {
                    warn!(instrument = %instrument.name, %day, error = %e, "day failed, skipping");
                    outcome.failed_days.push(day);
                }
            }

            outcome.days_walked += 1;
            cursor += chrono::Duration::days(1);

            if cursor < end && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
        }

        outcome
    }

    async fn step(
        &self,
        client: &dyn MarketData,
        instrument: &Instrument,
        window: TimeWindow,
    ) -> Result<(Vec<TradeRecord>, bool), CollectError> {
        let page = client
            .fetch_trades(&instrument.name, window, MAX_TRADES_PER_REQUEST)
            .await?;
        let records = page
            .trades
            .iter()
            .map(|raw| TradeRecord::from_raw(instrument, raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((records, page.has_more))
    }
}

/// Midnight UTC of `date`.
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}
