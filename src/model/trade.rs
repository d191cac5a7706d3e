use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use super::instrument::{Instrument, OptionType};
use crate::client::GET_TRADES;
use crate::error::CollectError;

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

/// One trade as returned by `public/get_last_trades_by_instrument_and_time`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTrade {
    pub price: f64,
    pub amount: f64,
    pub direction: Direction,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub trade_id: Option<String>,
    #[serde(default)]
    pub iv: Option<f64>,
    #[serde(default)]
    pub index_price: Option<f64>,
}

/// A single page of trades for one window.
///
/// The exchange caps a page at `count` trades. `has_more` reports that the
/// window held more than that; the extra trades are not fetched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TradePage {
    #[serde(default)]
    pub trades: Vec<RawTrade>,
    #[serde(default)]
    pub has_more: bool,
}

/// A trade enriched with its instrument's static fields. One CSV row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub instrument_name: String,
    #[serde(serialize_with = "utc_millis")]
    pub expiration: DateTime<Utc>,
    pub strike: f64,
    pub option_type: OptionType,
    pub price: f64,
    pub amount: f64,
    pub direction: Direction,
    #[serde(serialize_with = "utc_millis")]
    pub timestamp: DateTime<Utc>,
}

impl TradeRecord {
    pub fn from_raw(instrument: &Instrument, raw: &RawTrade) -> Result<Self, CollectError> {
        let expiration = instrument.expiration().ok_or_else(|| {
            CollectError::remote(
                GET_TRADES,
                format!(
                    "expiration_timestamp {} of {} is out of range",
                    instrument.expiration_timestamp, instrument.name
                ),
            )
        })?;
        let timestamp = DateTime::from_timestamp_millis(raw.timestamp).ok_or_else(|| {
            CollectError::remote(
                GET_TRADES,
                format!("trade timestamp {} is out of range", raw.timestamp),
            )
        })?;

        Ok(TradeRecord {
            instrument_name: instrument.name.clone(),
            expiration,
            strike: instrument.strike,
            option_type: instrument.option_type,
            price: raw.price,
            amount: raw.amount,
            direction: raw.direction,
            timestamp,
        })
    }
}

fn utc_millis<S: Serializer>(t: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&t.format("%Y-%m-%d %H:%M:%S%.3f"))
}
