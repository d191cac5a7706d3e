use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::Call => "call",
            OptionType::Put => "put",
        }
    }
}

/// An option contract as listed by `public/get_instruments`.
///
/// Only the fields the pipeline needs are required; the rest are kept when
/// present so the `instruments` command can echo them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    /// Exchange-assigned name, e.g. `BTC-28JUN24-60000-C`.
    #[serde(rename = "instrument_name")]
    pub name: String,
    /// Expiry, epoch milliseconds.
    pub expiration_timestamp: i64,
    pub strike: f64,
    pub option_type: OptionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<i64>,
}

impl Instrument {
    /// Expiry as an absolute time, `None` if the millisecond value is out of range.
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expiration_timestamp)
    }
}
