use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

use crate::cli::CollectArgs;
use crate::client::{DERIBIT_MAINNET, DERIBIT_TESTNET};
use crate::error::CollectError;
use crate::walker::{DEFAULT_REQUEST_DELAY, day_start};

pub const DEFAULT_UNDERLYING: &str = "BTC";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how to reach the exchange.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn resolve(base_url: Option<&str>, testnet: bool) -> Self {
        let base_url = match (base_url, testnet) {
            (Some(url), _) => url.to_string(),
            (None, true) => DERIBIT_TESTNET.to_string(),
            (None, false) => DERIBIT_MAINNET.to_string(),
        };
        ApiConfig {
            base_url,
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

/// Configuration of a collection run, passed explicitly to the collector.
#[derive(Debug, Clone)]
pub struct CollectConfig {
    pub underlying: String,
    /// First day walked, inclusive.
    pub start_date: NaiveDate,
    /// Walk end, exclusive. `None` walks up to the moment the run starts.
    pub end_date: Option<NaiveDate>,
    pub lookback_days: u32,
    pub concurrency: usize,
    pub output_dir: PathBuf,
    pub request_delay: Duration,
}

impl CollectConfig {
    pub fn new(start_date: NaiveDate, output_dir: impl Into<PathBuf>) -> Self {
        CollectConfig {
            underlying: DEFAULT_UNDERLYING.to_string(),
            start_date,
            end_date: None,
            lookback_days: 30,
            concurrency: 4,
            output_dir: output_dir.into(),
            request_delay: DEFAULT_REQUEST_DELAY,
        }
    }

    pub fn from_cli(args: &CollectArgs) -> Result<Self, CollectError> {
        let config = CollectConfig {
            underlying: args.underlying.to_uppercase(),
            start_date: args.start_date,
            end_date: args.end_date,
            lookback_days: args.lookback_days,
            concurrency: args.concurrency,
            output_dir: args.output_dir.clone(),
            request_delay: Duration::from_millis(args.delay_ms),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CollectError> {
        if self.underlying.trim().is_empty() {
            return Err(CollectError::Config("underlying must not be empty".into()));
        }
        if self.concurrency == 0 {
            return Err(CollectError::Config("concurrency must be at least 1".into()));
        }
        if self.lookback_days == 0 {
            return Err(CollectError::Config("lookback_days must be at least 1".into()));
        }
        match self.end_date {
            Some(end) if end <= self.start_date => Err(CollectError::Config(format!(
                "end date {end} must be after start date {}",
                self.start_date
            ))),
            _ => Ok(()),
        }
    }

    /// `[start, end)` of every instrument's walk, given the current time.
    pub fn walk_bounds(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), CollectError> {
        self.validate()?;
        let start = day_start(self.start_date);
        let end = self.end_date.map(day_start).unwrap_or(now);
        if start >= end {
            return Err(CollectError::Config(format!(
                "start date {} is not before the walk end {end}",
                self.start_date
            )));
        }
        Ok((start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = CollectConfig::new(date(2024, 5, 1), "out");
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.underlying, "BTC");
        assert_eq!(cfg.request_delay, Duration::from_millis(100));
    }

    #[test]
    fn rejects_zero_concurrency_and_lookback() {
        let mut cfg = CollectConfig::new(date(2024, 5, 1), "out");
        cfg.concurrency = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = CollectConfig::new(date(2024, 5, 1), "out");
        cfg.lookback_days = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn walk_ends_now_without_end_date() {
        let cfg = CollectConfig::new(date(2024, 5, 1), "out");
        let now = Utc.with_ymd_and_hms(2024, 5, 3, 15, 30, 0).unwrap();
        let (start, end) = cfg.walk_bounds(now).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        assert_eq!(end, now);
    }

    #[test]
    fn explicit_end_date_is_exclusive_midnight() {
        let mut cfg = CollectConfig::new(date(2024, 5, 1), "out");
        cfg.end_date = Some(date(2024, 5, 6));
        let (_, end) = cfg.walk_bounds(Utc::now()).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap());

        cfg.end_date = Some(date(2024, 5, 1));
        assert!(cfg.walk_bounds(Utc::now()).is_err());
    }

    #[test]
    fn start_in_the_future_is_rejected() {
        let cfg = CollectConfig::new(date(2024, 5, 1), "out");
        let now = Utc.with_ymd_and_hms(2024, 4, 30, 0, 0, 0).unwrap();
        assert!(cfg.walk_bounds(now).is_err());
    }

    #[test]
    fn api_url_resolution() {
        assert_eq!(ApiConfig::resolve(None, false).base_url, DERIBIT_MAINNET);
        assert_eq!(ApiConfig::resolve(None, true).base_url, DERIBIT_TESTNET);
        assert_eq!(
            ApiConfig::resolve(Some("http://localhost:8080"), true).base_url,
            "http://localhost:8080"
        );
    }
}
