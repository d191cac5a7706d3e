pub mod catalog;
pub mod cli;
pub mod client;
pub mod collect;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod model;
pub mod pool;
pub mod walker;

pub use client::{DeribitClient, MarketData};
pub use collect::{CollectionResult, Collector, Outcome, RunSummary, SkipReason};
pub use config::{ApiConfig, CollectConfig};
pub use error::CollectError;
