use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

/// Deribit option trade harvester: discover option instruments, keep the ones
/// that traded recently, and download their trade history as one CSV each.
#[derive(Parser)]
#[command(name = "deribit-harvest", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Use the Deribit test environment
    #[arg(long, global = true)]
    pub testnet: bool,

    /// Override the API base URL (e.g. "https://www.deribit.com/api/v2")
    #[arg(long, global = true)]
    pub base_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Discover, filter and download trades for every active option instrument
    Collect(CollectArgs),

    /// List option instruments (live and expired) as JSON
    Instruments {
        /// Underlying currency
        #[arg(long, default_value = "BTC")]
        underlying: String,

        /// Only keep instruments that traded within this many days
        #[arg(long)]
        active_within: Option<u32>,

        /// Write to this file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Download trades for specific instruments (e.g. to re-run failures)
    Trades {
        /// Instrument names, e.g. BTC-28JUN24-60000-C
        #[arg(required = true)]
        instruments: Vec<String>,

        /// Underlying currency the instruments are listed under
        #[arg(long, default_value = "BTC")]
        underlying: String,

        /// First day to fetch (YYYY-MM-DD, UTC)
        #[arg(long)]
        start_date: NaiveDate,

        /// Stop before this day (YYYY-MM-DD, UTC). Defaults to now
        #[arg(long)]
        end_date: Option<NaiveDate>,

        /// Output directory for CSV files
        #[arg(long, default_value = "deribit_split")]
        output_dir: PathBuf,

        /// Instruments fetched in parallel
        #[arg(long, default_value = "4")]
        concurrency: usize,

        /// Pause between consecutive requests of one instrument (ms)
        #[arg(long, default_value = "100")]
        delay_ms: u64,
    },
}

#[derive(Args, Debug, Clone)]
pub struct CollectArgs {
    /// First day to fetch (YYYY-MM-DD, UTC)
    #[arg(long, default_value = "2024-05-01")]
    pub start_date: NaiveDate,

    /// Stop before this day (YYYY-MM-DD, UTC). Defaults to now
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Activity filter window: keep instruments traded in the last N days
    #[arg(long, default_value = "30")]
    pub lookback_days: u32,

    /// Instruments fetched in parallel
    #[arg(long, default_value = "4")]
    pub concurrency: usize,

    /// Output directory for CSV files and manifest.json
    #[arg(long, default_value = "deribit_split")]
    pub output_dir: PathBuf,

    /// Underlying currency
    #[arg(long, default_value = "BTC")]
    pub underlying: String,

    /// Pause between consecutive requests of one instrument (ms)
    #[arg(long, default_value = "100")]
    pub delay_ms: u64,
}
