use clap::Parser;

use deribit_harvest::cli::{Cli, Command};
use deribit_harvest::logging;

mod commands;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let api = deribit_harvest::ApiConfig::resolve(cli.base_url.as_deref(), cli.testnet);

    match cli.command {
        Command::Collect(args) => commands::collect(&api, &args),
        Command::Instruments {
            underlying,
            active_within,
            output,
        } => commands::instruments(&api, &underlying, active_within, output.as_deref()),
        Command::Trades {
            instruments,
            underlying,
            start_date,
            end_date,
            output_dir,
            concurrency,
            delay_ms,
        } => {
            let mut config = deribit_harvest::CollectConfig::new(start_date, output_dir);
            config.underlying = underlying.to_uppercase();
            config.end_date = end_date;
            config.concurrency = concurrency;
            config.request_delay = std::time::Duration::from_millis(delay_ms);
            commands::trades(&api, config, &instruments)
        }
    }
}
