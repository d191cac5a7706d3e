use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;

use deribit_harvest::cli::CollectArgs;
use deribit_harvest::collect::output;
use deribit_harvest::{
    ApiConfig, CollectConfig, Collector, DeribitClient, MarketData, Outcome, RunSummary, catalog,
    filter,
};

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("creating async runtime")
}

fn client(api: &ApiConfig) -> Result<Arc<dyn MarketData>> {
    let client = DeribitClient::new(api.base_url.clone(), api.timeout)?;
    Ok(Arc::new(client))
}

/// `collect`: the full discover → filter → walk pipeline.
pub fn collect(api: &ApiConfig, args: &CollectArgs) -> Result<()> {
    let config = CollectConfig::from_cli(args)?;
    let collector = Collector::new(client(api)?, config);

    let summary = runtime()?
        .block_on(collector.run())
        .context("collection run")?;
    print_summary(&summary, &collector.config().output_dir, &api.base_url);
    Ok(())
}

/// `instruments`: discovery (and optional activity filter) only.
pub fn instruments(
    api: &ApiConfig,
    underlying: &str,
    active_within: Option<u32>,
    output_path: Option<&Path>,
) -> Result<()> {
    let client = client(api)?;
    let underlying = underlying.to_uppercase();

    let instruments = runtime()?.block_on(async {
        let all = catalog::discover(client.as_ref(), &underlying).await;
        match active_within {
            Some(days) => filter::filter(client.as_ref(), all, days).await,
            None => all,
        }
    });

    match output_path {
        Some(path) => {
            output::write_json(path, &instruments)?;
            println!(
                "Wrote {} instruments to {}",
                instruments.len(),
                path.display()
            );
        }
        None => println!("{}", serde_json::to_string_pretty(&instruments)?),
    }
    Ok(())
}

/// `trades`: walk and save named instruments, bypassing the activity filter.
pub fn trades(api: &ApiConfig, config: CollectConfig, names: &[String]) -> Result<()> {
    let (start, end) = config.walk_bounds(Utc::now())?;
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("creating output directory {}", config.output_dir.display())
    })?;

    let client = client(api)?;
    let rt = runtime()?;

    let listed = rt.block_on(catalog::discover(client.as_ref(), &config.underlying));
    let (found, missing) = catalog::select_by_name(&listed, names);
    for name in &missing {
        println!("  WARN  {name} is not listed under {}", config.underlying);
    }
    if found.is_empty() {
        bail!(
            "none of the requested instruments are listed under {}",
            config.underlying
        );
    }

    let collector = Collector::new(client, config);
    let results = rt.block_on(collector.collect(found, start, end));
    for r in &results {
        println!("  {:<28} {}", r.instrument, describe(&r.outcome));
    }
    Ok(())
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Saved {
            path,
            rows,
            failed_days,
            ..
        } if failed_days.is_empty() => format!("OK    {rows} rows → {}", path.display()),
        Outcome::Saved {
            path,
            rows,
            failed_days,
            ..
        } => format!(
            "OK    {rows} rows → {} ({} days failed)",
            path.display(),
            failed_days.len()
        ),
        Outcome::Skipped { reason, .. } => format!("SKIP  {reason:?}"),
        Outcome::Failed { reason } => format!("FAIL  {reason}"),
    }
}

fn print_summary(summary: &RunSummary, output_dir: &Path, base_url: &str) {
    println!(
        "\nDone: {} discovered, {} active, {} saved, {} skipped, {} failed. Output: {}",
        summary.discovered,
        summary.active,
        summary.saved(),
        summary.skipped(),
        summary.failed(),
        output_dir.display()
    );
    let args = summary.rerun_args(output_dir, base_url);
    if !args.is_empty() {
        let args: Vec<String> = args.iter().map(|a| shell_quote(a)).collect();
        println!("Re-run failures with: deribit-harvest {}", args.join(" "));
    }
}

fn shell_quote(arg: &str) -> String {
    let plain = arg.chars().all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if plain && !arg.is_empty() {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
