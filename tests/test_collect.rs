
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use clap::Parser;

use deribit_harvest::cli::{Cli, Command};
use deribit_harvest::collect::output::MANIFEST_FILE;
use deribit_harvest::{
    CollectConfig, CollectionResult, Collector, Outcome, RunSummary, SkipReason,
};

use mock_exchange::*;

fn config(dir: &std::path::Path, concurrency: usize) -> CollectConfig {
    let mut cfg = CollectConfig::new(date(2024, 5, 1), dir);
    cfg.end_date = Some(date(2024, 5, 6));
    cfg.concurrency = concurrency;
    cfg.request_delay = StdDuration::ZERO;
    cfg
}

fn csv_rows(path: &std::path::Path) -> Vec<csv::StringRecord> {
    let mut rdr = csv::Reader::from_path(path).unwrap();
    rdr.records().map(|r| r.unwrap()).collect()
}

#[tokio::test]
async fn crashed_worker_does_not_abort_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let start = midnight(date(2024, 5, 1));
    let s = start.timestamp_millis();

    let names = ["OPT-1-C", "OPT-2-C", "OPT-3-C", "OPT-4-P", "OPT-5-P"];
    let mut mock = MockExchange::new();
    for n in names {
        mock = mock.with_trades(n, [s + 1_000, s + 2 * DAY_MS + 1_000]);
    }
    let mock = mock.panic_on("OPT-3-C");

    let collector = Collector::new(Arc::new(mock), config(dir.path(), 2));
    let results = collector
        .collect(
            names.iter().map(|n| option(n)).collect(),
            start,
            start + Duration::days(5),
        )
        .await;

    assert_eq!(results.len(), 5);
    assert_eq!(results.iter().filter(|r| r.is_saved()).count(), 4);
    assert_eq!(results[2].instrument, "OPT-3-C");
    assert!(matches!(results[2].outcome, Outcome::Failed { .. }));

    let mut files: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    assert_eq!(
        files,
        vec!["OPT-1-C.csv", "OPT-2-C.csv", "OPT-4-P.csv", "OPT-5-P.csv"]
    );
}

#[tokio::test]
async fn saved_file_has_expected_columns_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let name = "BTC-1JUN24-60000-C";
    let start = midnight(date(2024, 5, 1));
    let s = start.timestamp_millis();

    let mock = MockExchange::new()
        .with_trade(name, s + 3_600_000, 0.0125)
        .with_trade(name, s + DAY_MS + 7_200_000, 0.013);
    let collector = Collector::new(Arc::new(mock), config(dir.path(), 1));
    let results = collector
        .collect(vec![option(name)], start, start + Duration::days(2))
        .await;

    let path = dir.path().join(format!("{name}.csv"));
    match &results[0].outcome {
        Outcome::Saved { path: p, rows, .. } => {
            assert_eq!(p, &path);
            assert_eq!(*rows, 2);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let mut rdr = csv::Reader::from_path(&path).unwrap();
    let headers: Vec<String> = rdr.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(
        headers,
        vec![
            "instrument_name",
            "expiration",
            "strike",
            "option_type",
            "price",
            "amount",
            "direction",
            "timestamp"
        ]
    );
    let rows = csv_rows(&path);
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], name);
    assert_eq!(&rows[0][3], "call");
    assert_eq!(&rows[0][6], "buy");
    assert_eq!(&rows[0][7], "2024-05-01 01:00:00.000");
    assert_eq!(&rows[1][7], "2024-05-02 02:00:00.000");
}

#[tokio::test]
async fn empty_walk_writes_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let start = midnight(date(2024, 5, 1));

    let mock = MockExchange::new().fail_instrument("DEAD-C");
    let collector = Collector::new(Arc::new(mock), config(dir.path(), 2));
    let results = collector
        .collect(
            vec![option("QUIET-C"), option("DEAD-C")],
            start,
            start + Duration::days(3),
        )
        .await;

    assert!(matches!(
        results[0].outcome,
        Outcome::Skipped {
            reason: SkipReason::NoTrades,
            ..
        }
    ));
    assert!(matches!(
        results[1].outcome,
        Outcome::Skipped {
            reason: SkipReason::FetchError,
            ..
        }
    ));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn instrument_names_with_separators_are_sanitized() {
    let dir = tempfile::tempdir().unwrap();
    let start = midnight(date(2024, 5, 1));
    let name = "BTC_USDC/1JUN24-60000-C";

    let mock = MockExchange::new().with_trade(name, start.timestamp_millis() + 1, 1.0);
    let collector = Collector::new(Arc::new(mock), config(dir.path(), 1));
    let results = collector
        .collect(vec![option(name)], start, start + Duration::days(1))
        .await;

    assert!(results[0].is_saved());
    assert!(dir.path().join("BTC_USDC_1JUN24-60000-C.csv").exists());
}

#[tokio::test]
async fn output_is_byte_identical_across_runs() {
    let name = "BTC-1JUN24-60000-C";
    let start = midnight(date(2024, 5, 1));
    let s = start.timestamp_millis();
    let make = || {
        MockExchange::new().with_trades(name, [s + 11, s + DAY_MS + 22, s + 4 * DAY_MS + 33])
    };

    let (a, b) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    for dir in [&a, &b] {
        Collector::new(Arc::new(make()), config(dir.path(), 2))
            .collect(vec![option(name)], start, start + Duration::days(5))
            .await;
    }

    let file = format!("{name}.csv");
    assert_eq!(
        std::fs::read(a.path().join(&file)).unwrap(),
        std::fs::read(b.path().join(&file)).unwrap()
    );
}

#[tokio::test]
async fn full_run_discovers_filters_walks_and_writes_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("nested").join("out");
    let now = Utc::now();
    let recent = (now - Duration::days(2)).timestamp_millis();
    let old = (now - Duration::days(90)).timestamp_millis();

    let mock = MockExchange::new()
        .with_live(vec![option("LIVE-ACTIVE-C"), option("LIVE-QUIET-P")])
        .with_expired(vec![option("EXPIRED-ACTIVE-P"), option("EXPIRED-OLD-C")])
        .with_trade("LIVE-ACTIVE-C", recent, 0.02)
        .with_trade("EXPIRED-ACTIVE-P", recent + 1_000, 0.03)
        .with_trade("EXPIRED-OLD-C", old, 0.01);

    let mut cfg = CollectConfig::new((now - Duration::days(5)).date_naive(), &out_dir);
    cfg.concurrency = 2;
    cfg.lookback_days = 30;
    cfg.request_delay = StdDuration::ZERO;

    let summary = Collector::new(Arc::new(mock), cfg).run().await.unwrap();

    assert_eq!(summary.discovered, 4);
    assert_eq!(summary.active, 2);
    assert_eq!(summary.saved(), 2);
    assert_eq!(summary.failed(), 0);
    assert!(out_dir.join("LIVE-ACTIVE-C.csv").exists());
    assert!(out_dir.join("EXPIRED-ACTIVE-P.csv").exists());
    assert!(!out_dir.join("EXPIRED-OLD-C.csv").exists());

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join(MANIFEST_FILE)).unwrap())
            .unwrap();
    let entries = manifest["results"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e["status"] == "saved"));
    assert_eq!(manifest["discovered"], 4);
}

#[tokio::test]
async fn run_survives_listing_failure() {
    let dir = tempfile::tempdir().unwrap();
    let now = Utc::now();

    let mock = MockExchange::new().fail_listing(false).fail_listing(true);
    let cfg = {
        let mut c = CollectConfig::new((now - Duration::days(2)).date_naive(), dir.path());
        c.request_delay = StdDuration::ZERO;
        c
    };

    let summary = Collector::new(Arc::new(mock), cfg).run().await.unwrap();

    assert_eq!(summary.discovered, 0);
    assert!(summary.results.is_empty());
    assert!(dir.path().join(MANIFEST_FILE).exists());
}

#[tokio::test]
async fn invalid_config_fails_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), 2);
    cfg.concurrency = 0;

    let mock = Arc::new(MockExchange::new().with_live(vec![option("A-C")]));
    let err = Collector::new(mock.clone(), cfg).run().await.unwrap_err();

    assert!(err.to_string().contains("concurrency"));
    assert!(mock.trade_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_instruments_are_listed_for_rerun() {
    let dir = tempfile::tempdir().unwrap();
    let start = midnight(date(2024, 5, 1));
    let end = start + Duration::days(2);
    let s = start.timestamp_millis();

    let mock = MockExchange::new()
        .with_trade("OK-C", s + 10, 0.1)
        .fail_instrument("DOWN-C")
        .panic_on("BOOM-C");
    let collector = Collector::new(Arc::new(mock), config(dir.path(), 2));
    let results = collector
        .collect(
            vec![option("OK-C"), option("BOOM-C"), option("QUIET-P"), option("DOWN-C")],
            start,
            end,
        )
        .await;

    let summary = RunSummary {
        underlying: "BTC".into(),
        walk_start: start,
        walk_end: end,
        lookback_days: 30,
        discovered: 4,
        active: 4,
        results,
    };
    assert_eq!(summary.saved(), 1);
    assert_eq!(summary.skipped(), 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.failed_instruments(), vec!["BOOM-C", "DOWN-C"]);

    let args = summary.rerun_args(dir.path(), "http://localhost:9000/api/v2");
    let cli = Cli::try_parse_from(std::iter::once("deribit-harvest".to_string()).chain(args))
        .expect("re-run hint must be accepted by the CLI");
    assert_eq!(cli.base_url.as_deref(), Some("http://localhost:9000/api/v2"));
    match cli.command {
        Command::Trades {
            instruments,
            underlying,
            start_date,
            end_date,
            output_dir,
            ..
        } => {
            assert_eq!(instruments, vec!["BOOM-C", "DOWN-C"]);
            assert_eq!(underlying, "BTC");
            assert_eq!(start_date, date(2024, 5, 1));
            assert_eq!(end_date, Some(date(2024, 5, 3)));
            assert_eq!(output_dir, dir.path());
        }
        _ => panic!("re-run hint must invoke the trades command"),
    }
}

// ── Re-run hint ──────────────────────────────────────────────────────

fn summary_with(underlying: &str, end: chrono::DateTime<Utc>, outcome: Outcome) -> RunSummary {
    RunSummary {
        underlying: underlying.into(),
        walk_start: midnight(date(2024, 5, 1)),
        walk_end: end,
        lookback_days: 30,
        discovered: 1,
        active: 1,
        results: vec![CollectionResult {
            instrument: "ETH-28JUN24-3000-P".into(),
            outcome,
        }],
    }
}

#[test]
fn rerun_hint_covers_partial_last_day() {
    let end = midnight(date(2024, 5, 4)) + Duration::hours(13);
    let summary = summary_with(
        "ETH",
        end,
        Outcome::Skipped {
            reason: SkipReason::FetchError,
            failed_days: vec![date(2024, 5, 1)],
        },
    );

    let out = std::path::Path::new("out dir");
    let args = summary.rerun_args(out, "https://test.deribit.com/api/v2");
    let cli = Cli::try_parse_from(std::iter::once("deribit-harvest".to_string()).chain(args))
        .unwrap();
    match cli.command {
        Command::Trades {
            instruments,
            underlying,
            end_date,
            output_dir,
            ..
        } => {
            assert_eq!(instruments, vec!["ETH-28JUN24-3000-P"]);
            assert_eq!(underlying, "ETH");
            assert_eq!(end_date, Some(date(2024, 5, 5)));
            assert_eq!(output_dir, out);
        }
        _ => panic!("re-run hint must invoke the trades command"),
    }
}

#[test]
fn no_rerun_hint_without_failures() {
    let summary = summary_with(
        "BTC",
        midnight(date(2024, 5, 4)),
        Outcome::Skipped {
            reason: SkipReason::NoTrades,
            failed_days: vec![],
        },
    );
    assert!(summary.rerun_args(std::path::Path::new("out"), "http://x").is_empty());
}
