//! Collection run: discover, filter, then walk every active instrument on a
//! bounded worker pool and write one CSV per instrument.

pub mod output;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog;
use crate::client::MarketData;
use crate::config::CollectConfig;
use crate::error::CollectError;
use crate::filter;
use crate::model::Instrument;
use crate::pool::BoundedExecutor;
use crate::walker::{Walker, day_start};

// ── Results ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The walk succeeded but found nothing.
    NoTrades,
    /// Nothing was found because every day's request failed.
    FetchError,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Saved {
        path: PathBuf,
        rows: usize,
        failed_days: Vec<NaiveDate>,
        truncated_days: Vec<NaiveDate>,
    },
    Skipped {
        reason: SkipReason,
        failed_days: Vec<NaiveDate>,
    },
    /// Writing the file failed or the worker crashed.
    Failed { reason: String },
}

/// Outcome of one instrument's walk-and-save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionResult {
    pub instrument: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl CollectionResult {
    pub fn is_saved(&self) -> bool {
        matches!(self.outcome, Outcome::Saved { .. })
    }
}

/// What a whole run did. Also written to `manifest.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub underlying: String,
    pub walk_start: DateTime<Utc>,
    pub walk_end: DateTime<Utc>,
    pub lookback_days: u32,
    pub discovered: usize,
    pub active: usize,
    pub results: Vec<CollectionResult>,
}

impl RunSummary {
    pub fn saved(&self) -> usize {
        self.results.iter().filter(|r| r.is_saved()).count()
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    /// Instruments that produced no file because of an error, for a manual re-run.
    pub fn failed_instruments(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| {
                matches!(
                    r.outcome,
                    Outcome::Failed { .. }
                        | Outcome::Skipped {
                            reason: SkipReason::FetchError,
                            ..
                        }
                )
            })
            .map(|r| r.instrument.as_str())
            .collect()
    }

    /// Arguments of a `trades` invocation that walks the failed instruments
    /// over the same days into the same directory. Empty when nothing failed.
    pub fn rerun_args(&self, output_dir: &Path, base_url: &str) -> Vec<String> {
        let failed = self.failed_instruments();
        if failed.is_empty() {
            return Vec::new();
        }

        // The walk end is exclusive; a partial last day is walked in full.
        let last = self.walk_end.date_naive();
        let end_date = if self.walk_end == day_start(last) {
            last
        } else {
            last.succ_opt().unwrap_or(last)
        };

        let mut args = vec!["trades".to_string()];
        args.extend(failed.iter().map(|name| name.to_string()));
        args.extend([
            "--underlying".to_string(),
            self.underlying.clone(),
            "--start-date".to_string(),
            self.walk_start.date_naive().to_string(),
            "--end-date".to_string(),
            end_date.to_string(),
            "--output-dir".to_string(),
            output_dir.display().to_string(),
            "--base-url".to_string(),
            base_url.to_string(),
        ]);
        args
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────

pub struct Collector {
    client: Arc<dyn MarketData>,
    config: CollectConfig,
}

impl Collector {
    pub fn new(client: Arc<dyn MarketData>, config: CollectConfig) -> Self {
        Collector { client, config }
    }

    pub fn config(&self) -> &CollectConfig {
        &self.config
    }

    /// Full pipeline. Only fails when the configuration is invalid or the
    /// output directory cannot be created; per-instrument failures end up in
    /// the returned summary.
    pub async fn run(&self) -> Result<RunSummary, CollectError> {
        let cfg = &self.config;
        let (walk_start, walk_end) = cfg.walk_bounds(Utc::now())?;

        std::fs::create_dir_all(&cfg.output_dir)
            .map_err(|e| CollectError::persistence(&cfg.output_dir, e))?;

        info!(underlying = %cfg.underlying, "step 1: discovering instruments");
        let instruments = catalog::discover(self.client.as_ref(), &cfg.underlying).await;
        let discovered = instruments.len();

        info!(lookback_days = cfg.lookback_days, "step 2: filtering by recent activity");
        let active = filter::filter(self.client.as_ref(), instruments, cfg.lookback_days).await;

        info!(
            instruments = active.len(),
            concurrency = cfg.concurrency,
            start = %walk_start,
            end = %walk_end,
            "step 3: collecting trades"
        );
        let active_count = active.len();
        let results = self.collect(active, walk_start, walk_end).await;

        let summary = RunSummary {
            underlying: cfg.underlying.clone(),
            walk_start,
            walk_end,
            lookback_days: cfg.lookback_days,
            discovered,
            active: active_count,
            results,
        };

        let manifest = cfg.output_dir.join(output::MANIFEST_FILE);
        if let Err(e) = output::write_json(&manifest, &summary) {
            warn!(error = %e, "could not write run manifest");
        }

        info!(
            saved = summary.saved(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            output_dir = %cfg.output_dir.display(),
            "collection complete"
        );
        Ok(summary)
    }

    /// Walk and save `instruments` on the worker pool. One result per
    /// instrument, in input order.
    pub async fn collect(
        &self,
        instruments: Vec<Instrument>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<CollectionResult> {
        let names: Vec<String> = instruments.iter().map(|i| i.name.clone()).collect();
        let executor = BoundedExecutor::new(self.config.concurrency);
        let walker = Walker::new(self.config.request_delay);
        let output_dir = self.config.output_dir.clone();
        let client = self.client.clone();

        let pb = ProgressBar::new(instruments.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  collecting [{bar:40}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        let worker_pb = pb.clone();

        let outputs = executor
            .run(instruments, move |inst: Instrument| {
                let client = client.clone();
                let output_dir = output_dir.clone();
                let pb = worker_pb.clone();
                async move {
                    let result =
                        collect_one(client.as_ref(), &walker, &inst, start, end, &output_dir).await;
                    pb.inc(1);
                    result
                }
            })
            .await;
        pb.finish_and_clear();

        outputs
            .into_iter()
            .map(|out| match out.result {
                Ok(result) => result,
                Err(panic) => {
                    let instrument = names[out.index].clone();
                    warn!(%instrument, reason = %panic, "worker crashed");
                    CollectionResult {
                        instrument,
                        outcome: Outcome::Failed {
                            reason: format!("worker crashed: {panic}"),
                        },
                    }
                }
            })
            .collect()
    }
}

/// One worker's unit of work: walk the instrument, then persist what it found.
pub async fn collect_one(
    client: &dyn MarketData,
    walker: &Walker,
    instrument: &Instrument,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    output_dir: &Path,
) -> CollectionResult {
    let walk = walker.walk(client, instrument, start, end).await;
    let name = instrument.name.clone();

    if walk.records.is_empty() {
        let reason = if walk.all_failed() {
            SkipReason::FetchError
        } else {
            SkipReason::NoTrades
        };
        info!(instrument = %name, ?reason, "skip, nothing to save");
        return CollectionResult {
            instrument: name,
            outcome: Outcome::Skipped {
                reason,
                failed_days: walk.failed_days,
            },
        };
    }

    let outcome = match output::write_trades(output_dir, &name, &walk.records) {
        Ok(path) => {
            info!(
                instrument = %name,
                rows = walk.records.len(),
                failed_days = walk.failed_days.len(),
                path = %path.display(),
                "saved"
            );
            Outcome::Saved {
                path,
                rows: walk.records.len(),
                failed_days: walk.failed_days,
                truncated_days: walk.truncated_days,
            }
        }
        Err(e) => {
            warn!(instrument = %name, error = %e, "save failed");
            Outcome::Failed {
                reason: e.to_string(),
            }
        }
    };

    CollectionResult {
        instrument: name,
        outcome,
    }
}
