use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::CollectError;
use crate::model::TradeRecord;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Instrument name made safe for use as a single file name component.
pub fn sanitize_file_name(instrument_name: &str) -> String {
    instrument_name.replace(['/', '\\'], "_")
}

/// `<output_dir>/<sanitized name>.csv`
pub fn trades_path(output_dir: &Path, instrument_name: &str) -> PathBuf {
    output_dir.join(format!("{}.csv", sanitize_file_name(instrument_name)))
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Write all records of one instrument, replacing any previous file.
///
/// Rows go to a temporary file in `output_dir` that is then renamed over the
/// final path, so concurrent writers of the same name never interleave and
/// the last rename wins with a complete file.
pub fn write_trades(
    output_dir: &Path,
    instrument_name: &str,
    records: &[TradeRecord],
) -> Result<PathBuf, CollectError> {
    let path = trades_path(output_dir, instrument_name);
    let tmp = output_dir.join(format!(
        ".{}.{}.{}.tmp",
        sanitize_file_name(instrument_name),
        std::process::id(),
        TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
    ));

    let written = write_csv(&tmp, records).and_then(|()| {
        std::fs::rename(&tmp, &path).map_err(|e| CollectError::persistence(&path, e))
    });
    if written.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    written.map(|()| path)
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), CollectError> {
    let fail = |e: &dyn std::fmt::Display| CollectError::persistence(path, e);

    let mut wtr = csv::Writer::from_path(path).map_err(|e| fail(&e))?;
    for row in rows {
        wtr.serialize(row).map_err(|e| fail(&e))?;
    }
    wtr.flush().map_err(|e| fail(&e))?;
    Ok(())
}

/// Write `value` as pretty JSON to `path`.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CollectError> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| CollectError::persistence(path, e))?;
    std::fs::write(path, json).map_err(|e| CollectError::persistence(path, e))
}
