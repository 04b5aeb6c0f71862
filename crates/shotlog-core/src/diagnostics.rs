use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use serde_json::{Value, json};

use crate::models::BatchOutcome;

const BAD_RESPONSES_FILE: &str = "bad_responses.jsonl";

/// Run diagnostics sink: prompt/stdout/stderr captures, per-batch
/// summaries, and a JSONL trail of malformed per-record results.
///
/// Every write is best-effort. A failing diagnostics directory must never
/// take the enrichment run down with it, so failures are reported on
/// stderr and swallowed.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    dir: Option<PathBuf>,
}

impl Diagnostics {
    #[must_use]
    pub fn enabled(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    #[must_use]
    pub const fn disabled() -> Self {
        Self { dir: None }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Write one capture file named `<timestamp>-<sanitized-id>.<suffix>`.
    pub fn write_capture(&self, log_id: &str, suffix: &str, content: &str) {
        let Some(dir) = &self.dir else {
            return;
        };
        let name = format!("{}-{}.{suffix}", stamp(), sanitize_id(log_id));
        best_effort(|| {
            fs::create_dir_all(dir)?;
            fs::write(dir.join(name), content)
        });
    }

    /// Write the `batch_<timestamp>.log` summary for one committed batch.
    pub fn write_batch_summary(&self, outcome: &BatchOutcome) {
        let Some(dir) = &self.dir else {
            return;
        };
        let mut lines = vec![
            format!("Processed: {}", outcome.processed),
            format!("Deferred: {}", outcome.deferred),
            format!("Retried: {}", outcome.retried),
            "Files:".to_string(),
        ];
        lines.extend(outcome.record_ids.iter().map(|id| format!("  - {id}")));
        let name = format!("batch_{}.log", stamp());
        best_effort(|| {
            fs::create_dir_all(dir)?;
            fs::write(dir.join(name), lines.join("\n"))
        });
    }

    /// Append one JSONL line for a per-record result that was present but
    /// not a structured object.
    pub fn append_bad_response(&self, index: usize, record_id: &str, raw: &Value) {
        let Some(dir) = &self.dir else {
            return;
        };
        let line = json!({
            "timestamp": crate::timestamp::isoformat_utc(Utc::now()),
            "index": index,
            "id": record_id,
            "output": raw.to_string(),
        });
        best_effort(|| {
            fs::create_dir_all(dir)?;
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(BAD_RESPONSES_FILE))?;
            writeln!(file, "{line}")
        });
    }

    /// Capture the raw stdout of a retry invocation whose output could not
    /// be shaped into a JSON object.
    pub fn write_retry_failure(&self, stdout: &str) {
        let Some(dir) = &self.dir else {
            return;
        };
        let name = format!("retry_failed_{}.txt", stamp());
        best_effort(|| {
            fs::create_dir_all(dir)?;
            fs::write(dir.join(name), stdout)
        });
    }
}

fn stamp() -> String {
    Utc::now().format("%Y%m%d-%H%M%S").to_string()
}

/// Filenames keep alphanumerics only; everything else becomes `_`.
/// Capped at 32 chars, with a fixed fallback for empty ids.
fn sanitize_id(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .take(32)
        .collect();
    if cleaned.is_empty() {
        "batch".to_string()
    } else {
        cleaned
    }
}

fn best_effort<T>(write: impl FnOnce() -> std::io::Result<T>) {
    if let Err(err) = write() {
        eprintln!("warning: diagnostics write failed: {err}");
    }
}
