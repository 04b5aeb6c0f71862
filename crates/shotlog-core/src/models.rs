use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-record lifecycle state. `Processed` records never re-enter
/// eligibility; `Deferred` records re-enter once `defer_until` elapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Unprocessed,
    Processed,
    Deferred,
}

impl RecordStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unprocessed => "unprocessed",
            Self::Processed => "processed",
            Self::Deferred => "deferred",
        }
    }
}

/// One screenshot's enrichment state, as persisted in the collection file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Stable unique key; the screenshot filename in practice.
    pub id: String,
    /// Capture time as an ISO-8601 string; records without one are
    /// "orphans" and batch into a trailing group of their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,
    #[serde(default)]
    pub ocr_text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defer_until: Option<String>,
    /// Legacy 0/1 flag kept alongside `status`; eligibility requires 0.
    #[serde(default)]
    pub processed: u8,
    /// Last raw per-record model payload, kept for audit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_result: Option<Value>,
}

impl Record {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            captured_at: None,
            ocr_text: String::new(),
            tags: Vec::new(),
            summary: String::new(),
            confidence: 0.0,
            status: RecordStatus::Unprocessed,
            defer_until: None,
            processed: 0,
            model_result: None,
        }
    }
}

/// Harvest a float confidence from an untrusted wire value. Non-numeric,
/// missing, or non-finite shapes coerce to 0.0 without raising.
#[must_use]
pub fn coerce_confidence(value: Option<&Value>) -> f64 {
    let Some(value) = value else {
        return 0.0;
    };
    let raw = match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => text.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(flag) => {
            if *flag {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    };
    if raw.is_finite() { raw } else { 0.0 }
}

/// `ask_user` is untrusted too; anything other than an explicit truthy
/// value reads as false.
#[must_use]
pub fn result_ask_user(result: &Value) -> bool {
    match result.get("ask_user") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => matches!(
            text.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        ),
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

#[must_use]
pub fn result_tags(result: &Value) -> Vec<String> {
    result
        .get("tags_ai")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[must_use]
pub fn result_summary(result: &Value) -> String {
    result
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Tunables for one enrichment run. Defaults mirror the CLI surface.
#[derive(Debug, Clone)]
pub struct EnrichOptions {
    pub batch_size: usize,
    pub group_window_secs: i64,
    pub neighbor_window_mins: i64,
    pub confidence_threshold: f64,
    pub defer_hours: f64,
    pub sleep_seconds: f64,
    /// When false, the batch loop never asks whether to continue.
    pub confirm_between_batches: bool,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            batch_size: 5,
            group_window_secs: 30,
            neighbor_window_mins: 5,
            confidence_threshold: 0.6,
            defer_hours: 12.0,
            sleep_seconds: 2.0,
            confirm_between_batches: true,
        }
    }
}

/// How one enrichment run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No eligible records remained (or the operator declined to continue).
    Completed,
    /// The cancel token fired between batches; the collection was saved.
    Interrupted,
}

/// Per-batch tallies, reported after each commit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub batch_size: usize,
    pub processed: usize,
    pub deferred: usize,
    pub retried: usize,
    pub record_ids: Vec<String>,
}
