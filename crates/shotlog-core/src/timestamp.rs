use chrono::{DateTime, SecondsFormat, Utc};

/// Parse an ISO-8601 timestamp into a UTC-aware instant.
///
/// Naive values are taken as UTC; explicit offsets are converted, so two
/// strings naming the same instant compare equal after parsing. Empty or
/// unparsable input falls back to the epoch floor so callers can keep a
/// total order without special cases.
#[must_use]
pub fn parse_iso_utc(raw: &str) -> DateTime<Utc> {
    parse_iso_utc_opt(raw).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Like [`parse_iso_utc`] but reports failure instead of flooring.
#[must_use]
pub fn parse_iso_utc_opt(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    // Naive timestamps (no offset) are treated as UTC.
    if let Ok(naive) = trimmed.parse::<chrono::NaiveDateTime>() {
        return Some(naive.and_utc());
    }
    None
}

/// Render an instant as ISO-8601 UTC with a trailing `Z`.
#[must_use]
pub fn isoformat_utc(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
