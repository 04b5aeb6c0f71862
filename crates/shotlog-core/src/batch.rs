use chrono::{DateTime, Duration, Utc};

use crate::models::Record;
use crate::timestamp::parse_iso_utc_opt;

/// Records eligible for enrichment right now: never processed, and if
/// deferred, only once `defer_until` has elapsed relative to `now`.
#[must_use]
pub fn pending_records(records: &[Record], now: DateTime<Utc>) -> Vec<Record> {
    records
        .iter()
        .filter(|record| is_eligible(record, now))
        .cloned()
        .collect()
}

#[must_use]
pub fn is_eligible(record: &Record, now: DateTime<Utc>) -> bool {
    if record.processed != 0 {
        return false;
    }
    if record.status == crate::models::RecordStatus::Deferred {
        let defer_until = parse_iso_utc_opt(record.defer_until.as_deref().unwrap_or(""))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        return defer_until <= now;
    }
    true
}

/// Partition records into maximal runs where consecutive capture gaps stay
/// within `window_secs`. Records without a parsable timestamp collect into
/// one trailing orphan group. Deterministic for identical input.
#[must_use]
pub fn group_by_capture_time(records: &[Record], window_secs: i64) -> Vec<Vec<Record>> {
    if records.is_empty() {
        return Vec::new();
    }
    let mut sorted: Vec<Record> = records.to_vec();
    // The raw ISO string is the sort key; chronological for normalized
    // values and stable for equal keys.
    sorted.sort_by(|a, b| {
        a.captured_at
            .as_deref()
            .unwrap_or("")
            .cmp(b.captured_at.as_deref().unwrap_or(""))
    });

    let mut groups: Vec<Vec<Record>> = Vec::new();
    let mut current: Vec<Record> = Vec::new();
    let mut orphans: Vec<Record> = Vec::new();
    let mut last_ts: Option<DateTime<Utc>> = None;

    for record in sorted {
        let Some(ts) = record
            .captured_at
            .as_deref()
            .and_then(parse_iso_utc_opt)
        else {
            orphans.push(record);
            continue;
        };

        // Millisecond math keeps sub-second gaps from truncating to the
        // window boundary.
        if let Some(previous) = last_ts
            && (ts - previous).num_milliseconds() > window_secs * 1000
            && !current.is_empty()
        {
            groups.push(std::mem::take(&mut current));
        }
        current.push(record);
        last_ts = Some(ts);
    }

    if !current.is_empty() {
        groups.push(current);
    }
    if !orphans.is_empty() {
        groups.push(orphans);
    }
    groups
}

/// Slice time groups into consecutive chunks of at most `batch_size`.
/// A batch never spans two groups.
#[must_use]
pub fn build_batches(records: &[Record], batch_size: usize, window_secs: i64) -> Vec<Vec<Record>> {
    let size = batch_size.max(1);
    let mut batches = Vec::new();
    for group in group_by_capture_time(records, window_secs) {
        for chunk in group.chunks(size) {
            batches.push(chunk.to_vec());
        }
    }
    batches
}

/// All other records captured within ± `window_mins` of the target.
/// Read-only; collection order is preserved (not time-sorted).
#[must_use]
pub fn neighbors_within<'a>(
    target: &Record,
    records: &'a [Record],
    window_mins: i64,
) -> Vec<&'a Record> {
    let Some(center) = target
        .captured_at
        .as_deref()
        .and_then(parse_iso_utc_opt)
    else {
        return Vec::new();
    };
    let start = center - Duration::minutes(window_mins);
    let end = center + Duration::minutes(window_mins);

    records
        .iter()
        .filter(|candidate| candidate.id != target.id)
        .filter(|candidate| {
            candidate
                .captured_at
                .as_deref()
                .and_then(parse_iso_utc_opt)
                .is_some_and(|ts| ts >= start && ts <= end)
        })
        .collect()
}

/// Candidate tags harvested from neighbors: deduplicated, sorted, empties
/// dropped.
#[must_use]
pub fn harvest_suggested_tags(neighbors: &[&Record]) -> Vec<String> {
    let mut tags: Vec<String> = neighbors
        .iter()
        .flat_map(|record| record.tags.iter())
        .filter(|tag| !tag.is_empty())
        .cloned()
        .collect();
    tags.sort();
    tags.dedup();
    tags
}
