use std::collections::HashMap;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use serde_json::{Value, json};

use crate::batch::{build_batches, harvest_suggested_tags, neighbors_within, pending_records};
use crate::cancel::CancelToken;
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::invoke::{Expectation, ModelBackend, ModelInvoker, ModelResponse};
use crate::models::{
    BatchOutcome, EnrichOptions, Record, RecordStatus, RunOutcome, coerce_confidence,
    result_ask_user, result_summary, result_tags,
};
use crate::progress::RunProgress;
use crate::prompt::{build_batch_prompt, build_retry_prompt};
use crate::resolve::{Resolver, ReviewAction};
use crate::store::RecordStore;
use crate::timestamp::isoformat_utc;

/// Emitted to the caller after every committed batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    pub progress: RunProgress,
}

/// How one record left the per-record decision flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Accepted,
    AcceptedAfterRetry,
    Deferred,
}

/// The batch enrichment pipeline. Owns the in-memory master collection
/// for the duration of a run; all mutation happens here, one record at a
/// time, and the store is rewritten after every fully resolved batch.
pub struct Enricher<'a> {
    store: &'a RecordStore,
    records: Vec<Record>,
    backend: &'a dyn ModelBackend,
    resolver: &'a mut dyn Resolver,
    diagnostics: &'a Diagnostics,
    options: EnrichOptions,
    cancel: CancelToken,
}

impl<'a> Enricher<'a> {
    pub fn new(
        store: &'a RecordStore,
        records: Vec<Record>,
        backend: &'a dyn ModelBackend,
        resolver: &'a mut dyn Resolver,
        diagnostics: &'a Diagnostics,
        options: EnrichOptions,
        cancel: CancelToken,
    ) -> Self {
        Self {
            store,
            records,
            backend,
            resolver,
            diagnostics,
            options,
            cancel,
        }
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Resolve batches until no eligible records remain, the operator
    /// stops, or the cancel token fires. Cancellation always flushes the
    /// collection before returning.
    pub fn run(&mut self, on_batch: &mut dyn FnMut(&BatchReport)) -> Result<RunOutcome> {
        loop {
            if self.cancel.is_cancelled() {
                self.store.save(&self.records)?;
                return Ok(RunOutcome::Interrupted);
            }

            let pending = pending_records(&self.records, Utc::now());
            if pending.is_empty() {
                return Ok(RunOutcome::Completed);
            }
            let mut batches = build_batches(
                &pending,
                self.options.batch_size,
                self.options.group_window_secs,
            );
            if batches.is_empty() {
                return Ok(RunOutcome::Completed);
            }
            let batch = batches.remove(0);

            let outcome = self.process_batch(batch)?;
            let progress = RunProgress::recompute(&self.records);
            self.diagnostics.write_batch_summary(&outcome);
            on_batch(&BatchReport { outcome, progress });

            let still_pending = !pending_records(&self.records, Utc::now()).is_empty();
            if !still_pending {
                continue;
            }
            if self.options.confirm_between_batches
                && self.resolver.is_interactive()
                && !self.resolver.confirm_continue()
            {
                return Ok(RunOutcome::Completed);
            }
            if self.options.sleep_seconds > 0.0 {
                std::thread::sleep(StdDuration::from_secs_f64(self.options.sleep_seconds));
            }
        }
    }

    /// Resolve every record of one batch, merge the batch back into the
    /// master collection, and persist. A model-process failure aborts
    /// before any record of this batch was merged, so the previous save
    /// stays authoritative.
    fn process_batch(&mut self, mut batch: Vec<Record>) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome {
            batch_size: batch.len(),
            record_ids: batch.iter().map(|record| record.id.clone()).collect(),
            ..BatchOutcome::default()
        };

        let log_id = batch
            .first()
            .map_or_else(|| "batch".to_string(), |record| record.id.clone());
        let prompt = build_batch_prompt(&batch);
        let invoker = ModelInvoker::new(self.backend, self.diagnostics);
        let results = match invoker.invoke(&prompt, &log_id, Expectation::List)? {
            ModelResponse::List(items) => items,
            ModelResponse::Object(single) => vec![single],
        };

        if results.len() != batch.len() {
            eprintln!(
                "warning: expected {} results for batch {log_id} but received {}",
                batch.len(),
                results.len()
            );
        }
        let mut aligned: Vec<Option<Value>> = results.into_iter().map(Some).collect();
        aligned.resize_with(batch.len(), || None);

        for (index, record) in batch.iter_mut().enumerate() {
            let result = aligned[index].take();
            match self.decide(record, index, result, &log_id) {
                Decision::Accepted => outcome.processed += 1,
                Decision::AcceptedAfterRetry => {
                    outcome.processed += 1;
                    outcome.retried += 1;
                }
                Decision::Deferred => outcome.deferred += 1,
            }
        }

        merge_into_master(&mut self.records, &batch);
        self.store.save(&self.records)?;
        Ok(outcome)
    }

    /// Per-record state machine:
    /// `pending_result -> {accepted, deferred, needs_attention}`,
    /// `needs_attention -> {deferred, retrying, manual}`,
    /// `retrying -> {accepted, manual}`, `manual -> accepted`.
    fn decide(
        &mut self,
        record: &mut Record,
        index: usize,
        result: Option<Value>,
        log_id: &str,
    ) -> Decision {
        let Some(mut result) = result else {
            // Count mismatch: nothing to evaluate, defer conservatively.
            eprintln!("warning: deferred {} (missing model result)", record.id);
            record.confidence = 0.0;
            self.defer(record);
            return Decision::Deferred;
        };

        if !result.is_object() {
            eprintln!(
                "warning: non-object model result for index {index} ({}); using low-confidence stand-in",
                record.id
            );
            self.diagnostics.append_bad_response(index, &record.id, &result);
            result = json!({"tags_ai": [], "summary": "", "confidence": 0});
        }

        let confidence = coerce_confidence(result.get("confidence"));
        record.model_result = Some(result.clone());
        record.confidence = confidence;

        let needs_attention =
            result_ask_user(&result) || confidence < self.options.confidence_threshold;
        if !needs_attention {
            self.accept(record, &result, confidence);
            return Decision::Accepted;
        }

        let action = if self.resolver.is_interactive() {
            self.resolver.choose_action(&record.id, confidence)
        } else {
            ReviewAction::Skip
        };

        if action == ReviewAction::Skip {
            self.defer(record);
            return Decision::Deferred;
        }

        let neighbors = neighbors_within(record, &self.records, self.options.neighbor_window_mins);
        let suggested = harvest_suggested_tags(&neighbors);

        if action == ReviewAction::Retry
            && self.resolver.confirm_retry(&record.id, &neighbors, &suggested)
        {
            let retry_log_id = format!("{log_id}-retry-{index}");
            let retry_prompt = build_retry_prompt(record, &result);
            let invoker = ModelInvoker::new(self.backend, self.diagnostics);
            match invoker.invoke(&retry_prompt, &retry_log_id, Expectation::SingleObject) {
                Ok(ModelResponse::Object(refreshed)) => {
                    let refreshed_confidence = refreshed
                        .get("confidence")
                        .map_or(confidence, |value| coerce_confidence(Some(value)));
                    self.accept(record, &refreshed, refreshed_confidence);
                    return Decision::AcceptedAfterRetry;
                }
                Ok(ModelResponse::List(_)) => {
                    // The invoker never yields a list for a single-object
                    // expectation; treat it as a retry failure all the same.
                    eprintln!("warning: retry returned a list for {}", record.id);
                }
                Err(err) => {
                    eprintln!("warning: retry failed for {}: {err}", record.id);
                }
            }
            // fall through to manual
        }

        let entry = self.resolver.manual_entry(&record.id, &suggested);
        record.confidence = if entry.has_content() { 1.0 } else { confidence };
        record.tags = entry.tags;
        record.summary = entry.summary;
        finalize_accepted(record);
        Decision::Accepted
    }

    fn accept(&self, record: &mut Record, result: &Value, confidence: f64) {
        record.tags = result_tags(result);
        record.summary = result_summary(result);
        record.confidence = confidence;
        finalize_accepted(record);
    }

    fn defer(&self, record: &mut Record) {
        let defer_until = Utc::now() + defer_duration(self.options.defer_hours);
        record.status = RecordStatus::Deferred;
        record.defer_until = Some(isoformat_utc(defer_until));
        record.processed = 0;
    }
}

fn finalize_accepted(record: &mut Record) {
    record.status = RecordStatus::Processed;
    record.processed = 1;
    record.defer_until = None;
}

fn defer_duration(hours: f64) -> Duration {
    Duration::seconds((hours * 3600.0) as i64)
}

/// Replace master entries by id with their resolved batch counterparts.
fn merge_into_master(master: &mut [Record], batch: &[Record]) {
    let by_id: HashMap<&str, &Record> = batch
        .iter()
        .map(|record| (record.id.as_str(), record))
        .collect();
    for slot in master.iter_mut() {
        if let Some(resolved) = by_id.get(slot.id.as_str()) {
            *slot = (*resolved).clone();
        }
    }
}
