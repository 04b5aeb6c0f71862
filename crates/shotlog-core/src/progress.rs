use serde::Serialize;

use crate::models::{Record, RecordStatus};

/// Run-level counters. Always recomputed by a full collection scan after
/// each batch commit, never accumulated incrementally, so the numbers stay
/// correct across interruption and resume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunProgress {
    pub total: usize,
    pub processed: usize,
    pub deferred: usize,
}

impl RunProgress {
    #[must_use]
    pub fn recompute(records: &[Record]) -> Self {
        let processed = records
            .iter()
            .filter(|record| record.status == RecordStatus::Processed)
            .count();
        let deferred = records
            .iter()
            .filter(|record| record.status == RecordStatus::Deferred)
            .count();
        Self {
            total: records.len(),
            processed,
            deferred,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed + self.deferred)
    }
}
