use crate::models::Record;

/// Operator's verdict for a record that needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    /// Defer the record for later re-evaluation.
    Skip,
    /// Re-invoke the model with the previous result as context.
    Retry,
    /// Collect tags and a summary from the operator.
    Manual,
}

/// What the operator supplied during a manual entry.
#[derive(Debug, Clone, Default)]
pub struct ManualEntry {
    pub tags: Vec<String>,
    pub summary: String,
}

impl ManualEntry {
    /// Content supplied at all? Drives the manual-confidence rule.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.tags.is_empty() || !self.summary.trim().is_empty()
    }
}

/// Guided manual-entry questions and the tag each yes answer adds.
pub const GUIDED_QUESTIONS: [(&str, &str); 5] = [
    (
        "Is this screenshot related to work or productivity tools?",
        "work",
    ),
    ("Does it feature communication or messaging apps?", "communication"),
    ("Is there visible code or a terminal window?", "development"),
    ("Is it a game or entertainment content?", "entertainment"),
    (
        "Does it include charts, dashboards, or analytics?",
        "analytics",
    ),
];

/// Seam between the decision engine and a human operator. The engine only
/// calls into this when a record needs attention; unattended runs plug in
/// [`AutoResolver`] and never block.
pub trait Resolver {
    /// Whether an operator is actually present. When false the engine
    /// resolves every `needs_attention` record as a deferral.
    fn is_interactive(&self) -> bool;

    /// Timed skip/retry/manual menu for one low-confidence record.
    fn choose_action(&mut self, record_id: &str, confidence: f64) -> ReviewAction;

    /// Show nearby-capture context and confirm the retry. Default yes.
    fn confirm_retry(
        &mut self,
        record_id: &str,
        neighbors: &[&Record],
        suggested_tags: &[String],
    ) -> bool;

    /// Guided + free-form manual entry for one record.
    fn manual_entry(&mut self, record_id: &str, suggested_tags: &[String]) -> ManualEntry;

    /// Asked between batches when continuation confirmation is enabled.
    fn confirm_continue(&mut self) -> bool;
}

/// Unattended resolver: skip everything, confirm nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoResolver;

impl Resolver for AutoResolver {
    fn is_interactive(&self) -> bool {
        false
    }

    fn choose_action(&mut self, _record_id: &str, _confidence: f64) -> ReviewAction {
        ReviewAction::Skip
    }

    fn confirm_retry(
        &mut self,
        _record_id: &str,
        _neighbors: &[&Record],
        _suggested_tags: &[String],
    ) -> bool {
        false
    }

    fn manual_entry(&mut self, _record_id: &str, _suggested_tags: &[String]) -> ManualEntry {
        ManualEntry::default()
    }

    fn confirm_continue(&mut self) -> bool {
        true
    }
}

/// Merge tag sources preserving first-seen order, dropping empties and
/// duplicates.
#[must_use]
pub fn merge_tags(sources: &[&[String]]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for source in sources {
        for tag in *source {
            if !tag.is_empty() && !merged.contains(tag) {
                merged.push(tag.clone());
            }
        }
    }
    merged
}
