use crate::error::CycleError;
use jiff::Timestamp;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportedError {
    pub kind: &'static str,
    pub fatal: bool,
    pub message: String,
}

impl From<&CycleError> for ReportedError {
    fn from(err: &CycleError) -> Self {
        Self {
            kind: err.kind(),
            fatal: err.is_fatal(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one issuance cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub id: Uuid,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    /// Owed subjects picked for this cycle.
    pub subjects_selected: usize,
    pub batches_posted: usize,
    /// PHNs accepted by the ledger, whether or not their bundle was posted.
    pub identifiers_generated: usize,
    /// Part of `identifiers_generated` left in no group because their batch
    /// was cut short.
    pub identifiers_unbatched: usize,
    /// Set once a fatal error stopped the cycle early.
    pub aborted: bool,
    pub errors: Vec<ReportedError>,
}

impl CycleReport {
    pub fn start() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Timestamp::now(),
            finished_at: None,
            subjects_selected: 0,
            batches_posted: 0,
            identifiers_generated: 0,
            identifiers_unbatched: 0,
            aborted: false,
            errors: Vec::new(),
        }
    }

    pub fn record(&mut self, err: &CycleError) {
        self.aborted |= err.is_fatal();
        self.errors.push(ReportedError::from(err));
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Timestamp::now());
        self
    }

    pub fn error_kinds(&self) -> Vec<&'static str> {
        self.errors.iter().map(|e| e.kind).collect()
    }
}
