use crate::authority::PoiCode;
use crate::phn::Phn;
use crate::subject::Subject;
use serde::{Deserialize, Serialize};

/// Default number of PHNs per group.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// A full group of ledger-accepted PHNs for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub authority: PoiCode,
    pub subject: Subject,
    pub identifiers: Vec<Phn>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}
