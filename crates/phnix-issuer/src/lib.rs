//! The PHN issuance pipeline.
//!
//! A cycle fetches a token, discovers practitioners short of PHN groups,
//! fills one batch per owed group from the ledger and posts all groups in a
//! single transaction bundle. [`IssuerContext`] carries every collaborator;
//! callers drive it through [`CycleRunner`].

pub mod assembler;
pub mod cycle;
pub mod discovery;
pub mod error;
pub mod provision;
pub mod report;

#[cfg(test)]
mod testing;

pub use assembler::{
    AssemblerConfig, Assembled, BatchAssembler, IssuanceStore, DEFAULT_MAX_ATTEMPTS_PER_SLOT,
    DEFAULT_MAX_PHN_PER_POI,
};
pub use cycle::{CycleRunner, IssuerContext, IssuerSettings, DEFAULT_SUBJECT_CONCURRENCY};
pub use discovery::{Discovery, Practitioner, SubjectDiscovery, DEFAULT_PRACTITIONER_FETCH_LIMIT};
pub use error::{AuthorityExhausted, CycleError};
pub use provision::provision_authorities;
pub use report::{CycleReport, ReportedError};
