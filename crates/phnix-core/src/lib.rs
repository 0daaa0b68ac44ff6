//! Core types and traits for PHN issuance.
//!
//! This crate holds the checksum engine, the identifier scheme, and the
//! storage contracts shared by the generator, the storage backends and the
//! issuer pipeline.

pub mod allocation;
pub mod alphabet;
pub mod authority;
pub mod batch;
pub mod checksum;
pub mod error;
pub mod ledger;
pub mod phn;
pub mod subject;

pub use allocation::{compute_owed, AllocationPolicy, SubjectAllocation};
pub use alphabet::Alphabet;
pub use authority::{AuthorityRepository, AuthorityStatus, IssuanceAuthority, PoiCode};
pub use batch::Batch;
pub use checksum::LuhnModN;
pub use error::{CoreError, StorageError};
pub use ledger::{DuplicateKind, Insertion, Ledger};
pub use phn::{Candidate, Phn, PhnScheme};
pub use subject::{Subject, SubjectId, SubjectMetadata};
