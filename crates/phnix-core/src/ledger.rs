use crate::error::StorageError;
use crate::phn::Phn;
use crate::subject::SubjectId;
use async_trait::async_trait;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Why the ledger refused an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DuplicateKind {
    /// The value was already recorded, by this or any earlier or concurrent
    /// run.
    AlreadyIssued,
}

/// Outcome of [`Ledger::try_insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// The identifier was recorded and now belongs to the caller.
    Accepted,
    /// The identifier already exists; the caller must generate another.
    Rejected(DuplicateKind),
}

impl Insertion {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Insertion::Accepted)
    }
}

/// The record of every PHN ever issued.
///
/// Implementations must make [`Ledger::try_insert`] atomic: when several
/// callers insert the same value concurrently exactly one of them observes
/// [`Insertion::Accepted`]. This is the only guarantee that keeps two subjects
/// from receiving the same PHN.
#[async_trait]
pub trait Ledger: Send + Sync + 'static {
    /// Records `phn` as issued for `issued_for`.
    ///
    /// A duplicate is reported as [`Insertion::Rejected`], not as an error.
    async fn try_insert(&self, phn: &Phn, issued_for: &SubjectId) -> Result<Insertion>;

    /// Checks whether `phn` has been recorded.
    async fn contains(&self, phn: &Phn) -> Result<bool>;

    /// Number of recorded identifiers.
    async fn len(&self) -> Result<u64>;
}
