pub mod random;
pub mod source;

pub use random::RandomPhnGenerator;
pub use source::{RandSource, SeededRandom, ThreadRandom};

use phnix_core::{Candidate, CoreError, PoiCode};

/// Trait for producing PHN candidates.
///
/// Implementations are pure generators that don't interact with storage:
/// uniqueness is the ledger's job, and an invalid candidate is a normal
/// outcome the caller discards.
pub trait Generator: Send + Sync + 'static {
    /// Generates a candidate identifier prefixed with `poi`.
    ///
    /// Fails only when `poi` cannot be folded into the checksum, which is a
    /// configuration error rather than bad luck.
    fn generate(&self, poi: &PoiCode) -> Result<Candidate, CoreError>;
}
