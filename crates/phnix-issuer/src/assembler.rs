use crate::error::{AuthorityExhausted, CycleError, Result};
use phnix_core::batch::DEFAULT_BATCH_SIZE;
use phnix_core::{AuthorityRepository, Batch, Insertion, Ledger, Phn, PoiCode, Subject};
use phnix_generator::Generator;
use std::sync::Arc;
use typed_builder::TypedBuilder;

pub const DEFAULT_MAX_ATTEMPTS_PER_SLOT: u32 = 10_000;
pub const DEFAULT_MAX_PHN_PER_POI: u64 = 1_000_000;

/// Store holding both the ledger and the authority counts.
pub trait IssuanceStore: Ledger + AuthorityRepository {}

impl<T: Ledger + AuthorityRepository> IssuanceStore for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct AssemblerConfig {
    #[builder(default = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
    /// Consecutive failed attempts tolerated for one slot before the
    /// authority is considered out of room.
    #[builder(default = DEFAULT_MAX_ATTEMPTS_PER_SLOT)]
    pub max_attempts_per_slot: u32,
    #[builder(default = DEFAULT_MAX_PHN_PER_POI)]
    pub max_phn_per_poi: u64,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A completed batch, plus the accounting failure if its authority count
/// could not be moved.
#[derive(Debug)]
pub struct Assembled {
    pub batch: Batch,
    pub accounting_gap: Option<CycleError>,
}

/// Fills batches with ledger-accepted PHNs.
#[derive(Debug)]
pub struct BatchAssembler<S, G> {
    store: Arc<S>,
    generator: Arc<G>,
    config: AssemblerConfig,
}

impl<S, G> Clone for BatchAssembler<S, G> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            generator: Arc::clone(&self.generator),
            config: self.config,
        }
    }
}

impl<S: IssuanceStore, G: Generator> BatchAssembler<S, G> {
    pub fn new(store: Arc<S>, generator: Arc<G>, config: AssemblerConfig) -> Self {
        Self {
            store,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Picks an authority, fills one batch for `subject` and books the batch
    /// against the authority.
    pub async fn assemble(&self, subject: &Subject) -> Result<Assembled> {
        let batch_size = self.config.batch_size as u64;

        let authority = self
            .store
            .next_available(batch_size, self.config.max_phn_per_poi)
            .await?
            .ok_or(AuthorityExhausted::NoAuthority { batch_size })?;

        tracing::debug!(
            poi = %authority.code,
            issued = authority.issued,
            subject = %subject.id,
            "assembling batch"
        );

        let batch = self
            .assemble_batch(&authority.code, subject, self.config.batch_size)
            .await?;
        let accounting_gap = self.record(&batch).await;

        Ok(Assembled {
            batch,
            accounting_gap,
        })
    }

    /// Collects `target_size` fresh PHNs under `authority`.
    ///
    /// Invalid candidates and ledger duplicates are regenerated. Once
    /// `max_attempts_per_slot` attempts in a row fail for one slot the call
    /// gives up with [`AuthorityExhausted::AlphabetSpace`]; the PHNs already
    /// accepted stay in the ledger and are counted in the error.
    pub async fn assemble_batch(
        &self,
        authority: &PoiCode,
        subject: &Subject,
        target_size: usize,
    ) -> Result<Batch> {
        let mut identifiers = Vec::with_capacity(target_size);

        while identifiers.len() < target_size {
            match self.fill_slot(authority, subject).await? {
                Some(phn) => identifiers.push(phn),
                None => {
                    tracing::error!(
                        poi = %authority,
                        attempts = self.config.max_attempts_per_slot,
                        accepted = identifiers.len(),
                        "retry ceiling reached"
                    );
                    return Err(AuthorityExhausted::AlphabetSpace {
                        poi: authority.clone(),
                        attempts: self.config.max_attempts_per_slot,
                        accepted: identifiers.len(),
                    }
                    .into());
                }
            }
        }

        Ok(Batch {
            authority: authority.clone(),
            subject: subject.clone(),
            identifiers,
        })
    }

    /// Returns `None` once `max_attempts_per_slot` attempts in a row fail.
    async fn fill_slot(&self, authority: &PoiCode, subject: &Subject) -> Result<Option<Phn>> {
        for _ in 0..self.config.max_attempts_per_slot {
            let candidate = self.generator.generate(authority)?;
            let Some(phn) = candidate.into_phn() else {
                tracing::trace!(poi = %authority, "discarding invalid candidate");
                continue;
            };

            match self.store.try_insert(&phn, &subject.id).await? {
                Insertion::Accepted => return Ok(Some(phn)),
                Insertion::Rejected(kind) => {
                    let duplicate = CycleError::DuplicateIdentifier { phn, kind };
                    tracing::debug!(error = %duplicate, "regenerating");
                }
            }
        }
        Ok(None)
    }

    async fn record(&self, batch: &Batch) -> Option<CycleError> {
        let count = batch.len() as u64;
        let reason = match self
            .store
            .record_issued(&batch.authority, count, self.config.max_phn_per_poi)
            .await
        {
            Ok(Some(authority)) => {
                tracing::info!(
                    poi = %authority.code,
                    issued = authority.issued,
                    status = %authority.status,
                    "authority count updated"
                );
                return None;
            }
            Ok(None) => "authority is no longer active or lacks room".to_string(),
            Err(err) => err.to_string(),
        };

        let gap = CycleError::Accounting {
            poi: batch.authority.clone(),
            count,
            reason,
        };
        tracing::warn!(error = %gap, "identifiers stay issued without being counted");
        Some(gap)
    }
}
