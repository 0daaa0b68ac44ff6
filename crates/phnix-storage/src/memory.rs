use crate::error::Result;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jiff::Timestamp;
use parking_lot::Mutex;
use phnix_core::{
    AuthorityRepository, AuthorityStatus, DuplicateKind, Insertion, IssuanceAuthority, Ledger, Phn,
    PoiCode, SubjectId,
};

/// Ledger row kept for every issued PHN.
#[derive(Debug, Clone)]
struct LedgerEntry {
    issued_for: SubjectId,
    issued_at: Timestamp,
}

/// In-memory ledger and authority store.
///
/// The ledger uses DashMap's entry API, so the check and the insert happen
/// under one shard lock and concurrent inserts of the same PHN have a single
/// winner. Authorities live behind a mutex in provisioning order, which
/// makes every count update a single critical section.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    ledger: DashMap<String, LedgerEntry>,
    authorities: Mutex<Vec<IssuanceAuthority>>,
}

impl InMemoryRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository whose ledger has room for `capacity` PHNs.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ledger: DashMap::with_capacity(capacity),
            authorities: Mutex::new(Vec::new()),
        }
    }

    /// Returns the subject a PHN was issued for.
    pub fn issued_for(&self, phn: &Phn) -> Option<SubjectId> {
        self.ledger
            .get(phn.as_str())
            .map(|entry| entry.issued_for.clone())
    }

    /// Returns when a PHN was recorded.
    pub fn issued_at(&self, phn: &Phn) -> Option<Timestamp> {
        self.ledger.get(phn.as_str()).map(|entry| entry.issued_at)
    }
}

#[async_trait]
impl Ledger for InMemoryRepository {
    async fn try_insert(&self, phn: &Phn, issued_for: &SubjectId) -> Result<Insertion> {
        match self.ledger.entry(phn.as_str().to_owned()) {
            Entry::Occupied(_) => Ok(Insertion::Rejected(DuplicateKind::AlreadyIssued)),
            Entry::Vacant(slot) => {
                slot.insert(LedgerEntry {
                    issued_for: issued_for.clone(),
                    issued_at: Timestamp::now(),
                });
                Ok(Insertion::Accepted)
            }
        }
    }

    async fn contains(&self, phn: &Phn) -> Result<bool> {
        Ok(self.ledger.contains_key(phn.as_str()))
    }

    async fn len(&self) -> Result<u64> {
        Ok(self.ledger.len() as u64)
    }
}

#[async_trait]
impl AuthorityRepository for InMemoryRepository {
    async fn next_available(
        &self,
        batch_size: u64,
        max_issued: u64,
    ) -> Result<Option<IssuanceAuthority>> {
        let authorities = self.authorities.lock();
        Ok(authorities
            .iter()
            .find(|authority| authority.can_issue(batch_size, max_issued))
            .cloned())
    }

    async fn record_issued(
        &self,
        code: &PoiCode,
        count: u64,
        max_issued: u64,
    ) -> Result<Option<IssuanceAuthority>> {
        let mut authorities = self.authorities.lock();

        let Some(authority) = authorities
            .iter_mut()
            .find(|authority| &authority.code == code)
        else {
            return Ok(None);
        };

        if !authority.can_issue(count, max_issued) {
            return Ok(None);
        }

        authority.issued += count;
        if authority.issued >= max_issued {
            authority.status = AuthorityStatus::Exhausted;
        }
        authority.last_updated = Some(Timestamp::now());

        Ok(Some(authority.clone()))
    }

    async fn provision(&self, code: &PoiCode) -> Result<bool> {
        let mut authorities = self.authorities.lock();

        if authorities.iter().any(|authority| &authority.code == code) {
            return Ok(false);
        }

        authorities.push(IssuanceAuthority {
            code: code.clone(),
            status: AuthorityStatus::Active,
            issued: 0,
            last_updated: Some(Timestamp::now()),
        });
        Ok(true)
    }

    async fn get(&self, code: &PoiCode) -> Result<Option<IssuanceAuthority>> {
        let authorities = self.authorities.lock();
        Ok(authorities
            .iter()
            .find(|authority| &authority.code == code)
            .cloned())
    }
}
