use phnix_core::{CoreError, DuplicateKind, Phn, PoiCode, StorageError, SubjectId};
use phnix_fhir::{AuthError, DirectoryError, PostError};
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, CycleError>;

/// No issuance authority can take another batch.
#[derive(Debug, Clone, Error)]
pub enum AuthorityExhausted {
    #[error("no active authority has room for a batch of {batch_size}")]
    NoAuthority { batch_size: u64 },
    #[error("{attempts} consecutive attempts under {poi} produced no new PHN ({accepted} accepted before)")]
    AlphabetSpace {
        poi: PoiCode,
        attempts: u32,
        /// PHNs of the unfinished batch already in the ledger.
        accepted: usize,
    },
}

impl AuthorityExhausted {
    /// Ledger entries left outside any batch by this failure.
    pub fn unbatched(&self) -> usize {
        match self {
            AuthorityExhausted::NoAuthority { .. } => 0,
            AuthorityExhausted::AlphabetSpace { accepted, .. } => *accepted,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum CycleError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("directory read for {resource} failed: {source}")]
    DirectoryUnavailable {
        resource: String,
        #[source]
        source: DirectoryError,
    },
    #[error("subject {subject} has no {missing}")]
    IncompleteSubject {
        subject: SubjectId,
        missing: &'static str,
    },
    #[error("duplicate identifier {phn} ({kind:?})")]
    DuplicateIdentifier { phn: Phn, kind: DuplicateKind },
    #[error("authority exhausted: {0}")]
    AuthorityExhausted(#[from] AuthorityExhausted),
    #[error("identifier scheme rejected the authority code: {0}")]
    Scheme(#[from] CoreError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("count update for {poi} (+{count}) was not applied: {reason}")]
    Accounting {
        poi: PoiCode,
        count: u64,
        reason: String,
    },
    #[error("bundle {bundle} with {groups} groups was not accepted: {source}")]
    Post {
        bundle: Uuid,
        groups: usize,
        #[source]
        source: PostError,
    },
}

impl CycleError {
    /// Whether the cycle must stop assembling after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CycleError::Auth(_)
                | CycleError::AuthorityExhausted(_)
                | CycleError::Scheme(_)
                | CycleError::Storage(_)
        )
    }

    /// Stable name used in cycle reports and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::Auth(_) => "auth",
            CycleError::DirectoryUnavailable { .. } => "directory_unavailable",
            CycleError::IncompleteSubject { .. } => "incomplete_subject",
            CycleError::DuplicateIdentifier { .. } => "duplicate_identifier",
            CycleError::AuthorityExhausted(_) => "authority_exhausted",
            CycleError::Scheme(_) => "scheme",
            CycleError::Storage(_) => "storage",
            CycleError::Accounting { .. } => "accounting",
            CycleError::Post { .. } => "post",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_and_auth_failures_are_fatal() {
        let exhausted = CycleError::from(AuthorityExhausted::NoAuthority { batch_size: 100 });
        assert!(exhausted.is_fatal());
        assert_eq!(exhausted.kind(), "authority_exhausted");

        let auth = CycleError::from(AuthError::Unreachable("down".to_string()));
        assert!(auth.is_fatal());
    }

    #[test]
    fn only_a_cut_short_batch_leaves_unbatched_identifiers() {
        let no_room = AuthorityExhausted::NoAuthority { batch_size: 100 };
        assert_eq!(no_room.unbatched(), 0);

        let stuck = AuthorityExhausted::AlphabetSpace {
            poi: PoiCode::new("3053").unwrap(),
            attempts: 10_000,
            accepted: 37,
        };
        assert_eq!(stuck.unbatched(), 37);
        assert!(stuck.to_string().contains("37 accepted"));
    }

    #[test]
    fn subject_level_failures_are_not_fatal() {
        let directory = CycleError::DirectoryUnavailable {
            resource: "Group".to_string(),
            source: DirectoryError::Unavailable("timeout".to_string()),
        };
        assert!(!directory.is_fatal());

        let accounting = CycleError::Accounting {
            poi: PoiCode::new("3053").unwrap(),
            count: 100,
            reason: "authority is exhausted".to_string(),
        };
        assert!(!accounting.is_fatal());
        assert_eq!(
            accounting.to_string(),
            "count update for 3053 (+100) was not applied: authority is exhausted"
        );
    }
}
