use crate::error::{CoreError, StorageError};
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

type Result<T> = std::result::Result<T, StorageError>;

/// Width of every point-of-issue code.
pub const POI_CODE_LENGTH: usize = 4;

/// A validated point-of-issue code, the prefix of every PHN issued under an
/// authority.
///
/// Codes are exactly four ASCII alphanumeric characters, stored upper-case.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PoiCode(String);

impl PoiCode {
    pub fn new(code: impl Into<String>) -> std::result::Result<Self, CoreError> {
        let code = code.into().to_ascii_uppercase();
        Self::validate(&code)?;
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(code: &str) -> std::result::Result<(), CoreError> {
        if code.chars().count() != POI_CODE_LENGTH {
            return Err(CoreError::InvalidPoiCode(format!(
                "length must be {}, got {}",
                POI_CODE_LENGTH,
                code.chars().count()
            )));
        }

        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidPoiCode(format!(
                "must contain only alphanumeric characters: '{}'",
                code
            )));
        }

        Ok(())
    }
}

impl Display for PoiCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PoiCode {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PoiCode {
    type Error = CoreError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PoiCode> for String {
    fn from(value: PoiCode) -> Self {
        value.0
    }
}

/// Whether an authority may still issue identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorityStatus {
    Active,
    Exhausted,
}

impl AuthorityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorityStatus::Active => "active",
            AuthorityStatus::Exhausted => "exhausted",
        }
    }
}

impl Display for AuthorityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorityStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(AuthorityStatus::Active),
            // older ledgers marked spent authorities "inactive"
            "exhausted" | "inactive" => Ok(AuthorityStatus::Exhausted),
            other => Err(CoreError::InvalidPoiCode(format!(
                "unknown authority status '{}'",
                other
            ))),
        }
    }
}

/// An issuance authority (POI) and its running count of issued PHNs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuanceAuthority {
    pub code: PoiCode,
    pub status: AuthorityStatus,
    pub issued: u64,
    pub last_updated: Option<Timestamp>,
}

impl IssuanceAuthority {
    /// Identifiers that may still be issued before reaching `max_issued`.
    pub fn remaining(&self, max_issued: u64) -> u64 {
        max_issued.saturating_sub(self.issued)
    }

    /// Whether a batch of `batch_size` fits under `max_issued`.
    pub fn can_issue(&self, batch_size: u64, max_issued: u64) -> bool {
        self.status == AuthorityStatus::Active && self.remaining(max_issued) >= batch_size
    }
}

/// Storage for issuance authorities.
///
/// Authorities are provisioned out-of-band and are never deleted. The running
/// count only moves through [`AuthorityRepository::record_issued`], which must
/// be a single atomic conditional update.
#[async_trait]
pub trait AuthorityRepository: Send + Sync + 'static {
    /// Returns the first active authority, in provisioning order, that can
    /// still issue `batch_size` identifiers without exceeding `max_issued`.
    async fn next_available(
        &self,
        batch_size: u64,
        max_issued: u64,
    ) -> Result<Option<IssuanceAuthority>>;

    /// Adds `count` to the running total of `code`.
    ///
    /// The update only applies while the authority is active and the new
    /// total stays within `max_issued`; reaching `max_issued` marks it
    /// exhausted. Returns the updated authority, or `None` when the update did
    /// not apply.
    async fn record_issued(
        &self,
        code: &PoiCode,
        count: u64,
        max_issued: u64,
    ) -> Result<Option<IssuanceAuthority>>;

    /// Registers a new active authority with a zero count.
    /// Returns `false` if the code already exists.
    async fn provision(&self, code: &PoiCode) -> Result<bool>;

    /// Looks up an authority by code.
    async fn get(&self, code: &PoiCode) -> Result<Option<IssuanceAuthority>>;
}
