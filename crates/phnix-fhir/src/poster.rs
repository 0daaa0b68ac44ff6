use crate::bundle::Bundle;
use crate::error::PostError;
use crate::token::AccessToken;
use async_trait::async_trait;
use serde_json::Value;

/// Server acknowledgement of a transaction bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleAck {
    pub status: u16,
    /// The `transaction-response` Bundle, or `Null` for an empty body.
    pub response: Value,
}

/// Submits transaction bundles. A bundle is applied as a whole or not at all.
#[async_trait]
pub trait BundlePoster: Send + Sync + 'static {
    async fn post(&self, token: &AccessToken, bundle: &Bundle) -> Result<BundleAck, PostError>;
}
