use crate::error::DirectoryError;
use crate::token::AccessToken;
use async_trait::async_trait;
use serde_json::Value;

/// Whether a query matched anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Found,
    NotFound,
}

/// Result of a directory read.
///
/// `entries` are Bundle entries (objects holding a `resource`); a read by id
/// is wrapped into a single entry so callers handle both shapes the same way.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryResponse {
    pub status: QueryStatus,
    pub entries: Vec<Value>,
}

impl DirectoryResponse {
    pub fn found(entries: Vec<Value>) -> Self {
        let status = if entries.is_empty() {
            QueryStatus::NotFound
        } else {
            QueryStatus::Found
        };
        Self { status, entries }
    }

    pub fn not_found() -> Self {
        Self {
            status: QueryStatus::NotFound,
            entries: Vec::new(),
        }
    }

    pub fn is_found(&self) -> bool {
        self.status == QueryStatus::Found
    }

    /// The `resource` of every entry.
    pub fn resources(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().filter_map(|entry| entry.get("resource"))
    }
}

/// Read-only view of the FHIR resource server.
#[async_trait]
pub trait ResourceDirectory: Send + Sync + 'static {
    async fn query(
        &self,
        token: &AccessToken,
        resource_type: &str,
        id: Option<&str>,
        params: &[(String, String)],
    ) -> Result<DirectoryResponse, DirectoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_search_is_not_found() {
        assert_eq!(DirectoryResponse::found(vec![]).status, QueryStatus::NotFound);
        assert!(!DirectoryResponse::not_found().is_found());
    }

    #[test]
    fn resources_skip_entries_without_a_resource() {
        let response = DirectoryResponse::found(vec![
            json!({"resource": {"id": "a"}}),
            json!({"search": {"mode": "include"}}),
        ]);
        let ids: Vec<_> = response.resources().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("a")]);
    }
}
