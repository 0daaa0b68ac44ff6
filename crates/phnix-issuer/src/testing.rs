//! In-memory collaborators for issuer tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use phnix_fhir::{
    AccessToken, AuthError, Bundle, BundleAck, BundlePoster, DirectoryError, DirectoryResponse,
    PostError, ResourceDirectory, TokenProvider,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn unavailable() -> DirectoryError {
    DirectoryError::Unavailable("connection reset".to_string())
}

#[derive(Default)]
pub struct FakeDirectory {
    practitioners: Vec<(String, String)>,
    failing_practitioners: bool,
    groups: HashMap<String, Vec<bool>>,
    failing_groups: HashSet<String>,
    details: HashMap<String, Option<(String, String, String)>>,
}

impl FakeDirectory {
    pub fn with_practitioner(mut self, id: &str, keycloak_uuid: &str) -> Self {
        self.practitioners
            .push((id.to_string(), keycloak_uuid.to_string()));
        self
    }

    pub fn failing_practitioners(mut self) -> Self {
        self.failing_practitioners = true;
        self
    }

    /// Existing groups of `id`, one `active` flag each.
    pub fn with_groups(mut self, id: &str, active: &[bool]) -> Self {
        self.groups.insert(id.to_string(), active.to_vec());
        self
    }

    pub fn failing_groups(mut self, id: &str) -> Self {
        self.failing_groups.insert(id.to_string());
        self
    }

    pub fn with_detail(mut self, keycloak_uuid: &str, care_team: &str, location: &str, team: &str) -> Self {
        self.details.insert(
            keycloak_uuid.to_string(),
            Some((care_team.to_string(), location.to_string(), team.to_string())),
        );
        self
    }

    pub fn with_incomplete_detail(mut self, keycloak_uuid: &str) -> Self {
        self.details.insert(keycloak_uuid.to_string(), None);
        self
    }

    fn practitioner_entries(&self) -> Vec<Value> {
        self.practitioners
            .iter()
            .map(|(id, keycloak_uuid)| {
                json!({"resource": {
                    "resourceType": "Practitioner",
                    "id": id,
                    "identifier": [{"use": "secondary", "value": keycloak_uuid}]
                }})
            })
            .collect()
    }

    fn group_entries(&self, id: &str) -> Vec<Value> {
        self.groups
            .get(id)
            .map(|flags| {
                flags
                    .iter()
                    .map(|active| json!({"resource": {"resourceType": "Group", "active": active}}))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn detail_entries(&self, keycloak_uuid: &str) -> Vec<Value> {
        match self.details.get(keycloak_uuid) {
            Some(Some((care_team, location, team))) => vec![json!({"resource": {
                "resourceType": "PractitionerDetail",
                "fhir": {
                    "careteams": [{"id": care_team}],
                    "locations": [{"id": location}],
                    "teams": [{"id": team}]
                }
            }})],
            Some(None) => vec![json!({"resource": {
                "resourceType": "PractitionerDetail",
                "fhir": {"careteams": [], "locations": [], "teams": []}
            }})],
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl ResourceDirectory for FakeDirectory {
    async fn query(
        &self,
        _token: &AccessToken,
        resource_type: &str,
        _id: Option<&str>,
        params: &[(String, String)],
    ) -> Result<DirectoryResponse, DirectoryError> {
        let entries = match resource_type {
            "Practitioner" if self.failing_practitioners => return Err(unavailable()),
            "Practitioner" => self.practitioner_entries(),
            "Group" => {
                let id = param(params, "managing-entity")
                    .and_then(|reference| reference.strip_prefix("Practitioner/"))
                    .unwrap_or_default();
                if self.failing_groups.contains(id) {
                    return Err(unavailable());
                }
                self.group_entries(id)
            }
            "PractitionerDetail" => {
                self.detail_entries(param(params, "keycloak-uuid").unwrap_or_default())
            }
            _ => Vec::new(),
        };
        Ok(DirectoryResponse::found(entries))
    }
}

pub struct FakeTokens {
    fail: bool,
}

impl FakeTokens {
    pub fn ok() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl TokenProvider for FakeTokens {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        if self.fail {
            return Err(AuthError::Rejected {
                status: 401,
                message: "invalid_grant".to_string(),
            });
        }
        Ok(AccessToken::new("tok"))
    }
}

#[derive(Default)]
pub struct FakePoster {
    fail: bool,
    posted: Mutex<Vec<Bundle>>,
}

impl FakePoster {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn posted(&self) -> Vec<Bundle> {
        self.posted.lock().clone()
    }
}

#[async_trait]
impl BundlePoster for FakePoster {
    async fn post(&self, _token: &AccessToken, bundle: &Bundle) -> Result<BundleAck, PostError> {
        self.posted.lock().push(bundle.clone());
        if self.fail {
            return Err(PostError::Rejected {
                status: 500,
                message: "HAPI-0550: transaction failed".to_string(),
            });
        }
        Ok(BundleAck {
            status: 200,
            response: json!({"resourceType": "Bundle", "type": "transaction-response"}),
        })
    }
}
