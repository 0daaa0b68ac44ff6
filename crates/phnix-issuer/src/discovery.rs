use crate::error::{CycleError, Result};
use phnix_core::{AllocationPolicy, Subject, SubjectId, SubjectMetadata};
use phnix_fhir::{AccessToken, DirectoryResponse, ResourceDirectory};
use serde_json::Value;

pub const DEFAULT_PRACTITIONER_FETCH_LIMIT: u32 = 500;

/// A practitioner listed by the resource server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Practitioner {
    pub id: SubjectId,
    /// User id in the identity provider; keys the `PractitionerDetail` lookup.
    pub keycloak_uuid: String,
}

impl Practitioner {
    /// Reads a `Practitioner` resource. The Keycloak id is the identifier
    /// marked `use: secondary`, falling back to the resource id.
    pub fn from_resource(resource: &Value) -> Option<Self> {
        let id = resource.get("id").and_then(Value::as_str)?;
        let keycloak_uuid = resource
            .get("identifier")
            .and_then(Value::as_array)
            .and_then(|identifiers| {
                identifiers.iter().find(|identifier| {
                    identifier.get("use").and_then(Value::as_str) == Some("secondary")
                })
            })
            .and_then(|identifier| identifier.get("value").and_then(Value::as_str))
            .unwrap_or(id);

        Some(Self {
            id: SubjectId::new(id).ok()?,
            keycloak_uuid: keycloak_uuid.to_string(),
        })
    }
}

/// Subjects owed batches this cycle, plus the per-subject failures met on
/// the way.
#[derive(Debug, Default)]
pub struct Discovery {
    pub subjects: Vec<Subject>,
    pub errors: Vec<CycleError>,
    /// Practitioners looked at before the per-cycle cap was reached.
    pub considered: usize,
}

/// Walks the resource server to find practitioners short of PHN groups.
pub struct SubjectDiscovery<'a> {
    directory: &'a dyn ResourceDirectory,
    token: &'a AccessToken,
    policy: AllocationPolicy,
    fetch_limit: u32,
}

impl<'a> SubjectDiscovery<'a> {
    pub fn new(
        directory: &'a dyn ResourceDirectory,
        token: &'a AccessToken,
        policy: AllocationPolicy,
        fetch_limit: u32,
    ) -> Self {
        Self {
            directory,
            token,
            policy,
            fetch_limit,
        }
    }

    /// Fails only when the practitioner list itself cannot be read; a
    /// failure on one practitioner skips that practitioner.
    pub async fn discover(&self) -> Result<Discovery> {
        let practitioners = self.practitioners().await?;
        tracing::info!(count = practitioners.len(), "fetched practitioners");

        let mut discovery = Discovery::default();
        for practitioner in practitioners {
            if !self.policy.admits(discovery.subjects.len()) {
                tracing::info!(
                    limit = self.policy.resource_process_limit(),
                    "resource process limit reached, deferring the rest"
                );
                break;
            }
            discovery.considered += 1;

            match self.subject(&practitioner).await {
                Ok(Some(subject)) => discovery.subjects.push(subject),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        subject = %practitioner.id,
                        kind = err.kind(),
                        error = %err,
                        "skipping subject"
                    );
                    discovery.errors.push(err);
                }
            }
        }

        Ok(discovery)
    }

    async fn practitioners(&self) -> Result<Vec<Practitioner>> {
        let params = [
            ("active".to_string(), "true".to_string()),
            ("_count".to_string(), self.fetch_limit.to_string()),
        ];
        let response = self.query("Practitioner", &params).await?;
        Ok(response
            .resources()
            .filter_map(Practitioner::from_resource)
            .collect())
    }

    /// Returns the subject with its owed count, or `None` when it owes
    /// nothing.
    async fn subject(&self, practitioner: &Practitioner) -> Result<Option<Subject>> {
        let active_groups = self.active_groups(&practitioner.id).await?;
        let allocation = self.policy.allocate(practitioner.id.clone(), active_groups);

        tracing::debug!(
            subject = %allocation.subject,
            active_groups = allocation.active_groups,
            owed = allocation.owed,
            "allocation computed"
        );
        if allocation.owed == 0 {
            return Ok(None);
        }

        let metadata = self.metadata(practitioner).await?;
        Ok(Some(Subject {
            id: allocation.subject,
            metadata,
            owed: allocation.owed,
        }))
    }

    async fn active_groups(&self, id: &SubjectId) -> Result<u32> {
        let params = [
            ("managing-entity".to_string(), format!("Practitioner/{id}")),
            ("type".to_string(), "device".to_string()),
        ];
        let response = self.query("Group", &params).await?;
        Ok(count_active(&response))
    }

    async fn metadata(&self, practitioner: &Practitioner) -> Result<SubjectMetadata> {
        let params = [(
            "keycloak-uuid".to_string(),
            practitioner.keycloak_uuid.clone(),
        )];
        let response = self.query("PractitionerDetail", &params).await?;
        let detail = response.resources().next();

        let first_id = |pointer: &str, missing: &'static str| -> Result<String> {
            detail
                .and_then(|resource| resource.pointer(pointer))
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| CycleError::IncompleteSubject {
                    subject: practitioner.id.clone(),
                    missing,
                })
        };

        Ok(SubjectMetadata {
            care_team_id: first_id("/fhir/careteams/0/id", "care team")?,
            location_id: first_id("/fhir/locations/0/id", "location")?,
            team_id: first_id("/fhir/teams/0/id", "team")?,
        })
    }

    async fn query(
        &self,
        resource_type: &str,
        params: &[(String, String)],
    ) -> Result<DirectoryResponse> {
        self.directory
            .query(self.token, resource_type, None, params)
            .await
            .map_err(|source| CycleError::DirectoryUnavailable {
                resource: resource_type.to_string(),
                source,
            })
    }
}

/// Groups whose `active` flag is true. The server cannot filter on it.
fn count_active(response: &DirectoryResponse) -> u32 {
    response
        .resources()
        .filter(|group| group.get("active").and_then(Value::as_bool) == Some(true))
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDirectory;
    use serde_json::json;

    fn token() -> AccessToken {
        AccessToken::new("tok")
    }

    fn policy(limit: usize) -> AllocationPolicy {
        AllocationPolicy::builder()
            .per_subject_limit(2)
            .resource_process_limit(limit)
            .build()
    }

    #[test]
    fn keycloak_uuid_comes_from_the_secondary_identifier() {
        let practitioner = Practitioner::from_resource(&json!({
            "resourceType": "Practitioner",
            "id": "p1",
            "identifier": [
                {"use": "official", "value": "emp-7"},
                {"use": "secondary", "value": "kc-1"}
            ]
        }))
        .unwrap();
        assert_eq!(practitioner.keycloak_uuid, "kc-1");

        let bare = Practitioner::from_resource(&json!({"id": "p2"})).unwrap();
        assert_eq!(bare.keycloak_uuid, "p2");
        assert!(Practitioner::from_resource(&json!({"identifier": []})).is_none());
    }

    #[tokio::test]
    async fn owed_subjects_carry_their_metadata() {
        let directory = FakeDirectory::default()
            .with_practitioner("p1", "kc-1")
            .with_groups("p1", &[true, false])
            .with_detail("kc-1", "ct-1", "loc-1", "org-1");
        let token = token();

        let discovery = SubjectDiscovery::new(&directory, &token, policy(20), 100)
            .discover()
            .await
            .unwrap();

        assert!(discovery.errors.is_empty());
        assert_eq!(discovery.subjects.len(), 1);
        let subject = &discovery.subjects[0];
        assert_eq!(subject.id.as_str(), "p1");
        assert_eq!(subject.owed, 1);
        assert_eq!(subject.metadata.care_team_id, "ct-1");
        assert_eq!(subject.metadata.location_id, "loc-1");
        assert_eq!(subject.metadata.team_id, "org-1");
    }

    #[tokio::test]
    async fn subjects_at_the_limit_are_skipped() {
        let directory = FakeDirectory::default()
            .with_practitioner("p1", "kc-1")
            .with_groups("p1", &[true, true])
            .with_detail("kc-1", "ct", "loc", "org");
        let token = token();

        let discovery = SubjectDiscovery::new(&directory, &token, policy(20), 100)
            .discover()
            .await
            .unwrap();

        assert!(discovery.subjects.is_empty());
        assert!(discovery.errors.is_empty());
        assert_eq!(discovery.considered, 1);
    }

    #[tokio::test]
    async fn per_subject_failures_do_not_stop_discovery() {
        let directory = FakeDirectory::default()
            .with_practitioner("p1", "kc-1")
            .with_practitioner("p2", "kc-2")
            .with_practitioner("p3", "kc-3")
            .failing_groups("p1")
            .with_detail("kc-2", "ct", "loc", "org")
            .with_incomplete_detail("kc-3");
        let token = token();

        let discovery = SubjectDiscovery::new(&directory, &token, policy(20), 100)
            .discover()
            .await
            .unwrap();

        assert_eq!(discovery.subjects.len(), 1);
        assert_eq!(discovery.subjects[0].id.as_str(), "p2");
        assert_eq!(discovery.subjects[0].owed, 2);

        let kinds: Vec<_> = discovery.errors.iter().map(CycleError::kind).collect();
        assert_eq!(kinds, vec!["directory_unavailable", "incomplete_subject"]);
    }

    #[tokio::test]
    async fn discovery_stops_at_the_resource_process_limit() {
        let mut directory = FakeDirectory::default();
        for i in 0..5 {
            directory = directory
                .with_practitioner(&format!("p{i}"), &format!("kc-{i}"))
                .with_detail(&format!("kc-{i}"), "ct", "loc", "org");
        }
        let token = token();

        let discovery = SubjectDiscovery::new(&directory, &token, policy(3), 100)
            .discover()
            .await
            .unwrap();

        let ids: Vec<_> = discovery.subjects.iter().map(|s| s.id.to_string()).collect();
        assert_eq!(ids, vec!["p0", "p1", "p2"]);
        assert_eq!(discovery.considered, 3);
    }

    #[tokio::test]
    async fn unreadable_practitioner_list_fails_discovery() {
        let directory = FakeDirectory::default().failing_practitioners();
        let token = token();

        let err = SubjectDiscovery::new(&directory, &token, policy(20), 100)
            .discover()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "directory_unavailable");
    }
}
