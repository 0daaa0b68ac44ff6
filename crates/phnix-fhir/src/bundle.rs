use phnix_core::Batch;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const IDENTIFIER_SYSTEM: &str = "http://smartregister.org";
pub const CARE_TEAM_TAG_SYSTEM: &str = "https://smartregister.org/care-team-tag-id";
pub const LOCATION_TAG_SYSTEM: &str = "https://smartregister.org/location-tag-id";
pub const ORGANISATION_TAG_SYSTEM: &str = "https://smartregister.org/organisation-tag-id";
pub const PRACTITIONER_TAG_SYSTEM: &str = "https://smartregister.org/practitioner-tag-id";
pub const APP_VERSION_TAG_SYSTEM: &str = "https://smartregister.org/app-version";

pub const GROUP_NAME: &str = "Unique IDs";
pub const PHN_CHARACTERISTIC: &str = "phn";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coding {
    pub system: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    fn tag(system: &str, code: &str, display: &str) -> Self {
        Self {
            system: system.to_string(),
            code: code.to_string(),
            display: Some(display.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub tag: Vec<Coding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub system: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeableConcept {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Characteristic {
    pub code: CodeableConcept,
    pub value_codeable_concept: CodeableConcept,
    pub exclude: bool,
}

/// A FHIR `Group` of type `device` holding one batch of PHNs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub resource_type: String,
    pub id: Uuid,
    pub meta: Meta,
    pub identifier: Vec<Identifier>,
    pub active: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub actual: bool,
    pub name: String,
    pub quantity: u32,
    pub managing_entity: Reference,
    pub characteristic: Vec<Characteristic>,
}

impl Group {
    /// Shapes `batch` into a group tagged for its practitioner's assignment.
    pub fn from_batch(id: Uuid, batch: &Batch, app_version: Option<&str>) -> Self {
        let subject = &batch.subject;
        let mut tag = vec![
            Coding::tag(
                CARE_TEAM_TAG_SYSTEM,
                &subject.metadata.care_team_id,
                "Practitioner CareTeam",
            ),
            Coding::tag(
                LOCATION_TAG_SYSTEM,
                &subject.metadata.location_id,
                "Practitioner Location",
            ),
            Coding::tag(
                ORGANISATION_TAG_SYSTEM,
                &subject.metadata.team_id,
                "Practitioner Organization",
            ),
            Coding::tag(PRACTITIONER_TAG_SYSTEM, subject.id.as_str(), "Practitioner"),
        ];
        if let Some(version) = app_version {
            tag.push(Coding::tag(
                APP_VERSION_TAG_SYSTEM,
                version,
                "Application Version",
            ));
        }

        let characteristic = batch
            .identifiers
            .iter()
            .map(|phn| Characteristic {
                code: CodeableConcept {
                    text: PHN_CHARACTERISTIC.to_string(),
                },
                value_codeable_concept: CodeableConcept {
                    text: phn.to_string(),
                },
                exclude: false,
            })
            .collect();

        Self {
            resource_type: "Group".to_string(),
            id,
            meta: Meta { tag },
            identifier: vec![Identifier {
                system: IDENTIFIER_SYSTEM.to_string(),
                value: id.to_string(),
            }],
            active: true,
            kind: "device".to_string(),
            actual: true,
            name: GROUP_NAME.to_string(),
            quantity: 0,
            managing_entity: Reference {
                reference: format!("Practitioner/{}", subject.id),
            },
            characteristic,
        }
    }

    /// The PHNs carried by this group.
    pub fn phns(&self) -> impl Iterator<Item = &str> {
        self.characteristic
            .iter()
            .map(|c| c.value_codeable_concept.text.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRequest {
    pub method: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    pub full_url: String,
    pub resource: Group,
    pub request: BundleRequest,
}

impl BundleEntry {
    /// An idempotent `PUT Group/{id}` entry.
    pub fn put(bundle_base_url: &str, group: Group) -> Self {
        let base = bundle_base_url.trim_end_matches('/');
        Self {
            full_url: format!("{base}/Group/{}", group.id),
            request: BundleRequest {
                method: "PUT".to_string(),
                url: format!("Group/{}", group.id),
            },
            resource: group,
        }
    }
}

/// A FHIR `transaction` Bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub resource_type: String,
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    pub fn transaction(entry: Vec<BundleEntry>) -> Self {
        Self {
            resource_type: "Bundle".to_string(),
            id: Uuid::new_v4(),
            kind: "transaction".to_string(),
            entry,
        }
    }

    /// Builds one transaction carrying a fresh group per batch.
    pub fn from_batches(bundle_base_url: &str, batches: &[Batch], app_version: Option<&str>) -> Self {
        let entry = batches
            .iter()
            .map(|batch| {
                let group = Group::from_batch(Uuid::new_v4(), batch, app_version);
                BundleEntry::put(bundle_base_url, group)
            })
            .collect();
        Self::transaction(entry)
    }

    pub fn group_ids(&self) -> Vec<Uuid> {
        self.entry.iter().map(|entry| entry.resource.id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phnix_core::{Phn, PoiCode, Subject, SubjectId, SubjectMetadata};
    use serde_json::json;

    fn batch(subject: &str, phns: &[&str]) -> Batch {
        Batch {
            authority: PoiCode::new("3053").unwrap(),
            subject: Subject {
                id: SubjectId::new(subject).unwrap(),
                metadata: SubjectMetadata {
                    care_team_id: "ct-1".to_string(),
                    location_id: "loc-1".to_string(),
                    team_id: "org-1".to_string(),
                },
                owed: 1,
            },
            identifiers: phns.iter().map(|p| Phn::new_unchecked(*p)).collect(),
        }
    }

    #[test]
    fn group_serializes_to_fhir_shape() {
        let id = Uuid::parse_str("6f1c1e0a-3a55-4c9e-9b8f-2b8a3f6e2d11").unwrap();
        let group = Group::from_batch(id, &batch("prac-1", &["3053BCDFGHX"]), Some("1.2.0"));
        let value = serde_json::to_value(&group).unwrap();

        assert_eq!(value["resourceType"], "Group");
        assert_eq!(value["id"], id.to_string());
        assert_eq!(value["type"], "device");
        assert_eq!(value["actual"], true);
        assert_eq!(value["quantity"], 0);
        assert_eq!(value["name"], "Unique IDs");
        assert_eq!(value["managingEntity"]["reference"], "Practitioner/prac-1");
        assert_eq!(
            value["identifier"],
            json!([{"system": "http://smartregister.org", "value": id.to_string()}])
        );
        assert_eq!(
            value["characteristic"],
            json!([{
                "code": {"text": "phn"},
                "valueCodeableConcept": {"text": "3053BCDFGHX"},
                "exclude": false
            }])
        );

        let tags = value["meta"]["tag"].as_array().unwrap();
        assert_eq!(tags.len(), 5);
        assert_eq!(tags[0]["system"], CARE_TEAM_TAG_SYSTEM);
        assert_eq!(tags[0]["code"], "ct-1");
        assert_eq!(tags[2]["code"], "org-1");
        assert_eq!(tags[3]["code"], "prac-1");
        assert_eq!(tags[4]["code"], "1.2.0");
    }

    #[test]
    fn app_version_tag_is_optional() {
        let group = Group::from_batch(Uuid::new_v4(), &batch("prac-1", &[]), None);
        assert_eq!(group.meta.tag.len(), 4);
    }

    #[test]
    fn transaction_bundle_puts_every_group() {
        let batches = [
            batch("prac-1", &["3053BCDFGHX", "3053BCDFGHY"]),
            batch("prac-2", &["3053HJ7QXBK"]),
        ];
        let bundle = Bundle::from_batches("https://fhir.example/fhir/", &batches, None);
        let value = serde_json::to_value(&bundle).unwrap();

        assert_eq!(value["resourceType"], "Bundle");
        assert_eq!(value["type"], "transaction");
        assert_eq!(bundle.entry.len(), 2);

        let ids = bundle.group_ids();
        assert_ne!(ids[0], ids[1]);
        for (entry, id) in bundle.entry.iter().zip(&ids) {
            assert_eq!(entry.full_url, format!("https://fhir.example/fhir/Group/{id}"));
            assert_eq!(entry.request.method, "PUT");
            assert_eq!(entry.request.url, format!("Group/{id}"));
        }
        assert_eq!(
            bundle.entry[0].resource.phns().collect::<Vec<_>>(),
            vec!["3053BCDFGHX", "3053BCDFGHY"]
        );
    }
}
