use crate::bundle::Bundle;
use crate::directory::{DirectoryResponse, ResourceDirectory};
use crate::error::{DirectoryError, PostError};
use crate::poster::{BundleAck, BundlePoster};
use crate::token::AccessToken;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

const FHIR_JSON: &str = "application/fhir+json";

/// FHIR REST client for a HAPI-style server.
///
/// `base_url` is the FHIR root (`.../fhir`): searches go to
/// `{base_url}/{type}` and transaction bundles are posted to the root itself.
#[derive(Debug, Clone)]
pub struct HapiClient {
    http: reqwest::Client,
    base_url: String,
}

impl HapiClient {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn resource_url(&self, resource_type: &str, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}/{resource_type}/{id}", self.base_url),
            None => format!("{}/{resource_type}", self.base_url),
        }
    }

    fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        token: &AccessToken,
    ) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(token.secret())
            .header("Accept", FHIR_JSON)
    }
}

/// Joins the diagnostics of an `OperationOutcome` body, or returns the raw
/// body when it is not one.
fn outcome_message(body: &str) -> String {
    let diagnostics = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        if json.get("resourceType").and_then(Value::as_str) != Some("OperationOutcome") {
            return None;
        }
        let messages: Vec<String> = json
            .get("issue")?
            .as_array()?
            .iter()
            .filter_map(|issue| issue.get("diagnostics").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        (!messages.is_empty()).then(|| messages.join("; "))
    });
    diagnostics.unwrap_or_else(|| body.to_string())
}

fn parse_body(body: &str) -> Result<Value, serde_json::Error> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body)
}

#[async_trait]
impl ResourceDirectory for HapiClient {
    async fn query(
        &self,
        token: &AccessToken,
        resource_type: &str,
        id: Option<&str>,
        params: &[(String, String)],
    ) -> Result<DirectoryResponse, DirectoryError> {
        let url = self.resource_url(resource_type, id);
        tracing::debug!(%url, ?params, "querying resource server");

        let response = self
            .request(reqwest::Method::GET, &url, token)
            .query(params)
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(DirectoryResponse::not_found());
        }
        if !status.is_success() {
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                message: outcome_message(&body),
            });
        }

        let json = parse_body(&body).map_err(|e| DirectoryError::InvalidResponse(e.to_string()))?;
        let resource_type = json
            .get("resourceType")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let entries = match resource_type.as_deref() {
            Some("Bundle") => match json {
                Value::Object(mut bundle) => match bundle.remove("entry") {
                    Some(Value::Array(entries)) => entries,
                    _ => Vec::new(),
                },
                _ => Vec::new(),
            },
            Some(_) => vec![serde_json::json!({ "resource": json })],
            None => {
                return Err(DirectoryError::InvalidResponse(format!(
                    "{url} returned a body without resourceType"
                )))
            }
        };

        Ok(DirectoryResponse::found(entries))
    }
}

#[async_trait]
impl BundlePoster for HapiClient {
    async fn post(&self, token: &AccessToken, bundle: &Bundle) -> Result<BundleAck, PostError> {
        tracing::info!(bundle = %bundle.id, groups = bundle.entry.len(), "posting bundle");

        let response = self
            .request(reqwest::Method::POST, &self.base_url, token)
            .header("Content-Type", FHIR_JSON)
            .json(bundle)
            .send()
            .await
            .map_err(|e| PostError::Unreachable(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(PostError::Rejected {
                status: status.as_u16(),
                message: outcome_message(&body),
            });
        }

        let response = parse_body(&body).map_err(|e| PostError::InvalidResponse(e.to_string()))?;
        Ok(BundleAck {
            status: status.as_u16(),
            response,
        })
    }
}
