use crate::error::AuthError;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use typed_builder::TypedBuilder;

/// A bearer token for the resource server.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[async_trait]
pub trait TokenProvider: Send + Sync + 'static {
    /// Obtains a token valid for the rest of the cycle.
    async fn access_token(&self) -> Result<AccessToken, AuthError>;
}

/// Hands out a fixed, pre-issued token.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: AccessToken,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(token),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        Ok(self.token.clone())
    }
}

#[derive(Clone, TypedBuilder)]
pub struct KeycloakConfig {
    #[builder(setter(into))]
    base_url: String,
    #[builder(setter(into))]
    realm: String,
    #[builder(setter(into))]
    client_id: String,
    #[builder(default, setter(strip_option, into))]
    client_secret: Option<String>,
    #[builder(setter(into))]
    username: String,
    #[builder(setter(into))]
    password: String,
    /// Keycloak before 17 serves realms under `/auth`.
    #[builder(default = false)]
    legacy_paths: bool,
    #[builder(default = Duration::from_secs(30))]
    timeout: Duration,
}

impl fmt::Debug for KeycloakConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeycloakConfig")
            .field("base_url", &self.base_url)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("legacy_paths", &self.legacy_paths)
            .finish_non_exhaustive()
    }
}

impl KeycloakConfig {
    pub fn token_endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let prefix = if self.legacy_paths { "/auth" } else { "" };
        format!(
            "{base}{prefix}/realms/{}/protocol/openid-connect/token",
            self.realm
        )
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Resource-owner password grant against a Keycloak realm.
///
/// A new token is requested on every call; the issuer asks once per cycle.
#[derive(Debug, Clone)]
pub struct KeycloakTokenProvider {
    http: reqwest::Client,
    config: KeycloakConfig,
}

impl KeycloakTokenProvider {
    pub fn new(config: KeycloakConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl TokenProvider for KeycloakTokenProvider {
    async fn access_token(&self) -> Result<AccessToken, AuthError> {
        let endpoint = self.config.token_endpoint();

        let mut params = vec![
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_str()),
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        tracing::debug!(%endpoint, realm = %self.config.realm, "requesting access token");

        let response = self
            .http
            .post(&endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<OAuthErrorResponse>(&body) {
                Ok(oauth) => match oauth.error_description {
                    Some(description) => format!("{}: {description}", oauth.error),
                    None => oauth.error,
                },
                Err(_) => body,
            };
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        Ok(AccessToken::new(token.access_token))
    }
}
