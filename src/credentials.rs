use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::CredentialSettings;
use crate::error::UpdateError;

const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";
const MANAGEMENT_RESOURCE: &str = "https://management.azure.com/";
const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2019-08-01";

/// Bearer token for the management API. Wrapped so the raw value never
/// shows up in Debug output or logs.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

#[async_trait]
pub trait CredentialProvider {
    /// Acquire a fresh token. Called once per invocation, nothing is cached
    /// across requests.
    async fn acquire(&self) -> Result<AccessToken, UpdateError>;

    /// Strategy name, for logging.
    fn strategy(&self) -> &'static str;
}

/// Capability switch: a configured client secret selects the secret flow,
/// its absence selects managed identity. Exactly one strategy is chosen per
/// process, never both attempted.
pub fn from_settings(settings: &CredentialSettings) -> Arc<dyn CredentialProvider + Send + Sync> {
    match settings {
        CredentialSettings::ClientSecret {
            tenant_id,
            client_id,
            secret,
        } => Arc::new(ClientSecretCredential::new(tenant_id, client_id, secret)),
        CredentialSettings::ManagedIdentity { client_id } => {
            Arc::new(ManagedIdentityCredential::new(client_id.clone()))
        }
    }
}

/// OAuth2 client-credentials grant against the Entra ID token endpoint.
pub struct ClientSecretCredential {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    authority: String,
    client: reqwest::Client,
}

impl ClientSecretCredential {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self::with_authority(tenant_id, client_id, client_secret, DEFAULT_AUTHORITY)
    }

    pub fn with_authority(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        authority: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authority: authority.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CredentialProvider for ClientSecretCredential {
    async fn acquire(&self) -> Result<AccessToken, UpdateError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", &self.client_secret)
            .append_pair("scope", MANAGEMENT_SCOPE)
            .finish();

        let response = self
            .client
            .post(format!(
                "{}/{}/oauth2/v2.0/token",
                self.authority, self.tenant_id
            ))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await
            .map_err(|e| UpdateError::transport(format!("token request: {e}")))?;

        if !response.status().is_success() {
            return Err(UpdateError::credential(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| UpdateError::credential(format!("parsing token response: {e}")))?;

        Ok(AccessToken::new(token.access_token))
    }

    fn strategy(&self) -> &'static str {
        "client-secret"
    }
}

/// Platform-issued identity, fetched from the instance metadata service.
/// With a client id it selects a user-assigned identity, without one the
/// ambient system identity.
pub struct ManagedIdentityCredential {
    client_id: Option<String>,
    endpoint: String,
    client: reqwest::Client,
}

impl ManagedIdentityCredential {
    pub fn new(client_id: Option<String>) -> Self {
        Self::with_endpoint(client_id, DEFAULT_IMDS_ENDPOINT)
    }

    pub fn with_endpoint(client_id: Option<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client_id,
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CredentialProvider for ManagedIdentityCredential {
    async fn acquire(&self) -> Result<AccessToken, UpdateError> {
        let mut request = self
            .client
            .get(&self.endpoint)
            .header("Metadata", "true")
            .query(&[
                ("api-version", IMDS_API_VERSION),
                ("resource", MANAGEMENT_RESOURCE),
            ]);
        if let Some(client_id) = &self.client_id {
            request = request.query(&[("client_id", client_id.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpdateError::transport(format!("identity endpoint request: {e}")))?;

        if !response.status().is_success() {
            return Err(UpdateError::credential(format!(
                "identity endpoint returned {}",
                response.status()
            )));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| UpdateError::credential(format!("parsing identity response: {e}")))?;

        Ok(AccessToken::new(token.access_token))
    }

    fn strategy(&self) -> &'static str {
        "managed-identity"
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}
