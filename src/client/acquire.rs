//! Token acquisition against the identity provider's token endpoint

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{GrantMode, IdentityConfig};
use crate::error::{AuthError, Result};

const GENERIC_FAILURE: &str = "Unable to obtain an access token";

/// What the caller presents to the acquirer
#[derive(Clone)]
pub enum Credentials {
    /// End-user username and password
    Password { username: String, password: String },
    /// No end-user input; the acquirer's static client credentials are used
    Service,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Service => f.write_str("Service"),
        }
    }
}

/// Successful token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenMaterial {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    #[allow(dead_code)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Obtains bearer tokens. One attempt per call; no retries.
#[async_trait]
pub trait TokenAcquirer: Send + Sync {
    /// Exchange `credentials` for a token
    async fn acquire(&self, credentials: &Credentials) -> Result<TokenMaterial>;

    /// Which grant this acquirer performs
    fn grant_mode(&self) -> GrantMode;
}

/// OAuth2 token endpoint shared by both grants
#[derive(Clone)]
pub struct IdentityProvider {
    http: HttpClient,
    config: IdentityConfig,
}

impl IdentityProvider {
    pub fn new(config: IdentityConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Form-encoded POST to the token endpoint
    async fn exchange(&self, grant: GrantMode, extra: &[(&str, &str)]) -> Result<TokenMaterial> {
        #[derive(Deserialize)]
        struct ProviderError {
            error: Option<String>,
            error_description: Option<String>,
        }

        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", grant.grant_type()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("scope", self.config.scope.as_str()),
        ];
        form.extend_from_slice(extra);

        log::debug!(
            "Requesting token from {} (grant_type={})",
            self.config.token_url,
            grant.grant_type()
        );

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::Authentication(AuthError::from(e).to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Authentication(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            let description = serde_json::from_str::<ProviderError>(&body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| format!("{} (HTTP {})", GENERIC_FAILURE, status.as_u16()));
            log::debug!("Token endpoint returned {}: {}", status, description);
            return Err(AuthError::Authentication(description).into());
        }

        let material: TokenMaterial = serde_json::from_str(&body).map_err(|_| {
            AuthError::Authentication(format!(
                "{}: response did not contain an access token",
                GENERIC_FAILURE
            ))
        })?;

        if material.access_token.trim().is_empty() {
            return Err(AuthError::Authentication(format!(
                "{}: response contained an empty access token",
                GENERIC_FAILURE
            ))
            .into());
        }

        Ok(material)
    }
}

/// Resource-owner password grant (interactive login)
pub struct PasswordGrant {
    provider: IdentityProvider,
}

impl PasswordGrant {
    pub fn new(provider: IdentityProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl TokenAcquirer for PasswordGrant {
    async fn acquire(&self, credentials: &Credentials) -> Result<TokenMaterial> {
        match credentials {
            Credentials::Password { username, password } => {
                self.provider
                    .exchange(
                        GrantMode::Interactive,
                        &[("username", username.as_str()), ("password", password.as_str())],
                    )
                    .await
            }
            Credentials::Service => Err(AuthError::Authentication(
                "username and password are required".to_string(),
            )
            .into()),
        }
    }

    fn grant_mode(&self) -> GrantMode {
        GrantMode::Interactive
    }
}

/// Client-credentials grant (machine-to-machine)
pub struct ClientCredentialsGrant {
    provider: IdentityProvider,
}

impl ClientCredentialsGrant {
    pub fn new(provider: IdentityProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl TokenAcquirer for ClientCredentialsGrant {
    async fn acquire(&self, _credentials: &Credentials) -> Result<TokenMaterial> {
        self.provider
            .exchange(GrantMode::ServiceCredential, &[])
            .await
    }

    fn grant_mode(&self) -> GrantMode {
        GrantMode::ServiceCredential
    }
}

/// Build the acquirer for a grant mode
pub fn acquirer_for(mode: GrantMode, provider: IdentityProvider) -> Arc<dyn TokenAcquirer> {
    match mode {
        GrantMode::Interactive => Arc::new(PasswordGrant::new(provider)),
        GrantMode::ServiceCredential => Arc::new(ClientCredentialsGrant::new(provider)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn provider(url: String) -> IdentityProvider {
        IdentityProvider::new(IdentityConfig {
            token_url: format!("{}/realms/CimedRealm/protocol/openid-connect/token", url),
            client_id: "CimedClient".to_string(),
            client_secret: "s3cret".to_string(),
            scope: "openid".to_string(),
            admin_users_url: None,
        })
        .unwrap()
    }

    fn password(username: &str, password: &str) -> Credentials {
        Credentials::Password {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    const TOKEN_PATH: &str = "/realms/CimedRealm/protocol/openid-connect/token";

    #[tokio::test]
    async fn test_password_grant_posts_form() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", TOKEN_PATH)
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "password".into()),
                Matcher::UrlEncoded("client_id".into(), "CimedClient".into()),
                Matcher::UrlEncoded("client_secret".into(), "s3cret".into()),
                Matcher::UrlEncoded("scope".into(), "openid".into()),
                Matcher::UrlEncoded("username".into(), "ana".into()),
                Matcher::UrlEncoded("password".into(), "pw".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token":"a.b.c","expires_in":300,"refresh_token":"r","token_type":"Bearer"}"#,
            )
            .create_async()
            .await;

        let grant = PasswordGrant::new(provider(server.url()));
        let material = grant.acquire(&password("ana", "pw")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(material.access_token, "a.b.c");
        assert_eq!(material.expires_in, Some(300));
        assert_eq!(material.refresh_token.as_deref(), Some("r"));
    }

    #[tokio::test]
    async fn test_client_credentials_grant_posts_form() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", TOKEN_PATH)
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), "CimedClient".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"x.y.z","expires_in":60}"#)
            .create_async()
            .await;

        let grant = ClientCredentialsGrant::new(provider(server.url()));
        let material = grant.acquire(&Credentials::Service).await.unwrap();

        mock.assert_async().await;
        assert_eq!(material.access_token, "x.y.z");
        assert_eq!(material.refresh_token, None);
    }

    #[tokio::test]
    async fn test_provider_error_description_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", TOKEN_PATH)
            .with_status(401)
            .with_body(r#"{"error":"invalid_grant","error_description":"Invalid user credentials"}"#)
            .create_async()
            .await;

        let grant = PasswordGrant::new(provider(server.url()));
        let err = grant.acquire(&password("ana", "wrong")).await.unwrap_err();

        match err {
            crate::error::Error::Auth(AuthError::Authentication(msg)) => {
                assert_eq!(msg, "Invalid user credentials");
            }
            other => panic!("Expected AuthenticationError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_failure_uses_generic_message() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", TOKEN_PATH)
            .with_status(502)
            .with_body("<html>Bad Gateway</html>")
            .create_async()
            .await;

        let grant = PasswordGrant::new(provider(server.url()));
        let err = grant.acquire(&password("ana", "pw")).await.unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains(GENERIC_FAILURE));
        assert!(msg.contains("502"));
    }

    #[tokio::test]
    async fn test_missing_access_token_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", TOKEN_PATH)
            .with_status(200)
            .with_body(r#"{"expires_in":300}"#)
            .create_async()
            .await;

        let grant = ClientCredentialsGrant::new(provider(server.url()));
        let err = grant.acquire(&Credentials::Service).await.unwrap_err();

        assert!(matches!(
            err,
            crate::error::Error::Auth(AuthError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_single_attempt_on_failure() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", TOKEN_PATH)
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let grant = ClientCredentialsGrant::new(provider(server.url()));
        assert!(grant.acquire(&Credentials::Service).await.is_err());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_network_failure_is_authentication_error() {
        // nothing listens on port 9 (discard) in the test environment
        let grant = PasswordGrant::new(provider("http://127.0.0.1:9".to_string()));
        let err = grant.acquire(&password("ana", "pw")).await.unwrap_err();

        assert!(matches!(
            err,
            crate::error::Error::Auth(AuthError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_password_grant_requires_user_credentials() {
        let grant = PasswordGrant::new(provider("http://127.0.0.1:9".to_string()));
        let err = grant.acquire(&Credentials::Service).await.unwrap_err();
        assert!(err.to_string().contains("username and password"));
    }

    #[test]
    fn test_acquirer_for_mode() {
        let p = provider("http://localhost".to_string());
        assert_eq!(
            acquirer_for(GrantMode::Interactive, p.clone()).grant_mode(),
            GrantMode::Interactive
        );
        assert_eq!(
            acquirer_for(GrantMode::ServiceCredential, p).grant_mode(),
            GrantMode::ServiceCredential
        );
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let debug = format!("{:?}", password("ana", "hunter2"));
        assert!(debug.contains("ana"));
        assert!(!debug.contains("hunter2"));
    }
}
