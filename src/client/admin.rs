//! User self-registration through the identity provider's admin API
//!
//! Registration runs outside any user session: a service token is obtained
//! with the client-credentials grant and used only for this one call. The
//! session is never touched.

use serde::{Deserialize, Serialize};

use super::acquire::{ClientCredentialsGrant, Credentials, IdentityProvider, TokenAcquirer};
use crate::error::{AuthError, Error, Result};

const GENERIC_FAILURE: &str = "Failed to register user";

/// Account to create
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
struct UserRepresentation<'a> {
    username: &'a str,
    email: &'a str,
    enabled: bool,
    credentials: [CredentialRepresentation<'a>; 1],
}

#[derive(Serialize)]
struct CredentialRepresentation<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    value: &'a str,
    temporary: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminError {
    error_message: Option<String>,
}

/// Create `user` with a permanent password credential
pub async fn register_user(provider: &IdentityProvider, user: &NewUser) -> Result<()> {
    let users_url = provider
        .config()
        .admin_users_url
        .clone()
        .ok_or_else(|| Error::Registration("CLINIC_ADMIN_USERS_URL is not configured".to_string()))?;

    let admin = ClientCredentialsGrant::new(provider.clone());
    let material = admin.acquire(&Credentials::Service).await?;

    let body = UserRepresentation {
        username: &user.username,
        email: &user.email,
        enabled: true,
        credentials: [CredentialRepresentation {
            kind: "password",
            value: &user.password,
            temporary: false,
        }],
    };

    log::debug!("Registering user {} at {}", user.username, users_url);

    let response = provider
        .http()
        .post(&users_url)
        .bearer_auth(&material.access_token)
        .json(&body)
        .send()
        .await
        .map_err(AuthError::from)?;

    let status = response.status();
    if status.is_success() {
        log::info!("Registered user {}", user.username);
        return Ok(());
    }

    let message = response
        .json::<AdminError>()
        .await
        .ok()
        .and_then(|e| e.error_message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| GENERIC_FAILURE.to_string());
    log::debug!("Admin API returned {}: {}", status, message);

    Err(Error::Registration(message))
}
