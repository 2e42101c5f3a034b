//! Authenticated backend client
//!
//! Every request goes through [`AuthenticatedClient::send`], which reads the
//! bearer token at dispatch time, acquires one first in service-credential
//! mode, and folds every outcome into an [`ApiResponse`]. A 401 clears the
//! session before the call returns.

use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use super::ApiResponse;
use super::acquire::{Credentials, TokenAcquirer};
use crate::error::{AuthError, Result};
use crate::session::SessionManager;

/// HTTP client that authenticates every request against the current session
pub struct AuthenticatedClient {
    http: HttpClient,
    base_url: String,
    session: Arc<SessionManager>,
    ambient: Option<Arc<dyn TokenAcquirer>>,
}

impl AuthenticatedClient {
    /// Create a client for `base_url`.
    ///
    /// `ambient` is the acquirer used when no token is present; pass `None`
    /// for interactive deployments, where the user must log in first.
    pub fn new(
        base_url: &str,
        session: Arc<SessionManager>,
        ambient: Option<Arc<dyn TokenAcquirer>>,
    ) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            ambient,
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResponse<T> {
        self.send::<(), T>(Method::GET, path, None).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> ApiResponse<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> ApiResponse<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> ApiResponse<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResponse<T> {
        self.send::<(), T>(Method::DELETE, path, None).await
    }

    /// Send a request and normalize the outcome; never fails
    pub async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> ApiResponse<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let (token, generation) = self.bearer_token().await;

        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = self.http.request(method.clone(), &url);
        if let Some(ref token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        log::debug!(
            "{} {} ({})",
            method,
            url,
            if token.is_some() { "authenticated" } else { "anonymous" }
        );

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                let err = AuthError::from(err);
                log::warn!("{} {} failed: {}", method, url, err);
                let text = match err {
                    AuthError::Transport(msg) => msg,
                    other => other.to_string(),
                };
                return ApiResponse::failure(
                    StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                    non_empty(text).unwrap_or_else(|| default_failure_text(&method).to_string()),
                );
            }
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            log::info!("{} {} was rejected with 401", method, url);
            self.session.handle_unauthorized(generation).await;
            return ApiResponse::unauthorized();
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                return ApiResponse::failure(
                    status.as_u16(),
                    non_empty(AuthError::from(err).to_string())
                        .unwrap_or_else(|| default_failure_text(&method).to_string()),
                );
            }
        };

        if !status.is_success() {
            return ApiResponse::failure(status.as_u16(), error_text(status, &bytes));
        }

        let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &bytes
        };
        match serde_json::from_slice::<T>(body) {
            Ok(data) => ApiResponse::success(data, status.as_u16(), reason(status)),
            Err(err) => ApiResponse::failure(
                StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                format!("Failed to parse response: {}", err),
            ),
        }
    }

    /// Token for this dispatch and the session generation it was sent under,
    /// acquiring one first in service-credential mode.
    ///
    /// Acquisition failures are logged and the request goes out anonymous.
    async fn bearer_token(&self) -> (Option<String>, u64) {
        let (token, generation) = self.session.token_with_generation().await;
        if token.is_some() {
            return (token, generation);
        }
        let Some(acquirer) = self.ambient.as_ref() else {
            return (None, generation);
        };

        let material = match acquirer.acquire(&Credentials::Service).await {
            Ok(material) => material,
            Err(err) => {
                log::warn!("Service token acquisition failed: {}", err);
                return (None, generation);
            }
        };

        match self
            .session
            .adopt_if_current(generation, &material.access_token)
            .await
        {
            // re-read: either our token or whatever replaced the session meanwhile
            Ok(_) => self.session.token_with_generation().await,
            Err(err) => {
                log::warn!("Discarding service token: {}", err);
                (None, generation)
            }
        }
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() { None } else { Some(text) }
}

fn reason(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("").to_string()
}

/// Backend `message` field, falling back to a generic status description
fn error_text(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .and_then(non_empty)
        .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()))
}

fn default_failure_text(method: &Method) -> &'static str {
    match *method {
        Method::POST => "Error sending data",
        Method::PUT => "Error updating data",
        Method::PATCH => "Error modifying data",
        Method::DELETE => "Error deleting data",
        _ => "Error fetching data",
    }
}
