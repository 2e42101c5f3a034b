//! Mock token acquirer for testing
//!
//! Hands out a fixed token (or a fixed error) without touching the network
//! and counts how often it was asked.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::acquire::{Credentials, TokenAcquirer, TokenMaterial};
use crate::config::GrantMode;
use crate::error::{AuthError, Result};

/// Mock acquirer.
///
/// # Example
/// ```ignore
/// let mock = MockAcquirer::new(GrantMode::ServiceCredential).with_token(&token);
/// let material = mock.acquire(&Credentials::Service).await?;
/// assert_eq!(mock.calls().await, 1);
/// ```
pub struct MockAcquirer {
    mode: GrantMode,
    token: Arc<Mutex<Option<String>>>,
    error: Arc<Mutex<Option<AuthError>>>,
    calls: Arc<Mutex<usize>>,
    last_credentials: Arc<Mutex<Option<Credentials>>>,
}

impl MockAcquirer {
    pub fn new(mode: GrantMode) -> Self {
        Self {
            mode,
            token: Arc::new(Mutex::new(None)),
            error: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(0)),
            last_credentials: Arc::new(Mutex::new(None)),
        }
    }

    /// Token to return from every `acquire`
    pub fn with_token(mut self, raw_token: &str) -> Self {
        self.token = Arc::new(Mutex::new(Some(raw_token.to_string())));
        self
    }

    /// Error to return from every `acquire` (takes precedence over the token)
    pub fn with_error(mut self, error: AuthError) -> Self {
        self.error = Arc::new(Mutex::new(Some(error)));
        self
    }

    pub async fn calls(&self) -> usize {
        *self.calls.lock().await
    }

    pub async fn last_credentials(&self) -> Option<Credentials> {
        self.last_credentials.lock().await.clone()
    }
}

#[async_trait]
impl TokenAcquirer for MockAcquirer {
    async fn acquire(&self, credentials: &Credentials) -> Result<TokenMaterial> {
        *self.calls.lock().await += 1;
        *self.last_credentials.lock().await = Some(credentials.clone());

        if let Some(err) = self.error.lock().await.as_ref() {
            return Err(match err {
                AuthError::Authentication(msg) => AuthError::Authentication(msg.clone()),
                other => AuthError::Transport(other.to_string()),
            }
            .into());
        }

        match self.token.lock().await.clone() {
            Some(access_token) => Ok(TokenMaterial {
                access_token,
                expires_in: Some(300),
                refresh_token: None,
                token_type: Some("Bearer".to_string()),
            }),
            None => Err(AuthError::Authentication("no token configured".to_string()).into()),
        }
    }

    fn grant_mode(&self) -> GrantMode {
        self.mode
    }
}
