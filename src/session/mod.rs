//! Session manager
//!
//! Owns the process-wide session state: the current bearer token and its
//! decoded claims. The state is written only by token adoption (login or
//! ambient acquisition), by a rejected request, and by logout. Everything
//! else reads it.
//!
//! Writers that suspend before committing (a token exchange) capture the
//! state [`generation`](SessionManager::generation) first and commit with
//! [`adopt_if_current`](SessionManager::adopt_if_current), so a logout that
//! lands in between is never overwritten by a stale token.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::{RwLock, watch};

pub mod decode;
#[cfg(test)]
pub mod fixtures;
pub mod guard;
pub mod store;

pub use decode::{Claims, Role, TokenDecoder};
pub use guard::{Decision, GuardState, RouteGuard, RouteTable, authorize};
pub use store::{SqliteTokenStore, StoredSession, TokenStore};

use crate::config::SessionPolicy;
use crate::error::{AuthError, Result};

/// A bearer token adopted as the current session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionToken {
    #[serde(skip_serializing)]
    pub raw_token: String,
    pub claims: Claims,
}

impl SessionToken {
    pub fn issued_at(&self) -> Option<i64> {
        self.claims.iat
    }

    pub fn expires_at(&self) -> i64 {
        self.claims.exp
    }

    pub fn role(&self) -> Option<&Role> {
        self.claims.role.as_ref()
    }

    pub fn organization_id(&self) -> Option<i64> {
        self.claims.organization_id
    }

    /// Short, non-reversible identifier safe to print or log
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.raw_token)
    }
}

/// First 12 hex chars of the token's SHA-256
pub fn fingerprint(raw_token: &str) -> String {
    let digest = Sha256::digest(raw_token.as_bytes());
    format!("{:x}", digest)[..12].to_string()
}

/// Mutable session state
#[derive(Debug, Clone)]
struct SessionState {
    current: Option<SessionToken>,
    loading: bool,
    generation: u64,
}

impl SessionState {
    fn guard_state(&self) -> GuardState {
        if self.loading {
            return GuardState::Unknown;
        }
        match &self.current {
            Some(token) => GuardState::Authenticated {
                role: token.role().cloned(),
            },
            None => GuardState::Anonymous,
        }
    }
}

/// Process-wide session manager
pub struct SessionManager {
    store: Arc<dyn TokenStore>,
    decoder: TokenDecoder,
    policy: SessionPolicy,
    state: RwLock<SessionState>,
    events: watch::Sender<GuardState>,
}

impl SessionManager {
    /// Create a manager in the loading state; call [`initialize`](Self::initialize) next
    pub fn new(store: Arc<dyn TokenStore>, policy: SessionPolicy) -> Self {
        let (events, _) = watch::channel(GuardState::Unknown);
        Self {
            store,
            decoder: TokenDecoder::new(&policy),
            policy,
            state: RwLock::new(SessionState {
                current: None,
                loading: true,
                generation: 0,
            }),
            events,
        }
    }

    /// Subscribe to guard state changes (the redirect signal)
    #[allow(dead_code)]
    pub fn subscribe(&self) -> watch::Receiver<GuardState> {
        self.events.subscribe()
    }

    /// Initial load from the store.
    ///
    /// Missing, malformed or expired tokens all resolve to anonymous; none of
    /// them is an error for the caller.
    pub async fn initialize(&self) -> GuardState {
        let mut state = self.state.write().await;

        match self.store.load() {
            Ok(Some(stored)) => match self.decoder.decode(&stored.raw_token) {
                Ok(claims) if claims.is_expired() => {
                    log::info!(
                        "Persisted token {} expired at {}",
                        fingerprint(&stored.raw_token),
                        claims.exp
                    );
                    if self.policy.purge_expired_tokens {
                        self.clear_store();
                    }
                }
                Ok(claims) => {
                    let token = SessionToken {
                        raw_token: stored.raw_token,
                        claims,
                    };
                    let role = token.role().map(|r| r.to_string());
                    if role != stored.role {
                        self.persist(&token);
                    }
                    log::debug!("Restored session {}", token.fingerprint());
                    state.current = Some(token);
                }
                Err(err) => {
                    log::warn!("Discarding persisted token: {}", err);
                    self.clear_store();
                }
            },
            Ok(None) => log::debug!("No persisted session"),
            Err(err) => log::warn!("Failed to read session store: {}", err),
        }

        state.loading = false;
        state.generation += 1;
        self.publish(&state)
    }

    /// Whether the initial load is still pending
    #[allow(dead_code)]
    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// Current mutation counter
    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    /// Guard state with expiry re-evaluated now
    pub async fn guard_state(&self) -> GuardState {
        let mut state = self.state.write().await;
        self.expire_if_needed(&mut state);
        state.guard_state()
    }

    /// Current session, if one is valid at this moment
    pub async fn current(&self) -> Option<SessionToken> {
        let mut state = self.state.write().await;
        self.expire_if_needed(&mut state);
        state.current.clone()
    }

    /// Raw bearer token to send right now, read at call time
    pub async fn current_token(&self) -> Option<String> {
        self.current().await.map(|t| t.raw_token)
    }

    /// Raw bearer token together with the generation it belongs to.
    ///
    /// Both are read under one lock, so the generation identifies exactly the
    /// session the token was taken from.
    pub async fn token_with_generation(&self) -> (Option<String>, u64) {
        let mut state = self.state.write().await;
        self.expire_if_needed(&mut state);
        (
            state.current.as_ref().map(|t| t.raw_token.clone()),
            state.generation,
        )
    }

    /// Decode, validate and persist `raw_token` as the current session.
    ///
    /// An expired token is rejected and never becomes current.
    pub async fn adopt(&self, raw_token: &str) -> Result<SessionToken> {
        let token = self.validate(raw_token)?;
        let mut state = self.state.write().await;
        self.commit(&mut state, token)
    }

    /// Like [`adopt`](Self::adopt), but only if no other write happened since
    /// `generation` was read. Returns `Ok(None)` for a stale write.
    pub async fn adopt_if_current(
        &self,
        generation: u64,
        raw_token: &str,
    ) -> Result<Option<SessionToken>> {
        let token = self.validate(raw_token)?;
        let mut state = self.state.write().await;
        if state.generation != generation {
            log::debug!(
                "Discarding token {} acquired at generation {} (now {})",
                token.fingerprint(),
                generation,
                state.generation
            );
            return Ok(None);
        }
        self.commit(&mut state, token).map(Some)
    }

    /// Explicit logout: clear persisted and in-memory state
    pub async fn logout(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let cleared = self.store.clear();
        state.current = None;
        state.loading = false;
        state.generation += 1;
        self.publish(&state);
        cleared?;
        log::info!("Signed out");
        Ok(())
    }

    /// React to a 401 for a request sent at `generation`.
    ///
    /// Clears the derived role (and the raw token when the policy says so),
    /// drops the in-memory session and signals anonymous to subscribers. If
    /// the session changed after the request went out (logout, new login),
    /// the rejection belongs to a session that no longer exists and nothing
    /// is touched. Returns whether the session was cleared.
    pub async fn handle_unauthorized(&self, generation: u64) -> bool {
        let mut state = self.state.write().await;
        if state.generation != generation {
            log::debug!(
                "Ignoring 401 for generation {} (now {})",
                generation,
                state.generation
            );
            return false;
        }

        let cleared = if self.policy.clear_token_on_auth_failure {
            self.store.clear()
        } else {
            self.store.clear_role()
        };
        if let Err(err) = cleared {
            log::warn!("Failed to clear session store after 401: {}", err);
        }

        if let Some(token) = state.current.take() {
            log::info!("Session {} rejected by backend", token.fingerprint());
        }
        state.loading = false;
        state.generation += 1;
        self.publish(&state);
        true
    }

    fn validate(&self, raw_token: &str) -> Result<SessionToken> {
        let claims = self.decoder.decode(raw_token)?;
        if claims.is_expired() {
            return Err(AuthError::Authentication(
                "identity provider issued an already expired token".to_string(),
            )
            .into());
        }
        Ok(SessionToken {
            raw_token: raw_token.to_string(),
            claims,
        })
    }

    fn commit(&self, state: &mut SessionState, token: SessionToken) -> Result<SessionToken> {
        self.store.save(&StoredSession {
            raw_token: token.raw_token.clone(),
            role: token.role().map(|r| r.to_string()),
        })?;

        log::info!(
            "Adopted session {} (role: {})",
            token.fingerprint(),
            token
                .role()
                .map(|r| r.as_str())
                .unwrap_or("<none>")
        );
        state.current = Some(token.clone());
        state.loading = false;
        state.generation += 1;
        self.publish(state);
        Ok(token)
    }

    fn expire_if_needed(&self, state: &mut SessionState) {
        let expired = state
            .current
            .as_ref()
            .is_some_and(|token| token.claims.is_expired());
        if !expired {
            return;
        }

        if let Some(token) = state.current.take() {
            log::info!("Session {} expired", token.fingerprint());
        }
        if self.policy.purge_expired_tokens {
            self.clear_store();
        }
        state.generation += 1;
        self.publish(state);
    }

    fn persist(&self, token: &SessionToken) {
        let stored = StoredSession {
            raw_token: token.raw_token.clone(),
            role: token.role().map(|r| r.to_string()),
        };
        if let Err(err) = self.store.save(&stored) {
            log::warn!("Failed to update session store: {}", err);
        }
    }

    fn clear_store(&self) {
        if let Err(err) = self.store.clear() {
            log::warn!("Failed to clear session store: {}", err);
        }
    }

    fn publish(&self, state: &SessionState) -> GuardState {
        let guard_state = state.guard_state();
        self.events.send_replace(guard_state.clone());
        guard_state
    }
}
