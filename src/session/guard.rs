//! Route guard: decides whether a view renders or redirects

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::SessionManager;
use super::decode::Role;
use crate::config::ViewPaths;
use crate::error::AuthError;

/// Authentication state as seen by the guard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GuardState {
    /// Initial load has not finished
    Unknown,
    Anonymous,
    Authenticated { role: Option<Role> },
}

impl GuardState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, GuardState::Authenticated { .. })
    }
}

/// Outcome of a guard check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "target", rename_all = "snake_case")]
pub enum Decision {
    /// Still loading; render a placeholder and decide later
    Loading,
    /// Navigate elsewhere (login or unauthorized view)
    Redirect(String),
    /// Render the protected content
    Render,
}

/// Check `required` roles against an authorization state.
///
/// Returns `AuthorizationDenied` for a signed-in user whose role is missing
/// or not listed. An empty `required` set admits any signed-in user.
pub fn authorize(state: &GuardState, required: &[String]) -> Result<(), AuthError> {
    match state {
        GuardState::Authenticated { role } if !required.is_empty() => match role {
            Some(role) if role.is_any_of(required) => Ok(()),
            _ => Err(AuthError::AuthorizationDenied {
                role: role
                    .as_ref()
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "<none>".to_string()),
                required: required.join(", "),
            }),
        },
        _ => Ok(()),
    }
}

/// Pure navigation decision for a state and required role set
pub fn decide(state: &GuardState, required: &[String], views: &ViewPaths) -> Decision {
    match state {
        GuardState::Unknown => Decision::Loading,
        GuardState::Anonymous => Decision::Redirect(views.login.clone()),
        GuardState::Authenticated { .. } => match authorize(state, required) {
            Ok(()) => Decision::Render,
            Err(err) => {
                log::debug!("{}", err);
                Decision::Redirect(views.unauthorized.clone())
            }
        },
    }
}

/// Table of protected views and the roles they require
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: BTreeMap<String, Vec<String>>,
}

impl RouteTable {
    pub fn new(routes: BTreeMap<String, Vec<String>>) -> Self {
        let routes = routes
            .into_iter()
            .map(|(path, roles)| (normalize(&path), roles))
            .collect();
        Self { routes }
    }

    /// Required roles for `path`, or `None` if the view is public.
    ///
    /// Falls back to the longest registered ancestor, so `/pages/doctor/edit/12`
    /// inherits from `/pages/doctor/edit`.
    pub fn required_roles(&self, path: &str) -> Option<&[String]> {
        let mut current = normalize(path);
        loop {
            if let Some(roles) = self.routes.get(&current) {
                return Some(roles);
            }
            match current.rfind('/') {
                Some(0) | None => return None,
                Some(idx) => current.truncate(idx),
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.routes.iter()
    }
}

fn normalize(path: &str) -> String {
    let without_query = path.trim().split(['?', '#']).next().unwrap_or_default();
    let path = without_query.trim_end_matches('/');
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Gates views on the current session
pub struct RouteGuard {
    session: Arc<SessionManager>,
    views: ViewPaths,
    routes: RouteTable,
}

impl RouteGuard {
    pub fn new(session: Arc<SessionManager>, views: ViewPaths, routes: RouteTable) -> Self {
        Self {
            session,
            views,
            routes,
        }
    }

    pub fn views(&self) -> &ViewPaths {
        &self.views
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Decide for a protected view requiring one of `required` roles.
    ///
    /// Expiry is re-evaluated here, so an expired session redirects to login.
    pub async fn check(&self, required: &[String]) -> Decision {
        let state = self.session.guard_state().await;
        decide(&state, required, &self.views)
    }

    /// Decide for a view path using the route table; public views always render
    pub async fn check_path(&self, path: &str) -> Decision {
        match self.routes.required_roles(path) {
            Some(required) => self.check(required).await,
            None => Decision::Render,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GrantMode, SessionPolicy, default_routes};
    use crate::session::fixtures::{CLIENT_ID, token_expiring_in};
    use crate::session::store::{MemoryTokenStore, TOKEN_KEY};
    use std::time::Duration;

    fn roles(r: &[&str]) -> Vec<String> {
        r.iter().map(|s| s.to_string()).collect()
    }

    fn authenticated(role: &str) -> GuardState {
        GuardState::Authenticated {
            role: Some(Role::new(role)),
        }
    }

    async fn guard_with(store: MemoryTokenStore) -> (RouteGuard, Arc<SessionManager>) {
        let policy = SessionPolicy::for_client(CLIENT_ID, GrantMode::Interactive);
        let session = Arc::new(SessionManager::new(Arc::new(store), policy));
        session.initialize().await;
        let guard = RouteGuard::new(
            session.clone(),
            ViewPaths::default(),
            RouteTable::new(default_routes()),
        );
        (guard, session)
    }

    #[test]
    fn test_decide_unknown_is_loading() {
        let views = ViewPaths::default();
        assert_eq!(
            decide(&GuardState::Unknown, &roles(&["ADMIN"]), &views),
            Decision::Loading
        );
    }

    #[test]
    fn test_decide_anonymous_redirects_to_login() {
        let views = ViewPaths::default();
        assert_eq!(
            decide(&GuardState::Anonymous, &[], &views),
            Decision::Redirect("/auth/login".to_string())
        );
    }

    #[test]
    fn test_decide_role_not_allowed() {
        let views = ViewPaths::default();
        assert_eq!(
            decide(&authenticated("PATIENT"), &roles(&["ADMIN"]), &views),
            Decision::Redirect("/auth/unauthorized".to_string())
        );
    }

    #[test]
    fn test_decide_role_allowed_and_empty_set() {
        let views = ViewPaths::default();
        let state = authenticated("PATIENT");

        assert_eq!(
            decide(&state, &roles(&["ADMIN", "PATIENT"]), &views),
            Decision::Render
        );
        assert_eq!(decide(&state, &[], &views), Decision::Render);
    }

    #[test]
    fn test_decide_missing_role_denied_for_restricted_view() {
        let views = ViewPaths::default();
        let state = GuardState::Authenticated { role: None };

        assert_eq!(
            decide(&state, &roles(&["ADMIN"]), &views),
            Decision::Redirect("/auth/unauthorized".to_string())
        );
        assert_eq!(decide(&state, &[], &views), Decision::Render);
    }

    #[test]
    fn test_authorize_reports_denied() {
        let err = authorize(&authenticated("PATIENT"), &roles(&["ADMIN", "DOCTOR"])).unwrap_err();

        match err {
            AuthError::AuthorizationDenied { role, required } => {
                assert_eq!(role, "PATIENT");
                assert_eq!(required, "ADMIN, DOCTOR");
            }
            other => panic!("Expected AuthorizationDenied, got {:?}", other),
        }
    }

    #[test]
    fn test_route_table_prefix_lookup() {
        let table = RouteTable::new(default_routes());

        assert_eq!(
            table.required_roles("/pages/doctor/edit/12"),
            Some(roles(&["ADMIN"]).as_slice())
        );
        assert_eq!(
            table.required_roles("/pages/doctor/"),
            Some(roles(&["ADMIN", "PATIENT"]).as_slice())
        );
        assert_eq!(
            table.required_roles("pages/dashboard?tab=today"),
            Some(&[][..])
        );
        assert_eq!(table.required_roles("/auth/login"), None);
        assert_eq!(table.required_roles("/"), None);
    }

    #[tokio::test]
    async fn test_no_persisted_token_redirects_to_login() {
        let (guard, session) = guard_with(MemoryTokenStore::default()).await;

        assert_eq!(session.guard_state().await, GuardState::Anonymous);
        assert_eq!(
            guard.check_path("/pages/doctor").await,
            Decision::Redirect("/auth/login".to_string())
        );
    }

    #[tokio::test]
    async fn test_check_before_initialize_is_loading() {
        let policy = SessionPolicy::for_client(CLIENT_ID, GrantMode::Interactive);
        let store = MemoryTokenStore::with_session(&token_expiring_in(3600, &["ADMIN"]), None);
        let session = Arc::new(SessionManager::new(Arc::new(store), policy));
        let guard = RouteGuard::new(
            session.clone(),
            ViewPaths::default(),
            RouteTable::new(default_routes()),
        );

        assert_eq!(guard.check(&roles(&["ADMIN"])).await, Decision::Loading);

        session.initialize().await;
        assert_eq!(guard.check(&roles(&["ADMIN"])).await, Decision::Render);
    }

    #[tokio::test]
    async fn test_expired_token_redirects_to_login() {
        let token = token_expiring_in(-10, &["ADMIN"]);
        let (guard, session) =
            guard_with(MemoryTokenStore::with_session(&token, Some("ADMIN"))).await;

        assert_eq!(session.guard_state().await, GuardState::Anonymous);
        assert_eq!(
            guard.check(&roles(&["ADMIN"])).await,
            Decision::Redirect("/auth/login".to_string())
        );
    }

    #[tokio::test]
    async fn test_session_expiring_mid_process_redirects_to_login() {
        let store = Arc::new(MemoryTokenStore::default());
        let policy = SessionPolicy::for_client(CLIENT_ID, GrantMode::Interactive);
        let session = Arc::new(SessionManager::new(store.clone(), policy));
        session.initialize().await;
        let guard = RouteGuard::new(
            session.clone(),
            ViewPaths::default(),
            RouteTable::new(default_routes()),
        );
        session.adopt(&token_expiring_in(1, &["ADMIN"])).await.unwrap();
        let mut events = session.subscribe();

        assert_eq!(guard.check(&roles(&["ADMIN"])).await, Decision::Render);

        tokio::time::sleep(Duration::from_millis(2100)).await;

        assert_eq!(
            guard.check(&roles(&["ADMIN"])).await,
            Decision::Redirect("/auth/login".to_string())
        );
        assert_eq!(*events.borrow_and_update(), GuardState::Anonymous);
        assert_eq!(store.field(TOKEN_KEY), None);
    }

    #[tokio::test]
    async fn test_check_is_idempotent() {
        let token = token_expiring_in(3600, &["PATIENT"]);
        let (guard, _session) = guard_with(MemoryTokenStore::with_session(&token, None)).await;

        let first = guard.check_path("/pages/doctor/create").await;
        let second = guard.check_path("/pages/doctor/create").await;

        assert_eq!(first, Decision::Redirect("/auth/unauthorized".to_string()));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_public_view_always_renders() {
        let (guard, _session) = guard_with(MemoryTokenStore::default()).await;
        assert_eq!(guard.check_path("/auth/register").await, Decision::Render);
    }

    #[tokio::test]
    async fn test_logout_moves_to_anonymous() {
        let token = token_expiring_in(3600, &["ADMIN"]);
        let (guard, session) = guard_with(MemoryTokenStore::with_session(&token, None)).await;
        assert_eq!(guard.check_path("/pages/doctor/edit").await, Decision::Render);

        session.logout().await.unwrap();

        assert_eq!(
            guard.check_path("/pages/doctor/edit").await,
            Decision::Redirect("/auth/login".to_string())
        );
    }
}
