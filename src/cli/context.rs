//! Command execution context
//!
//! Wires settings, the session store, the session manager, the route guard
//! and the authenticated client together once per invocation.

use std::path::Path;
use std::sync::Arc;

use crate::cli::{GlobalOptions, OutputFormat};
use crate::client::{AuthenticatedClient, IdentityProvider, TokenAcquirer, acquirer_for};
use crate::config::{GrantMode, Settings};
use crate::error::Result;
use crate::session::{RouteGuard, RouteTable, SessionManager, SqliteTokenStore};

/// Everything a command needs, already initialized.
///
/// The session has finished its initial load by the time `new` returns, so
/// the guard never reports `Loading` to a command.
pub struct CommandContext {
    pub settings: Settings,
    pub session: Arc<SessionManager>,
    pub guard: RouteGuard,
    pub client: AuthenticatedClient,
    pub provider: IdentityProvider,
    /// Acquirer for the configured grant mode
    pub acquirer: Arc<dyn TokenAcquirer>,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Load settings, open the store and restore the persisted session.
    ///
    /// # Errors
    /// Returns error if a required setting is missing or the store cannot be
    /// opened.
    pub async fn new(opts: &GlobalOptions) -> Result<Self> {
        let settings = Settings::load(opts.config_ref())?;

        let store = match opts.store_ref() {
            Some(dir) => SqliteTokenStore::open_at(Path::new(dir))?,
            None => SqliteTokenStore::open()?,
        };
        log::debug!("Session store at {}", store.path().display());

        let session = Arc::new(SessionManager::new(
            Arc::new(store),
            settings.policy.clone(),
        ));
        session.initialize().await;

        let provider = IdentityProvider::new(settings.identity.clone())?;
        let acquirer = acquirer_for(settings.policy.grant_mode, provider.clone());

        // Only service deployments acquire on demand; users must log in
        let ambient = match settings.policy.grant_mode {
            GrantMode::ServiceCredential => Some(acquirer.clone()),
            GrantMode::Interactive => None,
        };
        let client = AuthenticatedClient::new(&settings.api_url, session.clone(), ambient)?;

        let guard = RouteGuard::new(
            session.clone(),
            settings.views.clone(),
            RouteTable::new(settings.routes.clone()),
        );

        Ok(Self {
            settings,
            session,
            guard,
            client,
            provider,
            acquirer,
            format: opts.format,
        })
    }
}
