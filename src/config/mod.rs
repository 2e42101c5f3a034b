//! Configuration management for the clinic session manager
//!
//! Settings come from an optional YAML file (`~/.clinic/config.yaml`) with
//! `CLINIC_*` environment variables layered on top. The identity provider and
//! backend locations are required; startup fails naming the missing variable.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

pub const ENV_API_URL: &str = "CLINIC_API_URL";
pub const ENV_TOKEN_URL: &str = "CLINIC_TOKEN_URL";
pub const ENV_CLIENT_ID: &str = "CLINIC_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "CLINIC_CLIENT_SECRET";
pub const ENV_GRANT_TYPE: &str = "CLINIC_GRANT_TYPE";
pub const ENV_SCOPE: &str = "CLINIC_SCOPE";
pub const ENV_ADMIN_USERS_URL: &str = "CLINIC_ADMIN_USERS_URL";

const DEFAULT_SCOPE: &str = "openid";

/// How the application obtains its bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantMode {
    /// End-user username/password exchange (`grant_type=password`)
    Interactive,
    /// Static service credentials, no end-user login (`grant_type=client_credentials`)
    ServiceCredential,
}

impl GrantMode {
    /// OAuth2 `grant_type` form value for this mode
    pub fn grant_type(&self) -> &'static str {
        match self {
            GrantMode::Interactive => "password",
            GrantMode::ServiceCredential => "client_credentials",
        }
    }

    /// Parse an OAuth2 `grant_type` value
    pub fn from_grant_type(value: &str) -> std::result::Result<Self, ConfigError> {
        match value.trim() {
            "password" => Ok(GrantMode::Interactive),
            "client_credentials" => Ok(GrantMode::ServiceCredential),
            other => Err(ConfigError::Invalid(format!(
                "unsupported grant type `{}` (expected `password` or `client_credentials`)",
                other
            ))),
        }
    }
}

/// Identity provider connection settings
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    /// Admin endpoint for creating users (registration)
    pub admin_users_url: Option<String>,
}

/// Session behaviour knobs that earlier front ends disagreed on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    pub grant_mode: GrantMode,
    /// Dotted path to the role list inside the token claims
    pub role_claim_path: String,
    /// Which entry of the role list is authoritative
    pub role_index: usize,
    /// Dotted path to the numeric organization claim
    pub organization_claim_path: String,
    /// On a 401, drop the raw token too (not just the derived role)
    pub clear_token_on_auth_failure: bool,
    /// Remove an expired token from the store when it is detected
    pub purge_expired_tokens: bool,
}

impl SessionPolicy {
    /// Policy defaults for a given client identifier
    pub fn for_client(client_id: &str, grant_mode: GrantMode) -> Self {
        Self {
            grant_mode,
            role_claim_path: format!("resource_access.{}.roles", client_id),
            role_index: 0,
            organization_claim_path: "org".to_string(),
            clear_token_on_auth_failure: true,
            purge_expired_tokens: true,
        }
    }
}

/// Well-known view paths the route guard navigates to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ViewPaths {
    #[serde(default = "default_login_path")]
    pub login: String,
    #[serde(default = "default_unauthorized_path")]
    pub unauthorized: String,
    #[serde(default = "default_home_path")]
    pub home: String,
}

fn default_login_path() -> String {
    "/auth/login".to_string()
}

fn default_unauthorized_path() -> String {
    "/auth/unauthorized".to_string()
}

fn default_home_path() -> String {
    "/pages/dashboard".to_string()
}

impl Default for ViewPaths {
    fn default() -> Self {
        Self {
            login: default_login_path(),
            unauthorized: default_unauthorized_path(),
            home: default_home_path(),
        }
    }
}

/// Protected views and the roles allowed on each.
///
/// An empty role list means "any signed-in user".
pub fn default_routes() -> BTreeMap<String, Vec<String>> {
    let roles = |r: &[&str]| r.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    BTreeMap::from([
        ("/pages/dashboard".to_string(), vec![]),
        ("/pages/doctor".to_string(), roles(&["ADMIN", "PATIENT"])),
        ("/pages/doctor/create".to_string(), roles(&["ADMIN"])),
        ("/pages/doctor/edit".to_string(), roles(&["ADMIN"])),
        ("/pages/client".to_string(), roles(&["ADMIN", "DOCTOR"])),
        ("/pages/client/create".to_string(), roles(&["ADMIN"])),
        ("/pages/client/edit".to_string(), roles(&["ADMIN", "DOCTOR"])),
        (
            "/pages/appointments".to_string(),
            roles(&["ADMIN", "DOCTOR", "PATIENT"]),
        ),
        (
            "/pages/appointments/create".to_string(),
            roles(&["ADMIN", "PATIENT"]),
        ),
        (
            "/pages/appointments/edit".to_string(),
            roles(&["ADMIN", "PATIENT"]),
        ),
    ])
}

/// Policy overrides as written in the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyFile {
    pub role_claim_path: Option<String>,
    pub role_index: Option<usize>,
    pub organization_claim_path: Option<String>,
    pub clear_token_on_auth_failure: Option<bool>,
    pub purge_expired_tokens: Option<bool>,
}

/// On-disk configuration file; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub token_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub grant_type: Option<String>,
    pub scope: Option<String>,
    pub admin_users_url: Option<String>,
    #[serde(default)]
    pub policy: PolicyFile,
    #[serde(default)]
    pub views: ViewPaths,
    pub routes: Option<BTreeMap<String, Vec<String>>>,
}

/// Fully resolved application settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Backend REST base URL, without trailing slash
    pub api_url: String,
    pub identity: IdentityConfig,
    pub policy: SessionPolicy,
    pub views: ViewPaths,
    pub routes: BTreeMap<String, Vec<String>>,
}

impl Settings {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".clinic").join("config.yaml"))
    }

    /// Load settings from the config file (if any) and the process environment.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let file = match path {
            Some(p) => {
                let path = PathBuf::from(p);
                if !path.exists() {
                    return Err(ConfigError::NotFound(p.to_string()).into());
                }
                Self::read_file(&path)?
            }
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::read_file(&path)?
                } else {
                    FileConfig::default()
                }
            }
        };

        Ok(Self::resolve(file, |key| std::env::var(key).ok())?)
    }

    fn read_file(path: &PathBuf) -> Result<FileConfig> {
        log::debug!("Reading configuration from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let file: FileConfig = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;
        Ok(file)
    }

    /// Merge a parsed config file with environment values (env wins)
    pub fn resolve<F>(file: FileConfig, env: F) -> std::result::Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |key: &'static str, from_file: Option<String>| {
            env(key)
                .filter(|v| !v.trim().is_empty())
                .or(from_file)
                .filter(|v| !v.trim().is_empty())
        };
        let require = |key: &'static str, from_file: Option<String>| {
            pick(key, from_file).ok_or(ConfigError::Missing(key))
        };

        let api_url = require(ENV_API_URL, file.api_url)?;
        let token_url = require(ENV_TOKEN_URL, file.token_url)?;
        let client_id = require(ENV_CLIENT_ID, file.client_id)?;
        let client_secret = require(ENV_CLIENT_SECRET, file.client_secret)?;
        let grant_mode = match pick(ENV_GRANT_TYPE, file.grant_type) {
            Some(grant_type) => GrantMode::from_grant_type(&grant_type)?,
            None => GrantMode::Interactive,
        };
        let scope = pick(ENV_SCOPE, file.scope).unwrap_or_else(|| DEFAULT_SCOPE.to_string());
        let admin_users_url = pick(ENV_ADMIN_USERS_URL, file.admin_users_url);

        let defaults = SessionPolicy::for_client(&client_id, grant_mode);
        let overrides = file.policy;
        let policy = SessionPolicy {
            grant_mode,
            role_claim_path: overrides
                .role_claim_path
                .unwrap_or(defaults.role_claim_path),
            role_index: overrides.role_index.unwrap_or(defaults.role_index),
            organization_claim_path: overrides
                .organization_claim_path
                .unwrap_or(defaults.organization_claim_path),
            clear_token_on_auth_failure: overrides
                .clear_token_on_auth_failure
                .unwrap_or(defaults.clear_token_on_auth_failure),
            purge_expired_tokens: overrides
                .purge_expired_tokens
                .unwrap_or(defaults.purge_expired_tokens),
        };

        if policy.role_claim_path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "policy.role_claim_path must not be empty".to_string(),
            ));
        }

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            identity: IdentityConfig {
                token_url,
                client_id,
                client_secret,
                scope,
                admin_users_url,
            },
            policy,
            views: file.views,
            routes: file.routes.unwrap_or_else(default_routes),
        })
    }
}
