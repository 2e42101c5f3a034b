//! Error types for the clinic session manager

use thiserror::Error;

/// Result type alias for clinic operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Interactive prompt error: {0}")]
    Dialoguer(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No active session. Run `clinic login` to sign in.")]
    SessionRequired,

    #[error("Request failed with status {status}: {message}")]
    Request { status: u16, message: String },

    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("Operation failed: {0}")]
    Other(String),
}

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        Error::Dialoguer(err.to_string())
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        Error::Auth(AuthError::Decode(err))
    }
}

/// Authentication and authorization errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credential exchange with the identity provider failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Valid session, but the role is not allowed for the view
    #[error("Not authorized: role `{role}` is not one of [{required}]")]
    AuthorizationDenied { role: String, required: String },

    /// Network or backend failure unrelated to authentication
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AuthError::Transport("Request timed out".to_string())
        } else if err.is_connect() {
            AuthError::Transport("Failed to connect to server".to_string())
        } else {
            AuthError::Transport(err.to_string())
        }
    }
}

/// Structurally invalid bearer token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Malformed token: expected 3 segments, found {0}")]
    Segments(usize),

    #[error("Malformed token: payload is not base64url ({0})")]
    Base64(String),

    #[error("Malformed token: payload is not a JSON object ({0})")]
    Json(String),

    #[error("Malformed token: missing `{0}` claim")]
    MissingClaim(&'static str),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Missing required setting {0}. Set it in the environment or the config file.")]
    Missing(&'static str),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Session store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Could not determine the local data directory")]
    NoHome,

    #[error("Session store I/O error: {0}")]
    Io(String),

    #[error("Session store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Session store lock poisoned")]
    Poisoned,
}
