//! Persistent session storage
//!
//! Holds the raw bearer token and its derived role between runs. The store
//! is a plain key/value table; it never decodes or validates what it keeps.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 1;

/// Key for the raw bearer token
pub const TOKEN_KEY: &str = "access_token";

/// Key for the derived role
pub const ROLE_KEY: &str = "user_role";

type Result<T> = std::result::Result<T, StoreError>;

/// Persisted session fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub raw_token: String,
    pub role: Option<String>,
}

/// Durable storage for the current session.
///
/// Shared by every process using the same data directory; last write wins.
pub trait TokenStore: Send + Sync {
    /// Read the persisted session, `None` when no token is stored
    fn load(&self) -> Result<Option<StoredSession>>;

    /// Persist the raw token and role (a `None` role removes the stored one)
    fn save(&self, session: &StoredSession) -> Result<()>;

    /// Remove every persisted session field
    fn clear(&self) -> Result<()>;

    /// Remove only the derived role, keeping the raw token
    fn clear_role(&self) -> Result<()>;
}

/// SQLite-backed token store
pub struct SqliteTokenStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteTokenStore {
    /// Open or create the store at the default data location
    pub fn open() -> Result<Self> {
        Self::open_at(&Self::data_dir()?)
    }

    /// Default data directory (~/.local/share/clinic on Linux)
    pub fn data_dir() -> Result<PathBuf> {
        let base = dirs::data_dir().ok_or(StoreError::NoHome)?;
        Ok(base.join("clinic"))
    }

    /// Open the store inside a specific directory
    pub fn open_at(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| StoreError::Io(format!("Failed to create data dir: {}", e)))?;

        let db_path = dir.join("session.db");
        let conn = Connection::open(&db_path)?;

        let version: i32 = conn
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap_or(0);

        if version != 0 && version != SCHEMA_VERSION {
            log::info!(
                "Session store schema version mismatch ({} != {}), rebuilding",
                version,
                SCHEMA_VERSION
            );
            drop(conn);
            std::fs::remove_file(&db_path)
                .map_err(|e| StoreError::Io(format!("Failed to remove session store: {}", e)))?;
            return Self::open_at(dir);
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS session_fields (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        // The token is a credential: owner-only access
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&db_path, perms)
                .map_err(|e| StoreError::Io(format!("Failed to restrict permissions: {}", e)))?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Path of the backing database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
        Ok(conn
            .query_row(
                "SELECT value FROM session_fields WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?)
    }
}

impl TokenStore for SqliteTokenStore {
    fn load(&self) -> Result<Option<StoredSession>> {
        let conn = self.lock()?;

        let raw_token = match Self::get(&conn, TOKEN_KEY)? {
            Some(token) if !token.trim().is_empty() => token,
            _ => return Ok(None),
        };
        let role = Self::get(&conn, ROLE_KEY)?.filter(|r| !r.is_empty());

        Ok(Some(StoredSession { raw_token, role }))
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        let mut conn = self.lock()?;
        let now = Utc::now().timestamp();

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO session_fields (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![TOKEN_KEY, session.raw_token, now],
        )?;
        match &session.role {
            Some(role) => {
                tx.execute(
                    "INSERT OR REPLACE INTO session_fields (key, value, updated_at) VALUES (?1, ?2, ?3)",
                    params![ROLE_KEY, role, now],
                )?;
            }
            None => {
                tx.execute("DELETE FROM session_fields WHERE key = ?1", [ROLE_KEY])?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM session_fields", [])?;
        Ok(())
    }

    fn clear_role(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM session_fields WHERE key = ?1", [ROLE_KEY])?;
        Ok(())
    }
}

/// In-memory token store for tests
#[cfg(test)]
#[derive(Default)]
pub struct MemoryTokenStore {
    fields: Mutex<std::collections::HashMap<&'static str, String>>,
}

#[cfg(test)]
impl MemoryTokenStore {
    pub fn with_session(raw_token: &str, role: Option<&str>) -> Self {
        let store = Self::default();
        store
            .save(&StoredSession {
                raw_token: raw_token.to_string(),
                role: role.map(str::to_string),
            })
            .unwrap();
        store
    }

    /// Raw field lookup, for asserting on the persisted layout
    pub fn field(&self, key: &str) -> Option<String> {
        self.fields.lock().unwrap().get(key).cloned()
    }
}

#[cfg(test)]
impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<StoredSession>> {
        let fields = self.fields.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(fields
            .get(TOKEN_KEY)
            .filter(|t| !t.trim().is_empty())
            .map(|token| StoredSession {
                raw_token: token.clone(),
                role: fields.get(ROLE_KEY).cloned(),
            }))
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        let mut fields = self.fields.lock().map_err(|_| StoreError::Poisoned)?;
        fields.insert(TOKEN_KEY, session.raw_token.clone());
        match &session.role {
            Some(role) => fields.insert(ROLE_KEY, role.clone()),
            None => fields.remove(ROLE_KEY),
        };
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.fields
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .clear();
        Ok(())
    }

    fn clear_role(&self) -> Result<()> {
        self.fields
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .remove(ROLE_KEY);
        Ok(())
    }
}
