//! Session Record persistence
//!
//! Holds the auth token, the role marker, the cached user snapshot, and the
//! login timestamp. Token presence alone defines whether a session exists;
//! role and user are caches that are only meaningful alongside a token.
//!
//! Read operations never fail the caller: a malformed stored value or a
//! broken read path degrades to "absent", because a corrupted record is
//! equivalent to no session. Write operations surface storage errors.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{instrument, warn};

use crate::error::Result;
use crate::models::{UserRecord, ADMIN_ROLE};

const KEY_TOKEN: &str = "auth.token";
const KEY_ROLE: &str = "auth.role";
const KEY_USER: &str = "auth.user";
const KEY_LOGIN_TIME: &str = "auth.login_time";

const RECORD_KEYS: &[&str] = &[KEY_TOKEN, KEY_ROLE, KEY_USER, KEY_LOGIN_TIME];

/// Keys written by builds that predate the `auth.` namespace.
/// Deleted on every write; an older build sharing the database may
/// still produce them between our writes.
const LEGACY_KEYS: &[&str] = &["token", "role", "user", "login_time"];

/// Sessions older than this are reported expired by default.
/// Advisory only; nothing clears a session based on age alone.
pub const DEFAULT_SESSION_MAX_AGE_HOURS: i64 = 24;

/// Session record store
pub struct SessionStore<'a> {
    conn: &'a Connection,
}

impl<'a> SessionStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Establish a session: token, role derived from the user snapshot,
    /// the snapshot itself, and a fresh login timestamp.
    ///
    /// The caller is responsible for handing the token to the outbound
    /// request layer before calling this, so code reacting to "session now
    /// exists" can immediately make authenticated calls.
    #[instrument(skip(self, token, user))]
    pub fn set_session(&self, token: &str, user: &UserRecord) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        self.put(KEY_TOKEN, token, &now)?;
        // role mirrors user.role; both are written together so they
        // cannot drift within a single build
        match user.role.as_deref() {
            Some(role) => self.put(KEY_ROLE, role, &now)?,
            None => self.delete(KEY_ROLE)?,
        }
        self.put(KEY_USER, &serde_json::to_string(user)?, &now)?;
        self.put(KEY_LOGIN_TIME, &now, &now)?;

        self.clear_legacy_keys()?;
        Ok(())
    }

    /// Replace the cached user snapshot without disturbing the token.
    /// The role marker follows the snapshot when the snapshot carries one.
    #[instrument(skip(self, user))]
    pub fn update_user(&self, user: &UserRecord) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        self.put(KEY_USER, &serde_json::to_string(user)?, &now)?;
        if let Some(role) = user.role.as_deref() {
            self.put(KEY_ROLE, role, &now)?;
        }
        Ok(())
    }

    /// Delete every session field. Safe to call on partial or empty state.
    #[instrument(skip(self))]
    pub fn clear(&self) -> Result<()> {
        for key in RECORD_KEYS {
            self.delete(key)?;
        }
        self.clear_legacy_keys()
    }

    /// Current bearer token, or `None` if no session is present
    pub fn token(&self) -> Option<String> {
        self.read(KEY_TOKEN)
    }

    /// Cached role marker
    pub fn role(&self) -> Option<String> {
        self.read(KEY_ROLE)
    }

    /// Cached user snapshot; a corrupt snapshot reads as absent
    pub fn user(&self) -> Option<UserRecord> {
        let raw = self.read(KEY_USER)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Stored user snapshot is unreadable, treating as absent");
                None
            }
        }
    }

    /// When the session was established
    pub fn login_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.read(KEY_LOGIN_TIME)?;
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(e) => {
                warn!(error = %e, "Stored login time is unreadable, treating as absent");
                None
            }
        }
    }

    /// Authentication is defined purely by token presence; validity is
    /// only established by the controller's verification round-trip.
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.role().as_deref() == Some(ADMIN_ROLE)
    }

    pub fn is_authenticated_admin(&self) -> bool {
        self.is_authenticated() && self.is_admin()
    }

    /// Advisory age check. No caller is forced to act on this; expiry is
    /// never enforced automatically.
    pub fn is_session_expired(&self, max_age_hours: i64) -> bool {
        match self.login_time() {
            Some(login_time) => Utc::now() - login_time > chrono::Duration::hours(max_age_hours),
            None => true,
        }
    }

    fn put(&self, key: &str, value: &str, now: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO session (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            rusqlite::params![key, value, now],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM session WHERE key = ?1", [key])?;
        Ok(())
    }

    fn clear_legacy_keys(&self) -> Result<()> {
        for key in LEGACY_KEYS {
            self.delete(key)?;
        }
        Ok(())
    }

    fn read(&self, key: &str) -> Option<String> {
        let result = self.conn.query_row(
            "SELECT value FROM session WHERE key = ?1",
            [key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Some(value),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => {
                warn!(key, error = %e, "Session read failed, treating as absent");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn admin_user() -> UserRecord {
        UserRecord {
            id: Some(1),
            username: Some("a".to_string()),
            role: Some(ADMIN_ROLE.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_set_session_admin() {
        let db = Database::open_in_memory().unwrap();
        let store = db.session();

        store.set_session("tok123", &admin_user()).unwrap();

        assert!(store.is_authenticated_admin());
        assert_eq!(store.role().as_deref(), Some("admin"));
        assert_eq!(store.token().as_deref(), Some("tok123"));
        assert!(store.login_time().is_some());
    }

    #[test]
    fn test_fresh_store_is_anonymous() {
        let db = Database::open_in_memory().unwrap();
        let store = db.session();

        assert!(!store.is_authenticated());
        assert!(store.user().is_none());
        assert!(store.token().is_none());
        assert!(store.role().is_none());
    }

    #[test]
    fn test_token_alone_defines_authentication() {
        let db = Database::open_in_memory().unwrap();
        let store = db.session();
        let now = Utc::now().to_rfc3339();

        // role and user present without a token: not a session
        store.put(KEY_ROLE, "admin", &now).unwrap();
        store
            .put(KEY_USER, r#"{"role":"admin"}"#, &now)
            .unwrap();
        assert!(!store.is_authenticated());
        assert!(!store.is_authenticated_admin());

        // token alone: a session, even without role/user
        store.clear().unwrap();
        store.put(KEY_TOKEN, "tok1", &now).unwrap();
        assert!(store.is_authenticated());
        assert!(!store.is_admin());
    }

    #[test]
    fn test_role_follows_snapshot() {
        let db = Database::open_in_memory().unwrap();
        let store = db.session();

        store.set_session("tok1", &admin_user()).unwrap();
        assert_eq!(store.role(), store.user().unwrap().role);

        let editor = UserRecord {
            role: Some("editor".to_string()),
            ..Default::default()
        };
        store.update_user(&editor).unwrap();
        assert_eq!(store.role().as_deref(), Some("editor"));
        assert_eq!(store.role(), store.user().unwrap().role);
    }

    #[test]
    fn test_update_user_keeps_token() {
        let db = Database::open_in_memory().unwrap();
        let store = db.session();

        store.set_session("tok1", &admin_user()).unwrap();
        let refreshed = UserRecord {
            id: Some(1),
            username: Some("a-renamed".to_string()),
            role: Some(ADMIN_ROLE.to_string()),
            ..Default::default()
        };
        store.update_user(&refreshed).unwrap();

        assert_eq!(store.token().as_deref(), Some("tok1"));
        assert_eq!(
            store.user().unwrap().username.as_deref(),
            Some("a-renamed")
        );
    }

    #[test]
    fn test_corrupt_user_reads_as_absent() {
        let db = Database::open_in_memory().unwrap();
        let store = db.session();

        store.set_session("tok1", &admin_user()).unwrap();

        // Corrupt the stored snapshot directly
        let now = Utc::now().to_rfc3339();
        store.put(KEY_USER, "{not json", &now).unwrap();

        assert!(store.user().is_none());
        // token untouched: still authenticated
        assert!(store.is_authenticated());
    }

    #[test]
    fn test_corrupt_login_time_reads_as_absent() {
        let db = Database::open_in_memory().unwrap();
        let store = db.session();

        store.set_session("tok1", &admin_user()).unwrap();
        let now = Utc::now().to_rfc3339();
        store.put(KEY_LOGIN_TIME, "yesterday-ish", &now).unwrap();

        assert!(store.login_time().is_none());
        assert!(store.is_session_expired(DEFAULT_SESSION_MAX_AGE_HOURS));
    }

    #[test]
    fn test_clear_is_total() {
        let db = Database::open_in_memory().unwrap();
        let store = db.session();

        let editor = UserRecord {
            role: Some("editor".to_string()),
            ..Default::default()
        };
        store.set_session("tok1", &editor).unwrap();
        store.clear().unwrap();

        assert!(store.token().is_none());
        assert!(store.user().is_none());
        assert!(store.role().is_none());
        assert!(store.login_time().is_none());
        assert!(!store.is_authenticated());
        assert!(!store.is_admin());
        assert!(!store.is_authenticated_admin());

        // clearing an already-empty record is not an error
        store.clear().unwrap();
    }

    #[test]
    fn test_session_without_role_key() {
        let db = Database::open_in_memory().unwrap();
        let store = db.session();

        let anonymous_role = UserRecord {
            id: Some(9),
            ..Default::default()
        };
        store.set_session("tok9", &anonymous_role).unwrap();

        assert!(store.is_authenticated());
        assert!(store.role().is_none());
        assert!(!store.is_authenticated_admin());
    }

    #[test]
    fn test_expiry_is_advisory() {
        let db = Database::open_in_memory().unwrap();
        let store = db.session();

        store.set_session("tok1", &admin_user()).unwrap();
        assert!(!store.is_session_expired(DEFAULT_SESSION_MAX_AGE_HOURS));

        // Backdate the login time past the window
        let old = (Utc::now() - chrono::Duration::hours(48)).to_rfc3339();
        let now = Utc::now().to_rfc3339();
        store.put(KEY_LOGIN_TIME, &old, &now).unwrap();

        assert!(store.is_session_expired(24));
        assert!(!store.is_session_expired(72));
        // expired is a report, not an eviction
        assert!(store.is_authenticated());
    }

    #[test]
    fn test_writes_sweep_legacy_keys() {
        let db = Database::open_in_memory().unwrap();
        let store = db.session();
        let now = Utc::now().to_rfc3339();

        // An old build wrote flat keys
        store.put("token", "stale", &now).unwrap();
        store.put("user", "{}", &now).unwrap();

        store.set_session("tok1", &admin_user()).unwrap();

        assert!(store.read("token").is_none());
        assert!(store.read("user").is_none());
        assert_eq!(store.token().as_deref(), Some("tok1"));
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("showroom.db");

        {
            let db = Database::open(&path).unwrap();
            db.session().set_session("tok1", &admin_user()).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert!(db.session().is_authenticated_admin());
    }
}
