//! The signed-in session and its local cache.
//!
//! A session is issued on successful authentication and cached as JSON in
//! the platform cache directory so a restart (or page refresh, in the
//! embedding UI) keeps the user signed in until `expires_at`. The registry
//! copy, not this one, is authoritative in single-session mode.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::users::{Role, User};

/// Session file name in the cache directory
const SESSION_FILE: &str = "session.json";

/// Length of the random token suffix. 32 alphanumeric characters from a
/// CSPRNG is ~190 bits of entropy.
const TOKEN_SUFFIX_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub username: String,
    /// Role snapshot at issuance; later role edits do not retroactively
    /// change a live session.
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub remember_me: bool,
}

impl Session {
    /// Issue a fresh session for a user.
    pub fn issue(user: &User, duration: Duration, remember_me: bool, now: DateTime<Utc>) -> Self {
        Self {
            id: generate_token(now),
            user_id: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            created_at: now,
            expires_at: now + duration,
            remember_me,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }
}

/// Generate a session token: `sess_<epoch-millis>_<random suffix>`.
/// `thread_rng` is a CSPRNG, so the suffix is not guessable from the
/// timestamp prefix.
fn generate_token(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("sess_{}_{}", now.timestamp_millis(), suffix)
}

/// File-backed cache for the single current session.
pub struct SessionCache {
    cache_dir: PathBuf,
}

impl SessionCache {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Load the cached session, discarding it when expired or unreadable.
    /// A corrupt cache file is cleared rather than surfaced as an error.
    pub fn load(&self, now: DateTime<Utc>) -> Result<Option<Session>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }

        let contents =
            std::fs::read_to_string(&path).context("Failed to read session cache file")?;

        let session: Session = match serde_json::from_str(&contents) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Discarding malformed session cache");
                self.clear()?;
                return Ok(None);
            }
        };

        if session.is_expired(now) {
            self.clear()?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Save the session to disk
    pub fn save(&self, session: &Session) -> Result<()> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(session)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Remove the cached session if present
    pub fn clear(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}
