//! Admin user records and the credential store.
//!
//! Users live in a single hash in the hosted store (field = user id,
//! value = JSON record). The store has no per-record update primitive, so
//! every mutation rereads and rewrites the whole collection; two admins
//! racing on the same write can lose one update. Passwords are stored as
//! Argon2id hashes in PHC string format.

use std::sync::{Arc, Mutex};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::AuthError;
use crate::store::KvStore;

/// Length of the random suffix on generated user ids.
/// Millisecond timestamps alone can collide when users are created
/// back-to-back.
const USER_ID_SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Editor => write!(f, "editor"),
        }
    }
}

/// Full user record as persisted in the store. Never handed to callers;
/// they get the `PublicUser` projection instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    /// Argon2id hash in PHC string format.
    pub password: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    pub is_active: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// User projection without the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
            last_login: user.last_login,
            is_active: user.is_active,
        }
    }
}

/// Input for creating a user. The password arrives in the clear and is
/// hashed before anything touches the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub role: Role,
}

/// Last-good copy of the user directory, served when the store is down.
#[derive(Debug, Clone)]
struct CachedDirectory {
    users: Vec<PublicUser>,
    cached_at: DateTime<Utc>,
}

pub struct CredentialStore {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    users_key: String,
    directory_cache: Mutex<Option<CachedDirectory>>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, users_key: String) -> Self {
        Self {
            store,
            clock,
            users_key,
            directory_cache: Mutex::new(None),
        }
    }

    /// Read the whole user collection. Records that fail to decode are
    /// logged and dropped, never an error for the caller.
    async fn load_all(&self) -> Result<Vec<User>, AuthError> {
        let fields = self.store.hgetall(&self.users_key).await?;
        let mut users = Vec::with_capacity(fields.len());
        for (id, raw) in fields {
            match serde_json::from_str::<User>(&raw) {
                Ok(user) => users.push(user),
                Err(e) => warn!(user_id = %id, error = %e, "Skipping malformed user record"),
            }
        }
        // Store hashes are unordered; keep the directory stable.
        users.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(users)
    }

    /// Rewrite the whole collection. The store offers no atomic per-record
    /// update, so this is the only mutation primitive.
    async fn save_all(&self, users: &[User]) -> Result<(), AuthError> {
        self.store.del(&self.users_key).await?;
        for user in users {
            let raw = serde_json::to_string(user)
                .map_err(|e| AuthError::MalformedRecord(e.to_string()))?;
            self.store.hset(&self.users_key, &user.id, &raw).await?;
        }
        Ok(())
    }

    /// Create a user. Fails with `DuplicateUsername` when the username is
    /// taken (case-sensitive comparison over the full set).
    pub async fn create(&self, new_user: NewUser) -> Result<PublicUser, AuthError> {
        let mut users = self.load_all().await?;
        if users.iter().any(|u| u.username == new_user.username) {
            return Err(AuthError::DuplicateUsername);
        }

        let now = self.clock.now();
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(USER_ID_SUFFIX_LEN)
            .map(char::from)
            .collect();
        let user = User {
            id: format!("user_{}_{}", now.timestamp_millis(), suffix),
            username: new_user.username,
            password: hash_password(new_user.password).await?,
            email: new_user.email,
            role: new_user.role,
            created_at: now,
            last_login: None,
            is_active: true,
            updated_at: None,
        };

        users.push(user.clone());
        self.save_all(&users).await?;
        debug!(user_id = %user.id, username = %user.username, "Created user");
        Ok(PublicUser::from(&user))
    }

    /// Exact, case-sensitive lookup regardless of active status.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        let users = self.load_all().await?;
        Ok(users.into_iter().find(|u| u.username == username))
    }

    /// Lookup for the authentication path: inactive users are treated as
    /// non-existent here, and store failures propagate so login fails closed.
    pub(crate) async fn find_for_login(&self, username: &str) -> Result<Option<User>, AuthError> {
        Ok(self
            .find_by_username(username)
            .await?
            .filter(|u| u.is_active))
    }

    /// Verify a password against a stored hash.
    /// Argon2 is CPU-intensive, so the work runs off the async runtime.
    pub async fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let password = password.to_string();
        let stored_hash = stored_hash.to_string();
        let verified = task::spawn_blocking(move || {
            let parsed = match PasswordHash::new(&stored_hash) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(error = %e, "Stored password hash is malformed");
                    return false;
                }
            };
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .await;

        match verified {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Password verification task panicked");
                false
            }
        }
    }

    /// Change a user's password after verifying the current one.
    pub async fn update_password(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let mut users = self.load_all().await?;
        let index = users
            .iter()
            .position(|u| u.username == username)
            .ok_or(AuthError::NotFound)?;

        if !self.verify(current_password, &users[index].password).await {
            return Err(AuthError::InvalidCredentials);
        }

        users[index].password = hash_password(new_password.to_string()).await?;
        users[index].updated_at = Some(self.clock.now());
        self.save_all(&users).await?;
        debug!(username, "Password updated");
        Ok(())
    }

    /// The user directory, without password hashes. When the store is
    /// unreachable the last-good snapshot is served instead.
    pub async fn list(&self) -> Result<Vec<PublicUser>, AuthError> {
        match self.load_all().await {
            Ok(users) => {
                let listing: Vec<PublicUser> = users.iter().map(PublicUser::from).collect();
                *self.directory_cache.lock().unwrap() = Some(CachedDirectory {
                    users: listing.clone(),
                    cached_at: self.clock.now(),
                });
                Ok(listing)
            }
            Err(AuthError::Store(e)) => {
                let cached = self.directory_cache.lock().unwrap().clone();
                match cached {
                    Some(snapshot) => {
                        let age = (self.clock.now() - snapshot.cached_at).num_minutes();
                        warn!(error = %e, age_minutes = age, "Store unreachable, serving cached user directory");
                        Ok(snapshot.users)
                    }
                    None => Err(AuthError::Store(e)),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Activate or deactivate a user. Deactivation is the deletion
    /// surrogate; records are never physically removed.
    pub async fn set_active(&self, user_id: &str, active: bool) -> Result<(), AuthError> {
        let mut users = self.load_all().await?;
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(AuthError::NotFound)?;
        user.is_active = active;
        user.updated_at = Some(self.clock.now());
        self.save_all(&users).await?;
        debug!(user_id, active, "User status changed");
        Ok(())
    }

    pub(crate) async fn stamp_last_login(&self, user_id: &str) -> Result<(), AuthError> {
        let mut users = self.load_all().await?;
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(AuthError::NotFound)?;
        user.last_login = Some(self.clock.now());
        self.save_all(&users).await
    }
}

/// Hash a password with Argon2id and a fresh random salt, off the runtime.
async fn hash_password(password: String) -> Result<String, AuthError> {
    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::MalformedRecord(format!("password hash: {e}")))
    })
    .await
    .map_err(|e| AuthError::MalformedRecord(format!("password hashing task: {e}")))?
}
