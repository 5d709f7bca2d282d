//! The auth service object.
//!
//! `AuthManager` owns the login flow end to end: lockout checks, credential
//! verification, session issuance, the local session copy, and the
//! server-side registry. It is constructed explicitly and handed to
//! whatever needs it; there is no global instance. Call `init()` once after
//! construction to restore a cached session, and `shutdown()` (or
//! `logout()`) to tear background work down.
//!
//! Validation is two-speed: `require_auth()` is a synchronous fast path
//! over the local session copy so protected views never block on a network
//! round-trip, while the background revalidation task reconciles against
//! the registry and forces a logout when the remote side disagrees.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::store::KvStore;

use super::lockout::LockoutPolicy;
use super::registry::{ActiveSessionEntry, SessionRegistry};
use super::session::{Session, SessionCache};
use super::users::{CredentialStore, PublicUser};

/// Buffer size for the background notice channel.
/// Revalidation emits at most a couple of notices before stopping.
const CHANNEL_BUFFER_SIZE: usize = 8;

/// Successful authentication: the public user projection and the issued
/// session. The password hash never crosses this boundary.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub user: PublicUser,
    pub session: Session,
}

/// Notices emitted by the background revalidation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionNotice {
    /// The registry no longer lists this session (signed in elsewhere).
    /// Logout follows after the configured grace period.
    Superseded,
    /// The session passed its expiry.
    Expired,
    /// Logout has completed; the caller should leave protected views.
    LoggedOut,
}

pub struct AuthManager {
    config: AuthConfig,
    clock: Arc<dyn Clock>,
    users: CredentialStore,
    lockout: LockoutPolicy,
    registry: SessionRegistry,
    cache: SessionCache,
    current: Mutex<Option<Session>>,
    revalidation: Mutex<Option<JoinHandle<()>>>,
}

impl AuthManager {
    pub fn new(store: Arc<dyn KvStore>, config: AuthConfig, cache_dir: PathBuf) -> Self {
        Self::with_clock(store, config, cache_dir, Arc::new(SystemClock))
    }

    /// Construct with an explicit clock. Tests drive expiry and lockout
    /// windows through this seam.
    pub fn with_clock(
        store: Arc<dyn KvStore>,
        config: AuthConfig,
        cache_dir: PathBuf,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let users = CredentialStore::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.users_key.clone(),
        );
        let lockout = LockoutPolicy::new(Arc::clone(&store), Arc::clone(&clock), &config);
        let registry = SessionRegistry::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.sessions_key.clone(),
            config.session_duration,
        );
        let cache = SessionCache::new(cache_dir);

        Self {
            config,
            clock,
            users,
            lockout,
            registry,
            cache,
            current: Mutex::new(None),
            revalidation: Mutex::new(None),
        }
    }

    /// Restore a cached session from disk, if one exists and is unexpired.
    pub fn init(&self) {
        match self.cache.load(self.clock.now()) {
            Ok(Some(session)) => {
                debug!(user = %session.username, "Restored cached session");
                *self.current.lock().unwrap() = Some(session);
            }
            Ok(None) => debug!("No cached session"),
            Err(e) => warn!(error = %e, "Failed to load cached session"),
        }
    }

    /// Stop background work. The session itself is left intact.
    pub fn shutdown(&self) {
        self.stop_revalidation();
    }

    /// The user directory and credential operations, for the admin surface.
    pub fn users(&self) -> &CredentialStore {
        &self.users
    }

    /// Authenticate a user and issue a session.
    ///
    /// Order matters: the lockout check runs before the user lookup so a
    /// locked account reports the lockout even for bad passwords, and a
    /// failed lookup or password mismatch records a failure before
    /// returning the (deliberately uniform) credential error. A store
    /// failure anywhere on this path fails closed.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<AuthOutcome, AuthError> {
        if let Some(lockout) = self.lockout.check(username).await? {
            warn!(username, tier = ?lockout.tier, "Login attempt on locked account");
            return Err(AuthError::AccountLocked {
                tier: lockout.tier,
                minutes: lockout.minutes,
            });
        }

        let Some(user) = self.users.find_for_login(username).await? else {
            self.lockout.record_failure(username).await;
            return Err(AuthError::InvalidCredentials);
        };

        if !self.users.verify(password, &user.password).await {
            self.lockout.record_failure(username).await;
            return Err(AuthError::InvalidCredentials);
        }

        self.lockout.clear(username).await;

        let session = Session::issue(
            &user,
            self.config.session_duration,
            remember_me,
            self.clock.now(),
        );
        self.registry
            .register(&user.id, &session.id, self.config.single_session)
            .await?;

        if let Err(e) = self.cache.save(&session) {
            // The in-memory copy still works for this run; only restarts
            // lose the session.
            warn!(error = %e, "Failed to persist session locally");
        }
        if let Err(e) = self.users.stamp_last_login(&user.id).await {
            warn!(error = %e, "Failed to stamp last_login");
        }

        *self.current.lock().unwrap() = Some(session.clone());
        info!(user = %user.username, "Authenticated");

        Ok(AuthOutcome {
            user: PublicUser::from(&user),
            session,
        })
    }

    /// The current session, or `None` (clearing local state) when absent
    /// or expired.
    pub fn current_session(&self) -> Option<Session> {
        let mut current = self.current.lock().unwrap();
        let expired = match current.as_ref() {
            Some(session) => session.is_expired(self.clock.now()),
            None => return None,
        };
        if expired {
            if let Some(session) = current.take() {
                debug!(user = %session.username, "Local session expired");
            }
            drop(current);
            if let Err(e) = self.cache.clear() {
                warn!(error = %e, "Failed to clear expired session cache");
            }
            return None;
        }
        current.clone()
    }

    /// Synchronous guard for protected views. Local expiry only; the
    /// background revalidation reconciles with the registry.
    pub fn require_auth(&self) -> bool {
        self.current_session().is_some()
    }

    /// Full validation: local expiry plus, in single-session mode, registry
    /// membership. A store failure during the remote check falls back to
    /// the local verdict rather than signing the user out over a network
    /// blip.
    pub async fn validate(&self) -> Result<(), AuthError> {
        let Some(session) = self.current_session() else {
            return Err(AuthError::SessionExpired);
        };

        if !self.config.single_session {
            return Ok(());
        }

        match self.registry.is_active(&session.user_id, &session.id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthError::SessionSuperseded),
            Err(e) => {
                warn!(error = %e, "Registry unreachable, trusting local session");
                Ok(())
            }
        }
    }

    pub async fn is_valid(&self) -> bool {
        self.validate().await.is_ok()
    }

    /// Sign out. Safe to call repeatedly; a second call is a no-op.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let session = self.current.lock().unwrap().take();
        self.stop_revalidation();

        let Some(session) = session else {
            debug!("Logout without an active session is a no-op");
            return Ok(());
        };

        if let Err(e) = self.registry.remove(&session.user_id, &session.id).await {
            warn!(error = %e, "Failed to prune registry entry on logout");
        }
        if let Err(e) = self.cache.clear() {
            warn!(error = %e, "Failed to clear local session cache");
        }

        info!(user = %session.username, "Logged out");
        Ok(())
    }

    /// Active sessions for a user, for the admin session table.
    pub async fn user_active_sessions(
        &self,
        user_id: &str,
    ) -> Result<Vec<ActiveSessionEntry>, AuthError> {
        Ok(self.registry.sessions_for_user(user_id).await?)
    }

    /// Force a user out of every device by clearing their registry entries;
    /// each device notices on its next revalidation tick.
    pub async fn force_logout_user(&self, user_id: &str) -> Result<(), AuthError> {
        Ok(self.registry.evict_user(user_id).await?)
    }

    /// Prune registry entries older than the session duration.
    pub async fn cleanup_expired_sessions(&self) -> Result<usize, AuthError> {
        Ok(self.registry.cleanup_expired().await?)
    }

    /// Spawn the background revalidation tick. Every interval the session
    /// is re-checked against the registry; when the remote side disagrees a
    /// notice is emitted and logout follows after the grace period. The
    /// task is aborted by `logout()` and `shutdown()`.
    pub fn start_revalidation(self: Arc<Self>) -> mpsc::Receiver<SessionNotice> {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let manager = Arc::clone(&self);
        let handle = tokio::spawn(Self::revalidation_loop(manager, tx));
        *self.revalidation.lock().unwrap() = Some(handle);
        rx
    }

    async fn revalidation_loop(manager: Arc<AuthManager>, tx: mpsc::Sender<SessionNotice>) {
        let mut ticker = tokio::time::interval(manager.config.revalidation_interval);
        // The first tick completes immediately; skip it so the initial
        // check happens one interval after login.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match manager.validate().await {
                Ok(()) => {
                    if let Some(session) = manager.current_session() {
                        if let Err(e) =
                            manager.registry.touch(&session.user_id, &session.id).await
                        {
                            debug!(error = %e, "Failed to refresh registry activity stamp");
                        }
                    } else {
                        break;
                    }
                }
                Err(AuthError::SessionSuperseded) => {
                    info!("Session invalidated from another device");
                    let _ = tx.send(SessionNotice::Superseded).await;
                    tokio::time::sleep(manager.config.logout_grace).await;
                    // Drop our own handle without aborting so the logout
                    // runs to completion.
                    manager.revalidation.lock().unwrap().take();
                    if let Err(e) = manager.logout().await {
                        warn!(error = %e, "Forced logout failed");
                    }
                    let _ = tx.send(SessionNotice::LoggedOut).await;
                    break;
                }
                Err(AuthError::SessionExpired) => {
                    let _ = tx.send(SessionNotice::Expired).await;
                    manager.revalidation.lock().unwrap().take();
                    if let Err(e) = manager.logout().await {
                        warn!(error = %e, "Expiry logout failed");
                    }
                    let _ = tx.send(SessionNotice::LoggedOut).await;
                    break;
                }
                Err(e) => {
                    // validate() already falls back on store failures;
                    // anything else is unexpected but not fatal.
                    warn!(error = %e, "Background revalidation error");
                }
            }
        }
    }

    fn stop_revalidation(&self) {
        if let Some(handle) = self.revalidation.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl Drop for AuthManager {
    fn drop(&mut self) {
        self.stop_revalidation();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::Duration;
    use tempfile::TempDir;

    use super::*;
    use crate::clock::test_support::ManualClock;
    use crate::error::LockoutTier;
    use crate::store::{MemoryKvStore, StoreError};
    use crate::auth::users::{NewUser, Role};

    struct Harness {
        manager: Arc<AuthManager>,
        clock: Arc<ManualClock>,
        store: Arc<MemoryKvStore>,
        _cache_dir: TempDir,
    }

    fn harness_with(store: Arc<MemoryKvStore>, clock: Arc<ManualClock>, config: AuthConfig) -> Harness {
        let cache_dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(AuthManager::with_clock(
            Arc::clone(&store) as Arc<dyn KvStore>,
            config,
            cache_dir.path().to_path_buf(),
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        Harness {
            manager,
            clock,
            store,
            _cache_dir: cache_dir,
        }
    }

    async fn harness() -> Harness {
        let h = harness_with(
            Arc::new(MemoryKvStore::new()),
            Arc::new(ManualClock::default()),
            AuthConfig::default(),
        );
        h.manager
            .users()
            .create(NewUser {
                username: "alice".to_string(),
                password: "correct-horse".to_string(),
                email: "alice@example.com".to_string(),
                role: Role::Admin,
            })
            .await
            .unwrap();
        h
    }

    #[tokio::test]
    async fn test_authenticate_issues_session_with_expiry() {
        let h = harness().await;
        let outcome = h
            .manager
            .authenticate("alice", "correct-horse", false)
            .await
            .unwrap();

        assert_eq!(outcome.user.username, "alice");
        assert_eq!(
            outcome.session.expires_at,
            h.clock.now() + AuthConfig::default().session_duration
        );
        assert!(h.manager.require_auth());

        let stored = h
            .manager
            .users()
            .find_by_username("alice")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.last_login.is_some());
    }

    #[tokio::test]
    async fn test_failures_then_success_clears_attempts() {
        let h = harness().await;
        for _ in 0..4 {
            let err = h
                .manager
                .authenticate("alice", "wrong-password", false)
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }

        h.manager
            .authenticate("alice", "correct-horse", false)
            .await
            .unwrap();

        let policy = LockoutPolicy::new(
            Arc::clone(&h.store) as Arc<dyn KvStore>,
            Arc::clone(&h.clock) as Arc<dyn Clock>,
            &AuthConfig::default(),
        );
        assert_eq!(policy.failure_count("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sixth_attempt_locked_despite_correct_password() {
        let h = harness().await;
        for _ in 0..5 {
            let _ = h.manager.authenticate("alice", "wrong", false).await;
        }

        let err = h
            .manager
            .authenticate("alice", "correct-horse", false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::AccountLocked {
                tier: LockoutTier::Short,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_failures_across_windows_escalate_to_extended_tier() {
        let h = harness().await;
        for _ in 0..5 {
            let _ = h.manager.authenticate("alice", "wrong", false).await;
        }
        let short_minutes = match h
            .manager
            .authenticate("alice", "correct-horse", false)
            .await
            .unwrap_err()
        {
            AuthError::AccountLocked {
                tier: LockoutTier::Short,
                minutes,
            } => minutes,
            other => panic!("expected short lockout, got {other:?}"),
        };

        // The short lockout decays with its window, but the extended window
        // still remembers the first burst; five more failures reach ten.
        h.clock.advance(Duration::minutes(6));
        for _ in 0..5 {
            let _ = h.manager.authenticate("alice", "wrong", false).await;
        }

        let err = h
            .manager
            .authenticate("alice", "correct-horse", false)
            .await
            .unwrap_err();
        match err {
            AuthError::AccountLocked { tier, minutes } => {
                assert_eq!(tier, LockoutTier::Extended);
                assert!(minutes > short_minutes);
            }
            other => panic!("expected extended lockout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_user_matches_wrong_password_message() {
        let h = harness().await;
        let unknown = h
            .manager
            .authenticate("nobody", "whatever", false)
            .await
            .unwrap_err();
        let wrong = h
            .manager
            .authenticate("alice", "wrong", false)
            .await
            .unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_inactive_user_cannot_authenticate() {
        let h = harness().await;
        let user = h
            .manager
            .users()
            .find_by_username("alice")
            .await
            .unwrap()
            .unwrap();
        h.manager.users().set_active(&user.id, false).await.unwrap();

        let err = h
            .manager
            .authenticate("alice", "correct-horse", false)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_logout_twice_is_noop() {
        let h = harness().await;
        h.manager
            .authenticate("alice", "correct-horse", false)
            .await
            .unwrap();

        h.manager.logout().await.unwrap();
        assert!(!h.manager.require_auth());
        // Second logout must not error.
        h.manager.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_session_cleared_on_check() {
        let h = harness().await;
        h.manager
            .authenticate("alice", "correct-horse", false)
            .await
            .unwrap();

        h.clock.advance(Duration::hours(25));
        assert!(h.manager.current_session().is_none());
        assert!(!h.manager.require_auth());
        assert!(!h.manager.is_valid().await);
    }

    #[tokio::test]
    async fn test_session_survives_restart_until_expiry() {
        let store = Arc::new(MemoryKvStore::new());
        let clock = Arc::new(ManualClock::default());
        let cache_dir = tempfile::tempdir().unwrap();

        {
            let manager = AuthManager::with_clock(
                Arc::clone(&store) as Arc<dyn KvStore>,
                AuthConfig::default(),
                cache_dir.path().to_path_buf(),
                Arc::clone(&clock) as Arc<dyn Clock>,
            );
            manager
                .users()
                .create(NewUser {
                    username: "alice".to_string(),
                    password: "correct-horse".to_string(),
                    email: "alice@example.com".to_string(),
                    role: Role::Admin,
                })
                .await
                .unwrap();
            manager
                .authenticate("alice", "correct-horse", false)
                .await
                .unwrap();
        }

        // Fresh manager over the same cache dir: the session comes back.
        let restarted = AuthManager::with_clock(
            Arc::clone(&store) as Arc<dyn KvStore>,
            AuthConfig::default(),
            cache_dir.path().to_path_buf(),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        restarted.init();
        assert!(restarted.require_auth());
        assert!(restarted.is_valid().await);

        // Past expiry the cached copy is discarded on load.
        clock.advance(Duration::hours(25));
        let expired = AuthManager::with_clock(
            store as Arc<dyn KvStore>,
            AuthConfig::default(),
            cache_dir.path().to_path_buf(),
            clock as Arc<dyn Clock>,
        );
        expired.init();
        assert!(!expired.require_auth());
        assert!(!cache_dir.path().join("session.json").exists());
    }

    #[tokio::test]
    async fn test_second_device_supersedes_first() {
        let store = Arc::new(MemoryKvStore::new());
        let clock = Arc::new(ManualClock::default());
        let device_a = harness_with(Arc::clone(&store), Arc::clone(&clock), AuthConfig::default());
        let device_b = harness_with(store, clock, AuthConfig::default());

        device_a
            .manager
            .users()
            .create(NewUser {
                username: "alice".to_string(),
                password: "correct-horse".to_string(),
                email: "alice@example.com".to_string(),
                role: Role::Admin,
            })
            .await
            .unwrap();

        device_a
            .manager
            .authenticate("alice", "correct-horse", false)
            .await
            .unwrap();
        device_b
            .manager
            .authenticate("alice", "correct-horse", false)
            .await
            .unwrap();

        let err = device_a.manager.validate().await.unwrap_err();
        assert!(matches!(err, AuthError::SessionSuperseded));
        assert!(device_b.manager.is_valid().await);
    }

    #[tokio::test]
    async fn test_multi_session_mode_allows_both_devices() {
        let store = Arc::new(MemoryKvStore::new());
        let clock = Arc::new(ManualClock::default());
        let config = AuthConfig {
            single_session: false,
            ..AuthConfig::default()
        };
        let device_a = harness_with(Arc::clone(&store), Arc::clone(&clock), config.clone());
        let device_b = harness_with(store, clock, config);

        device_a
            .manager
            .users()
            .create(NewUser {
                username: "alice".to_string(),
                password: "correct-horse".to_string(),
                email: "alice@example.com".to_string(),
                role: Role::Admin,
            })
            .await
            .unwrap();

        device_a
            .manager
            .authenticate("alice", "correct-horse", false)
            .await
            .unwrap();
        device_b
            .manager
            .authenticate("alice", "correct-horse", false)
            .await
            .unwrap();

        assert!(device_a.manager.is_valid().await);
        assert!(device_b.manager.is_valid().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_revalidation_tick_forces_logout_after_grace() {
        let store = Arc::new(MemoryKvStore::new());
        let clock = Arc::new(ManualClock::default());
        let device_a = harness_with(Arc::clone(&store), Arc::clone(&clock), AuthConfig::default());
        let device_b = harness_with(store, clock, AuthConfig::default());

        device_a
            .manager
            .users()
            .create(NewUser {
                username: "alice".to_string(),
                password: "correct-horse".to_string(),
                email: "alice@example.com".to_string(),
                role: Role::Admin,
            })
            .await
            .unwrap();
        device_a
            .manager
            .authenticate("alice", "correct-horse", false)
            .await
            .unwrap();

        let mut notices = Arc::clone(&device_a.manager).start_revalidation();

        device_b
            .manager
            .authenticate("alice", "correct-horse", false)
            .await
            .unwrap();

        // Paused-clock auto-advance drives the 30s tick and 3s grace.
        assert_eq!(notices.recv().await, Some(SessionNotice::Superseded));
        assert_eq!(notices.recv().await, Some(SessionNotice::LoggedOut));
        assert!(!device_a.manager.require_auth());
    }

    #[tokio::test]
    async fn test_force_logout_user_clears_registry() {
        let h = harness().await;
        let outcome = h
            .manager
            .authenticate("alice", "correct-horse", false)
            .await
            .unwrap();

        h.manager
            .force_logout_user(&outcome.user.id)
            .await
            .unwrap();
        let err = h.manager.validate().await.unwrap_err();
        assert!(matches!(err, AuthError::SessionSuperseded));
    }

    /// Store double whose every command fails, for fail-closed checks.
    struct DownStore;

    #[async_trait]
    impl KvStore for DownStore {
        async fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::ServerError("store is down".to_string()))
        }
        async fn set(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::ServerError("store is down".to_string()))
        }
        async fn del(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::ServerError("store is down".to_string()))
        }
        async fn hset(&self, _: &str, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::ServerError("store is down".to_string()))
        }
        async fn hget(&self, _: &str, _: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::ServerError("store is down".to_string()))
        }
        async fn hgetall(&self, _: &str) -> Result<HashMap<String, String>, StoreError> {
            Err(StoreError::ServerError("store is down".to_string()))
        }
        async fn hdel(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::ServerError("store is down".to_string()))
        }
        async fn sadd(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::ServerError("store is down".to_string()))
        }
        async fn smembers(&self, _: &str) -> Result<Vec<String>, StoreError> {
            Err(StoreError::ServerError("store is down".to_string()))
        }
        async fn srem(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::ServerError("store is down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let cache_dir = tempfile::tempdir().unwrap();
        let manager = AuthManager::new(
            Arc::new(DownStore) as Arc<dyn KvStore>,
            AuthConfig::default(),
            cache_dir.path().to_path_buf(),
        );

        let err = manager
            .authenticate("alice", "correct-horse", false)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Store(_)));
        assert!(!manager.require_auth());
    }

    #[tokio::test]
    async fn test_registry_outage_trusts_local_session() {
        let h = harness().await;
        h.manager
            .authenticate("alice", "correct-horse", false)
            .await
            .unwrap();

        // Swap in a dead store behind a fresh manager sharing the local
        // cache: validation must fall back to the local verdict.
        let manager = AuthManager::with_clock(
            Arc::new(DownStore) as Arc<dyn KvStore>,
            AuthConfig::default(),
            h._cache_dir.path().to_path_buf(),
            Arc::clone(&h.clock) as Arc<dyn Clock>,
        );
        manager.init();
        assert!(manager.is_valid().await);
    }
}
