//! Server-side active-session registry.
//!
//! One JSON document in the store maps each user id to the sessions
//! currently considered live for that user:
//! `{ "<user_id>": [{ "sessionId", "createdAt", "lastActivity" }, ...] }`.
//! Every rewrite prunes entries older than the session duration. Updates
//! are read-modify-write with last-writer-wins semantics; across devices
//! there is no ordering guarantee beyond that.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::store::{KvStore, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSessionEntry {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

type RegistryMap = HashMap<String, Vec<ActiveSessionEntry>>;

pub struct SessionRegistry {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    sessions_key: String,
    session_duration: Duration,
}

impl SessionRegistry {
    pub fn new(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        sessions_key: String,
        session_duration: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            sessions_key,
            session_duration,
        }
    }

    async fn load(&self) -> Result<RegistryMap, StoreError> {
        let raw = self.store.get(&self.sessions_key).await?;
        let Some(raw) = raw else {
            return Ok(RegistryMap::new());
        };
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                // A corrupt registry must not lock everyone out; treat it
                // as empty and let logins rebuild it.
                warn!(error = %e, "Malformed active-session registry, treating as empty");
                Ok(RegistryMap::new())
            }
        }
    }

    async fn save(&self, registry: &RegistryMap) -> Result<(), StoreError> {
        let raw = serde_json::to_string(registry)
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
        self.store.set(&self.sessions_key, &raw).await
    }

    /// Drop entries older than the session duration and users left with no
    /// entries. Returns how many entries were removed.
    fn prune(&self, registry: &mut RegistryMap) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        registry.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|entry| now - entry.created_at < self.session_duration);
            removed += before - entries.len();
            !entries.is_empty()
        });
        removed
    }

    /// Register a session for a user. With `evict_existing` (single-session
    /// mode) the user's prior entries are cleared first, superseding any
    /// session another device still holds.
    pub async fn register(
        &self,
        user_id: &str,
        session_id: &str,
        evict_existing: bool,
    ) -> Result<(), StoreError> {
        let mut registry = self.load().await?;
        self.prune(&mut registry);

        let entries = registry.entry(user_id.to_string()).or_default();
        if evict_existing && !entries.is_empty() {
            debug!(user_id, evicted = entries.len(), "Evicting other active sessions");
            entries.clear();
        }

        let now = self.clock.now();
        entries.push(ActiveSessionEntry {
            session_id: session_id.to_string(),
            created_at: now,
            last_activity: now,
        });

        self.save(&registry).await
    }

    /// Remove one session for a user, dropping the user's entry entirely
    /// when no sessions remain.
    pub async fn remove(&self, user_id: &str, session_id: &str) -> Result<(), StoreError> {
        let mut registry = self.load().await?;
        let Some(entries) = registry.get_mut(user_id) else {
            return Ok(());
        };
        entries.retain(|entry| entry.session_id != session_id);
        if entries.is_empty() {
            registry.remove(user_id);
        }
        self.save(&registry).await
    }

    /// Whether the session is still listed for the user.
    pub async fn is_active(&self, user_id: &str, session_id: &str) -> Result<bool, StoreError> {
        let registry = self.load().await?;
        Ok(registry
            .get(user_id)
            .is_some_and(|entries| entries.iter().any(|e| e.session_id == session_id)))
    }

    /// Refresh a session's `lastActivity` stamp.
    pub async fn touch(&self, user_id: &str, session_id: &str) -> Result<(), StoreError> {
        let mut registry = self.load().await?;
        let Some(entry) = registry
            .get_mut(user_id)
            .and_then(|entries| entries.iter_mut().find(|e| e.session_id == session_id))
        else {
            return Ok(());
        };
        entry.last_activity = self.clock.now();
        self.save(&registry).await
    }

    /// Active sessions for one user (admin surface).
    pub async fn sessions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ActiveSessionEntry>, StoreError> {
        let registry = self.load().await?;
        Ok(registry.get(user_id).cloned().unwrap_or_default())
    }

    /// Drop every session a user holds, on every device (admin surface).
    pub async fn evict_user(&self, user_id: &str) -> Result<(), StoreError> {
        let mut registry = self.load().await?;
        if registry.remove(user_id).is_none() {
            return Ok(());
        }
        debug!(user_id, "Force-logged out user from all devices");
        self.save(&registry).await
    }

    /// Explicit maintenance pass over the whole registry.
    pub async fn cleanup_expired(&self) -> Result<usize, StoreError> {
        let mut registry = self.load().await?;
        let removed = self.prune(&mut registry);
        if removed > 0 {
            self.save(&registry).await?;
            debug!(removed, "Pruned expired registry entries");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::ManualClock;
    use crate::store::MemoryKvStore;

    fn registry() -> (SessionRegistry, Arc<ManualClock>) {
        let store = Arc::new(MemoryKvStore::new());
        let clock = Arc::new(ManualClock::default());
        let registry = SessionRegistry::new(
            store as Arc<dyn KvStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            "travelbook:active_sessions".to_string(),
            Duration::hours(24),
        );
        (registry, clock)
    }

    #[tokio::test]
    async fn test_register_and_membership() {
        let (registry, _clock) = registry();
        registry.register("u1", "sess_a", false).await.unwrap();
        assert!(registry.is_active("u1", "sess_a").await.unwrap());
        assert!(!registry.is_active("u1", "sess_b").await.unwrap());
        assert!(!registry.is_active("u2", "sess_a").await.unwrap());
    }

    #[tokio::test]
    async fn test_single_session_eviction() {
        let (registry, _clock) = registry();
        registry.register("u1", "sess_a", true).await.unwrap();
        registry.register("u1", "sess_b", true).await.unwrap();

        assert!(!registry.is_active("u1", "sess_a").await.unwrap());
        assert!(registry.is_active("u1", "sess_b").await.unwrap());
        assert_eq!(registry.sessions_for_user("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_multi_session_accumulates() {
        let (registry, _clock) = registry();
        registry.register("u1", "sess_a", false).await.unwrap();
        registry.register("u1", "sess_b", false).await.unwrap();
        assert_eq!(registry.sessions_for_user("u1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_drops_empty_user_entries() {
        let (registry, _clock) = registry();
        registry.register("u1", "sess_a", false).await.unwrap();
        registry.remove("u1", "sess_a").await.unwrap();
        assert!(registry.sessions_for_user("u1").await.unwrap().is_empty());
        // Removing again is a no-op.
        registry.remove("u1", "sess_a").await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_prunes_expired_entries() {
        let (registry, clock) = registry();
        registry.register("u1", "sess_a", false).await.unwrap();
        clock.advance(Duration::hours(25));
        registry.register("u2", "sess_b", false).await.unwrap();

        // u1's entry was already pruned by the register rewrite.
        assert!(!registry.is_active("u1", "sess_a").await.unwrap());
        assert_eq!(registry.cleanup_expired().await.unwrap(), 0);
        assert!(registry.is_active("u2", "sess_b").await.unwrap());
    }

    #[tokio::test]
    async fn test_touch_updates_last_activity() {
        let (registry, clock) = registry();
        registry.register("u1", "sess_a", false).await.unwrap();
        let before = registry.sessions_for_user("u1").await.unwrap()[0].last_activity;

        clock.advance(Duration::seconds(30));
        registry.touch("u1", "sess_a").await.unwrap();
        let after = registry.sessions_for_user("u1").await.unwrap()[0].last_activity;
        assert!(after > before);
    }

    #[tokio::test]
    async fn test_evict_user_clears_all_devices() {
        let (registry, _clock) = registry();
        registry.register("u1", "sess_a", false).await.unwrap();
        registry.register("u1", "sess_b", false).await.unwrap();
        registry.evict_user("u1").await.unwrap();
        assert!(registry.sessions_for_user("u1").await.unwrap().is_empty());
    }
}
