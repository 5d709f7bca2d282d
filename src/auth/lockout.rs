//! Progressive lockout on failed login attempts.
//!
//! Failed attempts are tracked per username as a pruned list of timestamps
//! in the store (`{ "<username>": [epoch_millis, ...] }`). Two tiers apply:
//! 5 failures within 5 minutes trip a short lockout, 10 failures within
//! 15 minutes trip the extended one, and the extended check wins when both
//! are satisfied. Lockout is keyed by username, not device or address, so a
//! third party hammering someone else's username locks that username for
//! everyone; this matches the deployed behavior and is a documented
//! limitation rather than a bug.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::LockoutTier;
use crate::store::{KvStore, StoreError};

type AttemptMap = HashMap<String, Vec<i64>>;

/// A tripped lockout: which tier, and the duration to report to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lockout {
    pub tier: LockoutTier,
    pub minutes: i64,
}

pub struct LockoutPolicy {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    attempts_key: String,
    max_attempts: usize,
    lockout_window: Duration,
    max_attempts_extended: usize,
    extended_window: Duration,
}

impl LockoutPolicy {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: &AuthConfig) -> Self {
        Self {
            store,
            clock,
            attempts_key: config.attempts_key.clone(),
            max_attempts: config.max_attempts,
            lockout_window: config.lockout_window,
            max_attempts_extended: config.max_attempts_extended,
            extended_window: config.extended_window,
        }
    }

    async fn load(&self) -> Result<AttemptMap, StoreError> {
        let raw = self.store.get(&self.attempts_key).await?;
        let Some(raw) = raw else {
            return Ok(AttemptMap::new());
        };
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                // A corrupt document must not brick every login.
                warn!(error = %e, "Malformed failed-attempts document, starting fresh");
                Ok(AttemptMap::new())
            }
        }
    }

    async fn save(&self, attempts: &AttemptMap) -> Result<(), StoreError> {
        let raw = serde_json::to_string(attempts)
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
        self.store.set(&self.attempts_key, &raw).await
    }

    /// Whether the username is currently locked out, and at which tier.
    /// Store failures propagate so the login path fails closed.
    pub async fn check(&self, username: &str) -> Result<Option<Lockout>, StoreError> {
        let attempts = self.load().await?;
        let Some(timestamps) = attempts.get(username) else {
            return Ok(None);
        };

        let now = self.clock.now().timestamp_millis();
        let within = |window: Duration| {
            timestamps
                .iter()
                .filter(|&&at| now - at < window.num_milliseconds())
                .count()
        };

        if within(self.extended_window) >= self.max_attempts_extended {
            return Ok(Some(Lockout {
                tier: LockoutTier::Extended,
                minutes: self.extended_window.num_minutes(),
            }));
        }
        if within(self.lockout_window) >= self.max_attempts {
            return Ok(Some(Lockout {
                tier: LockoutTier::Short,
                minutes: self.lockout_window.num_minutes(),
            }));
        }
        Ok(None)
    }

    /// Record a failed attempt and prune entries older than the extended
    /// window. Best effort: a store failure here must not mask the
    /// credential error the caller is already returning.
    pub async fn record_failure(&self, username: &str) {
        let result = async {
            let mut attempts = self.load().await?;
            let now = self.clock.now().timestamp_millis();
            let cutoff = self.extended_window.num_milliseconds();

            let timestamps = attempts.entry(username.to_string()).or_default();
            timestamps.push(now);
            timestamps.retain(|&at| now - at < cutoff);

            self.save(&attempts).await
        }
        .await;

        match result {
            Ok(()) => debug!(username, "Recorded failed login attempt"),
            Err(e) => warn!(username, error = %e, "Failed to record login attempt"),
        }
    }

    /// Drop the username's attempt history. Called only after a successful
    /// authentication; best effort for the same reason as `record_failure`.
    pub async fn clear(&self, username: &str) {
        let result = async {
            let mut attempts = self.load().await?;
            if attempts.remove(username).is_none() {
                return Ok(());
            }
            self.save(&attempts).await
        }
        .await;

        if let Err(e) = result {
            warn!(username, error = %e, "Failed to clear login attempts");
        }
    }

    /// Number of retained failure timestamps for a username.
    pub async fn failure_count(&self, username: &str) -> Result<usize, StoreError> {
        let attempts = self.load().await?;
        Ok(attempts.get(username).map_or(0, Vec::len))
    }
}
