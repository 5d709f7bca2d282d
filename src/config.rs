//! Auth core configuration.
//!
//! All timing and policy knobs live here as construction-time constants.
//! The invariant `warning_lead < inactivity_timeout < session_duration`
//! must hold; `AuthConfig::default()` satisfies it.

use std::path::PathBuf;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::Duration;

/// Application name used for the local session-cache directory path
const APP_NAME: &str = "travelbook";

/// Store key holding the users hash (field = user id, value = JSON record)
const USERS_KEY: &str = "travelbook:admin_users";

/// Store key holding the failed-login-attempts document
const ATTEMPTS_KEY: &str = "travelbook:login_attempts";

/// Store key holding the active-session registry document
const SESSIONS_KEY: &str = "travelbook:active_sessions";

/// How long an issued session stays valid.
const SESSION_DURATION_HOURS: i64 = 24;

/// Failures within `LOCKOUT_WINDOW_MINUTES` that trip the short lockout.
const MAX_ATTEMPTS: usize = 5;

/// Short-tier window; also the duration reported to the user, since the
/// lockout decays as the attempts age out of the window.
const LOCKOUT_WINDOW_MINUTES: i64 = 5;

/// Failures within `EXTENDED_WINDOW_MINUTES` that trip the extended lockout.
const MAX_ATTEMPTS_EXTENDED: usize = 10;

/// Extended-tier window and reported duration. Attempt timestamps are pruned
/// beyond this window, never the shorter one, so the extended count stays
/// observable.
const EXTENDED_WINDOW_MINUTES: i64 = 15;

/// Idle time before the auto-logout fires.
const INACTIVITY_TIMEOUT_MINUTES: i64 = 10;

/// How long before auto-logout the warning countdown appears.
const WARNING_LEAD_SECS: i64 = 60;

/// Cadence of the background remote-session revalidation tick.
const REVALIDATION_INTERVAL_SECS: u64 = 30;

/// Grace period between the "signed out elsewhere" notice and the logout,
/// so the user is not yanked out mid-action.
const LOGOUT_GRACE_SECS: u64 = 3;

/// Delay between the auto-logout notice and the logout itself, long enough
/// for the notification to render.
const LOGOUT_NOTICE_DELAY_SECS: u64 = 1;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub session_duration: Duration,

    pub max_attempts: usize,
    pub lockout_window: Duration,
    pub max_attempts_extended: usize,
    pub extended_window: Duration,

    pub inactivity_timeout: Duration,
    pub warning_lead: Duration,

    pub revalidation_interval: StdDuration,
    pub logout_grace: StdDuration,
    pub logout_notice_delay: StdDuration,

    /// When true (the default), logging in evicts the user's other active
    /// sessions and background revalidation enforces registry membership.
    pub single_session: bool,

    pub users_key: String,
    pub attempts_key: String,
    pub sessions_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_duration: Duration::hours(SESSION_DURATION_HOURS),

            max_attempts: MAX_ATTEMPTS,
            lockout_window: Duration::minutes(LOCKOUT_WINDOW_MINUTES),
            max_attempts_extended: MAX_ATTEMPTS_EXTENDED,
            extended_window: Duration::minutes(EXTENDED_WINDOW_MINUTES),

            inactivity_timeout: Duration::minutes(INACTIVITY_TIMEOUT_MINUTES),
            warning_lead: Duration::seconds(WARNING_LEAD_SECS),

            revalidation_interval: StdDuration::from_secs(REVALIDATION_INTERVAL_SECS),
            logout_grace: StdDuration::from_secs(LOGOUT_GRACE_SECS),
            logout_notice_delay: StdDuration::from_secs(LOGOUT_NOTICE_DELAY_SECS),

            single_session: true,

            users_key: USERS_KEY.to_string(),
            attempts_key: ATTEMPTS_KEY.to_string(),
            sessions_key: SESSIONS_KEY.to_string(),
        }
    }
}

impl AuthConfig {
    /// Default location for the local session cache.
    pub fn default_cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timing_invariant() {
        let config = AuthConfig::default();
        assert!(config.warning_lead < config.inactivity_timeout);
        assert!(config.inactivity_timeout < config.session_duration);
    }

    #[test]
    fn test_extended_tier_outlasts_short_tier() {
        let config = AuthConfig::default();
        assert!(config.extended_window > config.lockout_window);
        assert!(config.max_attempts_extended > config.max_attempts);
    }
}
