//! Inactivity monitoring and auto-logout.
//!
//! While a session is active, the embedding UI reports interaction events
//! here. Going idle for `inactivity_timeout - warning_lead` raises a warning
//! with a per-second countdown; reaching `inactivity_timeout` logs the user
//! out. Any qualifying activity dismisses the warning and restarts both
//! timers.
//!
//! The logic is an explicit state machine over an injected clock: `poll(now)`
//! performs every transition, so tests step through warning and logout
//! without wall-clock sleeps. `MonitorHandle` wraps the machine in a 1 Hz
//! tokio driver for production use and tears the whole thing down (driver
//! and machine together) on shutdown so nothing can fire against a stale
//! session.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::auth::AuthManager;
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::AuthError;

/// Tick cadence of the driver. One second matches the countdown granularity.
const TICK_INTERVAL: StdDuration = StdDuration::from_secs(1);

/// Buffer size for the monitor event channel.
const CHANNEL_BUFFER_SIZE: usize = 16;

/// Interaction kinds the embedding UI observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    PointerMove,
    PointerDown,
    KeyPress,
    Scroll,
    TouchStart,
    Click,
    WindowFocus,
    /// Observed for completeness; losing focus neither resets nor cancels
    /// the timers.
    WindowBlur,
}

impl Activity {
    pub fn resets_timers(self) -> bool {
        !matches!(self, Activity::WindowBlur)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// No session to watch; every input is ignored.
    Disarmed,
    /// Timers running, no warning shown.
    Idle,
    /// Warning visible, countdown running.
    Warning,
    /// Timed out (or told to log out); terminal until re-armed.
    LoggedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEvent {
    WarningShown { seconds_left: i64 },
    CountdownTick { seconds_left: i64 },
    WarningDismissed,
    TimedOut,
}

pub struct InactivityMonitor {
    inactivity_timeout: Duration,
    warning_lead: Duration,
    state: MonitorState,
    last_activity: DateTime<Utc>,
    /// Last countdown value emitted, so each second ticks exactly once.
    last_countdown: Option<i64>,
}

impl InactivityMonitor {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            inactivity_timeout: config.inactivity_timeout,
            warning_lead: config.warning_lead,
            state: MonitorState::Disarmed,
            last_activity: DateTime::<Utc>::MIN_UTC,
            last_countdown: None,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Start watching. Only meaningful while a session is active.
    pub fn arm(&mut self, now: DateTime<Utc>) {
        self.state = MonitorState::Idle;
        self.last_activity = now;
        self.last_countdown = None;
    }

    /// Stop watching and forget all timer state.
    pub fn disarm(&mut self) {
        self.state = MonitorState::Disarmed;
        self.last_countdown = None;
    }

    /// Feed an observed interaction. Dismisses a visible warning and resets
    /// both timers; returns the dismissal event when one happened.
    pub fn record_activity(&mut self, kind: Activity, now: DateTime<Utc>) -> Option<MonitorEvent> {
        if !kind.resets_timers() {
            return None;
        }
        match self.state {
            MonitorState::Disarmed | MonitorState::LoggedOut => None,
            MonitorState::Idle => {
                self.last_activity = now;
                None
            }
            MonitorState::Warning => {
                self.last_activity = now;
                self.state = MonitorState::Idle;
                self.last_countdown = None;
                Some(MonitorEvent::WarningDismissed)
            }
        }
    }

    /// The "stay logged in" button: equivalent to an activity event.
    pub fn stay_logged_in(&mut self, now: DateTime<Utc>) -> Option<MonitorEvent> {
        self.record_activity(Activity::Click, now)
    }

    /// The "logout now" button: skip the remaining countdown. The caller is
    /// expected to invoke the actual logout.
    pub fn logout_now(&mut self) {
        self.state = MonitorState::LoggedOut;
        self.last_countdown = None;
    }

    /// Advance the machine to `now`, returning at most one event.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<MonitorEvent> {
        match self.state {
            MonitorState::Disarmed | MonitorState::LoggedOut => None,
            MonitorState::Idle => {
                let idle = now - self.last_activity;
                if idle >= self.inactivity_timeout {
                    self.state = MonitorState::LoggedOut;
                    return Some(MonitorEvent::TimedOut);
                }
                if idle >= self.inactivity_timeout - self.warning_lead {
                    self.state = MonitorState::Warning;
                    let seconds_left = self.seconds_left(now);
                    self.last_countdown = Some(seconds_left);
                    return Some(MonitorEvent::WarningShown { seconds_left });
                }
                None
            }
            MonitorState::Warning => {
                let idle = now - self.last_activity;
                if idle >= self.inactivity_timeout {
                    self.state = MonitorState::LoggedOut;
                    self.last_countdown = None;
                    return Some(MonitorEvent::TimedOut);
                }
                let seconds_left = self.seconds_left(now);
                if self.last_countdown != Some(seconds_left) {
                    self.last_countdown = Some(seconds_left);
                    return Some(MonitorEvent::CountdownTick { seconds_left });
                }
                None
            }
        }
    }

    /// Whole seconds until auto-logout, rounded up.
    fn seconds_left(&self, now: DateTime<Utc>) -> i64 {
        let left_ms = (self.inactivity_timeout - (now - self.last_activity)).num_milliseconds();
        ((left_ms + 999) / 1000).max(0)
    }

    /// Seconds of idle time left before auto-logout, for status displays.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        match self.state {
            MonitorState::Disarmed | MonitorState::LoggedOut => 0,
            _ => self.seconds_left(now),
        }
    }
}

/// Driver wrapping the state machine in a periodic tokio task.
///
/// Events surface on the returned channel; when the machine times out the
/// driver waits `logout_notice_delay` (so the notice can render) and then
/// invokes the manager's logout. Dropping the handle aborts the driver.
pub struct MonitorHandle {
    monitor: Arc<Mutex<InactivityMonitor>>,
    manager: Arc<AuthManager>,
    clock: Arc<dyn Clock>,
    driver: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn spawn(
        manager: Arc<AuthManager>,
        clock: Arc<dyn Clock>,
        config: &AuthConfig,
    ) -> (Self, mpsc::Receiver<MonitorEvent>) {
        let monitor = Arc::new(Mutex::new({
            let mut machine = InactivityMonitor::new(config);
            machine.arm(clock.now());
            machine
        }));
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let notice_delay = config.logout_notice_delay;

        let driver = tokio::spawn({
            let monitor = Arc::clone(&monitor);
            let manager = Arc::clone(&manager);
            let clock = Arc::clone(&clock);
            async move {
                let mut ticker = tokio::time::interval(TICK_INTERVAL);
                loop {
                    ticker.tick().await;

                    // A leaked driver must never fire against a session it
                    // no longer watches.
                    if !manager.require_auth() {
                        monitor.lock().unwrap().disarm();
                        debug!("Session gone, inactivity monitor stopping");
                        break;
                    }

                    let event = { monitor.lock().unwrap().poll(clock.now()) };
                    let Some(event) = event else { continue };

                    let timed_out = matches!(event, MonitorEvent::TimedOut);
                    let _ = tx.send(event).await;

                    if timed_out {
                        // Give the notice a moment to render before tearing
                        // the session down.
                        tokio::time::sleep(notice_delay).await;
                        if let Err(e) = manager.logout().await {
                            warn!(error = %e, "Auto-logout failed");
                        }
                        break;
                    }
                }
            }
        });

        (
            Self {
                monitor,
                manager,
                clock,
                driver,
            },
            rx,
        )
    }

    /// Report an interaction observed by the UI.
    pub fn on_activity(&self, kind: Activity) -> Option<MonitorEvent> {
        self.monitor
            .lock()
            .unwrap()
            .record_activity(kind, self.clock.now())
    }

    /// The warning dialog's "stay logged in" action.
    pub fn stay_logged_in(&self) -> Option<MonitorEvent> {
        self.monitor.lock().unwrap().stay_logged_in(self.clock.now())
    }

    /// The warning dialog's "logout now" action: immediate, no grace.
    pub async fn logout_now(&self) -> Result<(), AuthError> {
        self.monitor.lock().unwrap().logout_now();
        self.driver.abort();
        self.manager.logout().await
    }

    pub fn remaining_secs(&self) -> i64 {
        self.monitor.lock().unwrap().remaining_secs(self.clock.now())
    }

    /// Tear the monitor down: abort the driver and disarm the machine.
    pub fn shutdown(&self) {
        self.driver.abort();
        self.monitor.lock().unwrap().disarm();
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.driver.abort();
    }
}
