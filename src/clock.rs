//! Time source abstraction.
//!
//! All expiry, lockout, and inactivity logic reads the current time through
//! the `Clock` trait so tests can drive state transitions with a controllable
//! clock instead of sleeping on wall-clock timers.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time. The default for production use.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
