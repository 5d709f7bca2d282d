//! Error taxonomy for the auth core.
//!
//! Every public operation returns a typed `Result` whose error renders
//! directly as a short user-facing message. The wording is deliberate:
//! unknown usernames, inactive accounts, and wrong passwords all produce the
//! same `InvalidCredentials` text so a caller cannot probe which usernames
//! exist, and lockout messages state the tier duration without confirming
//! the account.

use thiserror::Error;

use crate::store::StoreError;

/// Which progressive-lockout tier an account tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutTier {
    Short,
    Extended,
}

fn lockout_text(tier: &LockoutTier, minutes: &i64) -> String {
    match tier {
        LockoutTier::Short => format!(
            "Account is temporarily locked for {minutes} minutes due to failed login attempts. \
             It will unlock automatically. Please try again later."
        ),
        LockoutTier::Extended => format!(
            "Account is locked for {minutes} minutes due to excessive failed login attempts. \
             It will unlock automatically. Please try again later."
        ),
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("{}", lockout_text(.tier, .minutes))]
    AccountLocked { tier: LockoutTier, minutes: i64 },

    #[error("Username already exists")]
    DuplicateUsername,

    #[error("User not found")]
    NotFound,

    #[error("Storage service is unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("Stored record is malformed: {0}")]
    MalformedRecord(String),

    #[error("Session has expired")]
    SessionExpired,

    #[error("Session has been signed out from another device")]
    SessionSuperseded,
}
