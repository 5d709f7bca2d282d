//! Core auth and session library for the TravelBook admin.
//!
//! The admin back-office is a static site over a hosted key-value store;
//! this crate is the part with actual behavior: who is signed in, for how
//! long, on which device, and what happens when they walk away. The UI
//! layers (login form, admin tables, package forms) are thin data-binding
//! glue over the types exported here.
//!
//! - `store`: the key-value command interface and its REST / in-memory
//!   backends
//! - `auth`: credential records, lockout policy, sessions, the
//!   active-session registry, and the `AuthManager` service object
//! - `inactivity`: the auto-logout state machine and its timer driver
//! - `clock`, `config`, `error`: the seams everything above shares
//!
//! Typical wiring:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use travelbook_core::{AuthConfig, AuthManager, RestKvStore};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let store = Arc::new(RestKvStore::new("https://travelbook.example")?);
//! let config = AuthConfig::default();
//! let manager = Arc::new(AuthManager::new(
//!     store,
//!     config,
//!     AuthConfig::default_cache_dir()?,
//! ));
//! manager.init();
//!
//! if manager.require_auth() {
//!     let mut notices = Arc::clone(&manager).start_revalidation();
//!     // hand `notices` to the UI loop; arm the inactivity monitor
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod inactivity;
pub mod store;

pub use auth::{
    ActiveSessionEntry, AuthManager, AuthOutcome, CredentialStore, Lockout, LockoutPolicy,
    NewUser, PublicUser, Role, Session, SessionCache, SessionNotice, SessionRegistry, User,
};
pub use clock::{Clock, SystemClock};
pub use config::AuthConfig;
pub use error::{AuthError, LockoutTier};
pub use inactivity::{Activity, InactivityMonitor, MonitorEvent, MonitorHandle, MonitorState};
pub use store::{KvStore, MemoryKvStore, RestKvStore, StoreError};
