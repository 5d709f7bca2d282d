//! Key-value store clients for the hosted TravelBook data store.
//!
//! This module provides the `KvStore` command interface consumed by the
//! credential, lockout, and session layers, plus two implementations:
//!
//! - `RestKvStore`: forwards commands to the credential-hiding proxy in
//!   front of the hosted Redis instance
//! - `MemoryKvStore`: in-process store for local development and tests
//!
//! All values are opaque strings; callers JSON-encode structured records
//! themselves.

pub mod error;
pub mod memory;
pub mod rest;

pub use error::StoreError;
pub use memory::MemoryKvStore;
pub use rest::RestKvStore;

use std::collections::HashMap;

use async_trait::async_trait;

/// The command set the auth core needs from the store.
///
/// Implementations are selected at construction time; nothing in the core
/// branches on the backend per call.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn del(&self, key: &str) -> Result<(), StoreError>;

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;
    async fn hdel(&self, key: &str, field: &str) -> Result<(), StoreError>;

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;
    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError>;
}
