//! REST client for the store proxy.
//!
//! The hosted Redis instance is never reached directly from the browser
//! context; a set of stateless proxy endpoints (one per command) attaches
//! the provider credentials server-side and answers with a uniform
//! `{success, result | message}` envelope. This client speaks that envelope.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{KvStore, StoreError};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// Store commands are tiny; anything slower than 10s should fail fast so the
/// caller can fall back to its local cache.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 500;

#[derive(Debug, Serialize)]
struct CommandRequest<'a> {
    command: &'a str,
    args: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Store client backed by the proxy endpoints.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct RestKvStore {
    client: reqwest::Client,
    base_url: String,
}

impl RestKvStore {
    /// Create a client for the proxy at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Send one command, retrying on rate limiting.
    async fn command(&self, command: &str, args: &[&str]) -> Result<Value, StoreError> {
        let url = format!("{}/api/{}", self.base_url, command);
        let body = CommandRequest { command, args };

        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self.client.post(&url).json(&body).send().await?;

            let status = response.status();
            if status.as_u16() == 429 {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(StoreError::RateLimited);
                }
                warn!(command, retry = retries, backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2;
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(StoreError::from_status(status, &text));
            }

            let envelope: Envelope = response
                .json()
                .await
                .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;

            if !envelope.success {
                let message = envelope
                    .message
                    .unwrap_or_else(|| "unknown store error".to_string());
                return Err(StoreError::Rejected(message));
            }

            debug!(command, "Store command ok");
            return Ok(envelope.result.unwrap_or(Value::Null));
        }
    }
}

/// Convert a scalar result to an optional string.
/// The store answers `null` for missing keys and plain strings otherwise;
/// numeric replies (command acknowledgements) are rendered as their digits.
fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Decode an HGETALL reply into field/value pairs.
/// The proxy answers either the flattened `[field, value, ...]` array the
/// provider uses or an already-assembled object; both shapes are accepted.
fn decode_hgetall(value: Value) -> Result<HashMap<String, String>, StoreError> {
    match value {
        Value::Null => Ok(HashMap::new()),
        Value::Object(map) => Ok(map
            .into_iter()
            .filter_map(|(field, v)| scalar_to_string(v).map(|v| (field, v)))
            .collect()),
        Value::Array(items) => {
            if items.len() % 2 != 0 {
                return Err(StoreError::InvalidResponse(
                    "odd-length hgetall reply".to_string(),
                ));
            }
            let mut fields = HashMap::with_capacity(items.len() / 2);
            let mut iter = items.into_iter();
            while let (Some(field), Some(v)) = (iter.next(), iter.next()) {
                match (scalar_to_string(field), scalar_to_string(v)) {
                    (Some(field), Some(v)) => {
                        fields.insert(field, v);
                    }
                    _ => warn!("Skipping hgetall pair with null field or value"),
                }
            }
            Ok(fields)
        }
        other => Err(StoreError::InvalidResponse(format!(
            "unexpected hgetall reply: {other}"
        ))),
    }
}

fn decode_members(value: Value) -> Result<Vec<String>, StoreError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.into_iter().filter_map(scalar_to_string).collect()),
        other => Err(StoreError::InvalidResponse(format!(
            "unexpected smembers reply: {other}"
        ))),
    }
}

#[async_trait]
impl KvStore for RestKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(scalar_to_string(self.command("get", &[key]).await?))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.command("set", &[key, value]).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.command("del", &[key]).await?;
        Ok(())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.command("hset", &[key, field, value]).await?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        Ok(scalar_to_string(self.command("hget", &[key, field]).await?))
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        decode_hgetall(self.command("hgetall", &[key]).await?)
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<(), StoreError> {
        self.command("hdel", &[key, field]).await?;
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.command("sadd", &[key, member]).await?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        decode_members(self.command("smembers", &[key]).await?)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.command("srem", &[key, member]).await?;
        Ok(())
    }
}
