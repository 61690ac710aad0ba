use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::time::timeout;

// group lookups sit on the request path, keep this tight
pub const DEFAULT_REDIS_TIMEOUT_MILLISECS: u64 = 100;

#[derive(Error, Debug, Clone)]
pub enum CustomRedisError {
    #[error("Not found in redis")]
    NotFound,
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Timeout error")]
    Timeout,
    #[error(transparent)]
    Redis(#[from] Arc<redis::RedisError>),
}

impl From<redis::RedisError> for CustomRedisError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            CustomRedisError::Timeout
        } else {
            CustomRedisError::Redis(Arc::new(err))
        }
    }
}

impl From<tokio::time::error::Elapsed> for CustomRedisError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        CustomRedisError::Timeout
    }
}

/// A simple redis wrapper, covering the handful of commands the
/// tag store and the group cache need.
#[async_trait]
pub trait Client {
    async fn get(&self, k: String) -> Result<String, CustomRedisError>;
    async fn set(&self, k: String, v: String) -> Result<(), CustomRedisError>;
    async fn set_ex(&self, k: String, v: String, ttl_seconds: u64)
        -> Result<(), CustomRedisError>;
}

pub struct RedisClient {
    client: redis::Client,
    timeout: Duration,
}

impl RedisClient {
    pub fn new(addr: String) -> Result<RedisClient, CustomRedisError> {
        Self::with_timeout(addr, Duration::from_millis(DEFAULT_REDIS_TIMEOUT_MILLISECS))
    }

    pub fn with_timeout(addr: String, timeout: Duration) -> Result<RedisClient, CustomRedisError> {
        let client = redis::Client::open(addr)?;

        Ok(RedisClient { client, timeout })
    }
}

#[async_trait]
impl Client for RedisClient {
    async fn get(&self, k: String) -> Result<String, CustomRedisError> {
        let mut conn = self.client.get_async_connection().await?;

        let results = conn.get::<String, Option<String>>(k);
        let fut = timeout(self.timeout, results).await??;

        fut.ok_or(CustomRedisError::NotFound)
    }

    async fn set(&self, k: String, v: String) -> Result<(), CustomRedisError> {
        let mut conn = self.client.get_async_connection().await?;

        let results = conn.set::<String, String, ()>(k, v);
        timeout(self.timeout, results).await??;

        Ok(())
    }

    async fn set_ex(
        &self,
        k: String,
        v: String,
        ttl_seconds: u64,
    ) -> Result<(), CustomRedisError> {
        let mut conn = self.client.get_async_connection().await?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(k).arg(v).arg("EX").arg(ttl_seconds);
        let results = cmd.query_async::<_, ()>(&mut conn);
        timeout(self.timeout, results).await??;

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRedisCall {
    pub op: String,
    pub key: String,
    pub value: Option<String>,
}

/// In-memory stand-in for redis. Values written with `set` are readable
/// with `get`, and `get_ret` forces a specific response for a key.
#[derive(Clone, Default)]
pub struct MockRedisClient {
    store: Arc<Mutex<HashMap<String, String>>>,
    get_ret: HashMap<String, Result<String, CustomRedisError>>,
    set_ret: HashMap<String, Result<(), CustomRedisError>>,
    calls: Arc<Mutex<Vec<MockRedisCall>>>,
}

impl MockRedisClient {
    pub fn new() -> MockRedisClient {
        Self::default()
    }

    pub fn get_ret(&mut self, key: &str, ret: Result<String, CustomRedisError>) -> Self {
        self.get_ret.insert(key.to_owned(), ret);
        self.clone()
    }

    pub fn set_ret(&mut self, key: &str, ret: Result<(), CustomRedisError>) -> Self {
        self.set_ret.insert(key.to_owned(), ret);
        self.clone()
    }

    pub fn get_calls(&self) -> Vec<MockRedisCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_for(&self, op: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.op == op).count()
    }

    fn record(&self, op: &str, key: &str, value: Option<&str>) {
        lock(&self.calls).push(MockRedisCall {
            op: op.to_string(),
            key: key.to_string(),
            value: value.map(str::to_string),
        });
    }

    fn write(&self, op: &str, k: String, v: String) -> Result<(), CustomRedisError> {
        self.record(op, &k, Some(&v));
        if let Some(ret) = self.set_ret.get(&k) {
            ret.clone()?;
        }
        lock(&self.store).insert(k, v);
        Ok(())
    }
}

// a poisoned lock only means another test thread panicked
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl Client for MockRedisClient {
    async fn get(&self, k: String) -> Result<String, CustomRedisError> {
        self.record("get", &k, None);
        if let Some(ret) = self.get_ret.get(&k) {
            return ret.clone();
        }
        lock(&self.store)
            .get(&k)
            .cloned()
            .ok_or(CustomRedisError::NotFound)
    }

    async fn set(&self, k: String, v: String) -> Result<(), CustomRedisError> {
        self.write("set", k, v)
    }

    async fn set_ex(
        &self,
        k: String,
        v: String,
        _ttl_seconds: u64,
    ) -> Result<(), CustomRedisError> {
        self.write("set_ex", k, v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client_reads_back_writes() {
        let client = MockRedisClient::new();

        client
            .set("key".to_string(), "value".to_string())
            .await
            .unwrap();
        assert_eq!(client.get("key".to_string()).await.unwrap(), "value");

        assert!(matches!(
            client.get("other".to_string()).await,
            Err(CustomRedisError::NotFound)
        ));
        assert_eq!(client.calls_for("get"), 2);
    }

    #[tokio::test]
    async fn test_mock_client_returns_injected_errors() {
        let client = MockRedisClient::new()
            .get_ret("broken", Err(CustomRedisError::Timeout))
            .set_ret("broken", Err(CustomRedisError::Timeout));

        assert!(matches!(
            client.get("broken".to_string()).await,
            Err(CustomRedisError::Timeout)
        ));
        assert!(client
            .set("broken".to_string(), "1".to_string())
            .await
            .is_err());
        assert_eq!(client.get_calls().len(), 2);
    }
}
