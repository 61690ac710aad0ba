use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    errors::PartitionError,
    partitions::partition_models::GroupId,
    redis::{Client, CustomRedisError},
};

/// Mapping-like store for resolved group ids. A cached `None` means the
/// user has no group in that partition, which is different from a miss.
///
/// `get` answers both questions in one read: `Ok(None)` is a miss and
/// `Ok(Some(None))` is a cached "no group".
#[async_trait]
pub trait RequestCache {
    async fn get(&self, key: &str) -> Result<Option<Option<GroupId>>, PartitionError>;
    async fn set(&self, key: &str, group_id: Option<GroupId>) -> Result<(), PartitionError>;

    async fn contains(&self, key: &str) -> Result<bool, PartitionError> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Lives for a single request.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Option<GroupId>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Option<GroupId>>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl RequestCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Option<GroupId>>, PartitionError> {
        Ok(self.lock().get(key).copied())
    }

    async fn contains(&self, key: &str) -> Result<bool, PartitionError> {
        Ok(self.lock().contains_key(key))
    }

    async fn set(&self, key: &str, group_id: Option<GroupId>) -> Result<(), PartitionError> {
        self.lock().insert(key.to_string(), group_id);
        Ok(())
    }
}

/// Shares resolved group ids across requests through redis. Values are
/// stored as JSON so `null` survives the round trip.
pub struct RedisGroupCache {
    client: Arc<dyn Client + Send + Sync>,
    ttl_seconds: u64,
}

impl RedisGroupCache {
    pub fn new(client: Arc<dyn Client + Send + Sync>, ttl_seconds: u64) -> Self {
        RedisGroupCache {
            client,
            ttl_seconds,
        }
    }
}

#[async_trait]
impl RequestCache for RedisGroupCache {
    async fn get(&self, key: &str) -> Result<Option<Option<GroupId>>, PartitionError> {
        match self.client.get(key.to_string()).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(CustomRedisError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, group_id: Option<GroupId>) -> Result<(), PartitionError> {
        let serialized = serde_json::to_string(&group_id)?;
        self.client
            .set_ex(key.to_string(), serialized, self.ttl_seconds)
            .await?;
        Ok(())
    }
}
