//! Cache backends for the catalog
//!
//! Values are opaque JSON strings; key naming belongs to the coordinator.

use std::{num::NonZeroUsize, sync::Arc};

use async_trait::async_trait;
use lru::LruCache;
use redis::{AsyncCommands, Client};
use tokio::sync::Mutex;

use crate::{
    config::{CacheBackend, CacheConfig, RedisConfig},
    error::{AppError, AppResult},
};

/// Basic key/value cache operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookCache: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> AppResult<()>;

    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Drop every entry owned by this cache
    async fn clear(&self) -> AppResult<()>;
}

/// Build the backend selected in configuration
pub async fn connect(cache: &CacheConfig, redis: &RedisConfig) -> AppResult<Arc<dyn BookCache>> {
    match cache.backend {
        CacheBackend::Memory => {
            tracing::info!("Using in-memory cache ({} entries max)", cache.max_entries);
            Ok(Arc::new(MemoryCache::new(cache.max_entries)))
        }
        CacheBackend::Redis => {
            let backend = RedisCache::new(&redis.url, &cache.key_prefix).await?;
            tracing::info!("Connected to Redis cache");
            Ok(Arc::new(backend))
        }
    }
}

/// In-process cache with LRU eviction
#[derive(Debug, Clone)]
pub struct MemoryCache {
    entries: Arc<Mutex<LruCache<String, String>>>,
}

impl MemoryCache {
    /// A zero bound is treated as one entry
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl BookCache for MemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.entries
            .lock()
            .await
            .put(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.entries.lock().await.pop(key);
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        self.entries.lock().await.clear();
        Ok(())
    }
}

/// Redis-backed cache. Entries never expire; they are only evicted on write.
#[derive(Clone)]
pub struct RedisCache {
    client: Client,
    namespace: String,
}

impl RedisCache {
    /// Create a new Redis cache and check the server answers
    pub async fn new(url: &str, namespace: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Cache(format!("Failed to create Redis client: {}", e)))?;

        // Test connection
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Cache(format!("Failed to connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Cache(format!("Redis connection test failed: {}", e)))?;

        Ok(Self {
            client,
            namespace: namespace.to_string(),
        })
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Cache(format!("Failed to get Redis connection: {}", e)))
    }
}

#[async_trait]
impl BookCache for RedisCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to read {} from Redis: {}", key, e)))
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let mut conn = self.connection().await?;
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to store {} in Redis: {}", key, e)))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to delete {} from Redis: {}", key, e)))
    }

    async fn clear(&self) -> AppResult<()> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}:*", self.namespace);
        let keys: Vec<String> = conn
            .keys::<_, Vec<String>>(&pattern)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to list {} in Redis: {}", pattern, e)))?;

        if !keys.is_empty() {
            conn.del::<_, ()>(keys)
                .await
                .map_err(|e| AppError::Cache(format!("Failed to clear Redis cache: {}", e)))?;
        }
        Ok(())
    }
}
