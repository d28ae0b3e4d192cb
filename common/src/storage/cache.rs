use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands};
use tokio::{sync::Mutex, time::Instant};
use tracing::info;

use crate::{
    error::AppError,
    utils::{config::AppConfig, retry::RetryPolicy},
};

/// Exact-string answer cache with a fixed time-to-live per entry.
#[async_trait]
pub trait QueryCache: Send + Sync {
    async fn get(&self, query: &str) -> Result<Option<String>, AppError>;

    /// Stores `answer` under `query`. A zero `ttl` is rejected by every backend.
    async fn put(&self, query: &str, answer: &str, ttl: Duration) -> Result<(), AppError>;
}

fn ensure_positive_ttl(ttl: Duration) -> Result<(), AppError> {
    if ttl.is_zero() {
        Err(AppError::Validation("cache ttl must be positive".into()))
    } else {
        Ok(())
    }
}

pub async fn cache_from_config(config: &AppConfig) -> Result<Arc<dyn QueryCache>, AppError> {
    match config.redis_url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            let cache = RedisQueryCache::connect(url, config.retry_policy()).await?;
            info!("Query cache backed by redis");
            Ok(Arc::new(cache))
        }
        _ => {
            info!("Query cache kept in process memory");
            Ok(Arc::new(InMemoryQueryCache::new()))
        }
    }
}

struct CacheEntry {
    answer: String,
    expires_at: Instant,
}

/// Process-local cache. Expired entries are dropped when read and swept on every write.
#[derive(Default)]
pub struct InMemoryQueryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl InMemoryQueryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueryCache for InMemoryQueryCache {
    async fn get(&self, query: &str) -> Result<Option<String>, AppError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(query) {
            Some(entry) if now < entry.expires_at => Ok(Some(entry.answer.clone())),
            Some(_) => {
                entries.remove(query);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, query: &str, answer: &str, ttl: Duration) -> Result<(), AppError> {
        ensure_positive_ttl(ttl)?;
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .ok_or_else(|| AppError::Validation(format!("cache ttl {ttl:?} is out of range")))?;

        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            query.to_string(),
            CacheEntry {
                answer: answer.to_string(),
                expires_at,
            },
        );
        Ok(())
    }
}

/// Redis-backed cache; entries are written with `SETEX` so expiry is server-side.
pub struct RedisQueryCache {
    connection: MultiplexedConnection,
    retry: RetryPolicy,
}

impl RedisQueryCache {
    /// Opens a multiplexed connection to the Redis server at `redis_url`.
    pub async fn connect(redis_url: &str, retry: RetryPolicy) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_url)?;
        let connection = retry
            .run("cache_connect", || {
                let client = client.clone();
                async move { Ok(client.get_multiplexed_async_connection().await?) }
            })
            .await?;
        Ok(Self { connection, retry })
    }

    pub fn key(query: &str) -> String {
        format!("qa:{query}")
    }
}

#[async_trait]
impl QueryCache for RedisQueryCache {
    async fn get(&self, query: &str) -> Result<Option<String>, AppError> {
        let key = Self::key(query);
        self.retry
            .run("cache_get", || {
                let mut conn = self.connection.clone();
                let key = key.clone();
                async move {
                    let value: Option<String> = conn.get(key).await?;
                    Ok(value)
                }
            })
            .await
    }

    async fn put(&self, query: &str, answer: &str, ttl: Duration) -> Result<(), AppError> {
        ensure_positive_ttl(ttl)?;
        let key = Self::key(query);
        // SETEX takes whole seconds; round partial seconds up.
        let seconds = ttl.as_secs().saturating_add(u64::from(ttl.subsec_nanos() > 0));
        self.retry
            .run("cache_put", || {
                let mut conn = self.connection.clone();
                let key = key.clone();
                async move {
                    conn.set_ex::<_, _, ()>(key, answer, seconds).await?;
                    Ok(())
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(3600);

    #[tokio::test(start_paused = true)]
    async fn test_entry_is_a_hit_just_before_ttl_and_a_miss_just_after() {
        let cache = InMemoryQueryCache::new();
        cache
            .put("What are key SOX controls?", "Segregation of duties.", TTL)
            .await
            .expect("put");

        tokio::time::advance(TTL - Duration::from_millis(1)).await;
        assert_eq!(
            cache.get("What are key SOX controls?").await.expect("get"),
            Some("Segregation of duties.".to_string())
        );

        tokio::time::advance(Duration::from_millis(2)).await;
        assert_eq!(cache.get("What are key SOX controls?").await.expect("get"), None);
    }

    #[tokio::test]
    async fn test_keys_are_exact_strings() {
        let cache = InMemoryQueryCache::new();
        cache.put("SOX controls", "answer", TTL).await.expect("put");

        assert!(cache.get("SOX controls").await.expect("get").is_some());
        assert!(cache.get("sox controls").await.expect("get").is_none());
        assert!(cache.get("SOX  controls").await.expect("get").is_none());
        assert!(cache.get("SOX controls ").await.expect("get").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rewrite_restarts_ttl() {
        let cache = InMemoryQueryCache::new();
        cache.put("q", "first", TTL).await.expect("put");
        tokio::time::advance(Duration::from_secs(3000)).await;
        cache.put("q", "second", TTL).await.expect("put");
        tokio::time::advance(Duration::from_secs(3000)).await;

        assert_eq!(cache.get("q").await.expect("get"), Some("second".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_sweep_expired_entries() {
        let cache = InMemoryQueryCache::new();
        for i in 0..1000 {
            cache
                .put(&format!("question {i}"), "answer", TTL)
                .await
                .expect("put");
        }

        tokio::time::advance(TTL * 2).await;
        cache.put("fresh question", "answer", TTL).await.expect("put");

        let entries = cache.entries.lock().await;
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("fresh question"));
    }

    #[tokio::test]
    async fn test_rejects_zero_and_overflowing_ttl() {
        let cache = InMemoryQueryCache::new();

        assert!(matches!(
            cache.put("q", "a", Duration::ZERO).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            cache.put("q", "a", Duration::MAX).await,
            Err(AppError::Validation(_))
        ));
        assert!(cache.get("q").await.expect("get").is_none());
    }

    #[test]
    fn test_redis_key_prefix() {
        assert_eq!(RedisQueryCache::key("What is ICFR?"), "qa:What is ICFR?");
    }

    #[tokio::test]
    async fn test_config_without_redis_uses_memory_cache() {
        let cache = cache_from_config(&AppConfig::default()).await.expect("cache");
        cache.put("q", "a", TTL).await.expect("put");
        assert_eq!(cache.get("q").await.expect("get"), Some("a".into()));
    }
}
