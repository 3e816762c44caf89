use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Default TTLs (seconds). The TTL is the correctness backstop for any key
/// the invalidation pass misses.
pub const AVAILABILITY_TTL_SECS: u64 = 60;
pub const LISTING_TTL_SECS: u64 = 300;
pub const DETAIL_TTL_SECS: u64 = 600;

/// Redis-backed response cache. Every failure degrades to a cache miss so the
/// read path never depends on Redis being reachable.
#[derive(Clone)]
pub struct CacheStore {
    pool: Option<Pool>,
}

impl CacheStore {
    pub fn new(redis_url: Option<&str>) -> Self {
        let pool = match redis_url {
            Some(url) => match Config::from_url(url).create_pool(Some(Runtime::Tokio1)) {
                Ok(pool) => {
                    info!("Response cache initialized");
                    Some(pool)
                }
                Err(e) => {
                    warn!("Failed to create Redis pool, caching disabled: {}", e);
                    None
                }
            },
            None => {
                info!("REDIS_URL not set, response caching disabled");
                None
            }
        };

        Self { pool }
    }

    pub fn disabled() -> Self {
        Self { pool: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    pub async fn get_json(&self, key: &str) -> Option<Value> {
        let mut conn = self.connection().await?;

        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!("Cache hit: {}", key);
                    Some(value)
                }
                Err(e) => {
                    warn!("Discarding undecodable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    pub async fn put_json(&self, key: &str, value: &Value, ttl_secs: u64) {
        let Some(mut conn) = self.connection().await else {
            return;
        };

        let raw = value.to_string();
        if let Err(e) = conn.set_ex::<_, _, ()>(key, raw, ttl_secs).await {
            warn!("Cache write failed for {}: {}", key, e);
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), redis::RedisError> {
        let Some(pool) = &self.pool else {
            return Ok(());
        };

        let mut conn = pool.get().await.map_err(|e| {
            redis::RedisError::from((
                redis::ErrorKind::IoError,
                "Failed to get Redis connection",
                e.to_string(),
            ))
        })?;

        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn connection(&self) -> Option<Connection> {
        let pool = self.pool.as_ref()?;
        match pool.get().await {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!("Failed to get Redis connection: {}", e);
                None
            }
        }
    }
}
