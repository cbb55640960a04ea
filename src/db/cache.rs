use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::error::AppResult;

/// Namespaced cache keys. One `Display` implementation is the single source
/// of truth for key formats, so no two code paths can drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Day-stable mood snapshot, keyed by a structured fingerprint string.
    MoodSnapshot(String),
    /// Admin pin overrides, one map for all moods.
    PinOverrides,
    /// Admin soft-keyword overrides, one map for all moods.
    KeywordOverrides,
    Trending,
    NowPlaying { region: String, page: String },
    StreamingTrending { region: String, providers: String, types: String, page: String },
    ProviderCatalog(String),
    PersonMovies(String),
    MovieDetail { id: u64, region: String },
    /// Upstream API usage counter for a calendar period (e.g. "2026-08").
    ApiUsage(String),
}

/// Key prefix shared by every mood snapshot entry; purges scan on it.
pub const MOOD_SNAPSHOT_PREFIX: &str = "mood:snap:";

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::MoodSnapshot(fp) => write!(f, "{}{}", MOOD_SNAPSHOT_PREFIX, fp),
            CacheKey::PinOverrides => write!(f, "mood:pins:overrides"),
            CacheKey::KeywordOverrides => write!(f, "mood:keywords:overrides"),
            CacheKey::Trending => write!(f, "tmdb:trending:movie:week"),
            CacheKey::NowPlaying { region, page } => {
                write!(f, "tmdb:now_playing:{}:p{}", region, page)
            }
            CacheKey::StreamingTrending { region, providers, types, page } => {
                write!(f, "tmdb:streaming:{}:{}:{}:p{}", region, providers, types, page)
            }
            CacheKey::ProviderCatalog(region) => write!(f, "tmdb:providers:movie:{}", region),
            CacheKey::PersonMovies(query) => {
                write!(f, "tmdb:person_movies:{}", query.to_lowercase())
            }
            CacheKey::MovieDetail { id, region } => {
                write!(f, "tmdb:movie:{}:detail:{}", id, region)
            }
            CacheKey::ApiUsage(period) => write!(f, "api_usage:{}", period),
        }
    }
}

/// Creates a Redis client for caching
///
/// Establishes a connection to Redis for fast data caching.
/// Uses connection pooling via the connection-manager feature.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous cache writes
enum CacheWrite {
    SetEx { key: String, value: String, ttl: u64 },
    IncrExpire { key: String, ttl: i64 },
}

/// Cache handler for storing and retrieving data from Redis
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWrite>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    /// Initiates a graceful shutdown of the cache writer
    ///
    /// Sends a shutdown signal to the writer task and waits for it to flush
    /// all pending writes to Redis.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
    }
}

impl Cache {
    /// Creates a new Cache instance with an async write background task
    ///
    /// This spawns a background task that processes cache writes asynchronously,
    /// preventing cache operations from blocking API responses.
    pub async fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        // Spawn background task to process cache writes
        let client = redis_client.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let cache = Self {
            redis_client,
            write_tx,
        };

        let handle = CacheWriterHandle { shutdown_tx };

        (cache, handle)
    }

    /// Background task that processes cache write messages
    ///
    /// Continuously receives cache write requests from the channel and writes them
    /// to Redis. On shutdown signal, flushes all remaining messages before exiting.
    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWrite>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                // Process write messages
                Some(msg) = write_rx.recv() => {
                    if let Err(e) = Self::write_to_redis(&client, msg).await {
                        tracing::error!(error = %e, "Failed to write to Redis cache");
                    }
                }
                // Shutdown signal received
                _ = shutdown_rx.recv() => {
                    tracing::info!("Cache writer shutting down, flushing remaining writes");

                    // Flush all remaining messages
                    while let Ok(msg) = write_rx.try_recv() {
                        if let Err(e) = Self::write_to_redis(&client, msg).await {
                            tracing::error!(error = %e, "Failed to flush cache write during shutdown");
                        }
                    }

                    tracing::info!("Cache writer task stopped");
                    break;
                }
            }
        }
    }

    /// Writes a single message to Redis
    async fn write_to_redis(client: &Client, msg: CacheWrite) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        match msg {
            CacheWrite::SetEx { key, value, ttl } => {
                let _: () = conn.set_ex(key, value, ttl).await?;
            }
            CacheWrite::IncrExpire { key, ttl } => {
                let _: () = conn.incr(&key, 1).await?;
                let _: () = conn.expire(&key, ttl).await?;
            }
        }
        Ok(())
    }

    /// Retrieves a value from the cache by key
    ///
    /// This function attempts to retrieve a cached value associated with the given key.
    /// If the key exists in the cache, the value is deserialized and returned.
    /// If the key does not exist, `None` is returned.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(format!("{}", key)).await?;

        match cached {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Stores a value in the cache asynchronously without blocking
    ///
    /// This function serializes the value and sends it to a background worker
    /// via a channel. The actual Redis write happens asynchronously, so this
    /// method returns immediately without waiting for the write to complete.
    ///
    /// Use this method when you don't need confirmation that the write succeeded
    /// and want to maximize API response performance.
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let msg = CacheWrite::SetEx {
            key: format!("{}", key),
            value: json,
            ttl,
        };

        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, "Failed to send cache write message");
        }
    }

    /// Stores a value synchronously, confirming the write landed.
    ///
    /// Override writes and snapshot refreshes go through here so the change
    /// is visible to the very next request.
    pub async fn set<T: serde::Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: u64,
    ) -> AppResult<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(format!("Cache serialization error: {}", e)))?;
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(format!("{}", key), json, ttl).await?;
        Ok(())
    }

    /// Deletes a single key; returns whether it existed.
    pub async fn delete(&self, key: &CacheKey) -> AppResult<bool> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let deleted: usize = conn.del(format!("{}", key)).await?;
        Ok(deleted > 0)
    }

    /// Deletes every key matching a glob pattern via SCAN. Best-effort:
    /// intended for admin purges, not hot paths.
    pub async fn purge_pattern(&self, pattern: &str) -> AppResult<usize> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let keys: Vec<String> = {
            let mut iter = conn.scan_match::<_, String>(pattern).await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        let mut deleted = 0usize;
        for key in &keys {
            deleted += conn.del::<_, usize>(key).await.unwrap_or(0);
        }
        Ok(deleted)
    }

    /// Drops the whole database. Fallback for backends where SCAN purging
    /// is unavailable or failing.
    pub async fn flush_all(&self) -> AppResult<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        Ok(())
    }

    /// Increments a counter with an expiry, off the request path.
    pub fn incr_in_background(&self, key: &CacheKey, ttl: i64) {
        let msg = CacheWrite::IncrExpire {
            key: format!("{}", key),
            ttl,
        };
        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, "Failed to send cache incr message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_display_snapshot() {
        let key = CacheKey::MoodSnapshot("strict:feelgood:GB:-:flatrate,ads,free:f0".to_string());
        assert_eq!(
            format!("{}", key),
            "mood:snap:strict:feelgood:GB:-:flatrate,ads,free:f0"
        );
    }

    #[test]
    fn test_cache_key_display_overrides() {
        assert_eq!(format!("{}", CacheKey::PinOverrides), "mood:pins:overrides");
        assert_eq!(
            format!("{}", CacheKey::KeywordOverrides),
            "mood:keywords:overrides"
        );
    }

    #[test]
    fn test_cache_key_display_person_movies_lowercases() {
        let key = CacheKey::PersonMovies("Anne Hathaway".to_string());
        assert_eq!(format!("{}", key), "tmdb:person_movies:anne hathaway");
    }

    #[test]
    fn test_cache_key_display_movie_detail() {
        let key = CacheKey::MovieDetail { id: 603, region: "IE".to_string() };
        assert_eq!(format!("{}", key), "tmdb:movie:603:detail:IE");
    }

    #[test]
    fn test_cache_key_display_streaming_trending() {
        let key = CacheKey::StreamingTrending {
            region: "GB".to_string(),
            providers: "8|337".to_string(),
            types: "flatrate".to_string(),
            page: "2".to_string(),
        };
        assert_eq!(format!("{}", key), "tmdb:streaming:GB:8|337:flatrate:p2");
    }

    #[test]
    fn test_snapshot_keys_share_purge_prefix() {
        let key = CacheKey::MoodSnapshot("strict:chill:GB:-:flatrate:f0".to_string());
        assert!(format!("{}", key).starts_with(MOOD_SNAPSHOT_PREFIX));
    }
}
