use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db::{Cache, CacheKey, MOOD_SNAPSHOT_PREFIX},
    error::AppResult,
    models::MovieSummary,
    services::tmdb::{TmdbClient, MAX_SNAPSHOT_PAGES},
};

use super::discover::DiscoverFilters;

/// A day-stable aggregated discover result for one fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub results: Vec<MovieSummary>,
    pub total_results: usize,
    pub fetched_at: DateTime<Utc>,
}

/// Structured snapshot identity. Every parameter that changes result
/// content is part of the fingerprint, so two requests differing in any of
/// them never share a cache entry. One format, one code path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFingerprint {
    pub bucket: &'static str,
    pub mood: String,
    pub region: String,
    pub providers: String,
    pub monetization: String,
    pub filter_tag: String,
}

impl SnapshotFingerprint {
    pub fn new(
        bucket: &'static str,
        mood: &str,
        region: &str,
        providers: &str,
        monetization: &str,
        filters: &DiscoverFilters,
    ) -> Self {
        Self {
            bucket,
            mood: mood.to_string(),
            region: region.to_string(),
            providers: providers.to_string(),
            monetization: monetization.to_string(),
            filter_tag: filters.fingerprint_tag(),
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        let providers = if self.providers.is_empty() {
            "-"
        } else {
            self.providers.as_str()
        };
        CacheKey::MoodSnapshot(format!(
            "{}:{}:{}:{}:{}:{}",
            self.bucket, self.mood, self.region, providers, self.monetization, self.filter_tag
        ))
    }
}

/// Seconds until the next UTC midnight, when day-stable snapshots expire.
pub fn seconds_until_utc_midnight(now: DateTime<Utc>) -> u64 {
    let next_midnight = now
        .date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0));
    match next_midnight {
        Some(midnight) => (midnight - now.naive_utc()).num_seconds().max(1) as u64,
        None => 86_400,
    }
}

pub fn midnight_ttl_seconds() -> u64 {
    seconds_until_utc_midnight(Utc::now())
}

/// Per-fingerprint cached discover aggregates. Get-or-build is best-effort
/// at-most-one-build: a stampede on a fresh fingerprint may fetch twice,
/// and the idempotent write makes that harmless.
#[derive(Clone)]
pub struct SnapshotStore {
    cache: Cache,
    tmdb: TmdbClient,
}

impl SnapshotStore {
    pub fn new(cache: Cache, tmdb: TmdbClient) -> Self {
        Self { cache, tmdb }
    }

    pub async fn get_or_build(
        &self,
        fingerprint: &SnapshotFingerprint,
        params: &[(&str, String)],
    ) -> AppResult<Snapshot> {
        let key = fingerprint.cache_key();
        if let Some(snapshot) = self.cache.get_from_cache::<Snapshot>(&key).await? {
            return Ok(snapshot);
        }
        tracing::debug!(key = %key, "Snapshot miss, building");
        self.build_and_store(&key, params).await
    }

    /// Unconditional rebuild, overwriting whatever is cached.
    pub async fn refresh(
        &self,
        fingerprint: &SnapshotFingerprint,
        params: &[(&str, String)],
    ) -> AppResult<Snapshot> {
        self.build_and_store(&fingerprint.cache_key(), params).await
    }

    async fn build_and_store(&self, key: &CacheKey, params: &[(&str, String)]) -> AppResult<Snapshot> {
        let results = self
            .tmdb
            .collect_discover_pages(params, MAX_SNAPSHOT_PAGES)
            .await?;
        let snapshot = Snapshot {
            total_results: results.len(),
            results,
            fetched_at: Utc::now(),
        };
        self.cache.set(key, &snapshot, midnight_ttl_seconds()).await?;
        Ok(snapshot)
    }

    pub async fn purge(&self, fingerprint: &SnapshotFingerprint) -> AppResult<bool> {
        self.cache.delete(&fingerprint.cache_key()).await
    }

    /// Drops every snapshot for one mood, across all buckets and filters.
    pub async fn purge_mood(&self, mood: &str) -> AppResult<usize> {
        self.cache
            .purge_pattern(&format!("{}*:{}:*", MOOD_SNAPSHOT_PREFIX, mood))
            .await
    }

    pub async fn purge_all(&self) -> AppResult<usize> {
        self.cache
            .purge_pattern(&format!("{}*", MOOD_SNAPSHOT_PREFIX))
            .await
    }
}
