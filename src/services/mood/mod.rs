pub mod discover;
pub mod gate;
pub mod overrides;
pub mod rank;
pub mod rules;
pub mod snapshot;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    db::Cache,
    error::{AppError, AppResult},
    services::tmdb::TmdbClient,
};

use discover::{
    build_discover_params, paginate, BucketSizes, DiscoverQuery, MoodDiscoverPage,
    WIDE_MONETIZATION,
};
use gate::{filter_by_providers, parse_provider_ids, passes_genre_gate};
use overrides::OverrideStore;
use rank::{apply_pins, rerank, RankContext};
use rules::{require_rule, MOODS};
use snapshot::{Snapshot, SnapshotFingerprint, SnapshotStore};

/// How many leading candidates get availability/certification enrichment.
const ENRICH_LIMIT: usize = 60;
/// Detail-lookup budget for the hard provider gate.
const PROVIDER_CHECK_LIMIT: usize = 60;
/// Debug payload shows only the head of the final ordering.
const PICKED_EXAMPLES: usize = 10;

const DEFAULT_SEED_KEYWORDS: usize = 15;

/// Mood discovery and its admin surface, glued together from the rule
/// table, the override store and the snapshot store.
#[derive(Clone)]
pub struct MoodService {
    tmdb: TmdbClient,
    cache: Cache,
    snapshots: SnapshotStore,
    overrides: OverrideStore,
}

impl MoodService {
    pub fn new(cache: Cache, tmdb: TmdbClient) -> Self {
        let snapshots = SnapshotStore::new(cache.clone(), tmdb.clone());
        let overrides = OverrideStore::new(cache.clone());
        Self {
            tmdb,
            cache,
            snapshots,
            overrides,
        }
    }

    pub fn overrides(&self) -> &OverrideStore {
        &self.overrides
    }

    /// The full discovery pipeline: snapshots, dedupe, genre gate,
    /// enrichment, optional provider gate, re-rank, pin injection,
    /// pagination.
    pub async fn discover(&self, mood_key: &str, query: &DiscoverQuery) -> AppResult<MoodDiscoverPage> {
        let rule = require_rule(mood_key)?;
        let req = query.normalize();

        // Provider-locked or broad requests widen monetization up front so
        // the strict bucket doesn't starve.
        let providers_selected = !req.providers.is_empty();
        let base_types = if req.broad || providers_selected {
            WIDE_MONETIZATION.to_string()
        } else {
            req.types.clone()
        };

        let strict_fp = SnapshotFingerprint::new(
            "strict",
            mood_key,
            &req.region,
            &req.providers,
            &base_types,
            &req.filters,
        );
        let wide_fp = SnapshotFingerprint::new(
            "strict_wide",
            mood_key,
            &req.region,
            &req.providers,
            WIDE_MONETIZATION,
            &req.filters,
        );

        let strict_params =
            build_discover_params(rule, &req.region, &req.providers, &base_types, &req.filters);
        let wide_params = build_discover_params(
            rule,
            &req.region,
            &req.providers,
            WIDE_MONETIZATION,
            &req.filters,
        );

        // One failed bucket degrades to the other; only a total miss with an
        // upstream error becomes the caller's problem.
        let mut fetch_error: Option<AppError> = None;
        let strict = self
            .bucket(&strict_fp, &strict_params, &mut fetch_error)
            .await;
        // when the strict bucket is already widened, the second bucket would
        // be the same query under another key
        let wide = if base_types == WIDE_MONETIZATION {
            None
        } else {
            self.bucket(&wide_fp, &wide_params, &mut fetch_error).await
        };

        let sizes = BucketSizes {
            strict: strict.as_ref().map_or(0, |s| s.results.len()),
            strict_wide: wide.as_ref().map_or(0, |s| s.results.len()),
        };

        let mut merged: Vec<_> = Vec::new();
        if let Some(snap) = strict {
            merged.extend(snap.results);
        }
        if let Some(snap) = wide {
            merged.extend(snap.results);
        }
        if merged.is_empty() {
            if let Some(err) = fetch_error {
                return Err(err);
            }
        }

        let mut seen = HashSet::new();
        let mut candidates: Vec<_> = merged
            .into_iter()
            .filter(|m| seen.insert(m.id))
            .filter(|m| passes_genre_gate(rule, m))
            .collect();

        // Enrich the head of the list with availability and certification
        // data; a failed lookup just leaves that candidate unenriched.
        for movie in candidates.iter_mut().take(ENRICH_LIMIT) {
            match self
                .tmdb
                .movie_detail(movie.id, "watch/providers,release_dates")
                .await
            {
                Ok(detail) => {
                    movie.watch_providers = detail.watch_providers;
                    movie.release_dates = detail.release_dates;
                }
                Err(e) => {
                    tracing::debug!(movie_id = movie.id, error = %e, "Enrichment fetch failed");
                }
            }
        }

        let wanted = parse_provider_ids(&req.providers);
        if providers_selected && req.force_providers {
            candidates =
                filter_by_providers(&self.tmdb, candidates, &req.region, &wanted, PROVIDER_CHECK_LIMIT)
                    .await;
        }

        let pins = self.overrides.effective_pins(mood_key).await?;
        let pinned: HashSet<u64> = pins.iter().copied().collect();
        let ctx = RankContext {
            rule,
            pinned: &pinned,
            region: &req.region,
            wanted_providers: &wanted,
            broad: req.broad,
        };
        let ranked = rerank(&ctx, candidates);
        let ordered = apply_pins(&self.tmdb, &pins, ranked, &req.region).await;

        let (results, total_pages, total_results) = paginate(&ordered, req.page);

        let mut page = MoodDiscoverPage {
            page: req.page,
            results,
            total_pages,
            total_results,
            debug_mood: None,
            debug_filters: None,
            debug_sizes: None,
            debug_picked_examples: None,
            debug_force_providers: None,
            debug_providers: None,
            debug_broad: None,
            debug_keywords: None,
        };
        if req.debug {
            page.debug_mood = Some(mood_key.to_string());
            page.debug_filters = Some(req.filters.clone());
            page.debug_sizes = Some(sizes);
            page.debug_picked_examples = Some(
                ordered
                    .iter()
                    .take(PICKED_EXAMPLES)
                    .map(|m| m.id)
                    .collect(),
            );
            page.debug_force_providers = Some(req.force_providers);
            page.debug_providers = Some(req.providers.clone());
            page.debug_broad = Some(req.broad);
            page.debug_keywords = Some(self.overrides.effective_keywords(mood_key).await?);
        }

        Ok(page)
    }

    async fn bucket(
        &self,
        fingerprint: &SnapshotFingerprint,
        params: &[(&str, String)],
        fetch_error: &mut Option<AppError>,
    ) -> Option<Snapshot> {
        match self.snapshots.get_or_build(fingerprint, params).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(key = %fingerprint.cache_key(), error = %e, "Snapshot bucket unavailable");
                if fetch_error.is_none() {
                    *fetch_error = Some(e);
                }
                None
            }
        }
    }

    /// Admin: rebuild (or purge) the snapshot buckets for one mood and
    /// parameter combination.
    pub async fn refresh_snapshot(&self, req: &RefreshRequest) -> AppResult<RefreshReport> {
        let rule = require_rule(&req.mood)?;

        let region = req.region.clone().unwrap_or_else(|| "GB".to_string());
        let providers = req.providers.clone().unwrap_or_default();
        let broad = req.broad.unwrap_or(false);
        let purge = req.purge.unwrap_or(false);
        let base_types = if broad || !providers.is_empty() {
            WIDE_MONETIZATION.to_string()
        } else {
            req.types
                .clone()
                .unwrap_or_else(|| "flatrate,ads,free".to_string())
        };

        let filters = discover::DiscoverFilters::default();
        let mut variants = vec![("strict", base_types.clone())];
        if base_types != WIDE_MONETIZATION {
            variants.push(("strict_wide", WIDE_MONETIZATION.to_string()));
        }

        let mut keys = Vec::new();
        let mut sizes = Vec::new();
        for (bucket, types) in variants {
            let fp = SnapshotFingerprint::new(bucket, &req.mood, &region, &providers, &types, &filters);
            keys.push(format!("{}", fp.cache_key()));
            if purge {
                self.snapshots.purge(&fp).await?;
                sizes.push(0);
            } else {
                let params = build_discover_params(rule, &region, &providers, &types, &filters);
                let snapshot = self.snapshots.refresh(&fp, &params).await?;
                sizes.push(snapshot.total_results);
            }
        }

        Ok(RefreshReport {
            refreshed: !purge,
            purged: purge,
            keys,
            sizes,
            mood: req.mood.clone(),
            region,
        })
    }

    /// Admin: pull a movie's TMDB keywords and front-merge them into the
    /// mood's keyword override list.
    pub async fn seed_keywords(&self, req: &SeedRequest) -> AppResult<SeedReport> {
        require_rule(&req.mood)?;
        let limit = req.limit.unwrap_or(DEFAULT_SEED_KEYWORDS).max(1);

        let tmdb_id = match (req.tmdb_id, req.title.as_deref().map(str::trim)) {
            (Some(id), _) => id,
            (None, Some(title)) if !title.is_empty() => {
                let page = self.tmdb.search_movies(title).await?;
                page.results
                    .first()
                    .map(|m| m.id)
                    .ok_or_else(|| AppError::NotFound(format!("No movie matching '{}'", title)))?
            }
            _ => {
                return Err(AppError::InvalidInput(
                    "Provide tmdb_id or title".to_string(),
                ))
            }
        };

        let keywords = self.tmdb.movie_keywords(tmdb_id).await?;
        let picked: Vec<String> = keywords
            .keywords
            .iter()
            .take(limit)
            .map(|k| k.id.to_string())
            .collect();
        if picked.is_empty() {
            return Err(AppError::NotFound(format!(
                "Movie {} has no keywords",
                tmdb_id
            )));
        }

        self.overrides
            .mutate_keywords(&req.mood, &picked, &[])
            .await?;

        // Keyword edits don't change snapshot content, but dropping the
        // mood's snapshots keeps refresh behavior predictable for admins.
        if let Err(e) = self.snapshots.purge_mood(&req.mood).await {
            tracing::warn!(mood = %req.mood, error = %e, "Snapshot purge after seeding failed");
        }

        let effective = self.overrides.effective_keywords(&req.mood).await?;
        Ok(SeedReport {
            mood: req.mood.clone(),
            tmdb_id,
            added_keywords: picked,
            effective_keywords: effective,
        })
    }

    /// Admin: drop every mood snapshot. Falls back to flushing the whole
    /// cache database when pattern scanning is unavailable.
    pub async fn clear_snapshots(&self) -> AppResult<ClearReport> {
        match self.snapshots.purge_all().await {
            Ok(cleared) => Ok(ClearReport {
                cleared,
                mode: "pattern",
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Pattern purge failed, flushing cache database");
                self.cache.flush_all().await?;
                Ok(ClearReport {
                    cleared: 0,
                    mode: "cleared_all",
                })
            }
        }
    }

    /// Admin: the live configuration as seen by discovery, with effective
    /// (override plus base) pins and keywords per mood.
    pub async fn config_snapshot(&self) -> AppResult<MoodConfig> {
        let mut pins = BTreeMap::new();
        let mut keywords = BTreeMap::new();
        for mood in MOODS {
            pins.insert(
                mood.to_string(),
                EffectiveList {
                    effective: self.overrides.effective_pins(mood).await?,
                },
            );
            keywords.insert(
                mood.to_string(),
                EffectiveList {
                    effective: self.overrides.effective_keywords(mood).await?,
                },
            );
        }
        Ok(MoodConfig {
            moods: MOODS.to_vec(),
            pins,
            keywords,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub mood: String,
    pub region: Option<String>,
    pub providers: Option<String>,
    pub types: Option<String>,
    #[serde(default)]
    pub broad: Option<bool>,
    #[serde(default)]
    pub purge: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct RefreshReport {
    pub refreshed: bool,
    pub purged: bool,
    pub keys: Vec<String>,
    pub sizes: Vec<usize>,
    pub mood: String,
    pub region: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedRequest {
    pub mood: String,
    pub tmdb_id: Option<u64>,
    pub title: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SeedReport {
    pub mood: String,
    pub tmdb_id: u64,
    pub added_keywords: Vec<String>,
    pub effective_keywords: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearReport {
    pub cleared: usize,
    pub mode: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MoodConfig {
    pub moods: Vec<&'static str>,
    pub pins: BTreeMap<String, EffectiveList<u64>>,
    pub keywords: BTreeMap<String, EffectiveList<String>>,
}

#[derive(Debug, Serialize)]
pub struct EffectiveList<T> {
    pub effective: Vec<T>,
}
