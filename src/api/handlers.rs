use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    cached,
    db::CacheKey,
    error::{AppError, AppResult},
    services::{
        mood::{
            discover::{DiscoverQuery, MoodDiscoverPage},
            ClearReport, MoodConfig, RefreshReport, RefreshRequest, SeedReport, SeedRequest,
        },
        tmdb::dedupe_and_sort,
    },
};

use super::AppState;

const TRENDING_TTL: u64 = 600;
const NOW_PLAYING_TTL: u64 = 600;
const STREAMING_TTL: u64 = 600;
const PROVIDER_CATALOG_TTL: u64 = 3600;
const PERSON_TTL: u64 = 600;
const MOVIE_DETAIL_TTL: u64 = 1800;

const DEFAULT_REGION: &str = "GB";
const DEFAULT_DETAIL_REGION: &str = "IE";
const DEFAULT_MONETIZATION: &str = "flatrate,ads,free";

pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

// --- TMDB proxy endpoints ---

pub async fn trending(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let value: AppResult<Value> = cached!(
        state.cache,
        CacheKey::Trending,
        TRENDING_TTL,
        state.tmdb.trending_week()
    );
    Ok(Json(value?))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<String>,
}

/// Search proxy. An empty query short-circuits to an empty result set
/// without touching the upstream.
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Value>> {
    let q = query.q.as_deref().map(str::trim).unwrap_or_default();
    if q.is_empty() {
        return Ok(Json(json!({ "results": [] })));
    }
    let page = query.page.unwrap_or_else(|| "1".to_string());
    let value = state
        .tmdb
        .get_value(
            "/search/movie",
            &[
                ("query", q.to_string()),
                ("page", page),
                ("include_adult", "false".to_string()),
            ],
        )
        .await?;
    Ok(Json(value))
}

#[derive(Debug, Deserialize)]
pub struct RegionPageQuery {
    pub region: Option<String>,
    pub page: Option<String>,
}

pub async fn now_playing(
    State(state): State<AppState>,
    Query(query): Query<RegionPageQuery>,
) -> AppResult<Json<Value>> {
    let region = query.region.unwrap_or_else(|| DEFAULT_REGION.to_string());
    let page = query.page.unwrap_or_else(|| "1".to_string());
    let key = CacheKey::NowPlaying {
        region: region.clone(),
        page: page.clone(),
    };
    let value: AppResult<Value> = cached!(
        state.cache,
        key,
        NOW_PLAYING_TTL,
        state.tmdb.now_playing(&region, &page)
    );
    Ok(Json(value?))
}

#[derive(Debug, Deserialize)]
pub struct StreamingTrendingQuery {
    pub region: Option<String>,
    pub providers: Option<String>,
    pub types: Option<String>,
    pub page: Option<String>,
}

/// Popularity-ordered discover scoped to what's streamable in a region,
/// optionally narrowed to specific providers.
pub async fn streaming_trending(
    State(state): State<AppState>,
    Query(query): Query<StreamingTrendingQuery>,
) -> AppResult<Json<Value>> {
    let region = query.region.unwrap_or_else(|| DEFAULT_REGION.to_string());
    let providers = query.providers.unwrap_or_default();
    let types = query
        .types
        .unwrap_or_else(|| DEFAULT_MONETIZATION.to_string());
    let page = query.page.unwrap_or_else(|| "1".to_string());

    let key = CacheKey::StreamingTrending {
        region: region.clone(),
        providers: providers.clone(),
        types: types.clone(),
        page: page.clone(),
    };

    let mut params = vec![
        ("watch_region", region),
        ("with_watch_monetization_types", types),
        ("sort_by", "popularity.desc".to_string()),
        ("include_adult", "false".to_string()),
        ("page", page),
    ];
    if !providers.is_empty() {
        params.push(("with_watch_providers", providers));
    }

    let value: AppResult<Value> = cached!(
        state.cache,
        key,
        STREAMING_TTL,
        state.tmdb.get_value("/discover/movie", &params)
    );
    Ok(Json(value?))
}

#[derive(Debug, Deserialize)]
pub struct RegionQuery {
    pub region: Option<String>,
}

pub async fn provider_catalog(
    State(state): State<AppState>,
    Query(query): Query<RegionQuery>,
) -> AppResult<Json<Value>> {
    let region = query.region.unwrap_or_else(|| DEFAULT_REGION.to_string());
    let key = CacheKey::ProviderCatalog(region.clone());
    let value: AppResult<Value> = cached!(
        state.cache,
        key,
        PROVIDER_CATALOG_TTL,
        state.tmdb.provider_catalog(&region)
    );
    Ok(Json(value?))
}

#[derive(Debug, Deserialize)]
pub struct PersonQuery {
    pub name: Option<String>,
}

/// Movies featuring a person, best person match first, credits ordered by
/// popularity.
pub async fn by_person(
    State(state): State<AppState>,
    Query(query): Query<PersonQuery>,
) -> AppResult<Json<Value>> {
    let name = query
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Missing 'name' parameter".to_string()))?
        .to_string();

    let key = CacheKey::PersonMovies(name.clone());
    let value: AppResult<Value> = cached!(state.cache, key, PERSON_TTL, async {
        let people = state.tmdb.search_person(&name).await?;
        let person = people
            .results
            .first()
            .ok_or_else(|| AppError::NotFound(format!("No person matching '{}'", name)))?;
        let credits = state.tmdb.person_movie_credits(person.id).await?;
        let cast = dedupe_and_sort(credits.cast);
        Ok::<Value, AppError>(json!({ "results": cast }))
    });
    Ok(Json(value?))
}

/// Movie detail proxy. The region's provider block (US as fallback) is
/// lifted into a top-level `providers` field so clients don't parse the
/// slash-keyed append themselves.
pub async fn movie_detail(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(query): Query<RegionQuery>,
) -> AppResult<Json<Value>> {
    let region = query
        .region
        .unwrap_or_else(|| DEFAULT_DETAIL_REGION.to_string());
    let key = CacheKey::MovieDetail {
        id,
        region: region.clone(),
    };
    let value: AppResult<Value> = cached!(state.cache, key, MOVIE_DETAIL_TTL, async {
        let mut detail = state
            .tmdb
            .movie_detail_value(id, "credits,videos,watch/providers,release_dates")
            .await?;
        let providers = detail
            .get("watch/providers")
            .and_then(|wp| wp.get("results"))
            .and_then(|results| results.get(&region).or_else(|| results.get("US")))
            .cloned()
            .unwrap_or_else(|| json!({}));
        if let Some(obj) = detail.as_object_mut() {
            obj.insert("providers".to_string(), providers);
        }
        Ok::<Value, AppError>(detail)
    });
    Ok(Json(value?))
}

// --- Mood discovery and its admin surface ---

pub async fn mood_discover(
    State(state): State<AppState>,
    Path(mood_key): Path<String>,
    Query(query): Query<DiscoverQuery>,
) -> AppResult<Json<MoodDiscoverPage>> {
    let page = state.moods.discover(&mood_key, &query).await?;
    Ok(Json(page))
}

pub async fn moods_refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> AppResult<Json<RefreshReport>> {
    let report = state.moods.refresh_snapshot(&request).await?;
    Ok(Json(report))
}

pub async fn moods_config(State(state): State<AppState>) -> AppResult<Json<MoodConfig>> {
    let config = state.moods.config_snapshot().await?;
    Ok(Json(config))
}

/// Bulk config update. The body is validated by hand so a malformed shape
/// is a 400 with a useful message rather than a rejection from the
/// extractor, and nothing is written unless the whole patch parses.
pub async fn moods_config_update(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> AppResult<Json<MoodConfig>> {
    let obj = body
        .as_object()
        .ok_or_else(|| AppError::InvalidInput("Body must be a JSON object".to_string()))?;

    let pins = match obj.get("pins") {
        Some(v) => parse_pin_map(v)?,
        None => HashMap::new(),
    };
    let keywords = match obj.get("keywords") {
        Some(v) => parse_keyword_map(v)?,
        None => HashMap::new(),
    };

    state.moods.overrides().replace_pins(pins).await?;
    state.moods.overrides().replace_keywords(keywords).await?;

    let config = state.moods.config_snapshot().await?;
    Ok(Json(config))
}

fn parse_pin_map(value: &Value) -> AppResult<HashMap<String, Vec<u64>>> {
    let obj = value
        .as_object()
        .ok_or_else(|| AppError::InvalidInput("'pins' must be a mapping".to_string()))?;

    let mut out = HashMap::new();
    for (mood, ids) in obj {
        let ids = ids.as_array().ok_or_else(|| {
            AppError::InvalidInput(format!("'pins.{}' must be an array", mood))
        })?;
        let parsed = ids
            .iter()
            .map(|id| {
                id.as_u64().ok_or_else(|| {
                    AppError::InvalidInput(format!("'pins.{}' must contain movie IDs", mood))
                })
            })
            .collect::<AppResult<Vec<u64>>>()?;
        out.insert(mood.clone(), parsed);
    }
    Ok(out)
}

fn parse_keyword_map(value: &Value) -> AppResult<HashMap<String, Vec<String>>> {
    let obj = value
        .as_object()
        .ok_or_else(|| AppError::InvalidInput("'keywords' must be a mapping".to_string()))?;

    let mut out = HashMap::new();
    for (mood, entries) in obj {
        let entries = entries.as_array().ok_or_else(|| {
            AppError::InvalidInput(format!("'keywords.{}' must be an array", mood))
        })?;
        // numeric keyword IDs are accepted and canonicalized to strings
        let parsed = entries
            .iter()
            .map(|entry| match entry {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                _ => Err(AppError::InvalidInput(format!(
                    "'keywords.{}' must contain keyword IDs",
                    mood
                ))),
            })
            .collect::<AppResult<Vec<String>>>()?;
        out.insert(mood.clone(), parsed);
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
pub struct MutatePinsRequest {
    pub mood: String,
    #[serde(default)]
    pub add: Vec<u64>,
    #[serde(default)]
    pub remove: Vec<u64>,
}

pub async fn moods_pins_update(
    State(state): State<AppState>,
    Json(request): Json<MutatePinsRequest>,
) -> AppResult<Json<Value>> {
    let pins = state
        .moods
        .overrides()
        .mutate_pins(&request.mood, &request.add, &request.remove)
        .await?;
    let effective = state.moods.overrides().effective_pins(&request.mood).await?;
    Ok(Json(json!({
        "mood": request.mood,
        "pins": pins,
        "effective": effective,
    })))
}

#[derive(Debug, Deserialize)]
pub struct MoodQuery {
    pub mood: Option<String>,
}

pub async fn moods_keywords(
    State(state): State<AppState>,
    Query(query): Query<MoodQuery>,
) -> AppResult<Json<Value>> {
    let mood = query
        .mood
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Missing 'mood' parameter".to_string()))?;

    let keywords = state.moods.overrides().keyword_override(mood).await?;
    let effective = state.moods.overrides().effective_keywords(mood).await?;
    Ok(Json(json!({
        "mood": mood,
        "keywords": keywords,
        "effective": effective,
    })))
}

#[derive(Debug, Deserialize)]
pub struct MutateKeywordsRequest {
    pub mood: String,
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
}

pub async fn moods_keywords_update(
    State(state): State<AppState>,
    Json(request): Json<MutateKeywordsRequest>,
) -> AppResult<Json<Value>> {
    let keywords = state
        .moods
        .overrides()
        .mutate_keywords(&request.mood, &request.add, &request.remove)
        .await?;
    let effective = state
        .moods
        .overrides()
        .effective_keywords(&request.mood)
        .await?;
    Ok(Json(json!({
        "mood": request.mood,
        "keywords": keywords,
        "effective": effective,
    })))
}

pub async fn moods_seed(
    State(state): State<AppState>,
    Json(request): Json<SeedRequest>,
) -> AppResult<Json<SeedReport>> {
    let report = state.moods.seed_keywords(&request).await?;
    Ok(Json(report))
}

pub async fn moods_clear_snapshots(State(state): State<AppState>) -> AppResult<Json<ClearReport>> {
    let report = state.moods.clear_snapshots().await?;
    Ok(Json(report))
}
