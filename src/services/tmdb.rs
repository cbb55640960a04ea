//! TMDB upstream client.
//!
//! Every network call into TMDB goes through here: one place applies auth,
//! the request timeout, non-2xx handling, and usage accounting. Multi-page
//! discover aggregation lives here too, so snapshot builds are deterministic.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;

use crate::{
    config::Config,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{DiscoverPage, KeywordsResponse, MovieSummary, PersonCredits, PersonPage},
};

/// How many discover pages a snapshot build will pull at most.
pub const MAX_SNAPSHOT_PAGES: u32 = 5;

const MONTHLY_USAGE_TTL: i64 = 60 * 60 * 24 * 32;
const DAILY_USAGE_TTL: i64 = 604_800; // 7 days

#[derive(Clone)]
pub struct TmdbClient {
    http_client: HttpClient,
    base_url: String,
    api_key: Option<String>,
    bearer: Option<String>,
    cache: Cache,
}

impl TmdbClient {
    pub fn new(config: &Config, cache: Cache) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.tmdb_timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.tmdb_api_url.clone(),
            api_key: config.tmdb_api_key.clone(),
            bearer: config.tmdb_bearer.clone(),
            cache,
        })
    }

    /// Single GET against TMDB. Non-2xx and transport failures both surface
    /// as 502-mapped errors; nothing upstream-shaped leaks past this method.
    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> AppResult<T> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.http_client.get(&url);
        if let Some(bearer) = &self.bearer {
            request = request.bearer_auth(bearer);
        } else if let Some(key) = &self.api_key {
            request = request.query(&[("api_key", key.as_str())]);
        }

        let response = request.query(params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(path = %path, status = %status, "TMDB request failed");
            return Err(AppError::ExternalApi(format!(
                "status {}: {}",
                status, body
            )));
        }

        self.note_usage();

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Raw passthrough for thin proxy endpoints.
    pub async fn get_value(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> AppResult<serde_json::Value> {
        self.get(path, params).await
    }

    /// One `/discover/movie` page.
    pub async fn discover(&self, params: &[(&str, String)]) -> AppResult<DiscoverPage> {
        self.get("/discover/movie", params).await
    }

    /// Pulls up to `max_pages` discover pages once, dedupes by movie ID and
    /// sorts by (popularity desc, id asc) so repeated builds from the same
    /// inputs produce the same ordering. A failure past page one keeps what
    /// was already merged; a first-page failure propagates.
    pub async fn collect_discover_pages(
        &self,
        params: &[(&str, String)],
        max_pages: u32,
    ) -> AppResult<Vec<MovieSummary>> {
        let first = self.discover(&with_page(params, 1)).await?;
        let total_pages = first.total_pages.max(1);
        let mut merged = first.results;

        for page in 2..=max_pages.min(total_pages) {
            match self.discover(&with_page(params, page)).await {
                Ok(more) => merged.extend(more.results),
                Err(e) => {
                    tracing::warn!(page = page, error = %e, "Discover pagination stopped early");
                    break;
                }
            }
        }

        Ok(dedupe_and_sort(merged))
    }

    /// Movie detail with the given `append_to_response` blocks. Providers
    /// are lifted into the typed field so downstream code never touches the
    /// slash-named wire key.
    pub async fn movie_detail(&self, id: u64, append: &str) -> AppResult<MovieSummary> {
        let mut movie: MovieSummary = self
            .get(
                &format!("/movie/{}", id),
                &[("append_to_response", append.to_string())],
            )
            .await?;
        movie.adopt_providers_from_extra();
        Ok(movie)
    }

    /// Movie detail as an untouched JSON payload, for the detail proxy.
    pub async fn movie_detail_value(&self, id: u64, append: &str) -> AppResult<serde_json::Value> {
        self.get(
            &format!("/movie/{}", id),
            &[("append_to_response", append.to_string())],
        )
        .await
    }

    pub async fn movie_keywords(&self, id: u64) -> AppResult<KeywordsResponse> {
        self.get(&format!("/movie/{}/keywords", id), &[]).await
    }

    pub async fn search_movies(&self, query: &str) -> AppResult<DiscoverPage> {
        self.get("/search/movie", &[("query", query.to_string())])
            .await
    }

    pub async fn search_person(&self, query: &str) -> AppResult<PersonPage> {
        self.get("/search/person", &[("query", query.to_string())])
            .await
    }

    pub async fn person_movie_credits(&self, person_id: u64) -> AppResult<PersonCredits> {
        self.get(&format!("/person/{}/movie_credits", person_id), &[])
            .await
    }

    pub async fn trending_week(&self) -> AppResult<serde_json::Value> {
        self.get_value("/trending/movie/week", &[]).await
    }

    pub async fn now_playing(&self, region: &str, page: &str) -> AppResult<serde_json::Value> {
        self.get_value(
            "/movie/now_playing",
            &[("region", region.to_string()), ("page", page.to_string())],
        )
        .await
    }

    pub async fn provider_catalog(&self, region: &str) -> AppResult<serde_json::Value> {
        self.get_value(
            "/watch/providers/movie",
            &[("watch_region", region.to_string())],
        )
        .await
    }

    /// Bumps monthly and daily usage counters after a successful call.
    /// Fire-and-forget: accounting never blocks or fails a request.
    fn note_usage(&self) {
        let now = Utc::now();
        self.cache.incr_in_background(
            &CacheKey::ApiUsage(now.format("%Y-%m").to_string()),
            MONTHLY_USAGE_TTL,
        );
        self.cache.incr_in_background(
            &CacheKey::ApiUsage(now.format("daily:%Y-%m-%d").to_string()),
            DAILY_USAGE_TTL,
        );
    }
}

fn with_page<'a>(params: &[(&'a str, String)], page: u32) -> Vec<(&'a str, String)> {
    let mut out: Vec<(&str, String)> = params
        .iter()
        .filter(|(k, _)| *k != "page")
        .cloned()
        .collect();
    out.push(("page", page.to_string()));
    out
}

/// Dedupe by movie ID keeping first occurrence, then sort by
/// (popularity desc, id asc) for a fully deterministic ordering.
pub fn dedupe_and_sort(movies: Vec<MovieSummary>) -> Vec<MovieSummary> {
    let mut seen = HashSet::new();
    let mut unique: Vec<MovieSummary> = movies.into_iter().filter(|m| seen.insert(m.id)).collect();
    unique.sort_by(|a, b| {
        b.popularity
            .total_cmp(&a.popularity)
            .then_with(|| a.id.cmp(&b.id))
    });
    unique
}
