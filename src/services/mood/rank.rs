use std::collections::{HashMap, HashSet};

use crate::{models::MovieSummary, services::tmdb::TmdbClient};

use super::rules::MoodRule;

const PIN_BONUS: f64 = 50.0;
const INCLUDE_BONUS: f64 = 16.0;
const EXCLUDE_PENALTY: f64 = 18.0;
const PROVIDER_BONUS: f64 = 10.0;
const CERT_BONUS: f64 = 2.0;
const POPULARITY_SCALE: f64 = 0.002;
const POPULARITY_CAP: f64 = 3.0;
const LOW_VOTES_PENALTY: f64 = 6.0;
// Keep every nudge well under PIN_BONUS so curation always wins.
const HEAVY_DRAMA_NUDGE: f64 = 4.0;

/// Genres that count as a "lighter" secondary signal next to drama.
const LIGHT_GENRES: &[u64] = &[35, 10751, 10749, 16, 10402, 12];
const DRAMA: u64 = 18;

/// Everything the soft scorer needs besides the movie itself.
pub struct RankContext<'a> {
    pub rule: &'a MoodRule,
    pub pinned: &'a HashSet<u64>,
    pub region: &'a str,
    pub wanted_providers: &'a HashSet<u64>,
    pub broad: bool,
}

/// Soft score for one candidate. Never used to drop items, only to order
/// them; the hard gates have already run by the time this is called.
pub fn score(ctx: &RankContext<'_>, movie: &MovieSummary) -> f64 {
    let rule = ctx.rule;
    let genres = movie.genre_id_set();
    let mut total = 0.0;

    if ctx.pinned.contains(&movie.id) {
        total += PIN_BONUS;
    }

    if rule.enforce_genre_gate
        && rule.include_genres_any.iter().any(|g| genres.contains(g))
    {
        total += INCLUDE_BONUS;
    }
    // The gate already removed hard excludes; this still demotes leakage in
    // lenient gate mode and for injected titles.
    if rule.exclude_genres.iter().any(|g| genres.contains(g)) {
        total -= EXCLUDE_PENALTY;
    }

    if ctx.broad && !ctx.wanted_providers.is_empty() {
        if let Some(have) = movie.providers_in_region(ctx.region) {
            if have.intersection(ctx.wanted_providers).next().is_some() {
                total += PROVIDER_BONUS;
            }
        }
    }

    if let (Some(country), Some(ceiling)) =
        (rule.certification_country, rule.certification_ceiling)
    {
        if let Some(cert) = movie.certification_in(country) {
            if cert_within_ceiling(&cert, ceiling) {
                total += CERT_BONUS;
            }
        }
    }

    total += (movie.popularity.max(0.0) * POPULARITY_SCALE).min(POPULARITY_CAP);

    if movie.vote_count < u64::from(rule.min_votes_floor) {
        total -= LOW_VOTES_PENALTY;
    }

    if rule.nudge_heavy_drama
        && genres.contains(&DRAMA)
        && !LIGHT_GENRES.iter().any(|g| genres.contains(g))
    {
        total -= HEAVY_DRAMA_NUDGE;
    }

    total
}

/// Stable soft re-rank: score descending, ties broken by popularity
/// descending, then movie ID ascending for full determinism.
pub fn rerank(ctx: &RankContext<'_>, movies: Vec<MovieSummary>) -> Vec<MovieSummary> {
    let mut scored: Vec<(f64, MovieSummary)> = movies
        .into_iter()
        .map(|m| (score(ctx, &m), m))
        .collect();

    scored.sort_by(|(sa, ma), (sb, mb)| {
        sb.total_cmp(sa)
            .then_with(|| mb.popularity.total_cmp(&ma.popularity))
            .then_with(|| ma.id.cmp(&mb.id))
    });

    scored.into_iter().map(|(_, m)| m).collect()
}

/// US-style certification ladder; unknown labels never earn the bonus.
fn cert_rank(cert: &str) -> Option<usize> {
    ["G", "PG", "PG-13", "R", "NC-17"]
        .iter()
        .position(|c| *c == cert)
}

fn cert_within_ceiling(cert: &str, ceiling: &str) -> bool {
    match (cert_rank(cert), cert_rank(ceiling)) {
        (Some(c), Some(max)) => c <= max,
        _ => false,
    }
}

/// Moves pinned IDs to the front in pin-list order, leaving the rest in
/// their existing order. Dedupes by ID keeping the first occurrence.
pub fn order_by_pins(pins: &[u64], movies: Vec<MovieSummary>) -> Vec<MovieSummary> {
    let order: HashMap<u64, usize> = pins.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut seen = HashSet::new();
    let mut merged: Vec<MovieSummary> =
        movies.into_iter().filter(|m| seen.insert(m.id)).collect();
    merged.sort_by_key(|m| order.get(&m.id).copied().unwrap_or(usize::MAX));
    merged
}

const MAX_PIN_FETCHES: usize = 5;

/// Pin injection: pinned IDs missing from the ranked set are fetched
/// individually (bounded) and appended only when they have availability
/// data for the region or the US fallback, then all pins are lifted to the
/// front. A pin that can't be verified simply isn't injected.
pub async fn apply_pins(
    tmdb: &TmdbClient,
    pins: &[u64],
    ranked: Vec<MovieSummary>,
    region: &str,
) -> Vec<MovieSummary> {
    let existing: HashSet<u64> = ranked.iter().map(|m| m.id).collect();

    let mut merged = ranked;
    for pin in pins
        .iter()
        .filter(|id| !existing.contains(id))
        .take(MAX_PIN_FETCHES)
    {
        match tmdb.movie_detail(*pin, "watch/providers").await {
            Ok(detail) if detail.has_region_availability(region) => merged.push(detail),
            Ok(_) => {
                tracing::debug!(movie_id = pin, region = %region, "Pin has no regional availability, skipping");
            }
            Err(e) => {
                tracing::debug!(movie_id = pin, error = %e, "Pin detail fetch failed, skipping");
            }
        }
    }

    order_by_pins(pins, merged)
}
