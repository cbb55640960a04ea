use std::collections::HashSet;

use crate::{models::MovieSummary, services::tmdb::TmdbClient};

use super::rules::MoodRule;

/// Hard genre gate. Excludes are checked first and unconditionally: even
/// moods that don't enforce inclusion must never leak an excluded genre.
/// When the gate is enforced, a movie with no genre data is treated as
/// "unknown, not eligible" rather than assumed safe.
pub fn passes_genre_gate(rule: &MoodRule, movie: &MovieSummary) -> bool {
    let genres = movie.genre_id_set();

    if rule.exclude_genres.iter().any(|g| genres.contains(g)) {
        return false;
    }
    if !rule.enforce_genre_gate {
        return true;
    }
    if genres.is_empty() {
        return false;
    }
    rule.include_genres_any.is_empty()
        || rule.include_genres_any.iter().any(|g| genres.contains(g))
}

/// Parses a pipe-joined provider CSV ("8|337|9") into IDs, dropping any
/// non-numeric tokens.
pub fn parse_provider_ids(providers_csv: &str) -> HashSet<u64> {
    providers_csv
        .split('|')
        .filter_map(|token| token.trim().parse::<u64>().ok())
        .collect()
}

/// Hard provider gate: keep only movies verified to be available on at
/// least one wanted provider in `region` (US data as fallback).
///
/// Availability attached during enrichment is reused; otherwise only the
/// first `limit_checks` unverified candidates get a detail lookup, bounding
/// upstream calls per request. Candidates past the budget pass through
/// unverified. A failed lookup drops the candidate.
pub async fn filter_by_providers(
    tmdb: &TmdbClient,
    movies: Vec<MovieSummary>,
    region: &str,
    wanted: &HashSet<u64>,
    limit_checks: usize,
) -> Vec<MovieSummary> {
    if wanted.is_empty() {
        return movies;
    }

    let mut kept = Vec::new();
    let mut checked = 0usize;

    for movie in movies {
        if let Some(have) = movie.providers_in_region(region) {
            if have.intersection(wanted).next().is_some() {
                kept.push(movie);
            }
            continue;
        }

        if checked >= limit_checks {
            kept.push(movie);
            continue;
        }

        checked += 1;
        match tmdb.movie_detail(movie.id, "watch/providers").await {
            Ok(detail) => {
                let have = detail.providers_in_region(region).unwrap_or_default();
                if have.intersection(wanted).next().is_some() {
                    kept.push(movie);
                }
            }
            Err(e) => {
                tracing::debug!(movie_id = movie.id, error = %e, "Provider check failed, dropping candidate");
            }
        }
    }

    kept
}
