use serde::{Deserialize, Serialize};

use crate::models::MovieSummary;

use super::rules::MoodRule;

/// Fixed response page size for mood discovery.
pub const PAGE_SIZE: usize = 20;

/// Widened monetization set used for the second snapshot bucket and for
/// broad/provider-locked requests.
pub const WIDE_MONETIZATION: &str = "ads,buy,flatrate,free,rent";

const DEFAULT_REGION: &str = "GB";
const DEFAULT_MONETIZATION: &str = "flatrate,ads,free";

/// Raw query parameters as they arrive. Everything is optional text:
/// malformed values are clamped or dropped during normalization instead of
/// failing the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoverQuery {
    pub region: Option<String>,
    pub providers: Option<String>,
    pub types: Option<String>,
    pub page: Option<String>,
    pub broad: Option<String>,
    pub force_providers: Option<String>,
    pub debug: Option<String>,
    /// Minimum TMDB rating; `tmdb_min` is the client alias.
    pub tmdb_min: Option<String>,
    pub vote_average_gte: Option<String>,
    pub min_votes: Option<String>,
    pub runtime_gte: Option<String>,
    pub runtime_lte: Option<String>,
    pub lang: Option<String>,
    pub sort_by: Option<String>,
    pub year_from: Option<String>,
    pub year_to: Option<String>,
}

impl DiscoverQuery {
    pub fn normalize(&self) -> DiscoverRequest {
        DiscoverRequest {
            region: clean_str(&self.region).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            providers: clean_str(&self.providers).unwrap_or_default(),
            types: clean_str(&self.types).unwrap_or_else(|| DEFAULT_MONETIZATION.to_string()),
            page: parse_num::<usize>(&self.page).unwrap_or(1).max(1),
            broad: flag(&self.broad),
            force_providers: flag(&self.force_providers),
            debug: flag(&self.debug),
            filters: self.filters(),
        }
    }

    fn filters(&self) -> DiscoverFilters {
        let vote_average_gte =
            parse_num::<f64>(&self.tmdb_min).or_else(|| parse_num::<f64>(&self.vote_average_gte));

        // keep result volume sane when the rating bar is high
        let mut min_votes = parse_num::<u32>(&self.min_votes);
        if min_votes.is_none() && vote_average_gte.is_some_and(|v| v >= 7.0) {
            min_votes = Some(50);
        }

        DiscoverFilters {
            year_from: parse_num::<i32>(&self.year_from),
            year_to: parse_num::<i32>(&self.year_to),
            vote_average_gte,
            min_votes,
            runtime_gte: parse_num::<u32>(&self.runtime_gte).map(|v| v.max(40)),
            runtime_lte: parse_num::<u32>(&self.runtime_lte).map(|v| v.min(240)),
            lang: clean_str(&self.lang).map(|l| l.chars().take(5).collect()),
            sort_by: clean_str(&self.sort_by),
        }
    }
}

fn flag(value: &Option<String>) -> bool {
    matches!(value.as_deref(), Some("1") | Some("true") | Some("yes"))
}

fn clean_str(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "null")
        .map(str::to_string)
}

fn parse_num<T: std::str::FromStr>(value: &Option<String>) -> Option<T> {
    clean_str(value)?.parse().ok()
}

/// Normalized discovery request.
#[derive(Debug, Clone)]
pub struct DiscoverRequest {
    pub region: String,
    pub providers: String,
    pub types: String,
    pub page: usize,
    pub broad: bool,
    pub force_providers: bool,
    pub debug: bool,
    pub filters: DiscoverFilters,
}

/// Normalized optional filters. Folded into the snapshot fingerprint so
/// distinct filter combinations cache independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscoverFilters {
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub vote_average_gte: Option<f64>,
    pub min_votes: Option<u32>,
    pub runtime_gte: Option<u32>,
    pub runtime_lte: Option<u32>,
    pub lang: Option<String>,
    pub sort_by: Option<String>,
}

impl DiscoverFilters {
    /// Canonical filter segment of a snapshot fingerprint.
    pub fn fingerprint_tag(&self) -> String {
        fn seg<T: std::fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map(|x| x.to_string()).unwrap_or_else(|| "-".to_string())
        }
        format!(
            "y{}-{}:va{}:mv{}:rt{}-{}:lg{}:sb{}",
            seg(&self.year_from),
            seg(&self.year_to),
            seg(&self.vote_average_gte),
            seg(&self.min_votes),
            seg(&self.runtime_gte),
            seg(&self.runtime_lte),
            seg(&self.lang),
            seg(&self.sort_by),
        )
    }
}

/// Builds TMDB `/discover/movie` parameters from a mood rule plus request
/// filters. Includes OR-join with pipes, excludes AND-join with commas.
/// Soft keywords deliberately never become a `with_keywords` filter: they
/// are a ranking signal only, and constraining the upstream query on them
/// starves result volume.
pub fn build_discover_params(
    rule: &MoodRule,
    region: &str,
    providers: &str,
    types: &str,
    filters: &DiscoverFilters,
) -> Vec<(&'static str, String)> {
    let mut params: Vec<(&'static str, String)> = vec![
        ("watch_region", region.to_string()),
        ("with_watch_monetization_types", types.to_string()),
        (
            "sort_by",
            filters
                .sort_by
                .clone()
                .unwrap_or_else(|| rule.sort_hint.as_str().to_string()),
        ),
        ("include_adult", "false".to_string()),
    ];

    if !rule.include_genres_any.is_empty() {
        params.push(("with_genres", join_ids(rule.include_genres_any, "|")));
    }
    if !rule.exclude_genres.is_empty() {
        params.push(("without_genres", join_ids(rule.exclude_genres, ",")));
    }
    if !providers.is_empty() {
        params.push(("with_watch_providers", providers.to_string()));
    }

    if let (Some(country), Some(ceiling)) =
        (rule.certification_country, rule.certification_ceiling)
    {
        params.push(("certification_country", country.to_string()));
        params.push(("certification.lte", ceiling.to_string()));
    }

    if let Some(year) = filters.year_from {
        params.push(("primary_release_date.gte", format!("{}-01-01", year)));
    }
    if let Some(year) = filters.year_to {
        params.push(("primary_release_date.lte", format!("{}-12-31", year)));
    }
    if let Some(rating) = filters.vote_average_gte {
        params.push(("vote_average.gte", rating.to_string()));
    }

    let min_votes = filters.min_votes.unwrap_or(0).max(rule.min_votes_floor);
    if min_votes > 0 {
        params.push(("vote_count.gte", min_votes.to_string()));
    }

    if let Some(runtime) = filters.runtime_gte {
        params.push(("with_runtime.gte", runtime.to_string()));
    }
    if let Some(runtime) = filters.runtime_lte {
        params.push(("with_runtime.lte", runtime.to_string()));
    }
    if let Some(lang) = &filters.lang {
        params.push(("with_original_language", lang.clone()));
    }

    params
}

fn join_ids(ids: &[u64], sep: &str) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Offset pagination over the fully ranked list.
/// Returns (page slice, total_pages, total_results); a page past the end is
/// an empty slice, never an error.
pub fn paginate(items: &[MovieSummary], page: usize) -> (Vec<MovieSummary>, usize, usize) {
    let total_results = items.len();
    let total_pages = total_results.div_ceil(PAGE_SIZE).max(1);

    let start = (page.max(1) - 1) * PAGE_SIZE;
    let results = if start >= total_results {
        Vec::new()
    } else {
        items[start..(start + PAGE_SIZE).min(total_results)].to_vec()
    };

    (results, total_pages, total_results)
}

/// Discovery response payload. Debug fields ride along under underscored
/// names and never affect the primary results.
#[derive(Debug, Serialize)]
pub struct MoodDiscoverPage {
    pub page: usize,
    pub results: Vec<MovieSummary>,
    pub total_pages: usize,
    pub total_results: usize,

    #[serde(rename = "_mood", skip_serializing_if = "Option::is_none")]
    pub debug_mood: Option<String>,
    #[serde(rename = "_filters", skip_serializing_if = "Option::is_none")]
    pub debug_filters: Option<DiscoverFilters>,
    #[serde(rename = "_sizes", skip_serializing_if = "Option::is_none")]
    pub debug_sizes: Option<BucketSizes>,
    #[serde(rename = "_picked_examples", skip_serializing_if = "Option::is_none")]
    pub debug_picked_examples: Option<Vec<u64>>,
    #[serde(rename = "_force_providers", skip_serializing_if = "Option::is_none")]
    pub debug_force_providers: Option<bool>,
    #[serde(rename = "_providers", skip_serializing_if = "Option::is_none")]
    pub debug_providers: Option<String>,
    #[serde(rename = "_broad", skip_serializing_if = "Option::is_none")]
    pub debug_broad: Option<bool>,
    #[serde(rename = "_keywords", skip_serializing_if = "Option::is_none")]
    pub debug_keywords: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct BucketSizes {
    pub strict: usize,
    pub strict_wide: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mood::rules::rule_for;

    fn get<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_feelgood_params_carry_certification_cap() {
        let rule = rule_for("feelgood").unwrap();
        let params =
            build_discover_params(rule, "GB", "", "flatrate,ads,free", &DiscoverFilters::default());

        assert_eq!(get(&params, "watch_region"), Some("GB"));
        assert_eq!(get(&params, "certification_country"), Some("US"));
        assert_eq!(get(&params, "certification.lte"), Some("PG-13"));
        assert_eq!(get(&params, "include_adult"), Some("false"));
        assert_eq!(get(&params, "sort_by"), Some("popularity.desc"));
        assert_eq!(get(&params, "with_genres"), Some("35|10751|10402|10749|16|12"));
        assert_eq!(get(&params, "without_genres"), Some("27,53,80,9648"));
    }

    #[test]
    fn test_vote_floor_wins_over_weaker_request_filter() {
        let rule = rule_for("feelgood").unwrap();
        let filters = DiscoverFilters {
            min_votes: Some(10),
            ..DiscoverFilters::default()
        };
        let params = build_discover_params(rule, "GB", "8|337", "flatrate,ads,free", &filters);

        assert_eq!(get(&params, "vote_count.gte"), Some("100"));
        assert_eq!(get(&params, "watch_region"), Some("GB"));
        assert_eq!(get(&params, "with_watch_providers"), Some("8|337"));
    }

    #[test]
    fn test_stronger_request_filter_wins_over_floor() {
        let rule = rule_for("feelgood").unwrap();
        let filters = DiscoverFilters {
            min_votes: Some(500),
            ..DiscoverFilters::default()
        };
        let params = build_discover_params(rule, "GB", "", "flatrate", &filters);
        assert_eq!(get(&params, "vote_count.gte"), Some("500"));
    }

    #[test]
    fn test_request_sort_override() {
        let rule = rule_for("scary").unwrap();
        let filters = DiscoverFilters {
            sort_by: Some("vote_average.desc".to_string()),
            ..DiscoverFilters::default()
        };
        let params = build_discover_params(rule, "GB", "", "flatrate", &filters);
        assert_eq!(get(&params, "sort_by"), Some("vote_average.desc"));
    }

    #[test]
    fn test_year_range_becomes_release_dates() {
        let rule = rule_for("scary").unwrap();
        let filters = DiscoverFilters {
            year_from: Some(1990),
            year_to: Some(1999),
            ..DiscoverFilters::default()
        };
        let params = build_discover_params(rule, "GB", "", "flatrate", &filters);
        assert_eq!(get(&params, "primary_release_date.gte"), Some("1990-01-01"));
        assert_eq!(get(&params, "primary_release_date.lte"), Some("1999-12-31"));
    }

    #[test]
    fn test_normalize_defaults() {
        let req = DiscoverQuery::default().normalize();
        assert_eq!(req.region, "GB");
        assert_eq!(req.types, "flatrate,ads,free");
        assert_eq!(req.page, 1);
        assert!(!req.broad);
        assert!(!req.debug);
        assert_eq!(req.filters, DiscoverFilters::default());
    }

    #[test]
    fn test_normalize_clamps_bad_values_instead_of_failing() {
        let query = DiscoverQuery {
            page: Some("banana".to_string()),
            runtime_gte: Some("5".to_string()),
            runtime_lte: Some("900".to_string()),
            lang: Some("portuguese".to_string()),
            min_votes: Some("lots".to_string()),
            ..DiscoverQuery::default()
        };
        let req = query.normalize();
        assert_eq!(req.page, 1);
        assert_eq!(req.filters.runtime_gte, Some(40));
        assert_eq!(req.filters.runtime_lte, Some(240));
        assert_eq!(req.filters.lang.as_deref(), Some("portu"));
        assert_eq!(req.filters.min_votes, None);
    }

    #[test]
    fn test_normalize_auto_raises_votes_for_high_rating() {
        let query = DiscoverQuery {
            tmdb_min: Some("7.5".to_string()),
            ..DiscoverQuery::default()
        };
        assert_eq!(query.normalize().filters.min_votes, Some(50));

        let explicit = DiscoverQuery {
            tmdb_min: Some("7.5".to_string()),
            min_votes: Some("10".to_string()),
            ..DiscoverQuery::default()
        };
        assert_eq!(explicit.normalize().filters.min_votes, Some(10));

        let low_bar = DiscoverQuery {
            tmdb_min: Some("5".to_string()),
            ..DiscoverQuery::default()
        };
        assert_eq!(low_bar.normalize().filters.min_votes, None);
    }

    #[test]
    fn test_flag_parsing() {
        for truthy in ["1", "true", "yes"] {
            let query = DiscoverQuery {
                broad: Some(truthy.to_string()),
                ..DiscoverQuery::default()
            };
            assert!(query.normalize().broad, "{} should be truthy", truthy);
        }
        let query = DiscoverQuery {
            broad: Some("0".to_string()),
            ..DiscoverQuery::default()
        };
        assert!(!query.normalize().broad);
    }

    fn synthetic_movies(n: usize) -> Vec<MovieSummary> {
        (1..=n)
            .map(|i| serde_json::from_value(serde_json::json!({"id": i})).unwrap())
            .collect()
    }

    #[test]
    fn test_paginate_caps_page_size() {
        let movies = synthetic_movies(45);
        let (page1, total_pages, total_results) = paginate(&movies, 1);
        assert_eq!(page1.len(), 20);
        assert_eq!(total_pages, 3);
        assert_eq!(total_results, 45);

        let (page3, _, _) = paginate(&movies, 3);
        assert_eq!(page3.len(), 5);
    }

    #[test]
    fn test_paginate_past_end_is_empty_not_error() {
        let movies = synthetic_movies(5);
        let (results, total_pages, _) = paginate(&movies, 9);
        assert!(results.is_empty());
        assert_eq!(total_pages, 1);
    }

    #[test]
    fn test_paginate_empty_set() {
        let (results, total_pages, total_results) = paginate(&[], 1);
        assert!(results.is_empty());
        assert_eq!(total_pages, 1);
        assert_eq!(total_results, 0);
    }

    #[test]
    fn test_fingerprint_tag_distinguishes_filters() {
        let a = DiscoverFilters::default();
        let b = DiscoverFilters {
            lang: Some("fr".to_string()),
            ..DiscoverFilters::default()
        };
        assert_ne!(a.fingerprint_tag(), b.fingerprint_tag());
        assert_eq!(a.fingerprint_tag(), DiscoverFilters::default().fingerprint_tag());
    }

    #[test]
    fn test_debug_fields_are_omitted_when_unset() {
        let page = MoodDiscoverPage {
            page: 1,
            results: Vec::new(),
            total_pages: 1,
            total_results: 0,
            debug_mood: None,
            debug_filters: None,
            debug_sizes: None,
            debug_picked_examples: None,
            debug_force_providers: None,
            debug_providers: None,
            debug_broad: None,
            debug_keywords: None,
        };
        let value = serde_json::to_value(&page).unwrap();
        assert!(value.get("_mood").is_none());
        assert!(value.get("_sizes").is_none());
    }
}
