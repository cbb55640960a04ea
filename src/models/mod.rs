use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The subset of a TMDB movie object the mood engine consumes.
///
/// Discover pages carry `genre_ids`, detail lookups carry `genres`; both are
/// kept so enrichment can overlay detail data onto a discover candidate.
/// Every field we don't model is preserved in `extra` so proxy responses
/// pass the upstream payload through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieSummary {
    pub id: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre_ids: Option<Vec<u64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<GenreRef>>,

    #[serde(default)]
    pub popularity: f64,

    #[serde(default)]
    pub vote_count: u64,

    #[serde(default)]
    pub vote_average: f64,

    /// Per-region availability, attached during enrichment or detail fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch_providers: Option<HashMap<String, RegionAvailability>>,

    /// Certification data, attached during enrichment or detail fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_dates: Option<ReleaseDates>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MovieSummary {
    /// Genre IDs from whichever wire shape is present.
    pub fn genre_id_set(&self) -> HashSet<u64> {
        if let Some(ids) = &self.genre_ids {
            return ids.iter().copied().collect();
        }
        if let Some(genres) = &self.genres {
            return genres.iter().map(|g| g.id).collect();
        }
        HashSet::new()
    }

    /// Provider IDs available in `region`, falling back to US data when the
    /// requested region has no entry. `None` means availability was never
    /// attached (unchecked), as opposed to checked-and-empty.
    pub fn providers_in_region(&self, region: &str) -> Option<HashSet<u64>> {
        let wp = self.watch_providers.as_ref()?;
        let block = wp.get(region).or_else(|| wp.get("US"));
        Some(block.map(RegionAvailability::provider_ids).unwrap_or_default())
    }

    /// Whether any availability block exists for `region` (or the US fallback).
    pub fn has_region_availability(&self, region: &str) -> bool {
        self.watch_providers
            .as_ref()
            .map(|wp| wp.contains_key(region) || wp.contains_key("US"))
            .unwrap_or(false)
    }

    /// First non-empty certification recorded for `country`.
    pub fn certification_in(&self, country: &str) -> Option<String> {
        let releases = self.release_dates.as_ref()?;
        releases
            .results
            .iter()
            .find(|r| r.iso_3166_1 == country)?
            .release_dates
            .iter()
            .map(|r| r.certification.trim())
            .find(|c| !c.is_empty())
            .map(str::to_string)
    }

    /// Lifts `watch/providers` out of the passthrough blob into the typed
    /// field. Detail payloads nest it as `{"watch/providers": {"results": {..}}}`.
    pub fn adopt_providers_from_extra(&mut self) {
        if self.watch_providers.is_some() {
            return;
        }
        let parsed = self
            .extra
            .get("watch/providers")
            .and_then(|wp| wp.get("results"))
            .and_then(|r| serde_json::from_value(r.clone()).ok());
        if parsed.is_some() {
            self.watch_providers = parsed;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreRef {
    pub id: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One region's availability buckets from TMDB `watch/providers`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionAvailability {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flatrate: Vec<ProviderRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ads: Vec<ProviderRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub free: Vec<ProviderRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rent: Vec<ProviderRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buy: Vec<ProviderRef>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RegionAvailability {
    pub fn provider_ids(&self) -> HashSet<u64> {
        [&self.flatrate, &self.ads, &self.free, &self.rent, &self.buy]
            .into_iter()
            .flatten()
            .filter_map(|p| p.provider_id)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRef {
    #[serde(default)]
    pub provider_id: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// TMDB `release_dates` append block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseDates {
    #[serde(default)]
    pub results: Vec<CountryReleases>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryReleases {
    pub iso_3166_1: String,
    #[serde(default)]
    pub release_dates: Vec<ReleaseStamp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseStamp {
    #[serde(default)]
    pub certification: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One page of TMDB `/discover/movie` or `/search/movie` results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoverPage {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub results: Vec<MovieSummary>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Keyword {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeywordsResponse {
    #[serde(default)]
    pub keywords: Vec<Keyword>,
}

/// TMDB `/search/person` page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonPage {
    #[serde(default)]
    pub results: Vec<PersonSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonSummary {
    pub id: u64,
    #[serde(default)]
    pub popularity: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// TMDB `/person/{id}/movie_credits` cast block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonCredits {
    #[serde(default)]
    pub cast: Vec<MovieSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn movie(value: serde_json::Value) -> MovieSummary {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_genre_ids_from_discover_shape() {
        let m = movie(json!({"id": 1, "genre_ids": [35, 18]}));
        assert_eq!(m.genre_id_set(), HashSet::from([35, 18]));
    }

    #[test]
    fn test_genre_ids_from_detail_shape() {
        let m = movie(json!({"id": 1, "genres": [{"id": 27, "name": "Horror"}]}));
        assert_eq!(m.genre_id_set(), HashSet::from([27]));
    }

    #[test]
    fn test_genre_ids_missing_is_empty() {
        let m = movie(json!({"id": 1}));
        assert!(m.genre_id_set().is_empty());
    }

    #[test]
    fn test_providers_in_region_unchecked_is_none() {
        let m = movie(json!({"id": 1}));
        assert_eq!(m.providers_in_region("GB"), None);
    }

    #[test]
    fn test_providers_in_region_falls_back_to_us() {
        let m = movie(json!({
            "id": 1,
            "watch_providers": {
                "US": {"flatrate": [{"provider_id": 8}], "rent": [{"provider_id": 2}]}
            }
        }));
        assert_eq!(m.providers_in_region("GB"), Some(HashSet::from([8, 2])));
        assert!(m.has_region_availability("GB"));
    }

    #[test]
    fn test_providers_checked_but_absent_region_is_empty() {
        let m = movie(json!({
            "id": 1,
            "watch_providers": {"FR": {"flatrate": [{"provider_id": 8}]}}
        }));
        assert_eq!(m.providers_in_region("GB"), Some(HashSet::new()));
        assert!(!m.has_region_availability("GB"));
    }

    #[test]
    fn test_certification_skips_blank_entries() {
        let m = movie(json!({
            "id": 1,
            "release_dates": {"results": [
                {"iso_3166_1": "US", "release_dates": [
                    {"certification": ""},
                    {"certification": "PG-13"}
                ]}
            ]}
        }));
        assert_eq!(m.certification_in("US"), Some("PG-13".to_string()));
        assert_eq!(m.certification_in("GB"), None);
    }

    #[test]
    fn test_adopt_providers_from_detail_payload() {
        let mut m = movie(json!({
            "id": 603,
            "title": "The Matrix",
            "watch/providers": {"results": {
                "GB": {"flatrate": [{"provider_id": 337, "provider_name": "Disney Plus"}]}
            }}
        }));
        assert!(m.watch_providers.is_none());
        m.adopt_providers_from_extra();
        assert_eq!(m.providers_in_region("GB"), Some(HashSet::from([337])));
    }

    #[test]
    fn test_extra_fields_round_trip() {
        let m = movie(json!({"id": 1, "poster_path": "/abc.jpg", "overview": "x"}));
        let out = serde_json::to_value(&m).unwrap();
        assert_eq!(out["poster_path"], "/abc.jpg");
        assert_eq!(out["overview"], "x");
    }
}
