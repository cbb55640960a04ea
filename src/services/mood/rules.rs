use crate::error::{AppError, AppResult};

/// Default upstream sort order for a mood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortHint {
    PopularityDesc,
    VoteAverageDesc,
    ReleaseDateDesc,
}

impl SortHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortHint::PopularityDesc => "popularity.desc",
            SortHint::VoteAverageDesc => "vote_average.desc",
            SortHint::ReleaseDateDesc => "primary_release_date.desc",
        }
    }
}

/// Static rule for one mood: genre gating, certification cap, vote floor,
/// base pins and base soft keywords. Admin overrides layer on top of the
/// base lists at request time; the rule itself never changes at runtime.
#[derive(Debug)]
pub struct MoodRule {
    /// OR-matched allow-list; empty means no positive requirement.
    pub include_genres_any: &'static [u64],
    /// AND-matched deny-list; enforced regardless of gate mode.
    pub exclude_genres: &'static [u64],
    /// When false, includes are advisory and only excludes are enforced.
    pub enforce_genre_gate: bool,
    pub certification_country: Option<&'static str>,
    pub certification_ceiling: Option<&'static str>,
    /// Candidates below this vote count are not trusted at face value.
    pub min_votes_floor: u32,
    pub sort_hint: SortHint,
    /// Curated pinned TMDB movie IDs, always surfaced first.
    pub pinned_base: &'static [u64],
    /// TMDB keyword IDs used as a soft ranking signal only, never as an
    /// upstream filter.
    pub keyword_base: &'static [&'static str],
    /// Softly demote dramas with no lighter secondary genre.
    pub nudge_heavy_drama: bool,
}

// TMDB genre IDs used below:
// 12 adventure, 16 animation, 18 drama, 27 horror, 28 action, 35 comedy,
// 53 thriller, 80 crime, 878 sci-fi, 9648 mystery, 10402 music,
// 10749 romance, 10751 family

const FEELGOOD: MoodRule = MoodRule {
    include_genres_any: &[35, 10751, 10402, 10749, 16, 12],
    exclude_genres: &[27, 53, 80, 9648],
    enforce_genre_gate: true,
    certification_country: Some("US"),
    certification_ceiling: Some("PG-13"),
    min_votes_floor: 100,
    sort_hint: SortHint::PopularityDesc,
    pinned_base: &[260513, 398181, 210577, 496243],
    keyword_base: &["180547", "3370", "211029"],
    nudge_heavy_drama: true,
};

const HEARTWARMING: MoodRule = MoodRule {
    include_genres_any: &[18, 10751, 10749],
    exclude_genres: &[27, 53],
    enforce_genre_gate: true,
    certification_country: Some("US"),
    certification_ceiling: Some("PG-13"),
    min_votes_floor: 100,
    sort_hint: SortHint::PopularityDesc,
    pinned_base: &[10193, 109445, 19404],
    keyword_base: &["180547", "9826", "207317"],
    nudge_heavy_drama: false,
};

const HIGH_ENERGY: MoodRule = MoodRule {
    include_genres_any: &[28, 12, 53, 878],
    exclude_genres: &[],
    enforce_genre_gate: false,
    certification_country: None,
    certification_ceiling: None,
    min_votes_floor: 50,
    sort_hint: SortHint::PopularityDesc,
    pinned_base: &[497698, 353081, 324857, 299536],
    keyword_base: &["9715", "616", "15060"],
    nudge_heavy_drama: false,
};

const CHILL: MoodRule = MoodRule {
    include_genres_any: &[35, 18],
    exclude_genres: &[27, 53],
    enforce_genre_gate: false,
    certification_country: Some("US"),
    certification_ceiling: Some("PG-13"),
    min_votes_floor: 80,
    sort_hint: SortHint::PopularityDesc,
    pinned_base: &[97630, 490132, 19404],
    keyword_base: &["158718", "179431", "195970"],
    nudge_heavy_drama: false,
};

const MIND_BENDING: MoodRule = MoodRule {
    include_genres_any: &[9648, 878, 53],
    exclude_genres: &[10751],
    enforce_genre_gate: false,
    certification_country: None,
    certification_ceiling: None,
    min_votes_floor: 50,
    sort_hint: SortHint::PopularityDesc,
    pinned_base: &[62, 27205, 1124, 419430],
    keyword_base: &["4565", "804", "11109"],
    nudge_heavy_drama: false,
};

const ROMANTIC: MoodRule = MoodRule {
    include_genres_any: &[10749, 35, 18],
    exclude_genres: &[27, 53],
    enforce_genre_gate: true,
    certification_country: Some("US"),
    certification_ceiling: Some("PG-13"),
    min_votes_floor: 80,
    sort_hint: SortHint::PopularityDesc,
    pinned_base: &[194, 13, 744, 19913],
    keyword_base: &["9856", "1599", "210024"],
    nudge_heavy_drama: false,
};

const FAMILY: MoodRule = MoodRule {
    include_genres_any: &[10751, 16, 12],
    exclude_genres: &[27, 53, 80],
    enforce_genre_gate: true,
    certification_country: Some("US"),
    certification_ceiling: Some("PG-13"),
    min_votes_floor: 50,
    sort_hint: SortHint::PopularityDesc,
    pinned_base: &[862, 150540, 260513],
    keyword_base: &["9713", "9714", "158718"],
    nudge_heavy_drama: false,
};

const SCARY: MoodRule = MoodRule {
    include_genres_any: &[27, 53],
    exclude_genres: &[],
    enforce_genre_gate: false,
    certification_country: None,
    certification_ceiling: None,
    min_votes_floor: 50,
    sort_hint: SortHint::PopularityDesc,
    pinned_base: &[381288, 631843, 346364],
    keyword_base: &["9719", "9718", "9717"],
    nudge_heavy_drama: false,
};

const TEARJERKER: MoodRule = MoodRule {
    include_genres_any: &[18, 10749],
    exclude_genres: &[27, 53],
    enforce_genre_gate: true,
    certification_country: Some("US"),
    certification_ceiling: Some("PG-13"),
    min_votes_floor: 80,
    sort_hint: SortHint::PopularityDesc,
    pinned_base: &[598, 4922, 77338, 730154],
    keyword_base: &["4344", "179430", "287501"],
    nudge_heavy_drama: false,
};

const DARK_GRITTY: MoodRule = MoodRule {
    include_genres_any: &[80, 53, 18],
    exclude_genres: &[10751, 16, 10402, 10749],
    enforce_genre_gate: false,
    certification_country: None,
    certification_ceiling: None,
    min_votes_floor: 50,
    sort_hint: SortHint::PopularityDesc,
    pinned_base: &[680, 155, 807, 500],
    keyword_base: &["9716", "9710", "9824"],
    nudge_heavy_drama: false,
};

/// All mood names, sorted, for config listings.
pub const MOODS: &[&str] = &[
    "chill",
    "dark_gritty",
    "family",
    "feelgood",
    "heartwarming",
    "high_energy",
    "mind_bending",
    "romantic",
    "scary",
    "tearjerker",
];

pub fn rule_for(mood: &str) -> Option<&'static MoodRule> {
    match mood {
        "feelgood" => Some(&FEELGOOD),
        "heartwarming" => Some(&HEARTWARMING),
        "high_energy" => Some(&HIGH_ENERGY),
        "chill" => Some(&CHILL),
        "mind_bending" => Some(&MIND_BENDING),
        "romantic" => Some(&ROMANTIC),
        "family" => Some(&FAMILY),
        "scary" => Some(&SCARY),
        "tearjerker" => Some(&TEARJERKER),
        "dark_gritty" => Some(&DARK_GRITTY),
        _ => None,
    }
}

/// Lookup that fails fast with a client error for unrecognized moods.
pub fn require_rule(mood: &str) -> AppResult<&'static MoodRule> {
    rule_for(mood).ok_or_else(|| AppError::UnknownMood(mood.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_listed_mood_has_a_rule() {
        for mood in MOODS {
            assert!(rule_for(mood).is_some(), "no rule for {}", mood);
        }
    }

    #[test]
    fn test_unknown_mood_is_a_client_error() {
        assert!(rule_for("cozy").is_none());
        assert!(matches!(
            require_rule("cozy"),
            Err(AppError::UnknownMood(m)) if m == "cozy"
        ));
    }

    #[test]
    fn test_feelgood_caps_certification() {
        let rule = rule_for("feelgood").unwrap();
        assert_eq!(rule.certification_country, Some("US"));
        assert_eq!(rule.certification_ceiling, Some("PG-13"));
        assert!(rule.enforce_genre_gate);
        assert_eq!(rule.min_votes_floor, 100);
    }

    #[test]
    fn test_lenient_moods_still_carry_excludes() {
        let rule = rule_for("dark_gritty").unwrap();
        assert!(!rule.enforce_genre_gate);
        assert!(rule.exclude_genres.contains(&10751));
    }

    #[test]
    fn test_moods_list_is_sorted() {
        let mut sorted = MOODS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, MOODS);
    }
}
