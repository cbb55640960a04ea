use std::collections::HashMap;

use crate::{
    db::{Cache, CacheKey},
    error::AppResult,
};

use super::rules::require_rule;

/// Overrides go stale after 30 days of no admin activity; every write
/// re-arms the clock.
const OVERRIDE_TTL: u64 = 60 * 60 * 24 * 30;

type PinMap = HashMap<String, Vec<u64>>;
type KeywordMap = HashMap<String, Vec<String>>;

/// Admin-editable additions to the rule table: pinned movie IDs and soft
/// keyword IDs per mood, stored in the shared cache. Effective values put
/// override entries before base entries, deduplicated.
#[derive(Clone)]
pub struct OverrideStore {
    cache: Cache,
}

impl OverrideStore {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }

    async fn pin_map(&self) -> AppResult<PinMap> {
        Ok(self
            .cache
            .get_from_cache(&CacheKey::PinOverrides)
            .await?
            .unwrap_or_default())
    }

    async fn keyword_map(&self) -> AppResult<KeywordMap> {
        Ok(self
            .cache
            .get_from_cache(&CacheKey::KeywordOverrides)
            .await?
            .unwrap_or_default())
    }

    /// Current pin override list for a mood (empty when unset).
    pub async fn pin_override(&self, mood: &str) -> AppResult<Vec<u64>> {
        require_rule(mood)?;
        Ok(self.pin_map().await?.remove(mood).unwrap_or_default())
    }

    pub async fn keyword_override(&self, mood: &str) -> AppResult<Vec<String>> {
        require_rule(mood)?;
        Ok(self.keyword_map().await?.remove(mood).unwrap_or_default())
    }

    /// Override-then-base pins, deduplicated keeping first occurrence.
    pub async fn effective_pins(&self, mood: &str) -> AppResult<Vec<u64>> {
        let rule = require_rule(mood)?;
        let map = self.pin_map().await?;
        let ov = map.get(mood).map(Vec::as_slice).unwrap_or(&[]);
        Ok(merge_first_wins(ov, rule.pinned_base))
    }

    pub async fn effective_keywords(&self, mood: &str) -> AppResult<Vec<String>> {
        let rule = require_rule(mood)?;
        let map = self.keyword_map().await?;
        let ov = map.get(mood).map(Vec::as_slice).unwrap_or(&[]);
        let base: Vec<String> = rule.keyword_base.iter().map(|k| k.to_string()).collect();
        Ok(merge_first_wins(ov, &base))
    }

    /// Full replace of the override lists for every mood in the patch.
    /// Validation happens before any write, so a bad mood key leaves the
    /// stored maps untouched.
    pub async fn replace_pins(&self, patch: PinMap) -> AppResult<()> {
        for mood in patch.keys() {
            require_rule(mood)?;
        }
        if patch.is_empty() {
            return Ok(());
        }
        let mut map = self.pin_map().await?;
        map.extend(patch);
        self.cache.set(&CacheKey::PinOverrides, &map, OVERRIDE_TTL).await
    }

    pub async fn replace_keywords(&self, patch: KeywordMap) -> AppResult<()> {
        for mood in patch.keys() {
            require_rule(mood)?;
        }
        if patch.is_empty() {
            return Ok(());
        }
        let mut map = self.keyword_map().await?;
        map.extend(patch);
        self.cache
            .set(&CacheKey::KeywordOverrides, &map, OVERRIDE_TTL)
            .await
    }

    /// Incremental pin edit; additions front-load so the most recently
    /// pinned title floats highest. Returns the updated override list.
    pub async fn mutate_pins(&self, mood: &str, add: &[u64], remove: &[u64]) -> AppResult<Vec<u64>> {
        require_rule(mood)?;
        let mut map = self.pin_map().await?;
        let current = map.entry(mood.to_string()).or_default();
        apply_mutation(current, add, remove);
        let updated = current.clone();
        self.cache.set(&CacheKey::PinOverrides, &map, OVERRIDE_TTL).await?;
        Ok(updated)
    }

    pub async fn mutate_keywords(
        &self,
        mood: &str,
        add: &[String],
        remove: &[String],
    ) -> AppResult<Vec<String>> {
        require_rule(mood)?;
        let mut map = self.keyword_map().await?;
        let current = map.entry(mood.to_string()).or_default();
        apply_mutation(current, add, remove);
        let updated = current.clone();
        self.cache
            .set(&CacheKey::KeywordOverrides, &map, OVERRIDE_TTL)
            .await?;
        Ok(updated)
    }
}

/// Override entries first, base entries after, first occurrence wins.
pub fn merge_first_wins<T: PartialEq + Clone>(overrides: &[T], base: &[T]) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(overrides.len() + base.len());
    for item in overrides.iter().chain(base) {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

/// Front-inserts additions (preserving their given order, skipping ones
/// already present), then filters removals by exact match. Idempotent
/// under repeated identical input.
pub fn apply_mutation<T: PartialEq + Clone>(current: &mut Vec<T>, add: &[T], remove: &[T]) {
    for item in add.iter().rev() {
        if !current.contains(item) {
            current.insert(0, item.clone());
        }
    }
    if !remove.is_empty() {
        current.retain(|x| !remove.contains(x));
    }
}
