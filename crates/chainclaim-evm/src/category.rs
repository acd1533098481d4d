//! Fixed token id → category lookup.

use std::collections::BTreeMap;

/// Category used for ids missing from the map.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Maps raw token ids to human-meaningful categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMap {
    labels: BTreeMap<String, String>,
    fallback: String,
}

impl CategoryMap {
    pub fn new<I, K, V>(labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            labels: labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            fallback: UNKNOWN_CATEGORY.to_string(),
        }
    }

    /// The Bronze / Silver / Gold tiers (ids 0, 1, 2).
    pub fn tiers() -> Self {
        Self::new([("0", "Bronze"), ("1", "Silver"), ("2", "Gold")])
    }

    pub fn category(&self, token_id: &str) -> &str {
        self.labels
            .get(token_id)
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }

    /// Every category, including the fallback, for seeding report counters.
    pub fn categories(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.labels.len() + 1);
        for label in self.labels.values().chain(std::iter::once(&self.fallback)) {
            if !out.contains(label) {
                out.push(label.clone());
            }
        }
        out
    }
}

impl Default for CategoryMap {
    fn default() -> Self {
        Self::tiers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_lookup() {
        let map = CategoryMap::tiers();
        assert_eq!(map.category("0"), "Bronze");
        assert_eq!(map.category("1"), "Silver");
        assert_eq!(map.category("2"), "Gold");
        assert_eq!(map.category("3"), UNKNOWN_CATEGORY);
    }

    #[test]
    fn categories_include_fallback_once() {
        let map = CategoryMap::new([("7", "Rare"), ("8", "Rare")]);
        assert_eq!(map.categories(), vec!["Rare".to_string(), "Unknown".to_string()]);
        assert_eq!(
            CategoryMap::tiers().categories(),
            vec!["Bronze", "Silver", "Gold", "Unknown"]
        );
    }
}
