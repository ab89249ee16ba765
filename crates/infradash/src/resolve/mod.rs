//! Free-text municipality lookup.
//!
//! Input and reference names are compared in a normalized form (NFKD,
//! combining marks removed, lowercased, trimmed), so "Šabac", "SABAC" and
//! " sabac " are the same key. Matching runs in tiers and stops at the first
//! tier that produces anything: exact, substring, then fuzzy.

use ahash::AHashMap as HashMap;
use itertools::Itertools;
use tracing::{debug, instrument, trace};
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::config::ResolverConfig;

pub mod selection;

pub use selection::{SelectionOutcome, SelectionState};

/// Normalize text for name comparison.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

/// Which tier produced a [`Resolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Substring,
    Fuzzy,
    /// Nothing matched, or the input was blank
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub tier: MatchTier,
    pub names: Vec<String>,
}

impl Resolution {
    fn none() -> Self {
        Self {
            tier: MatchTier::None,
            names: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct NameEntry {
    key: String,
    display: String,
}

/// The canonical municipality names, indexed by normalized key.
///
/// Names that normalize to the same key collapse into one entry: the entry
/// keeps the position of the first occurrence and the display name of the
/// last one.
#[derive(Debug, Clone, Default)]
pub struct MunicipalityNames {
    entries: Vec<NameEntry>,
    by_key: HashMap<String, usize>,
}

impl MunicipalityNames {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::default();
        for name in names {
            index.insert(name.as_ref());
        }
        index
    }

    fn insert(&mut self, name: &str) {
        let key = normalize(name);
        if key.is_empty() {
            trace!(name, "Ignoring name that normalizes to nothing");
            return;
        }
        if let Some(&idx) = self.by_key.get(&key) {
            debug!(name, previous = %self.entries[idx].display, "Duplicate normalized name");
            self.entries[idx].display = name.to_string();
            return;
        }
        self.by_key.insert(key.clone(), self.entries.len());
        self.entries.push(NameEntry {
            key,
            display: name.to_string(),
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `name` is a canonical display name, compared verbatim.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_key
            .get(&normalize(name))
            .is_some_and(|&idx| self.entries[idx].display == name)
    }

    /// Display names in reference order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.display.as_str())
    }

    /// Match `raw` against the reference set.
    ///
    /// Blank input yields no matches; callers are expected to skip the lookup
    /// altogether (see [`SelectionState::apply`]).
    #[instrument(name = "Resolve municipality", skip(self, config), level = "debug")]
    pub fn resolve_with_tier(&self, raw: &str, config: &ResolverConfig) -> Resolution {
        let query = normalize(raw);
        if query.is_empty() {
            return Resolution::none();
        }

        if let Some(&idx) = self.by_key.get(&query) {
            return Resolution {
                tier: MatchTier::Exact,
                names: vec![self.entries[idx].display.clone()],
            };
        }

        let substring: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key.contains(&query))
            .map(|e| e.display.clone())
            .collect();
        if !substring.is_empty() {
            debug!(matches = substring.len(), "Substring matches");
            return Resolution {
                tier: MatchTier::Substring,
                names: substring,
            };
        }

        // Stable sort keeps reference order between equal scores.
        let fuzzy: Vec<String> = self
            .entries
            .iter()
            .map(|e| (similarity(&query, &e.key), e))
            .filter(|(score, _)| *score >= config.fuzzy_threshold)
            .sorted_by(|a, b| b.0.total_cmp(&a.0))
            .take(config.max_fuzzy_candidates)
            .map(|(score, e)| {
                trace!(name = %e.display, score, "Fuzzy candidate");
                e.display.clone()
            })
            .collect();
        if fuzzy.is_empty() {
            debug!(query, "No municipality matched");
            return Resolution::none();
        }
        Resolution {
            tier: MatchTier::Fuzzy,
            names: fuzzy,
        }
    }

    /// Ordered list of canonical names matching `raw`.
    #[must_use]
    pub fn resolve(&self, raw: &str, config: &ResolverConfig) -> Vec<String> {
        self.resolve_with_tier(raw, config).names
    }
}

/// Similarity of two normalized strings in `[0, 1]`.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    rapidfuzz::fuzz::ratio(a.chars(), b.chars())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> MunicipalityNames {
        MunicipalityNames::new(["Veliko Gradište", "Niš", "Šabac"])
    }

    fn resolve(raw: &str) -> Vec<String> {
        names().resolve(raw, &ResolverConfig::default())
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Šabac"), "sabac");
        assert_eq!(normalize("  Veliko Gradište "), "veliko gradiste");
        assert_eq!(normalize("NIŠ"), "nis");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_exact_match_is_single() {
        assert_eq!(resolve("nis"), vec!["Niš"]);
        assert_eq!(resolve("Niš"), vec!["Niš"]);
        for name in names().iter() {
            assert_eq!(resolve(&normalize(name)), vec![name.to_string()]);
        }
    }

    #[test]
    fn test_diacritics_are_ignored() {
        assert_eq!(resolve("Sabac"), resolve("Šabac"));
        assert_eq!(resolve("sabac"), vec!["Šabac"]);
    }

    #[test]
    fn test_substring() {
        assert_eq!(resolve("gradiste"), vec!["Veliko Gradište"]);
        assert!(resolve("sa").contains(&"Šabac".to_string()));
    }

    #[test]
    fn test_substring_keeps_reference_order() {
        let index = MunicipalityNames::new(["Novi Sad", "Šabac", "Sabanta"]);
        let found = index.resolve_with_tier("sa", &ResolverConfig::default());
        assert_eq!(found.tier, MatchTier::Substring);
        assert_eq!(found.names, vec!["Novi Sad", "Šabac", "Sabanta"]);
    }

    #[test]
    fn test_fuzzy_fallback() {
        let found = names().resolve_with_tier("Sabbac", &ResolverConfig::default());
        assert_eq!(found.tier, MatchTier::Fuzzy);
        assert_eq!(found.names, vec!["Šabac"]);
    }

    #[test]
    fn test_fuzzy_caps_candidates_and_orders_by_score() {
        let index = MunicipalityNames::new(["Bor", "Bar", "Ber", "Bir", "Boran"]);
        let found = index.resolve_with_tier("bxr", &ResolverConfig::default());
        assert_eq!(found.tier, MatchTier::Fuzzy);
        assert_eq!(found.names, vec!["Bor", "Bar", "Ber"]);
    }

    #[test]
    fn test_no_match() {
        assert!(resolve("xyz123").is_empty());
        assert!(resolve("").is_empty());
        assert!(resolve("   ").is_empty());
    }

    #[test]
    fn test_duplicate_normalized_names_collapse() {
        let index = MunicipalityNames::new(["Sabac", "Niš", "Šabac"]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.iter().collect::<Vec<_>>(), vec!["Šabac", "Niš"]);
        assert!(index.contains("Šabac"));
        assert!(!index.contains("Sabac"));
    }

    #[test]
    fn test_similarity_bounds() {
        assert!((similarity("nis", "nis") - 1.0).abs() < f64::EPSILON);
        assert!(similarity("abc", "xyz").abs() < f64::EPSILON);
    }
}
