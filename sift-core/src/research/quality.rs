//! Domain authority and snippet-level quality heuristics.
//!
//! The authority table is immutable configuration: it is built once, shared
//! read-only across requests, and never mutated after construction.

use crate::types::RawSearchResult;
use serde::{Deserialize, Serialize};

/// Words that mark a query or concept list as a cooking request.
pub const RECIPE_TERMS: &[&str] = &[
    "recipe", "recipes", "cook", "cooking", "bake", "baking", "roast", "grill", "dish",
    "dinner", "lunch", "breakfast", "dessert", "ingredients", "lasagna", "soup", "stew",
    "curry", "pasta", "bread", "cake", "cookies", "salad", "sauce", "casserole", "pie",
];

/// Ingredients uncommon enough to warrant a substitution search.
pub const UNUSUAL_INGREDIENTS: &[&str] = &[
    "nutritional yeast", "aquafaba", "tahini", "miso", "tempeh", "seitan", "jackfruit",
    "agar", "xanthan gum", "psyllium", "gochujang", "sumac", "za'atar", "asafoetida",
    "cashew cream", "tofu ricotta", "liquid smoke", "kombu", "black garlic", "yuzu",
    "fenugreek", "tamarind", "galangal", "kala namak",
];

/// Platforms whose content is mostly unvetted or aggregated.
pub const LOW_AUTHORITY_DOMAINS: &[&str] = &[
    "pinterest", "quora", "answers.com", "ehow", "blogspot", "tumblr", "wordpress.com",
    "weebly", "wix", "facebook", "tiktok", "instagram", "yahoo.com/answers", "wikihow",
];

/// One row of the authority table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorityRule {
    /// Substring matched against the lowercased domain.
    pub pattern: String,
    pub score: f64,
}

/// Lookup table from domain patterns to an authority score in [0, 100].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainAuthority {
    rules: Vec<AuthorityRule>,
    /// Score for domains that match nothing.
    fallback: f64,
}

impl Default for DomainAuthority {
    fn default() -> Self {
        let table: &[(&str, f64)] = &[
            // Institutional suffixes
            (".edu", 90.0),
            (".gov", 90.0),
            (".ac.uk", 88.0),
            (".mil", 85.0),
            (".org", 65.0),
            (".com", 50.0),
            (".net", 45.0),
            (".io", 50.0),
            // Reference & research
            ("nih.gov", 95.0),
            ("who.int", 92.0),
            ("nature.com", 92.0),
            ("sciencedirect.com", 88.0),
            ("springer.com", 88.0),
            ("arxiv.org", 80.0),
            ("scholar.google", 85.0),
            ("wikipedia.org", 78.0),
            ("britannica.com", 82.0),
            // News
            ("reuters.com", 88.0),
            ("apnews.com", 88.0),
            ("bbc.co.uk", 85.0),
            ("bbc.com", 85.0),
            ("nytimes.com", 82.0),
            ("theguardian.com", 80.0),
            // Technical
            ("developer.mozilla.org", 92.0),
            ("docs.rs", 88.0),
            ("doc.rust-lang.org", 92.0),
            ("docs.python.org", 92.0),
            ("stackoverflow.com", 80.0),
            ("github.com", 75.0),
            ("learn.microsoft.com", 88.0),
            // Food
            ("seriouseats.com", 82.0),
            ("bonappetit.com", 76.0),
            ("allrecipes.com", 68.0),
            ("foodnetwork.com", 70.0),
            ("budgetbytes.com", 65.0),
            // Community & user-generated
            ("reddit.com", 45.0),
            ("medium.com", 48.0),
            ("dev.to", 55.0),
            ("pinterest", 15.0),
            ("quora", 25.0),
            ("answers.com", 20.0),
            ("ehow", 25.0),
            ("wikihow", 35.0),
            ("blogspot", 30.0),
            ("tumblr", 20.0),
            ("wordpress.com", 32.0),
            ("weebly", 25.0),
            ("wix", 25.0),
            ("facebook", 20.0),
            ("tiktok", 15.0),
            ("instagram", 15.0),
        ];
        Self {
            rules: table
                .iter()
                .map(|(pattern, score)| AuthorityRule {
                    pattern: (*pattern).to_string(),
                    score: *score,
                })
                .collect(),
            fallback: 40.0,
        }
    }
}

impl DomainAuthority {
    /// Build a table from explicit rules.
    pub fn new(rules: Vec<AuthorityRule>, fallback: f64) -> Self {
        Self { rules, fallback }
    }

    /// Authority score for a domain.
    ///
    /// The longest matching pattern wins; equally long matches resolve to the
    /// first rule in the table.
    pub fn score(&self, domain: &str) -> f64 {
        let domain = domain.to_lowercase();
        let mut best: Option<&AuthorityRule> = None;
        for rule in &self.rules {
            if !domain.contains(&rule.pattern) {
                continue;
            }
            if best.is_none_or(|b| rule.pattern.len() > b.pattern.len()) {
                best = Some(rule);
            }
        }
        best.map(|r| r.score).unwrap_or(self.fallback).clamp(0.0, 100.0)
    }
}

/// Whether a domain belongs to the low-authority platform list.
pub fn is_low_authority_domain(domain: &str) -> bool {
    let domain = domain.to_lowercase();
    LOW_AUTHORITY_DOMAINS.iter().any(|d| domain.contains(d))
}

/// Authority of a domain judged by its suffix alone (used on raw search
/// results, before any content has been fetched).
pub fn suffix_authority(domain: &str) -> f64 {
    let domain = domain.to_lowercase();
    if domain.ends_with(".edu") || domain.ends_with(".gov") {
        100.0
    } else if domain.ends_with(".org") {
        75.0
    } else if domain.ends_with(".com") || domain.ends_with(".io") || domain.ends_with(".net") {
        50.0
    } else if domain.is_empty() {
        0.0
    } else {
        40.0
    }
}

/// Quality of one raw search hit in [0, 100]: snippet length weighs 60%,
/// domain-suffix authority 40%, with a penalty for low-authority platforms.
pub fn result_quality(result: &RawSearchResult) -> f64 {
    let snippet_score = (result.snippet.chars().count() as f64 / 200.0).min(1.0) * 100.0;
    let mut score = 0.6 * snippet_score + 0.4 * suffix_authority(&result.domain);
    if is_low_authority_domain(&result.domain) {
        score -= 30.0;
    }
    score.clamp(0.0, 100.0)
}

/// Whether a raw hit looks too thin or too untrustworthy to count.
pub fn is_low_quality(result: &RawSearchResult) -> bool {
    result.snippet.trim().chars().count() < 50 || is_low_authority_domain(&result.domain)
}

/// Mean `result_quality` over a result list; zero when empty.
pub fn average_quality(results: &[RawSearchResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    results.iter().map(result_quality).sum::<f64>() / results.len() as f64
}

/// Unusual ingredients named in `text` (lowercase comparison).
pub fn find_unusual_ingredients(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    UNUSUAL_INGREDIENTS
        .iter()
        .copied()
        .filter(|ing| lower.contains(ing))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_specific_pattern_wins() {
        let table = DomainAuthority::default();
        assert_eq!(table.score("nih.gov"), 95.0);
        assert_eq!(table.score("cdc.gov"), 90.0);
        assert_eq!(table.score("stackoverflow.com"), 80.0);
        assert_eq!(table.score("randomsite.com"), 50.0);
        assert_eq!(table.score("pinterest.com"), 15.0);
        assert_eq!(table.score("unknown.xyz"), 40.0);
    }

    #[test]
    fn test_tie_breaks_on_first_rule() {
        let table = DomainAuthority::new(
            vec![
                AuthorityRule {
                    pattern: "abc".into(),
                    score: 10.0,
                },
                AuthorityRule {
                    pattern: "xyz".into(),
                    score: 90.0,
                },
            ],
            40.0,
        );
        assert_eq!(table.score("abc.xyz"), 10.0);
    }

    #[test]
    fn test_low_quality_detection() {
        let thin = RawSearchResult::new("t", "https://example.com/a", "short", 1);
        assert!(is_low_quality(&thin));

        let pin = RawSearchResult::new(
            "t",
            "https://www.pinterest.com/pin/1",
            "A very long snippet that easily clears the fifty character minimum for quality.",
            1,
        );
        assert!(is_low_quality(&pin));

        let good = RawSearchResult::new(
            "t",
            "https://university.edu/guide",
            "A very long snippet that easily clears the fifty character minimum for quality.",
            1,
        );
        assert!(!is_low_quality(&good));
        assert!(result_quality(&good) > result_quality(&pin));
    }

    #[test]
    fn test_unusual_ingredients() {
        let found = find_unusual_ingredients("Add Nutritional Yeast and a spoon of miso.");
        assert_eq!(found, vec!["nutritional yeast", "miso"]);
    }
}
