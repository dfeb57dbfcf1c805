//! Advisory quality and credibility triggers for analyzed content.
//!
//! Universal checks run for every page; category checks run only for the
//! matching content type. Triggers never block synthesis.

use super::quality::find_unusual_ingredients;
use super::rules::TriggerRules;
use crate::types::{CategoryFields, ContentTrigger, ContentType, Severity, TriggerType};
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bversion\s+\d+|\bv\d+\.\d+|\b\d+\.\d+\.\d+\b").expect("version pattern is valid")
});

static PEER_REVIEW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)peer[- ]reviewed|\bjournal of\b|\bproceedings\b|\bpublished in\b")
        .expect("peer review pattern is valid")
});

static METHODOLOGY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bmethod(s|ology)?\b|\bexperimental (setup|design)\b|\bparticipants\b|\bsample size\b")
        .expect("methodology pattern is valid")
});

/// Everything the detector needs to know about one page.
#[derive(Debug, Clone)]
pub struct TriggerInput<'a> {
    pub domain: &'a str,
    pub text: &'a str,
    pub authority: f64,
    pub content_type: ContentType,
    pub category_fields: &'a CategoryFields,
    pub citation_count: usize,
    pub latest_year: Option<i32>,
    pub reference_year: i32,
}

/// Runs the trigger battery against analyzed pages.
#[derive(Debug, Clone, Default)]
pub struct TriggerDetector {
    rules: TriggerRules,
}

impl TriggerDetector {
    pub fn new(rules: TriggerRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &TriggerRules {
        &self.rules
    }

    /// All triggers raised for a page, universal checks first.
    pub fn detect(&self, input: &TriggerInput<'_>) -> Vec<ContentTrigger> {
        let mut triggers = self.universal(input);
        match input.content_type {
            ContentType::Recipe => triggers.extend(self.recipe(input)),
            ContentType::Tutorial | ContentType::Documentation => {
                triggers.extend(self.tutorial(input))
            }
            ContentType::Academic => triggers.extend(self.academic(input)),
            _ => {}
        }
        triggers
    }

    fn universal(&self, input: &TriggerInput<'_>) -> Vec<ContentTrigger> {
        let rules = &self.rules;
        let mut out = Vec::new();
        let chars = input.text.chars().count();

        if input.authority < rules.low_credibility_authority {
            let severity = if input.authority < rules.low_credibility_authority / 2.0 {
                Severity::High
            } else {
                Severity::Medium
            };
            out.push(trigger(
                TriggerType::CredibilityLow,
                severity,
                format!(
                    "Domain authority {:.0} for {} is below {:.0}",
                    input.authority, input.domain, rules.low_credibility_authority
                ),
                "Cross-check claims against a higher-authority source",
                json!({ "domain": input.domain, "authority": input.authority }),
            ));
        }

        if let Some(year) = input.latest_year {
            let age = input.reference_year - year;
            if age > rules.outdated_after_years {
                let severity = if age > rules.outdated_after_years * 2 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                out.push(trigger(
                    TriggerType::OutdatedInfo,
                    severity,
                    format!("Most recent date mentioned is {year} ({age} years old)"),
                    "Look for a more recent source",
                    json!({ "latest_year": year, "age_years": age }),
                ));
            }
        }

        if chars >= rules.citations_expected_chars && input.citation_count == 0 {
            out.push(trigger(
                TriggerType::MissingCitations,
                Severity::Low,
                format!("{chars} characters of content without any citation or link"),
                "Verify key claims independently",
                json!({ "content_length": chars }),
            ));
        }

        let (bias_hits, density) = self.bias_density(input.text);
        if bias_hits >= 2 && density > rules.bias_density {
            out.push(trigger(
                TriggerType::BiasedLanguage,
                if density > rules.bias_density * 2.0 {
                    Severity::High
                } else {
                    Severity::Medium
                },
                format!("{bias_hits} loaded terms ({:.1}% of words)", density * 100.0),
                "Prefer neutral sources for factual claims",
                json!({ "matches": bias_hits, "density": density }),
            ));
        }

        if chars < rules.insufficient_chars {
            let severity = if chars < rules.severe_insufficient_chars {
                Severity::High
            } else {
                Severity::Medium
            };
            out.push(trigger(
                TriggerType::InsufficientDetail,
                severity,
                format!("Only {chars} characters of readable content"),
                "Find a more detailed source",
                json!({ "content_length": chars }),
            ));
        }

        out
    }

    fn recipe(&self, input: &TriggerInput<'_>) -> Vec<ContentTrigger> {
        let mut out = Vec::new();
        let recipe = match input.category_fields {
            CategoryFields::Recipe(r) => Some(r),
            _ => None,
        };

        if recipe.is_none_or(|r| r.ingredients.is_empty()) {
            out.push(trigger(
                TriggerType::MissingIngredients,
                Severity::High,
                "No ingredient list could be located".to_string(),
                "Find a source with a complete ingredient list",
                json!({}),
            ));
        }

        let unusual = find_unusual_ingredients(input.text);
        if !unusual.is_empty() {
            out.push(trigger(
                TriggerType::UnusualIngredients,
                Severity::Low,
                format!("Uses uncommon ingredients: {}", unusual.join(", ")),
                "Search for substitutions",
                json!({ "ingredients": unusual }),
            ));
        }

        if let Some(r) = recipe
            && let (Some(total), Some(prep), Some(cook)) =
                (r.total_time_minutes, r.prep_time_minutes, r.cook_time_minutes)
        {
            let summed = prep.saturating_add(cook);
            if (f64::from(total) - f64::from(summed)).abs() > self.rules.time_conflict_minutes {
                out.push(trigger(
                    TriggerType::ConflictingTimes,
                    Severity::Medium,
                    format!("Total time {total} min disagrees with prep + cook {summed} min"),
                    "Compare timings with another recipe",
                    json!({ "total": total, "prep": prep, "cook": cook }),
                ));
            }
        }

        out
    }

    fn tutorial(&self, input: &TriggerInput<'_>) -> Vec<ContentTrigger> {
        let mut out = Vec::new();

        if let CategoryFields::Tutorial(t) = input.category_fields
            && t.prerequisites.is_empty()
        {
            out.push(trigger(
                TriggerType::MissingPrerequisites,
                Severity::Low,
                "No prerequisites section found".to_string(),
                "Check required tools and versions before following along",
                json!({ "steps": t.steps.len() }),
            ));
        }

        if let Some(year) = input.latest_year {
            let age = input.reference_year - year;
            if age > self.rules.version_stale_years && VERSION_RE.is_match(input.text) {
                out.push(trigger(
                    TriggerType::VersionMismatch,
                    Severity::Medium,
                    format!("Pins specific versions but dates from {year}"),
                    "Confirm the steps against current documentation",
                    json!({ "latest_year": year }),
                ));
            }
        }

        out
    }

    fn academic(&self, input: &TriggerInput<'_>) -> Vec<ContentTrigger> {
        let mut out = Vec::new();
        let lower = input.text.to_lowercase();

        let preprint = lower.contains("preprint") || input.domain.contains("arxiv");
        if preprint || !PEER_REVIEW_RE.is_match(input.text) {
            out.push(trigger(
                TriggerType::NotPeerReviewed,
                Severity::Medium,
                if preprint {
                    "Source is a preprint".to_string()
                } else {
                    "No sign of peer review".to_string()
                },
                "Look for the peer-reviewed version",
                json!({ "preprint": preprint }),
            ));
        }

        if !METHODOLOGY_RE.is_match(input.text) {
            out.push(trigger(
                TriggerType::MissingMethodology,
                Severity::Medium,
                "No methodology section found".to_string(),
                "Treat findings as unverified",
                json!({}),
            ));
        }

        out
    }

    /// Number of loaded terms and their share of all words.
    fn bias_density(&self, text: &str) -> (usize, f64) {
        let lower = text.to_lowercase();
        let words = crate::text::word_count(&lower);
        if words == 0 {
            return (0, 0.0);
        }
        let hits: usize = self
            .rules
            .bias_terms
            .iter()
            .map(|term| {
                lower
                    .match_indices(term.as_str())
                    .filter(|(i, m)| is_word_bounded(&lower, *i, m.len()))
                    .count()
            })
            .sum();
        (hits, hits as f64 / words as f64)
    }
}

fn is_word_bounded(text: &str, start: usize, len: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[start + len..].chars().next();
    before.is_none_or(|c| !c.is_alphanumeric()) && after.is_none_or(|c| !c.is_alphanumeric())
}

fn trigger(
    trigger_type: TriggerType,
    severity: Severity,
    reason: String,
    action: &str,
    context: serde_json::Value,
) -> ContentTrigger {
    ContentTrigger {
        trigger_type,
        severity,
        reason,
        suggested_action: action.to_string(),
        context,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecipeDetails, TutorialDetails};

    fn input<'a>(text: &'a str, fields: &'a CategoryFields) -> TriggerInput<'a> {
        TriggerInput {
            domain: "example.com",
            text,
            authority: 60.0,
            content_type: ContentType::Article,
            category_fields: fields,
            citation_count: 1,
            latest_year: None,
            reference_year: 2025,
        }
    }

    fn types(triggers: &[ContentTrigger]) -> Vec<TriggerType> {
        triggers.iter().map(|t| t.trigger_type).collect()
    }

    #[test]
    fn test_low_authority_short_page() {
        let fields = CategoryFields::None;
        let mut i = input("Tiny pin.", &fields);
        i.authority = 15.0;
        let found = TriggerDetector::default().detect(&i);
        let kinds = types(&found);
        assert!(kinds.contains(&TriggerType::CredibilityLow));
        assert!(kinds.contains(&TriggerType::InsufficientDetail));
        let detail = found
            .iter()
            .find(|t| t.trigger_type == TriggerType::InsufficientDetail)
            .unwrap();
        assert_eq!(detail.severity, Severity::High);
    }

    #[test]
    fn test_outdated_info() {
        let fields = CategoryFields::None;
        let text = "x ".repeat(400);
        let mut i = input(&text, &fields);
        i.latest_year = Some(2019);
        let kinds = types(&TriggerDetector::default().detect(&i));
        assert!(kinds.contains(&TriggerType::OutdatedInfo));

        i.latest_year = Some(2024);
        let kinds = types(&TriggerDetector::default().detect(&i));
        assert!(!kinds.contains(&TriggerType::OutdatedInfo));
    }

    #[test]
    fn test_biased_language_density() {
        let fields = CategoryFields::None;
        let text = "This amazing, incredible, revolutionary gadget is perfect. Buy it.";
        let kinds = types(&TriggerDetector::default().detect(&input(text, &fields)));
        assert!(kinds.contains(&TriggerType::BiasedLanguage));

        // Substrings inside other words do not count.
        let text = "The perfection of nevertheless always-on systems.";
        let (hits, _) = TriggerDetector::default().bias_density(text);
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_missing_citations_on_long_page() {
        let fields = CategoryFields::None;
        let text = "word ".repeat(300);
        let mut i = input(&text, &fields);
        i.citation_count = 0;
        let kinds = types(&TriggerDetector::default().detect(&i));
        assert!(kinds.contains(&TriggerType::MissingCitations));
        assert!(!kinds.contains(&TriggerType::InsufficientDetail));
    }

    #[test]
    fn test_recipe_checks() {
        let fields = CategoryFields::Recipe(RecipeDetails {
            ingredients: vec![],
            instructions: vec!["Bake".into()],
            prep_time_minutes: Some(10),
            cook_time_minutes: Some(20),
            total_time_minutes: Some(90),
            servings: None,
        });
        let mut i = input("Stir in the miso and tahini.", &fields);
        i.content_type = ContentType::Recipe;
        let kinds = types(&TriggerDetector::default().detect(&i));
        assert!(kinds.contains(&TriggerType::MissingIngredients));
        assert!(kinds.contains(&TriggerType::UnusualIngredients));
        assert!(kinds.contains(&TriggerType::ConflictingTimes));
    }

    #[test]
    fn test_huge_recipe_times_do_not_overflow() {
        let fields = CategoryFields::Recipe(RecipeDetails {
            ingredients: vec!["flour".into()],
            instructions: vec!["Bake".into()],
            prep_time_minutes: Some(u32::MAX),
            cook_time_minutes: Some(u32::MAX),
            total_time_minutes: Some(30),
            servings: None,
        });
        let mut i = input("Mix and bake.", &fields);
        i.content_type = ContentType::Recipe;
        let found = TriggerDetector::default().detect(&i);
        let conflict = found
            .iter()
            .find(|t| t.trigger_type == TriggerType::ConflictingTimes)
            .unwrap();
        assert!(conflict.reason.contains(&u32::MAX.to_string()));
    }

    #[test]
    fn test_tutorial_checks() {
        let fields = CategoryFields::Tutorial(TutorialDetails {
            steps: vec!["a".into(), "b".into()],
            prerequisites: vec![],
            has_code_examples: true,
        });
        let mut i = input("Install version 1.2 of the tool. Written in 2019.", &fields);
        i.content_type = ContentType::Tutorial;
        i.latest_year = Some(2019);
        let kinds = types(&TriggerDetector::default().detect(&i));
        assert!(kinds.contains(&TriggerType::MissingPrerequisites));
        assert!(kinds.contains(&TriggerType::VersionMismatch));
    }

    #[test]
    fn test_academic_checks() {
        let fields = CategoryFields::None;
        let mut i = input("Abstract. We present a preprint on sleep.", &fields);
        i.content_type = ContentType::Academic;
        let kinds = types(&TriggerDetector::default().detect(&i));
        assert!(kinds.contains(&TriggerType::NotPeerReviewed));
        assert!(kinds.contains(&TriggerType::MissingMethodology));

        let reviewed = "Published in the Journal of Sleep. Methods: 40 participants.";
        let mut i = input(reviewed, &fields);
        i.content_type = ContentType::Academic;
        let kinds = types(&TriggerDetector::default().detect(&i));
        assert!(!kinds.contains(&TriggerType::NotPeerReviewed));
        assert!(!kinds.contains(&TriggerType::MissingMethodology));
    }
}
