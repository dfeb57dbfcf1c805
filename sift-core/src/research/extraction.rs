//! Best-effort structured extraction from readable page text.
//!
//! Everything here is heuristic. A section that cannot be located yields an
//! empty field rather than an error.

use crate::text::{extract_durations_minutes, sentences, truncate_chars, word_count};
use crate::types::{
    ArticleDetails, CategoryFields, ContentType, ExtractedFact, RecipeDetails, TutorialDetails,
};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

const MAX_KEY_POINTS: usize = 10;
const MAX_FACTS: usize = 15;
const MAX_CITATIONS: usize = 20;
const MAX_SECTION_LINES: usize = 50;
const MAIN_CONTENT_CHARS: usize = 1_500;

static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\[\d{1,3}\]|\([A-Z][A-Za-z\-]+(?: et al\.)?,? \d{4}\)|\b10\.\d{4,9}/[^\s]+|(?i:arxiv:\s?\d{4}\.\d{4,5})|https?://[^\s)\]]+",
    )
    .expect("citation pattern is valid")
});

static LIST_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•]|\d{1,2}[.)])\s+(.+)$").expect("list item pattern is valid")
});

static STEP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:step\s+\d+[:.)]?|\d{1,2}[.)])\s*(.+)$").expect("step pattern is valid")
});

/// A time label followed by one or more durations ("1 hour 30 minutes").
/// The value stops before any following label on the same line.
static TIME_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(prep|preparation|cook|cooking|bake|baking|total)\s+time\s*:?\s*((?:\d{1,3}(?:\.\d+)?\s*(?:hours?|hrs?|h|minutes?|mins?|m)\b[\s,]*(?:and\s+)?)+)",
    )
    .expect("time field pattern is valid")
});

static SERVINGS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:serves|servings|yield)\s*:?\s*(\d{1,3})").expect("servings pattern is valid")
});

const FACT_VERBS: &[&str] = &[
    " is ", " are ", " was ", " were ", " has ", " have ", " contains ", " requires ",
    " takes ", " causes ", " reduces ", " increases ", " provides ", " supports ",
];

const FINDING_MARKERS: &[&str] = &[
    "found", "shows", "showed", "results", "concluded", "suggests", "demonstrated",
];

/// Whether a line reads like a section header.
pub fn is_header_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.starts_with('#') {
        return true;
    }
    trimmed.ends_with(':') && trimmed.chars().count() <= 60 && word_count(trimmed) <= 6
}

/// Whether the text carries headers or lists.
pub fn has_structure(text: &str) -> bool {
    let mut headers = 0;
    let mut items = 0;
    for line in text.lines() {
        if is_header_line(line) {
            headers += 1;
        } else if LIST_ITEM_RE.is_match(line) {
            items += 1;
        }
    }
    headers >= 1 || items >= 2
}

pub fn count_headers(text: &str) -> usize {
    text.lines().filter(|l| is_header_line(l)).count()
}

pub fn count_list_items(text: &str) -> usize {
    text.lines().filter(|l| LIST_ITEM_RE.is_match(l)).count()
}

/// Whether the text contains code blocks or shell sessions.
pub fn has_code_blocks(text: &str) -> bool {
    if text.contains("```") {
        return true;
    }
    let code_lines = text
        .lines()
        .filter(|l| {
            (l.starts_with("    ") || l.starts_with('\t') || l.starts_with("$ "))
                && l.trim()
                    .chars()
                    .any(|c| matches!(c, '(' | ')' | '{' | '}' | ';' | '=' | '$'))
        })
        .count();
    code_lines >= 2
}

/// Title of the page: the provided one, else the first non-empty line.
pub fn extract_title(text: &str, provided: &str) -> String {
    if !provided.trim().is_empty() {
        return provided.trim().to_string();
    }
    text.lines()
        .map(|l| l.trim().trim_start_matches('#').trim())
        .find(|l| !l.is_empty())
        .map(|l| truncate_chars(l, 120))
        .unwrap_or_default()
}

pub fn extract_main_content(text: &str) -> String {
    truncate_chars(text.trim(), MAIN_CONTENT_CHARS)
}

/// Bullet and numbered items, falling back to sentences that flag importance.
pub fn extract_key_points(text: &str) -> Vec<String> {
    let mut points: Vec<String> = text
        .lines()
        .filter_map(|l| LIST_ITEM_RE.captures(l))
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|p| word_count(p) >= 3)
        .take(MAX_KEY_POINTS)
        .collect();

    if points.is_empty() {
        points = sentences(text)
            .into_iter()
            .filter(|s| {
                let lower = s.to_lowercase();
                ["important", "key", "note", "remember", "tip"]
                    .iter()
                    .any(|m| lower.contains(m))
            })
            .take(MAX_KEY_POINTS)
            .collect();
    }
    points
}

/// Declarative sentences that state something checkable.
pub fn extract_facts(text: &str) -> Vec<ExtractedFact> {
    let mut seen = HashSet::new();
    sentences(text)
        .into_iter()
        .filter(|s| {
            let words = word_count(s);
            (6..=40).contains(&words) && !s.ends_with('?') && !is_header_line(s)
        })
        .filter_map(|s| {
            let padded = format!(" {} ", s.to_lowercase());
            let has_number = s.chars().any(|c| c.is_ascii_digit());
            let has_verb = FACT_VERBS.iter().any(|v| padded.contains(v));
            if !has_number && !has_verb {
                return None;
            }
            let mut confidence: f64 = 0.6;
            if has_number {
                confidence += 0.1;
            }
            if has_verb {
                confidence += 0.05;
            }
            if CITATION_RE.is_match(&s) {
                confidence += 0.15;
            }
            Some(ExtractedFact {
                statement: s,
                confidence: confidence.min(0.95),
            })
        })
        .filter(|f| seen.insert(f.statement.to_lowercase()))
        .take(MAX_FACTS)
        .collect()
}

/// Distinct citation markers, in order of appearance.
pub fn extract_citations(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    CITATION_RE
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';']).to_string())
        .filter(|c| seen.insert(c.clone()))
        .take(MAX_CITATIONS)
        .collect()
}

/// Total citation markers, duplicates included.
pub fn citation_count(text: &str) -> usize {
    CITATION_RE.find_iter(text).count()
}

/// Lines following the first header that matches one of `names`, up to the
/// next header. List markers are stripped.
pub fn find_section(text: &str, names: &[&str]) -> Vec<String> {
    let mut lines = text.lines();
    let found = lines.by_ref().any(|line| {
        let normalized = line
            .trim()
            .trim_start_matches('#')
            .trim()
            .trim_end_matches(':')
            .to_lowercase();
        names
            .iter()
            .any(|n| normalized == *n || (normalized.starts_with(n) && word_count(&normalized) <= 4))
    });
    if !found {
        return Vec::new();
    }

    let mut section = Vec::new();
    let mut blank_run = 0;
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            blank_run += 1;
            if blank_run >= 2 && !section.is_empty() {
                break;
            }
            continue;
        }
        blank_run = 0;
        if is_header_line(trimmed) {
            break;
        }
        let item = LIST_ITEM_RE
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| trimmed.to_string());
        section.push(item);
        if section.len() >= MAX_SECTION_LINES {
            break;
        }
    }
    section
}

/// Labelled times (`Prep time: 15 minutes`) in minutes, keyed by label.
fn labelled_times(text: &str) -> Vec<(String, u32)> {
    TIME_FIELD_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let label = caps.get(1)?.as_str().to_lowercase();
            let minutes: f64 = extract_durations_minutes(caps.get(2)?.as_str()).iter().sum();
            (minutes > 0.0).then(|| (label, minutes.round() as u32))
        })
        .collect()
}

pub fn extract_recipe(text: &str) -> RecipeDetails {
    let times = labelled_times(text);
    let time_for = |labels: &[&str]| {
        times
            .iter()
            .find(|(label, _)| labels.contains(&label.as_str()))
            .map(|(_, m)| *m)
    };
    RecipeDetails {
        ingredients: find_section(text, &["ingredients"]),
        instructions: find_section(
            text,
            &["instructions", "directions", "method", "steps", "preparation"],
        ),
        prep_time_minutes: time_for(&["prep", "preparation"]),
        cook_time_minutes: time_for(&["cook", "cooking", "bake", "baking"]),
        total_time_minutes: time_for(&["total"]),
        servings: SERVINGS_RE
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok()),
    }
}

pub fn extract_tutorial(text: &str) -> TutorialDetails {
    let steps = text
        .lines()
        .filter_map(|l| STEP_RE.captures(l))
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|s| !s.is_empty())
        .take(MAX_SECTION_LINES)
        .collect();
    TutorialDetails {
        steps,
        prerequisites: find_section(
            text,
            &[
                "prerequisites",
                "requirements",
                "before you begin",
                "what you'll need",
                "you will need",
            ],
        ),
        has_code_examples: has_code_blocks(text),
    }
}

pub fn extract_article(text: &str) -> ArticleDetails {
    let all = sentences(text);
    let summary = all
        .iter()
        .filter(|s| word_count(s) >= 6 && !is_header_line(s))
        .take(2)
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    let findings = all
        .into_iter()
        .filter(|s| {
            let lower = s.to_lowercase();
            FINDING_MARKERS.iter().any(|m| lower.contains(m))
        })
        .take(5)
        .collect();
    ArticleDetails { summary, findings }
}

/// Category-specific fields for a classified page.
pub fn extract_category_fields(content_type: ContentType, text: &str) -> CategoryFields {
    match content_type {
        ContentType::Recipe => CategoryFields::Recipe(extract_recipe(text)),
        ContentType::Tutorial | ContentType::Documentation | ContentType::Troubleshooting => {
            CategoryFields::Tutorial(extract_tutorial(text))
        }
        ContentType::Academic
        | ContentType::News
        | ContentType::Article
        | ContentType::Reference
        | ContentType::Opinion
        | ContentType::Comparison
        | ContentType::Review => CategoryFields::Article(extract_article(text)),
        ContentType::Commercial | ContentType::Forum => CategoryFields::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECIPE: &str = "# Vegan Lasagna\n\nPrep time: 20 minutes\nCook time: 1 hour\nServes: 6\n\n## Ingredients\n- 12 lasagna noodles\n- 2 cups cashew ricotta\n- 3 cups marinara sauce\n\n## Instructions\n1. Preheat the oven to 375F.\n2. Layer noodles, sauce and ricotta.\n3. Bake for 45 minutes.\n";

    #[test]
    fn test_extract_recipe_sections_and_times() {
        let recipe = extract_recipe(RECIPE);
        assert_eq!(recipe.ingredients.len(), 3);
        assert_eq!(recipe.ingredients[0], "12 lasagna noodles");
        assert_eq!(recipe.instructions.len(), 3);
        assert_eq!(recipe.prep_time_minutes, Some(20));
        assert_eq!(recipe.cook_time_minutes, Some(60));
        assert_eq!(recipe.total_time_minutes, None);
        assert_eq!(recipe.servings, Some(6));
    }

    #[test]
    fn test_times_on_one_line_stay_separate() {
        let recipe = extract_recipe("Prep time: 10 min Cook time: 40 min Total time: 50 min");
        assert_eq!(recipe.prep_time_minutes, Some(10));
        assert_eq!(recipe.cook_time_minutes, Some(40));
        assert_eq!(recipe.total_time_minutes, Some(50));

        let recipe = extract_recipe("Cook time: 1 hour and 15 minutes, Prep time: 5 mins");
        assert_eq!(recipe.cook_time_minutes, Some(75));
        assert_eq!(recipe.prep_time_minutes, Some(5));
    }

    #[test]
    fn test_missing_section_is_empty() {
        assert!(find_section("no headers here", &["ingredients"]).is_empty());
        let recipe = extract_recipe("Just some prose about pasta.");
        assert!(recipe.ingredients.is_empty());
        assert!(recipe.instructions.is_empty());
    }

    #[test]
    fn test_extract_tutorial() {
        let text = "## Prerequisites\n- Rust 1.80 installed\n\n## Steps\nStep 1: Create a project\nStep 2: Add tokio\n```\ncargo add tokio\n```\n";
        let tutorial = extract_tutorial(text);
        assert_eq!(tutorial.steps, vec!["Create a project", "Add tokio"]);
        assert_eq!(tutorial.prerequisites, vec!["Rust 1.80 installed"]);
        assert!(tutorial.has_code_examples);
    }

    #[test]
    fn test_extract_facts_requires_substance() {
        let text = "Hello there. The oven temperature for lasagna is 375 degrees Fahrenheit in most recipes. Why not?";
        let facts = extract_facts(text);
        assert_eq!(facts.len(), 1);
        assert!(facts[0].statement.starts_with("The oven temperature"));
        assert!((facts[0].confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_extract_citations() {
        let text = "As shown [1] and (Smith et al., 2020), see doi 10.1000/xyz123. Also [1].";
        let citations = extract_citations(text);
        assert_eq!(citations, vec!["[1]", "(Smith et al., 2020)", "10.1000/xyz123"]);
        assert_eq!(citation_count(text), 4);
    }

    #[test]
    fn test_structure_detection() {
        assert!(has_structure(RECIPE));
        assert!(!has_structure("plain paragraph of text"));
        assert!(!has_code_blocks(RECIPE));
    }

    #[test]
    fn test_title_fallback() {
        assert_eq!(extract_title(RECIPE, ""), "Vegan Lasagna");
        assert_eq!(extract_title(RECIPE, "Given"), "Given");
    }
}
