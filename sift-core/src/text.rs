//! Small text utilities shared by the planner, analyzer and synthesizer.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "shall", "should", "may", "might", "must", "can",
    "could", "of", "in", "to", "for", "with", "on", "at", "from", "by", "about", "as", "into",
    "through", "during", "before", "after", "above", "below", "between", "this", "that",
    "these", "those", "it", "its", "and", "but", "or", "what", "which", "who", "whom", "how",
    "why", "when", "where", "there", "their", "they", "them", "then", "than", "your", "you",
    "some", "such", "very", "just", "also", "more", "most", "other", "over", "only",
    "make", "made", "best", "good", "find", "want", "need", "using", "use",
];

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3}(?:\.\d+)?)\s*(hours?|hrs?|h|minutes?|mins?|m)\b")
        .expect("duration pattern is valid")
});

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("year pattern is valid"));

/// Lowercased alphanumeric tokens of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

/// Query concepts: tokens longer than three characters that are not stop
/// words, deduplicated in first-seen order.
pub fn extract_concepts(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|w| w.chars().count() > 3 && !STOP_WORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// Content words used for statement similarity.
pub fn keyword_set(text: &str) -> HashSet<String> {
    tokenize(text)
        .into_iter()
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Share of words two statements have in common, relative to the larger
/// statement. Symmetric, in [0, 1].
pub fn word_overlap(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let larger = a.len().max(b.len());
    if larger == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / larger as f64
}

/// Every duration mention in `text`, in minutes.
pub fn extract_durations_minutes(text: &str) -> Vec<f64> {
    DURATION_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let value: f64 = caps.get(1)?.as_str().parse().ok()?;
            let unit = caps.get(2)?.as_str().to_lowercase();
            if unit.starts_with('h') {
                Some(value * 60.0)
            } else {
                Some(value)
            }
        })
        .collect()
}

/// Every plausible four-digit year mentioned in `text`.
pub fn extract_years(text: &str) -> Vec<i32> {
    YEAR_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect()
}

/// Split text into trimmed sentences.
pub fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = text.chars().collect();
    for (i, &ch) in chars.iter().enumerate() {
        if ch == '\n' {
            push_sentence(&mut out, &mut current);
            continue;
        }
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let next = chars.get(i + 1).copied();
            // Keep decimals like "2.5" inside one sentence.
            if next.is_none_or(|n| n.is_whitespace()) {
                push_sentence(&mut out, &mut current);
            }
        }
    }
    push_sentence(&mut out, &mut current);
    out
}

fn push_sentence(out: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    current.clear();
}

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Truncate to at most `max_chars` characters without splitting a char.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_concepts_filters_short_and_stop_words() {
        let concepts = extract_concepts("What is the best easy vegan lasagna recipe? Vegan!");
        assert_eq!(concepts, vec!["easy", "vegan", "lasagna", "recipe"]);
    }

    #[test]
    fn test_word_overlap_symmetric() {
        let a = keyword_set("Bake the lasagna for 45 minutes at 375 degrees");
        let b = keyword_set("Bake lasagna 45 minutes at 375 degrees until bubbly");
        let ab = word_overlap(&a, &b);
        let ba = word_overlap(&b, &a);
        assert!((ab - ba).abs() < f64::EPSILON);
        assert!(ab > 0.6);
    }

    #[test]
    fn test_word_overlap_empty() {
        let empty = HashSet::new();
        assert_eq!(word_overlap(&empty, &keyword_set("anything")), 0.0);
    }

    #[test]
    fn test_extract_durations() {
        let d = extract_durations_minutes("Cook for 1 hour, then rest 15 mins. Total 1.5 hrs");
        assert_eq!(d, vec![60.0, 15.0, 90.0]);
    }

    #[test]
    fn test_extract_years() {
        assert_eq!(extract_years("Updated 2019, revised in 2023."), vec![2019, 2023]);
        assert!(extract_years("call 12345").is_empty());
    }

    #[test]
    fn test_sentences_keep_decimals() {
        let s = sentences("Version 2.5 is out. It is fast!\nNext line");
        assert_eq!(s, vec!["Version 2.5 is out.", "It is fast!", "Next line"]);
    }

    #[test]
    fn test_truncate_chars_on_boundary() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
