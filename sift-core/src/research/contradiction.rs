//! Conflict detection between sources.
//!
//! Only numeric time-duration disagreements (cooking and preparation times)
//! are detected. Other kinds of disagreement surface as disputed facts during
//! triangulation instead.

use crate::text::{extract_durations_minutes, sentences};
use crate::types::{CategoryFields, ConflictingInfo, ConflictingStatement, ContentAnalysis};
use regex::Regex;
use std::sync::LazyLock;

pub const TIME_CONFLICT_TOPIC: &str = "Cooking/Preparation Time";

/// Confidence attached to every detected time conflict.
const TIME_CONFLICT_CONFIDENCE: f64 = 0.8;

static TIMING_CONTEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(cook|cooks|cooking|bake|bakes|baking|roast|roasting|simmer|simmering|prep|preparation|ready in|total time)\b")
        .expect("timing context pattern is valid")
});

/// One source's reported duration.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeReport {
    pub url: String,
    pub minutes: f64,
    pub reliability: f64,
}

/// Detects disagreeing duration reports across analyses.
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    /// Spread in minutes above which reports conflict.
    threshold_minutes: f64,
}

impl ConflictDetector {
    pub fn new(threshold_minutes: f64) -> Self {
        Self { threshold_minutes }
    }

    pub fn threshold_minutes(&self) -> f64 {
        self.threshold_minutes
    }

    /// All conflicts found across the given analyses.
    pub fn detect(&self, analyses: &[ContentAnalysis]) -> Vec<ConflictingInfo> {
        self.time_conflict(analyses).into_iter().collect()
    }

    /// A conflict when the reported durations spread further than the threshold.
    pub fn time_conflict(&self, analyses: &[ContentAnalysis]) -> Option<ConflictingInfo> {
        let reports: Vec<TimeReport> = analyses.iter().filter_map(time_report).collect();
        if reports.len() < 2 {
            return None;
        }

        let min = reports.iter().map(|r| r.minutes).fold(f64::INFINITY, f64::min);
        let max = reports
            .iter()
            .map(|r| r.minutes)
            .fold(f64::NEG_INFINITY, f64::max);
        if max - min <= self.threshold_minutes {
            return None;
        }

        let estimate = weighted_estimate(&reports);
        tracing::debug!(
            sources = reports.len(),
            min,
            max,
            estimate,
            "Conflicting durations detected"
        );

        Some(ConflictingInfo {
            topic: TIME_CONFLICT_TOPIC.to_string(),
            statements: reports
                .iter()
                .map(|r| ConflictingStatement {
                    statement: format!("Reported time: {:.0} minutes", r.minutes),
                    source: r.url.clone(),
                    reliability: r.reliability,
                })
                .collect(),
            resolution: format!(
                "Sources range from {min:.0} to {max:.0} minutes; the reliability-weighted estimate is about {estimate:.0} minutes. Check doneness rather than relying on a fixed time."
            ),
            confidence: TIME_CONFLICT_CONFIDENCE,
        })
    }
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new(30.0)
    }
}

/// Duration a source reports for the dish, in minutes.
///
/// Labelled recipe times win: total time, else prep plus cook. Without them,
/// the first duration in a sentence that talks about cooking is used.
pub fn time_report(analysis: &ContentAnalysis) -> Option<TimeReport> {
    let minutes = labelled_minutes(&analysis.structured_data.category_fields)
        .or_else(|| contextual_minutes(&analysis.extracted_content))?;
    Some(TimeReport {
        url: analysis.url.clone(),
        minutes,
        reliability: analysis.reliability_score,
    })
}

fn labelled_minutes(fields: &CategoryFields) -> Option<f64> {
    let CategoryFields::Recipe(recipe) = fields else {
        return None;
    };
    if let Some(total) = recipe.total_time_minutes {
        return Some(f64::from(total));
    }
    match (recipe.prep_time_minutes, recipe.cook_time_minutes) {
        (None, None) => None,
        (prep, cook) => Some(f64::from(prep.unwrap_or(0).saturating_add(cook.unwrap_or(0)))),
    }
}

fn contextual_minutes(text: &str) -> Option<f64> {
    sentences(text)
        .iter()
        .filter(|s| TIMING_CONTEXT_RE.is_match(s))
        .find_map(|s| extract_durations_minutes(s).into_iter().find(|m| *m > 0.0))
}

/// Reliability-weighted mean; a plain mean when every weight is zero.
pub fn weighted_estimate(reports: &[TimeReport]) -> f64 {
    let total_weight: f64 = reports.iter().map(|r| r.reliability.max(0.0)).sum();
    if total_weight <= 0.0 {
        return reports.iter().map(|r| r.minutes).sum::<f64>() / reports.len().max(1) as f64;
    }
    reports
        .iter()
        .map(|r| r.minutes * r.reliability.max(0.0))
        .sum::<f64>()
        / total_weight
}
