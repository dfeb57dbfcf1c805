//! Core data model shared by every pipeline stage.
//!
//! All entities are created fresh per query and handed from stage to stage
//! by value; nothing here is mutated once the producing stage returns.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Intent & plan
// ---------------------------------------------------------------------------

/// How demanding the query looks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// Broad subject area of the query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchDomain {
    General,
    Technical,
    Academic,
    CurrentEvents,
}

/// The planner's reading of what the user wants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchIntent {
    pub goal: String,
    /// Keywords in first-seen order, without duplicates.
    pub concepts: Vec<String>,
    pub complexity: Complexity,
    pub domain: SearchDomain,
}

impl SearchIntent {
    /// Whether the concepts describe cooking a dish.
    pub fn is_recipe(&self) -> bool {
        self.concepts
            .iter()
            .any(|c| crate::research::quality::RECIPE_TERMS.contains(&c.as_str()))
    }

    /// Whether the query is about software or other technical work.
    pub fn is_technical(&self) -> bool {
        self.domain == SearchDomain::Technical
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StepPriority {
    High,
    Medium,
    Low,
}

/// One query to send to the search provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchStep {
    pub query: String,
    pub rationale: String,
    /// Hints about the kinds of sources this step should surface.
    pub expected_sources: Vec<String>,
    pub priority: StepPriority,
}

/// Condition evaluated against already-gathered results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionalTrigger {
    UnusualIngredients,
    ConflictingInfo,
    InsufficientDepth,
    CredibilityConcerns,
}

impl fmt::Display for ConditionalTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConditionalTrigger::UnusualIngredients => "unusual_ingredients",
            ConditionalTrigger::ConflictingInfo => "conflicting_info",
            ConditionalTrigger::InsufficientDepth => "insufficient_depth",
            ConditionalTrigger::CredibilityConcerns => "credibility_concerns",
        };
        f.write_str(name)
    }
}

/// A search step that only runs when its trigger fires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConditionalSearch {
    pub trigger: ConditionalTrigger,
    /// Human-readable description of the condition.
    pub condition: String,
    pub step: SearchStep,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisApproach {
    Combine,
    Triangulate,
    Prioritize,
}

/// The planner's structured strategy for answering one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchPlan {
    pub intent: SearchIntent,
    pub initial_search: SearchStep,
    pub parallel_searches: Vec<SearchStep>,
    pub conditional_searches: Vec<ConditionalSearch>,
    pub synthesis_approach: SynthesisApproach,
}

// ---------------------------------------------------------------------------
// Search results
// ---------------------------------------------------------------------------

/// One hit as returned by the search provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawSearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub domain: String,
    /// 1-based rank from the provider.
    pub position: usize,
}

impl RawSearchResult {
    /// Build a result, deriving the domain from the URL.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
        position: usize,
    ) -> Self {
        let url = url.into();
        let domain = domain_of(&url);
        Self {
            title: title.into(),
            url,
            snippet: snippet.into(),
            domain,
            position,
        }
    }
}

/// Host of a URL, lowercased and without a leading `www.`.
pub fn domain_of(raw: &str) -> String {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .map(|h| h.trim_start_matches("www.").to_string())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchMetadata {
    pub total_results: usize,
    pub execution_time_ms: u64,
    pub variations_tried: Vec<String>,
    pub adaptations_applied: Vec<String>,
    /// Set when every provider call for this step failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of executing one search step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub query: String,
    pub results: Vec<RawSearchResult>,
    pub metadata: SearchMetadata,
}

impl SearchResult {
    /// A zero-result outcome for a step whose provider calls failed.
    pub fn empty(query: impl Into<String>, error: Option<String>) -> Self {
        Self {
            query: query.into(),
            results: Vec::new(),
            metadata: SearchMetadata {
                error,
                ..Default::default()
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Content analysis
// ---------------------------------------------------------------------------

/// Category assigned by the content classifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Academic,
    News,
    Recipe,
    Review,
    Commercial,
    Tutorial,
    Documentation,
    Forum,
    Troubleshooting,
    Comparison,
    Opinion,
    Reference,
    Article,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentType::Academic => "academic",
            ContentType::News => "news",
            ContentType::Recipe => "recipe",
            ContentType::Review => "review",
            ContentType::Commercial => "commercial",
            ContentType::Tutorial => "tutorial",
            ContentType::Documentation => "documentation",
            ContentType::Forum => "forum",
            ContentType::Troubleshooting => "troubleshooting",
            ContentType::Comparison => "comparison",
            ContentType::Opinion => "opinion",
            ContentType::Reference => "reference",
            ContentType::Article => "article",
        };
        f.write_str(name)
    }
}

/// Kind of quality or credibility concern.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    CredibilityLow,
    OutdatedInfo,
    MissingCitations,
    BiasedLanguage,
    InsufficientDetail,
    MissingIngredients,
    UnusualIngredients,
    ConflictingTimes,
    MissingPrerequisites,
    VersionMismatch,
    NotPeerReviewed,
    MissingMethodology,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Advisory flag raised on extracted content. Never blocks synthesis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentTrigger {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    pub severity: Severity,
    pub reason: String,
    pub suggested_action: String,
    #[serde(default)]
    pub context: serde_json::Value,
}

/// A factual statement lifted from one source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedFact {
    pub statement: String,
    /// Heuristic confidence in the statement itself (0.0-1.0).
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecipeDetails {
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_time_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cook_time_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_time_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TutorialDetails {
    pub steps: Vec<String>,
    pub prerequisites: Vec<String>,
    pub has_code_examples: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ArticleDetails {
    pub summary: String,
    pub findings: Vec<String>,
}

/// Optional fields that only make sense for some content types.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategoryFields {
    Recipe(RecipeDetails),
    Tutorial(TutorialDetails),
    Article(ArticleDetails),
    #[default]
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructuredData {
    pub title: String,
    pub main_content: String,
    pub key_points: Vec<String>,
    pub facts: Vec<ExtractedFact>,
    pub citations: Vec<String>,
    pub content_type: ContentType,
    pub content_triggers: Vec<ContentTrigger>,
    #[serde(default)]
    pub category_fields: CategoryFields,
}

/// Sub-scores behind a reliability score, each in [0, 100].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QualityIndicators {
    pub domain_authority: f64,
    pub content_quality: f64,
    pub recency: f64,
    pub citation_density: f64,
    pub word_count: usize,
    pub has_structure: bool,
    pub has_code_blocks: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisMetadata {
    pub content_length: usize,
    pub extraction_method: String,
    pub processing_time_ms: u64,
    pub quality_indicators: QualityIndicators,
}

/// Vetted, structured view of one fetched URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentAnalysis {
    pub url: String,
    pub domain: String,
    pub extracted_content: String,
    /// Heuristic trustworthiness in [0, 100].
    pub reliability_score: f64,
    pub structured_data: StructuredData,
    pub metadata: AnalysisMetadata,
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FactCategory {
    Confirmed,
    Likely,
    Disputed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifiedFact {
    pub statement: String,
    /// Consensus confidence (0.0-1.0).
    pub confidence: f64,
    pub supporting_sources: usize,
    pub category: FactCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictingStatement {
    pub statement: String,
    pub source: String,
    pub reliability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictingInfo {
    pub topic: String,
    pub statements: Vec<ConflictingStatement>,
    pub resolution: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FactTriangulation {
    pub verified_facts: Vec<VerifiedFact>,
    pub conflicting_info: Vec<ConflictingInfo>,
    pub consensus_findings: Vec<String>,
    pub uncertainties: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceSummary {
    pub url: String,
    pub title: String,
    pub domain: String,
    pub reliability: f64,
    pub content_type: ContentType,
    pub key_points: Vec<String>,
    pub trigger_count: usize,
}

/// Wall-clock time spent in each stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StageTimings {
    pub planning_ms: u64,
    pub search_ms: u64,
    pub analysis_ms: u64,
    pub synthesis_ms: u64,
    pub total_ms: u64,
}

/// Terminal artifact of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynthesizedResponse {
    pub query: String,
    pub final_answer: String,
    /// Overall confidence in [0, 100].
    pub confidence: f64,
    pub fact_triangulation: FactTriangulation,
    pub source_summaries: Vec<SourceSummary>,
    pub recommendations: Vec<String>,
    pub gaps: Vec<String>,
    pub timings: StageTimings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_of_strips_www() {
        assert_eq!(domain_of("https://www.Example.com/a?b=c"), "example.com");
        assert_eq!(domain_of("http://docs.rs/tokio"), "docs.rs");
        assert_eq!(domain_of("not a url"), "");
    }

    #[test]
    fn test_raw_result_derives_domain() {
        let r = RawSearchResult::new("T", "https://cooking.nytimes.com/x", "s", 1);
        assert_eq!(r.domain, "cooking.nytimes.com");
    }

    #[test]
    fn test_trigger_serializes_snake_case() {
        let trigger = ContentTrigger {
            trigger_type: TriggerType::CredibilityLow,
            severity: Severity::High,
            reason: "r".into(),
            suggested_action: "a".into(),
            context: serde_json::Value::Null,
        };
        let json = serde_json::to_value(&trigger).unwrap();
        assert_eq!(json["type"], "credibility_low");
        assert_eq!(json["severity"], "high");
    }

    #[test]
    fn test_category_fields_tagged() {
        let fields = CategoryFields::Recipe(RecipeDetails {
            ingredients: vec!["1 cup flour".into()],
            ..Default::default()
        });
        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(json["kind"], "recipe");
    }

    #[test]
    fn test_conditional_trigger_display() {
        assert_eq!(
            ConditionalTrigger::UnusualIngredients.to_string(),
            "unusual_ingredients"
        );
    }
}
