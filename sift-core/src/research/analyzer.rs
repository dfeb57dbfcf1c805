//! Content analyzer: source selection, fetching, reliability scoring,
//! classification and structured extraction.

use super::extraction::{
    citation_count, count_headers, count_list_items, extract_category_fields, extract_citations,
    extract_facts, extract_key_points, extract_main_content, extract_title, has_code_blocks,
    has_structure,
};
use super::quality::DomainAuthority;
use super::rules::{ContentRules, TriggerRules};
use super::triggers::{TriggerDetector, TriggerInput};
use crate::config::AnalysisConfig;
use crate::error::FetchError;
use crate::providers::{ContentFetcher, FetchedContent};
use crate::text::{extract_years, word_count};
use crate::types::{
    AnalysisMetadata, CategoryFields, ContentAnalysis, ContentType, QualityIndicators,
    RawSearchResult, SearchResult, StructuredData,
};
use chrono::Datelike;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fetches the best search hits and turns them into scored analyses.
pub struct ContentAnalyzer {
    fetcher: Arc<dyn ContentFetcher>,
    authority: Arc<DomainAuthority>,
    rules: Arc<ContentRules>,
    triggers: TriggerDetector,
    config: AnalysisConfig,
}

impl ContentAnalyzer {
    pub fn new(fetcher: Arc<dyn ContentFetcher>, config: AnalysisConfig) -> Self {
        Self {
            fetcher,
            authority: Arc::new(DomainAuthority::default()),
            rules: Arc::new(ContentRules::default()),
            triggers: TriggerDetector::default(),
            config,
        }
    }

    /// Share an authority table across analyzers.
    pub fn with_authority(mut self, authority: Arc<DomainAuthority>) -> Self {
        self.authority = authority;
        self
    }

    pub fn with_rules(mut self, rules: Arc<ContentRules>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_trigger_rules(mut self, rules: TriggerRules) -> Self {
        self.triggers = TriggerDetector::new(rules);
        self
    }

    /// Year that recency is measured against.
    pub fn reference_year(&self) -> i32 {
        self.config
            .reference_year
            .unwrap_or_else(|| chrono::Utc::now().year())
    }

    /// Rank score for one raw hit: earlier positions, authoritative domains
    /// and longer snippets score higher.
    pub fn selection_score(&self, result: &RawSearchResult) -> f64 {
        let snippet_len = result.snippet.chars().count();
        let snippet_bonus = if snippet_len > 150 {
            10.0
        } else if snippet_len > 80 {
            5.0
        } else {
            0.0
        };
        50.0 - 5.0 * result.position as f64
            + 0.3 * self.authority.score(&result.domain)
            + snippet_bonus
    }

    /// Flatten every step's hits and pick up to `top_n`, at most one per domain.
    ///
    /// Duplicate URLs keep their first occurrence. Equal scores keep
    /// their flattened order.
    pub fn select_results(&self, results: &[SearchResult], top_n: usize) -> Vec<RawSearchResult> {
        let mut seen_urls = HashSet::new();
        let mut scored: Vec<(f64, &RawSearchResult)> = results
            .iter()
            .flat_map(|r| r.results.iter())
            .filter(|r| seen_urls.insert(r.url.as_str()))
            .map(|r| (self.selection_score(r), r))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut seen_domains = HashSet::new();
        scored
            .into_iter()
            .filter(|(_, r)| {
                let key = if r.domain.is_empty() { &r.url } else { &r.domain };
                seen_domains.insert(key.clone())
            })
            .take(top_n)
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Select, fetch and analyze the best hits.
    ///
    /// Fetches run concurrently up to the configured limit. Failed, timed-out
    /// and cancelled fetches are dropped; the output keeps selection order.
    pub async fn analyze_search_results(
        &self,
        results: &[SearchResult],
        top_n: usize,
        cancel: &CancellationToken,
    ) -> Vec<ContentAnalysis> {
        let start = Instant::now();
        let selected = self.select_results(results, top_n);
        if selected.is_empty() {
            info!("No search results to analyze");
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_fetches.max(1)));
        let timeout = Duration::from_secs(self.config.fetch_timeout_secs);

        let futures = selected.iter().map(|hit| {
            let sem = semaphore.clone();
            async move {
                let _permit = sem.acquire().await.ok()?;
                if cancel.is_cancelled() {
                    debug!(url = %hit.url, "Skipping fetch after cancellation");
                    return None;
                }
                let fetch_start = Instant::now();
                let fetched = tokio::select! {
                    _ = cancel.cancelled() => Err(FetchError::Cancelled { url: hit.url.clone() }),
                    outcome = tokio::time::timeout(timeout, self.fetcher.fetch(&hit.url)) => {
                        outcome.unwrap_or_else(|_| Err(FetchError::Timeout {
                            url: hit.url.clone(),
                            timeout_secs: timeout.as_secs(),
                        }))
                    }
                };
                match fetched {
                    Ok(content) => {
                        let analysis = self.analyze_content(
                            hit,
                            &content,
                            fetch_start.elapsed().as_millis() as u64,
                        );
                        debug!(
                            url = %hit.url,
                            reliability = analysis.reliability_score,
                            content_type = %analysis.structured_data.content_type,
                            "Analyzed source"
                        );
                        Some(analysis)
                    }
                    Err(e) => {
                        warn!(url = %hit.url, error = %e, "Dropping source after fetch failure");
                        None
                    }
                }
            }
        });

        let analyses: Vec<ContentAnalysis> = futures::future::join_all(futures)
            .await
            .into_iter()
            .flatten()
            .collect();

        info!(
            selected = selected.len(),
            analyzed = analyses.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Content analysis complete"
        );
        analyses
    }

    /// Analyze already-fetched text for one hit. Pure apart from the clock
    /// used for the reference year when none is configured.
    pub fn analyze_content(
        &self,
        hit: &RawSearchResult,
        fetched: &FetchedContent,
        processing_time_ms: u64,
    ) -> ContentAnalysis {
        let text = fetched.text.as_str();
        let reference_year = self.reference_year();

        let content_type = self.rules.classify(&hit.domain, text);
        let category_fields = extract_category_fields(content_type, text);

        let authority = self.authority.score(&hit.domain);
        let quality = content_quality(text, content_type, &category_fields);
        let latest_year = latest_year(text, reference_year);
        let recency = recency_score(latest_year, reference_year);
        let citations = citation_count(text);
        let citation_density = citation_density_score(citations);
        let reliability = reliability_score(authority, quality, recency, citation_density);

        let content_triggers = self.triggers.detect(&TriggerInput {
            domain: &hit.domain,
            text,
            authority,
            content_type,
            category_fields: &category_fields,
            citation_count: citations,
            latest_year,
            reference_year,
        });

        ContentAnalysis {
            url: hit.url.clone(),
            domain: hit.domain.clone(),
            extracted_content: fetched.text.clone(),
            reliability_score: reliability,
            structured_data: StructuredData {
                title: extract_title(text, &hit.title),
                main_content: extract_main_content(text),
                key_points: extract_key_points(text),
                facts: extract_facts(text),
                citations: extract_citations(text),
                content_type,
                content_triggers,
                category_fields,
            },
            metadata: AnalysisMetadata {
                content_length: text.chars().count(),
                extraction_method: fetched.extraction_method.clone(),
                processing_time_ms,
                quality_indicators: QualityIndicators {
                    domain_authority: authority,
                    content_quality: quality,
                    recency,
                    citation_density,
                    word_count: word_count(text),
                    has_structure: has_structure(text),
                    has_code_blocks: has_code_blocks(text),
                    latest_year,
                },
            },
        }
    }
}

/// Weighted reliability in [0, 100].
pub fn reliability_score(authority: f64, quality: f64, recency: f64, citations: f64) -> f64 {
    (0.4 * authority + 0.3 * quality + 0.15 * recency + 0.15 * citations).clamp(0.0, 100.0)
}

/// Structural quality of the text in [0, 100].
pub fn content_quality(text: &str, content_type: ContentType, fields: &CategoryFields) -> f64 {
    let chars = text.chars().count();
    let mut score: f64 = 10.0;

    score += match chars {
        n if n >= 3_000 => 40.0,
        n if n >= 1_500 => 30.0,
        n if n >= 800 => 20.0,
        n if n >= 300 => 10.0,
        _ => 0.0,
    };

    score += match count_headers(text) {
        0 => 0.0,
        1 => 8.0,
        _ => 15.0,
    };
    if count_list_items(text) >= 3 {
        score += 10.0;
    }
    if has_code_blocks(text) {
        score += 10.0;
    }
    let paragraphs = text.lines().filter(|l| word_count(l) >= 15).count();
    if paragraphs >= 3 {
        score += 10.0;
    }

    match (content_type, fields) {
        (ContentType::Recipe, CategoryFields::Recipe(r)) => {
            score += match (r.ingredients.is_empty(), r.instructions.is_empty()) {
                (false, false) => 15.0,
                (true, true) => 0.0,
                _ => 7.0,
            };
        }
        (_, CategoryFields::Tutorial(t)) if !t.steps.is_empty() => score += 10.0,
        _ => {}
    }

    score.clamp(0.0, 100.0)
}

/// Most recent plausible year in the text, ignoring years after `reference_year`.
pub fn latest_year(text: &str, reference_year: i32) -> Option<i32> {
    extract_years(text)
        .into_iter()
        .filter(|y| *y <= reference_year)
        .max()
}

/// Step function over content age; undated content scores neutral.
pub fn recency_score(latest_year: Option<i32>, reference_year: i32) -> f64 {
    match latest_year.map(|y| (reference_year - y).max(0)) {
        None => 50.0,
        Some(0) => 100.0,
        Some(1) => 85.0,
        Some(2) => 70.0,
        Some(3..=5) => 50.0,
        Some(_) => 25.0,
    }
}

pub fn citation_density_score(citations: usize) -> f64 {
    (citations as f64 * 15.0).min(100.0)
}
