//! Pipeline coordinator: plan, search, analyze and synthesize in sequence.

use super::analyzer::ContentAnalyzer;
use super::executor::SearchExecutor;
use super::output::{OutputFormat, ResponseRenderer};
use super::planner::IntentPlanner;
use super::synthesis::SynthesisAgent;
use crate::config::SiftConfig;
use crate::error::SiftError;
use crate::providers::{ContentFetcher, SearchProvider};
use crate::types::{SearchPlan, StageTimings, SynthesizedResponse};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs the four stages for one query at a time.
///
/// Holds no per-query state; one coordinator can serve concurrent queries.
pub struct PipelineCoordinator {
    planner: IntentPlanner,
    executor: SearchExecutor,
    analyzer: ContentAnalyzer,
    synthesizer: SynthesisAgent,
    top_n: usize,
    deadline: Option<Duration>,
}

impl PipelineCoordinator {
    pub fn new(
        planner: IntentPlanner,
        executor: SearchExecutor,
        analyzer: ContentAnalyzer,
        synthesizer: SynthesisAgent,
    ) -> Self {
        Self {
            planner,
            executor,
            analyzer,
            synthesizer,
            top_n: 5,
            deadline: None,
        }
    }

    /// Wire every stage from configuration and the given collaborators.
    pub fn from_config(
        config: &SiftConfig,
        provider: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn ContentFetcher>,
    ) -> Self {
        let planner = IntentPlanner::new().with_reference_year(config.analysis.reference_year);
        let executor =
            SearchExecutor::new(provider, config.search.clone(), config.executor.clone());
        let analyzer = ContentAnalyzer::new(fetcher, config.analysis.clone());
        let synthesizer = SynthesisAgent::new(config.synthesis.clone());
        Self::new(planner, executor, analyzer, synthesizer)
            .with_top_n(config.analysis.top_n)
            .with_deadline(config.pipeline.deadline_secs.map(Duration::from_secs))
    }

    /// Number of search hits selected for full analysis.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n.max(1);
        self
    }

    /// Global deadline across all stages.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Plan a query without searching.
    pub fn plan(&self, query: &str) -> SearchPlan {
        self.planner.plan(query)
    }

    /// Run the full pipeline for one query.
    pub async fn run(&self, query: &str) -> SynthesizedResponse {
        self.run_with_cancellation(query, &CancellationToken::new())
            .await
    }

    /// Run the full pipeline, stopping early when `cancel` fires or the
    /// configured deadline passes.
    ///
    /// Always returns a response. An interrupted run synthesizes whatever was
    /// gathered and records the interruption as a gap.
    pub async fn run_with_cancellation(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> SynthesizedResponse {
        let total = Instant::now();
        let token = cancel.child_token();
        let deadline_timer = self.deadline.map(|deadline| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                warn!(deadline_secs = deadline.as_secs(), "Pipeline deadline reached; cancelling");
                token.cancel();
            })
        });

        info!(query, "Starting search pipeline");

        if token.is_cancelled() {
            warn!(query, "Pipeline cancelled before planning");
        }
        let stage = Instant::now();
        let plan = self.planner.plan(query);
        let planning_ms = elapsed_ms(stage);
        info!(
            query,
            domain = ?plan.intent.domain,
            approach = ?plan.synthesis_approach,
            steps = 1 + plan.parallel_searches.len(),
            conditional = plan.conditional_searches.len(),
            elapsed_ms = planning_ms,
            "Planned search"
        );

        let stage = Instant::now();
        let results = if token.is_cancelled() {
            Vec::new()
        } else {
            self.executor.execute_search_plan(&plan, &token).await
        };
        let search_ms = elapsed_ms(stage);
        info!(
            steps = results.len(),
            results = results.iter().map(|r| r.results.len()).sum::<usize>(),
            elapsed_ms = search_ms,
            "Search complete"
        );

        let stage = Instant::now();
        let analyses = if token.is_cancelled() {
            Vec::new()
        } else {
            self.analyzer
                .analyze_search_results(&results, self.top_n, &token)
                .await
        };
        let analysis_ms = elapsed_ms(stage);
        info!(analyses = analyses.len(), elapsed_ms = analysis_ms, "Analysis complete");

        if let Some(timer) = deadline_timer {
            timer.abort();
        }
        let interrupted = token.is_cancelled();

        let stage = Instant::now();
        let mut response = self
            .synthesizer
            .synthesize(&plan, &results, &analyses, interrupted);
        let synthesis_ms = elapsed_ms(stage);

        response.timings = StageTimings {
            planning_ms,
            search_ms,
            analysis_ms,
            synthesis_ms,
            total_ms: elapsed_ms(total),
        };
        info!(
            query,
            confidence = response.confidence,
            sources = response.source_summaries.len(),
            interrupted,
            elapsed_ms = response.timings.total_ms,
            "Pipeline complete"
        );
        response
    }

    /// Run the pipeline and render the response.
    pub async fn run_and_render(
        &self,
        query: &str,
        format: OutputFormat,
        cancel: &CancellationToken,
    ) -> Result<(SynthesizedResponse, String), SiftError> {
        let response = self.run_with_cancellation(query, cancel).await;
        let rendered = ResponseRenderer::render(&response, format)?;
        Ok((response, rendered))
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::providers::{MockContentFetcher, MockSearchProvider};
    use crate::research::synthesis::INTERRUPTED_GAP;
    use crate::types::RawSearchResult;

    fn config() -> SiftConfig {
        SiftConfig {
            analysis: AnalysisConfig {
                reference_year: Some(2025),
                ..AnalysisConfig::default()
            },
            ..SiftConfig::default()
        }
    }

    #[tokio::test]
    async fn test_failing_provider_still_returns_response() {
        let coordinator = PipelineCoordinator::from_config(
            &config(),
            Arc::new(MockSearchProvider::new().always_failing()),
            Arc::new(MockContentFetcher::new()),
        );
        let response = coordinator.run("history of the bicycle").await;
        assert_eq!(response.query, "history of the bicycle");
        assert_eq!(response.confidence, 0.0);
        assert!(response.source_summaries.is_empty());
        assert!(!response.gaps.is_empty());
    }

    #[tokio::test]
    async fn test_pre_cancelled_run_is_interrupted() {
        let provider = Arc::new(MockSearchProvider::new().with_fallback(vec![
            RawSearchResult::new("t", "https://a.com/x", "snippet", 1),
        ]));
        let coordinator = PipelineCoordinator::from_config(
            &config(),
            provider.clone(),
            Arc::new(MockContentFetcher::new()),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let response = coordinator.run_with_cancellation("bicycle", &cancel).await;
        assert!(provider.calls().is_empty());
        assert!(response.gaps.iter().any(|g| g == INTERRUPTED_GAP));
    }

    #[tokio::test]
    async fn test_deadline_interrupts_slow_provider() {
        let provider = MockSearchProvider::new()
            .with_fallback(vec![RawSearchResult::new("t", "https://a.com/x", "s", 1)])
            .with_delay(Duration::from_secs(30));
        let coordinator = PipelineCoordinator::from_config(
            &config(),
            Arc::new(provider),
            Arc::new(MockContentFetcher::new()),
        )
        .with_deadline(Some(Duration::from_millis(50)));

        let started = Instant::now();
        let response = coordinator.run("bicycle").await;
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(response.gaps.iter().any(|g| g == INTERRUPTED_GAP));
    }

    #[tokio::test]
    async fn test_run_and_render_summary() {
        let coordinator = PipelineCoordinator::from_config(
            &config(),
            Arc::new(MockSearchProvider::new()),
            Arc::new(MockContentFetcher::new()),
        );
        let (response, text) = coordinator
            .run_and_render("bicycle", OutputFormat::Summary, &CancellationToken::new())
            .await
            .unwrap();
        assert!(text.starts_with(&response.final_answer));
        assert!(text.contains("**Confidence:**"));
    }
}
