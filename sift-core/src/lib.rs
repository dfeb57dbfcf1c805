//! # Sift Core
//!
//! Core library for the sift agentic search pipeline.
//! Provides intent planning, adaptive search execution, content analysis,
//! fact triangulation, the dependency-batched step executor, configuration,
//! and the shared data model.

pub mod config;
pub mod error;
pub mod providers;
pub mod research;
pub mod text;
pub mod types;
pub mod workflow;

// Re-export commonly used types at the crate root.
pub use config::{CyclePolicy, SiftConfig, load_config};
pub use error::{ConfigError, ExecutorError, FetchError, ProviderError, Result, SiftError};
pub use providers::{
    ContentFetcher, MockContentFetcher, MockNarrativeGenerator, MockSearchProvider,
    NarrativeGenerator, SearchProvider,
};
pub use research::{
    ContentAnalyzer, IntentPlanner, OutputFormat, PipelineCoordinator, ResponseRenderer,
    SearchExecutor, SynthesisAgent,
};
pub use types::{
    ContentAnalysis, ContentTrigger, ConditionalTrigger, FactCategory, SearchPlan, SearchResult,
    SynthesizedResponse, VerifiedFact,
};
pub use workflow::{DagExecutor, DagRunReport, DagStep, RunPhase, StepRunner, StepState};
