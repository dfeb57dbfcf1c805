//! Agentic search and synthesis pipeline.
//!
//! Runs a 4-stage process for one query:
//! 1. **Plan**: read intent and build a `SearchPlan` ([`planner`])
//! 2. **Search**: execute steps with adaptive variations and conditional follow-ups ([`executor`])
//! 3. **Analyze**: fetch the best hits, score reliability, classify and extract ([`analyzer`])
//! 4. **Synthesize**: triangulate facts, surface conflicts, write the answer ([`synthesis`])
//!
//! [`pipeline::PipelineCoordinator`] wires the stages together and threads a
//! cancellation token through all of them.

pub mod analyzer;
pub mod contradiction;
pub mod executor;
pub mod extraction;
pub mod narrative;
pub mod output;
pub mod pipeline;
pub mod planner;
pub mod quality;
pub mod rules;
pub mod synthesis;
pub mod triggers;

pub use analyzer::ContentAnalyzer;
pub use contradiction::ConflictDetector;
pub use executor::SearchExecutor;
pub use output::{OutputFormat, ResponseRenderer};
pub use pipeline::PipelineCoordinator;
pub use planner::IntentPlanner;
pub use synthesis::SynthesisAgent;
