//! External collaborators consumed by the pipeline.
//!
//! The pipeline only depends on these traits. HTTP-backed implementations live
//! in [`http`]; in-memory doubles for tests live in [`mock`].

pub mod http;
pub mod mock;

use crate::error::{FetchError, ProviderError};
use crate::types::RawSearchResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::{DuckDuckGoSearchProvider, HttpContentFetcher};
pub use mock::{MockContentFetcher, MockNarrativeGenerator, MockSearchProvider};

/// Kind of search requested from the provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    #[default]
    Web,
    News,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchOptions {
    pub search_type: SearchType,
    pub result_count: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            search_type: SearchType::Web,
            result_count: 10,
        }
    }
}

/// A web search backend.
///
/// "No results" is `Ok(vec![])`, never an error. Network and authentication
/// failures are errors; the executor treats them as zero results.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<RawSearchResult>, ProviderError>;

    /// Short identifier used in logs.
    fn name(&self) -> &str;
}

/// Readable text fetched from a URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchedContent {
    pub text: String,
    /// How the text was obtained (e.g. `html_to_text`, `plain_text`).
    pub extraction_method: String,
}

/// Fetches and extracts the readable text of a page.
///
/// Any failure is an error; the analyzer drops that URL.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError>;
}

/// Free-text completion used by the DAG executor's synthesis phase.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}
