//! In-memory collaborators for tests and offline runs.

use super::{ContentFetcher, FetchedContent, NarrativeGenerator, SearchOptions, SearchProvider};
use crate::error::{FetchError, ProviderError};
use crate::types::RawSearchResult;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// A search provider that serves canned results.
///
/// Queries are matched exactly first; unmatched queries get the fallback
/// results (empty unless set).
#[derive(Default)]
pub struct MockSearchProvider {
    responses: HashMap<String, Vec<RawSearchResult>>,
    fallback: Vec<RawSearchResult>,
    failing: HashSet<String>,
    fail_all: bool,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockSearchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `results` for exactly `query`.
    pub fn with_results(mut self, query: impl Into<String>, results: Vec<RawSearchResult>) -> Self {
        self.responses.insert(query.into(), results);
        self
    }

    /// Serve `results` for every query without an exact match.
    pub fn with_fallback(mut self, results: Vec<RawSearchResult>) -> Self {
        self.fallback = results;
        self
    }

    /// Fail calls for exactly `query`.
    pub fn failing_on(mut self, query: impl Into<String>) -> Self {
        self.failing.insert(query.into());
        self
    }

    /// Fail every call.
    pub fn always_failing(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every query received so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<RawSearchResult>, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(query.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_all || self.failing.contains(query) {
            return Err(ProviderError::Request {
                message: format!("mock failure for '{query}'"),
            });
        }

        let results = self.responses.get(query).unwrap_or(&self.fallback);
        Ok(results.iter().take(options.result_count).cloned().collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A content fetcher that serves canned page text; unknown URLs fail.
#[derive(Default)]
pub struct MockContentFetcher {
    pages: HashMap<String, String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockContentFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.pages.insert(url.into(), text.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl ContentFetcher for MockContentFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(url.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.pages.get(url) {
            Some(text) if !text.trim().is_empty() => Ok(FetchedContent {
                text: text.clone(),
                extraction_method: "mock".to_string(),
            }),
            Some(_) => Err(FetchError::Empty {
                url: url.to_string(),
            }),
            None => Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// A narrative generator that returns a fixed completion.
pub struct MockNarrativeGenerator {
    response: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockNarrativeGenerator {
    pub fn with_response(text: &str) -> Self {
        Self {
            response: Some(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A generator whose every call fails.
    pub fn failing() -> Self {
        Self {
            response: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl NarrativeGenerator for MockNarrativeGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(prompt.to_string());
        self.response.clone().ok_or_else(|| ProviderError::Request {
            message: "mock generator failure".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str) -> RawSearchResult {
        RawSearchResult::new("t", url, "snippet", 1)
    }

    #[tokio::test]
    async fn test_mock_search_exact_and_fallback() {
        let provider = MockSearchProvider::new()
            .with_results("a", vec![hit("https://a.com")])
            .with_fallback(vec![hit("https://f.com")]);
        let opts = SearchOptions::default();

        assert_eq!(provider.search("a", &opts).await.unwrap()[0].domain, "a.com");
        assert_eq!(provider.search("zzz", &opts).await.unwrap()[0].domain, "f.com");
        assert_eq!(provider.calls(), vec!["a", "zzz"]);
    }

    #[tokio::test]
    async fn test_mock_search_failure() {
        let provider = MockSearchProvider::new().failing_on("bad");
        assert!(provider.search("bad", &SearchOptions::default()).await.is_err());
        assert!(provider.search("good", &SearchOptions::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mock_fetcher_unknown_url_fails() {
        let fetcher = MockContentFetcher::new().with_page("https://a.com", "text");
        assert!(fetcher.fetch("https://a.com").await.is_ok());
        assert!(matches!(
            fetcher.fetch("https://b.com").await,
            Err(FetchError::HttpStatus { status: 404, .. })
        ));
    }

    #[test]
    fn test_mock_generator() {
        let ok = MockNarrativeGenerator::with_response("done");
        assert_eq!(tokio_test::block_on(ok.complete("p")).unwrap(), "done");
        assert_eq!(ok.prompts(), vec!["p"]);
        assert!(tokio_test::block_on(MockNarrativeGenerator::failing().complete("p")).is_err());
    }

    #[test]
    fn test_mock_search_truncates_to_result_count() {
        let provider = MockSearchProvider::new()
            .with_fallback((1..=5).map(|i| hit(&format!("https://{i}.com"))).collect());
        let opts = SearchOptions {
            result_count: 2,
            ..SearchOptions::default()
        };
        let results = tokio_test::block_on(provider.search("q", &opts)).unwrap();
        assert_eq!(results.len(), 2);
    }
}
