//! HTTP-backed search and fetch collaborators.
//!
//! Search uses the DuckDuckGo HTML endpoint (no API key). Fetching downloads a
//! page and reduces HTML to plain text, keeping headings as `# ` lines, list
//! items as `- ` lines and `<pre>` blocks as fenced code so the analyzer can
//! still see document structure.

use super::{ContentFetcher, FetchedContent, SearchOptions, SearchProvider, SearchType};
use crate::config::HttpConfig;
use crate::error::{ConfigError, FetchError, ProviderError, SiftError};
use crate::types::RawSearchResult;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

static RESULT_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#)
        .expect("static regex")
});
static RESULT_SNIPPET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)class="result__snippet"[^>]*>(.*?)</(?:a|div|td)>"#).expect("static regex")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static regex"));

fn build_client(http: &HttpConfig, timeout: Duration) -> Result<reqwest::Client, SiftError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(http.user_agent.as_str())
        .redirect(reqwest::redirect::Policy::limited(http.max_redirects))
        .build()
        .map_err(|e| {
            ConfigError::Invalid {
                message: format!("Failed to create HTTP client: {e}"),
            }
            .into()
        })
}

// ---------------------------------------------------------------------------
// DuckDuckGoSearchProvider
// ---------------------------------------------------------------------------

/// Web search through DuckDuckGo's HTML results page.
pub struct DuckDuckGoSearchProvider {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl DuckDuckGoSearchProvider {
    pub fn new(http: &HttpConfig, timeout: Duration) -> Result<Self, SiftError> {
        Ok(Self {
            client: build_client(http, timeout)?,
            endpoint: http.search_endpoint.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearchProvider {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<RawSearchResult>, ProviderError> {
        let mut url = format!("{}?q={}", self.endpoint, urlencoding::encode(query));
        if options.search_type == SearchType::News {
            // DuckDuckGo's HTML endpoint has no news vertical; bias towards recent pages.
            url.push_str("&df=m");
        }

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                ProviderError::Request {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await.map_err(|e| ProviderError::Parse {
            message: format!("Failed to read search response: {e}"),
        })?;

        let results = parse_results_page(&body, options.result_count);
        debug!(query, count = results.len(), "DuckDuckGo search completed");
        Ok(results)
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

/// Parse a DuckDuckGo HTML results page into ranked hits.
pub fn parse_results_page(html: &str, limit: usize) -> Vec<RawSearchResult> {
    let snippets: Vec<String> = RESULT_SNIPPET_RE
        .captures_iter(html)
        .map(|c| clean_fragment(&c[1]))
        .collect();

    RESULT_LINK_RE
        .captures_iter(html)
        .enumerate()
        .filter_map(|(i, c)| {
            let url = resolve_redirect(&c[1])?;
            let title = clean_fragment(&c[2]);
            let snippet = snippets.get(i).cloned().unwrap_or_default();
            Some((url, title, snippet))
        })
        .take(limit)
        .enumerate()
        .map(|(i, (url, title, snippet))| RawSearchResult::new(title, url, snippet, i + 1))
        .collect()
}

/// Unwrap DuckDuckGo's `/l/?uddg=` redirect links to the target URL.
fn resolve_redirect(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let parsed = url::Url::parse(&absolute).ok()?;
    if parsed.path().starts_with("/l/") {
        parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())
    } else if parsed.scheme() == "http" || parsed.scheme() == "https" {
        Some(absolute)
    } else {
        None
    }
}

fn clean_fragment(fragment: &str) -> String {
    let text = TAG_RE.replace_all(fragment, "");
    decode_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// HttpContentFetcher
// ---------------------------------------------------------------------------

/// Downloads pages and converts them to readable text.
pub struct HttpContentFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_chars: usize,
}

impl HttpContentFetcher {
    pub fn new(http: &HttpConfig, timeout: Duration, max_chars: usize) -> Result<Self, SiftError> {
        Ok(Self {
            client: build_client(http, timeout)?,
            timeout,
            max_chars,
        })
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
            });
        }

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                FetchError::Request {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response.text().await.map_err(|e| FetchError::Request {
            url: url.to_string(),
            message: format!("Failed to read response body: {e}"),
        })?;

        let (text, extraction_method) =
            if content_type.contains("text/html") || content_type.contains("application/xhtml") {
                (html_to_text(&body), "html_to_text")
            } else {
                (body, "plain_text")
            };

        let text = crate::text::truncate_chars(&text, self.max_chars);
        if text.trim().is_empty() {
            return Err(FetchError::Empty {
                url: url.to_string(),
            });
        }

        Ok(FetchedContent {
            text,
            extraction_method: extraction_method.to_string(),
        })
    }
}

/// Reduce an HTML document to structured plain text.
pub fn html_to_text(html: &str) -> String {
    let mut text = String::new();
    let mut in_tag = false;
    let mut skipping = false;
    let mut tag_name = String::new();
    let mut building_tag = false;

    for ch in html.chars() {
        if ch == '<' {
            in_tag = true;
            building_tag = true;
            tag_name.clear();
            continue;
        }
        if ch == '>' {
            in_tag = false;
            building_tag = false;

            let tag = tag_name.to_lowercase();
            match tag.as_str() {
                "script" | "style" | "noscript" | "svg" => skipping = true,
                "/script" | "/style" | "/noscript" | "/svg" => skipping = false,
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => text.push_str("\n# "),
                "li" => text.push_str("\n- "),
                "pre" | "/pre" => text.push_str("\n```\n"),
                _ => {
                    if matches!(
                        tag.as_str(),
                        "p" | "/p" | "br" | "div" | "/div" | "tr" | "/li" | "/ul" | "/ol"
                            | "section" | "/section" | "article" | "/article"
                    ) || (tag.starts_with("/h") && tag.len() == 3)
                    {
                        text.push('\n');
                    }
                }
            }
            continue;
        }
        if in_tag {
            if building_tag && (ch.is_alphanumeric() || ch == '/') {
                tag_name.push(ch);
            } else {
                building_tag = false;
            }
            continue;
        }
        if skipping {
            continue;
        }
        text.push(ch);
    }

    let text = decode_entities(&text);

    let mut lines: Vec<&str> = text.lines().map(str::trim).collect();
    lines.dedup_by(|a, b| a.is_empty() && b.is_empty());
    lines
        .into_iter()
        .filter(|l| !l.is_empty() && *l != "#" && *l != "-")
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_keeps_structure() {
        let html = r#"<html><head><style>body{}</style><script>var x=1;</script></head>
            <body><h1>Vegan Lasagna</h1><p>Rich &amp; creamy.</p>
            <h2>Ingredients</h2><ul><li>12 noodles</li><li>2 cups sauce</li></ul>
            <pre>cargo run</pre></body></html>"#;
        let text = html_to_text(html);
        assert!(text.contains("# Vegan Lasagna"));
        assert!(text.contains("Rich & creamy."));
        assert!(text.contains("# Ingredients"));
        assert!(text.contains("- 12 noodles"));
        assert!(text.contains("```"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("body{}"));
    }

    #[test]
    fn test_parse_results_page() {
        let html = r#"
            <div class="result">
              <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.example.com%2Flasagna&amp;rut=abc">Best <b>Lasagna</b></a>
              <a class="result__snippet" href="x">A rich &amp; hearty lasagna recipe.</a>
            </div>
            <div class="result">
              <a rel="nofollow" class="result__a" href="https://cooking.edu/guide">Guide</a>
              <a class="result__snippet" href="y">Step by step.</a>
            </div>"#;
        let results = parse_results_page(html, 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://www.example.com/lasagna");
        assert_eq!(results[0].domain, "example.com");
        assert_eq!(results[0].title, "Best Lasagna");
        assert_eq!(results[0].snippet, "A rich & hearty lasagna recipe.");
        assert_eq!(results[0].position, 1);
        assert_eq!(results[1].domain, "cooking.edu");
        assert_eq!(results[1].position, 2);

        assert_eq!(parse_results_page(html, 1).len(), 1);
    }

    #[test]
    fn test_resolve_redirect_rejects_non_http() {
        assert_eq!(resolve_redirect("javascript:void(0)"), None);
        assert_eq!(
            resolve_redirect("https://a.com/x").as_deref(),
            Some("https://a.com/x")
        );
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_scheme() {
        let fetcher =
            HttpContentFetcher::new(&HttpConfig::default(), Duration::from_secs(1), 1000).unwrap();
        assert!(matches!(
            fetcher.fetch("ftp://example.com").await,
            Err(FetchError::InvalidUrl { .. })
        ));
    }
}
