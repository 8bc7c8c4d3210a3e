//! Web search provider and the retry policy wrapped around it
//!
//! The search provider is one of the pipeline's unreliable collaborators:
//! the research stage retries it with bounded exponential backoff and then
//! degrades to a zero-source run instead of aborting.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use backon::ExponentialBuilder;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const SEARCH_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) scribe/0.4 (+https://github.com/scribe)";

/// One web-search hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub body: String,
    pub href: String,
}

/// Web search abstraction
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run a query, returning up to `max_results` ordered hits
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

/// Bounded exponential backoff applied to the web-search call
///
/// Expressed as an explicit policy value rather than an annotation so the
/// single call site that needs it stays visible, and so tests can inject
/// sub-second bounds.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_times: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_times: usize, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_times,
            min_delay,
            max_delay,
        }
    }

    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_times)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_times: 3,
            min_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// DuckDuckGo search client backed by the HTML endpoint
///
/// No credential required; results are extracted from the result blocks of
/// the returned document.
pub struct DuckDuckGoClient {
    http: reqwest::Client,
}

impl DuckDuckGoClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent(SEARCH_USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { http }
    }
}

impl Default for DuckDuckGoClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let response = self
            .http
            .post(SEARCH_ENDPOINT)
            .form(&[("q", query)])
            .send()
            .await
            .context("Search request failed")?;

        if !response.status().is_success() {
            bail!("Search endpoint returned HTTP {}", response.status());
        }

        let html = response.text().await.context("Search response unreadable")?;
        Ok(parse_results(&html, max_results))
    }
}

/// Extract result blocks from the search page
fn parse_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let document = Html::parse_document(html);
    let result_sel = match Selector::parse("div.result") {
        Ok(sel) => sel,
        Err(_) => return Vec::new(),
    };
    let title_sel = Selector::parse("a.result__a").ok();
    let snippet_sel = Selector::parse("a.result__snippet, div.result__snippet").ok();

    let (Some(title_sel), Some(snippet_sel)) = (title_sel, snippet_sel) else {
        return Vec::new();
    };

    let mut results = Vec::new();
    for block in document.select(&result_sel) {
        if results.len() >= max_results {
            break;
        }
        let Some(anchor) = block.select(&title_sel).next() else {
            continue;
        };
        let title = anchor.text().collect::<String>().trim().to_string();
        let href = anchor
            .value()
            .attr("href")
            .map(resolve_redirect)
            .unwrap_or_default();
        let body = block
            .select(&snippet_sel)
            .next()
            .map(|s| s.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        if title.is_empty() {
            continue;
        }
        results.push(SearchResult { title, body, href });
    }
    results
}

/// Unwrap the `uddg` redirect parameter the endpoint wraps links in
fn resolve_redirect(href: &str) -> String {
    let absolute = if let Some(stripped) = href.strip_prefix("//") {
        format!("https://{stripped}")
    } else {
        href.to_string()
    };

    if let Ok(url) = Url::parse(&absolute) {
        if url.path().starts_with("/l/") {
            if let Some((_, target)) = url.query_pairs().find(|(key, _)| key == "uddg") {
                return target.into_owned();
            }
        }
    }
    absolute
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PAGE: &str = r#"
        <html><body>
          <div class="result">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fremote&rut=abc">Remote Work Trends</a>
            <a class="result__snippet">Remote work has grown steadily.</a>
          </div>
          <div class="result">
            <a class="result__a" href="https://example.org/office">Office Culture</a>
            <div class="result__snippet">Hybrid offices are common.</div>
          </div>
          <div class="result">
            <a class="result__a" href="https://example.net/third">Third Hit</a>
          </div>
        </body></html>
    "#;

    #[test]
    fn parses_result_blocks_in_order() {
        let results = parse_results(SAMPLE_PAGE, 10);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].title, "Remote Work Trends");
        assert_eq!(results[0].body, "Remote work has grown steadily.");
        assert_eq!(results[0].href, "https://example.com/remote");
        assert_eq!(results[1].href, "https://example.org/office");
        // snippet missing on the third block, not a parse failure
        assert_eq!(results[2].body, "");
    }

    #[test]
    fn truncates_to_max_results() {
        let results = parse_results(SAMPLE_PAGE, 2);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn redirect_links_are_unwrapped() {
        assert_eq!(
            resolve_redirect("//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fa%20b&rut=x"),
            "https://example.com/a b"
        );
        assert_eq!(
            resolve_redirect("https://example.org/direct"),
            "https://example.org/direct"
        );
    }

    #[test]
    fn default_policy_matches_documented_bounds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_times, 3);
        assert_eq!(policy.min_delay, Duration::from_secs(4));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
    }
}
