//! Web tools — fetch a page as plain text, search via DuckDuckGo.
//!
//! Both use the HTML endpoints directly; no API key is needed. Markup is
//! reduced to text with a few regexes, which is good enough for a small
//! model to read and much cheaper than a DOM parser.

use async_trait::async_trait;
use leap_core::error::ToolError;
use leap_core::tool::{Tool, ToolOutput, ToolParam};
use regex_lite::Regex;
use std::sync::LazyLock;
use tracing::debug;

const DEFAULT_MAX_LENGTH: usize = 5000;
const DEFAULT_NUM_RESULTS: usize = 5;
const MAX_NUM_RESULTS: usize = 10;
const SNIPPET_CHARS: usize = 200;
const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid regex"));
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("valid regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));
static RESULT_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)
        .expect("valid regex")
});
static RESULT_SNIPPET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#).expect("valid regex")
});

/// Reduce an HTML document to whitespace-normalised text.
pub fn html_to_text(html: &str) -> String {
    let text = SCRIPT_RE.replace_all(html, "");
    let text = STYLE_RE.replace_all(&text, "");
    let text = TAG_RE.replace_all(&text, " ");
    let text = decode_entities(&text);
    SPACE_RE.replace_all(&text, " ").trim().to_string()
}

fn page_title(html: &str) -> String {
    TITLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| html_to_text(m.as_str()))
        .unwrap_or_default()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

pub struct FetchUrlTool {
    client: reqwest::Client,
}

impl FetchUrlTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn description(&self) -> &str {
        "Fetch webpage content"
    }

    fn parameters(&self) -> &[ToolParam] {
        const PARAMS: &[ToolParam] = &[ToolParam::required("url"), ToolParam::optional("max_length")];
        PARAMS
    }

    fn output_fields(&self) -> &[&str] {
        &["content", "title", "length"]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let url = arguments["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;
        let max_length = arguments["max_length"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_LENGTH);

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Ok(ToolOutput::failed(format!(
                "Unsupported URL '{url}': must start with http:// or https://"
            )));
        }

        debug!(url = %url, "Fetching URL");
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return Ok(ToolOutput::failed(format!("Request failed: {e}"))),
        };
        let status = response.status();
        if !status.is_success() {
            return Ok(ToolOutput::failed(format!("HTTP {} for {url}", status.as_u16())));
        }
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return Ok(ToolOutput::failed(format!("Failed to read body: {e}"))),
        };

        let title = page_title(&body);
        let text = html_to_text(&body);
        let length = text.chars().count();
        let content: String = text.chars().take(max_length).collect();

        Ok(ToolOutput::data(serde_json::json!({
            "url": url,
            "title": title,
            "content": content,
            "length": length,
            "truncated": length > max_length,
        })))
    }
}

pub struct WebSearchTool {
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web"
    }

    fn parameters(&self) -> &[ToolParam] {
        const PARAMS: &[ToolParam] = &[ToolParam::required("query"), ToolParam::optional("num_results")];
        PARAMS
    }

    fn output_fields(&self) -> &[&str] {
        &["results", "titles", "urls", "snippets"]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let num_results = arguments["num_results"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_NUM_RESULTS)
            .clamp(1, MAX_NUM_RESULTS);

        debug!(query = %query, num_results, "Searching the web");
        let response = match self.client.get(SEARCH_URL).query(&[("q", query)]).send().await {
            Ok(r) => r,
            Err(e) => return Ok(ToolOutput::failed(format!("Search request failed: {e}"))),
        };
        if !response.status().is_success() {
            return Ok(ToolOutput::failed(format!(
                "Search returned HTTP {}",
                response.status().as_u16()
            )));
        }
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return Ok(ToolOutput::failed(format!("Failed to read search results: {e}"))),
        };

        let results = parse_search_results(&body, num_results);
        Ok(ToolOutput::data(serde_json::json!({
            "query": query,
            "count": results.len(),
            "results": results,
        })))
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Pull result links and snippets out of a DuckDuckGo HTML results page.
fn parse_search_results(html: &str, limit: usize) -> Vec<SearchResult> {
    let snippets: Vec<String> = RESULT_SNIPPET_RE
        .captures_iter(html)
        .map(|c| html_to_text(&c[1]).chars().take(SNIPPET_CHARS).collect())
        .collect();

    RESULT_LINK_RE
        .captures_iter(html)
        .take(limit)
        .enumerate()
        .map(|(i, c)| SearchResult {
            title: html_to_text(&c[2]),
            url: resolve_result_url(&decode_entities(&c[1])),
            snippet: snippets.get(i).cloned().unwrap_or_default(),
        })
        .collect()
}

/// DuckDuckGo wraps targets as `//duckduckgo.com/l/?uddg=<encoded>`.
fn resolve_result_url(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    reqwest::Url::parse(&absolute)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or(absolute)
}
