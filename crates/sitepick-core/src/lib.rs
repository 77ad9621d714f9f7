use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod brand;
pub mod classify;
pub mod params;
pub mod rank;
pub mod run;
pub mod score;
pub mod shape;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("invalid config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One organic result as returned by a search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
}

impl SearchHit {
    pub fn new(url: impl Into<String>, title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredHit {
    pub hit: SearchHit,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedHit {
    pub hit: SearchHit,
    pub score: i64,
    pub label: Label,
}

impl ClassifiedHit {
    pub fn new(scored: ScoredHit, label: Label) -> Self {
        Self {
            hit: scored.hit,
            score: scored.score,
            label,
        }
    }
}

/// Binary page label. `Post` is the answer under any uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Listing,
    #[default]
    Post,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Listing => "LISTING",
            Label::Post => "POST",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LISTING" | "SEO" => Ok(Label::Listing),
            "POST" => Ok(Label::Post),
            other => Err(Error::Config(format!("unknown label: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    /// 1-based result page.
    pub page: u32,
    pub per_page: Option<usize>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            page: 1,
            per_page: None,
            language: None,
            country: None,
            timeout_ms: None,
        }
    }

    /// `site:` query for a bare host.
    pub fn site(domain: &str) -> Self {
        Self::new(format!("site:{domain}"))
    }

    /// Quoted exact-phrase query.
    pub fn exact_phrase(phrase: &str) -> Self {
        Self::new(format!("\"{phrase}\""))
    }

    /// Query text and page of `base`; locale, timeout and page size of `self`.
    pub fn with_query(self, base: SearchQuery) -> Self {
        Self {
            query: base.query,
            page: base.page,
            ..self
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub provider: String,
    pub cost_units: u64,
    pub timings_ms: BTreeMap<String, u128>,
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse>;
}

/// A single-turn chat completion endpoint.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn chat(&self, system: &str, user: &str, timeout_ms: u64) -> Result<String>;
}

/// External labelling of URLs the rule stages could not decide.
///
/// Implementations return one label per input URL, in order. Errors are
/// absorbed by [`classify::HybridClassifier`]; they never reach its callers.
#[async_trait::async_trait]
pub trait BatchClassifier: Send + Sync {
    async fn classify_batch(&self, urls: &[String]) -> Result<Vec<Label>>;
}

/// Lowercased host of a URL with a leading `www.` removed.
pub fn host_of(url: &str) -> Option<String> {
    let u = url::Url::parse(url).ok()?;
    let host = u.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// `url` is hosted on `domain` itself or one of its subdomains.
///
/// Hosts are compared label-wise: `notd.example` is not on `d.example`, and a
/// domain that only appears in the query string never counts.
pub fn is_on_domain(url: &str, domain: &str) -> bool {
    let target = clean_domain(domain);
    let target = target.strip_prefix("www.").unwrap_or(&target);
    if target.is_empty() {
        return false;
    }
    host_of(url).is_some_and(|host| {
        host == target
            || host
                .strip_suffix(target)
                .is_some_and(|sub| sub.ends_with('.'))
    })
}

/// Accepts `example.com`, `https://example.com/`, `www.example.com/path`.
pub fn clean_domain(input: &str) -> String {
    let s = input.trim();
    let s = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
        .unwrap_or(s);
    let s = s.split('/').next().unwrap_or("");
    s.trim_end_matches('.').to_ascii_lowercase()
}
