use crate::{env, env_any};
use serde::Deserialize;
use sitepick_core::{Error, Result, SearchHit, SearchProvider, SearchQuery, SearchResponse};
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

pub const DEFAULT_LANGUAGE: &str = "ko";
pub const DEFAULT_COUNTRY: &str = "kr";

fn timeout_ms_from_query(q: &SearchQuery) -> u64 {
    q.timeout_ms.unwrap_or(15_000).clamp(1_000, 60_000)
}

fn serper_api_key_from_env() -> Option<String> {
    env_any(&["SITEPICK_SERPER_API_KEY", "SERPER_API_KEY"])
}

fn brave_api_key_from_env() -> Option<String> {
    env_any(&["SITEPICK_BRAVE_API_KEY", "BRAVE_SEARCH_API_KEY"])
}

/// Google results through serper.dev.
#[derive(Debug, Clone)]
pub struct SerperSearchProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl SerperSearchProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: env("SITEPICK_SERPER_ENDPOINT")
                .unwrap_or_else(|| "https://google.serper.dev/search".to_string()),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = serper_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing SITEPICK_SERPER_API_KEY (or SERPER_API_KEY)".to_string())
        })?;
        Ok(Self::new(client, api_key))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    link: Option<String>,
    title: Option<String>,
    snippet: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for SerperSearchProvider {
    fn name(&self) -> &'static str {
        "serper"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let body = serde_json::json!({
            "q": q.query,
            "gl": q.country.as_deref().unwrap_or(DEFAULT_COUNTRY),
            "hl": q.language.as_deref().unwrap_or(DEFAULT_LANGUAGE),
            "num": q.per_page.unwrap_or(10).min(100),
            "page": q.page.max(1),
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .timeout(std::time::Duration::from_millis(timeout_ms_from_query(q)))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("serper search HTTP {status}")));
        }

        let parsed: SerperResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let hits = parsed
            .organic
            .into_iter()
            .filter_map(|r| {
                let url = r.link.filter(|u| !u.trim().is_empty())?;
                Some(SearchHit::new(
                    url,
                    r.title.unwrap_or_default(),
                    r.snippet.unwrap_or_default(),
                ))
            })
            .collect();

        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("search".to_string(), t0.elapsed().as_millis());

        Ok(SearchResponse {
            hits,
            provider: "serper".to_string(),
            cost_units: 1,
            timings_ms,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BraveSearchProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl BraveSearchProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: env("SITEPICK_BRAVE_ENDPOINT")
                .unwrap_or_else(|| "https://api.search.brave.com/res/v1/web/search".to_string()),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = brave_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured(
                "missing SITEPICK_BRAVE_API_KEY (or BRAVE_SEARCH_API_KEY)".to_string(),
            )
        })?;
        Ok(Self::new(client, api_key))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct BraveWebSearchResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    results: Option<Vec<BraveWebResult>>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResult {
    url: String,
    title: Option<String>,
    description: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for BraveSearchProvider {
    fn name(&self) -> &'static str {
        "brave"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        // Brave caps `count` at 20 and pages with a 0-based `offset`.
        let count = q.per_page.unwrap_or(10).min(20);
        let offset = q.page.saturating_sub(1);

        let resp = self
            .client
            .get(&self.endpoint)
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", q.query.as_str())])
            .query(&[("count", count.to_string()), ("offset", offset.to_string())])
            .query(&[
                ("search_lang", q.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)),
                ("country", q.country.as_deref().unwrap_or(DEFAULT_COUNTRY)),
            ])
            .timeout(std::time::Duration::from_millis(timeout_ms_from_query(q)))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("brave search HTTP {status}")));
        }

        let parsed: BraveWebSearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let hits = parsed
            .web
            .and_then(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .map(|r| {
                SearchHit::new(
                    r.url,
                    r.title.unwrap_or_default(),
                    r.description.unwrap_or_default(),
                )
            })
            .collect();

        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("search".to_string(), t0.elapsed().as_millis());

        Ok(SearchResponse {
            hits,
            provider: "brave".to_string(),
            cost_units: 1,
            timings_ms,
        })
    }
}

/// Bounds for a paginated fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub max_pages: u32,
    pub per_page: usize,
    pub max_results: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            max_pages: 10,
            per_page: 10,
            max_results: 100,
        }
    }
}

/// Walk result pages of `query` until a page is empty, a page adds no new
/// URL, `max_pages` is reached or `max_results` hits are collected.
///
/// A failure on the first page is returned; later failures end the walk
/// with what was collected so far.
pub async fn fetch_pages(
    provider: &dyn SearchProvider,
    query: &SearchQuery,
    limits: PageLimits,
) -> Result<Vec<SearchHit>> {
    let mut out: Vec<SearchHit> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for page in 1..=limits.max_pages.max(1) {
        if out.len() >= limits.max_results {
            break;
        }
        let mut q = query.clone().with_page(page);
        q.per_page = Some(limits.per_page);

        let resp = match provider.search(&q).await {
            Ok(r) => r,
            Err(e) if out.is_empty() => return Err(e),
            Err(e) => {
                tracing::warn!(provider = provider.name(), page, error = %e, "search page failed; keeping earlier pages");
                break;
            }
        };
        if resp.hits.is_empty() {
            break;
        }

        let before = out.len();
        for hit in resp.hits {
            if seen.insert(hit.url.clone()) {
                out.push(hit);
            }
        }
        let added = out.len() - before;
        tracing::debug!(provider = provider.name(), query = %q.query, page, added, "search page");
        if added == 0 {
            break;
        }
    }

    out.truncate(limits.max_results);
    Ok(out)
}
