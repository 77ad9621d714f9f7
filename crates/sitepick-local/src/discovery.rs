//! Per-domain discovery: fetch, ingest, score, classify, rank.
//!
//! Every domain gets its own [`DomainRun`]; a failed fetch only empties that
//! domain's report.

use crate::config::{Mode, PipelineConfig};
use crate::search::{fetch_pages, PageLimits};
use serde::Serialize;
use sitepick_core::brand::{brand_from_exact_phrase_hits, category_hubs, domain_token, resolve_from_titles};
use sitepick_core::classify::{classify_offline, HybridClassifier};
use sitepick_core::rank::{boost_target_domain, rank_domains, DomainHits, TARGET_DOMAIN_BONUS};
use sitepick_core::run::DomainRun;
use sitepick_core::score::Scorer;
use sitepick_core::{clean_domain, is_on_domain, ClassifiedHit, Result, SearchHit, SearchProvider, SearchQuery};
use std::sync::Arc;

/// Where a resolved brand came from, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BrandSource {
    Configured,
    Titles,
    ExactPhrase,
    WeakTitle,
    DomainToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedBrand {
    pub brand: String,
    pub source: BrandSource,
}

/// Search-backed brand inference for one domain.
pub struct BrandResolver<'a> {
    provider: &'a dyn SearchProvider,
    template: SearchQuery,
}

impl<'a> BrandResolver<'a> {
    /// `template` carries language, country and timeout; its query is replaced.
    pub fn new(provider: &'a dyn SearchProvider, template: SearchQuery) -> Self {
        Self { provider, template }
    }

    async fn first_page(&self, query: SearchQuery) -> Vec<SearchHit> {
        let q = SearchQuery {
            per_page: Some(10),
            ..self.template.clone().with_query(query)
        };
        match self.provider.search(&q).await {
            Ok(r) => r.hits,
            Err(e) => {
                tracing::warn!(query = %q.query, error = %e, "brand lookup search failed");
                Vec::new()
            }
        }
    }

    /// Titles of a `site:` search first; then an exact-phrase search for the
    /// domain token; then a weak title candidate; then the token itself.
    pub async fn resolve(&self, domain: &str) -> Option<ResolvedBrand> {
        let samples = self.first_page(SearchQuery::site(domain)).await;
        let res = resolve_from_titles(&samples);
        if let Some(b) = res.confident() {
            return Some(ResolvedBrand {
                brand: b.to_string(),
                source: BrandSource::Titles,
            });
        }

        let token = domain_token(domain);
        if !token.is_empty() {
            let hits = self.first_page(SearchQuery::exact_phrase(&token)).await;
            if let Some(b) = brand_from_exact_phrase_hits(domain, &hits) {
                return Some(ResolvedBrand {
                    brand: b,
                    source: BrandSource::ExactPhrase,
                });
            }
        }

        if let Some(c) = res.best {
            return Some(ResolvedBrand {
                brand: c.text,
                source: BrandSource::WeakTitle,
            });
        }
        (!token.is_empty()).then_some(ResolvedBrand {
            brand: token,
            source: BrandSource::DomainToken,
        })
    }
}

/// Outcome for one domain. `error` is set when the fetch failed; `hits` is
/// then empty.
#[derive(Debug, Clone, Serialize)]
pub struct DomainReport {
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<ResolvedBrand>,
    pub fetched: usize,
    pub hits: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DomainReport {
    fn empty(domain: String) -> Self {
        Self {
            domain,
            brand: None,
            fetched: 0,
            hits: Vec::new(),
            error: None,
        }
    }
}

struct Collected {
    brand: Option<ResolvedBrand>,
    fetched: usize,
    hits: Vec<ClassifiedHit>,
}

pub struct Pipeline {
    provider: Arc<dyn SearchProvider>,
    classifier: HybridClassifier,
    config: PipelineConfig,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("provider", &self.provider.name())
            .field("classifier", &self.classifier)
            .field("config", &self.config)
            .finish()
    }
}

impl Pipeline {
    pub fn new(provider: Arc<dyn SearchProvider>, classifier: HybridClassifier, config: PipelineConfig) -> Self {
        Self {
            provider,
            classifier,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn template(&self) -> SearchQuery {
        let mut q = SearchQuery::new("");
        q.language = Some(self.config.language.clone());
        q.country = Some(self.config.country.clone());
        q.timeout_ms = Some(self.config.search_timeout_ms);
        q
    }

    fn query(&self, base: SearchQuery) -> SearchQuery {
        self.template().with_query(base)
    }

    fn limits(&self) -> PageLimits {
        self.config.page_limits()
    }

    pub async fn evaluate_domain(&self, domain: &str) -> DomainReport {
        let mut reports = self.evaluate(&[domain.to_string()]).await;
        reports.pop().unwrap_or_else(|| DomainReport::empty(clean_domain(domain)))
    }

    /// Domains run in order; the combined output never repeats a URL.
    pub async fn evaluate(&self, domains: &[String]) -> Vec<DomainReport> {
        let mut reports = Vec::with_capacity(domains.len());
        let mut batches = Vec::with_capacity(domains.len());

        for raw in domains {
            let domain = clean_domain(raw);
            let mut report = DomainReport::empty(domain.clone());
            let mut hits = Vec::new();
            if domain.is_empty() {
                report.error = Some(format!("not a domain: {raw:?}"));
            } else {
                match self.collect(&domain).await {
                    Ok(c) => {
                        report.brand = c.brand;
                        report.fetched = c.fetched;
                        hits = c.hits;
                    }
                    Err(e) => {
                        tracing::warn!(domain = %domain, error = %e, "domain fetch failed");
                        report.error = Some(e.to_string());
                    }
                }
            }
            reports.push(report);
            batches.push(DomainHits { domain, hits });
        }

        let ranked = rank_domains(&batches, &self.config.rank_options());
        for (report, ranked) in reports.iter_mut().zip(ranked) {
            report.hits = ranked.hits.into_iter().map(|h| h.hit).collect();
        }
        reports
    }

    async fn collect(&self, domain: &str) -> Result<Collected> {
        let mut run = DomainRun::new(domain).with_pattern_threshold(self.config.pattern_threshold);
        let (brand, raw) = match self.config.mode {
            Mode::Site => {
                let raw = fetch_pages(self.provider.as_ref(), &self.query(SearchQuery::site(domain)), self.limits()).await?;
                (None, raw)
            }
            Mode::Brand => self.fetch_brand(domain).await?,
        };
        let fetched = raw.len();
        let hits = run.ingest(raw);

        let scorer = Scorer::for_profile(self.config.profile());
        let urls: Vec<String> = hits.iter().map(|h| h.url.clone()).collect();
        let decisions = if self.config.needs_external_classifier() {
            self.classifier.classify(&urls, Some(&run)).await
        } else {
            urls.iter().map(|u| classify_offline(u, Some(&run))).collect()
        };
        let mut classified: Vec<ClassifiedHit> = hits
            .iter()
            .zip(decisions)
            .map(|(h, d)| ClassifiedHit::new(scorer.score_hit(h), d.label))
            .collect();
        if self.config.mode == Mode::Brand {
            boost_target_domain(&mut classified, domain, TARGET_DOMAIN_BONUS);
        }

        let stats = run.stats();
        tracing::info!(
            domain,
            mode = %self.config.mode,
            fetched,
            accepted = stats.accepted,
            duplicate = stats.duplicate,
            malformed = stats.malformed,
            "collected domain"
        );
        Ok(Collected {
            brand,
            fetched,
            hits: classified,
        })
    }

    /// Brand search restricted to the domain, then the `site:` search, then
    /// board index pages implied by item URLs.
    async fn fetch_brand(&self, domain: &str) -> Result<(Option<ResolvedBrand>, Vec<SearchHit>)> {
        let brand = match &self.config.brand {
            Some(b) if !b.trim().is_empty() => Some(ResolvedBrand {
                brand: b.trim().to_string(),
                source: BrandSource::Configured,
            }),
            _ => {
                BrandResolver::new(self.provider.as_ref(), self.template())
                    .resolve(domain)
                    .await
            }
        };

        let mut raw: Vec<SearchHit> = Vec::new();
        if let Some(b) = &brand {
            tracing::info!(domain, brand = %b.brand, source = ?b.source, "resolved brand");
            match fetch_pages(self.provider.as_ref(), &self.query(SearchQuery::exact_phrase(&b.brand)), self.limits()).await {
                Ok(hits) => raw.extend(
                    hits.into_iter().filter(|h| is_on_domain(&h.url, domain)),
                ),
                Err(e) => tracing::warn!(domain, error = %e, "brand search failed"),
            }
        }

        match fetch_pages(self.provider.as_ref(), &self.query(SearchQuery::site(domain)), self.limits()).await {
            Ok(hits) => raw.extend(hits),
            Err(e) if raw.is_empty() => return Err(e),
            Err(e) => tracing::warn!(domain, error = %e, "site search failed; keeping brand hits"),
        }

        let hubs = category_hubs(domain, &raw);
        raw.extend(hubs);
        Ok((brand, raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitepick_core::{Error, SearchResponse};
    use std::collections::{BTreeMap, HashMap};

    /// Canned pages per query text; listed queries fail.
    #[derive(Default)]
    struct StaticSearch {
        pages: HashMap<String, Vec<Vec<SearchHit>>>,
        failing: Vec<String>,
    }

    impl StaticSearch {
        fn page(mut self, query: &str, hits: &[(&str, &str)]) -> Self {
            self.pages
                .entry(query.to_string())
                .or_default()
                .push(hits.iter().map(|(u, t)| SearchHit::new(*u, *t, "")).collect());
            self
        }

        fn fail(mut self, query: &str) -> Self {
            self.failing.push(query.to_string());
            self
        }
    }

    #[async_trait::async_trait]
    impl SearchProvider for StaticSearch {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
            if self.failing.contains(&q.query) {
                return Err(Error::Search(format!("stub failure for {}", q.query)));
            }
            let hits = self
                .pages
                .get(&q.query)
                .and_then(|p| p.get(q.page as usize - 1))
                .cloned()
                .unwrap_or_default();
            Ok(SearchResponse {
                hits,
                provider: "static".to_string(),
                cost_units: 0,
                timings_ms: BTreeMap::new(),
            })
        }
    }

    fn pipeline(search: StaticSearch, config: PipelineConfig) -> Pipeline {
        Pipeline::new(Arc::new(search), HybridClassifier::rules_only(), config)
    }

    fn urls(report: &DomainReport) -> Vec<&str> {
        report.hits.iter().map(|h| h.url.as_str()).collect()
    }

    #[tokio::test]
    async fn site_mode_keeps_listings_only() {
        let search = StaticSearch::default()
            .page(
                "site:d.example",
                &[
                    ("https://d.example/", ""),
                    ("https://d.example/mt/5733", ""),
                    ("https://d.example/bbs/board.php?bo_table=notice", ""),
                    ("https://d.example/bbs/board.php?bo_table=notice&wr_id=5", ""),
                ],
            )
            .page(
                "site:d.example",
                &[("https://d.example/free", ""), ("https://d.example/free?utm_source=x", "")],
            );
        let report = pipeline(search, PipelineConfig::default())
            .evaluate_domain("https://d.example/")
            .await;
        assert_eq!(report.domain, "d.example");
        assert!(report.error.is_none());
        assert_eq!(report.fetched, 6);
        let mut got = urls(&report);
        got.sort();
        assert_eq!(
            got,
            vec![
                "https://d.example/",
                "https://d.example/bbs/board.php?bo_table=notice",
                "https://d.example/free",
            ]
        );
    }

    #[tokio::test]
    async fn no_filter_keeps_posts_but_still_dedups() {
        let search = StaticSearch::default().page(
            "site:d.example",
            &[
                ("https://d.example/", ""),
                ("https://d.example/mt/5733", ""),
                ("https://d.example/#top", ""),
            ],
        );
        let cfg = PipelineConfig {
            filter: false,
            ..PipelineConfig::default()
        };
        let report = pipeline(search, cfg).evaluate_domain("d.example").await;
        assert_eq!(report.hits.len(), 2);
    }

    #[tokio::test]
    async fn failed_domain_does_not_abort_the_others() {
        let search = StaticSearch::default()
            .fail("site:bad.example")
            .page("site:good.example", &[("https://good.example/", "")]);
        let reports = pipeline(search, PipelineConfig::default())
            .evaluate(&["bad.example".to_string(), "good.example".to_string()])
            .await;
        assert_eq!(reports.len(), 2);
        assert!(reports[0].error.as_deref().is_some_and(|e| e.contains("stub failure")));
        assert!(reports[0].hits.is_empty());
        assert!(reports[1].error.is_none());
        assert_eq!(urls(&reports[1]), vec!["https://good.example/"]);
    }

    #[tokio::test]
    async fn combined_output_never_repeats_a_url() {
        let search = StaticSearch::default()
            .page("site:a.example", &[("https://a.example/", ""), ("https://shared.example/", "")])
            .page("site:b.example", &[("https://shared.example/", ""), ("https://b.example/", "")]);
        let reports = pipeline(search, PipelineConfig::default())
            .evaluate(&["a.example".to_string(), "b.example".to_string()])
            .await;
        assert_eq!(reports[0].hits.len(), 2);
        assert_eq!(urls(&reports[1]), vec!["https://b.example/"]);
    }

    #[tokio::test]
    async fn empty_domain_is_reported_not_fetched() {
        let reports = pipeline(StaticSearch::default(), PipelineConfig::default())
            .evaluate(&["   ".to_string()])
            .await;
        assert!(reports[0].error.is_some());
    }

    #[tokio::test]
    async fn brand_mode_searches_brand_on_target_and_derives_boards() {
        let search = StaticSearch::default()
            .page(
                "site:acme.example",
                &[
                    ("https://acme.example/", "Acme - Home"),
                    ("https://acme.example/board/12", "Acme | Some post"),
                ],
            )
            .page(
                "\"Acme\"",
                &[
                    ("https://acme.example/event", "Acme - Event"),
                    ("https://other.example/acme-review", "Acme review"),
                    ("https://notacme.example/", "Acme - lookalike"),
                    ("https://spam.example/?to=acme.example", "Acme - redirect"),
                ],
            );
        let cfg = PipelineConfig {
            mode: Mode::Brand,
            ..PipelineConfig::default()
        };
        let report = pipeline(search, cfg).evaluate_domain("acme.example").await;
        let brand = report.brand.clone().unwrap();
        assert_eq!(brand.brand, "Acme");
        assert_eq!(brand.source, BrandSource::Titles);

        let got = urls(&report);
        assert!(got.contains(&"https://acme.example/"));
        assert!(got.contains(&"https://acme.example/event"));
        assert!(got.contains(&"https://acme.example/board"));
        assert!(!got.contains(&"https://acme.example/board/12"));
        assert!(!got.iter().any(|u| u.contains("other.example")));
        assert!(!got.contains(&"https://notacme.example/"));
        assert!(!got.iter().any(|u| u.starts_with("https://spam.example/")));
        assert_eq!(got[0], "https://acme.example/");
    }

    #[tokio::test]
    async fn resolver_falls_back_to_exact_phrase_then_token() {
        let search = StaticSearch::default()
            .page("site:mtgal08.com", &[("https://mtgal08.com/a", "공지사항 - 이벤트")])
            .page(
                "\"mtgal\"",
                &[
                    ("https://elsewhere.example/?ref=mtgal08.com", "Other - x"),
                    ("https://xmtgal08.com/", "Lookalike - x"),
                    ("https://mtgal08.com/", "먹튀갤 - 메인"),
                ],
            );
        let r = BrandResolver::new(&search, SearchQuery::new(""))
            .resolve("mtgal08.com")
            .await
            .unwrap();
        assert_eq!(r.brand, "먹튀갤");
        assert_eq!(r.source, BrandSource::ExactPhrase);

        let bare = StaticSearch::default().fail("site:mtgal08.com");
        let r = BrandResolver::new(&bare, SearchQuery::new(""))
            .resolve("mtgal08.com")
            .await
            .unwrap();
        assert_eq!(r.brand, "mtgal");
        assert_eq!(r.source, BrandSource::DomainToken);
    }
}
