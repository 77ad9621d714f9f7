//! LISTING vs POST classification.
//!
//! Each URL walks the stages in order until one decides:
//!
//! 0. repeated shape in the current batch (needs a [`DomainRun`]) => POST
//! 1. deterministic POST rules
//! 2. deterministic LISTING rules
//! 3. batched external classification via [`BatchClassifier`]
//!
//! Stages 0–2 are pure. Stage 3 failures (error, timeout, short or garbled
//! reply) fall back to POST for the affected items and are never returned
//! to the caller, so [`HybridClassifier::classify`] is total.

use crate::params::{
    char_len, has_native_script, hyphen_count, is_all_digits, strip_file_extension, UrlParts, CATEGORY_KEY,
};
use crate::run::DomainRun;
use crate::{BatchClassifier, Label};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(30);

const MEMBER_MARKERS: &[&str] = &["login", "register", "password", "profile", "logout"];
const LISTING_SCRIPTS: &[&str] = &["tag.php", "page.php", "search.php"];

/// Tokens in a Stage 3 reply line that mean LISTING.
const LISTING_TOKENS: &[&str] = &["LISTING", "SEO"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    RepeatedShape,
    PostRule,
    ListingRule,
    External,
    /// Stage 3 was needed but unavailable or failed.
    Fallback,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::RepeatedShape => "repeated_shape",
            Stage::PostRule => "post_rule",
            Stage::ListingRule => "listing_rule",
            Stage::External => "external",
            Stage::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub label: Label,
    pub stage: Stage,
}

impl Decision {
    fn new(label: Label, stage: Stage) -> Self {
        Self { label, stage }
    }
}

/// Stage 1: does the URL obviously point at a single item?
pub fn is_obvious_post(parts: &UrlParts) -> bool {
    if parts.has_item_id() || parts.has_pagination() {
        return true;
    }
    let segs = parts.depth_segments();
    if segs.iter().skip(1).any(|s| is_all_digits(s)) {
        return true;
    }
    if segs.iter().any(|s| is_all_digits(s) && s.len() >= 2) {
        return true;
    }
    if let Some(last) = parts.segments.last().map(|s| strip_file_extension(s)) {
        let hyphens = hyphen_count(last);
        if hyphens >= 3 && char_len(last) > 20 {
            return true;
        }
        if hyphens >= 2 && has_native_script(last) {
            return true;
        }
    }
    false
}

/// Stage 2: does the URL obviously point at a listing / navigation page?
pub fn is_obvious_listing(parts: &UrlParts) -> bool {
    if parts.query.is_empty() && parts.is_root() {
        return true;
    }
    if parts.sorted_keys() == [CATEGORY_KEY] {
        return true;
    }
    let segs = parts.depth_segments();
    if let [only] = segs.as_slice() {
        if !is_all_digits(only) && char_len(only) <= 15 {
            return true;
        }
    }
    let path = parts.path_lower();
    if MEMBER_MARKERS.iter().any(|m| path.contains(m)) {
        return true;
    }
    parts
        .segments
        .last()
        .is_some_and(|last| LISTING_SCRIPTS.contains(&last.to_lowercase().as_str()))
}

/// Stages 0–2. `None` means the URL needs external classification.
pub fn classify_rules(url: &str, run: Option<&DomainRun>) -> Option<Decision> {
    let Some(parts) = UrlParts::parse(url) else {
        return Some(Decision::new(Label::Post, Stage::PostRule));
    };
    if run.is_some_and(|r| r.is_repeated_shape(url)) {
        return Some(Decision::new(Label::Post, Stage::RepeatedShape));
    }
    if is_obvious_post(&parts) {
        return Some(Decision::new(Label::Post, Stage::PostRule));
    }
    if is_obvious_listing(&parts) {
        return Some(Decision::new(Label::Listing, Stage::ListingRule));
    }
    None
}

/// Rules only; anything undecided becomes POST.
pub fn classify_offline(url: &str, run: Option<&DomainRun>) -> Decision {
    classify_rules(url, run).unwrap_or(Decision::new(Label::Post, Stage::Fallback))
}

/// Prompt for one Stage 3 batch: curated examples, then a numbered list.
pub fn build_prompt(urls: &[String]) -> String {
    let mut prompt = String::from(
        "Classify each URL as LISTING (home, menu, category or board index page) \
or POST (a single article or forum post).\n\
\n\
LISTING examples (keep only pages like these):\n\
- / (home)\n\
- /free /notice /event /review (categories)\n\
- /자유게시판/ /공지사항/ /먹튀제보/ (native-script categories)\n\
- /bbs/board.php?bo_table=notice (board index)\n\
- /login/ /register/ /profile/ (member pages)\n\
\n\
POST examples (filter these out):\n\
- /mt/5733 /event/219 (ends with a number)\n\
- /먹튀-사이트-유형별-특징/ (long title slug, many hyphens)\n\
- /bsite/body-바디-먹튀-검증/ (article title)\n\
- ?wr_id=123 (item id)\n\
\n\
Important: when in doubt answer POST. Only answer LISTING for certain category pages.\n\
\n\
URLs:\n",
    );
    for (i, url) in urls.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, url));
    }
    prompt.push_str("\nAnswer one line per number with LISTING or POST only:");
    prompt
}

/// Parse a Stage 3 reply for `n` items. Items without a matching line are POST.
pub fn parse_reply(n: usize, reply: &str) -> Vec<Label> {
    let lines: Vec<&str> = reply.lines().map(str::trim).collect();
    (1..=n)
        .map(|i| {
            let dot = format!("{i}.");
            let space = format!("{i} ");
            let line = lines
                .iter()
                .find(|l| l.starts_with(&dot) || l.starts_with(&space));
            match line {
                Some(l) => {
                    let upper = l.to_uppercase();
                    if LISTING_TOKENS.iter().any(|t| upper.contains(t)) {
                        Label::Listing
                    } else {
                        Label::Post
                    }
                }
                None => Label::Post,
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct HybridClassifier {
    external: Option<Arc<dyn BatchClassifier>>,
    batch_size: usize,
    timeout: Duration,
}

impl Default for HybridClassifier {
    fn default() -> Self {
        Self::rules_only()
    }
}

impl std::fmt::Debug for HybridClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridClassifier")
            .field("external", &self.external.is_some())
            .field("batch_size", &self.batch_size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HybridClassifier {
    pub fn new(external: Arc<dyn BatchClassifier>) -> Self {
        Self {
            external: Some(external),
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: DEFAULT_BATCH_TIMEOUT,
        }
    }

    /// No Stage 3: undecided URLs become POST.
    pub fn rules_only() -> Self {
        Self {
            external: None,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: DEFAULT_BATCH_TIMEOUT,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// One decision per input URL, in input order.
    pub async fn classify(&self, urls: &[String], run: Option<&DomainRun>) -> Vec<Decision> {
        let mut decisions: Vec<Option<Decision>> = urls.iter().map(|u| classify_rules(u, run)).collect();
        let pending: Vec<usize> = decisions
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_none())
            .map(|(i, _)| i)
            .collect();

        tracing::debug!(
            total = urls.len(),
            pending = pending.len(),
            external = self.external.is_some(),
            "rule stages finished"
        );

        for chunk in pending.chunks(self.batch_size) {
            let batch: Vec<String> = chunk.iter().map(|&i| urls[i].clone()).collect();
            let labels = self.classify_batch(&batch).await;
            for (&i, decision) in chunk.iter().zip(labels) {
                decisions[i] = Some(decision);
            }
        }

        decisions
            .into_iter()
            .map(|d| d.unwrap_or(Decision::new(Label::Post, Stage::Fallback)))
            .collect()
    }

    async fn classify_batch(&self, batch: &[String]) -> Vec<Decision> {
        let fallback = || vec![Decision::new(Label::Post, Stage::Fallback); batch.len()];
        let Some(external) = &self.external else {
            return fallback();
        };
        match tokio::time::timeout(self.timeout, external.classify_batch(batch)).await {
            Ok(Ok(labels)) => {
                if labels.len() != batch.len() {
                    tracing::warn!(
                        expected = batch.len(),
                        got = labels.len(),
                        "external classifier returned a short batch; missing items default to POST"
                    );
                }
                (0..batch.len())
                    .map(|i| match labels.get(i) {
                        Some(&label) => Decision::new(label, Stage::External),
                        None => Decision::new(Label::Post, Stage::Fallback),
                    })
                    .collect()
            }
            Ok(Err(e)) => {
                tracing::warn!(batch = batch.len(), error = %e, "external classification failed; batch defaults to POST");
                fallback()
            }
            Err(_) => {
                tracing::warn!(
                    batch = batch.len(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "external classification timed out; batch defaults to POST"
                );
                fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Result, SearchHit};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn parts(url: &str) -> UrlParts {
        UrlParts::parse(url).unwrap()
    }

    fn strings(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|s| s.to_string()).collect()
    }

    struct AlwaysListing {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl BatchClassifier for AlwaysListing {
        async fn classify_batch(&self, urls: &[String]) -> Result<Vec<Label>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Label::Listing; urls.len()])
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl BatchClassifier for Failing {
        async fn classify_batch(&self, _urls: &[String]) -> Result<Vec<Label>> {
            Err(Error::Llm("HTTP 500".to_string()))
        }
    }

    struct Short;

    #[async_trait::async_trait]
    impl BatchClassifier for Short {
        async fn classify_batch(&self, _urls: &[String]) -> Result<Vec<Label>> {
            Ok(vec![Label::Listing])
        }
    }

    struct Slow;

    #[async_trait::async_trait]
    impl BatchClassifier for Slow {
        async fn classify_batch(&self, urls: &[String]) -> Result<Vec<Label>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![Label::Listing; urls.len()])
        }
    }

    fn unresolved(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://d.example/guide/topic{i}x")).collect()
    }

    #[test]
    fn post_rules() {
        assert!(is_obvious_post(&parts("https://d.example/bbs/board.php?bo_table=free&wr_id=3")));
        assert!(is_obvious_post(&parts("https://d.example/mt/5733")));
        assert!(is_obvious_post(&parts("https://d.example/42")));
        assert!(is_obvious_post(&parts("https://d.example/notice?page=11")));
        assert!(is_obvious_post(&parts("https://d.example/a/how-to-pick-a-safe-site-fast")));
        assert!(is_obvious_post(&parts("https://d.example/bsite/바디-먹튀-검증")));
        assert!(is_obvious_post(&parts("https://d.example/news/how-to-pick-a-safe-site-fast.html")));
        assert!(is_obvious_post(&parts("https://d.example/bsite/바디-먹튀-검증.php")));
        assert!(!is_obvious_post(&parts("https://d.example/5")));
        assert!(!is_obvious_post(&parts("https://d.example/free")));
        assert!(!is_obvious_post(&parts("https://d.example/bbs/board.php?bo_table=notice")));
    }

    #[test]
    fn listing_rules() {
        assert!(is_obvious_listing(&parts("https://d.example/")));
        assert!(is_obvious_listing(&parts("https://d.example/bbs/board.php?bo_table=notice")));
        assert!(is_obvious_listing(&parts("https://d.example/free/")));
        assert!(is_obvious_listing(&parts("https://d.example/%EC%9E%90%EC%9C%A0%EA%B2%8C%EC%8B%9C%ED%8C%90")));
        assert!(is_obvious_listing(&parts("https://d.example/bbs/login.php?url=%2F")));
        assert!(is_obvious_listing(&parts("https://d.example/bbs/tag.php")));
        assert!(!is_obvious_listing(&parts("https://d.example/?x=1")));
        assert!(!is_obvious_listing(&parts("https://d.example/5")));
        assert!(!is_obvious_listing(&parts("https://d.example/a/b")));
        assert!(!is_obvious_listing(&parts("https://d.example/averyveryverylongsegment")));
        assert!(!is_obvious_listing(&parts("https://d.example/x/y?bo_table=a&x=1")));
    }

    #[tokio::test]
    async fn end_to_end_labels() {
        let urls = strings(&[
            "https://d.example/",
            "https://d.example/mt/5733",
            "https://d.example/bbs/board.php?bo_table=notice",
            "https://d.example/bbs/board.php?bo_table=notice&wr_id=5",
        ]);
        let mut run = DomainRun::new("d.example");
        run.ingest(urls.iter().map(|u| SearchHit::new(u.as_str(), "", "")).collect());
        let labels: Vec<Label> = HybridClassifier::rules_only()
            .classify(&urls, Some(&run))
            .await
            .into_iter()
            .map(|d| d.label)
            .collect();
        assert_eq!(labels, vec![Label::Listing, Label::Post, Label::Listing, Label::Post]);
    }

    #[tokio::test]
    async fn repeated_shapes_are_posts() {
        let urls: Vec<String> = [11, 27, 305, 4, 59]
            .iter()
            .map(|n| format!("https://d.example/category/{n}"))
            .collect();
        let mut run = DomainRun::new("d.example");
        run.ingest(urls.iter().map(|u| SearchHit::new(u.as_str(), "", "")).collect());
        let decisions = HybridClassifier::new(Arc::new(AlwaysListing {
            calls: AtomicUsize::new(0),
        }))
        .classify(&urls, Some(&run))
        .await;
        assert_eq!(decisions.len(), 5);
        for d in decisions {
            assert_eq!(d, Decision::new(Label::Post, Stage::RepeatedShape));
        }
    }

    #[tokio::test]
    async fn repeated_shape_overrides_listing_rules() {
        let urls = strings(&[
            "https://d.example/bbs/board.php?bo_table=a",
            "https://d.example/bbs/board.php?bo_table=b",
            "https://d.example/bbs/board.php?bo_table=c",
        ]);
        let mut run = DomainRun::new("d.example");
        run.ingest(urls.iter().map(|u| SearchHit::new(u.as_str(), "", "")).collect());
        let decisions = HybridClassifier::rules_only().classify(&urls, Some(&run)).await;
        assert!(decisions.iter().all(|d| d.label == Label::Post));

        let run = run.with_pattern_threshold(None);
        let decisions = HybridClassifier::rules_only().classify(&urls, Some(&run)).await;
        assert!(decisions.iter().all(|d| d.label == Label::Listing));
    }

    #[tokio::test]
    async fn failed_batch_defaults_to_post() {
        let urls = unresolved(7);
        assert!(urls.iter().all(|u| classify_rules(u, None).is_none()));
        let decisions = HybridClassifier::new(Arc::new(Failing)).classify(&urls, None).await;
        assert_eq!(decisions.len(), 7);
        assert!(decisions
            .iter()
            .all(|d| *d == Decision::new(Label::Post, Stage::Fallback)));
    }

    #[tokio::test]
    async fn external_is_called_once_per_batch() {
        let stub = Arc::new(AlwaysListing {
            calls: AtomicUsize::new(0),
        });
        let mut urls = unresolved(45);
        urls.push("https://d.example/mt/1234".to_string());
        let decisions = HybridClassifier::new(stub.clone())
            .with_batch_size(20)
            .classify(&urls, None)
            .await;
        assert_eq!(stub.calls.load(Ordering::SeqCst), 3);
        assert_eq!(decisions[0], Decision::new(Label::Listing, Stage::External));
        assert_eq!(decisions[45], Decision::new(Label::Post, Stage::PostRule));
    }

    #[tokio::test]
    async fn short_reply_pads_with_post() {
        let urls = unresolved(3);
        let labels: Vec<Label> = HybridClassifier::new(Arc::new(Short))
            .classify(&urls, None)
            .await
            .into_iter()
            .map(|d| d.label)
            .collect();
        assert_eq!(labels, vec![Label::Listing, Label::Post, Label::Post]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_batch_times_out_to_post() {
        let urls = unresolved(2);
        let decisions = HybridClassifier::new(Arc::new(Slow))
            .with_timeout(Duration::from_millis(100))
            .classify(&urls, None)
            .await;
        assert!(decisions.iter().all(|d| d.label == Label::Post));
    }

    #[test]
    fn prompt_numbers_urls_from_one() {
        let p = build_prompt(&strings(&["https://a.example/x", "https://a.example/y"]));
        assert!(p.contains("1. https://a.example/x\n"));
        assert!(p.contains("2. https://a.example/y\n"));
        assert!(p.contains("LISTING"));
    }

    #[test]
    fn reply_parsing() {
        let reply = "Here you go:\n1. LISTING\n 2 post\n3. listing - category\n10. LISTING\n4) LISTING";
        let labels = parse_reply(5, reply);
        assert_eq!(
            labels,
            vec![Label::Listing, Label::Post, Label::Listing, Label::Post, Label::Post]
        );
        assert_eq!(parse_reply(2, "1. SEO\n2. POST"), vec![Label::Listing, Label::Post]);
        assert_eq!(parse_reply(2, ""), vec![Label::Post, Label::Post]);
    }

    proptest! {
        #[test]
        fn offline_classification_is_total(url in any::<String>()) {
            let d = classify_offline(&url, None);
            prop_assert!(matches!(d.label, Label::Listing | Label::Post));
        }

        #[test]
        fn reply_parsing_always_yields_n_labels(n in 0usize..40, reply in any::<String>()) {
            prop_assert_eq!(parse_reply(n, &reply).len(), n);
        }
    }
}
