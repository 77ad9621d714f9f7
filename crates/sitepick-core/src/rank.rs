//! Filter, dedup, cap, sort and truncate classified hits.
//!
//! Order of operations is fixed: label/score filter, exact-key dedup,
//! per-domain cap (in input order), stable sort by score descending,
//! optional one-per-shape compaction, `top_n` truncation.

use crate::shape::{normalize_exact, normalize_shape};
use crate::{is_on_domain, ClassifiedHit, SearchHit};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Bonus for brand-search hits that live on the domain being evaluated.
pub const TARGET_DOMAIN_BONUS: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum RankFilter {
    /// Keep LISTING hits only.
    Listing,
    /// Score-only mode: keep hits scoring at least this much.
    MinScore(i64),
    /// Keep everything (dedup and caps still apply).
    Any,
}

impl RankFilter {
    fn keeps(self, hit: &ClassifiedHit) -> bool {
        match self {
            RankFilter::Listing => hit.label == crate::Label::Listing,
            RankFilter::MinScore(min) => hit.score >= min,
            RankFilter::Any => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankOptions {
    pub filter: RankFilter,
    pub domain_cap: Option<usize>,
    pub top_n: Option<usize>,
    /// Keep only the best-scoring hit per structural signature.
    pub compact_shapes: bool,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            filter: RankFilter::Listing,
            domain_cap: Some(100),
            top_n: None,
            compact_shapes: false,
        }
    }
}

/// Rank one domain's hits and strip annotations for hand-off.
pub fn rank(
    hits: &[ClassifiedHit],
    filter: RankFilter,
    domain_cap: Option<usize>,
    top_n: Option<usize>,
) -> Vec<SearchHit> {
    let opts = RankOptions {
        filter,
        domain_cap,
        top_n,
        compact_shapes: false,
    };
    rank_with(hits, &opts).into_iter().map(|h| h.hit).collect()
}

/// Same as [`rank`] but keeps score and label on each hit.
pub fn rank_with(hits: &[ClassifiedHit], opts: &RankOptions) -> Vec<ClassifiedHit> {
    rank_excluding(hits, opts, &HashSet::new())
}

/// Ranks one batch, skipping exact keys in `emitted`. The caller decides
/// which of the returned hits count as emitted.
fn rank_excluding(hits: &[ClassifiedHit], opts: &RankOptions, emitted: &HashSet<String>) -> Vec<ClassifiedHit> {
    let mut seen = HashSet::new();
    let mut kept: Vec<ClassifiedHit> = Vec::new();
    for h in hits {
        if opts.domain_cap.is_some_and(|cap| kept.len() >= cap) {
            break;
        }
        if !opts.filter.keeps(h) {
            continue;
        }
        let key = normalize_exact(&h.hit.url);
        if emitted.contains(&key) || !seen.insert(key) {
            continue;
        }
        kept.push(h.clone());
    }

    kept.sort_by(|a, b| b.score.cmp(&a.score));

    if opts.compact_shapes {
        let mut shapes = HashSet::new();
        kept.retain(|h| shapes.insert(normalize_shape(&h.hit.url)));
    }
    if let Some(n) = opts.top_n {
        kept.truncate(n);
    }
    kept
}

/// Hits collected for one domain query.
#[derive(Debug, Clone)]
pub struct DomainHits {
    pub domain: String,
    pub hits: Vec<ClassifiedHit>,
}

/// Rank several domains with independent caps. A URL reachable from two
/// domain queries is emitted only for the first domain whose final output
/// contains it; hits a domain drops by compaction or `top_n` stay available
/// to later domains.
pub fn rank_domains(batches: &[DomainHits], opts: &RankOptions) -> Vec<DomainHits> {
    let mut emitted = HashSet::new();
    batches
        .iter()
        .map(|b| {
            let ranked = rank_excluding(&b.hits, opts, &emitted);
            emitted.extend(ranked.iter().map(|h| normalize_exact(&h.hit.url)));
            tracing::info!(domain = %b.domain, input = b.hits.len(), kept = ranked.len(), "ranked domain");
            DomainHits {
                domain: b.domain.clone(),
                hits: ranked,
            }
        })
        .collect()
}

/// Add `bonus` to every hit whose host is `domain` or one of its subdomains.
pub fn boost_target_domain(hits: &mut [ClassifiedHit], domain: &str, bonus: i64) {
    for h in hits.iter_mut().filter(|h| is_on_domain(&h.hit.url, domain)) {
        h.score += bonus;
    }
}
