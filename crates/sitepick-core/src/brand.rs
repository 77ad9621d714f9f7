//! Brand token inference from search-result titles.
//!
//! Everything here is pure. The secondary exact-phrase search lives with the
//! search providers; this module only mines the hits it returns.

use crate::{clean_domain, is_on_domain, SearchHit};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Candidates below this weight (after the short-name multiplier) trigger
/// the fallback chain.
pub const MIN_BRAND_WEIGHT: f64 = 2.0;

/// Title separators, tried in order; the first one present wins.
pub const TITLE_SEPARATORS: &[&str] = &[" - ", " | ", " : ", ": ", ":"];

/// Paths (trailing slash trimmed) whose titles usually carry the site name.
pub const ROOT_LIKE_PATHS: &[&str] = &["", "/show", "/index.php", "/main", "/home"];

const ROOT_WEIGHT: u32 = 3;
const SHORT_NAME_MULTIPLIER: f64 = 1.5;
const MAX_CANDIDATE_CHARS: usize = 15;

pub const GENERIC_WORDS: &[&str] = &[
    "먹튀검증",
    "먹튀신고",
    "토토사이트",
    "안전놀이터",
    "카지노",
    "먹튀",
    "토토",
    "검증",
    "사이트",
];

pub const BAD_BRANDS: &[&str] = &[
    "충전방법",
    "이벤트",
    "공지사항",
    "로그인",
    "회원가입",
    "게시판",
    "분석픽",
    "스포츠",
    "라이온",
    "자유게시판",
    "먹튀사이트",
    "신고",
    "제보",
    "안내",
    "소개",
];

const PARTICLE_ENDINGS: &[char] = &['는', '은', '가', '을', '를', '의'];
const LOANWORD_ENDINGS: &[&str] = &["데이", "토이", "키", "비"];

static LATIN_HYPHEN_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]+-\d+").expect("valid regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct BrandCandidate {
    pub text: String,
    pub weight: f64,
}

/// Outcome of title mining.
#[derive(Debug, Clone, PartialEq)]
pub struct BrandResolution {
    /// Best accepted candidate, if any, with the multiplier applied.
    pub best: Option<BrandCandidate>,
}

impl BrandResolution {
    /// True when callers should try the exact-phrase search or domain token.
    pub fn needs_fallback(&self) -> bool {
        match &self.best {
            Some(c) => c.weight < MIN_BRAND_WEIGHT,
            None => true,
        }
    }

    pub fn confident(&self) -> Option<&str> {
        if self.needs_fallback() {
            return None;
        }
        self.best.as_ref().map(|c| c.text.as_str())
    }
}

fn is_outer_noise(c: char) -> bool {
    c.is_whitespace() || "-|:【】[]()（）「」『』".contains(c)
}

fn is_inner_noise(c: char) -> bool {
    c.is_whitespace() || "-|:【】[]".contains(c)
}

/// Trim decoration, reject elided titles and cut long ones to their first
/// word.
pub fn clean_brand_candidate(text: &str) -> Option<String> {
    let t = text.trim_matches(is_outer_noise);
    if t.contains("...") {
        return None;
    }
    let t = if t.chars().count() > MAX_CANDIDATE_CHARS {
        t.split_whitespace().next().unwrap_or(t)
    } else {
        t
    };
    let t = t.trim_matches(is_inner_noise);
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Split a title into brand-candidate parts.
pub fn split_title(title: &str) -> Vec<&str> {
    let head = match title.split_once(" > ") {
        Some((left, _)) => left.trim(),
        None => title,
    };
    for sep in TITLE_SEPARATORS {
        if head.contains(sep) {
            return head.split(sep).map(str::trim).collect();
        }
    }
    vec![head]
}

pub fn is_generic(text: &str) -> bool {
    GENERIC_WORDS.contains(&text) || BAD_BRANDS.contains(&text)
}

/// Acceptance filter: a short, single-word, non-generic name that does not
/// look like a sentence fragment or a headline.
pub fn is_likely_brand(text: &str) -> bool {
    let len = text.chars().count();
    if !(2..=10).contains(&len) || text.contains(' ') {
        return false;
    }
    let ends_in_particle = text.ends_with(PARTICLE_ENDINGS);
    if ends_in_particle && !LOANWORD_ENDINGS.iter().any(|s| text.ends_with(s)) {
        return false;
    }
    if LATIN_HYPHEN_NUMBER.is_match(text) {
        return false;
    }
    if text.chars().next().is_some_and(|c| c.is_numeric()) {
        return false;
    }
    !is_generic(text)
}

fn is_root_like(url: &str) -> bool {
    let Ok(u) = url::Url::parse(url) else {
        return false;
    };
    let path = u.path().trim_end_matches('/');
    ROOT_LIKE_PATHS.contains(&path)
}

/// Vote for every cleaned title part of length 2..=10. Order of first
/// appearance is kept so ties resolve to the earliest candidate.
pub fn collect_candidates(samples: &[SearchHit]) -> Vec<BrandCandidate> {
    let mut out: Vec<BrandCandidate> = Vec::new();
    for hit in samples {
        let weight = if is_root_like(&hit.url) { ROOT_WEIGHT } else { 1 };
        for part in split_title(&hit.title) {
            let Some(brand) = clean_brand_candidate(part) else {
                continue;
            };
            if !(2..=10).contains(&brand.chars().count()) {
                continue;
            }
            match out.iter_mut().find(|c| c.text == brand) {
                Some(c) => c.weight += f64::from(weight),
                None => out.push(BrandCandidate {
                    text: brand,
                    weight: f64::from(weight),
                }),
            }
        }
    }
    out
}

/// Highest-weight accepted candidate; short names get a 1.5x boost.
pub fn select_brand(candidates: &[BrandCandidate]) -> Option<BrandCandidate> {
    let mut best: Option<BrandCandidate> = None;
    for c in candidates {
        if !is_likely_brand(&c.text) {
            continue;
        }
        let len = c.text.chars().count();
        let weight = if (2..=6).contains(&len) {
            c.weight * SHORT_NAME_MULTIPLIER
        } else {
            c.weight
        };
        if best.as_ref().map_or(weight > 0.0, |b| weight > b.weight) {
            best = Some(BrandCandidate {
                text: c.text.clone(),
                weight,
            });
        }
    }
    best
}

pub fn resolve_from_titles(samples: &[SearchHit]) -> BrandResolution {
    BrandResolution {
        best: select_brand(&collect_candidates(samples)),
    }
}

/// Brand for `domain` from site-restricted sample titles.
///
/// Falls back to the domain token when no confident candidate exists, and to
/// a weak candidate when the token is empty.
pub fn resolve_brand(domain: &str, samples: &[SearchHit]) -> Option<String> {
    let res = resolve_from_titles(samples);
    if let Some(b) = res.confident() {
        return Some(b.to_string());
    }
    let token = domain_token(domain);
    if !token.is_empty() {
        return Some(token);
    }
    res.best.map(|c| c.text)
}

/// `https://www.mtgal08.com/x` -> `mtgal`.
pub fn domain_token(domain: &str) -> String {
    let host = clean_domain(domain);
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let label = host.split('.').next().unwrap_or("");
    label.trim_end_matches(|c: char| c.is_ascii_digit()).to_string()
}

/// Mine an exact-phrase search for a title on the target domain.
///
/// Only ` - ` and ` | ` splits are trusted here; the first usable hit wins.
pub fn brand_from_exact_phrase_hits(domain: &str, hits: &[SearchHit]) -> Option<String> {
    for hit in hits.iter().filter(|h| is_on_domain(&h.url, domain)) {
        let head = if let Some((left, _)) = hit.title.split_once(" - ") {
            left
        } else if let Some((left, _)) = hit.title.split_once(" | ") {
            left
        } else {
            continue;
        };
        if let Some(brand) = clean_brand_candidate(head.trim()) {
            if (2..=10).contains(&brand.chars().count()) {
                return Some(brand);
            }
        }
    }
    None
}

/// Board index pages implied by item URLs: `/{seg}/{digits}` yields
/// `https://{domain}/{seg}`, once per board, skipping URLs already known.
pub fn category_hubs(domain: &str, hits: &[SearchHit]) -> Vec<SearchHit> {
    let host = clean_domain(domain);
    let known: HashSet<&str> = hits.iter().map(|h| h.url.as_str()).collect();
    let mut boards = HashSet::new();
    let mut out = Vec::new();
    for hit in hits {
        let Ok(u) = url::Url::parse(&hit.url) else {
            continue;
        };
        let segs: Vec<&str> = u.path().split('/').filter(|s| !s.is_empty()).collect();
        if segs.len() < 2 {
            continue;
        }
        let last = segs[segs.len() - 1];
        if !last.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let board = segs[0];
        if !boards.insert(board.to_string()) {
            continue;
        }
        let url = format!("https://{host}/{board}");
        if known.contains(url.as_str()) {
            continue;
        }
        out.push(SearchHit::new(url, format!("{board} 게시판"), ""));
    }
    out
}
