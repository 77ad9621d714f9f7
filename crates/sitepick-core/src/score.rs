//! Heuristic importance score for a search hit.
//!
//! One engine, two presets. `general` ranks listing pages for site-wide
//! collection; `brand` ranks results of a brand-name search and is much
//! harsher on slugs and deep paths. They disagree on edge cases on purpose,
//! so callers pick a [`Profile`] per use case.
//!
//! Rules are additive and evaluated in a fixed order; there is no clamping.

use crate::params::{
    char_len, has_file_extension, has_native_script, hyphen_count, is_all_digits, UrlParts,
    PAGINATION_KEYS,
};
use crate::{Error, ScoredHit, SearchHit};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    General,
    Brand,
}

impl Profile {
    pub fn as_str(self) -> &'static str {
        match self {
            Profile::General => "general",
            Profile::Brand => "brand",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" | "seo" => Ok(Profile::General),
            "brand" => Ok(Profile::Brand),
            other => Err(Error::Config(format!(
                "unknown scoring profile: {other} (allowed: general, brand)"
            ))),
        }
    }
}

/// Points for how deep a page sits in the site.
#[derive(Debug, Clone, Copy)]
pub enum DepthRule {
    /// Bonus for root/index pages and single-level paths; penalty for a
    /// numeric leaf at depth >= 2.
    Flat {
        root: i64,
        category: i64,
        numeric_leaf: i64,
    },
    /// Fixed points per depth bucket, plus a penalty for any numeric leaf.
    Curve {
        root: i64,
        one: i64,
        two: i64,
        deeper: i64,
        numeric_leaf: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordScope {
    /// `title + snippet`, or the path.
    TextOrPath,
    /// `path + title` as one haystack.
    PathAndTitle,
}

/// Ordered `(keyword, weight)` pairs; every distinct keyword that matches
/// contributes once.
#[derive(Debug, Clone, Copy)]
pub struct KeywordTable {
    pub entries: &'static [(&'static str, i64)],
    pub scope: KeywordScope,
}

/// A family of query keys penalized once if any key is present.
#[derive(Debug, Clone, Copy)]
pub struct KeyPenalty {
    pub keys: &'static [&'static str],
    pub points: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct QuerySignals {
    /// Category selector present without an item-id key.
    pub category_listing: i64,
    /// First substring match against the category value only.
    pub category_bonuses: &'static [(&'static str, i64)],
    pub low_value_categories: &'static [&'static str],
    pub low_value_penalty: i64,
    pub item_id_penalty: i64,
    pub key_penalties: &'static [KeyPenalty],
}

#[derive(Debug, Clone, Copy)]
pub struct SlugPenalty {
    /// `>= 2` hyphens with native-script letters, or `>= 3` hyphens.
    pub hyphenated: i64,
    /// Segment longer than 20 characters.
    pub long_segment: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct PathPenalties {
    pub system_markers: &'static [&'static str],
    pub system_penalty: i64,
    pub slug: Option<SlugPenalty>,
    /// Regex-driven content patterns (currency amounts, scam-report slugs).
    pub patterns: &'static [(&'static Lazy<Regex>, i64)],
}

#[derive(Debug, Clone, Copy)]
pub struct Scorer {
    pub profile: Profile,
    pub depth: DepthRule,
    pub query: QuerySignals,
    pub keywords: KeywordTable,
    pub path: PathPenalties,
}

const GENERAL_KEYWORDS: &[(&str, i64)] = &[
    ("메인", 20),
    ("홈", 15),
    ("소개", 15),
    ("안내", 15),
    ("main", 20),
    ("home", 15),
    ("about", 15),
    ("intro", 15),
    ("먹튀검증", 25),
    ("먹튀제보", 25),
    ("먹튀신고", 25),
    ("토토사이트", 20),
    ("카지노사이트", 20),
    ("안전놀이터", 20),
    ("보증업체", 20),
    ("검증업체", 20),
    ("추천업체", 20),
    ("verification", 25),
    ("report", 20),
    ("review", 15),
    ("notice", 15),
    ("event", 10),
    ("faq", 10),
];

const HIGH_VALUE_CATEGORIES: &[(&str, i64)] = &[
    ("verification", 25),
    ("mt_site", 25),
    ("report", 20),
    ("notice", 15),
    ("event", 10),
    ("info", 10),
    ("review", 15),
    ("qa", 10),
];

const LOW_VALUE_CATEGORIES: &[&str] = &["chulsuk", "attendance", "출석", "coupon", "쿠폰"];

const GENERAL_SYSTEM_MARKERS: &[&str] = &[
    "login",
    "logout",
    "register",
    "password",
    "member",
    "captcha",
    "current_connect",
    "new.php",
    "qalist",
    "profile",
    "memo",
    "point",
    "scrap",
    "formmail",
    "qrcode",
];

const GENERAL_KEY_PENALTIES: &[KeyPenalty] = &[KeyPenalty {
    keys: PAGINATION_KEYS,
    points: -80,
}];

const BRAND_KEYWORDS: &[(&str, i64)] = &[
    ("링크모음", 15),
    ("자유게시판", 15),
    ("후기게시판", 15),
    ("이벤트게시판", 15),
    ("login", 15),
    ("main", 15),
    ("show", 15),
    ("link", 15),
];

const BRAND_SYSTEM_MARKERS: &[&str] = &["register", "password", "logout", "captcha", "qalist"];

const BRAND_FILTER_KEYS: &[&str] = &["sca", "sfl", "stx", "sop", "sst", "sod", "spt"];

const BRAND_KEY_PENALTIES: &[KeyPenalty] = &[
    KeyPenalty {
        keys: &["page"],
        points: -50,
    },
    KeyPenalty {
        keys: BRAND_FILTER_KEYS,
        points: -60,
    },
];

static CURRENCY_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(만원|천원)").expect("valid regex"));
static SCAM_REPORT_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)-먹튀-.*com").expect("valid regex"));

static BRAND_PATTERNS: &[(&Lazy<Regex>, i64)] = &[(&CURRENCY_AMOUNT, -100), (&SCAM_REPORT_SLUG, -100)];

impl Scorer {
    pub fn general() -> Self {
        Self {
            profile: Profile::General,
            depth: DepthRule::Flat {
                root: 30,
                category: 20,
                numeric_leaf: -10,
            },
            query: QuerySignals {
                category_listing: 25,
                category_bonuses: HIGH_VALUE_CATEGORIES,
                low_value_categories: LOW_VALUE_CATEGORIES,
                low_value_penalty: -80,
                item_id_penalty: -10,
                key_penalties: GENERAL_KEY_PENALTIES,
            },
            keywords: KeywordTable {
                entries: GENERAL_KEYWORDS,
                scope: KeywordScope::TextOrPath,
            },
            path: PathPenalties {
                system_markers: GENERAL_SYSTEM_MARKERS,
                system_penalty: -50,
                slug: None,
                patterns: &[],
            },
        }
    }

    pub fn brand() -> Self {
        Self {
            profile: Profile::Brand,
            depth: DepthRule::Curve {
                root: 100,
                one: 80,
                two: 60,
                deeper: 10,
                numeric_leaf: -50,
            },
            query: QuerySignals {
                category_listing: 0,
                category_bonuses: &[],
                low_value_categories: &[],
                low_value_penalty: 0,
                item_id_penalty: -80,
                key_penalties: BRAND_KEY_PENALTIES,
            },
            keywords: KeywordTable {
                entries: BRAND_KEYWORDS,
                scope: KeywordScope::PathAndTitle,
            },
            path: PathPenalties {
                system_markers: BRAND_SYSTEM_MARKERS,
                system_penalty: -100,
                slug: Some(SlugPenalty {
                    hyphenated: -80,
                    long_segment: -70,
                }),
                patterns: BRAND_PATTERNS,
            },
        }
    }

    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::General => Self::general(),
            Profile::Brand => Self::brand(),
        }
    }

    pub fn score_hit(&self, hit: &SearchHit) -> ScoredHit {
        ScoredHit {
            hit: hit.clone(),
            score: self.score(&hit.url, &hit.title, &hit.snippet),
        }
    }

    pub fn score(&self, url: &str, title: &str, snippet: &str) -> i64 {
        let parts = UrlParts::parse(url);
        let path = parts.as_ref().map(UrlParts::path_lower).unwrap_or_default();

        let mut score = 0i64;
        if let Some(p) = &parts {
            score += self.depth_points(p, &path);
            score += self.query_points(p);
        }
        score += self.keyword_points(&path, title, snippet);
        if parts.is_some() {
            score += self.path_points(&path);
        }
        score
    }

    fn depth_points(&self, p: &UrlParts, path: &str) -> i64 {
        let depth = p.depth();
        let numeric_leaf = p.segments.last().is_some_and(|s| is_all_digits(s));
        match self.depth {
            DepthRule::Flat {
                root,
                category,
                numeric_leaf: leaf_penalty,
            } => {
                let mut pts = 0;
                if is_index_path(p, path) {
                    pts += root;
                }
                if depth == 1 {
                    pts += category;
                }
                if depth >= 2 && numeric_leaf {
                    pts += leaf_penalty;
                }
                pts
            }
            DepthRule::Curve {
                root,
                one,
                two,
                deeper,
                numeric_leaf: leaf_penalty,
            } => {
                let mut pts = match depth {
                    0 => root,
                    1 => one,
                    2 if !numeric_leaf => two,
                    _ => deeper,
                };
                if numeric_leaf {
                    pts += leaf_penalty;
                }
                pts
            }
        }
    }

    fn query_points(&self, p: &UrlParts) -> i64 {
        let q = &self.query;
        let mut pts = 0;
        let has_item = p.has_item_id();
        let category = p.category();

        if let Some(cat) = &category {
            if !has_item {
                pts += q.category_listing;
                if let Some((_, bonus)) = q.category_bonuses.iter().find(|(name, _)| cat.contains(name)) {
                    pts += bonus;
                }
            }
        }
        if has_item {
            pts += q.item_id_penalty;
        }
        for kp in q.key_penalties {
            if p.has_any_key(kp.keys) {
                pts += kp.points;
            }
        }
        if let Some(cat) = &category {
            if q.low_value_categories.iter().any(|name| cat.contains(name)) {
                pts += q.low_value_penalty;
            }
        }
        pts
    }

    fn keyword_points(&self, path: &str, title: &str, snippet: &str) -> i64 {
        let table = &self.keywords;
        match table.scope {
            KeywordScope::TextOrPath => {
                let text = format!("{title} {snippet}").to_lowercase();
                table
                    .entries
                    .iter()
                    .filter(|(kw, _)| text.contains(kw) || path.contains(kw))
                    .map(|(_, w)| w)
                    .sum()
            }
            KeywordScope::PathAndTitle => {
                let text = format!("{path} {title}").to_lowercase();
                table
                    .entries
                    .iter()
                    .filter(|(kw, _)| text.contains(kw))
                    .map(|(_, w)| w)
                    .sum()
            }
        }
    }

    fn path_points(&self, path: &str) -> i64 {
        let pp = &self.path;
        let mut pts = 0;
        if pp.system_markers.iter().any(|m| path.contains(m)) {
            pts += pp.system_penalty;
        }
        if let Some(slug) = pp.slug {
            for seg in path.split('/').filter(|s| !s.is_empty() && !has_file_extension(s)) {
                let hyphens = hyphen_count(seg);
                if (hyphens >= 2 && has_native_script(seg)) || hyphens >= 3 {
                    pts += slug.hyphenated;
                }
                if char_len(seg) > 20 {
                    pts += slug.long_segment;
                }
            }
        }
        for (re, points) in pp.patterns {
            if re.is_match(path) {
                pts += points;
            }
        }
        pts
    }
}

fn is_index_path(p: &UrlParts, path: &str) -> bool {
    path.is_empty() || path == "/main" || (p.segments.len() == 1 && path.starts_with("/index."))
}

/// General-profile score.
pub fn score(url: &str, title: &str, snippet: &str) -> i64 {
    Scorer::general().score(url, title, snippet)
}

/// Brand-profile score.
pub fn brand_score(url: &str, title: &str, snippet: &str) -> i64 {
    Scorer::brand().score(url, title, snippet)
}
