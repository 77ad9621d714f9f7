//! URL shape signatures and exact-duplicate keys.
//!
//! Two keys with different jobs:
//! - [`normalize_shape`] collapses ids, slugs and hashes so that machine
//!   generated item pages fall into one bucket.
//! - [`normalize_exact`] only removes noise (tracking keys, ordering,
//!   fragment) and is what final dedup compares.

use crate::params::{char_len, has_file_extension, has_native_script, is_all_digits, is_tracking_key, UrlParts};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ID_PLACEHOLDER: &str = "{id}";
pub const SLUG_PLACEHOLDER: &str = "{slug}";
pub const HASH_PLACEHOLDER: &str = "{hash}";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructuralSignature(String);

impl StructuralSignature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StructuralSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Literal,
    NumericId,
    Slug,
    Hash,
}

/// Classify one decoded path segment. First matching rule wins.
pub fn classify_segment(seg: &str) -> SegmentKind {
    if has_file_extension(seg) {
        return SegmentKind::Literal;
    }
    if is_all_digits(seg) {
        return SegmentKind::NumericId;
    }
    if char_len(seg) > 10 && (seg.contains('-') || has_native_script(seg)) {
        return SegmentKind::Slug;
    }
    if seg.len() >= 8 && seg.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return SegmentKind::Hash;
    }
    SegmentKind::Literal
}

fn render_segment(seg: &str) -> &str {
    match classify_segment(seg) {
        SegmentKind::Literal => seg,
        SegmentKind::NumericId => ID_PLACEHOLDER,
        SegmentKind::Slug => SLUG_PLACEHOLDER,
        SegmentKind::Hash => HASH_PLACEHOLDER,
    }
}

fn shape_of(parts: &UrlParts) -> StructuralSignature {
    let path = parts
        .segments
        .iter()
        .map(|s| render_segment(s))
        .collect::<Vec<_>>()
        .join("/");
    let keys = parts.sorted_keys().join("&");
    StructuralSignature(format!("{}/{}?{}", parts.host, path, keys))
}

/// Shape signature: `host/segments?sorted-keys`.
///
/// Unparseable input maps to a signature made of the trimmed input itself, so
/// the function stays total; such URLs never share a shape with a real one.
pub fn normalize_shape(url: &str) -> StructuralSignature {
    match UrlParts::parse(url) {
        Some(p) => shape_of(&p),
        None => StructuralSignature(format!("!{}", url.trim())),
    }
}

fn exact_of(parts: &UrlParts) -> String {
    let mut pairs: Vec<(&str, &str)> = Vec::new();
    for (k, v) in &parts.query {
        if is_tracking_key(k) || pairs.iter().any(|(seen, _)| *seen == k.as_str()) {
            continue;
        }
        pairs.push((k.as_str(), v.as_str()));
    }
    pairs.sort();
    let base = format!("{}://{}{}", parts.scheme, parts.host, parts.raw_path);
    if pairs.is_empty() {
        return base;
    }
    let q = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{base}?{q}")
}

/// Dedup key: tracking keys removed, `(key, first value)` pairs sorted,
/// fragment dropped.
pub fn normalize_exact(url: &str) -> String {
    match UrlParts::parse(url) {
        Some(p) => exact_of(&p),
        None => url.trim().split('#').next().unwrap_or("").to_string(),
    }
}

/// Parsed-input variants used by `DomainRun`, which has already parsed.
pub(crate) fn keys_for(parts: &UrlParts) -> (String, StructuralSignature) {
    (exact_of(parts), shape_of(parts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_collapse_and_slugs_do_not() {
        let a = normalize_shape("https://d.example/post/123");
        let b = normalize_shape("https://d.example/post/456");
        let c = normalize_shape("https://d.example/post/abc-def");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str(), "d.example/post/{id}?");
        assert_eq!(c.as_str(), "d.example/post/abc-def?");
    }

    #[test]
    fn segment_rules_apply_in_priority_order() {
        assert_eq!(classify_segment("board.php"), SegmentKind::Literal);
        assert_eq!(classify_segment("12345678.html"), SegmentKind::Literal);
        assert_eq!(classify_segment("5733"), SegmentKind::NumericId);
        assert_eq!(classify_segment("long-title-here"), SegmentKind::Slug);
        assert_eq!(classify_segment("먹튀검증사이트추천목록입니다"), SegmentKind::Slug);
        assert_eq!(classify_segment("8uev370xkibh7op"), SegmentKind::Hash);
        assert_eq!(classify_segment("notice"), SegmentKind::Literal);
        assert_eq!(classify_segment("abc_defgh"), SegmentKind::Literal);
    }

    #[test]
    fn shape_keeps_only_sorted_query_keys() {
        let a = normalize_shape("https://d.example/bbs/board.php?wr_id=5&bo_table=free");
        let b = normalize_shape("https://d.example/bbs/board.php?bo_table=notice&wr_id=99");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "d.example/bbs/board.php?bo_table&wr_id");
    }

    #[test]
    fn exact_key_strips_tracking_sorts_and_drops_fragment() {
        let a = normalize_exact("https://d.example/list?b=2&a=1&utm_source=x#top");
        let b = normalize_exact("https://d.example/list?a=1&fbclid=zzz&b=2");
        assert_eq!(a, b);
        assert_eq!(a, "https://d.example/list?a=1&b=2");
    }

    #[test]
    fn exact_key_uses_first_value_for_repeated_keys() {
        assert_eq!(
            normalize_exact("https://d.example/x?page=1&page=2"),
            "https://d.example/x?page=1"
        );
    }

    #[test]
    fn exact_key_without_query_has_no_question_mark() {
        assert_eq!(normalize_exact("https://d.example/"), "https://d.example/");
        assert_eq!(normalize_exact("https://d.example/a?utm_medium=m"), "https://d.example/a");
    }

    #[test]
    fn malformed_input_stays_total() {
        assert_eq!(normalize_exact("nonsense#frag"), "nonsense");
        assert_ne!(normalize_shape("nonsense"), normalize_shape("https://nonsense/"));
    }
}
