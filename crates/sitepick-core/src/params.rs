//! Recognized query-parameter families and a decoded view of a URL.
//!
//! Every rule in `score`, `classify` and `shape` reads URLs through
//! [`UrlParts`], so percent-decoding and segment splitting happen in exactly
//! one place.

/// Keys that identify a single item (post / article).
pub const ITEM_ID_KEYS: &[&str] = &[
    "wr_id",
    "id",
    "no",
    "idx",
    "seq",
    "num",
    "article_id",
    "post_id",
    "document_srl",
];

/// Keys that produce a paged, filtered or sorted view of an existing listing.
pub const PAGINATION_KEYS: &[&str] = &["page", "sca", "sfl", "stx", "sop", "sst", "sod", "spt"];

/// Board / category selector (gnuboard style `board.php?bo_table=notice`).
pub const CATEGORY_KEY: &str = "bo_table";

pub const TRACKING_PREFIXES: &[&str] = &["utm_", "fbclid", "gclid"];
pub const TRACKING_KEYS: &[&str] = &["ref", "device"];

/// Segments ending in one of these are script names, not path levels.
pub const FILE_EXTENSIONS: &[&str] = &[".php", ".html", ".htm", ".asp", ".aspx", ".jsp", ".do"];

pub fn is_tracking_key(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    TRACKING_PREFIXES.iter().any(|p| k.starts_with(p)) || TRACKING_KEYS.contains(&k.as_str())
}

pub fn has_file_extension(segment: &str) -> bool {
    let s = segment.to_ascii_lowercase();
    FILE_EXTENSIONS.iter().any(|ext| s.ends_with(ext))
}

/// `segment` without a trailing script extension (`post-title.html` -> `post-title`).
pub fn strip_file_extension(segment: &str) -> &str {
    let lower = segment.to_ascii_lowercase();
    FILE_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map_or(segment, |ext| &segment[..segment.len() - ext.len()])
}

pub fn is_all_digits(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Letters outside ASCII (Hangul, CJK, Cyrillic, ...).
pub fn has_native_script(segment: &str) -> bool {
    segment.chars().any(|c| c.is_alphabetic() && !c.is_ascii())
}

pub fn hyphen_count(segment: &str) -> usize {
    segment.matches('-').count()
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Percent-decode, replacing invalid UTF-8 instead of failing.
pub fn percent_decode(s: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(s.as_bytes())).into_owned()
}

#[derive(Debug, Clone)]
pub struct UrlParts {
    pub scheme: String,
    /// Lowercased host, including `:port` when one is explicit.
    pub host: String,
    /// Percent-decoded path without a trailing slash (`""` for the root).
    pub path: String,
    /// Raw (still encoded) path as serialized by the parser.
    pub raw_path: String,
    /// Decoded non-empty path segments.
    pub segments: Vec<String>,
    /// Decoded `(key, value)` pairs in original order; keys lowercased.
    pub query: Vec<(String, String)>,
}

impl UrlParts {
    /// `None` for anything that is not an absolute URL with a host.
    pub fn parse(url: &str) -> Option<Self> {
        let u = url::Url::parse(url.trim()).ok()?;
        let host = u.host_str()?.to_ascii_lowercase();
        let host = match u.port() {
            Some(p) => format!("{host}:{p}"),
            None => host,
        };
        let decoded = percent_decode(u.path());
        let path = decoded.trim_end_matches('/').to_string();
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let query = u
            .query_pairs()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.into_owned()))
            .collect();
        Some(Self {
            scheme: u.scheme().to_string(),
            host,
            path,
            raw_path: u.path().to_string(),
            segments,
            query,
        })
    }

    pub fn path_lower(&self) -> String {
        self.path.to_lowercase()
    }

    /// Segments that count as path levels (script names excluded).
    pub fn depth_segments(&self) -> Vec<&str> {
        self.segments
            .iter()
            .map(String::as_str)
            .filter(|s| !has_file_extension(s))
            .collect()
    }

    pub fn depth(&self) -> usize {
        self.depth_segments().len()
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty() || self.path == "/"
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.query.iter().any(|(k, _)| k == key)
    }

    pub fn has_any_key(&self, keys: &[&str]) -> bool {
        self.query.iter().any(|(k, _)| keys.contains(&k.as_str()))
    }

    pub fn first_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Distinct key names, sorted.
    pub fn sorted_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.query.iter().map(|(k, _)| k.as_str()).collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    pub fn has_item_id(&self) -> bool {
        self.has_any_key(ITEM_ID_KEYS)
    }

    pub fn has_pagination(&self) -> bool {
        self.has_any_key(PAGINATION_KEYS)
    }

    /// Lowercased category selector value, when present.
    pub fn category(&self) -> Option<String> {
        self.first_value(CATEGORY_KEY).map(str::to_lowercase)
    }
}
