//! Pipeline knobs, loadable from JSON and overridable from the CLI.

use serde::{Deserialize, Serialize};
use sitepick_core::rank::{RankFilter, RankOptions};
use sitepick_core::run::DEFAULT_PATTERN_THRESHOLD;
use sitepick_core::score::Profile;
use sitepick_core::{Error, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::search::PageLimits;

/// How a domain's candidate pages are discovered and filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// `site:` search, classified, LISTING kept.
    #[default]
    Site,
    /// Brand-name search plus `site:` search, scored with the brand preset
    /// and filtered by a minimum score.
    Brand,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Site => "site",
            Mode::Brand => "brand",
        }
    }

    pub fn default_profile(self) -> Profile {
        match self {
            Mode::Site => Profile::General,
            Mode::Brand => Profile::Brand,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "site" | "seo" => Ok(Mode::Site),
            "brand" => Ok(Mode::Brand),
            other => Err(Error::Config(format!(
                "unknown mode: {other} (allowed: site, brand)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub mode: Mode,
    /// Scoring preset; `None` follows the mode.
    pub profile: Option<Profile>,
    /// Results fetched per search and per-domain output cap.
    pub num: usize,
    pub max_pages: u32,
    pub per_page: usize,
    pub language: String,
    pub country: String,
    pub search_timeout_ms: u64,
    /// `false` keeps every deduplicated hit regardless of label or score.
    pub filter: bool,
    /// Score-only mode threshold for site mode; ignored in brand mode.
    pub min_score: Option<i64>,
    pub brand_min_score: i64,
    pub top_n: Option<usize>,
    /// Keep one hit per structural signature.
    pub compact_shapes: bool,
    /// `None` disables the repeated-shape POST rule.
    pub pattern_threshold: Option<usize>,
    pub batch_size: usize,
    pub batch_timeout_ms: u64,
    /// Fixed brand for brand mode; inferred when absent.
    pub brand: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Site,
            profile: None,
            num: 100,
            max_pages: 10,
            per_page: 10,
            language: "ko".to_string(),
            country: "kr".to_string(),
            search_timeout_ms: 15_000,
            filter: true,
            min_score: None,
            brand_min_score: 50,
            top_n: None,
            compact_shapes: false,
            pattern_threshold: Some(DEFAULT_PATTERN_THRESHOLD),
            batch_size: 20,
            batch_timeout_ms: 30_000,
            brand: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&s)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num == 0 {
            return Err(Error::Config("num must be at least 1".to_string()));
        }
        if self.max_pages == 0 {
            return Err(Error::Config("max_pages must be at least 1".to_string()));
        }
        if !(1..=100).contains(&self.per_page) {
            return Err(Error::Config("per_page must be within 1..=100".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if self.pattern_threshold == Some(0) {
            return Err(Error::Config(
                "pattern_threshold must be at least 1 (or null to disable)".to_string(),
            ));
        }
        Ok(())
    }

    pub fn profile(&self) -> Profile {
        self.profile.unwrap_or_else(|| self.mode.default_profile())
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            max_pages: self.max_pages,
            per_page: self.per_page,
            max_results: self.num,
        }
    }

    pub fn rank_options(&self) -> RankOptions {
        let filter = if !self.filter {
            RankFilter::Any
        } else {
            match (self.mode, self.min_score) {
                (Mode::Brand, _) => RankFilter::MinScore(self.brand_min_score),
                (Mode::Site, Some(min)) => RankFilter::MinScore(min),
                (Mode::Site, None) => RankFilter::Listing,
            }
        };
        RankOptions {
            filter,
            domain_cap: Some(self.num),
            top_n: self.top_n,
            compact_shapes: self.compact_shapes || (self.filter && self.mode == Mode::Brand),
        }
    }

    /// Stage 3 only pays off when labels decide the output.
    pub fn needs_external_classifier(&self) -> bool {
        matches!(self.rank_options().filter, RankFilter::Listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_collector() {
        let c = PipelineConfig::default();
        assert_eq!(c.page_limits(), PageLimits::default());
        assert_eq!(c.profile(), Profile::General);
        let r = c.rank_options();
        assert_eq!(r.filter, RankFilter::Listing);
        assert_eq!(r.domain_cap, Some(100));
        assert!(c.needs_external_classifier());
    }

    #[test]
    fn json_overrides_and_rejects_unknown_fields() {
        let c = PipelineConfig::from_json_str(r#"{"mode":"brand","num":20,"pattern_threshold":null}"#).unwrap();
        assert_eq!(c.mode, Mode::Brand);
        assert_eq!(c.profile(), Profile::Brand);
        assert_eq!(c.pattern_threshold, None);
        let r = c.rank_options();
        assert_eq!(r.filter, RankFilter::MinScore(50));
        assert!(r.compact_shapes);
        assert!(!c.needs_external_classifier());

        assert!(matches!(
            PipelineConfig::from_json_str(r#"{"nmu":3}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{"per_page":0}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn no_filter_keeps_everything() {
        let c = PipelineConfig {
            filter: false,
            min_score: Some(10),
            ..PipelineConfig::default()
        };
        assert_eq!(c.rank_options().filter, RankFilter::Any);
        assert!(!c.rank_options().compact_shapes);
    }

    #[test]
    fn mode_parses_aliases() {
        assert_eq!("SEO".parse::<Mode>().unwrap(), Mode::Site);
        assert_eq!("brand".parse::<Mode>().unwrap(), Mode::Brand);
        assert!("other".parse::<Mode>().is_err());
    }
}
