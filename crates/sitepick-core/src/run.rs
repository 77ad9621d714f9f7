//! Per-domain working set.
//!
//! A `DomainRun` is created for one domain evaluation and dropped afterwards.
//! It is never shared across domains, so independent domains can be processed
//! concurrently without synchronization.

use crate::params::UrlParts;
use crate::shape::{keys_for, normalize_shape, StructuralSignature};
use crate::SearchHit;
use std::collections::{HashMap, HashSet};

/// Repeated shapes at or above this count are machine-generated item pages.
pub const DEFAULT_PATTERN_THRESHOLD: usize = 3;

#[derive(Debug, Clone)]
pub struct DomainRun {
    domain: String,
    seen: HashSet<String>,
    shapes: HashMap<StructuralSignature, usize>,
    pattern_threshold: Option<usize>,
    skipped_malformed: usize,
    skipped_duplicate: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: usize,
    pub malformed: usize,
    pub duplicate: usize,
}

impl DomainRun {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            seen: HashSet::new(),
            shapes: HashMap::new(),
            pattern_threshold: Some(DEFAULT_PATTERN_THRESHOLD),
            skipped_malformed: 0,
            skipped_duplicate: 0,
        }
    }

    /// `None` disables the repeated-shape rule.
    pub fn with_pattern_threshold(mut self, threshold: Option<usize>) -> Self {
        self.pattern_threshold = threshold;
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Drop malformed URLs and URLs whose exact key was already seen in this
    /// run; record the shape of every accepted URL.
    ///
    /// Malformed URLs touch neither the seen-set nor the shape table.
    pub fn ingest(&mut self, hits: Vec<SearchHit>) -> Vec<SearchHit> {
        let mut out = Vec::with_capacity(hits.len());
        for mut hit in hits {
            let Some(parts) = UrlParts::parse(&hit.url) else {
                self.skipped_malformed += 1;
                continue;
            };
            let (exact, shape) = keys_for(&parts);
            if !self.seen.insert(exact) {
                self.skipped_duplicate += 1;
                continue;
            }
            *self.shapes.entry(shape).or_insert(0) += 1;
            if let Some(pos) = hit.url.find('#') {
                hit.url.truncate(pos);
            }
            out.push(hit);
        }
        tracing::debug!(
            domain = %self.domain,
            accepted = out.len(),
            malformed = self.skipped_malformed,
            duplicate = self.skipped_duplicate,
            "ingested batch"
        );
        out
    }

    pub fn stats(&self) -> IngestStats {
        IngestStats {
            accepted: self.seen.len(),
            malformed: self.skipped_malformed,
            duplicate: self.skipped_duplicate,
        }
    }

    pub fn shape_count(&self, url: &str) -> usize {
        self.shapes.get(&normalize_shape(url)).copied().unwrap_or(0)
    }

    /// True when the URL's shape repeats often enough to count as an item
    /// listing pattern.
    pub fn is_repeated_shape(&self, url: &str) -> bool {
        match self.pattern_threshold {
            Some(t) => self.shape_count(url) >= t,
            None => false,
        }
    }

    pub fn has_seen(&self, exact_key: &str) -> bool {
        self.seen.contains(exact_key)
    }
}
