//! Network-facing collaborators for `sitepick-core`: search providers, chat
//! backends, the LLM batch classifier and the per-domain discovery pipeline.

pub mod config;
pub mod discovery;
pub mod llm;
pub mod ollama;
pub mod openai_compat;
pub mod search;

pub use config::{Mode, PipelineConfig};
pub use discovery::{DomainReport, Pipeline};

/// Trimmed env var; empty counts as unset.
pub(crate) fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// First non-empty of several env vars, in order.
pub(crate) fn env_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| env(k))
}

pub(crate) fn env_bool(key: &str) -> bool {
    matches!(
        env(key).map(|s| s.to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}
