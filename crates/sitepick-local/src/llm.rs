//! Stage 3 classification on top of a chat backend.

use sitepick_core::classify::{build_prompt, parse_reply};
use sitepick_core::{BatchClassifier, ChatBackend, Label, Result};
use std::sync::Arc;

pub struct LlmBatchClassifier {
    backend: Arc<dyn ChatBackend>,
    timeout_ms: u64,
}

impl LlmBatchClassifier {
    pub fn new(backend: Arc<dyn ChatBackend>, timeout_ms: u64) -> Self {
        Self {
            backend,
            timeout_ms: timeout_ms.max(1),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

impl std::fmt::Debug for LlmBatchClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmBatchClassifier")
            .field("backend", &self.backend.name())
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[async_trait::async_trait]
impl BatchClassifier for LlmBatchClassifier {
    async fn classify_batch(&self, urls: &[String]) -> Result<Vec<Label>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        let prompt = build_prompt(urls);
        let reply = self.backend.chat("", &prompt, self.timeout_ms).await?;
        let labels = parse_reply(urls.len(), &reply);
        tracing::debug!(
            backend = self.backend.name(),
            batch = urls.len(),
            listing = labels.iter().filter(|l| **l == Label::Listing).count(),
            "llm batch classified"
        );
        Ok(labels)
    }
}
