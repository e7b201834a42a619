use anyhow::{anyhow, Context};
use async_trait::async_trait;
use litmap_embeddings::EmbeddingModel;
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Sentence-embedding backend seen by the engine.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    fn model_id(&self) -> &str;

    /// One vector per input text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

#[async_trait]
impl TextEmbedder for EmbeddingModel {
    fn model_id(&self) -> &str {
        self.id()
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(EmbeddingModel::embed_batch(self, texts).await?)
    }
}

/// Whether semantic paths can run in this process.
///
/// `Unavailable` routes callers to the rule-based or identity paths; it is never papered over
/// with placeholder vectors.
#[derive(Clone)]
pub enum EmbeddingCapability {
    Available(Arc<dyn TextEmbedder>),
    Unavailable { reason: String },
}

static SHARED: OnceCell<EmbeddingCapability> = OnceCell::new();

impl EmbeddingCapability {
    /// The process-wide capability, resolved from the environment on first use.
    pub fn shared() -> Self {
        SHARED.get_or_init(Self::from_env).clone()
    }

    /// Loads the model selected by the environment. Failures become `Unavailable`.
    pub fn from_env() -> Self {
        match EmbeddingModel::from_env() {
            Ok(model) => {
                log::info!(
                    "Embedding model '{}' ready ({} mode, dim {})",
                    model.id(),
                    model.mode().as_str(),
                    model.dimension()
                );
                Self::Available(Arc::new(model))
            }
            Err(err) => {
                log::warn!("Semantic classification disabled: {err}");
                Self::unavailable(err.to_string())
            }
        }
    }

    pub fn available(embedder: Arc<dyn TextEmbedder>) -> Self {
        Self::Available(embedder)
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn embedder(&self) -> Option<&Arc<dyn TextEmbedder>> {
        match self {
            Self::Available(embedder) => Some(embedder),
            Self::Unavailable { .. } => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> EmbeddingStatus {
        match self {
            Self::Available(embedder) => EmbeddingStatus {
                available: true,
                model_id: Some(embedder.model_id().to_string()),
                degraded_reason: None,
            },
            Self::Unavailable { reason } => EmbeddingStatus {
                available: false,
                model_id: None,
                degraded_reason: Some(reason.clone()),
            },
        }
    }
}

impl std::fmt::Debug for EmbeddingCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(embedder) => f
                .debug_tuple("Available")
                .field(&embedder.model_id())
                .finish(),
            Self::Unavailable { reason } => f
                .debug_struct("Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Capability report attached to every engine outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddingStatus {
    pub available: bool,
    pub model_id: Option<String>,
    pub degraded_reason: Option<String>,
}

impl EmbeddingStatus {
    /// Records a failure that happened during a run; the first reason wins.
    pub fn degrade(&mut self, reason: impl Into<String>) {
        if self.degraded_reason.is_none() {
            self.degraded_reason = Some(reason.into());
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded_reason.is_some()
    }
}

/// Embeds `texts` within `timeout`, checking that the backend returned one finite vector of a
/// single dimension per text.
pub(crate) async fn embed_with_timeout(
    embedder: &dyn TextEmbedder,
    texts: &[String],
    timeout: Duration,
) -> anyhow::Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(vec![]);
    }

    let vectors = tokio::time::timeout(timeout, embedder.embed_batch(texts))
        .await
        .map_err(|_| anyhow!("embedding timed out after {}ms", timeout.as_millis()))?
        .with_context(|| format!("embedding {} texts with '{}'", texts.len(), embedder.model_id()))?;

    if vectors.len() != texts.len() {
        return Err(anyhow!(
            "embedder returned {} vectors for {} texts",
            vectors.len(),
            texts.len()
        ));
    }
    let dimension = vectors.first().map_or(0, Vec::len);
    if dimension == 0 {
        return Err(anyhow!("embedder returned empty vectors"));
    }
    if vectors
        .iter()
        .any(|v| v.len() != dimension || v.iter().any(|x| !x.is_finite()))
    {
        return Err(anyhow!("embedder returned inconsistent or non-finite vectors"));
    }
    Ok(vectors)
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds text as keyword presence over a fixed vocabulary, plus a bias slot so no
    /// vector is ever zero.
    pub(crate) struct KeywordEmbedder {
        vocabulary: Vec<String>,
        pub(crate) calls: AtomicUsize,
    }

    impl KeywordEmbedder {
        pub(crate) fn new(vocabulary: &[&str]) -> Self {
            Self {
                vocabulary: vocabulary.iter().map(ToString::to_string).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextEmbedder for KeywordEmbedder {
        fn model_id(&self) -> &str {
            "keyword-fake"
        }

        async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|text| {
                    let lowered = text.to_lowercase();
                    let mut vector: Vec<f32> = self
                        .vocabulary
                        .iter()
                        .map(|word| if lowered.contains(word.as_str()) { 1.0 } else { 0.0 })
                        .collect();
                    vector.push(0.1);
                    vector
                })
                .collect())
        }
    }

    pub(crate) struct FailingEmbedder;

    #[async_trait]
    impl TextEmbedder for FailingEmbedder {
        fn model_id(&self) -> &str {
            "failing-fake"
        }

        async fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Err(anyhow!("inference backend crashed"))
        }
    }

    /// Keyword embedder that rejects batches above a size limit.
    pub(crate) struct BatchLimitEmbedder {
        limit: usize,
        inner: KeywordEmbedder,
    }

    impl BatchLimitEmbedder {
        pub(crate) fn new(limit: usize, vocabulary: &[&str]) -> Self {
            Self {
                limit,
                inner: KeywordEmbedder::new(vocabulary),
            }
        }
    }

    #[async_trait]
    impl TextEmbedder for BatchLimitEmbedder {
        fn model_id(&self) -> &str {
            "batch-limit-fake"
        }

        async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            if texts.len() > self.limit {
                return Err(anyhow!("batch of {} exceeds {}", texts.len(), self.limit));
            }
            self.inner.embed_batch(texts).await
        }
    }

    pub(crate) struct SlowEmbedder;

    #[async_trait]
    impl TextEmbedder for SlowEmbedder {
        fn model_id(&self) -> &str {
            "slow-fake"
        }

        async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![vec![1.0]; texts.len()])
        }
    }
}
