use crate::aggregate::{Corpus, TextAggregator};
use crate::embedder::{EmbeddingCapability, EmbeddingStatus};
use crate::error::Result;
use crate::item::Item;
use crate::pattern::PatternScorer;
use crate::semantic::PrototypeClassifier;
use crate::taxonomy::{Label, Taxonomy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Which layers run for each item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifierStrategy {
    /// Keyword scoring only; no signal means the general label.
    #[serde(rename = "pattern")]
    PatternBased,
    /// Prototype similarity only.
    #[serde(rename = "semantic")]
    SemanticPrototype,
    /// Keyword scoring first, prototype similarity when no keyword matched.
    #[serde(rename = "hybrid")]
    Hybrid,
}

impl ClassifierStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PatternBased => "pattern",
            Self::SemanticPrototype => "semantic",
            Self::Hybrid => "hybrid",
        }
    }
}

/// How an item got its final label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    Pattern,
    Semantic,
    General,
    Unclassified,
    /// Moved to a missing category by the coverage pass.
    Reassigned,
}

/// Raw per-item labels before any coverage repair.
#[derive(Debug, Clone)]
pub struct Labeling {
    pub labels: Vec<Label>,
    pub sources: Vec<LabelSource>,
    /// Aggregated text per item; empty for items below the length threshold.
    pub corpora: Vec<String>,
}

/// Layered single-taxonomy classifier.
pub struct Classifier {
    taxonomy: Taxonomy,
    strategy: ClassifierStrategy,
    aggregator: TextAggregator,
    scorer: PatternScorer,
    prototypes: PrototypeClassifier,
}

impl Classifier {
    pub fn new(
        taxonomy: Taxonomy,
        strategy: ClassifierStrategy,
        aggregator: TextAggregator,
        keyword_weight_divisor: f32,
        embedding_timeout: Duration,
    ) -> Result<Self> {
        taxonomy.validate()?;
        let scorer = PatternScorer::new(&taxonomy, keyword_weight_divisor)?;
        let prototypes = PrototypeClassifier::new(&taxonomy, embedding_timeout);
        Ok(Self {
            taxonomy,
            strategy,
            aggregator,
            scorer,
            prototypes,
        })
    }

    #[must_use]
    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    #[must_use]
    pub fn scorer(&self) -> &PatternScorer {
        &self.scorer
    }

    /// Labels every item. Never fails: semantic errors degrade `status` and fall back to the
    /// general label for the affected items.
    pub async fn label(
        &self,
        items: &[Item],
        capability: &EmbeddingCapability,
        status: &mut EmbeddingStatus,
    ) -> Labeling {
        let mut labels = Vec::with_capacity(items.len());
        let mut sources = Vec::with_capacity(items.len());
        let mut corpora = Vec::with_capacity(items.len());
        let mut pending: Vec<usize> = Vec::new();

        for (index, item) in items.iter().enumerate() {
            let corpus = match self.aggregator.aggregate(item) {
                Corpus::Text(text) => text,
                Corpus::TooShort => {
                    log::debug!("Item {index}: corpus too short, unclassified");
                    labels.push(Label::Unclassified);
                    sources.push(LabelSource::Unclassified);
                    corpora.push(String::new());
                    continue;
                }
            };

            let pattern = match self.strategy {
                ClassifierStrategy::SemanticPrototype => None,
                ClassifierStrategy::PatternBased | ClassifierStrategy::Hybrid => {
                    self.scorer.best_match(&corpus)
                }
            };
            match pattern {
                Some(category) => {
                    log::debug!(
                        "Item {index}: pattern match '{}'",
                        self.taxonomy.label_name(Label::Category(category))
                    );
                    labels.push(Label::Category(category));
                    sources.push(LabelSource::Pattern);
                }
                None => {
                    labels.push(Label::General);
                    sources.push(LabelSource::General);
                    if self.strategy != ClassifierStrategy::PatternBased
                        && self.prototypes.has_prototypes()
                    {
                        pending.push(index);
                    }
                }
            }
            corpora.push(corpus);
        }

        if !pending.is_empty() {
            self.resolve_semantic(&pending, &corpora, &mut labels, &mut sources, capability, status)
                .await;
        }

        Labeling {
            labels,
            sources,
            corpora,
        }
    }

    async fn resolve_semantic(
        &self,
        pending: &[usize],
        corpora: &[String],
        labels: &mut [Label],
        sources: &mut [LabelSource],
        capability: &EmbeddingCapability,
        status: &mut EmbeddingStatus,
    ) {
        let Some(embedder) = capability.embedder() else {
            log::debug!(
                "{} items without pattern signal keep '{}' (embeddings unavailable)",
                pending.len(),
                self.taxonomy.general_label
            );
            return;
        };

        // Identical corpora are embedded once.
        let mut unique: Vec<String> = Vec::new();
        let mut slot_of: HashMap<&str, usize> = HashMap::new();
        let slots: Vec<usize> = pending
            .iter()
            .map(|&index| {
                let corpus = corpora[index].as_str();
                *slot_of.entry(corpus).or_insert_with(|| {
                    unique.push(corpus.to_string());
                    unique.len() - 1
                })
            })
            .collect();

        match self.prototypes.classify(embedder.as_ref(), &unique).await {
            Ok(nearest) => {
                for (&index, &slot) in pending.iter().zip(&slots) {
                    if let Some(category) = nearest.get(slot).copied().flatten() {
                        labels[index] = Label::Category(category);
                        sources[index] = LabelSource::Semantic;
                    }
                }
            }
            Err(err) => {
                log::warn!(
                    "Semantic fallback failed for '{}', using '{}': {err:#}",
                    self.taxonomy.name,
                    self.taxonomy.general_label
                );
                status.degrade(format!("{err:#}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::fakes::{FailingEmbedder, KeywordEmbedder};
    use crate::item::ItemField;
    use crate::taxonomy::fixtures::letters;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn classifier(strategy: ClassifierStrategy) -> Classifier {
        Classifier::new(
            letters(),
            strategy,
            TextAggregator::new(ItemField::ALL.to_vec(), 15),
            20.0,
            Duration::from_secs(1),
        )
        .unwrap()
    }

    fn items(titles: &[&str]) -> Vec<Item> {
        titles
            .iter()
            .enumerate()
            .map(|(i, title)| Item::new(i).with(ItemField::Title, *title))
            .collect()
    }

    fn fake() -> EmbeddingCapability {
        EmbeddingCapability::available(Arc::new(KeywordEmbedder::new(&[
            "first", "second", "third", "fourth", "fifth",
        ])))
    }

    #[tokio::test]
    async fn hybrid_uses_patterns_then_prototypes() {
        let capability = fake();
        let mut status = capability.status();
        let labeling = classifier(ClassifierStrategy::Hybrid)
            .label(
                &items(&["an alpha study of things", "the fourth kind of study", "tiny"]),
                &capability,
                &mut status,
            )
            .await;

        assert_eq!(
            labeling.labels,
            vec![Label::Category(0), Label::Category(3), Label::Unclassified]
        );
        assert_eq!(
            labeling.sources,
            vec![
                LabelSource::Pattern,
                LabelSource::Semantic,
                LabelSource::Unclassified
            ]
        );
        assert_eq!(labeling.corpora[2], "");
        assert!(!status.is_degraded());
    }

    #[tokio::test]
    async fn pattern_strategy_never_embeds() {
        let capability = EmbeddingCapability::available(Arc::new(FailingEmbedder));
        let mut status = capability.status();
        let labeling = classifier(ClassifierStrategy::PatternBased)
            .label(&items(&["nothing matches in here"]), &capability, &mut status)
            .await;
        assert_eq!(labeling.labels, vec![Label::General]);
        assert!(!status.is_degraded());
    }

    #[tokio::test]
    async fn semantic_strategy_ignores_keywords() {
        let capability = fake();
        let mut status = capability.status();
        let labeling = classifier(ClassifierStrategy::SemanticPrototype)
            .label(&items(&["alpha words about the second"]), &capability, &mut status)
            .await;
        assert_eq!(labeling.labels, vec![Label::Category(1)]);
        assert_eq!(labeling.sources, vec![LabelSource::Semantic]);
    }

    #[tokio::test]
    async fn unavailable_capability_yields_general() {
        let capability = EmbeddingCapability::unavailable("off");
        let mut status = capability.status();
        let labeling = classifier(ClassifierStrategy::Hybrid)
            .label(&items(&["no keywords in this title"]), &capability, &mut status)
            .await;
        assert_eq!(labeling.labels, vec![Label::General]);
        assert_eq!(labeling.sources, vec![LabelSource::General]);
    }

    #[tokio::test]
    async fn embedding_failure_degrades_status() {
        let capability = EmbeddingCapability::available(Arc::new(FailingEmbedder));
        let mut status = capability.status();
        let labeling = classifier(ClassifierStrategy::Hybrid)
            .label(
                &items(&["no keywords in this title", "bravo bravo bravo!"]),
                &capability,
                &mut status,
            )
            .await;
        assert_eq!(labeling.labels, vec![Label::General, Label::Category(1)]);
        assert!(status.is_degraded());
        assert!(status.available);
    }

    #[tokio::test]
    async fn taxonomy_without_prototypes_skips_embedding() {
        let mut taxonomy = letters();
        for category in &mut taxonomy.categories {
            category.prototype.clear();
        }
        let classifier = Classifier::new(
            taxonomy,
            ClassifierStrategy::Hybrid,
            TextAggregator::new(ItemField::ALL.to_vec(), 15),
            20.0,
            Duration::from_secs(1),
        )
        .unwrap();
        let capability = EmbeddingCapability::available(Arc::new(FailingEmbedder));
        let mut status = capability.status();
        let labeling = classifier
            .label(&items(&["no keywords in this title"]), &capability, &mut status)
            .await;
        assert_eq!(labeling.labels, vec![Label::General]);
        assert!(!status.is_degraded());
    }

    #[tokio::test]
    async fn duplicate_corpora_are_embedded_once() {
        let embedder = Arc::new(KeywordEmbedder::new(&["second"]));
        let capability = EmbeddingCapability::available(embedder.clone());
        let mut status = capability.status();
        let labeling = classifier(ClassifierStrategy::Hybrid)
            .label(
                &items(&["the second of many", "the second of many"]),
                &capability,
                &mut status,
            )
            .await;
        assert_eq!(labeling.labels, vec![Label::Category(1); 2]);
        assert_eq!(
            embedder.calls.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[test]
    fn strategy_names_round_trip_through_serde() {
        let parsed: ClassifierStrategy = serde_json::from_str("\"semantic\"").unwrap();
        assert_eq!(parsed, ClassifierStrategy::SemanticPrototype);
        assert_eq!(ClassifierStrategy::Hybrid.as_str(), "hybrid");
    }
}
