use crate::aggregate::TextAggregator;
use crate::cluster::{ClusterOutcome, SemanticClusterer};
use crate::config::EngineConfig;
use crate::coverage::{CoverageGuarantor, CoverageReport};
use crate::distribution::DistributionSummary;
use crate::embedder::{EmbeddingCapability, EmbeddingStatus};
use crate::error::Result;
use crate::item::Item;
use crate::strategy::{Classifier, LabelSource};
use crate::taxonomy::Label;
use serde::Serialize;

/// Closed-taxonomy result, one entry per input item in every vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationOutcome {
    pub labels: Vec<String>,
    pub assignments: Vec<Label>,
    pub sources: Vec<LabelSource>,
    pub coverage: CoverageReport,
    pub embedding: EmbeddingStatus,
}

/// Open-vocabulary approach labels, one per input item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApproachOutcome {
    pub labels: Vec<String>,
    pub sources: Vec<LabelSource>,
    pub embedding: EmbeddingStatus,
}

/// Entry point for classification, approach extraction and label clustering.
pub struct MappingEngine {
    config: EngineConfig,
    categories: Classifier,
    approaches: Classifier,
    clusterer: SemanticClusterer,
    capability: EmbeddingCapability,
}

impl MappingEngine {
    /// Builds an engine around an explicit capability. A profile with embeddings disabled
    /// overrides it.
    pub fn new(config: EngineConfig, capability: EmbeddingCapability) -> Result<Self> {
        config.validate()?;
        let capability = if config.embedding.enabled {
            capability
        } else {
            EmbeddingCapability::unavailable("embeddings disabled by profile")
        };

        let aggregator = TextAggregator::new(config.fields.clone(), config.min_corpus_chars);
        let categories = Classifier::new(
            config.categories.clone(),
            config.strategy,
            aggregator.clone(),
            config.keyword_weight_divisor,
            config.embedding.timeout,
        )?;
        let approaches = Classifier::new(
            config.approaches.clone(),
            config.strategy,
            aggregator,
            config.keyword_weight_divisor,
            config.embedding.timeout,
        )?;
        let clusterer = SemanticClusterer::new(
            config.clustering,
            config.approaches.unclassified_label.clone(),
            config.embedding.timeout,
        );

        log::debug!(
            "Engine ready: strategy={}, {} categories, {} approaches, embeddings {}",
            config.strategy.as_str(),
            config.categories.len(),
            config.approaches.len(),
            if capability.embedder().is_some() { "on" } else { "off" }
        );
        Ok(Self {
            config,
            categories,
            approaches,
            clusterer,
            capability,
        })
    }

    /// Builds an engine on the process-wide embedding capability, loading it on first use.
    pub fn with_shared_capability(config: EngineConfig) -> Result<Self> {
        let capability = if config.embedding.enabled {
            EmbeddingCapability::shared()
        } else {
            EmbeddingCapability::unavailable("embeddings disabled by profile")
        };
        Self::new(config, capability)
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn embedding_status(&self) -> EmbeddingStatus {
        self.capability.status()
    }

    /// Labels every item with a category and repairs coverage of the category set.
    pub async fn classify(&self, items: &[Item]) -> ClassificationOutcome {
        let mut status = self.capability.status();
        let labeling = self
            .categories
            .label(items, &self.capability, &mut status)
            .await;
        let mut assignments = labeling.labels;
        let mut sources = labeling.sources;
        let taxonomy = self.categories.taxonomy();

        let coverage = if self.config.enforce_coverage {
            let report = CoverageGuarantor::new(taxonomy, self.categories.scorer())
                .repair(&mut assignments, &labeling.corpora);
            for reassignment in &report.reassignments {
                sources[reassignment.index] = LabelSource::Reassigned;
            }
            report
        } else {
            CoverageReport::skipped(taxonomy, &assignments)
        };

        let labels = assignments
            .iter()
            .map(|&label| taxonomy.label_name(label).to_string())
            .collect();
        log::info!(
            "Classified {} items into '{}' ({:?} coverage)",
            items.len(),
            taxonomy.name,
            coverage.status
        );
        ClassificationOutcome {
            labels,
            assignments,
            sources,
            coverage,
            embedding: status,
        }
    }

    /// Research-approach label per item. No coverage step.
    pub async fn extract_approaches(&self, items: &[Item]) -> ApproachOutcome {
        let mut status = self.capability.status();
        let labeling = self
            .approaches
            .label(items, &self.capability, &mut status)
            .await;
        let taxonomy = self.approaches.taxonomy();
        let labels = labeling
            .labels
            .iter()
            .map(|&label| taxonomy.label_name(label).to_string())
            .collect();
        ApproachOutcome {
            labels,
            sources: labeling.sources,
            embedding: status,
        }
    }

    pub async fn cluster_labels(&self, labels: &[String]) -> ClusterOutcome {
        self.cluster_labels_with_k(labels, None).await
    }

    /// Like [`Self::cluster_labels`] with a requested cluster count, still clamped to the
    /// configured bounds.
    pub async fn cluster_labels_with_k(&self, labels: &[String], k: Option<usize>) -> ClusterOutcome {
        self.clusterer.cluster(labels, k, &self.capability).await
    }

    /// Clusters extracted approaches. A degradation during extraction stays on the result.
    pub async fn cluster_approaches(
        &self,
        approaches: &ApproachOutcome,
        k: Option<usize>,
    ) -> ClusterOutcome {
        let mut clusters = self.cluster_labels_with_k(&approaches.labels, k).await;
        if let Some(reason) = approaches.embedding.degraded_reason.clone() {
            clusters.embedding.degrade(reason);
        }
        clusters
    }

    /// Approach extraction, clustering and per-group shares in one call.
    pub async fn distribution(&self, items: &[Item]) -> DistributionSummary {
        let approaches = self.extract_approaches(items).await;
        let clusters = self.cluster_approaches(&approaches, None).await;
        DistributionSummary::from_clusters(items, clusters)
    }
}
