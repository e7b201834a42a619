use crate::config::ClusteringConfig;
use crate::embedder::{embed_with_timeout, EmbeddingCapability, EmbeddingStatus};
use crate::kmeans::{self, KMeansParams};
use crate::naming::ClusterNamer;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Cluster id of labels that could not be placed in any cluster.
pub const UNASSIGNED: i32 = -1;

/// How grouped labels were produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClusteringMethod {
    /// k-means over label embeddings.
    Semantic { k: usize },
    /// Exact string identity, because clustering was unavailable or failed.
    Identity { reason: String },
    /// Fewer than two distinct labels; input returned as is.
    Passthrough,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterSummary {
    pub id: i32,
    pub name: String,
    /// Distinct original labels in the cluster, in order of first appearance.
    pub members: Vec<String>,
    /// Number of items mapped to the cluster.
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterOutcome {
    pub grouped_labels: Vec<String>,
    pub cluster_ids: Vec<i32>,
    pub clusters: Vec<ClusterSummary>,
    pub method: ClusteringMethod,
    pub embedding: EmbeddingStatus,
}

impl ClusterOutcome {
    #[must_use]
    pub const fn is_semantic(&self) -> bool {
        matches!(self.method, ClusteringMethod::Semantic { .. })
    }
}

/// Groups open-vocabulary labels by embedding similarity.
pub struct SemanticClusterer {
    config: ClusteringConfig,
    /// Label meaning "no label"; never clustered.
    unclassified_label: String,
    timeout: Duration,
}

impl SemanticClusterer {
    #[must_use]
    pub fn new(config: ClusteringConfig, unclassified_label: String, timeout: Duration) -> Self {
        Self {
            config,
            unclassified_label,
            timeout,
        }
    }

    /// `round(sqrt(n_unique))` (or the requested k) clamped to `[min_k, max_k]` and to
    /// `n_unique`.
    #[must_use]
    pub fn choose_k(&self, n_unique: usize, requested: Option<usize>) -> usize {
        let heuristic = || (n_unique as f64).sqrt().round() as usize;
        requested
            .unwrap_or_else(heuristic)
            .max(self.config.min_k)
            .min(self.config.max_k)
            .min(n_unique)
            .max(1)
    }

    /// Maps every label to a cluster. Always returns length-matched output.
    pub async fn cluster(
        &self,
        labels: &[String],
        requested_k: Option<usize>,
        capability: &EmbeddingCapability,
    ) -> ClusterOutcome {
        let mut status = capability.status();
        let unique = self.unique_labels(labels);

        if unique.len() < 2 {
            log::debug!(
                "{} distinct labels, clustering skipped",
                unique.len()
            );
            return self.passthrough(labels, status);
        }

        let Some(embedder) = capability.embedder() else {
            let reason = status
                .degraded_reason
                .clone()
                .unwrap_or_else(|| "embeddings unavailable".to_string());
            log::warn!("Grouping labels by identity: {reason}");
            return self.identity(labels, reason, status);
        };

        let vectors = match embed_with_timeout(embedder.as_ref(), &unique, self.timeout).await {
            Ok(vectors) => vectors,
            Err(err) => {
                let reason = format!("{err:#}");
                log::warn!("Label embedding failed, grouping by identity: {reason}");
                status.degrade(reason.clone());
                return self.identity(labels, reason, status);
            }
        };

        let k = self.choose_k(unique.len(), requested_k);
        let params = KMeansParams {
            k,
            seed: self.config.seed,
            n_init: self.config.n_init,
            max_iterations: self.config.max_iterations,
        };
        let fit = match kmeans::fit(&vectors, params) {
            Ok(fit) => fit,
            Err(err) => {
                let reason = format!("clustering failed: {err}");
                log::warn!("{reason}; grouping by identity");
                return self.identity(labels, reason, status);
            }
        };

        let cluster_of: HashMap<&str, usize> = unique
            .iter()
            .map(String::as_str)
            .zip(fit.assignments.iter().copied())
            .collect();
        let mut members: Vec<Vec<String>> = vec![Vec::new(); k];
        for label in labels {
            if let Some(&cluster) = cluster_of.get(label.as_str()) {
                members[cluster].push(label.clone());
            }
        }
        let names: Vec<String> = members
            .iter()
            .enumerate()
            .map(|(id, m)| ClusterNamer::name(m, id))
            .collect();

        let mut grouped_labels = Vec::with_capacity(labels.len());
        let mut cluster_ids = Vec::with_capacity(labels.len());
        for label in labels {
            match cluster_of.get(label.as_str()) {
                Some(&cluster) => {
                    grouped_labels.push(names[cluster].clone());
                    cluster_ids.push(cluster as i32);
                }
                None => {
                    grouped_labels.push(self.unclassified_label.clone());
                    cluster_ids.push(UNASSIGNED);
                }
            }
        }

        let clusters = names
            .into_iter()
            .zip(members)
            .enumerate()
            .map(|(id, (name, members))| ClusterSummary {
                id: id as i32,
                name,
                size: members.len(),
                members: distinct(&members),
            })
            .collect();

        log::info!(
            "Clustered {} labels ({} distinct) into {k} groups",
            labels.len(),
            unique.len()
        );
        ClusterOutcome {
            grouped_labels,
            cluster_ids,
            clusters,
            method: ClusteringMethod::Semantic { k },
            embedding: status,
        }
    }

    fn is_sentinel(&self, label: &str) -> bool {
        let label = label.trim();
        label.is_empty() || label == self.unclassified_label
    }

    fn unique_labels(&self, labels: &[String]) -> Vec<String> {
        distinct(
            &labels
                .iter()
                .filter(|label| !self.is_sentinel(label))
                .cloned()
                .collect::<Vec<_>>(),
        )
    }

    fn passthrough(&self, labels: &[String], status: EmbeddingStatus) -> ClusterOutcome {
        ClusterOutcome {
            grouped_labels: labels.to_vec(),
            cluster_ids: (0..labels.len()).map(|i| i as i32).collect(),
            clusters: labels
                .iter()
                .enumerate()
                .map(|(id, label)| ClusterSummary {
                    id: id as i32,
                    name: label.clone(),
                    members: vec![label.clone()],
                    size: 1,
                })
                .collect(),
            method: ClusteringMethod::Passthrough,
            embedding: status,
        }
    }

    /// One cluster per distinct label, numbered in order of first appearance.
    fn identity(
        &self,
        labels: &[String],
        reason: String,
        status: EmbeddingStatus,
    ) -> ClusterOutcome {
        let unique = self.unique_labels(labels);
        let id_of: HashMap<&str, i32> = unique
            .iter()
            .enumerate()
            .map(|(id, label)| (label.as_str(), id as i32))
            .collect();
        let cluster_ids = labels
            .iter()
            .map(|label| id_of.get(label.as_str()).copied().unwrap_or(UNASSIGNED))
            .collect();
        let clusters = unique
            .iter()
            .enumerate()
            .map(|(id, label)| ClusterSummary {
                id: id as i32,
                name: label.clone(),
                members: vec![label.clone()],
                size: labels.iter().filter(|l| *l == label).count(),
            })
            .collect();

        ClusterOutcome {
            grouped_labels: labels.to_vec(),
            cluster_ids,
            clusters,
            method: ClusteringMethod::Identity { reason },
            embedding: status,
        }
    }
}

fn distinct(labels: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    labels
        .iter()
        .filter(|label| seen.insert(label.as_str()))
        .cloned()
        .collect()
}
