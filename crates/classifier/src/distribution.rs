use crate::cluster::{ClusterOutcome, ClusteringMethod};
use crate::embedder::EmbeddingStatus;
use crate::item::Item;
use serde::Serialize;

const SAMPLE_TITLES: usize = 3;

/// Share of items in one grouped label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupShare {
    pub name: String,
    pub count: usize,
    /// Percentage of all items, rounded to one decimal.
    pub percentage: f64,
    pub sample_titles: Vec<String>,
}

/// How studies distribute over grouped research approaches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub total_items: usize,
    pub unique_groups: usize,
    pub clustering_applied: bool,
    /// Largest group first; equal counts keep first-appearance order.
    pub groups: Vec<GroupShare>,
    pub method: ClusteringMethod,
    pub embedding: EmbeddingStatus,
}

impl DistributionSummary {
    #[must_use]
    pub fn from_clusters(items: &[Item], clusters: ClusterOutcome) -> Self {
        let total_items = items.len();
        let mut groups: Vec<GroupShare> = Vec::new();
        for (index, name) in clusters.grouped_labels.iter().enumerate() {
            let position = match groups.iter().position(|g| &g.name == name) {
                Some(position) => position,
                None => {
                    groups.push(GroupShare {
                        name: name.clone(),
                        count: 0,
                        percentage: 0.0,
                        sample_titles: vec![],
                    });
                    groups.len() - 1
                }
            };
            let group = &mut groups[position];
            group.count += 1;
            if group.sample_titles.len() < SAMPLE_TITLES {
                group.sample_titles.push(title_of(items.get(index), index));
            }
        }

        for group in &mut groups {
            group.percentage = percentage(group.count, total_items);
        }
        groups.sort_by(|a, b| b.count.cmp(&a.count));

        Self {
            total_items,
            unique_groups: groups.len(),
            clustering_applied: clusters.is_semantic(),
            groups,
            method: clusters.method,
            embedding: clusters.embedding,
        }
    }
}

fn title_of(item: Option<&Item>, index: usize) -> String {
    item.and_then(|item| item.title.as_deref())
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map_or_else(|| format!("Article {}", index + 1), ToString::to_string)
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 * 1000.0 / total as f64).round() / 10.0
}
