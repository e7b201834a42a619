use crate::embedder::{embed_with_timeout, TextEmbedder};
use crate::taxonomy::Taxonomy;
use litmap_embeddings::EmbeddingModel;
use std::time::Duration;

/// Nearest-prototype classification by cosine similarity.
pub struct PrototypeClassifier {
    /// `(category index, prototype text)` for every category that declares a prototype.
    prototypes: Vec<(usize, String)>,
    timeout: Duration,
}

impl PrototypeClassifier {
    #[must_use]
    pub fn new(taxonomy: &Taxonomy, timeout: Duration) -> Self {
        let prototypes = taxonomy
            .categories
            .iter()
            .enumerate()
            .filter(|(_, category)| !category.prototype.trim().is_empty())
            .map(|(index, category)| (index, category.prototype.trim().to_string()))
            .collect();
        Self {
            prototypes,
            timeout,
        }
    }

    #[must_use]
    pub fn has_prototypes(&self) -> bool {
        !self.prototypes.is_empty()
    }

    /// Closest category for each corpus.
    ///
    /// Prototypes and corpora go to the embedder as one batch. Ties go to the category declared
    /// first. Errors (including the timeout) are returned for the caller to degrade on.
    pub async fn classify(
        &self,
        embedder: &dyn TextEmbedder,
        corpora: &[String],
    ) -> anyhow::Result<Vec<Option<usize>>> {
        if corpora.is_empty() || self.prototypes.is_empty() {
            return Ok(vec![None; corpora.len()]);
        }

        let batch: Vec<String> = self
            .prototypes
            .iter()
            .map(|(_, text)| text.clone())
            .chain(corpora.iter().cloned())
            .collect();
        let vectors = embed_with_timeout(embedder, &batch, self.timeout).await?;
        let (prototype_vectors, corpus_vectors) = vectors.split_at(self.prototypes.len());

        Ok(corpus_vectors
            .iter()
            .map(|vector| self.nearest(prototype_vectors, vector))
            .collect())
    }

    fn nearest(&self, prototype_vectors: &[Vec<f32>], vector: &[f32]) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for ((index, _), prototype) in self.prototypes.iter().zip(prototype_vectors) {
            let similarity = EmbeddingModel::cosine_similarity(vector, prototype);
            if best.map_or(true, |(_, top)| similarity > top) {
                best = Some((*index, similarity));
            }
        }
        best.map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::fakes::{FailingEmbedder, KeywordEmbedder};
    use crate::taxonomy::fixtures::{category, letters};

    fn texts(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn picks_most_similar_prototype() {
        let embedder = KeywordEmbedder::new(&["first", "second", "third", "fourth", "fifth"]);
        let classifier = PrototypeClassifier::new(&letters(), Duration::from_secs(1));

        let labels = classifier
            .classify(
                &embedder,
                &texts(&["the third one", "fifth place", "first and first"]),
            )
            .await
            .unwrap();
        assert_eq!(labels, vec![Some(2), Some(4), Some(0)]);
    }

    #[tokio::test]
    async fn ties_go_to_declaration_order_and_empty_prototypes_are_skipped() {
        let mut taxonomy = letters();
        taxonomy.categories[0] = category("A", &["alpha"], "");
        let embedder = KeywordEmbedder::new(&["letter"]);
        let classifier = PrototypeClassifier::new(&taxonomy, Duration::from_secs(1));

        let labels = classifier
            .classify(&embedder, &texts(&["unrelated text"]))
            .await
            .unwrap();
        assert_eq!(labels, vec![Some(1)]);
    }

    #[tokio::test]
    async fn single_batch_per_call() {
        let embedder = KeywordEmbedder::new(&["first"]);
        let classifier = PrototypeClassifier::new(&letters(), Duration::from_secs(1));
        classifier
            .classify(&embedder, &texts(&["a", "b", "c"]))
            .await
            .unwrap();
        assert_eq!(
            embedder.calls.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn errors_propagate_to_caller() {
        let classifier = PrototypeClassifier::new(&letters(), Duration::from_secs(1));
        assert!(classifier
            .classify(&FailingEmbedder, &texts(&["x"]))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn without_prototypes_nothing_is_embedded() {
        let mut taxonomy = letters();
        for category in &mut taxonomy.categories {
            category.prototype.clear();
        }
        let classifier = PrototypeClassifier::new(&taxonomy, Duration::from_secs(1));
        assert!(!classifier.has_prototypes());
        let labels = classifier
            .classify(&FailingEmbedder, &texts(&["x", "y"]))
            .await
            .unwrap();
        assert_eq!(labels, vec![None, None]);
    }
}
