//! # Litmap Classifier
//!
//! Batch labelling of literature-mapping articles.
//!
//! ```text
//! items ──> TextAggregator ──> PatternScorer ──(no keyword signal)──> PrototypeClassifier
//!                                   │                                       │
//!                                   └──────────────> raw labels <───────────┘
//!                                                        │
//!                                              CoverageGuarantor ──> final labels
//!
//! approach labels ──> SemanticClusterer (k-means) ──> ClusterNamer ──> grouped labels + ids
//! ```
//!
//! Classification never fails. Missing embeddings, timeouts and clustering errors are reported
//! through [`EmbeddingStatus`], [`CoverageReport`] and [`ClusteringMethod`].
//!
//! ```no_run
//! use litmap_classifier::{EngineConfig, Item, ItemField, MappingEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = MappingEngine::with_shared_capability(EngineConfig::builtin()?)?;
//!     let items = vec![Item::new(1).with(ItemField::Title, "contact tracing app proximity exposure")];
//!     let outcome = engine.classify(&items).await;
//!     println!("{:?} ({:?})", outcome.labels, outcome.coverage.status);
//!     Ok(())
//! }
//! ```

mod aggregate;
mod cluster;
mod config;
mod coverage;
mod distribution;
mod embedder;
mod engine;
mod error;
mod item;
mod kmeans;
mod naming;
mod pattern;
mod semantic;
mod strategy;
mod taxonomy;

pub use aggregate::{Corpus, TextAggregator};
pub use cluster::{ClusterOutcome, ClusterSummary, ClusteringMethod, SemanticClusterer, UNASSIGNED};
pub use config::{ClusteringConfig, EmbeddingConfig, EngineConfig};
pub use coverage::{
    CoverageGuarantor, CoverageReport, CoverageStatus, ReassignReason, Reassignment,
};
pub use distribution::{DistributionSummary, GroupShare};
pub use embedder::{EmbeddingCapability, EmbeddingStatus, TextEmbedder};
pub use engine::{ApproachOutcome, ClassificationOutcome, MappingEngine};
pub use error::{ClassifierError, Result};
pub use item::{Item, ItemField, ItemId};
pub use kmeans::KMeansError;
pub use naming::ClusterNamer;
pub use pattern::PatternScorer;
pub use semantic::PrototypeClassifier;
pub use strategy::{Classifier, ClassifierStrategy, LabelSource, Labeling};
pub use taxonomy::{Category, Label, Taxonomy};
