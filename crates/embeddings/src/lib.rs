//! # Litmap Embeddings
//!
//! Sentence embeddings for the literature-mapping engine.
//!
//! ```text
//! LITMAP_EMBEDDING_MODE
//!     ├── fast ──> models/manifest.json ──> ONNX Runtime session (loaded once per process)
//!     │                                        └─> mean pooling + L2 normalisation
//!     ├── stub ──> deterministic hashed unit vectors (tests, dry runs)
//!     └── off  ──> EmbeddingError::Disabled
//! ```
//!
//! ```no_run
//! use litmap_embeddings::EmbeddingModel;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let model = EmbeddingModel::from_env()?;
//!     let texts = vec!["contact tracing app".to_string(), "symptom checker".to_string()];
//!     let vectors = model.embed_batch(&texts).await?;
//!     println!("{:.3}", EmbeddingModel::cosine_similarity(&vectors[0], &vectors[1]));
//!     Ok(())
//! }
//! ```

mod cache;
mod embeddings;
mod error;
mod manifest;
mod paths;

pub use embeddings::{EmbeddingMode, EmbeddingModel, EMBEDDING_MODE_ENV};
pub use error::{EmbeddingError, Result};
pub use manifest::{ModelId, DEFAULT_MODEL_ID, EMBEDDING_MODEL_ENV};
pub use paths::{model_dir, MODEL_DIR_ENV};
