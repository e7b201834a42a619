use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbeddingError>;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embeddings disabled: {0}")]
    Disabled(String),

    #[error("Model load error: {0}")]
    ModelLoad(String),

    #[error("Models manifest error: {0}")]
    Manifest(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
}
