use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClassifierError>;

/// Errors raised while building an engine. Classification itself never fails.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Profile error: {0}")]
    Profile(String),

    #[error("Invalid taxonomy '{taxonomy}': {reason}")]
    Taxonomy { taxonomy: String, reason: String },

    #[error("Invalid keyword pattern '{keyword}': {source}")]
    Pattern {
        keyword: String,
        #[source]
        source: regex::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
