use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Embedding failed: {message}")]
    Embedding { message: String },

    #[error("Embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("Judge failed: {message}")]
    Judge { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Invalid safety rule '{category}': {message}")]
    InvalidSafetyRule { category: String, message: String },
}

pub type ScoringResult<T> = Result<T, ScoringError>;
