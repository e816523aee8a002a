pub mod aggregate;
pub mod config;
pub mod embedding;
pub mod error;
pub mod heuristics;
pub mod judge;
pub mod metrics;

pub use aggregate::{aggregate, percentile, RunAggregate};
pub use config::{EmbeddingConfig, MetricsConfig};
pub use embedding::{
    cosine_similarity, is_correct, semantic_similarity, Embedder, OllamaEmbedder, SharedEmbedder,
};
pub use error::{ScoringError, ScoringResult};
pub use heuristics::{relevance, SafetyReport, SafetyRule, SafetyRuleSet};
pub use judge::CorrectnessJudge;
pub use metrics::{compute_metrics, ItemScores};

pub mod prelude {
    pub use crate::aggregate::*;
    pub use crate::config::*;
    pub use crate::embedding::*;
    pub use crate::error::*;
    pub use crate::heuristics::*;
    pub use crate::judge::*;
    pub use crate::metrics::*;
}
