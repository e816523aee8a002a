use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for the embedding backend (an Ollama instance
/// serving an embedding model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_embed_timeout", with = "duration_secs")]
    pub timeout: Duration,
}

fn default_embed_timeout() -> Duration {
    Duration::from_secs(30)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            timeout: default_embed_timeout(),
        }
    }
}

impl EmbeddingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("Base URL cannot be empty".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("Base URL must start with http:// or https://".to_string());
        }

        if self.model.is_empty() {
            return Err("Embedding model cannot be empty".to_string());
        }

        if self.timeout.is_zero() {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Thresholds governing how per-item scores are derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Minimum cosine similarity for an answer to count as correct.
    pub similarity_threshold: f64,
    /// Route correctness through an external judge instead of the
    /// similarity scorer.
    #[serde(default)]
    pub use_judge: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.78,
            use_judge: false,
        }
    }
}

impl MetricsConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_judge(mut self) -> Self {
        self.use_judge = true;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err("Similarity threshold must be between 0.0 and 1.0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_embedding_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.model, "nomic-embed-text");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_embedding_config_builder() {
        let config = EmbeddingConfig::new()
            .with_base_url("https://embed.example.com")
            .with_model("all-minilm")
            .with_timeout(Duration::from_secs(60));

        assert_eq!(config.base_url, "https://embed.example.com");
        assert_eq!(config.model, "all-minilm");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_embedding_config_validation() {
        let mut config = EmbeddingConfig::default();

        config.base_url = "".to_string();
        assert!(config.validate().is_err());

        config.base_url = "not-a-url".to_string();
        assert!(config.validate().is_err());

        config.base_url = "http://localhost:11434".to_string();
        config.model = "".to_string();
        assert!(config.validate().is_err());

        config.model = "nomic-embed-text".to_string();
        config.timeout = Duration::from_secs(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_config_validation() {
        let config = MetricsConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.use_judge);

        let config = MetricsConfig::default().with_threshold(1.5);
        assert!(config.validate().is_err());

        let config = MetricsConfig::default().with_threshold(-0.1);
        assert!(config.validate().is_err());

        let config = MetricsConfig::default().with_threshold(1.0).with_judge();
        assert!(config.validate().is_ok());
        assert!(config.use_judge);
    }

    #[test]
    fn test_embedding_config_serialization() {
        let config = EmbeddingConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: EmbeddingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.base_url, deserialized.base_url);
        assert_eq!(config.timeout, deserialized.timeout);
    }
}
