//! Environment configuration.
//!
//! One YAML document per target environment (`configs/<name>.yml`) carrying
//! the base URL, the UI locator table, timeouts and delays, metric
//! thresholds, the embedding backend, and optional safety-rule and sink
//! overrides. The locator table is resolved into typed structs at load
//! time and validated up front, so a missing selector fails the run before
//! any browser work starts.

use crate::error::ConfigError;
use scoring::{EmbeddingConfig, MetricsConfig, SafetyRule};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// A single UI element locator (CSS selector).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Locator {
    pub locator: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeSelectors {
    pub start_chat: Locator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginSelectors {
    pub username_field: Locator,
    pub password_field: Locator,
    pub submit_button: Locator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSelectors {
    pub prompt_input: Locator,
    pub prompt_input_followup: Locator,
    pub submit_button: Locator,
    pub answer_container: Locator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selectors {
    pub home_page: HomeSelectors,
    pub login: LoginSelectors,
    pub chat_page: ChatSelectors,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    /// Per-probe timeout for the navigation state cascade.
    #[serde(default = "default_probe_ms")]
    pub probe_ms: u64,
    /// Overall deadline for answer stabilization.
    #[serde(default = "default_stabilize_secs")]
    pub stabilize_secs: u64,
    /// Poll interval while waiting for an answer to stabilize.
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    /// Consecutive identical reads required to call an answer stable.
    #[serde(default = "default_stable_reads")]
    pub stable_reads: u32,
    /// Page-load / element-wait timeout for ordinary interactions.
    #[serde(default = "default_page_ms")]
    pub page_ms: u64,
}

fn default_probe_ms() -> u64 {
    3000
}
fn default_stabilize_secs() -> u64 {
    60
}
fn default_poll_ms() -> u64 {
    500
}
fn default_stable_reads() -> u32 {
    3
}
fn default_page_ms() -> u64 {
    5000
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            probe_ms: default_probe_ms(),
            stabilize_secs: default_stabilize_secs(),
            poll_ms: default_poll_ms(),
            stable_reads: default_stable_reads(),
            page_ms: default_page_ms(),
        }
    }
}

impl Timeouts {
    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_ms)
    }

    pub fn stabilize(&self) -> Duration {
        Duration::from_secs(self.stabilize_secs)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn page(&self) -> Duration {
        Duration::from_millis(self.page_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delays {
    /// Settle time after submitting the login form, before re-detection.
    #[serde(default = "default_after_login_ms")]
    pub after_login_ms: u64,
}

fn default_after_login_ms() -> u64 {
    2000
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            after_login_ms: default_after_login_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reports {
    pub output_dir: String,
}

impl Default for Reports {
    fn default() -> Self {
        Self {
            output_dir: "./reports".to_string(),
        }
    }
}

/// External tabular sink endpoint. Optional; when absent the run only
/// writes local artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub endpoint: String,
    #[serde(default = "default_runs_table")]
    pub runs_table: String,
    #[serde(default = "default_per_item_table")]
    pub per_item_table: String,
    #[serde(default = "default_top_failures_table")]
    pub top_failures_table: String,
}

fn default_runs_table() -> String {
    "Runs".to_string()
}
fn default_per_item_table() -> String {
    "PerItem".to_string()
}
fn default_top_failures_table() -> String {
    "TopFailures".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    pub base_url: String,
    pub selectors: Selectors,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub delays: Delays,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub reports: Reports,
    /// Replaces the built-in safety pattern table when present.
    #[serde(default)]
    pub safety_rules: Option<Vec<SafetyRule>>,
    #[serde(default)]
    pub sink: Option<SinkConfig>,
}

impl EvalConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config: EvalConfig =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Fail fast on missing or malformed keys, naming the offending key
    /// rather than surfacing a deep lookup failure mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(invalid("base_url", "cannot be empty"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(invalid("base_url", "must start with http:// or https://"));
        }

        let locators = [
            ("selectors.home_page.start_chat", &self.selectors.home_page.start_chat),
            ("selectors.login.username_field", &self.selectors.login.username_field),
            ("selectors.login.password_field", &self.selectors.login.password_field),
            ("selectors.login.submit_button", &self.selectors.login.submit_button),
            ("selectors.chat_page.prompt_input", &self.selectors.chat_page.prompt_input),
            (
                "selectors.chat_page.prompt_input_followup",
                &self.selectors.chat_page.prompt_input_followup,
            ),
            ("selectors.chat_page.submit_button", &self.selectors.chat_page.submit_button),
            (
                "selectors.chat_page.answer_container",
                &self.selectors.chat_page.answer_container,
            ),
        ];
        for (key, locator) in locators {
            if locator.locator.trim().is_empty() {
                return Err(invalid(key, "locator cannot be empty"));
            }
        }

        if self.timeouts.poll_ms == 0 {
            return Err(invalid("timeouts.poll_ms", "must be greater than 0"));
        }
        if self.timeouts.stable_reads == 0 {
            return Err(invalid("timeouts.stable_reads", "must be greater than 0"));
        }
        if self.timeouts.stabilize_secs == 0 {
            return Err(invalid("timeouts.stabilize_secs", "must be greater than 0"));
        }

        self.metrics
            .validate()
            .map_err(|message| invalid("metrics", &message))?;
        self.embedding
            .validate()
            .map_err(|message| invalid("embedding", &message))?;

        if self.reports.output_dir.is_empty() {
            return Err(invalid("reports.output_dir", "cannot be empty"));
        }

        if let Some(sink) = &self.sink {
            if sink.endpoint.is_empty() {
                return Err(invalid("sink.endpoint", "cannot be empty"));
            }
        }

        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn sample_config() -> EvalConfig {
        let yaml = r#"
base_url: "https://chat.example.com"
selectors:
  home_page:
    start_chat: { locator: "a.start-chat" }
  login:
    username_field: { locator: "input[name='username']" }
    password_field: { locator: "input[name='password']" }
    submit_button: { locator: "button[type='submit']" }
  chat_page:
    prompt_input: { locator: "textarea.prompt" }
    prompt_input_followup: { locator: "textarea.prompt-followup" }
    submit_button: { locator: "button.send" }
    answer_container: { locator: "div.ai-message-container div.markdown-body" }
timeouts:
  probe_ms: 3000
  stabilize_secs: 60
  poll_ms: 500
  stable_reads: 3
metrics:
  similarity_threshold: 0.78
"#;
        serde_yaml::from_str(yaml).unwrap()
    }
}
