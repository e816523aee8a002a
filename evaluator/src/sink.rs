//! External tabular sink.
//!
//! Pushes run results to a generic HTTP table service as three logical
//! tables: Runs (one row per run), PerItem (one row per item), and
//! TopFailures (worst rows per run). Each table has a fixed header schema;
//! the header row is read and (re)written before any data rows are
//! appended. Sink failures never abort evaluation: artifacts are already
//! on disk by the time this client runs.

use crate::config::SinkConfig;
use crate::error::{SinkError, SinkResult};
use crate::report::worst_items;
use crate::runner::ItemOutcome;
use scoring::RunAggregate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const RUNS_HEADER: &[&str] = &[
    "run_id",
    "config",
    "suite",
    "n_items",
    "correctness_avg",
    "relevance_avg",
    "safety_violations",
    "p50_ms",
    "p95_ms",
];

pub const PER_ITEM_HEADER: &[&str] = &[
    "run_id",
    "item_id",
    "config",
    "status",
    "correctness",
    "correct_pass",
    "relevance",
    "safety_flags",
    "safety_violation_count",
    "latency_ms",
    "truncated",
    "tags",
];

pub const TOP_FAILURES_HEADER: &[&str] = &["run_id", "item_id", "correctness", "snippet"];

#[derive(Debug, Serialize, Deserialize)]
struct TableRows {
    rows: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct HeaderResponse {
    #[serde(default)]
    header: Vec<String>,
}

pub struct SinkClient {
    client: reqwest::Client,
    config: SinkConfig,
}

impl SinkClient {
    pub fn new(config: &SinkConfig) -> SinkResult<Self> {
        if config.endpoint.is_empty() {
            return Err(SinkError::NotConfigured);
        }

        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(15));
        if let Ok(token) = std::env::var("SINK_TOKEN") {
            let mut headers = reqwest::header::HeaderMap::new();
            if let Ok(value) =
                reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
            {
                headers.insert(reqwest::header::AUTHORIZATION, value);
            }
            builder = builder.default_headers(headers);
        }

        let client = builder.build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Push the whole run: header checks first, then row appends, each
    /// retried once before the error is surfaced to the caller.
    pub async fn push_run(
        &self,
        run_id: &str,
        config_name: &str,
        suite_name: &str,
        aggregate: &RunAggregate,
        outcomes: &[ItemOutcome],
    ) -> SinkResult<()> {
        let runs_table = self.config.runs_table.clone();
        let per_item_table = self.config.per_item_table.clone();
        let top_failures_table = self.config.top_failures_table.clone();

        self.ensure_header(&runs_table, RUNS_HEADER).await?;
        self.ensure_header(&per_item_table, PER_ITEM_HEADER).await?;
        self.ensure_header(&top_failures_table, TOP_FAILURES_HEADER)
            .await?;

        let fmt_ms = |value: Option<u64>| value.map(|v| v.to_string()).unwrap_or_default();
        self.append_rows(
            &runs_table,
            vec![vec![
                run_id.to_string(),
                config_name.to_string(),
                suite_name.to_string(),
                aggregate.n_items.to_string(),
                format!("{:.4}", aggregate.correctness_avg),
                format!("{:.4}", aggregate.relevance_avg),
                aggregate.safety_violations.to_string(),
                fmt_ms(aggregate.p50_ms),
                fmt_ms(aggregate.p95_ms),
            ]],
        )
        .await?;

        let per_item_rows: Vec<Vec<String>> =
            outcomes.iter().map(|o| per_item_row(run_id, config_name, o)).collect();
        self.append_rows(&per_item_table, per_item_rows).await?;

        let failure_rows: Vec<Vec<String>> = worst_items(outcomes)
            .into_iter()
            .map(|item| {
                vec![
                    run_id.to_string(),
                    item.item_id.clone(),
                    format!("{:.4}", item.scores.correctness),
                    item.model_answer.chars().take(120).collect(),
                ]
            })
            .collect();
        self.append_rows(&top_failures_table, failure_rows).await?;

        info!(run_id, "pushed run to tabular sink");
        Ok(())
    }

    /// Read the table's header row; rewrite it if missing or mismatched.
    async fn ensure_header(&self, table: &str, expected: &[&str]) -> SinkResult<()> {
        let url = format!("{}/tables/{}/header", self.config.endpoint, table);

        let current: Vec<String> = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response
                .json::<HeaderResponse>()
                .await
                .map(|h| h.header)
                .unwrap_or_default(),
            _ => Vec::new(),
        };

        if current.iter().map(String::as_str).eq(expected.iter().copied()) {
            debug!(table, "header matches");
            return Ok(());
        }

        warn!(table, "header missing or mismatched, rewriting");
        let body = serde_json::json!({ "header": expected });
        let response = self
            .with_retry(|| self.client.put(&url).json(&body).send())
            .await?;
        Self::check(response).await
    }

    async fn append_rows(&self, table: &str, rows: Vec<Vec<String>>) -> SinkResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let url = format!("{}/tables/{}/rows", self.config.endpoint, table);
        let body = TableRows { rows };
        let response = self
            .with_retry(|| self.client.post(&url).json(&body).send())
            .await?;
        Self::check(response).await
    }

    async fn with_retry<F, Fut>(&self, request: F) -> SinkResult<reqwest::Response>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        match request().await {
            Ok(response) => Ok(response),
            Err(first) => {
                warn!("sink request failed, retrying once: {}", first);
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(request().await?)
            }
        }
    }

    async fn check(response: reqwest::Response) -> SinkResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(SinkError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

fn per_item_row(run_id: &str, config_name: &str, outcome: &ItemOutcome) -> Vec<String> {
    match outcome {
        ItemOutcome::Scored(result) => vec![
            run_id.to_string(),
            result.item_id.clone(),
            config_name.to_string(),
            "scored".to_string(),
            format!("{:.4}", result.scores.correctness),
            result.scores.correct_pass.to_string(),
            format!("{:.1}", result.scores.relevance),
            result
                .scores
                .safety_flags
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(";"),
            result.scores.safety_violation_count.to_string(),
            result.scores.latency_ms.to_string(),
            result.truncated.to_string(),
            result.tags.join(";"),
        ],
        ItemOutcome::Failed { item_id, error } => vec![
            run_id.to_string(),
            item_id.clone(),
            config_name.to_string(),
            format!("failed: {error}"),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::PerItemResult;
    use scoring::ItemScores;
    use std::collections::BTreeSet;

    #[test]
    fn test_per_item_row_scored() {
        let mut flags = BTreeSet::new();
        flags.insert("hate".to_string());

        let outcome = ItemOutcome::Scored(PerItemResult {
            run_id: "r".to_string(),
            item_id: "q1".to_string(),
            config_name: "prod".to_string(),
            model_answer: "text".to_string(),
            truncated: true,
            scores: ItemScores {
                correctness: 0.8123,
                correct_pass: true,
                relevance: 1.0,
                safety_flags: flags,
                safety_violation_count: 1,
                latency_ms: 900,
            },
            tags: vec!["geo".to_string(), "core".to_string()],
        });

        let row = per_item_row("run1", "prod", &outcome);
        assert_eq!(row.len(), PER_ITEM_HEADER.len());
        assert_eq!(row[0], "run1");
        assert_eq!(row[3], "scored");
        assert_eq!(row[4], "0.8123");
        assert_eq!(row[7], "hate");
        assert_eq!(row[10], "true");
        assert_eq!(row[11], "geo;core");
    }

    #[test]
    fn test_per_item_row_failed_matches_header_width() {
        let outcome = ItemOutcome::Failed {
            item_id: "q2".to_string(),
            error: "timeout".to_string(),
        };

        let row = per_item_row("run1", "prod", &outcome);
        assert_eq!(row.len(), PER_ITEM_HEADER.len());
        assert_eq!(row[3], "failed: timeout");
    }

    #[test]
    fn test_missing_endpoint_not_configured() {
        let config = SinkConfig {
            endpoint: String::new(),
            runs_table: "Runs".to_string(),
            per_item_table: "PerItem".to_string(),
            top_failures_table: "TopFailures".to_string(),
        };
        assert!(matches!(
            SinkClient::new(&config),
            Err(SinkError::NotConfigured)
        ));
    }
}
