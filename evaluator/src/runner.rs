//! Run driver.
//!
//! Sequences one evaluation run end to end: resolve the page state, log in
//! if needed, walk the suite strictly in order (the chat session is
//! stateful, so exactly one prompt is ever in flight), capture and score
//! each answer, aggregate, and hand the results to the persistence
//! collaborators. Navigation and authentication failures abort the run;
//! per-item capture or scoring failures degrade that item only.

use crate::config::EvalConfig;
use crate::error::{RunError, RunResult};
use crate::navigation::{detect_state, PageState};
use crate::report;
use crate::session::{login, ChatSurface, Credentials};
use crate::sink::SinkClient;
use crate::stabilizer::{await_stable_answer, StabilizedAnswer, StabilizerSettings};
use crate::suite::SuiteItem;
use scoring::{
    aggregate, compute_metrics, CorrectnessJudge, ItemScores, RunAggregate, SharedEmbedder,
    SafetyRuleSet,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// One completed evaluation record. Immutable once created; appended to
/// the run's ordered result sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerItemResult {
    pub run_id: String,
    pub item_id: String,
    pub config_name: String,
    pub model_answer: String,
    /// The capture deadline expired before the answer held still.
    pub truncated: bool,
    #[serde(flatten)]
    pub scores: ItemScores,
    pub tags: Vec<String>,
}

/// Outcome of one suite item: scored, or failed with an error marker in
/// place of scores. Failed items keep the aggregate honest instead of
/// hiding behind a zero score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Scored(PerItemResult),
    Failed { item_id: String, error: String },
}

impl ItemOutcome {
    pub fn item_id(&self) -> &str {
        match self {
            ItemOutcome::Scored(result) => &result.item_id,
            ItemOutcome::Failed { item_id, .. } => item_id,
        }
    }
}

/// Everything a completed run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: String,
    pub outcomes: Vec<ItemOutcome>,
    pub aggregate: RunAggregate,
    pub artifact_path: PathBuf,
    pub report_path: PathBuf,
}

pub struct Runner {
    config: EvalConfig,
    config_name: String,
    embedder: SharedEmbedder,
    judge: Option<Arc<dyn CorrectnessJudge>>,
    safety_rules: SafetyRuleSet,
    sink: Option<SinkClient>,
}

impl Runner {
    pub fn new(config: EvalConfig, config_name: impl Into<String>, embedder: SharedEmbedder) -> RunResult<Self> {
        let safety_rules = match &config.safety_rules {
            Some(rules) => SafetyRuleSet::from_rules(rules)?,
            None => SafetyRuleSet::default(),
        };

        let sink = config
            .sink
            .as_ref()
            .map(SinkClient::new)
            .transpose()
            .unwrap_or_else(|e| {
                warn!("sink unavailable, continuing without it: {}", e);
                None
            });

        Ok(Self {
            config,
            config_name: config_name.into(),
            embedder,
            judge: None,
            safety_rules,
            sink,
        })
    }

    pub fn with_judge(mut self, judge: Arc<dyn CorrectnessJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    /// Drive a full run over an already-navigated surface.
    pub async fn run(
        &self,
        surface: &dyn ChatSurface,
        items: &[SuiteItem],
        suite_name: &str,
    ) -> RunResult<RunOutcome> {
        let run_id = new_run_id(&self.config_name);
        info!(run_id, suite_name, n_items = items.len(), "starting run");

        // Resolve page state; ambiguity here is fatal, continuing would
        // risk typing credentials into the wrong form.
        let state = detect_state(surface, &self.config.selectors, self.config.timeouts.probe())
            .await
            .map_err(RunError::Session)?;

        if state == PageState::Login {
            let credentials = Credentials::from_env().map_err(RunError::Session)?;
            login(surface, &self.config, &credentials)
                .await
                .map_err(RunError::Session)?;
        }

        let mut outcomes: Vec<ItemOutcome> = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            let outcome = self.run_item(surface, item, index == 0, &run_id).await;
            if let ItemOutcome::Failed { item_id, error } = &outcome {
                warn!(item_id, error, "item failed, continuing run");
            }
            outcomes.push(outcome);
        }

        let scored: Vec<ItemScores> = outcomes
            .iter()
            .filter_map(|o| match o {
                ItemOutcome::Scored(result) => Some(result.scores.clone()),
                ItemOutcome::Failed { .. } => None,
            })
            .collect();
        let aggregate = aggregate(&scored);
        info!(
            run_id,
            n_scored = aggregate.n_items,
            n_failed = outcomes.len() - aggregate.n_items,
            correctness_avg = aggregate.correctness_avg,
            "run complete"
        );

        // Local artifacts are written before any sink traffic so no
        // evaluation work is lost to an unreachable sink.
        let artifact_path = self.write_artifact(&run_id, &outcomes)?;
        let report_path = report::write_report(
            &self.config.reports.output_dir,
            &run_id,
            suite_name,
            &self.config_name,
            &aggregate,
            &outcomes,
        )?;

        if let Some(sink) = &self.sink {
            if let Err(e) = sink
                .push_run(&run_id, &self.config_name, suite_name, &aggregate, &outcomes)
                .await
            {
                error!("sink push failed (evaluation data kept locally): {}", e);
            }
        }

        Ok(RunOutcome {
            run_id,
            outcomes,
            aggregate,
            artifact_path,
            report_path,
        })
    }

    /// Submit one prompt, await its stabilized answer, and score it.
    /// Latency covers submission through confirmed-stable capture only.
    async fn run_item(
        &self,
        surface: &dyn ChatSurface,
        item: &SuiteItem,
        first_prompt: bool,
        run_id: &str,
    ) -> ItemOutcome {
        let chat = &self.config.selectors.chat_page;
        let input_locator = if first_prompt {
            &chat.prompt_input.locator
        } else {
            &chat.prompt_input_followup.locator
        };

        let started = Instant::now();

        let captured: Result<StabilizedAnswer, RunError> = async {
            surface.fill(input_locator, &item.question).await?;
            surface.click(&chat.submit_button.locator).await?;

            let settings = StabilizerSettings {
                poll_interval: self.config.timeouts.poll(),
                stable_reads: self.config.timeouts.stable_reads,
                timeout: self.config.timeouts.stabilize(),
            };
            Ok(await_stable_answer(surface, &chat.answer_container.locator, &settings).await?)
        }
        .await;

        let answer = match captured {
            Ok(answer) => answer,
            Err(e) => {
                return ItemOutcome::Failed {
                    item_id: item.id.clone(),
                    error: e.to_string(),
                }
            }
        };

        let latency_ms = started.elapsed().as_millis() as u64;

        let scores = compute_metrics(
            &item.question,
            &item.gt_answer,
            &answer.text,
            latency_ms,
            &self.config.metrics,
            self.embedder.as_ref(),
            self.judge.as_deref(),
            &self.safety_rules,
        )
        .await;

        match scores {
            Ok(scores) => ItemOutcome::Scored(PerItemResult {
                run_id: run_id.to_string(),
                item_id: item.id.clone(),
                config_name: self.config_name.clone(),
                model_answer: answer.text,
                truncated: answer.truncated,
                scores,
                tags: item.tags.clone(),
            }),
            Err(e) => ItemOutcome::Failed {
                item_id: item.id.clone(),
                error: e.to_string(),
            },
        }
    }

    /// Write the full ordered outcome sequence as JSONL, one record per
    /// line.
    fn write_artifact(&self, run_id: &str, outcomes: &[ItemOutcome]) -> RunResult<PathBuf> {
        let dir = PathBuf::from(&self.config.reports.output_dir);
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{run_id}.jsonl"));
        let mut lines = String::new();
        for outcome in outcomes {
            lines.push_str(&serde_json::to_string(outcome)?);
            lines.push('\n');
        }
        std::fs::write(&path, lines)?;

        info!(path = %path.display(), "wrote run artifact");
        Ok(path)
    }
}

fn new_run_id(config_name: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!("{config_name}_{timestamp}_{}", &nonce[..8])
}
