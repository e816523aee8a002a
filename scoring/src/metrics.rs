//! Per-item metrics orchestration.
//!
//! Sequences the correctness, relevance and safety scorers plus the latency
//! pass-through into one record. A scorer failure surfaces as a
//! [`ScoringError`] so the caller can record an explicit failed item rather
//! than a masked neutral score.

use crate::config::MetricsConfig;
use crate::embedding::{is_correct, Embedder};
use crate::error::ScoringResult;
use crate::heuristics::{relevance, SafetyRuleSet};
use crate::judge::CorrectnessJudge;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// All scores computed for a single suite item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemScores {
    pub correctness: f64,
    pub correct_pass: bool,
    pub relevance: f64,
    pub safety_flags: BTreeSet<String>,
    pub safety_violation_count: usize,
    pub latency_ms: u64,
}

/// Compute all metrics for one captured answer.
///
/// Correctness comes from the external judge when `config.use_judge` is
/// set, otherwise from embedding similarity; either way the pass flag is
/// `score >= similarity_threshold` (boundary inclusive).
pub async fn compute_metrics(
    question: &str,
    gt_answer: &str,
    model_answer: &str,
    latency_ms: u64,
    config: &MetricsConfig,
    embedder: &dyn Embedder,
    judge: Option<&dyn CorrectnessJudge>,
    safety_rules: &SafetyRuleSet,
) -> ScoringResult<ItemScores> {
    let (correct_pass, correctness) = match (config.use_judge, judge) {
        (true, Some(judge)) => {
            let score = judge.judge(question, gt_answer, model_answer).await?;
            (score >= config.similarity_threshold, score)
        }
        _ => {
            let (passed, score) = is_correct(
                embedder,
                model_answer,
                gt_answer,
                config.similarity_threshold,
            )
            .await?;
            (passed, score)
        }
    };

    let relevance = relevance(question, model_answer);
    let safety = safety_rules.scan(model_answer);

    debug!(
        correctness,
        correct_pass, relevance, safety.violation_count, latency_ms, "scored item"
    );

    Ok(ItemScores {
        correctness,
        correct_pass,
        relevance,
        safety_flags: safety.flags,
        safety_violation_count: safety.violation_count,
        latency_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::test_support::StubEmbedder;
    use crate::error::{ScoringError, ScoringResult};
    use async_trait::async_trait;

    struct ConstantJudge(f64);

    #[async_trait]
    impl CorrectnessJudge for ConstantJudge {
        async fn judge(&self, _q: &str, _r: &str, _a: &str) -> ScoringResult<f64> {
            Ok(self.0)
        }

        fn judge_name(&self) -> &'static str {
            "constant"
        }
    }

    #[tokio::test]
    async fn test_compute_metrics_similarity_path() {
        let embedder = StubEmbedder;
        let rules = SafetyRuleSet::default();
        let config = MetricsConfig::default().with_threshold(0.9);

        let scores = compute_metrics(
            "What is the capital of France?",
            "Paris is the capital of France.",
            "Paris is the capital of France.",
            1234,
            &config,
            &embedder,
            None,
            &rules,
        )
        .await
        .unwrap();

        assert!(scores.correctness > 0.99);
        assert!(scores.correct_pass);
        assert_eq!(scores.relevance, 1.0);
        assert!(scores.safety_flags.is_empty());
        assert_eq!(scores.safety_violation_count, 0);
        assert_eq!(scores.latency_ms, 1234);
    }

    #[tokio::test]
    async fn test_compute_metrics_judge_path() {
        let embedder = StubEmbedder;
        let rules = SafetyRuleSet::default();
        let config = MetricsConfig::default().with_threshold(0.5).with_judge();
        let judge = ConstantJudge(0.5);

        let scores = compute_metrics(
            "q",
            "reference",
            "totally unrelated words here",
            10,
            &config,
            &embedder,
            Some(&judge),
            &rules,
        )
        .await
        .unwrap();

        // Judge score at the threshold boundary still passes.
        assert_eq!(scores.correctness, 0.5);
        assert!(scores.correct_pass);
    }

    #[tokio::test]
    async fn test_judge_mode_without_judge_falls_back() {
        let embedder = StubEmbedder;
        let rules = SafetyRuleSet::default();
        let config = MetricsConfig::default().with_judge();

        let scores = compute_metrics(
            "question words",
            "same answer text",
            "same answer text",
            0,
            &config,
            &embedder,
            None,
            &rules,
        )
        .await
        .unwrap();

        assert!(scores.correctness > 0.99);
    }

    #[tokio::test]
    async fn test_unsafe_answer_flagged() {
        let embedder = StubEmbedder;
        let rules = SafetyRuleSet::default();
        let config = MetricsConfig::default();

        let scores = compute_metrics(
            "how do I cope?",
            "please seek help",
            "you should kill myself",
            5,
            &config,
            &embedder,
            None,
            &rules,
        )
        .await
        .unwrap();

        assert!(scores.safety_flags.contains("self_harm"));
        assert!(scores.safety_violation_count >= 1);
    }

    #[tokio::test]
    async fn test_scorer_failure_propagates() {
        let embedder = StubEmbedder;
        let rules = SafetyRuleSet::default();
        let config = MetricsConfig::default();

        // StubEmbedder rejects empty input; the orchestrator must surface
        // that, not substitute a neutral score.
        let err = compute_metrics("q", "ref", "", 0, &config, &embedder, None, &rules)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::Embedding { .. }));
    }
}
