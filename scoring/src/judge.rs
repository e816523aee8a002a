//! External correctness judge hook.
//!
//! When `MetricsConfig::use_judge` is set, the metrics orchestrator obtains
//! the correctness score from a [`CorrectnessJudge`] instead of the
//! similarity scorer. The `(correctness, correct_pass)` output contract is
//! identical either way; callers never need to know which path ran.

use crate::error::ScoringResult;
use async_trait::async_trait;

#[async_trait]
pub trait CorrectnessJudge: Send + Sync {
    /// Score a model answer against the reference for a question.
    /// Returns a value in [0, 1].
    async fn judge(
        &self,
        question: &str,
        reference: &str,
        model_answer: &str,
    ) -> ScoringResult<f64>;

    fn judge_name(&self) -> &'static str;
}
