//! Answer stabilization.
//!
//! The chat backend exposes no protocol-level "done" signal to this
//! evaluator, so the last answer element is polled until its rendered text
//! holds still for a run of consecutive reads. The streak threshold
//! tolerates transient re-renders (markdown reformatting) without ending
//! the wait early.

use crate::error::SessionResult;
use crate::session::ChatSurface;
use std::time::Duration;
use tracing::{debug, warn};

/// Poll-loop parameters, sourced from the environment config.
#[derive(Debug, Clone)]
pub struct StabilizerSettings {
    pub poll_interval: Duration,
    pub stable_reads: u32,
    pub timeout: Duration,
}

impl Default for StabilizerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            stable_reads: 3,
            timeout: Duration::from_secs(60),
        }
    }
}

/// The captured answer and how the capture ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilizedAnswer {
    pub text: String,
    /// True when the overall deadline expired before the text held still.
    /// The text is still scorable; the item is marked possibly truncated.
    pub truncated: bool,
    /// Total polls performed. Useful for tuning the interval.
    pub polls: u32,
}

/// Poll the last answer element until its text is unchanged across
/// `stable_reads` consecutive reads or the deadline expires. Always
/// returns the last observed text; a slow answer degrades the item, never
/// the run.
pub async fn await_stable_answer(
    surface: &dyn ChatSurface,
    answer_locator: &str,
    settings: &StabilizerSettings,
) -> SessionResult<StabilizedAnswer> {
    let deadline = tokio::time::Instant::now() + settings.timeout;

    let mut previous = String::new();
    let mut streak: u32 = 0;
    let mut polls: u32 = 0;

    loop {
        let current = surface.read_text(answer_locator).await?;
        polls += 1;

        if current == previous {
            streak += 1;
        } else {
            streak = 0;
            previous = current;
        }

        if streak >= settings.stable_reads {
            debug!(polls, chars = previous.len(), "answer stabilized");
            return Ok(StabilizedAnswer {
                text: previous,
                truncated: false,
                polls,
            });
        }

        if tokio::time::Instant::now() >= deadline {
            warn!(
                polls,
                chars = previous.len(),
                "answer did not stabilize before deadline, capturing best effort"
            );
            return Ok(StabilizedAnswer {
                text: previous,
                truncated: true,
                polls,
            });
        }

        tokio::time::sleep(settings.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_support::StubSurface;
    use std::time::Instant;

    fn fast_settings() -> StabilizerSettings {
        StabilizerSettings {
            poll_interval: Duration::from_millis(5),
            stable_reads: 3,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_returns_final_held_value() {
        let surface = StubSurface::new("https://chat.example.com").with_text_script(&[
            "The",
            "The capital",
            "The capital of France is Paris.",
        ]);

        let answer = await_stable_answer(&surface, "div.answer", &fast_settings())
            .await
            .unwrap();

        assert_eq!(answer.text, "The capital of France is Paris.");
        assert!(!answer.truncated);
    }

    #[tokio::test]
    async fn test_wait_bounded_by_changes_plus_streak() {
        let settings = fast_settings();
        let surface = StubSurface::new("https://chat.example.com")
            .with_text_script(&["a", "ab", "ab final"]);

        let start = Instant::now();
        let answer = await_stable_answer(&surface, "div.answer", &settings)
            .await
            .unwrap();
        let elapsed = start.elapsed();

        // Two changes then three identical reads: six polls, five sleeps.
        assert_eq!(answer.polls, 6);
        assert!(elapsed < settings.timeout / 2);
    }

    #[tokio::test]
    async fn test_timeout_returns_best_effort() {
        // Scripted text never repeats long enough to satisfy the streak
        // before the short deadline.
        let settings = StabilizerSettings {
            poll_interval: Duration::from_millis(5),
            stable_reads: 1000,
            timeout: Duration::from_millis(30),
        };
        let surface =
            StubSurface::new("https://chat.example.com").with_text_script(&["partial answer"]);

        let answer = await_stable_answer(&surface, "div.answer", &settings)
            .await
            .unwrap();

        assert_eq!(answer.text, "partial answer");
        assert!(answer.truncated);
    }

    #[tokio::test]
    async fn test_empty_transcript_stabilizes_empty() {
        let surface = StubSurface::new("https://chat.example.com");

        let answer = await_stable_answer(&surface, "div.answer", &fast_settings())
            .await
            .unwrap();

        assert_eq!(answer.text, "");
        assert!(!answer.truncated);
    }
}
