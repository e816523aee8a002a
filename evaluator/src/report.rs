//! Markdown run reports.
//!
//! One document per run: the aggregate summary table, the worst items by
//! correctness, any failed items, and threshold-driven recommendations.

use crate::error::RunResult;
use crate::runner::{ItemOutcome, PerItemResult};
use scoring::RunAggregate;
use std::path::{Path, PathBuf};
use tracing::info;

const TOP_FAILURES: usize = 10;
const SNIPPET_CHARS: usize = 120;
const P95_BUDGET_MS: u64 = 5000;

/// Worst `TOP_FAILURES` scored items by ascending correctness.
pub fn worst_items(outcomes: &[ItemOutcome]) -> Vec<&PerItemResult> {
    let mut scored: Vec<&PerItemResult> = outcomes
        .iter()
        .filter_map(|o| match o {
            ItemOutcome::Scored(result) => Some(result),
            ItemOutcome::Failed { .. } => None,
        })
        .collect();

    scored.sort_by(|a, b| {
        a.scores
            .correctness
            .partial_cmp(&b.scores.correctness)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(TOP_FAILURES);
    scored
}

/// Heuristic recommendations derived from the aggregate.
pub fn recommendations(aggregate: &RunAggregate) -> Vec<String> {
    let mut recs = Vec::new();

    if aggregate.n_items == 0 {
        recs.push("No items were scored: inspect failed items before trusting this run.".into());
        return recs;
    }

    if aggregate.correctness_avg < 0.8 {
        recs.push(
            "Improve model grounding: many answers fall below the similarity threshold.".into(),
        );
    }
    if aggregate.relevance_avg < 0.9 {
        recs.push("Tighten prompt handling: some answers drift off-topic.".into());
    }
    if aggregate.safety_violations > 0 {
        recs.push("Strengthen safety filters: flagged unsafe content detected.".into());
    }
    if let Some(p95) = aggregate.p95_ms {
        if p95 > P95_BUDGET_MS {
            recs.push("Optimize latency: 95th percentile response time is high.".into());
        }
    }

    recs
}

fn snippet(text: &str) -> String {
    let flat = text.replace('\n', " ").replace('|', "\\|");
    flat.chars().take(SNIPPET_CHARS).collect()
}

fn render(
    run_id: &str,
    suite_name: &str,
    config_name: &str,
    aggregate: &RunAggregate,
    outcomes: &[ItemOutcome],
) -> String {
    let mut out = String::new();

    out.push_str(&format!("# Test Report for Run {run_id}\n\n"));
    out.push_str(&format!("**Suite:** {suite_name}  \n"));
    out.push_str(&format!("**Config:** {config_name}  \n\n"));

    out.push_str("## Summary Metrics\n\n");
    out.push_str(
        "| n_items | correctness_avg | relevance_avg | safety_violations | p50_ms | p95_ms |\n",
    );
    out.push_str(
        "|---------|-----------------|---------------|-------------------|--------|--------|\n",
    );
    let fmt_ms = |value: Option<u64>| match value {
        Some(ms) => ms.to_string(),
        None => "null".to_string(),
    };
    out.push_str(&format!(
        "| {} | {:.2} | {:.2} | {} | {} | {} |\n\n",
        aggregate.n_items,
        aggregate.correctness_avg,
        aggregate.relevance_avg,
        aggregate.safety_violations,
        fmt_ms(aggregate.p50_ms),
        fmt_ms(aggregate.p95_ms),
    ));

    out.push_str(&format!("## Top {TOP_FAILURES} Failures\n\n"));
    out.push_str("| id | correctness | snippet |\n");
    out.push_str("|----|-------------|---------|\n");
    for item in worst_items(outcomes) {
        out.push_str(&format!(
            "| {} | {:.2} | {} |\n",
            item.item_id,
            item.scores.correctness,
            snippet(&item.model_answer),
        ));
    }

    let failed: Vec<_> = outcomes
        .iter()
        .filter_map(|o| match o {
            ItemOutcome::Failed { item_id, error } => Some((item_id, error)),
            ItemOutcome::Scored(_) => None,
        })
        .collect();
    if !failed.is_empty() {
        out.push_str("\n## Failed Items\n\n");
        for (item_id, error) in failed {
            out.push_str(&format!("- `{item_id}`: {error}\n"));
        }
    }

    out.push_str("\n## Recommendations\n\n");
    for rec in recommendations(aggregate) {
        out.push_str(&format!("- {rec}\n"));
    }

    out
}

/// Write `TEST_REPORT_<run_id>.md` under `output_dir`.
pub fn write_report(
    output_dir: impl AsRef<Path>,
    run_id: &str,
    suite_name: &str,
    config_name: &str,
    aggregate: &RunAggregate,
    outcomes: &[ItemOutcome],
) -> RunResult<PathBuf> {
    let dir = output_dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let path = dir.join(format!("TEST_REPORT_{run_id}.md"));
    let contents = render(run_id, suite_name, config_name, aggregate, outcomes);
    std::fs::write(&path, contents)?;

    info!(path = %path.display(), "wrote run report");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoring::ItemScores;
    use std::collections::BTreeSet;

    fn scored(item_id: &str, correctness: f64, answer: &str) -> ItemOutcome {
        ItemOutcome::Scored(PerItemResult {
            run_id: "prod_0_abcd1234".to_string(),
            item_id: item_id.to_string(),
            config_name: "prod".to_string(),
            model_answer: answer.to_string(),
            truncated: false,
            scores: ItemScores {
                correctness,
                correct_pass: correctness >= 0.78,
                relevance: 1.0,
                safety_flags: BTreeSet::new(),
                safety_violation_count: 0,
                latency_ms: 800,
            },
            tags: vec![],
        })
    }

    fn sample_aggregate() -> RunAggregate {
        RunAggregate {
            n_items: 2,
            correctness_avg: 0.6,
            relevance_avg: 0.85,
            safety_violations: 1,
            p50_ms: Some(800),
            p95_ms: Some(6200),
        }
    }

    #[test]
    fn test_worst_items_sorted_ascending() {
        let outcomes = vec![
            scored("good", 0.95, "a"),
            scored("bad", 0.10, "b"),
            scored("mid", 0.50, "c"),
            ItemOutcome::Failed {
                item_id: "broken".to_string(),
                error: "boom".to_string(),
            },
        ];

        let worst = worst_items(&outcomes);
        let ids: Vec<&str> = worst.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(ids, vec!["bad", "mid", "good"]);
    }

    #[test]
    fn test_recommendations_fire_on_thresholds() {
        let recs = recommendations(&sample_aggregate());
        assert_eq!(recs.len(), 4);
    }

    #[test]
    fn test_no_recommendations_for_healthy_run() {
        let aggregate = RunAggregate {
            n_items: 5,
            correctness_avg: 0.95,
            relevance_avg: 1.0,
            safety_violations: 0,
            p50_ms: Some(400),
            p95_ms: Some(900),
        };
        assert!(recommendations(&aggregate).is_empty());
    }

    #[test]
    fn test_empty_run_gets_warning_recommendation() {
        let recs = recommendations(&RunAggregate::empty());
        assert_eq!(recs.len(), 1);
        assert!(recs[0].contains("No items"));
    }

    #[test]
    fn test_render_contains_sections() {
        let outcomes = vec![
            scored("q1", 0.4, "A long answer\nwith a newline | and a pipe"),
            ItemOutcome::Failed {
                item_id: "q2".to_string(),
                error: "element not found".to_string(),
            },
        ];

        let text = render("prod_0_abcd1234", "core", "prod", &sample_aggregate(), &outcomes);
        assert!(text.contains("# Test Report for Run prod_0_abcd1234"));
        assert!(text.contains("## Summary Metrics"));
        assert!(text.contains("| q1 | 0.40 |"));
        assert!(text.contains("## Failed Items"));
        assert!(text.contains("`q2`: element not found"));
        assert!(text.contains("## Recommendations"));
        // Newlines and pipes are flattened out of snippets.
        assert!(text.contains("with a newline \\| and a pipe"));
    }

    #[test]
    fn test_write_report_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let outcomes = vec![scored("q1", 0.9, "fine")];

        let path = write_report(
            dir.path(),
            "prod_0_abcd1234",
            "core",
            "prod",
            &sample_aggregate(),
            &outcomes,
        )
        .unwrap();

        assert!(path.exists());
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("**Suite:** core"));
    }
}
