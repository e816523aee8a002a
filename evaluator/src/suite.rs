//! Suite loading.
//!
//! A suite is a JSONL file under `data/`, one evaluation case per line.
//! Items are immutable once loaded.

use crate::error::SuiteError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One evaluation case: a question and its reference answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteItem {
    pub id: String,
    pub question: String,
    pub gt_answer: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Load a suite from a JSONL file. Blank lines are skipped; duplicate ids
/// and empty suites are rejected.
pub fn load_suite(path: impl AsRef<Path>) -> Result<Vec<SuiteItem>, SuiteError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| SuiteError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let mut items = Vec::new();
    let mut seen = HashSet::new();

    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let item: SuiteItem = serde_json::from_str(line).map_err(|source| SuiteError::Parse {
            line: idx + 1,
            source,
        })?;

        if !seen.insert(item.id.clone()) {
            return Err(SuiteError::DuplicateId {
                id: item.id,
                line: idx + 1,
            });
        }

        items.push(item);
    }

    if items.is_empty() {
        return Err(SuiteError::Empty {
            path: path.display().to_string(),
        });
    }

    Ok(items)
}
