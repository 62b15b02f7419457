// Copyright 2025 IsoTailor Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Goodput label aggregation over benchmark summary records.
//!
//! A scenario directory accumulates one `*.summary.json` per benchmark run.
//! Aggregation reduces them to a single normalized label vector, writes it
//! to a `label` file, and removes the consumed summaries. The removal makes
//! aggregation one-shot: a scenario is labeled exactly once.

use crate::strategy::{IsolationLevel, STRATEGY_COUNT};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Benchmark summary files are recognized by this suffix.
pub const SUMMARY_SUFFIX: &str = ".summary.json";
/// Name of the label artifact written into a scenario directory.
pub const LABEL_FILE: &str = "label";

const ISOLATION_FIELD: &str = "Isolation";
const GOODPUT_FIELD: &str = "Goodput (requests/second)";

/// Errors raised while aggregating or decoding labels.
#[derive(Debug, Error)]
pub enum LabelError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path}: malformed label data: {detail}")]
    Malformed { path: PathBuf, detail: String },
}

/// Normalized goodput vector in [`IsolationLevel::ALL`] order.
///
/// Every component is `goodput / max_goodput`, so each lies in `[0, 1]`
/// and the best strategy is exactly `1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Label(pub [f64; STRATEGY_COUNT]);

impl Label {
    /// Strategy with the highest component; ties go to the earliest in
    /// canonical order.
    pub fn best(&self) -> IsolationLevel {
        let mut best = 0;
        for (i, v) in self.0.iter().enumerate() {
            if *v > self.0[best] {
                best = i;
            }
        }
        // Index is within ALL by construction.
        IsolationLevel::ALL[best]
    }

    /// Collapse to hard targets: components equal to `1.0` stay, the rest
    /// drop to `0.0`. Training consumes labels in this form.
    pub fn binarized(&self) -> Label {
        let mut out = [0.0; STRATEGY_COUNT];
        for (o, v) in out.iter_mut().zip(self.0.iter()) {
            if *v == 1.0 {
                *o = 1.0;
            }
        }
        Label(out)
    }

    /// Serialize as the comma-joined line stored in a `label` file.
    /// Debug formatting keeps the trailing `.0` on whole values that the
    /// label readers expect.
    pub fn to_line(&self) -> String {
        self.0
            .iter()
            .map(|v| format!("{v:?}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parse a `label` file line.
    pub fn parse_line(line: &str, path: &Path) -> Result<Label, LabelError> {
        let values: Vec<f64> = line
            .trim()
            .split(',')
            .map(|v| {
                v.trim().parse::<f64>().map_err(|_| LabelError::Malformed {
                    path: path.to_path_buf(),
                    detail: format!("invalid component: {v:?}"),
                })
            })
            .collect::<Result<_, _>>()?;
        let components: [f64; STRATEGY_COUNT] =
            values
                .try_into()
                .map_err(|values: Vec<f64>| LabelError::Malformed {
                    path: path.to_path_buf(),
                    detail: format!("{} components, expected {STRATEGY_COUNT}", values.len()),
                })?;
        Ok(Label(components))
    }

    /// Read and parse a `label` file.
    pub fn read_file(path: &Path) -> Result<Label, LabelError> {
        let content = fs::read_to_string(path).map_err(|source| LabelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_line(&content, path)
    }
}

/// Aggregate the summary files in one scenario directory.
///
/// Returns `Ok(None)` without side effects when the directory does not
/// cover all three strategies (insufficient data, not an error). On
/// success the `label` file is written and every consumed summary file is
/// deleted.
pub fn aggregate(scenario_dir: &Path) -> Result<Option<Label>, LabelError> {
    let mut summaries = Vec::new();
    let entries = fs::read_dir(scenario_dir).map_err(|source| LabelError::Io {
        path: scenario_dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| LabelError::Io {
            path: scenario_dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name();
        if entry.path().is_file() && name.to_string_lossy().ends_with(SUMMARY_SUFFIX) {
            summaries.push(entry.path());
        }
    }
    summaries.sort();

    let mut goodputs: [Option<f64>; STRATEGY_COUNT] = [None; STRATEGY_COUNT];
    for path in &summaries {
        let Some((level, goodput)) = read_summary(path)? else {
            debug!(path = %path.display(), "summary with unrecognized strategy ignored");
            continue;
        };
        let slot = &mut goodputs[level.index()];
        // Strict comparison: on a tie the first-seen value wins.
        if slot.map_or(true, |current| goodput > current) {
            *slot = Some(goodput);
        }
    }

    let Some(values) = collect_all(goodputs) else {
        debug!(
            dir = %scenario_dir.display(),
            "scenario missing strategy summaries, skipped"
        );
        return Ok(None);
    };

    let max = values.iter().cloned().fold(f64::MIN, f64::max);
    let mut components = [0.0; STRATEGY_COUNT];
    for (c, v) in components.iter_mut().zip(values.iter()) {
        *c = v / max;
    }
    let label = Label(components);

    let label_path = scenario_dir.join(LABEL_FILE);
    fs::write(&label_path, label.to_line()).map_err(|source| LabelError::Io {
        path: label_path.clone(),
        source,
    })?;

    for path in &summaries {
        fs::remove_file(path).map_err(|source| LabelError::Io {
            path: path.clone(),
            source,
        })?;
    }

    info!(
        dir = %scenario_dir.display(),
        label = %label.to_line(),
        "scenario labeled"
    );
    Ok(Some(label))
}

/// Aggregate every scenario subdirectory under `meta_root`.
///
/// Returns the number of scenarios that produced a label.
pub fn aggregate_tree(meta_root: &Path) -> Result<usize, LabelError> {
    let mut scenarios = Vec::new();
    let entries = fs::read_dir(meta_root).map_err(|source| LabelError::Io {
        path: meta_root.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| LabelError::Io {
            path: meta_root.to_path_buf(),
            source,
        })?;
        if entry.path().is_dir() {
            scenarios.push(entry.path());
        }
    }
    scenarios.sort();

    let mut labeled = 0;
    for dir in scenarios {
        if aggregate(&dir)?.is_some() {
            labeled += 1;
        }
    }
    Ok(labeled)
}

fn read_summary(path: &Path) -> Result<Option<(IsolationLevel, f64)>, LabelError> {
    let content = fs::read_to_string(path).map_err(|source| LabelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let record: Value = serde_json::from_str(&content).map_err(|source| LabelError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let Some(isolation) = record.get(ISOLATION_FIELD).and_then(Value::as_str) else {
        return Ok(None);
    };
    let Ok(level) = isolation.parse::<IsolationLevel>() else {
        return Ok(None);
    };

    let goodput = match record.get(GOODPUT_FIELD) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| LabelError::Malformed {
        path: path.to_path_buf(),
        detail: format!("missing or non-numeric {GOODPUT_FIELD:?}"),
    })?;

    Ok(Some((level, goodput)))
}

fn collect_all(goodputs: [Option<f64>; STRATEGY_COUNT]) -> Option<[f64; STRATEGY_COUNT]> {
    let mut out = [0.0; STRATEGY_COUNT];
    for (o, g) in out.iter_mut().zip(goodputs.iter()) {
        *o = (*g)?;
    }
    Some(out)
}
