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

//! Labeled graph dataset assembly.
//!
//! A scenario tree is a directory of scenario directories. Each scenario
//! holds zero or more trace files and, once the label aggregator has run,
//! a `label` file. Ingestion turns every labeled scenario into one group
//! of graphs paired with its label; unlabeled scenarios are skipped
//! silently (insufficient data, not an error).

use crate::label::{Label, LabelError};
use crate::trace::{Projection, TraceError, TraceFormat, TraceGraph};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised while ingesting scenario trees.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    Label(#[from] LabelError),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Contract violation: scenario groups and labels diverged. Ingestion
    /// must abort rather than continue with misaligned data.
    #[error("dataset misaligned after {path}: {groups} scenario groups vs {labels} labels")]
    Misaligned {
        path: PathBuf,
        groups: usize,
        labels: usize,
    },
}

/// Graphs grouped by scenario, index-aligned with their labels:
/// `labels()[i]` applies to every graph in `groups()[i]`.
#[derive(Debug, Default)]
pub struct GraphDataset {
    groups: Vec<Vec<TraceGraph>>,
    labels: Vec<Label>,
}

impl GraphDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scenario_count(&self) -> usize {
        self.groups.len()
    }

    pub fn graph_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Scenario groups with their labels.
    pub fn iter(&self) -> impl Iterator<Item = (&[TraceGraph], &Label)> {
        self.groups
            .iter()
            .map(Vec::as_slice)
            .zip(self.labels.iter())
    }

    /// All graphs flattened, each paired with its scenario label.
    pub fn examples(&self) -> impl Iterator<Item = (&TraceGraph, &Label)> {
        self.iter()
            .flat_map(|(graphs, label)| graphs.iter().map(move |g| (g, label)))
    }

    /// Ingest every labeled scenario under `root`.
    ///
    /// Returns the number of scenarios added. Directory entries are
    /// visited in name order so repeated ingestion of the same tree is
    /// deterministic.
    pub fn ingest_tree(
        &mut self,
        root: &Path,
        projection: Projection,
        format: &TraceFormat,
    ) -> Result<usize, DatasetError> {
        let mut scenarios = Vec::new();
        let entries = fs::read_dir(root).map_err(|source| DatasetError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| DatasetError::Io {
                path: root.to_path_buf(),
                source,
            })?;
            if entry.path().is_dir() {
                scenarios.push(entry.path());
            }
        }
        scenarios.sort();

        let mut added = 0;
        for scenario in scenarios {
            if self.ingest_scenario(&scenario, projection, format)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Ingest one scenario directory. Returns `false` when the scenario
    /// carries no label file and was skipped.
    fn ingest_scenario(
        &mut self,
        dir: &Path,
        projection: Projection,
        format: &TraceFormat,
    ) -> Result<bool, DatasetError> {
        let mut files = Vec::new();
        let entries = fs::read_dir(dir).map_err(|source| DatasetError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| DatasetError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            if entry.path().is_file() {
                files.push(entry.path());
            }
        }
        files.sort();

        if !files.iter().any(|f| is_label_file(f)) {
            debug!(dir = %dir.display(), "scenario without label file skipped");
            return Ok(false);
        }

        self.groups.push(Vec::new());
        for file in &files {
            if is_label_file(file) {
                // Hard targets for training: 1.0 survives, ratios drop out.
                self.labels.push(Label::read_file(file)?.binarized());
            } else {
                let graph = TraceGraph::parse(file, projection, format)?;
                // Push is safe: the group was created above.
                if let Some(group) = self.groups.last_mut() {
                    group.push(graph);
                }
            }
        }

        if self.groups.len() != self.labels.len() {
            return Err(DatasetError::Misaligned {
                path: dir.to_path_buf(),
                groups: self.groups.len(),
                labels: self.labels.len(),
            });
        }

        debug!(
            dir = %dir.display(),
            graphs = self.groups.last().map_or(0, Vec::len),
            "scenario ingested"
        );
        Ok(true)
    }
}

fn is_label_file(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().contains("label"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scenario(root: &Path, name: &str, label: Option<&str>, traces: &[(&str, &str)]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).expect("mkdir");
        if let Some(line) = label {
            fs::write(dir.join("label"), line).expect("write label");
        }
        for (file, content) in traces {
            fs::write(dir.join(file), content).expect("write trace");
        }
    }

    #[test]
    fn ingest_pairs_graphs_with_labels() {
        let root = tempfile::tempdir().expect("tempdir");
        scenario(
            root.path(),
            "s1",
            Some("1.0,0.8,0.5"),
            &[("t1.trace", "1,3,2,0.5,1\n"), ("t2.trace", "2,1,0,0.2,1\n")],
        );
        scenario(
            root.path(),
            "s2",
            Some("0.5,1.0,0.25"),
            &[("t1.trace", "1,0,4,0.5,0\n")],
        );

        let mut dataset = GraphDataset::new();
        let added = dataset
            .ingest_tree(root.path(), Projection::Detailed, &TraceFormat::default())
            .expect("ingest");

        assert_eq!(added, 2);
        assert_eq!(dataset.scenario_count(), 2);
        assert_eq!(dataset.graph_count(), 3);

        let pairs: Vec<_> = dataset.iter().collect();
        assert_eq!(pairs[0].0.len(), 2);
        // Labels come back binarized.
        assert_eq!(*pairs[0].1, Label([1.0, 0.0, 0.0]));
        assert_eq!(*pairs[1].1, Label([0.0, 1.0, 0.0]));
    }

    #[test]
    fn unlabeled_scenarios_are_skipped() {
        let root = tempfile::tempdir().expect("tempdir");
        scenario(root.path(), "s1", None, &[("t1.trace", "1,3,2,0.5,1\n")]);
        scenario(
            root.path(),
            "s2",
            Some("1.0,0.5,0.5"),
            &[("t1.trace", "1,3,2,0.5,1\n")],
        );

        let mut dataset = GraphDataset::new();
        let added = dataset
            .ingest_tree(root.path(), Projection::Detailed, &TraceFormat::default())
            .expect("ingest");

        assert_eq!(added, 1);
        assert_eq!(dataset.scenario_count(), dataset.iter().count());
    }

    #[test]
    fn alignment_holds_after_every_ingestion() {
        let root = tempfile::tempdir().expect("tempdir");
        for i in 0..4 {
            scenario(
                root.path(),
                &format!("s{i}"),
                Some("1.0,0.5,0.5"),
                &[("t.trace", "1,2,2,0.5,1\n")],
            );
        }

        let mut dataset = GraphDataset::new();
        dataset
            .ingest_tree(root.path(), Projection::Aggregate, &TraceFormat::default())
            .expect("ingest");
        dataset
            .ingest_tree(root.path(), Projection::Aggregate, &TraceFormat::default())
            .expect("ingest again");

        assert_eq!(dataset.scenario_count(), 8);
        assert_eq!(dataset.iter().count(), 8);
    }

    #[test]
    fn duplicate_label_files_violate_the_contract() {
        let root = tempfile::tempdir().expect("tempdir");
        let dir = root.path().join("s1");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("label"), "1.0,0.5,0.5").expect("write");
        fs::write(dir.join("label.old"), "0.5,1.0,0.5").expect("write");

        let mut dataset = GraphDataset::new();
        let err = dataset
            .ingest_tree(root.path(), Projection::Aggregate, &TraceFormat::default())
            .expect_err("must abort");
        assert!(matches!(err, DatasetError::Misaligned { .. }));
    }

    #[test]
    fn malformed_trace_aborts_ingestion() {
        let root = tempfile::tempdir().expect("tempdir");
        scenario(
            root.path(),
            "s1",
            Some("1.0,0.5,0.5"),
            &[("t.trace", "1,not-a-number,2,0.5,1\n")],
        );

        let mut dataset = GraphDataset::new();
        let err = dataset
            .ingest_tree(root.path(), Projection::Detailed, &TraceFormat::default())
            .expect_err("must abort");
        assert!(matches!(err, DatasetError::Trace(_)));
    }
}
