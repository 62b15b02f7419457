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

//! The rule-based strategy: a pure function of the workload's write ratio.
//!
//! Serving maps the ratio to a level directly. "Training" is an
//! evaluation pass that scores the rule against ground-truth labels.
//! The two bucket-to-index mappings are intentionally distinct code
//! paths (serving vs. evaluation) and must not be unified.

use crate::classifier::{Classifier, ClassifierError, StrategyKind, TrainOutcome};
use crate::store::ModelStore;
use isotailor_core::dataset::GraphDataset;
use isotailor_core::strategy::IsolationLevel;
use isotailor_core::trace::TraceGraph;
use tracing::info;

/// Write ratios below this favor snapshot isolation.
const LOW_WRITE_RATIO: f64 = 0.2;
/// Write ratios above this favor read committed.
const HIGH_WRITE_RATIO: f64 = 0.4;

const LABEL_TOLERANCE: f64 = 1e-3;

/// Stateless write-ratio rule. Carries no model artifact.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedClassifier;

impl RuleBasedClassifier {
    fn write_ratio(graph: &TraceGraph) -> Result<f64, ClassifierError> {
        let writes = graph.write_total as f64;
        let reads = graph.read_total as f64;
        if writes + reads == 0.0 {
            return Err(ClassifierError::DegenerateGraph);
        }
        Ok(writes / (writes + reads))
    }

    /// Serving decision for a write ratio.
    fn decide(wr: f64) -> IsolationLevel {
        if wr < LOW_WRITE_RATIO {
            IsolationLevel::SiTailor
        } else if wr <= HIGH_WRITE_RATIO {
            IsolationLevel::Serializable
        } else {
            IsolationLevel::RcTailor
        }
    }

    /// Evaluation scoring: the bucket's label component must be the
    /// winning one. The mid bucket is scored against component 0 while
    /// serving returns index 0 for it as well; the low/high buckets check
    /// components 1 and 2.
    fn bucket_is_correct(wr: f64, label: &[f64; 3]) -> bool {
        let component = if wr < LOW_WRITE_RATIO {
            label[1]
        } else if wr <= HIGH_WRITE_RATIO {
            label[0]
        } else {
            label[2]
        };
        (component - 1.0).abs() < LABEL_TOLERANCE
    }
}

impl Classifier for RuleBasedClassifier {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RuleBased
    }

    fn train(&mut self, dataset: &GraphDataset) -> Result<TrainOutcome, ClassifierError> {
        let mut total = 0usize;
        let mut correct = 0usize;
        for (graph, label) in dataset.examples() {
            let wr = Self::write_ratio(graph)?;
            total += 1;
            if Self::bucket_is_correct(wr, &label.0) {
                correct += 1;
            }
        }
        if total == 0 {
            return Err(ClassifierError::EmptyDataset);
        }
        let accuracy = correct as f64 / total as f64;
        info!(correct, total, accuracy, "rule evaluation complete");
        Ok(TrainOutcome {
            kind: StrategyKind::RuleBased,
            graphs: total,
            accuracy: Some(accuracy),
        })
    }

    fn predict(&self, graph: &TraceGraph) -> Result<IsolationLevel, ClassifierError> {
        Ok(Self::decide(Self::write_ratio(graph)?))
    }

    fn save(&self, _store: &ModelStore, _workload: &str) -> Result<(), ClassifierError> {
        Ok(())
    }

    fn load(&mut self, _store: &ModelStore, _workload: &str) -> Result<bool, ClassifierError> {
        Ok(true)
    }

    fn is_ready(&self) -> bool {
        true
    }
}
