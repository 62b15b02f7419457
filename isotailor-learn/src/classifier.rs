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

//! The classification strategy abstraction.
//!
//! All strategies share one externally observable contract: `predict`
//! returns one of the three canonical isolation levels, and `train`
//! consumes a labeled [`GraphDataset`]. Which feature projection a
//! strategy reads is part of its identity and must match how the caller
//! parsed the graphs.

use crate::store::{ModelStore, StoreError};
use isotailor_core::dataset::GraphDataset;
use isotailor_core::strategy::IsolationLevel;
use isotailor_core::trace::{Projection, TraceGraph};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised by classification strategies.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Prediction was requested before a model was trained or loaded.
    /// Fatal to the serving connection.
    #[error("no trained {kind} model is loaded")]
    ModelNotLoaded { kind: StrategyKind },

    /// The graph carries no read or write operations, so the write ratio
    /// is undefined.
    #[error("graph has no read or write operations")]
    DegenerateGraph,

    #[error("cannot train on an empty dataset")]
    EmptyDataset,

    #[error("predicted class index {0} is out of range")]
    InvalidClass(usize),

    #[error("graph-net backend failure: {0}")]
    Backend(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Identifies a classification strategy and its persistence format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    RuleBased,
    NaiveBayes,
    GraphNet,
}

impl StrategyKind {
    /// Model file extension, `None` for strategies with no artifact.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            StrategyKind::RuleBased => None,
            StrategyKind::NaiveBayes => Some("nb"),
            StrategyKind::GraphNet => Some("gnn"),
        }
    }

    /// The feature projection this strategy consumes.
    pub fn projection(self) -> Projection {
        match self {
            StrategyKind::GraphNet => Projection::Detailed,
            StrategyKind::RuleBased | StrategyKind::NaiveBayes => Projection::Aggregate,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::RuleBased => "rule-based",
            StrategyKind::NaiveBayes => "naive-bayes",
            StrategyKind::GraphNet => "graph-net",
        };
        f.write_str(name)
    }
}

/// An unrecognized strategy kind name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown strategy kind: {0}")]
pub struct UnknownStrategyKind(pub String);

impl FromStr for StrategyKind {
    type Err = UnknownStrategyKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rule" | "rule-based" => Ok(StrategyKind::RuleBased),
            "bayes" | "naive-bayes" => Ok(StrategyKind::NaiveBayes),
            "graphnet" | "graph-net" => Ok(StrategyKind::GraphNet),
            other => Err(UnknownStrategyKind(other.to_string())),
        }
    }
}

/// What a training run produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainOutcome {
    pub kind: StrategyKind,
    /// Number of graphs consumed.
    pub graphs: usize,
    /// Held-out (or rule-evaluation) accuracy, when one was computed.
    pub accuracy: Option<f64>,
}

/// A classification strategy over labeled trace-graph datasets.
pub trait Classifier: Send {
    fn kind(&self) -> StrategyKind;

    /// The projection graphs must be parsed with for this strategy.
    fn projection(&self) -> Projection {
        self.kind().projection()
    }

    /// Train (or, for the rule strategy, evaluate) on the dataset and keep
    /// the resulting model in memory.
    fn train(&mut self, dataset: &GraphDataset) -> Result<TrainOutcome, ClassifierError>;

    /// Predict the best isolation level for one graph.
    fn predict(&self, graph: &TraceGraph) -> Result<IsolationLevel, ClassifierError>;

    /// Persist the in-memory model for `workload`.
    fn save(&self, store: &ModelStore, workload: &str) -> Result<(), ClassifierError>;

    /// Load a previously persisted model. Absence is not an error; the
    /// return value says whether a model is now held.
    fn load(&mut self, store: &ModelStore, workload: &str) -> Result<bool, ClassifierError>;

    /// Whether `predict` can currently answer.
    fn is_ready(&self) -> bool;
}
