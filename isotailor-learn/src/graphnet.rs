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

//! Graph-net strategy front-end.
//!
//! The numerical model itself is an external capability reached through
//! [`GraphNetBackend`]; this module owns everything around it: feature
//! preparation (L2 normalization of node and edge features), the seeded
//! train/eval split, the accuracy metric, and model lifecycle.

use crate::classifier::{Classifier, ClassifierError, StrategyKind, TrainOutcome};
use crate::store::ModelStore;
use isotailor_core::dataset::GraphDataset;
use isotailor_core::strategy::{IsolationLevel, STRATEGY_COUNT};
use isotailor_core::trace::TraceGraph;
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Seed for the train/eval split, fixed for reproducible runs.
pub const DEFAULT_SPLIT_SEED: u64 = 37;
/// Fraction of graphs held out for evaluation.
pub const DEFAULT_TEST_FRACTION: f64 = 0.01;

const NORM_EPS: f64 = 1e-12;

/// Training hyper-parameters handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub epochs: usize,
    pub batch_size: usize,
    /// Seed for the backend's epoch shuffling; evaluation stays in input
    /// order.
    pub shuffle_seed: u64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 1000,
            batch_size: 16,
            shuffle_seed: DEFAULT_SPLIT_SEED,
        }
    }
}

/// Opaque trained model produced by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNetModel {
    pub blob: Vec<u8>,
}

/// Normalized feature tensors for one graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphFeatures {
    /// `[n, 4]`, rows L2-normalized.
    pub nodes: Array2<f64>,
    /// `[2, m]` source/target rows.
    pub edge_index: Array2<i64>,
    /// `[m, 2]`, rows L2-normalized.
    pub edge_attr: Array2<f64>,
}

/// One training example: features plus the full label vector as soft
/// targets.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainExample {
    pub features: GraphFeatures,
    pub target: [f64; STRATEGY_COUNT],
}

/// The external trainable capability.
///
/// Implementations own the network architecture, the loss (cross-entropy
/// between the flattened score vector and the target vector), batching
/// and shuffling during fitting. A deterministic stub satisfies this in
/// tests.
pub trait GraphNetBackend: Send + Sync {
    /// Fit a model; `prior` lets retraining continue from a previously
    /// persisted model instead of starting cold.
    fn fit(
        &self,
        train: &[TrainExample],
        options: &FitOptions,
        prior: Option<&GraphNetModel>,
    ) -> Result<GraphNetModel, ClassifierError>;

    fn score(
        &self,
        model: &GraphNetModel,
        graph: &GraphFeatures,
    ) -> Result<[f64; STRATEGY_COUNT], ClassifierError>;
}

/// Prepare one graph for the backend: build the tensors and normalize.
pub fn prepare(graph: &TraceGraph) -> GraphFeatures {
    let node_rows = graph.node_features();
    let mut nodes = Array2::zeros((node_rows.len(), 4));
    for (r, row) in node_rows.iter().enumerate() {
        for (c, v) in row.iter().enumerate() {
            nodes[[r, c]] = *v;
        }
    }
    l2_normalize_rows(&mut nodes);

    let m = graph.edges.len();
    let mut edge_index = Array2::zeros((2, m));
    let mut edge_attr = Array2::zeros((m, 2));
    for (c, edge) in graph.edges.iter().enumerate() {
        edge_index[[0, c]] = i64::from(edge.src);
        edge_index[[1, c]] = i64::from(edge.dst);
        let feature = edge.feature();
        edge_attr[[c, 0]] = feature[0];
        edge_attr[[c, 1]] = feature[1];
    }
    // Row-wise normalization covers the rank-1 case too: a single-row
    // matrix normalized per row is the whole-vector normalization.
    l2_normalize_rows(&mut edge_attr);

    GraphFeatures {
        nodes,
        edge_index,
        edge_attr,
    }
}

fn l2_normalize_rows(matrix: &mut Array2<f64>) {
    for mut row in matrix.axis_iter_mut(Axis(0)) {
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        let denom = norm.max(NORM_EPS);
        row.mapv_inplace(|v| v / denom);
    }
}

/// The graph-net strategy: split, delegate fitting, score the hold-out.
pub struct GraphNetClassifier {
    backend: Arc<dyn GraphNetBackend>,
    model: Option<GraphNetModel>,
    options: FitOptions,
    test_fraction: f64,
    split_seed: u64,
}

impl GraphNetClassifier {
    pub fn new(backend: Arc<dyn GraphNetBackend>, options: FitOptions) -> Self {
        Self {
            backend,
            model: None,
            options,
            test_fraction: DEFAULT_TEST_FRACTION,
            split_seed: DEFAULT_SPLIT_SEED,
        }
    }

    pub fn with_split(mut self, test_fraction: f64, split_seed: u64) -> Self {
        self.test_fraction = test_fraction;
        self.split_seed = split_seed;
        self
    }
}

impl Classifier for GraphNetClassifier {
    fn kind(&self) -> StrategyKind {
        StrategyKind::GraphNet
    }

    fn train(&mut self, dataset: &GraphDataset) -> Result<TrainOutcome, ClassifierError> {
        let examples: Vec<TrainExample> = dataset
            .examples()
            .map(|(graph, label)| TrainExample {
                features: prepare(graph),
                target: label.0,
            })
            .collect();
        if examples.is_empty() {
            return Err(ClassifierError::EmptyDataset);
        }

        let mut indices: Vec<usize> = (0..examples.len()).collect();
        let mut rng = StdRng::seed_from_u64(self.split_seed);
        indices.shuffle(&mut rng);
        let mut eval_n = (self.test_fraction * examples.len() as f64).ceil() as usize;
        if eval_n >= examples.len() {
            eval_n = examples.len() - 1;
        }
        let eval_idx = indices.split_off(examples.len() - eval_n);

        let train_set: Vec<TrainExample> =
            indices.iter().map(|&i| examples[i].clone()).collect();
        let model = self
            .backend
            .fit(&train_set, &self.options, self.model.as_ref())?;

        // Evaluation runs unshuffled over the hold-out: a prediction is
        // correct when the arg-max scored class has ground-truth 1.0.
        let accuracy = if eval_idx.is_empty() {
            None
        } else {
            let mut correct = 0usize;
            for &i in &eval_idx {
                let scores = self.backend.score(&model, &examples[i].features)?;
                if examples[i].target[argmax(&scores)] == 1.0 {
                    correct += 1;
                }
            }
            Some(correct as f64 / eval_idx.len() as f64)
        };

        info!(
            train = train_set.len(),
            eval = eval_idx.len(),
            ?accuracy,
            "graph-net fit complete"
        );

        self.model = Some(model);
        Ok(TrainOutcome {
            kind: StrategyKind::GraphNet,
            graphs: examples.len(),
            accuracy,
        })
    }

    fn predict(&self, graph: &TraceGraph) -> Result<IsolationLevel, ClassifierError> {
        let model = self.model.as_ref().ok_or(ClassifierError::ModelNotLoaded {
            kind: StrategyKind::GraphNet,
        })?;
        let scores = self.backend.score(model, &prepare(graph))?;
        let class = argmax(&scores);
        IsolationLevel::from_index(class).ok_or(ClassifierError::InvalidClass(class))
    }

    fn save(&self, store: &ModelStore, workload: &str) -> Result<(), ClassifierError> {
        let model = self.model.as_ref().ok_or(ClassifierError::ModelNotLoaded {
            kind: StrategyKind::GraphNet,
        })?;
        store.save(workload, StrategyKind::GraphNet, model)?;
        Ok(())
    }

    fn load(&mut self, store: &ModelStore, workload: &str) -> Result<bool, ClassifierError> {
        if let Some(model) = store.load::<GraphNetModel>(workload, StrategyKind::GraphNet)? {
            self.model = Some(model);
        }
        Ok(self.model.is_some())
    }

    fn is_ready(&self) -> bool {
        self.model.is_some()
    }
}

fn argmax(scores: &[f64; STRATEGY_COUNT]) -> usize {
    let mut best = 0;
    for (i, v) in scores.iter().enumerate() {
        if *v > scores[best] {
            best = i;
        }
    }
    best
}
