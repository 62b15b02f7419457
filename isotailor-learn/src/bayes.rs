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

//! Gaussian naive Bayes over aggregate graph features.
//!
//! Feature vector per graph: `[reads, writes, rw conflicts, ww conflicts]`.
//! The target is the index of the winning strategy in the graph's label.
//! Training holds out a seeded test split and reports its accuracy.

use crate::classifier::{Classifier, ClassifierError, StrategyKind, TrainOutcome};
use crate::store::ModelStore;
use isotailor_core::dataset::GraphDataset;
use isotailor_core::strategy::IsolationLevel;
use isotailor_core::trace::TraceGraph;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Number of aggregate features per graph.
pub const FEATURES: usize = 4;

/// Seed for the train/test split, fixed for reproducible runs.
pub const DEFAULT_SPLIT_SEED: u64 = 42;
/// Fraction of graphs held out for the accuracy report.
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

// Variance floor relative to the largest feature variance, so a feature
// that is constant within a class cannot zero out the likelihood.
const VAR_SMOOTHING: f64 = 1e-9;

/// A fitted Gaussian naive Bayes model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianNb {
    /// Class ids seen during fitting, ascending.
    pub classes: Vec<usize>,
    /// Log prior per class.
    pub log_priors: Vec<f64>,
    /// Per-class feature means, `[class][feature]`.
    pub means: Vec<Vec<f64>>,
    /// Per-class feature variances, floored.
    pub variances: Vec<Vec<f64>>,
}

impl GaussianNb {
    /// Fit on rows of `x` with class targets `y`.
    pub fn fit(x: &Array2<f64>, y: &[usize]) -> Self {
        debug_assert_eq!(x.nrows(), y.len());

        let mut classes: Vec<usize> = y.to_vec();
        classes.sort_unstable();
        classes.dedup();

        // sklearn-style smoothing: proportional to the widest feature.
        let global_var = x
            .var_axis(Axis(0), 0.0)
            .iter()
            .cloned()
            .fold(0.0f64, f64::max);
        let floor = (VAR_SMOOTHING * global_var).max(VAR_SMOOTHING);

        let total = y.len() as f64;
        let mut log_priors = Vec::with_capacity(classes.len());
        let mut means = Vec::with_capacity(classes.len());
        let mut variances = Vec::with_capacity(classes.len());

        for &class in &classes {
            let rows: Vec<usize> = y
                .iter()
                .enumerate()
                .filter(|(_, c)| **c == class)
                .map(|(i, _)| i)
                .collect();
            let members = x.select(Axis(0), &rows);
            let mean: Array1<f64> = members.mean_axis(Axis(0)).unwrap_or_else(|| {
                Array1::zeros(x.ncols())
            });
            let var: Array1<f64> = members.var_axis(Axis(0), 0.0);

            log_priors.push((rows.len() as f64 / total).ln());
            means.push(mean.to_vec());
            variances.push(var.iter().map(|v| v.max(floor)).collect());
        }

        Self {
            classes,
            log_priors,
            means,
            variances,
        }
    }

    /// Class id with the highest joint log-likelihood.
    pub fn predict_one(&self, features: &[f64]) -> usize {
        let mut best_class = self.classes[0];
        let mut best_score = f64::NEG_INFINITY;
        for (i, &class) in self.classes.iter().enumerate() {
            let mut score = self.log_priors[i];
            for (f, (&mean, &var)) in features
                .iter()
                .zip(self.means[i].iter().zip(self.variances[i].iter()))
            {
                score += -0.5 * (2.0 * std::f64::consts::PI * var).ln()
                    - (f - mean).powi(2) / (2.0 * var);
            }
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }
        best_class
    }
}

/// The naive Bayes strategy: a fitted [`GaussianNb`] plus split settings.
#[derive(Debug, Clone)]
pub struct NaiveBayesClassifier {
    model: Option<GaussianNb>,
    test_fraction: f64,
    split_seed: u64,
}

impl Default for NaiveBayesClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_TEST_FRACTION, DEFAULT_SPLIT_SEED)
    }
}

impl NaiveBayesClassifier {
    pub fn new(test_fraction: f64, split_seed: u64) -> Self {
        Self {
            model: None,
            test_fraction,
            split_seed,
        }
    }
}

impl Classifier for NaiveBayesClassifier {
    fn kind(&self) -> StrategyKind {
        StrategyKind::NaiveBayes
    }

    fn train(&mut self, dataset: &GraphDataset) -> Result<TrainOutcome, ClassifierError> {
        let mut rows: Vec<[f64; FEATURES]> = Vec::new();
        let mut targets: Vec<usize> = Vec::new();
        for (graph, label) in dataset.examples() {
            rows.push(graph.aggregate_features());
            targets.push(label.best().index());
        }
        if rows.is_empty() {
            return Err(ClassifierError::EmptyDataset);
        }

        let (train_idx, test_idx) =
            split_indices(rows.len(), self.test_fraction, self.split_seed);

        let x_train = select_rows(&rows, &train_idx);
        let y_train: Vec<usize> = train_idx.iter().map(|&i| targets[i]).collect();
        let model = GaussianNb::fit(&x_train, &y_train);

        let accuracy = if test_idx.is_empty() {
            None
        } else {
            let correct = test_idx
                .iter()
                .filter(|&&i| model.predict_one(&rows[i]) == targets[i])
                .count();
            Some(correct as f64 / test_idx.len() as f64)
        };

        info!(
            train = train_idx.len(),
            test = test_idx.len(),
            ?accuracy,
            "naive Bayes fit complete"
        );

        self.model = Some(model);
        Ok(TrainOutcome {
            kind: StrategyKind::NaiveBayes,
            graphs: rows.len(),
            accuracy,
        })
    }

    fn predict(&self, graph: &TraceGraph) -> Result<IsolationLevel, ClassifierError> {
        let model = self.model.as_ref().ok_or(ClassifierError::ModelNotLoaded {
            kind: StrategyKind::NaiveBayes,
        })?;
        let class = model.predict_one(&graph.aggregate_features());
        IsolationLevel::from_index(class).ok_or(ClassifierError::InvalidClass(class))
    }

    fn save(&self, store: &ModelStore, workload: &str) -> Result<(), ClassifierError> {
        let model = self.model.as_ref().ok_or(ClassifierError::ModelNotLoaded {
            kind: StrategyKind::NaiveBayes,
        })?;
        store.save(workload, StrategyKind::NaiveBayes, model)?;
        Ok(())
    }

    fn load(&mut self, store: &ModelStore, workload: &str) -> Result<bool, ClassifierError> {
        if let Some(model) = store.load::<GaussianNb>(workload, StrategyKind::NaiveBayes)? {
            self.model = Some(model);
        }
        Ok(self.model.is_some())
    }

    fn is_ready(&self) -> bool {
        self.model.is_some()
    }
}

/// Deterministic shuffled split. The test side takes `ceil(fraction * n)`
/// items but always leaves at least one for training.
fn split_indices(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let mut test_n = (test_fraction * n as f64).ceil() as usize;
    if test_n >= n {
        test_n = n.saturating_sub(1);
    }
    let test = indices.split_off(n - test_n);
    (indices, test)
}

fn select_rows(rows: &[[f64; FEATURES]], idx: &[usize]) -> Array2<f64> {
    let mut out = Array2::zeros((idx.len(), FEATURES));
    for (r, &i) in idx.iter().enumerate() {
        for (c, v) in rows[i].iter().enumerate() {
            out[[r, c]] = *v;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use isotailor_core::label::Label;
    use isotailor_core::trace::Projection;

    fn graph(reads: u64, writes: u64, rw: u64, ww: u64) -> TraceGraph {
        TraceGraph {
            projection: Projection::Aggregate,
            nodes: Vec::new(),
            edges: Vec::new(),
            read_total: reads,
            write_total: writes,
            rw_conflicts: rw,
            ww_conflicts: ww,
        }
    }

    fn gaussian_fixture() -> (Array2<f64>, Vec<usize>) {
        // Two well-separated clusters.
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for i in 0..20 {
            let jitter = (i % 5) as f64;
            rows.push([100.0 + jitter, 5.0, 2.0 + jitter, 0.0]);
            targets.push(1);
            rows.push([5.0 + jitter, 100.0, 40.0, 20.0 + jitter]);
            targets.push(2);
        }
        let flat: Vec<f64> = rows.iter().flatten().cloned().collect();
        let x = Array2::from_shape_vec((rows.len(), FEATURES), flat).expect("shape");
        (x, targets)
    }

    #[test]
    fn fit_separates_clusters() {
        let (x, y) = gaussian_fixture();
        let model = GaussianNb::fit(&x, &y);
        assert_eq!(model.classes, vec![1, 2]);
        assert_eq!(model.predict_one(&[102.0, 6.0, 3.0, 0.0]), 1);
        assert_eq!(model.predict_one(&[4.0, 99.0, 41.0, 22.0]), 2);
    }

    #[test]
    fn constant_features_get_a_variance_floor() {
        let x = Array2::from_shape_vec(
            (4, FEATURES),
            vec![
                1.0, 1.0, 1.0, 1.0, //
                1.0, 1.0, 1.0, 1.0, //
                2.0, 2.0, 2.0, 2.0, //
                2.0, 2.0, 2.0, 2.0,
            ],
        )
        .expect("shape");
        let model = GaussianNb::fit(&x, &[0, 0, 1, 1]);
        for vars in &model.variances {
            assert!(vars.iter().all(|v| *v > 0.0));
        }
        assert_eq!(model.predict_one(&[1.0, 1.0, 1.0, 1.0]), 0);
    }

    #[test]
    fn train_and_predict_over_a_dataset() {
        let root = tempfile::tempdir().expect("tempdir");
        // Read-heavy scenarios labeled SI_TAILOR, write-heavy RC_TAILOR.
        for i in 0..10 {
            scenario(
                root.path(),
                &format!("r{i}"),
                "0.5,1.0,0.25",
                &format!("1,{},2#2,2,1\n", 90 + i),
            );
            scenario(
                root.path(),
                &format!("w{i}"),
                "0.25,0.5,1.0",
                &format!("1,2,{}#2,4,1\n", 90 + i),
            );
        }

        let mut dataset = GraphDataset::new();
        dataset
            .ingest_tree(
                root.path(),
                Projection::Aggregate,
                &isotailor_core::trace::TraceFormat::default(),
            )
            .expect("ingest");

        let mut bayes = NaiveBayesClassifier::default();
        let outcome = bayes.train(&dataset).expect("train");
        assert_eq!(outcome.graphs, 20);
        assert_eq!(outcome.accuracy, Some(1.0));

        assert_eq!(
            bayes.predict(&graph(95, 2, 1, 0)).expect("predict"),
            IsolationLevel::SiTailor
        );
        assert_eq!(
            bayes.predict(&graph(2, 95, 0, 1)).expect("predict"),
            IsolationLevel::RcTailor
        );
    }

    #[test]
    fn predict_without_model_is_not_loaded() {
        let bayes = NaiveBayesClassifier::default();
        let err = bayes.predict(&graph(1, 1, 0, 0)).expect_err("must fail");
        assert!(matches!(err, ClassifierError::ModelNotLoaded { .. }));
    }

    #[test]
    fn split_is_deterministic_and_leaves_training_data() {
        let (a_train, a_test) = split_indices(10, 0.2, 42);
        let (b_train, b_test) = split_indices(10, 0.2, 42);
        assert_eq!(a_train, b_train);
        assert_eq!(a_test, b_test);
        assert_eq!(a_test.len(), 2);

        let (train, test) = split_indices(1, 0.2, 42);
        assert_eq!(train.len(), 1);
        assert!(test.is_empty());
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let mut bayes = NaiveBayesClassifier::default();
        let err = bayes.train(&GraphDataset::new()).expect_err("must fail");
        assert!(matches!(err, ClassifierError::EmptyDataset));
    }

    #[test]
    fn labels_are_ignored_in_favor_of_argmax() {
        // best() of a binarized label picks the 1.0 component.
        assert_eq!(Label([0.0, 1.0, 0.0]).best(), IsolationLevel::SiTailor);
    }

    fn scenario(root: &std::path::Path, name: &str, label: &str, trace: &str) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join("label"), label).expect("write label");
        std::fs::write(dir.join("t.trace"), trace).expect("write trace");
    }
}
