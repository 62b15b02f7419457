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

//! Offline training service.
//!
//! Accumulates scenario trees into an explicitly owned dataset, then
//! trains whichever strategy the operation selects and persists its
//! artifact. The strategy instances are injected at construction; the
//! wire op token only picks among them.

use crate::error::ServiceError;
use isotailor_core::dataset::GraphDataset;
use isotailor_core::trace::TraceFormat;
use isotailor_learn::classifier::{Classifier, StrategyKind, TrainOutcome};
use isotailor_learn::store::ModelStore;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Training operation names on the wire. `OP_TRAIN_BAYES` keeps the
/// spelling the transaction server sends.
pub const OP_TRAIN_GRAPHNET: &str = "train";
pub const OP_TRAIN_RULE: &str = "train_rule";
pub const OP_TRAIN_BAYES: &str = "train_bayse";

/// One classifier instance per strategy kind; the graph-net slot is
/// present only when a backend was configured.
pub struct ClassifierBank {
    pub rule: Box<dyn Classifier>,
    pub bayes: Box<dyn Classifier>,
    pub graphnet: Option<Box<dyn Classifier>>,
}

impl ClassifierBank {
    fn get_mut(&mut self, kind: StrategyKind) -> Option<&mut Box<dyn Classifier>> {
        match kind {
            StrategyKind::RuleBased => Some(&mut self.rule),
            StrategyKind::NaiveBayes => Some(&mut self.bayes),
            StrategyKind::GraphNet => self.graphnet.as_mut(),
        }
    }
}

/// The offline phase: dataset ingestion plus strategy training.
pub struct TrainingService {
    workload: String,
    format: TraceFormat,
    dataset: GraphDataset,
    store: ModelStore,
    bank: ClassifierBank,
}

impl TrainingService {
    /// Build the service and load any previously persisted artifacts so
    /// retraining continues from them.
    pub fn new(
        workload: impl Into<String>,
        format: TraceFormat,
        store: ModelStore,
        mut bank: ClassifierBank,
    ) -> Self {
        let workload = workload.into();
        for classifier in [Some(&mut bank.bayes), bank.graphnet.as_mut()]
            .into_iter()
            .flatten()
        {
            match classifier.load(&store, &workload) {
                Ok(true) => info!(kind = %classifier.kind(), %workload, "prior model loaded"),
                Ok(false) => {}
                Err(err) => warn!(
                    kind = %classifier.kind(),
                    error = %err,
                    "prior model could not be loaded, training from scratch"
                ),
            }
        }
        Self {
            workload,
            format,
            dataset: GraphDataset::new(),
            store,
            bank,
        }
    }

    pub fn dataset(&self) -> &GraphDataset {
        &self.dataset
    }

    /// Handle one offline operation: ingest the scenario trees named by
    /// `args`, then train the selected strategy and persist its model.
    pub fn service(&mut self, op: &str, args: &[String]) -> Result<TrainOutcome, ServiceError> {
        let kind = match op.to_ascii_lowercase().as_str() {
            OP_TRAIN_GRAPHNET => StrategyKind::GraphNet,
            OP_TRAIN_RULE => StrategyKind::RuleBased,
            OP_TRAIN_BAYES => StrategyKind::NaiveBayes,
            other => return Err(ServiceError::UnknownOp(other.to_string())),
        };

        self.ingest_args(kind, args)?;

        let workload = self.workload.clone();
        let classifier = self
            .bank
            .get_mut(kind)
            .ok_or(ServiceError::MissingBackend)?;
        let outcome = classifier.train(&self.dataset)?;
        classifier.save(&self.store, &workload)?;
        info!(
            kind = %kind,
            graphs = outcome.graphs,
            accuracy = ?outcome.accuracy,
            "training complete"
        );
        Ok(outcome)
    }

    fn ingest_args(&mut self, kind: StrategyKind, args: &[String]) -> Result<(), ServiceError> {
        match args {
            [] => Ok(()),
            [root] => self.ingest(Path::new(root), kind),
            // Orchestrated form: function name, tree prefix, then one
            // timestamped run directory per remaining argument.
            [function, prefix, timestamps @ ..] if !timestamps.is_empty() => {
                for ts in timestamps {
                    let mut path = PathBuf::from(prefix);
                    path.push(function);
                    path.push(ts);
                    self.ingest(&path, kind)?;
                }
                Ok(())
            }
            _ => Err(ServiceError::BadArgs(format!(
                "expected a scenario root or (function, prefix, timestamps...), got {} arguments",
                args.len()
            ))),
        }
    }

    fn ingest(&mut self, root: &Path, kind: StrategyKind) -> Result<(), ServiceError> {
        let added = self
            .dataset
            .ingest_tree(root, kind.projection(), &self.format)?;
        info!(
            root = %root.display(),
            scenarios = added,
            total = self.dataset.scenario_count(),
            "scenario tree ingested"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isotailor_learn::bayes::NaiveBayesClassifier;
    use isotailor_learn::rule::RuleBasedClassifier;
    use std::fs;
    use std::path::Path;

    fn bank() -> ClassifierBank {
        ClassifierBank {
            rule: Box::new(RuleBasedClassifier),
            bayes: Box::new(NaiveBayesClassifier::default()),
            graphnet: None,
        }
    }

    fn service(model_dir: &Path) -> TrainingService {
        TrainingService::new(
            "ycsb",
            TraceFormat::default(),
            ModelStore::new(model_dir),
            bank(),
        )
    }

    fn scenario(root: &Path, name: &str, label: &str, trace: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("label"), label).expect("label");
        fs::write(dir.join("t.trace"), trace).expect("trace");
    }

    #[test]
    fn train_rule_ingests_then_evaluates() {
        let models = tempfile::tempdir().expect("tempdir");
        let root = tempfile::tempdir().expect("tempdir");
        scenario(root.path(), "s0", "0.5,1.0,0.25", "1,9,1\n");

        let mut service = service(models.path());
        let outcome = service
            .service("train_rule", &[root.path().display().to_string()])
            .expect("train");

        assert_eq!(outcome.kind, StrategyKind::RuleBased);
        assert_eq!(outcome.graphs, 1);
        assert_eq!(outcome.accuracy, Some(1.0));
        assert_eq!(service.dataset().scenario_count(), 1);
    }

    #[test]
    fn train_bayse_persists_an_artifact() {
        let models = tempfile::tempdir().expect("tempdir");
        let root = tempfile::tempdir().expect("tempdir");
        for i in 0..5 {
            scenario(root.path(), &format!("r{i}"), "0.5,1.0,0.25", "1,9,1\n");
            scenario(root.path(), &format!("w{i}"), "0.25,0.5,1.0", "1,1,9\n");
        }

        let mut service = service(models.path());
        service
            .service("train_bayse", &[root.path().display().to_string()])
            .expect("train");

        assert!(models.path().join("ycsb.nb").is_file());
    }

    #[test]
    fn dataset_accumulates_across_calls() {
        let models = tempfile::tempdir().expect("tempdir");
        let root = tempfile::tempdir().expect("tempdir");
        scenario(root.path(), "s0", "1.0,0.5,0.25", "1,7,3\n");

        let mut service = service(models.path());
        let tree = root.path().display().to_string();
        service.service("train_rule", &[tree.clone()]).expect("first");
        service.service("train_rule", &[tree]).expect("second");
        assert_eq!(service.dataset().scenario_count(), 2);
    }

    #[test]
    fn orchestrated_args_join_prefix_function_timestamp() {
        let models = tempfile::tempdir().expect("tempdir");
        let root = tempfile::tempdir().expect("tempdir");
        let run = root.path().join("random-128").join("2025-08-06-10-00-00");
        fs::create_dir_all(&run).expect("mkdir");
        scenario(&run, "s0", "0.5,1.0,0.25", "1,9,1\n");

        let mut service = service(models.path());
        let outcome = service
            .service(
                "train_rule",
                &[
                    "random-128".to_string(),
                    root.path().display().to_string(),
                    "2025-08-06-10-00-00".to_string(),
                ],
            )
            .expect("train");
        assert_eq!(outcome.graphs, 1);
    }

    #[test]
    fn graphnet_without_backend_is_rejected() {
        let models = tempfile::tempdir().expect("tempdir");
        let mut service = service(models.path());
        let err = service.service("train", &[]).expect_err("must fail");
        assert!(matches!(err, ServiceError::MissingBackend));
    }

    #[test]
    fn unknown_op_is_rejected() {
        let models = tempfile::tempdir().expect("tempdir");
        let mut service = service(models.path());
        let err = service.service("train_svm", &[]).expect_err("must fail");
        assert!(matches!(err, ServiceError::UnknownOp(_)));
    }

    #[test]
    fn unlabeled_trees_train_nothing() {
        let models = tempfile::tempdir().expect("tempdir");
        let root = tempfile::tempdir().expect("tempdir");
        let dir = root.path().join("s0");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("t.trace"), "1,9,1\n").expect("trace");

        let mut service = service(models.path());
        let err = service
            .service("train_rule", &[root.path().display().to_string()])
            .expect_err("empty dataset");
        assert!(matches!(
            err,
            ServiceError::Classifier(isotailor_learn::classifier::ClassifierError::EmptyDataset)
        ));
    }
}
