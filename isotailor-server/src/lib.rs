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

//! IsoTailor Server
//!
//! The isolation-advisor service: one TCP connection multiplexing
//! offline training and online prediction requests over the configured
//! classification strategies.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod offline;
pub mod online;

pub use config::AdapterConfig;
pub use dispatcher::{Dispatcher, MAX_MESSAGE_BYTES, TRAIN_FINISHED_REPLY};
pub use error::ServiceError;
pub use offline::{ClassifierBank, TrainingService};
pub use online::PredictionService;

use anyhow::{bail, Result};
use isotailor_learn::bayes::NaiveBayesClassifier;
use isotailor_learn::classifier::{Classifier, StrategyKind};
use isotailor_learn::graphnet::{GraphNetBackend, GraphNetClassifier};
use isotailor_learn::rule::RuleBasedClassifier;
use isotailor_learn::store::ModelStore;
use std::sync::Arc;

/// Build both services and serve the one client connection.
///
/// `backend` is the external graph-net capability; without one the
/// graph-net strategy is unavailable and selecting it for the online
/// path is a startup error.
pub async fn run_server(
    config: AdapterConfig,
    workload: String,
    backend: Option<Arc<dyn GraphNetBackend>>,
) -> Result<()> {
    let format = config.trace_format();
    let store = ModelStore::new(config.storage.model_dir.clone());

    let graphnet = backend.clone().map(|backend| {
        Box::new(
            GraphNetClassifier::new(backend, config.fit_options()).with_split(
                config.training.graph_test_fraction,
                isotailor_learn::graphnet::DEFAULT_SPLIT_SEED,
            ),
        ) as Box<dyn Classifier>
    });
    let bank = ClassifierBank {
        rule: Box::new(RuleBasedClassifier),
        bayes: Box::new(new_bayes(&config)),
        graphnet,
    };
    let training = TrainingService::new(workload.clone(), format, store.clone(), bank);

    let serving: Box<dyn Classifier> = match config.training.strategy {
        StrategyKind::RuleBased => Box::new(RuleBasedClassifier),
        StrategyKind::NaiveBayes => Box::new(new_bayes(&config)),
        StrategyKind::GraphNet => match backend {
            Some(backend) => {
                Box::new(GraphNetClassifier::new(backend, config.fit_options()))
            }
            None => bail!("the graph-net strategy needs an inference backend"),
        },
    };
    let prediction = PredictionService::new(workload, format, store, serving);

    let dispatcher = Dispatcher::bind(&config.server.listen_addr).await?;
    dispatcher.serve(training, prediction).await
}

fn new_bayes(config: &AdapterConfig) -> NaiveBayesClassifier {
    NaiveBayesClassifier::new(
        config.training.bayes_test_fraction,
        isotailor_learn::bayes::DEFAULT_SPLIT_SEED,
    )
}
