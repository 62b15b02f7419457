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

//! IsoTailor Learn
//!
//! Interchangeable classification strategies over labeled trace-graph
//! datasets, the opaque graph-net training backend interface, and the
//! per-workload model store.

pub mod bayes;
pub mod classifier;
pub mod graphnet;
pub mod rule;
pub mod store;

pub use bayes::{GaussianNb, NaiveBayesClassifier};
pub use classifier::{Classifier, ClassifierError, StrategyKind, TrainOutcome, UnknownStrategyKind};
pub use graphnet::{
    FitOptions, GraphFeatures, GraphNetBackend, GraphNetClassifier, GraphNetModel, TrainExample,
};
pub use rule::RuleBasedClassifier;
pub use store::{ModelStore, StoreError};
