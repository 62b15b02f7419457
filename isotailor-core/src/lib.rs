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

//! IsoTailor Core
//!
//! Data model and deterministic pipeline for the isolation advisor:
//! execution-trace parsing, dependency-graph construction, goodput label
//! aggregation, and labeled dataset assembly.

pub mod dataset;
pub mod label;
pub mod strategy;
pub mod trace;

pub use dataset::{DatasetError, GraphDataset};
pub use label::{aggregate, aggregate_tree, Label, LabelError, SUMMARY_SUFFIX};
pub use strategy::{IsolationLevel, UnknownStrategy, STRATEGY_COUNT};
pub use trace::{Edge, Node, Projection, TraceError, TraceFormat, TraceGraph};
