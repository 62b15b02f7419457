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

//! Service-level error types.

use isotailor_core::dataset::DatasetError;
use isotailor_core::trace::TraceError;
use isotailor_learn::classifier::ClassifierError;
use thiserror::Error;

/// Errors raised by the training and prediction services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unknown operation: {0}")]
    UnknownOp(String),

    #[error("bad request arguments: {0}")]
    BadArgs(String),

    /// The graph-net strategy was requested but no backend is wired in.
    #[error("the graph-net strategy has no backend configured")]
    MissingBackend,

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}
