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

//! Online prediction service.
//!
//! Serves one strategy, selected at construction. The model is loaded at
//! startup when an artifact exists, or lazily on the first request;
//! predicting with no model at all is fatal to the connection.

use crate::error::ServiceError;
use isotailor_core::trace::{TraceFormat, TraceGraph};
use isotailor_learn::classifier::Classifier;
use isotailor_learn::store::ModelStore;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Online operation names on the wire.
pub const OP_PREDICT: &str = "predict";
pub const OP_OK: &str = "ok";

/// Liveness probe reply.
pub const OK_REPLY: &str = "ok";

/// The online phase: parse one trace, answer with a strategy index.
pub struct PredictionService {
    workload: String,
    format: TraceFormat,
    store: ModelStore,
    classifier: Box<dyn Classifier>,
}

impl PredictionService {
    /// Build the service and try to load the strategy's artifact.
    pub fn new(
        workload: impl Into<String>,
        format: TraceFormat,
        store: ModelStore,
        mut classifier: Box<dyn Classifier>,
    ) -> Self {
        let workload = workload.into();
        match classifier.load(&store, &workload) {
            Ok(true) => info!(kind = %classifier.kind(), %workload, "model loaded"),
            Ok(false) => warn!(
                kind = %classifier.kind(),
                %workload,
                "no model artifact yet, will retry on first request"
            ),
            Err(err) => warn!(kind = %classifier.kind(), error = %err, "model load failed"),
        }
        Self {
            workload,
            format,
            store,
            classifier,
        }
    }

    /// Handle one online operation; the reply is the wire payload
    /// without the trailing newline.
    pub fn service(&mut self, op: &str, args: &[String]) -> Result<String, ServiceError> {
        match op.to_ascii_lowercase().as_str() {
            OP_OK => Ok(OK_REPLY.to_string()),
            OP_PREDICT => {
                let path = args
                    .first()
                    .ok_or_else(|| ServiceError::BadArgs("predict needs a trace path".into()))?;
                let level = self.predict(Path::new(path))?;
                Ok(level.index().to_string())
            }
            other => Err(ServiceError::UnknownOp(other.to_string())),
        }
    }

    fn predict(
        &mut self,
        path: &Path,
    ) -> Result<isotailor_core::strategy::IsolationLevel, ServiceError> {
        if !self.classifier.is_ready() {
            // Lazy load: the offline phase may have trained since startup.
            self.classifier.load(&self.store, &self.workload)?;
        }

        let started = Instant::now();
        let graph = TraceGraph::parse(path, self.classifier.projection(), &self.format)?;
        debug!(
            path = %path.display(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
            "trace loaded"
        );

        let level = self.classifier.predict(&graph)?;
        debug!(
            prediction = %level,
            elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
            "trace loaded and classified"
        );
        Ok(level)
    }
}
