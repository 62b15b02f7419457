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

//! Per-workload model persistence.
//!
//! Artifacts live under one directory as `<workload>.<ext>` where the
//! extension is strategy-specific. A missing artifact on load is not an
//! error: callers treat absence as "train from scratch".

use crate::classifier::StrategyKind;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised while persisting or loading model artifacts.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Codec {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
}

/// File-system model store rooted at one directory.
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Artifact path for `(workload, kind)`; `None` for strategies that
    /// carry no artifact.
    pub fn model_path(&self, workload: &str, kind: StrategyKind) -> Option<PathBuf> {
        kind.extension()
            .map(|ext| self.root.join(format!("{workload}.{ext}")))
    }

    /// Persist a model, replacing any previous artifact wholesale.
    pub fn save<M: Serialize>(
        &self,
        workload: &str,
        kind: StrategyKind,
        model: &M,
    ) -> Result<Option<PathBuf>, StoreError> {
        let Some(path) = self.model_path(workload, kind) else {
            return Ok(None);
        };
        std::fs::create_dir_all(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })?;
        let file = File::create(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        bincode::serialize_into(BufWriter::new(file), model).map_err(|source| {
            StoreError::Codec {
                path: path.clone(),
                source,
            }
        })?;
        debug!(path = %path.display(), %kind, "model saved");
        Ok(Some(path))
    }

    /// Load a model if its artifact exists.
    pub fn load<M: DeserializeOwned>(
        &self,
        workload: &str,
        kind: StrategyKind,
    ) -> Result<Option<M>, StoreError> {
        let Some(path) = self.model_path(workload, kind) else {
            return Ok(None);
        };
        if !path.is_file() {
            return Ok(None);
        }
        let file = File::open(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let model =
            bincode::deserialize_from(BufReader::new(file)).map_err(|source| StoreError::Codec {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), %kind, "model loaded");
        Ok(Some(model))
    }
}
