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

//! Adapter server configuration.
//!
//! Loaded from a TOML file when one is given, otherwise defaults; a few
//! environment variables and the CLI can override individual fields.

use anyhow::{Context, Result};
use isotailor_core::trace::TraceFormat;
use isotailor_learn::bayes;
use isotailor_learn::classifier::StrategyKind;
use isotailor_learn::graphnet::{self, FitOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// IsoTailor adapter configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AdapterConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub trace: TraceSection,
    #[serde(default)]
    pub training: TrainingSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSection {
    /// TCP listen address for the single-client dispatcher.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSection {
    /// Directory holding per-workload model artifacts.
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TraceSection {
    /// Separates the node field from edge fields in trace files.
    #[serde(default = "default_field_delim")]
    pub field_delim: char,
    /// Separates values inside a field.
    #[serde(default = "default_record_delim")]
    pub record_delim: char,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrainingSection {
    /// Strategy served on the online path.
    #[serde(default = "default_strategy")]
    pub strategy: StrategyKind,
    /// Graph-net training epochs.
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    /// Graph-net batch size.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Hold-out fraction for the naive Bayes accuracy report.
    #[serde(default = "default_bayes_test_fraction")]
    pub bayes_test_fraction: f64,
    /// Hold-out fraction for the graph-net accuracy report.
    #[serde(default = "default_graph_test_fraction")]
    pub graph_test_fraction: f64,
}

fn default_listen_addr() -> String {
    "127.0.0.1:7654".to_string()
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_field_delim() -> char {
    '#'
}

fn default_record_delim() -> char {
    ','
}

fn default_strategy() -> StrategyKind {
    StrategyKind::NaiveBayes
}

fn default_epochs() -> usize {
    1000
}

fn default_batch_size() -> usize {
    16
}

fn default_bayes_test_fraction() -> f64 {
    bayes::DEFAULT_TEST_FRACTION
}

fn default_graph_test_fraction() -> f64 {
    graphnet::DEFAULT_TEST_FRACTION
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
        }
    }
}

impl Default for TraceSection {
    fn default() -> Self {
        Self {
            field_delim: default_field_delim(),
            record_delim: default_record_delim(),
        }
    }
}

impl Default for TrainingSection {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            bayes_test_fraction: default_bayes_test_fraction(),
            graph_test_fraction: default_graph_test_fraction(),
        }
    }
}

impl AdapterConfig {
    /// Load from a TOML file, or defaults when no path is given, then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Supported environment variables:
    /// - `ISOTAILOR_LISTEN_ADDR`: dispatcher listen address
    /// - `ISOTAILOR_MODEL_DIR`: model artifact directory
    fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var("ISOTAILOR_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Ok(dir) = std::env::var("ISOTAILOR_MODEL_DIR") {
            self.storage.model_dir = PathBuf::from(dir);
        }
    }

    pub fn trace_format(&self) -> TraceFormat {
        TraceFormat {
            field_delim: self.trace.field_delim,
            record_delim: self.trace.record_delim,
        }
    }

    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            epochs: self.training.epochs,
            batch_size: self.training.batch_size,
            ..FitOptions::default()
        }
    }
}
