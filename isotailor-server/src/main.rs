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

use anyhow::Result;
use clap::Parser;
use isotailor_learn::classifier::StrategyKind;
use isotailor_server::{run_server, AdapterConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Workload the models are keyed by
    #[arg(short, long, value_parser = ["ycsb", "tpcc", "smallbank"])]
    workload: String,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides config file)
    #[arg(long, env = "ISOTAILOR_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Model artifact directory (overrides config file)
    #[arg(long, env = "ISOTAILOR_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Online strategy (overrides config file)
    #[arg(long)]
    strategy: Option<StrategyKind>,
}

// All state is single-owner by design, so a current-thread runtime is
// enough: one connection, served sequentially.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = AdapterConfig::load(args.config.as_deref())?;
    if let Some(addr) = args.listen_addr {
        config.server.listen_addr = addr;
    }
    if let Some(model_dir) = args.model_dir {
        config.storage.model_dir = model_dir;
    }
    if let Some(strategy) = args.strategy {
        config.training.strategy = strategy;
    }

    // No graph-net backend is compiled into this binary; deployments
    // that serve the graph-net strategy inject one through run_server.
    run_server(config, args.workload, None).await
}
