// Copyright (c) 2026 Tangled
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Tangled node entrypoint (systemd-friendly). Loads configuration, opens
//! the tangle, and keeps the peer protocol and monitoring surface alive
//! until shutdown.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{error, info, warn};

use tangled::core::config::NodeConfig;
use tangled::core::tangle::Tangle;
use tangled::monitoring::metrics::Metrics;
use tangled::monitoring::http;
use tangled::networking::p2p_identity;
use tangled::networking::peer::Peer;
use tangled::Node;

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn init_tracing(format: &str) {
    let result = if format == "json" {
        tracing_subscriber::fmt().with_target(false).json().try_init()
    } else {
        tracing_subscriber::fmt().with_target(false).compact().try_init()
    };
    if result.is_err() {
        eprintln!("tracing subscriber already initialized");
    }
}

#[tokio::main]
async fn main() {
    let config_path = env("TANGLED_CONFIG", "./tangled.toml");

    let cfg = match NodeConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config {config_path}: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(&cfg.logging.format);
    info!(node = %cfg.node.name, data_dir = %cfg.node.data_dir, "tangled node starting");

    let tangle = match Tangle::open(&cfg.storage.site_path, &cfg.storage.payload_path) {
        Ok(t) => Arc::new(t),
        Err(e) => {
            error!(error = %e, "failed to open tangle");
            std::process::exit(1);
        }
    };

    let metrics = match Metrics::new() {
        Ok(m) => Arc::new(m),
        Err(e) => {
            error!(error = %e, "failed to initialize metrics");
            std::process::exit(1);
        }
    };
    metrics.tangle_size.set(tangle.size() as i64);
    metrics.tip_set_size.set(tangle.tips().len() as i64);

    let (id_keys, peer_id) = match p2p_identity::load_or_create_identity(&cfg.node.data_dir) {
        Ok((peer_id, kp)) => (kp, peer_id),
        Err(e) => {
            error!(?e, "failed to load or create p2p identity");
            std::process::exit(1);
        }
    };
    info!(%peer_id, "p2p identity loaded");

    let (node, push_rx) = Node::new(tangle.clone(), metrics.clone());
    let node = Arc::new(node);

    let peer = match Peer::new(
        id_keys,
        &cfg.network.listen_addr,
        &cfg.network.bootstrap,
        cfg.hooks.clone(),
        tangle.clone(),
        metrics.clone(),
    ) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to start peer protocol");
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let tick_interval = std::time::Duration::from_secs(cfg.network.tick_seconds);
    let peer_task = tokio::spawn(peer.run(push_rx, tick_interval, shutdown_rx));

    let http_addr: std::net::SocketAddr = match cfg.monitoring.listen_addr.parse() {
        Ok(a) => a,
        Err(e) => {
            error!(addr = %cfg.monitoring.listen_addr, error = %e, "invalid monitoring listen address");
            std::process::exit(1);
        }
    };
    let http_metrics = metrics.clone();
    let http_task = tokio::spawn(http::run_server(http_addr, http_metrics));

    // Keep the node handle reachable for the local submission path even
    // though nothing in this binary calls `submit` yet; future client
    // surfaces (CLI, RPC) will reuse this same `Node`.
    let _node = node;

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install ctrl-c handler");
    }
    info!("shutdown requested");
    let _ = shutdown_tx.send(());

    if let Err(e) = peer_task.await {
        warn!(error = %e, "peer task did not shut down cleanly");
    }
    http_task.abort();
}
