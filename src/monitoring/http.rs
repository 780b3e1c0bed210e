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

//! The node's minimal HTTP surface: a Prometheus `/metrics` endpoint and a
//! `/healthz` liveness probe. This is ambient observability, not the
//! excluded REST/API surface.

#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderName;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, TextEncoder};
use tokio::signal;
use tracing::{error, info};

use crate::monitoring::metrics::Metrics;

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> ([(HeaderName, String); 1], Vec<u8>) {
    let encoder = TextEncoder::new();
    let families = metrics.registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buf) {
        error!(error = %e, "failed to encode prometheus metrics");
    }
    ([(CONTENT_TYPE, encoder.format_type().to_string())], buf)
}

async fn healthz_handler() -> &'static str {
    "OK"
}

/// Serve `/metrics` and `/healthz` on `addr` until the process receives
/// Ctrl-C.
pub async fn run_server(addr: SocketAddr, metrics: Arc<Metrics>) {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(metrics);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind monitoring http server");
            return;
        }
    };
    info!(%addr, "monitoring http server listening");

    let graceful = axum::serve(listener, app.into_make_service()).with_graceful_shutdown(async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install ctrl-c handler");
        }
    });

    if let Err(e) = graceful.await {
        error!(error = %e, "monitoring http server error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn metrics_handler_encodes_registered_families() {
        let metrics = Arc::new(Metrics::new().unwrap());
        metrics.tangle_size.set(3);
        let (_headers, body) = metrics_handler(State(metrics)).await;
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("tangled_tangle_size"));
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        assert_eq!(healthz_handler().await, "OK");
    }
}
