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

//! Tangled - a peer-to-peer, append-only, content-addressed knowledge
//! store.
//!
//! This crate provides:
//! - The tangle core: a content-addressed DAG with proof-of-work-weighted
//!   tips (`core::hash`, `core::site`, `core::payload`, `core::tangle`).
//! - A durable two-bucket persistence layer over `sled` (`core::store`).
//! - A peer protocol for periodic diff-based synchronization and
//!   topologically ordered splice ingestion (`networking`).
//! - Monitoring via Prometheus metrics and structured tracing.

/// Core protocol primitives: hashing, the site/payload model, durable
/// storage, the in-memory DAG, and configuration.
pub mod core;
/// Observability (metrics, structured logging helpers).
pub mod monitoring;
/// P2P networking: identity, wire schema, transport, and peer protocol.
pub mod networking;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::core::errors::TangleError;
use crate::core::hash::Hash;
use crate::core::payload::Payload;
use crate::core::site::Site;
use crate::core::tangle::{IngestPath, Tangle};
use crate::monitoring::metrics::Metrics;

/// Capacity of the channel carrying locally accepted sites to the peer
/// protocol's push broadcaster.
const PUSH_CHANNEL_CAPACITY: usize = 256;

/// Ties the tangle and its metrics together for the local submission path
/// (`Add`), and forwards every successful submission to the peer
/// protocol's push broadcaster.
pub struct Node {
    /// The tangle itself; also shared with the peer protocol for verify
    /// and inject on the merge path.
    pub tangle: Arc<Tangle>,
    /// Shared Prometheus collectors.
    pub metrics: Arc<Metrics>,
    push_tx: mpsc::Sender<(Site, Payload)>,
}

impl Node {
    /// Wrap an already-open tangle and metrics handle. Returns the node
    /// plus the receiving end of the push channel, which the peer
    /// protocol's event loop should be given to `Peer::run`.
    pub fn new(tangle: Arc<Tangle>, metrics: Arc<Metrics>) -> (Self, mpsc::Receiver<(Site, Payload)>) {
        let (push_tx, push_rx) = mpsc::channel(PUSH_CHANNEL_CAPACITY);
        (
            Node {
                tangle,
                metrics,
                push_tx,
            },
            push_rx,
        )
    }

    /// Submit a locally constructed, already-mined site. On success, bumps
    /// `sites_accepted_total{path="local"}` and the size/tip-set gauges,
    /// then hands the site to the push broadcaster.
    pub fn submit(&self, site: Site, payload: Payload) -> Result<Hash, TangleError> {
        let hash = self.tangle.add(&site, &payload)?;
        self.metrics
            .sites_accepted_total
            .with_label_values(&[IngestPath::Local.as_label()])
            .inc();
        self.metrics.tangle_size.set(self.tangle.size() as i64);
        self.metrics.tip_set_size.set(self.tangle.tips().len() as i64);
        // Best-effort: a full push channel means the protocol loop is
        // behind, not that the local submission failed.
        let _ = self.push_tx.try_send((site, payload));
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::payload::ImagePayload;
    use crate::core::site::Site;

    fn open_temp_tangle() -> Tangle {
        let sites_dir = tempfile::tempdir().unwrap();
        let payload_dir = tempfile::tempdir().unwrap();
        let t = Tangle::open(
            sites_dir.path().to_str().unwrap(),
            payload_dir.path().to_str().unwrap(),
        )
        .unwrap();
        std::mem::forget(sites_dir);
        std::mem::forget(payload_dir);
        t
    }

    /// S8 - after a successful local add, the local-path counter and the
    /// size gauge both reflect it.
    #[test]
    fn s8_submit_updates_metrics() {
        let tangle = Arc::new(open_temp_tangle());
        let metrics = Arc::new(Metrics::new().unwrap());
        let (node, _push_rx) = Node::new(tangle.clone(), metrics.clone());

        let genesis = tangle.tips();
        let payload = Payload::Image(ImagePayload {
            bytes: b"s8".to_vec(),
        });
        let mut site = Site::new(genesis, payload.hash(), "image");
        site.mine(1);
        node.submit(site, payload).unwrap();

        assert_eq!(metrics.sites_accepted_total.with_label_values(&["local"]).get(), 1);
        assert_eq!(metrics.tangle_size.get(), 3);
    }
}
