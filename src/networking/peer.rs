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

//! The peer protocol: connection tracking, the periodic merge scheduler,
//! push broadcast, and splice ingestion with out-of-order buffering. Drives
//! a single [`libp2p::Swarm`] from one task, in the style of this
//! codebase's existing gossip loop, but speaking typed request/response RPC
//! instead of publish/subscribe.

#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt as _;
use libp2p::request_response::{self, OutboundRequestId};
use libp2p::swarm::SwarmEvent;
use libp2p::{identity, Multiaddr, PeerId, Swarm};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::core::config::HooksConfig;
use crate::core::errors::{TangleError, ValidationError};
use crate::core::hash::Hash;
use crate::core::payload::Payload;
use crate::core::site::Site;
use crate::core::tangle::{IngestPath, Tangle};
use crate::monitoring::metrics::Metrics;
use crate::networking::transport::{self, Behaviour, BehaviourEvent};
use crate::networking::wire::{InfoMsg, PeerRequest, PeerResponse, SiteMsg};

/// Map a rejection down to the label used by `validation_rejections_total`.
fn rejection_kind(e: &TangleError) -> &'static str {
    match e {
        TangleError::Validation(ValidationError::WeightTooLow) => "weight_too_low",
        TangleError::Validation(ValidationError::TooFewValidations) => "too_few_validations",
        TangleError::Validation(ValidationError::UnknownAncestor) => "unknown_ancestor",
        TangleError::Validation(ValidationError::ContentMismatch) => "content_mismatch",
        TangleError::Validation(ValidationError::HashMismatch) => "hash_mismatch",
        TangleError::Validation(ValidationError::PayloadUnverified(_)) => "payload_unverified",
        TangleError::Validation(ValidationError::NotValidating) => "not_validating",
        TangleError::Validation(ValidationError::InvalidSiteType(_)) => "invalid_site_type",
        TangleError::Storage(_) => "storage_error",
    }
}

const VERSION: &str = "tangled/1.0.0";

/// Connection-set state for a single remote endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnState {
    /// Outbound dial in flight.
    Dialing,
    /// Connected, idle.
    Connected,
    /// Actively streaming a splice.
    Syncing,
}

struct RemoteEntry {
    state: ConnState,
    peer_id: Option<PeerId>,
}

/// What an in-flight outbound request was for, so the response handler
/// knows how to interpret it.
enum PendingRequest {
    /// `GetInfo` sent as part of the periodic merge scheduler.
    MergeProbe,
    /// `GetInfo` sent in response to a reverse-handshake trigger.
    Handshake,
    /// `AddSite` push broadcast; no response handling beyond logging.
    Push,
    /// One `SpliceSite` within an in-progress merge.
    SpliceSite,
    /// The terminal `SpliceEnd` of a merge.
    SpliceEnd,
}

/// Drives the peer protocol for one node.
pub struct Peer {
    swarm: Swarm<Behaviour>,
    tangle: Arc<Tangle>,
    metrics: Arc<Metrics>,
    hooks: HooksConfig,
    local_listen_addr: String,
    http_client: reqwest::Client,
    connections: HashMap<String, RemoteEntry>,
    pending: HashMap<OutboundRequestId, PendingRequest>,
    splice_buffers: HashMap<PeerId, Vec<(Site, Payload, bool)>>,
}

impl Peer {
    /// Build a peer over a fresh swarm for the given identity, and dial the
    /// configured bootstrap addresses.
    pub fn new(
        id_keys: identity::Keypair,
        listen_addr: &str,
        bootstrap: &[String],
        hooks: HooksConfig,
        tangle: Arc<Tangle>,
        metrics: Arc<Metrics>,
    ) -> anyhow::Result<Self> {
        let mut swarm = transport::build_swarm(id_keys)?;
        let listen: Multiaddr = listen_addr.parse()?;
        swarm.listen_on(listen)?;

        let mut connections = HashMap::new();
        for addr in bootstrap {
            if !is_ipv4_multiaddr(addr) {
                warn!(addr, "bootstrap address is not IPv4; skipping");
                continue;
            }
            match addr.parse::<Multiaddr>() {
                Ok(ma) => match swarm.dial(ma) {
                    Ok(()) => {
                        connections.insert(
                            addr.clone(),
                            RemoteEntry {
                                state: ConnState::Dialing,
                                peer_id: None,
                            },
                        );
                        info!(addr, "dialing bootstrap peer");
                    }
                    Err(e) => warn!(addr, error = %e, "bootstrap dial failed"),
                },
                Err(_) => warn!(addr, "malformed bootstrap multiaddr; skipping"),
            }
        }

        Ok(Peer {
            swarm,
            tangle,
            metrics,
            hooks,
            local_listen_addr: listen_addr.to_string(),
            http_client: reqwest::Client::new(),
            connections,
            pending: HashMap::new(),
            splice_buffers: HashMap::new(),
        })
    }

    /// Run the event loop until `shutdown` resolves. `add_rx` carries
    /// locally accepted sites to push-broadcast to every connected remote.
    pub async fn run(
        mut self,
        mut add_rx: mpsc::Receiver<(Site, Payload)>,
        tick_interval: Duration,
        mut shutdown: tokio::sync::oneshot::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(tick_interval);
        ticker.tick().await; // the first tick fires immediately; skip it.

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("peer protocol loop shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_merge_cycle();
                }
                maybe_site = add_rx.recv() => {
                    match maybe_site {
                        Some((site, payload)) => self.push_broadcast(&site, &payload),
                        None => {
                            warn!("local add channel closed");
                        }
                    }
                }
                event = self.swarm.select_next_some() => {
                    self.handle_swarm_event(event);
                }
            }
        }
    }

    fn run_merge_cycle(&mut self) {
        self.metrics.merge_cycles_total.inc();
        let peers: Vec<PeerId> = self
            .connections
            .values()
            .filter(|e| e.state == ConnState::Connected)
            .filter_map(|e| e.peer_id)
            .collect();
        for peer_id in peers {
            let info = self.local_info();
            let id = self
                .swarm
                .behaviour_mut()
                .request_response
                .send_request(&peer_id, PeerRequest::GetInfo(info));
            self.pending.insert(id, PendingRequest::MergeProbe);
        }
    }

    fn local_info(&self) -> InfoMsg {
        let hashes = self.tangle.hashes().unwrap_or_default();
        InfoMsg {
            length: hashes.len() as u64,
            listen_interface: self.local_listen_addr.clone(),
            version: VERSION.to_string(),
            connections: self.connections.keys().cloned().collect(),
            hashes,
        }
    }

    fn push_broadcast(&mut self, site: &Site, payload: &Payload) {
        let msg = SiteMsg::from_parts(site, payload, true);
        if msg.check_size().is_err() {
            warn!("locally accepted site exceeds wire frame limit; not broadcasting");
            return;
        }
        let peers: Vec<PeerId> = self
            .connections
            .values()
            .filter(|e| e.state != ConnState::Dialing)
            .filter_map(|e| e.peer_id)
            .collect();
        for peer_id in peers {
            let id = self
                .swarm
                .behaviour_mut()
                .request_response
                .send_request(&peer_id, PeerRequest::AddSite(msg.clone()));
            self.pending.insert(id, PendingRequest::Push);
        }
    }

    /// Start a merge: send every locally-only hash (`deletions` from the
    /// remote's point of view) as a splice, then close the stream.
    fn start_merge(&mut self, peer_id: PeerId, targets: Vec<Hash>) {
        if let Some(entry) = self.find_entry_mut(&peer_id) {
            entry.state = ConnState::Syncing;
        }
        for h in targets {
            let Ok(Some((site, payload))) = self.tangle.get(&h) else {
                continue;
            };
            let is_tip = self.tangle.tips().contains(&h);
            let msg = SiteMsg::from_parts(&site, &payload, is_tip);
            if msg.check_size().is_err() {
                warn!(hash = %h, "site exceeds wire frame limit; skipping in merge");
                continue;
            }
            let id = self
                .swarm
                .behaviour_mut()
                .request_response
                .send_request(&peer_id, PeerRequest::SpliceSite(msg));
            self.pending.insert(id, PendingRequest::SpliceSite);
        }
        let id = self
            .swarm
            .behaviour_mut()
            .request_response
            .send_request(&peer_id, PeerRequest::SpliceEnd);
        self.pending.insert(id, PendingRequest::SpliceEnd);
    }

    fn find_entry_mut(&mut self, peer_id: &PeerId) -> Option<&mut RemoteEntry> {
        self.connections
            .values_mut()
            .find(|e| e.peer_id == Some(*peer_id))
    }

    fn handle_swarm_event(&mut self, event: SwarmEvent<BehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(%address, "listening");
            }
            SwarmEvent::ConnectionEstablished { peer_id, endpoint, .. } => {
                let addr = endpoint.get_remote_address().to_string();
                if !is_ipv4_multiaddr(&addr) {
                    warn!(%addr, "non-IPv4 remote; not tracking in connection set");
                } else {
                    self.connections.insert(
                        addr.clone(),
                        RemoteEntry {
                            state: ConnState::Connected,
                            peer_id: Some(peer_id),
                        },
                    );
                    self.metrics.connected_peers.inc();
                    info!(%peer_id, %addr, "peer connected");
                }
            }
            SwarmEvent::ConnectionClosed { peer_id, .. } => {
                let before = self.connections.len();
                self.connections.retain(|_, e| e.peer_id != Some(peer_id));
                if self.connections.len() != before {
                    self.metrics.connected_peers.dec();
                }
                self.splice_buffers.remove(&peer_id);
                info!(%peer_id, "peer disconnected");
            }
            SwarmEvent::OutgoingConnectionError { .. } => {
                self.connections.retain(|_, e| e.state != ConnState::Dialing);
            }
            SwarmEvent::Behaviour(BehaviourEvent::RequestResponse(ev)) => {
                self.handle_request_response_event(ev);
            }
            SwarmEvent::Behaviour(BehaviourEvent::Identify(_)) => {}
            SwarmEvent::Behaviour(BehaviourEvent::Ping(_)) => {}
            _ => {}
        }
    }

    fn handle_request_response_event(
        &mut self,
        event: request_response::Event<PeerRequest, PeerResponse>,
    ) {
        match event {
            request_response::Event::Message { peer, message } => match message {
                request_response::Message::Request { request, channel, .. } => {
                    self.handle_inbound_request(peer, request, channel);
                }
                request_response::Message::Response { request_id, response } => {
                    self.handle_inbound_response(peer, request_id, response);
                }
            },
            request_response::Event::OutboundFailure { peer, request_id, error } => {
                self.pending.remove(&request_id);
                warn!(%peer, %error, "outbound request failed");
            }
            request_response::Event::InboundFailure { peer, error, .. } => {
                warn!(%peer, %error, "inbound request failed");
            }
            request_response::Event::ResponseSent { .. } => {}
        }
    }

    fn handle_inbound_request(
        &mut self,
        peer: PeerId,
        request: PeerRequest,
        channel: request_response::ResponseChannel<PeerResponse>,
    ) {
        let response = match request {
            PeerRequest::GetInfo(remote_info) => {
                let known = self.connections.contains_key(&remote_info.listen_interface);
                if !known
                    && remote_info.listen_interface != self.local_listen_addr
                    && is_ipv4_multiaddr(&remote_info.listen_interface)
                {
                    if let Ok(addr) = remote_info.listen_interface.parse::<Multiaddr>() {
                        let _ = self.swarm.dial(addr);
                    }
                }
                PeerResponse::Info(self.local_info())
            }
            PeerRequest::AddSite(msg) => self.ingest_pushed_site(msg),
            PeerRequest::SpliceSite(msg) => self.buffer_or_inject(peer, msg),
            PeerRequest::SpliceEnd => self.drain_splice_buffer(peer),
        };
        let _ = self
            .swarm
            .behaviour_mut()
            .request_response
            .send_response(channel, response);
    }

    fn ingest_pushed_site(&mut self, msg: SiteMsg) -> PeerResponse {
        let (site, payload, _tip) = match msg.into_parts() {
            Ok(v) => v,
            Err(e) => return PeerResponse::Error { reason: e.to_string() },
        };
        self.run_pre_accept_hook_blocking_skip(&site);
        match self.tangle.inject(&site, &payload, true) {
            Ok(_) => {
                self.metrics.sites_accepted_total.with_label_values(&[IngestPath::Merge.as_label()]).inc();
                self.metrics.tangle_size.set(self.tangle.size() as i64);
                PeerResponse::Ack
            }
            Err(e) => {
                self.metrics
                    .validation_rejections_total
                    .with_label_values(&[rejection_kind(&e)])
                    .inc();
                PeerResponse::Error { reason: e.to_string() }
            }
        }
    }

    /// Pre-accept hook is strictly best-effort and must never block
    /// ingestion; fire-and-forget on the runtime instead of awaiting here
    /// (this handler is synchronous, called from the swarm poll loop).
    fn run_pre_accept_hook_blocking_skip(&self, site: &Site) {
        let Some(url) = self.hooks.pre_accept_url.clone() else {
            return;
        };
        let client = self.http_client.clone();
        let hash = site.hash().to_base64();
        let public_endpoint = self.local_listen_addr.clone();
        let outcomes = self.metrics.clone();
        tokio::spawn(async move {
            let result = client
                .get(&url)
                .query(&[("hash", hash.as_str()), ("pub", public_endpoint.as_str())])
                .send()
                .await;
            match result {
                Ok(resp) if resp.status().is_success() => outcomes.pre_accept_hook_ok_total.inc(),
                Ok(resp) => {
                    warn!(status = %resp.status(), "pre-accept hook returned non-success");
                    outcomes.pre_accept_hook_failed_total.inc();
                }
                Err(e) => {
                    warn!(error = %e, "pre-accept hook request failed");
                    outcomes.pre_accept_hook_failed_total.inc();
                }
            }
        });
    }

    fn buffer_or_inject(&mut self, peer: PeerId, msg: SiteMsg) -> PeerResponse {
        let (site, payload, tip) = match msg.into_parts() {
            Ok(v) => v,
            Err(e) => return PeerResponse::Error { reason: e.to_string() },
        };
        if self.ancestors_known(&site) {
            if let Err(e) = self.tangle.inject(&site, &payload, tip) {
                warn!(error = %e, "splice site rejected on immediate injection");
                self.metrics
                    .validation_rejections_total
                    .with_label_values(&[rejection_kind(&e)])
                    .inc();
            } else {
                self.metrics.sites_accepted_total.with_label_values(&[IngestPath::Merge.as_label()]).inc();
            }
        } else {
            self.splice_buffers.entry(peer).or_default().push((site, payload, tip));
        }
        PeerResponse::Ack
    }

    fn ancestors_known(&self, site: &Site) -> bool {
        site.validates.iter().all(|v| self.tangle.contains(v).unwrap_or(false))
    }

    fn drain_splice_buffer(&mut self, peer: PeerId) -> PeerResponse {
        if let Some(entry) = self.find_entry_mut(&peer) {
            entry.state = ConnState::Connected;
        }
        let mut buffer = self.splice_buffers.remove(&peer).unwrap_or_default();
        let mut high_water = buffer.len();
        loop {
            let before = buffer.len();
            let mut remaining = Vec::with_capacity(buffer.len());
            for (site, payload, tip) in buffer.into_iter() {
                if self.ancestors_known(&site) {
                    match self.tangle.inject(&site, &payload, tip) {
                        Ok(_) => self.metrics.sites_accepted_total.with_label_values(&[IngestPath::Merge.as_label()]).inc(),
                        Err(e) => {
                            warn!(error = %e, "buffered splice site rejected");
                            self.metrics
                                .validation_rejections_total
                                .with_label_values(&[rejection_kind(&e)])
                                .inc();
                        }
                    }
                } else {
                    remaining.push((site, payload, tip));
                }
            }
            high_water = high_water.max(remaining.len());
            if remaining.is_empty() {
                self.metrics.splice_buffer_high_water.set(high_water as i64);
                self.metrics.tangle_size.set(self.tangle.size() as i64);
                return PeerResponse::Success;
            }
            if remaining.len() == before {
                self.metrics.merge_failures_total.inc();
                self.metrics.splice_buffer_high_water.set(high_water as i64);
                return PeerResponse::Error {
                    reason: "merge failed: splice buffer made no progress".to_string(),
                };
            }
            buffer = remaining;
        }
    }

    fn handle_inbound_response(
        &mut self,
        peer: PeerId,
        request_id: OutboundRequestId,
        response: PeerResponse,
    ) {
        let Some(kind) = self.pending.remove(&request_id) else {
            return;
        };
        match (kind, response) {
            (PendingRequest::MergeProbe, PeerResponse::Info(remote)) => {
                self.diff_and_merge(peer, remote);
            }
            (PendingRequest::Handshake, PeerResponse::Info(_)) => {}
            (PendingRequest::Push, _) => {}
            (PendingRequest::SpliceSite, _) => {}
            (PendingRequest::SpliceEnd, PeerResponse::Error { reason }) => {
                self.metrics.merge_failures_total.inc();
                warn!(%peer, reason, "merge failed");
            }
            (PendingRequest::SpliceEnd, _) => {
                if let Some(entry) = self.find_entry_mut(&peer) {
                    entry.state = ConnState::Connected;
                }
            }
            _ => {}
        }
    }

    fn diff_and_merge(&mut self, peer: PeerId, remote: InfoMsg) {
        let local: HashSet<Hash> = self.tangle.hashes().unwrap_or_default().into_iter().collect();
        let remote_set: HashSet<Hash> = remote.hashes.into_iter().collect();
        let local_sorted: std::collections::BTreeSet<Hash> = local.iter().copied().collect();
        let remote_sorted: std::collections::BTreeSet<Hash> = remote_set.iter().copied().collect();
        let (_additions, deletions) = Hash::diff(&local_sorted, &remote_sorted);
        if deletions.is_empty() {
            return;
        }
        self.start_merge(peer, deletions);
    }
}

/// Whether `addr` (either a multiaddr string or an already-parsed one)
/// begins with an IPv4 `/ip4/` component. IPv6 endpoints are logged and
/// skipped rather than tracked, per the connection-set rule.
fn is_ipv4_multiaddr(addr: &str) -> bool {
    addr.starts_with("/ip4/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_multiaddrs_are_recognized() {
        assert!(is_ipv4_multiaddr("/ip4/127.0.0.1/tcp/4001"));
        assert!(!is_ipv4_multiaddr("/ip6/::1/tcp/4001"));
        assert!(!is_ipv4_multiaddr("garbage"));
    }
}
