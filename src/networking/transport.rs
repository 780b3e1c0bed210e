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

//! Swarm construction: TCP + Noise + Yamux transport carrying the peer
//! protocol's request/response behaviour, plus identify and ping. This
//! mirrors the transport stack used elsewhere in this codebase for gossip,
//! with the publish/subscribe behaviour swapped for typed RPC.

#![forbid(unsafe_code)]

use std::time::Duration;

use libp2p::request_response::{self, ProtocolSupport};
use libp2p::swarm::{NetworkBehaviour, Swarm};
use libp2p::{identify, identity, noise, tcp, yamux, PeerId, StreamProtocol, Transport};
use thiserror::Error;

use crate::networking::wire::{PeerRequest, PeerResponse};

/// Failures building the libp2p swarm.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Noise handshake keys could not be derived from the identity keypair.
    #[error("failed to build noise transport config")]
    Noise,
}

/// Events bubbled up from the composed behaviour.
#[derive(Debug)]
pub enum BehaviourEvent {
    /// A peer-protocol request or response.
    RequestResponse(request_response::Event<PeerRequest, PeerResponse>),
    /// Identify handshake info.
    Identify(identify::Event),
    /// Keepalive ping result.
    Ping(libp2p::ping::Event),
}

impl From<request_response::Event<PeerRequest, PeerResponse>> for BehaviourEvent {
    fn from(e: request_response::Event<PeerRequest, PeerResponse>) -> Self {
        BehaviourEvent::RequestResponse(e)
    }
}

impl From<identify::Event> for BehaviourEvent {
    fn from(e: identify::Event) -> Self {
        BehaviourEvent::Identify(e)
    }
}

impl From<libp2p::ping::Event> for BehaviourEvent {
    fn from(e: libp2p::ping::Event) -> Self {
        BehaviourEvent::Ping(e)
    }
}

/// The node's combined libp2p behaviour.
#[derive(NetworkBehaviour)]
#[behaviour(to_swarm = "BehaviourEvent")]
pub struct Behaviour {
    pub request_response: request_response::cbor::Behaviour<PeerRequest, PeerResponse>,
    pub identify: identify::Behaviour,
    pub ping: libp2p::ping::Behaviour,
}

/// Protocol name advertised during stream negotiation.
pub const PROTOCOL_NAME: &str = "/tangled/peer/1.0.0";

/// Build a ready-to-listen swarm for the given identity.
pub fn build_swarm(id_keys: identity::Keypair) -> Result<Swarm<Behaviour>, TransportError> {
    let local_peer_id = PeerId::from(id_keys.public());

    let noise_keys = noise::Config::new(&id_keys).map_err(|_| TransportError::Noise)?;

    let transport = tcp::tokio::Transport::new(tcp::Config::default().nodelay(true))
        .upgrade(libp2p::core::upgrade::Version::V1)
        .authenticate(noise_keys)
        .multiplex(yamux::Config::default())
        .boxed();

    let request_response = request_response::cbor::Behaviour::new(
        [(StreamProtocol::new(PROTOCOL_NAME), ProtocolSupport::Full)],
        request_response::Config::default().with_request_timeout(Duration::from_secs(30)),
    );

    let identify = identify::Behaviour::new(identify::Config::new(
        "tangled/1.0.0".to_string(),
        id_keys.public(),
    ));

    let ping = libp2p::ping::Behaviour::new(
        libp2p::ping::Config::new()
            .with_interval(Duration::from_secs(10))
            .with_timeout(Duration::from_secs(20)),
    );

    let behaviour = Behaviour {
        request_response,
        identify,
        ping,
    };

    Ok(Swarm::new(
        transport,
        behaviour,
        local_peer_id,
        libp2p::swarm::Config::with_tokio_executor(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_swarm_from_fresh_identity() {
        let keys = identity::Keypair::generate_ed25519();
        let swarm = build_swarm(keys).unwrap();
        assert!(swarm.local_peer_id().to_string().starts_with("12D3Koo"));
    }
}
