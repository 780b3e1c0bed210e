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

//! Networking: persistent libp2p identity, the peer-protocol wire schema,
//! swarm/transport construction, and the peer protocol's event loop.

/// Per-remote protocol state machine, merge scheduler, splice buffering.
pub mod peer;
/// Persistent Ed25519 node identity, keyed by data directory.
pub mod p2p_identity;
/// Swarm and behaviour construction (TCP + Noise + Yamux + request/response).
pub mod transport;
/// Wire message schemas for the peer protocol.
pub mod wire;
