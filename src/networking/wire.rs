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

//! Wire message schemas for the peer protocol, carried over the
//! `request_response` CBOR codec. `Splice` has no native client-streaming
//! support in that codec, so it is modeled as a sequence of `SpliceSite`
//! requests terminated by one `SpliceEnd` request; the receiver's reply to
//! each is `Ack`, and the reply to `SpliceEnd` is the final `SuccessReturn`.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::core::hash::Hash;
use crate::core::payload::Payload;
use crate::core::site::Site;

/// Hard cap on any single frame, enforced sender-side before a request is
/// handed to the transport.
pub const MAX_MESSAGE_SIZE: usize = 5 * 1024 * 1024;

/// `Info` message: a remote's self-description plus its complete hash set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InfoMsg {
    /// Byte length of the encoded `hashes` field, reported for diagnostics.
    pub length: u64,
    /// The sender's listen multiaddr.
    pub listen_interface: String,
    /// Protocol/implementation version string.
    pub version: String,
    /// The sender's known connection endpoints.
    pub connections: Vec<String>,
    /// The sender's complete set of known site hashes.
    pub hashes: Vec<Hash>,
}

/// A site plus its payload, as exchanged over the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SiteMsg {
    /// Validated ancestor hashes, in order.
    pub validates: Vec<Hash>,
    /// Mined nonce.
    pub nonce: u64,
    /// Content hash.
    pub content: Hash,
    /// Payload type tag.
    #[serde(rename = "type")]
    pub site_type: String,
    /// Raw payload bytes.
    pub data: Vec<u8>,
    /// Whether the sender considers this site a current tip.
    pub tip: bool,
}

/// Errors converting between [`SiteMsg`] and the core `(Site, Payload)` pair.
#[derive(Debug, thiserror::Error)]
pub enum WireCodecError {
    /// The payload bytes did not decode under the declared type.
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] crate::core::payload::PayloadDecodeError),
    /// The encoded frame exceeded [`MAX_MESSAGE_SIZE`].
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),
}

impl SiteMsg {
    /// Build a wire message from a site and its payload.
    pub fn from_parts(site: &Site, payload: &Payload, tip: bool) -> Self {
        SiteMsg {
            validates: site.validates.clone(),
            nonce: site.nonce,
            content: site.content,
            site_type: site.site_type.clone(),
            data: payload.serialize(),
            tip,
        }
    }

    /// Reconstruct the `(Site, Payload)` pair this message carries.
    pub fn into_parts(self) -> Result<(Site, Payload, bool), WireCodecError> {
        let payload = Payload::deserialize(&self.site_type, &self.data)?;
        let site = Site::new(self.validates, self.content, self.site_type);
        let mut site = site;
        site.nonce = self.nonce;
        Ok((site, payload, self.tip))
    }

    /// Reject the message before decoding if its encoded size would exceed
    /// the wire limit. Call on the sender side, before handing the request
    /// to the transport.
    pub fn check_size(&self) -> Result<(), WireCodecError> {
        let encoded = bincode::serialize(self).unwrap_or_default();
        if encoded.len() > MAX_MESSAGE_SIZE {
            return Err(WireCodecError::FrameTooLarge(encoded.len()));
        }
        Ok(())
    }
}

/// Top-level request envelope for the peer protocol's request/response
/// behaviour.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PeerRequest {
    /// Handshake: exchange self-description and hash sets.
    GetInfo(InfoMsg),
    /// Push path: a single accepted site broadcast to a remote.
    AddSite(SiteMsg),
    /// One site in an in-progress splice stream.
    SpliceSite(SiteMsg),
    /// Marks the end of a splice stream.
    SpliceEnd,
}

/// Top-level response envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PeerResponse {
    /// Reply to `GetInfo`.
    Info(InfoMsg),
    /// Acknowledges a single `AddSite` or `SpliceSite` request.
    Ack,
    /// Terminal reply to `SpliceEnd`, or to any request the receiver
    /// otherwise considers complete.
    Success,
    /// The request was rejected; `reason` is a human-readable summary.
    Error {
        /// Why the request was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::payload::ImagePayload;

    #[test]
    fn site_msg_round_trips_through_parts() {
        let payload = Payload::Image(ImagePayload {
            bytes: b"frame".to_vec(),
        });
        let mut site = Site::new(vec![Hash::digest(b"a"), Hash::digest(b"b")], payload.hash(), "image");
        site.mine(1);

        let msg = SiteMsg::from_parts(&site, &payload, true);
        msg.check_size().unwrap();
        let (back_site, back_payload, tip) = msg.into_parts().unwrap();
        assert_eq!(back_site, site);
        assert_eq!(back_payload, payload);
        assert!(tip);
    }

    #[test]
    fn oversized_frame_is_rejected_before_send() {
        let payload = Payload::Image(ImagePayload {
            bytes: vec![0u8; MAX_MESSAGE_SIZE + 1],
        });
        let site = Site::new(vec![], payload.hash(), "image");
        let msg = SiteMsg::from_parts(&site, &payload, false);
        let err = msg.check_size().unwrap_err();
        assert!(matches!(err, WireCodecError::FrameTooLarge(_)));
    }

    #[test]
    fn unknown_type_fails_to_reconstruct() {
        let msg = SiteMsg {
            validates: vec![],
            nonce: 0,
            content: Hash::digest(b"x"),
            site_type: "video".to_string(),
            data: vec![],
            tip: false,
        };
        assert!(msg.into_parts().is_err());
    }
}
