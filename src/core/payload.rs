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

//! Polymorphic payload: the opaque content a site's `content` hash points
//! to. Tagged by the owning site's `type` field; unknown types are rejected
//! at ingest rather than treated as a plugin boundary (see the design notes
//! in the core's top-level docs).

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::core::errors::ValidationError;
use crate::core::hash::Hash;
use crate::core::signing::verify_ed25519;

/// Predetermined content hash of the first seeded genesis site. Fixed by the
/// protocol, not derived from a digest of arbitrary bytes.
pub const GENESIS_CONTENT_0: [u8; 32] = [
    0x18, 0x43, 0x44, 0x48, 0x84, 0xB5, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Predetermined content hash of the second seeded genesis site.
pub const GENESIS_CONTENT_1: [u8; 32] = [
    0x18, 0x43, 0x44, 0x48, 0x84, 0xB6, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// The two seeded genesis sites carry no meaningful content; the payload's
/// `marker` is the site's predetermined 32-byte content hash itself, held
/// verbatim rather than digested, so that `hash()` below reproduces one of
/// the two fixed constants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisPayload {
    /// The predetermined content hash, as raw bytes (`GENESIS_CONTENT_0` or
    /// `GENESIS_CONTENT_1`).
    pub marker: Vec<u8>,
}

/// A signed text post. `author` and `signature` are raw Ed25519 key/sig
/// bytes; verification is delegated to [`crate::core::signing`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPayload {
    /// Ed25519 public key of the author (32 bytes).
    pub author: [u8; 32],
    /// Opaque post body.
    pub text: Vec<u8>,
    /// Ed25519 signature over `text` (64 bytes).
    pub signature: [u8; 64],
}

impl PostPayload {
    /// Verify the author's signature over the post body.
    pub fn verify(&self) -> Result<(), ValidationError> {
        if verify_ed25519(&self.author, &self.text, &self.signature) {
            Ok(())
        } else {
            Err(ValidationError::PayloadUnverified(
                "post signature does not verify".to_string(),
            ))
        }
    }
}

/// Raw image bytes. Decoding/transcoding is an external collaborator (the
/// image-codec wrapper); this core only verifies the content hash matches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    /// Raw encoded image bytes, opaque to this core.
    pub bytes: Vec<u8>,
}

/// Tagged payload variant. New variants are a schema change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// Genesis marker payload.
    Genesis(GenesisPayload),
    /// Signed text post.
    Post(PostPayload),
    /// Raw image bytes.
    Image(ImagePayload),
}

/// Errors decoding a payload from its type tag and stored bytes.
#[derive(Debug, thiserror::Error)]
pub enum PayloadDecodeError {
    /// `type` is not one of the known variants.
    #[error("unknown payload type: {0}")]
    UnknownType(String),
    /// Stored bytes did not decode as the expected variant's body.
    #[error("malformed payload body: {0}")]
    Malformed(String),
}

impl Payload {
    /// The site `type` tag this variant is carried under.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Payload::Genesis(_) => "genesis",
            Payload::Post(_) => "post",
            Payload::Image(_) => "image",
        }
    }

    /// Content hash. Must equal the owning site's `content` field. Every
    /// variant but `genesis` is `Hash::digest` of the serialized body;
    /// `genesis` carries its predetermined content hash directly in
    /// `marker` rather than digesting it, since the two genesis content
    /// hashes are fixed constants, not digests of arbitrary payload bytes.
    pub fn hash(&self) -> Hash {
        match self {
            Payload::Genesis(g) => {
                let mut bytes = [0u8; 32];
                let n = g.marker.len().min(32);
                bytes[..n].copy_from_slice(&g.marker[..n]);
                Hash::from_bytes(bytes)
            }
            _ => Hash::digest(&self.serialize()),
        }
    }

    /// Serialize the payload body (no type tag; the owning site's `type`
    /// field carries that out-of-band).
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Payload::Genesis(g) => g.marker.clone(),
            Payload::Post(p) => bincode::serialize(p).expect("PostPayload encodes"),
            Payload::Image(i) => i.bytes.clone(),
        }
    }

    /// Reconstruct a payload from a site's `type` tag and stored bytes.
    pub fn deserialize(type_tag: &str, bytes: &[u8]) -> Result<Self, PayloadDecodeError> {
        match type_tag {
            "genesis" => Ok(Payload::Genesis(GenesisPayload {
                marker: bytes.to_vec(),
            })),
            "post" => {
                let p: PostPayload = bincode::deserialize(bytes)
                    .map_err(|e| PayloadDecodeError::Malformed(e.to_string()))?;
                Ok(Payload::Post(p))
            }
            "image" => Ok(Payload::Image(ImagePayload {
                bytes: bytes.to_vec(),
            })),
            other => Err(PayloadDecodeError::UnknownType(other.to_string())),
        }
    }

    /// Variant-specific verification. Only `post` carries one; other
    /// variants trivially pass (their only check is the content-hash match,
    /// performed by the tangle before this is ever called).
    pub fn verify(&self) -> Result<(), ValidationError> {
        match self {
            Payload::Post(p) => p.verify(),
            Payload::Genesis(_) | Payload::Image(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_each_variant() {
        let variants = vec![
            Payload::Genesis(GenesisPayload {
                marker: GENESIS_CONTENT_0.to_vec(),
            }),
            Payload::Image(ImagePayload {
                bytes: vec![0xff, 0xd8, 0xff],
            }),
        ];
        for v in variants {
            let tag = v.type_tag();
            let bytes = v.serialize();
            let back = Payload::deserialize(tag, &bytes).unwrap();
            assert_eq!(v, back);
            assert_eq!(v.hash(), back.hash());
        }
    }

    #[test]
    fn genesis_hash_is_the_fixed_content_constant_not_a_digest() {
        let g0 = Payload::Genesis(GenesisPayload {
            marker: GENESIS_CONTENT_0.to_vec(),
        });
        let g1 = Payload::Genesis(GenesisPayload {
            marker: GENESIS_CONTENT_1.to_vec(),
        });
        assert_eq!(g0.hash(), Hash::from_bytes(GENESIS_CONTENT_0));
        assert_eq!(g1.hash(), Hash::from_bytes(GENESIS_CONTENT_1));
        assert_ne!(g0.hash(), g1.hash());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = Payload::deserialize("video", b"whatever").unwrap_err();
        assert!(matches!(err, PayloadDecodeError::UnknownType(_)));
    }

    #[test]
    fn content_hash_matches_serialized_body() {
        let p = Payload::Image(ImagePayload {
            bytes: b"pretend-jpeg".to_vec(),
        });
        assert_eq!(p.hash(), Hash::digest(b"pretend-jpeg"));
    }
}
