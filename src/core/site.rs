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

//! The immutable DAG node: a set of validations, a mined nonce, a content
//! hash, and a type tag. Sites are never mutated after construction; the
//! hash is a pure function of their fields, so two sites with the same
//! hash must be structurally identical.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::hash::Hash;

/// Minimum number of validations a non-genesis site must carry.
pub const MINIMUM_VALIDATIONS: usize = 2;

/// A single immutable DAG node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Prior sites this one attests to. Order matters: it is folded into
    /// the hash, so two sites validating the same set in different orders
    /// hash differently.
    pub validates: Vec<Hash>,
    /// Varied during mining; otherwise opaque.
    pub nonce: u64,
    /// Hash of the payload this site carries.
    pub content: Hash,
    /// Lowercase tag identifying the payload variant ("genesis", "post",
    /// "image", ...). Renamed to `type` on the wire to match the protocol
    /// schema; kept as `site_type` in source since `type` is a keyword.
    #[serde(rename = "type")]
    pub site_type: String,
}

/// Errors decoding a `Site` from its stable binary encoding.
#[derive(Debug, Error)]
pub enum SiteDecodeError {
    /// The bincode payload did not decode as a `Site`.
    #[error("malformed site encoding: {0}")]
    Malformed(String),
}

impl Site {
    /// Construct a new, unmined site. Callers typically follow this with
    /// [`Site::mine`] before submission.
    pub fn new(validates: Vec<Hash>, content: Hash, site_type: impl Into<String>) -> Self {
        Site {
            validates,
            nonce: 0,
            content,
            site_type: site_type.into(),
        }
    }

    /// Deterministic hash over `(content, nonce, validates[*].hash)` via the
    /// fixed textual template: `"C" || base64(content) || "N" || dec(nonce)
    /// || for each v: "V" || base64(v.hash)`.
    pub fn hash(&self) -> Hash {
        let mut buf = String::with_capacity(64 + self.validates.len() * 48);
        buf.push('C');
        buf.push_str(&self.content.to_base64());
        buf.push('N');
        buf.push_str(&self.nonce.to_string());
        for v in &self.validates {
            buf.push('V');
            buf.push_str(&v.to_base64());
        }
        Hash::digest(buf.as_bytes())
    }

    /// Increment `nonce` until `hash().weight() >= target_weight`. Pure:
    /// mutates only `nonce`, leaves every other field untouched. Finite but
    /// worst-case exponential in `target_weight` - this is proof-of-work by
    /// design, and deliberately kept off the tangle's write path (see
    /// `Site::mine` callers in `tangle::genesis_site`).
    pub fn mine(&mut self, target_weight: usize) {
        while self.hash().weight() < target_weight {
            self.nonce = self.nonce.wrapping_add(1);
        }
    }

    /// Stable binary encoding (bincode), used for both the site store and
    /// the wire protocol.
    pub fn serialize(&self) -> Vec<u8> {
        bincode::serialize(self).expect("Site encodes under bincode")
    }

    /// Inverse of [`Site::serialize`].
    pub fn deserialize(bytes: &[u8]) -> Result<Self, SiteDecodeError> {
        bincode::deserialize(bytes).map_err(|e| SiteDecodeError::Malformed(e.to_string()))
    }

    /// Whether this site is tagged as one of the two seeded genesis sites.
    pub fn is_genesis(&self) -> bool {
        self.site_type == "genesis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(label: &[u8]) -> Hash {
        Hash::digest(label)
    }

    #[test]
    fn hash_is_deterministic_over_fields() {
        let s1 = Site::new(vec![leaf(b"a"), leaf(b"b")], Hash::digest(b"content"), "post");
        let s2 = Site::new(vec![leaf(b"a"), leaf(b"b")], Hash::digest(b"content"), "post");
        assert_eq!(s1.hash(), s2.hash());
    }

    #[test]
    fn validation_order_changes_hash() {
        let a = leaf(b"a");
        let b = leaf(b"b");
        let s1 = Site::new(vec![a, b], Hash::digest(b"c"), "post");
        let s2 = Site::new(vec![b, a], Hash::digest(b"c"), "post");
        assert_ne!(s1.hash(), s2.hash());
    }

    #[test]
    fn mine_reaches_target_weight_and_only_touches_nonce() {
        let mut s = Site::new(vec![leaf(b"a"), leaf(b"b")], Hash::digest(b"mine-me"), "post");
        let before = (s.validates.clone(), s.content, s.site_type.clone());
        s.mine(1);
        assert!(s.hash().weight() >= 1);
        assert_eq!((s.validates.clone(), s.content, s.site_type.clone()), before);
    }

    #[test]
    fn serialize_round_trips() {
        let mut s = Site::new(vec![leaf(b"a"), leaf(b"b")], Hash::digest(b"rt"), "image");
        s.mine(1);
        let bytes = s.serialize();
        let back = Site::deserialize(&bytes).unwrap();
        assert_eq!(s, back);
    }
}
