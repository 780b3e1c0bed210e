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

//! 32-byte content hash: leading-zero weight, Base64/bubble-babble codecs,
//! and hash-set diffing.

#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::fmt;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Minimum leading-zero-byte weight a non-genesis site hash must meet.
pub const MINIMUM_WEIGHT: usize = 1;

/// A fixed-size 256-bit digest, orderless (two hashes compare equal iff
/// their bytes match).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

/// Errors decoding a `Hash` from an external representation.
#[derive(Debug, thiserror::Error)]
pub enum HashDecodeError {
    /// Neither Base64 (URL-safe, standard, or raw) nor bubble-babble parsed.
    #[error("not a valid hash encoding")]
    BadEncoding,
    /// Decoded successfully but the payload was not exactly 32 bytes.
    #[error("decoded length {0} != 32")]
    BadLength(usize),
}

impl Hash {
    /// Wrap raw bytes as a hash.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    /// Borrow the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Digest `data` with Blake2b-256, per the stable hashing recipe.
    pub fn digest(data: &[u8]) -> Self {
        let out = blake2b_simd::Params::new().hash_length(32).hash(data);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(out.as_bytes());
        Hash(bytes)
    }

    /// Count of leading zero bytes. Higher weight means more accumulated
    /// proof-of-work.
    pub fn weight(&self) -> usize {
        self.0.iter().take_while(|b| **b == 0).count()
    }

    /// Canonical external representation: URL-safe Base64, unpadded.
    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Decode accepting URL-safe, standard, or raw (no padding) Base64.
    pub fn from_base64(s: &str) -> Result<Self, HashDecodeError> {
        let candidates: [Result<Vec<u8>, base64::DecodeError>; 4] = [
            URL_SAFE_NO_PAD.decode(s),
            URL_SAFE.decode(s),
            STANDARD_NO_PAD.decode(s),
            STANDARD.decode(s),
        ];
        for c in candidates {
            if let Ok(bytes) = c {
                return Self::from_slice(&bytes);
            }
        }
        Err(HashDecodeError::BadEncoding)
    }

    /// Human-readable 5-letter-group "bubble-babble" encoding.
    pub fn to_bubble_babble(&self) -> String {
        bubble_babble::encode(&self.0)
    }

    /// Decode a bubble-babble string back into a hash.
    pub fn from_bubble_babble(s: &str) -> Result<Self, HashDecodeError> {
        let bytes = bubble_babble::decode(s).ok_or(HashDecodeError::BadEncoding)?;
        Self::from_slice(&bytes)
    }

    /// Decode trying Base64 first, then bubble-babble.
    pub fn from_any(s: &str) -> Result<Self, HashDecodeError> {
        Self::from_base64(s).or_else(|_| Self::from_bubble_babble(s))
    }

    fn from_slice(bytes: &[u8]) -> Result<Self, HashDecodeError> {
        if bytes.len() != 32 {
            return Err(HashDecodeError::BadLength(bytes.len()));
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(bytes);
        Ok(Hash(out))
    }

    /// Symmetric difference between two hash sets: hashes only `remote` has
    /// (`additions`, things local is missing) and hashes only `local` has
    /// (`deletions`, things remote is missing). Order is unspecified.
    pub fn diff(local: &BTreeSet<Hash>, remote: &BTreeSet<Hash>) -> (Vec<Hash>, Vec<Hash>) {
        let additions: Vec<Hash> = remote.difference(local).copied().collect();
        let deletions: Vec<Hash> = local.difference(remote).copied().collect();
        (additions, deletions)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_base64())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base64())
    }
}

/// The Bubble Babble binary data encoding (Antti Huima), used for
/// human-readable hash rendering in logs and diagnostics.
mod bubble_babble {
    const VOWELS: &[u8] = b"aeiouy";
    const CONSONANTS: &[u8] = b"bcdfghklmnprstvzx";

    pub fn encode(data: &[u8]) -> String {
        let mut seed: u32 = 1;
        let rounds = data.len() / 2 + 1;
        let mut out = String::with_capacity(rounds * 6 + 2);
        out.push('x');
        for i in 0..rounds {
            if i + 1 < rounds || data.len() % 2 != 0 {
                let byte1 = data[2 * i] as u32;
                out.push(VOWELS[(((byte1 >> 6) & 3) + seed) as usize % 6] as char);
                out.push(CONSONANTS[((byte1 >> 2) & 15) as usize] as char);
                out.push(VOWELS[((byte1 & 3) + seed / 6) as usize % 6] as char);
                if i + 1 < rounds {
                    let byte2 = data[2 * i + 1] as u32;
                    out.push(CONSONANTS[((byte2 >> 4) & 15) as usize] as char);
                    out.push('-');
                    out.push(CONSONANTS[(byte2 & 15) as usize] as char);
                    seed = (seed * 5 + byte1 * 7 + byte2) % 36;
                }
            } else {
                out.push(VOWELS[(seed % 6) as usize] as char);
                out.push(CONSONANTS[16] as char);
                out.push(VOWELS[(seed / 6) as usize] as char);
            }
        }
        out.push('x');
        out
    }

    pub fn decode(s: &str) -> Option<Vec<u8>> {
        let chars: Vec<u8> = s.bytes().collect();
        if chars.len() < 2 || chars[0] != b'x' || *chars.last().unwrap() != b'x' {
            return None;
        }
        let body = &chars[1..chars.len() - 1];
        // Each full round consumes 6 chars (vowel, consonant, vowel, consonant,
        // '-', consonant); a trailing lone byte or the checksum-only round
        // consumes 3. Consonant index 16 ('x') never arises from real byte
        // data (a real byte1's consonant is `(byte1 >> 2) & 15`, max 15), so
        // it unambiguously marks the checksum-only terminal round.
        let mut out = Vec::new();
        let mut seed: u32 = 1;
        let mut pos = 0usize;
        loop {
            if pos + 3 > body.len() {
                return None;
            }
            let v1 = vowel_index(body[pos])?;
            let c1 = consonant_index(body[pos + 1])?;
            let v2 = vowel_index(body[pos + 2])?;
            pos += 3;

            if c1 == 16 {
                if pos != body.len() || v1 as u32 != seed % 6 || v2 as u32 != seed / 6 {
                    return None;
                }
                break;
            }

            let hi = ((v1 as u32 + 6 - (seed % 6)) % 6) << 6;
            let byte1 = (hi | ((c1 as u32) << 2) | ((v2 as u32 + 6 - (seed / 6) % 6) % 6)) as u8;

            if pos == body.len() {
                // Odd-length input: a lone trailing byte with no checksum.
                out.push(byte1);
                break;
            }

            if pos + 3 > body.len() {
                return None;
            }
            let c2 = consonant_index(body[pos])?;
            if body[pos + 1] != b'-' {
                return None;
            }
            let c3 = consonant_index(body[pos + 2])?;
            pos += 3;

            let byte2 = (((c2 as u32) << 4) | c3 as u32) as u8;
            out.push(byte1);
            out.push(byte2);
            seed = (seed * 5 + byte1 as u32 * 7 + byte2 as u32) % 36;
        }
        Some(out)
    }

    fn vowel_index(b: u8) -> Option<u8> {
        VOWELS.iter().position(|v| *v == b).map(|i| i as u8)
    }

    fn consonant_index(b: u8) -> Option<u8> {
        CONSONANTS.iter().position(|v| *v == b).map(|i| i as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_counts_leading_zero_bytes() {
        let mut bytes = [0xffu8; 32];
        bytes[0] = 0;
        bytes[1] = 0;
        assert_eq!(Hash(bytes).weight(), 2);
        assert_eq!(Hash([0xffu8; 32]).weight(), 0);
        assert_eq!(Hash([0u8; 32]).weight(), 32);
    }

    #[test]
    fn base64_round_trips_canonically() {
        let h = Hash::digest(b"hello tangle");
        let encoded = h.to_base64();
        let decoded = Hash::from_base64(&encoded).unwrap();
        assert_eq!(h, decoded);
        // standard padded form should also decode.
        let padded = base64::engine::general_purpose::STANDARD.encode(h.0);
        assert_eq!(Hash::from_base64(&padded).unwrap(), h);
    }

    #[test]
    fn bubble_babble_round_trips() {
        let h = Hash::digest(b"bubble babble me");
        let bb = h.to_bubble_babble();
        assert!(bb.starts_with('x') && bb.ends_with('x'));
        let decoded = Hash::from_bubble_babble(&bb).unwrap();
        assert_eq!(h, decoded);
    }

    #[test]
    fn bubble_babble_known_vector() {
        // Empty input's known bubble babble encoding, per the reference spec.
        assert_eq!(bubble_babble::encode(b""), "xexax");
        assert_eq!(bubble_babble::decode("xexax").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn diff_is_symmetric_difference() {
        let a = Hash::digest(b"a");
        let b = Hash::digest(b"b");
        let c = Hash::digest(b"c");
        let local: BTreeSet<Hash> = [a, b].into_iter().collect();
        let remote: BTreeSet<Hash> = [b, c].into_iter().collect();
        let (additions, deletions) = Hash::diff(&local, &remote);
        assert_eq!(additions, vec![c]);
        assert_eq!(deletions, vec![a]);
    }
}
