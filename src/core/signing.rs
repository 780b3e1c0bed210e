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

//! Ed25519 signature verification for the `post` payload variant.
//!
//! The tangle core only ever verifies; keys are generated and held by
//! whatever external caller constructs a post (the REST surface, a CLI,
//! a test). There is no keystore here, on purpose - signing identity
//! management lives outside the core.

#![forbid(unsafe_code)]

use ring::signature::{UnparsedPublicKey, ED25519};

/// Verify an Ed25519 signature over `msg` given a 32-byte public key and a
/// 64-byte signature. Returns `false` on any malformed input rather than
/// erroring, since the caller only ever needs a yes/no verdict.
pub fn verify_ed25519(pubkey: &[u8], msg: &[u8], signature: &[u8]) -> bool {
    if pubkey.len() != 32 || signature.len() != 64 {
        return false;
    }
    UnparsedPublicKey::new(&ED25519, pubkey)
        .verify(msg, signature)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring::rand::SystemRandom;
    use ring::signature::{Ed25519KeyPair, KeyPair};

    #[test]
    fn verifies_genuine_signature() {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let kp = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        let msg = b"hello tangle";
        let sig = kp.sign(msg);
        assert!(verify_ed25519(kp.public_key().as_ref(), msg, sig.as_ref()));
    }

    #[test]
    fn rejects_tampered_message() {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let kp = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        let sig = kp.sign(b"hello tangle");
        assert!(!verify_ed25519(
            kp.public_key().as_ref(),
            b"hello tangle!",
            sig.as_ref()
        ));
    }

    #[test]
    fn rejects_malformed_key_or_signature() {
        assert!(!verify_ed25519(&[0u8; 31], b"m", &[0u8; 64]));
        assert!(!verify_ed25519(&[0u8; 32], b"m", &[0u8; 63]));
    }
}
