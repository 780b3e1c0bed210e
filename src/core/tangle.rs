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

//! The in-memory DAG overlay: tip tracking, weight computation, and the
//! verify/add/inject rules. Sites are stored in an arena keyed by hash (the
//! durable store); `validates` references are resolved lazily through it
//! rather than held as direct pointers, so the only thing this type keeps
//! resident is the small, hot tip set.

#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use rand::seq::SliceRandom;
use tracing::warn;

use crate::core::errors::{StorageError, TangleError, ValidationError};
use crate::core::hash::{Hash, MINIMUM_WEIGHT};
use crate::core::payload::{GenesisPayload, Payload, GENESIS_CONTENT_0, GENESIS_CONTENT_1};
use crate::core::site::{Site, MINIMUM_VALIDATIONS};
use crate::core::store::{PayloadStore, SiteStore};

/// Upper bound on how many current tips `recommend_tips` returns before
/// falling back to random sampling.
pub const MAX_RECOMMENDATIONS: usize = 4;

/// Path a site entered the tangle through; used only for metrics/logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestPath {
    /// Accepted via the local `Add` submission path.
    Local,
    /// Accepted via the peer `Inject` merge path.
    Merge,
}

impl IngestPath {
    /// The `path` label value used on `sites_accepted_total`.
    pub fn as_label(self) -> &'static str {
        match self {
            IngestPath::Local => "local",
            IngestPath::Merge => "merge",
        }
    }
}

/// The DAG of accepted sites, backed by a durable two-bucket store.
pub struct Tangle {
    tips: Mutex<HashSet<Hash>>,
    site_store: SiteStore,
    payload_store: PayloadStore,
}

fn genesis_site(content: [u8; 32], target_weight: usize) -> (Site, Payload) {
    let payload = Payload::Genesis(GenesisPayload {
        marker: content.to_vec(),
    });
    let mut site = Site::new(Vec::new(), payload.hash(), "genesis");
    site.mine(target_weight);
    (site, payload)
}

impl Tangle {
    /// Open the tangle's durable stores at the given paths. On first use of
    /// an empty site store, seeds the two genesis sites and marks both as
    /// tips. On reopen, loads the persisted tip set; every tip must resolve
    /// in the site store or this fails loudly rather than silently
    /// dropping a tip.
    pub fn open(site_store_path: &str, payload_store_path: &str) -> Result<Self, TangleError> {
        let site_store = SiteStore::open(site_store_path)?;
        let payload_store = PayloadStore::open(payload_store_path)?;

        if site_store.size() == 0 {
            let mut tips = HashSet::new();
            for content in [GENESIS_CONTENT_0, GENESIS_CONTENT_1] {
                let (site, payload) = genesis_site(content, MINIMUM_WEIGHT);
                let hash = site.hash();
                payload_store.put(&site.content, &payload.serialize())?;
                site_store.add(&site)?;
                tips.insert(hash);
            }
            let tip_vec: Vec<Hash> = tips.iter().copied().collect();
            site_store.set_tips(&tip_vec, &[])?;
            return Ok(Self {
                tips: Mutex::new(tips),
                site_store,
                payload_store,
            });
        }

        let persisted_tips = site_store.get_tips()?;
        let mut tips = HashSet::with_capacity(persisted_tips.len());
        for t in persisted_tips {
            if site_store.get(&t)?.is_none() {
                return Err(TangleError::Storage(StorageError::Corruption));
            }
            tips.insert(t);
        }
        Ok(Self {
            tips: Mutex::new(tips),
            site_store,
            payload_store,
        })
    }

    /// Does the tangle already know this hash?
    pub fn contains(&self, h: &Hash) -> Result<bool, StorageError> {
        Ok(self.site_store.get(h)?.is_some())
    }

    /// Fetch a site's metadata without resolving its payload.
    pub fn get_site(&self, h: &Hash) -> Result<Option<Site>, StorageError> {
        self.site_store.get(h)
    }

    /// Fetch a site and its resolved payload. Unknown payload types or
    /// missing payload bytes yield `None` with an internal log entry,
    /// never a panic.
    pub fn get(&self, h: &Hash) -> Result<Option<(Site, Payload)>, StorageError> {
        let Some(site) = self.site_store.get(h)? else {
            return Ok(None);
        };
        let Some(raw) = self.payload_store.get(&site.content)? else {
            warn!(hash = %h, "site references payload bytes that are not present");
            return Ok(None);
        };
        match Payload::deserialize(&site.site_type, &raw) {
            Ok(payload) => Ok(Some((site, payload))),
            Err(e) => {
                warn!(hash = %h, error = %e, "site carries an unrecognized payload type");
                Ok(None)
            }
        }
    }

    /// Total number of known sites.
    pub fn size(&self) -> usize {
        self.site_store.size()
    }

    /// All known site hashes. Order is unspecified.
    pub fn hashes(&self) -> Result<Vec<Hash>, StorageError> {
        self.site_store.hashes()
    }

    /// Current tip set, as a plain vector.
    pub fn tips(&self) -> Vec<Hash> {
        self.tips.lock().expect("tangle mutex poisoned").iter().copied().collect()
    }

    /// Verify a site against the four local rules (weight, validation
    /// count, known ancestors, content match) plus payload-specific
    /// verification. Does not check the "validates a tip" rule - that is
    /// only required on the `Add` path, not `Inject`.
    pub fn verify(
        &self,
        site: &Site,
        payload: &Payload,
        expected_hash: Option<Hash>,
    ) -> Result<(), TangleError> {
        let computed = site.hash();
        if let Some(expected) = expected_hash {
            if expected != computed {
                return Err(ValidationError::HashMismatch.into());
            }
        }
        if computed.weight() < MINIMUM_WEIGHT {
            return Err(ValidationError::WeightTooLow.into());
        }
        if !site.is_genesis() && site.validates.len() < MINIMUM_VALIDATIONS {
            return Err(ValidationError::TooFewValidations.into());
        }
        for v in &site.validates {
            if !self.contains(v)? {
                return Err(ValidationError::UnknownAncestor.into());
            }
        }
        if site.content != payload.hash() {
            return Err(ValidationError::ContentMismatch.into());
        }
        payload.verify()?;
        Ok(())
    }

    /// Local submission path: verify, require validating a current tip,
    /// then durably record the site (payload bytes, then site record, then
    /// tip delta) and update the in-memory tip set.
    pub fn add(&self, site: &Site, payload: &Payload) -> Result<Hash, TangleError> {
        self.verify(site, payload, None)?;

        let hash = site.hash();
        let mut guard = self.tips.lock().expect("tangle mutex poisoned");

        let validated_tips: Vec<Hash> = site
            .validates
            .iter()
            .filter(|v| guard.contains(*v))
            .copied()
            .collect();
        if validated_tips.is_empty() && !site.is_genesis() {
            return Err(ValidationError::NotValidating.into());
        }

        self.payload_store.put(&site.content, &payload.serialize())?;
        self.site_store.add(site)?;
        self.site_store.set_tips(&[hash], &validated_tips)?;

        for v in &validated_tips {
            guard.remove(v);
        }
        guard.insert(hash);

        Ok(hash)
    }

    /// Merge path: same verification as `add`, but without the
    /// "validates a current tip" requirement. `is_tip` tells whether the
    /// remote considers this site a tip of its own tangle; a non-tip
    /// injection still removes any locally-tracked tips it validates.
    pub fn inject(&self, site: &Site, payload: &Payload, is_tip: bool) -> Result<Hash, TangleError> {
        self.verify(site, payload, None)?;

        let hash = site.hash();
        let mut guard = self.tips.lock().expect("tangle mutex poisoned");

        if guard.contains(&hash) {
            // Already known as a tip; nothing further to do.
            return Ok(hash);
        }
        if self.site_store.get(&hash)?.is_some() {
            // Already known, but not currently a tip - idempotent no-op.
            return Ok(hash);
        }

        let validated_tips: Vec<Hash> = site
            .validates
            .iter()
            .filter(|v| guard.contains(*v))
            .copied()
            .collect();

        self.payload_store.put(&site.content, &payload.serialize())?;
        self.site_store.add(site)?;

        let add_tips: &[Hash] = if is_tip { std::slice::from_ref(&hash) } else { &[] };
        self.site_store.set_tips(add_tips, &validated_tips)?;

        for v in &validated_tips {
            guard.remove(v);
        }
        if is_tip {
            guard.insert(hash);
        }

        Ok(hash)
    }

    /// Cumulative proof-of-work on the cone of sites that transitively
    /// validate `s`, plus `s` itself. See the module docs in `tangle.rs`
    /// for the four-step derivation this implements.
    pub fn weight(&self, s: Hash) -> Result<u64, StorageError> {
        // Step 1: ancestors(s), the transitive closure following
        // `validates` starting at s (s itself included).
        let mut ancestors: HashSet<Hash> = HashSet::new();
        let mut stack = vec![s];
        while let Some(h) = stack.pop() {
            if !ancestors.insert(h) {
                continue;
            }
            if let Some(site) = self.site_store.get(&h)? {
                stack.extend(site.validates);
            }
        }

        // Step 2: adjacency (n -> n.validates) restricted to nodes not in
        // ancestors(s); this is what makes the walk below stop once it
        // reaches s or anything behind it.
        let all = self.site_store.hashes()?;
        let mut adjacency: HashMap<Hash, Vec<Hash>> = HashMap::with_capacity(all.len());
        for n in &all {
            if ancestors.contains(n) {
                continue;
            }
            if let Some(site) = self.site_store.get(n)? {
                adjacency.insert(*n, site.validates);
            }
        }

        // Step 3: starting from current tips, walk the reverse-validation
        // edges to collect descendants(s). A node other than s that lies in
        // ancestors(s) is a dead end: the path reached behind s, so it
        // terminates there without being counted or expanded further.
        let mut descendants: HashSet<Hash> = HashSet::new();
        let mut visited: HashSet<Hash> = HashSet::new();
        let mut stack: Vec<Hash> = self.tips();
        while let Some(h) = stack.pop() {
            if !visited.insert(h) {
                continue;
            }
            if h != s && ancestors.contains(&h) {
                continue;
            }
            descendants.insert(h);
            if let Some(next) = adjacency.get(&h) {
                stack.extend(next.iter().copied());
            }
        }

        // Step 4: sum hash weight over descendants(s).
        let mut total: u64 = 0;
        for h in &descendants {
            total += h.weight() as u64;
        }
        Ok(total)
    }

    /// Recommend at least `MINIMUM_VALIDATIONS` distinct sites for a new
    /// submission to validate: current tips first (up to
    /// `MAX_RECOMMENDATIONS`), then a uniform, duplicate-free sample of
    /// known hashes if tips alone don't reach the quorum.
    pub fn recommend_tips(&self) -> Result<Vec<Hash>, StorageError> {
        let mut tips = self.tips();
        tips.truncate(MAX_RECOMMENDATIONS);
        let mut recommended = tips;

        if recommended.len() < MINIMUM_VALIDATIONS {
            let mut pool: Vec<Hash> = self
                .site_store
                .hashes()?
                .into_iter()
                .filter(|h| !recommended.contains(h))
                .collect();
            pool.shuffle(&mut rand::thread_rng());
            for h in pool {
                if recommended.len() >= MINIMUM_VALIDATIONS {
                    break;
                }
                recommended.push(h);
            }
        }
        Ok(recommended)
    }

    /// Flush and release the underlying store handles.
    pub fn close(self) -> Result<(), StorageError> {
        self.site_store.close()?;
        self.payload_store.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::payload::ImagePayload;

    fn open_temp() -> Tangle {
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

    fn image(bytes: &[u8]) -> Payload {
        Payload::Image(ImagePayload {
            bytes: bytes.to_vec(),
        })
    }

    /// S1 - initialization: two genesis sites, both tips, carrying the
    /// predetermined content prefixes.
    #[test]
    fn s1_initialization_seeds_two_genesis_tips() {
        let t = open_temp();
        assert_eq!(t.size(), 2);
        let tips = t.tips();
        assert_eq!(tips.len(), 2);
        let mut prefixes: Vec<[u8; 6]> = Vec::new();
        for h in &tips {
            let site = t.get_site(h).unwrap().unwrap();
            assert_eq!(site.site_type, "genesis");
            let mut prefix = [0u8; 6];
            prefix.copy_from_slice(&site.content.as_bytes()[..6]);
            prefixes.push(prefix);
        }
        prefixes.sort();
        assert_eq!(
            prefixes,
            vec![
                [0x18, 0x43, 0x44, 0x48, 0x84, 0xB5],
                [0x18, 0x43, 0x44, 0x48, 0x84, 0xB6],
            ]
        );
    }

    /// S2 - a site mined to weight 0 is rejected.
    #[test]
    fn s2_weight_too_low_is_rejected() {
        let t = open_temp();
        let tips = t.tips();
        let payload = image(&[0x01, 0x03, 0x03, 0x07]);
        let site = Site::new(tips, payload.hash(), "image");
        let err = t.add(&site, &payload).unwrap_err();
        assert!(matches!(err, TangleError::Validation(ValidationError::WeightTooLow)));
    }

    /// S3 - mining to weight 1 and retrying succeeds; genesis tips retire.
    #[test]
    fn s3_successful_add_retires_validated_tips() {
        let t = open_temp();
        let genesis_tips = t.tips();
        let payload = image(&[0x01, 0x03, 0x03, 0x07]);
        let mut site = Site::new(genesis_tips.clone(), payload.hash(), "image");
        site.mine(1);
        let hash = t.add(&site, &payload).unwrap();

        assert_eq!(t.tips(), vec![hash]);
        for g in &genesis_tips {
            assert!(t.get_site(g).unwrap().is_some());
        }
    }

    /// S4 - weight accumulates along a linear chain.
    #[test]
    fn s4_weight_accumulates_along_a_chain() {
        let t = open_temp();
        let genesis: Vec<Hash> = t.tips();
        let (gen1, gen2) = (genesis[0], genesis[1]);

        let p1 = image(b"s1");
        let mut s1 = Site::new(vec![gen1, gen2], p1.hash(), "image");
        s1.mine(1);
        let h1 = t.add(&s1, &p1).unwrap();

        let p2 = image(b"s2");
        let mut s2 = Site::new(vec![h1, gen2], p2.hash(), "image");
        s2.mine(1);
        let h2 = t.add(&s2, &p2).unwrap();

        let p3 = image(b"s3");
        let mut s3 = Site::new(vec![h2, h1], p3.hash(), "image");
        s3.mine(1);
        let h3 = t.add(&s3, &p3).unwrap();

        let p4 = image(b"s4");
        let mut s4 = Site::new(vec![h3, h2], p4.hash(), "image");
        s4.mine(1);
        let h4 = t.add(&s4, &p4).unwrap();

        let w4 = h4.weight() as u64;
        let w3 = h3.weight() as u64;
        let w2 = h2.weight() as u64;
        let w1 = h1.weight() as u64;

        assert_eq!(t.weight(h4).unwrap(), w4);
        assert_eq!(t.weight(h3).unwrap(), w3 + w4);
        assert_eq!(t.weight(h2).unwrap(), w2 + w3 + w4);
        assert_eq!(t.weight(h1).unwrap(), w1 + w2 + w3 + w4);
    }

    #[test]
    fn not_validating_a_tip_is_rejected() {
        let t = open_temp();
        let genesis = t.tips();
        let p1 = image(b"s1");
        let mut s1 = Site::new(genesis.clone(), p1.hash(), "image");
        s1.mine(1);
        t.add(&s1, &p1).unwrap();

        // genesis[0] is no longer a tip; re-submitting against it (and
        // genesis[1], also retired) must fail NotValidating.
        let p2 = image(b"s2");
        let mut s2 = Site::new(genesis, p2.hash(), "image");
        s2.mine(1);
        let err = t.add(&s2, &p2).unwrap_err();
        assert!(matches!(
            err,
            TangleError::Validation(ValidationError::NotValidating)
        ));
    }

    #[test]
    fn unknown_ancestor_is_rejected() {
        let t = open_temp();
        let bogus = Hash::digest(b"never-seen");
        let p = image(b"x");
        let mut s = Site::new(vec![bogus, bogus], p.hash(), "image");
        s.mine(1);
        let err = t.add(&s, &p).unwrap_err();
        assert!(matches!(
            err,
            TangleError::Validation(ValidationError::UnknownAncestor)
        ));
    }

    #[test]
    fn content_mismatch_is_rejected() {
        let t = open_temp();
        let genesis = t.tips();
        let p = image(b"real");
        let wrong_content = Hash::digest(b"not-the-payload");
        let mut s = Site::new(genesis, wrong_content, "image");
        s.mine(1);
        let err = t.add(&s, &p).unwrap_err();
        assert!(matches!(
            err,
            TangleError::Validation(ValidationError::ContentMismatch)
        ));
    }

    #[test]
    fn recommend_tips_meets_quorum_even_with_one_tip() {
        let t = open_temp();
        let genesis = t.tips();
        let p = image(b"only-tip-left");
        let mut s = Site::new(genesis, p.hash(), "image");
        s.mine(1);
        t.add(&s, &p).unwrap();

        assert_eq!(t.tips().len(), 1);
        let rec = t.recommend_tips().unwrap();
        assert!(rec.len() >= MINIMUM_VALIDATIONS);
        let unique: HashSet<Hash> = rec.iter().copied().collect();
        assert_eq!(unique.len(), rec.len());
    }

    /// S6 - out-of-order injection: ancestors arriving last still succeed.
    #[test]
    fn inject_buffers_naturally_resolve_out_of_order() {
        let t = open_temp();
        let genesis = t.tips();
        let (gen1, gen2) = (genesis[0], genesis[1]);

        let p1 = image(b"s1");
        let mut s1 = Site::new(vec![gen1, gen2], p1.hash(), "image");
        s1.mine(1);
        let h1 = s1.hash();

        let p2 = image(b"s2");
        let mut s2 = Site::new(vec![h1, gen2], p2.hash(), "image");
        s2.mine(1);

        // s2 arrives before s1 is known: UnknownAncestor.
        let err = t.inject(&s2, &p2, true).unwrap_err();
        assert!(matches!(
            err,
            TangleError::Validation(ValidationError::UnknownAncestor)
        ));

        // once s1 is injected, s2 injects cleanly.
        t.inject(&s1, &p1, false).unwrap();
        t.inject(&s2, &p2, true).unwrap();
        assert!(t.contains(&s2.hash()).unwrap());
    }
}
