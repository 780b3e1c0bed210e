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

//! Durable storage: the site store (sled, two trees - `data` and `tips`)
//! and the payload store (a second, independently opened sled database
//! keyed by content hash). Both take an exclusive lock on their file for
//! the process lifetime, matching the single-writer model the tangle
//! imposes above them.

#![forbid(unsafe_code)]

use sled::transaction::ConflictableTransactionResult;
use tracing::error;

use crate::core::errors::StorageError;
use crate::core::hash::Hash;
use crate::core::site::Site;

/// Durable store for site metadata and the tip set.
pub struct SiteStore {
    db: sled::Db,
    data: sled::Tree,
    tips: sled::Tree,
}

impl SiteStore {
    /// Open (or create) the site store at `path`.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let data = db.open_tree("data")?;
        let tips = db.open_tree("tips")?;
        Ok(Self { db, data, tips })
    }

    /// Insert or overwrite a site record, keyed by its own hash.
    pub fn add(&self, site: &Site) -> Result<(), StorageError> {
        let key = site.hash();
        self.data.insert(key.as_bytes(), site.serialize())?;
        Ok(())
    }

    /// Look up a site by hash. A key/value mismatch (the decoded site's own
    /// hash disagreeing with the lookup key) is on-disk corruption: it is
    /// logged loudly and reported as "not present" rather than propagated,
    /// per the store's failure semantics.
    pub fn get(&self, hash: &Hash) -> Result<Option<Site>, StorageError> {
        let Some(raw) = self.data.get(hash.as_bytes())? else {
            return Ok(None);
        };
        let site = match Site::deserialize(&raw) {
            Ok(s) => s,
            Err(e) => {
                error!(hash = %hash, error = %e, "storage corruption: undecodable site record");
                return Ok(None);
            }
        };
        if &site.hash() != hash {
            error!(hash = %hash, "storage corruption: site hash does not match its key");
            return Ok(None);
        }
        Ok(Some(site))
    }

    /// All stored site hashes. Order is unspecified.
    pub fn hashes(&self) -> Result<Vec<Hash>, StorageError> {
        let mut out = Vec::with_capacity(self.data.len());
        for kv in self.data.iter() {
            let (k, _) = kv?;
            out.push(hash_from_key(&k)?);
        }
        Ok(out)
    }

    /// Count of stored sites.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Atomically apply a tip-set delta: the additions and deletions are
    /// applied as a single sled transaction over the `tips` tree, so a
    /// reader never observes a partially-updated tip set.
    pub fn set_tips(&self, add: &[Hash], del: &[Hash]) -> Result<(), StorageError> {
        self.tips
            .transaction(|tx| -> ConflictableTransactionResult<(), StorageError> {
                for h in add {
                    tx.insert(h.as_bytes().as_slice(), &[][..])?;
                }
                for h in del {
                    tx.remove(h.as_bytes().as_slice())?;
                }
                Ok(())
            })
            .map_err(StorageError::from)
    }

    /// Current tip hashes.
    pub fn get_tips(&self) -> Result<Vec<Hash>, StorageError> {
        let mut out = Vec::with_capacity(self.tips.len());
        for kv in self.tips.iter() {
            let (k, _) = kv?;
            out.push(hash_from_key(&k)?);
        }
        Ok(out)
    }

    /// Flush and drop the underlying handles, releasing the file lock.
    pub fn close(self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

/// Durable store for payload bytes, keyed by content hash.
pub struct PayloadStore {
    db: sled::Db,
    data: sled::Tree,
}

impl PayloadStore {
    /// Open (or create) the payload store at `path`.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let data = db.open_tree("data")?;
        Ok(Self { db, data })
    }

    /// Store raw payload bytes under their content hash.
    pub fn put(&self, hash: &Hash, bytes: &[u8]) -> Result<(), StorageError> {
        self.data.insert(hash.as_bytes(), bytes)?;
        Ok(())
    }

    /// Fetch raw payload bytes by content hash.
    pub fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.get(hash.as_bytes())?.map(|v| v.to_vec()))
    }

    /// Flush and drop the underlying handle, releasing the file lock.
    pub fn close(self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

fn hash_from_key(key: &[u8]) -> Result<Hash, StorageError> {
    if key.len() != 32 {
        return Err(StorageError::Corruption);
    }
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(key);
    Ok(Hash::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::site::Site;

    fn tmp_path() -> String {
        let dir = tempfile::tempdir().unwrap();
        // leak the tempdir so the store outlives this function; tests clean
        // up their own process-wide temp dir on exit.
        let path = dir.path().to_string_lossy().to_string();
        std::mem::forget(dir);
        path
    }

    #[test]
    fn add_get_round_trips() {
        let store = SiteStore::open(&tmp_path()).unwrap();
        let mut s = Site::new(
            vec![Hash::digest(b"a"), Hash::digest(b"b")],
            Hash::digest(b"c"),
            "post",
        );
        s.mine(1);
        store.add(&s).unwrap();
        let fetched = store.get(&s.hash()).unwrap().unwrap();
        assert_eq!(fetched, s);
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn missing_key_returns_none() {
        let store = SiteStore::open(&tmp_path()).unwrap();
        assert!(store.get(&Hash::digest(b"nope")).unwrap().is_none());
    }

    #[test]
    fn tip_delta_is_atomic_and_visible_immediately() {
        let store = SiteStore::open(&tmp_path()).unwrap();
        let a = Hash::digest(b"a");
        let b = Hash::digest(b"b");
        store.set_tips(&[a, b], &[]).unwrap();
        let mut tips = store.get_tips().unwrap();
        tips.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(tips, expected);

        store.set_tips(&[], &[a]).unwrap();
        assert_eq!(store.get_tips().unwrap(), vec![b]);
    }

    #[test]
    fn payload_store_round_trips() {
        let store = PayloadStore::open(&tmp_path()).unwrap();
        let h = Hash::digest(b"payload");
        store.put(&h, b"payload").unwrap();
        assert_eq!(store.get(&h).unwrap().unwrap(), b"payload");
        assert!(store.get(&Hash::digest(b"other")).unwrap().is_none());
    }
}
