// Copyright (c) 2026 Tangled
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use proptest::prelude::*;

use tangled::core::hash::Hash;

proptest! {
    /// Base64 and bubble-babble are both lossless round trips for any
    /// 32-byte digest, regardless of how many leading zero bytes it has.
    #[test]
    fn codecs_round_trip_for_any_32_bytes(bytes in proptest::collection::vec(any::<u8>(), 32..=32)) {
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        let h = Hash::from_bytes(arr);

        let b64 = h.to_base64();
        prop_assert_eq!(Hash::from_base64(&b64).unwrap(), h);

        let bb = h.to_bubble_babble();
        prop_assert_eq!(Hash::from_bubble_babble(&bb).unwrap(), h);
    }

    /// `diff` partitions two sets without losing or duplicating elements:
    /// every hash in `local` lands in either the shared set or `deletions`,
    /// and symmetrically for `remote`/`additions`.
    #[test]
    fn diff_partitions_both_sets_completely(
        local in proptest::collection::vec(any::<[u8; 32]>(), 0..16),
        remote in proptest::collection::vec(any::<[u8; 32]>(), 0..16),
    ) {
        let local: BTreeSet<Hash> = local.into_iter().map(Hash::from_bytes).collect();
        let remote: BTreeSet<Hash> = remote.into_iter().map(Hash::from_bytes).collect();

        let (additions, deletions) = Hash::diff(&local, &remote);

        for h in &additions {
            prop_assert!(remote.contains(h) && !local.contains(h));
        }
        for h in &deletions {
            prop_assert!(local.contains(h) && !remote.contains(h));
        }
        for h in local.intersection(&remote) {
            prop_assert!(!additions.contains(h) && !deletions.contains(h));
        }
    }
}
