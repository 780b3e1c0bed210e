// Copyright (c) 2026 Tangled
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use tangled::networking::wire::SiteMsg;

fuzz_target!(|data: &[u8]| {
    // A SiteMsg frame arriving off the wire is attacker-controlled bytes;
    // decoding and reconstruction must never panic, only return an error.
    if let Ok(msg) = bincode::deserialize::<SiteMsg>(data) {
        let _ = msg.check_size();
        let _ = msg.into_parts();
    }
});
