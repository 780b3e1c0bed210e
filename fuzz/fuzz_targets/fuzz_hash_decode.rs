// Copyright (c) 2026 Tangled
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Best-effort: neither base64 nor bubble-babble decoding should ever
    // panic, regardless of input.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = tangled::core::hash::Hash::from_any(s);
    }
});
