// Copyright (c) 2026 Tangled
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Site::deserialize must reject malformed bincode rather than panic.
    let _ = tangled::core::site::Site::deserialize(data);
});
