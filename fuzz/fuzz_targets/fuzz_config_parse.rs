// Copyright (c) 2026 Tangled
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use tangled::core::config::NodeConfig;

fuzz_target!(|data: &[u8]| {
    // Best-effort: ensure config parsing does not panic on arbitrary TOML.
    if let Ok(s) = std::str::from_utf8(data) {
        let _: Result<NodeConfig, _> = toml::from_str(s);
    }
});
