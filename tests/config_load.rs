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

//! S7 - loading a full on-disk config document, including the optional
//! sections, and confirming environment overrides apply end to end through
//! `NodeConfig::load`.

#![forbid(unsafe_code)]

use std::fs;

use tangled::core::config::NodeConfig;

const FULL: &str = r#"
[node]
name = "node-a"
data_dir = "./data/node-a"

[storage]
site_path = "./data/node-a/sites"
payload_path = "./data/node-a/payloads"

[network]
listen_addr = "/ip4/0.0.0.0/tcp/4101"
public_addr = "/ip4/203.0.113.9/tcp/4101"
bootstrap = ["/ip4/203.0.113.1/tcp/4101/p2p/12D3KooWExample"]
tick_seconds = 30

[hooks]
pre_accept_url = "http://localhost:8090/pre-accept"

[mining]
target_weight = 2

[logging]
format = "json"
level = "debug"

[monitoring]
listen_addr = "0.0.0.0:9191"
"#;

#[test]
fn full_document_loads_every_section() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("node.toml");
    fs::write(&path, FULL).unwrap();

    let cfg = NodeConfig::load(path.to_str().unwrap()).unwrap();
    assert_eq!(cfg.node.name, "node-a");
    assert_eq!(cfg.network.tick_seconds, 30);
    assert_eq!(cfg.mining.target_weight, 2);
    assert_eq!(cfg.logging.format, "json");
    assert_eq!(
        cfg.hooks.pre_accept_url.as_deref(),
        Some("http://localhost:8090/pre-accept")
    );
    assert_eq!(cfg.network.bootstrap.len(), 1);
    assert_eq!(cfg.monitoring.listen_addr, "0.0.0.0:9191");
}

#[test]
fn monitoring_section_defaults_when_absent() {
    let minimal = r#"
[node]
name = "node-b"
data_dir = "./data"

[storage]
site_path = "./data/sites"
payload_path = "./data/payloads"

[network]
listen_addr = "/ip4/0.0.0.0/tcp/4001"
"#;
    let cfg: NodeConfig = toml::from_str(minimal).unwrap();
    assert_eq!(cfg.monitoring.listen_addr, "0.0.0.0:9090");
}

#[test]
fn missing_file_is_a_read_error_not_a_panic() {
    let result = NodeConfig::load("/nonexistent/path/to/node.toml");
    assert!(result.is_err());
}

#[test]
fn env_overrides_win_over_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("node.toml");
    fs::write(&path, FULL).unwrap();

    std::env::set_var("TANGLED_LISTEN_ADDR", "/ip4/0.0.0.0/tcp/9999");
    let cfg = NodeConfig::load(path.to_str().unwrap()).unwrap();
    std::env::remove_var("TANGLED_LISTEN_ADDR");

    assert_eq!(cfg.network.listen_addr, "/ip4/0.0.0.0/tcp/9999");
    // Unrelated fields are untouched by the override.
    assert_eq!(cfg.node.name, "node-a");
}
