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

//! Node configuration: a single typed TOML file, loadable at startup and
//! overridable by environment variables for deployment-sensitive fields.
//! Missing optional fields fall back to documented defaults; a missing
//! required field is a startup error, never a panic.

use std::fs;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures loading or parsing the node configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file's contents did not parse as valid TOML matching the schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
}

fn env_override(key: &str, current: &mut String) {
    if let Ok(v) = std::env::var(key) {
        *current = v;
    }
}

/// Root configuration document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node identity and data directory.
    pub node: NodeSettings,
    /// Durable store paths.
    pub storage: StorageConfig,
    /// Listen/advertise/bootstrap settings.
    pub network: NetworkConfig,
    /// Optional external hook endpoints.
    #[serde(default)]
    pub hooks: HooksConfig,
    /// Local mining defaults.
    #[serde(default)]
    pub mining: MiningConfig,
    /// Logging format/level.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Metrics/healthz HTTP surface.
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Node identity settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Human-readable node name, used in logs and the `/healthz` body.
    pub name: String,
    /// Base data directory (parent of the store paths, informational).
    pub data_dir: String,
}

/// Durable store locations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the site store (sled database directory).
    pub site_path: String,
    /// Path to the payload store (sled database directory).
    pub payload_path: String,
}

/// Peer networking settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Listen multiaddr, e.g. `/ip4/0.0.0.0/tcp/4001`.
    pub listen_addr: String,
    /// Multiaddr advertised to peers, if different from `listen_addr`.
    #[serde(default)]
    pub public_addr: Option<String>,
    /// Bootstrap peer multiaddrs (with trailing `/p2p/<PeerId>`) to dial at startup.
    #[serde(default)]
    pub bootstrap: Vec<String>,
    /// Periodic merge-scheduler tick interval, in seconds.
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
}

fn default_tick_seconds() -> u64 {
    60
}

/// Optional external collaborator hooks.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HooksConfig {
    /// Pre-accept hook URL, called best-effort before a merge-path site is injected.
    #[serde(default)]
    pub pre_accept_url: Option<String>,
}

/// Local mining defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Default target weight used when mining a locally submitted site.
    #[serde(default = "default_target_weight")]
    pub target_weight: usize,
}

fn default_target_weight() -> usize {
    1
}

impl Default for MiningConfig {
    fn default() -> Self {
        MiningConfig {
            target_weight: default_target_weight(),
        }
    }
}

/// Logging format/level.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `compact` (interactive) or `json` (production/ingestion).
    #[serde(default = "default_log_format")]
    pub format: String,
    /// `tracing`/`RUST_LOG`-style level filter, e.g. `info`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

/// The ambient `/metrics` + `/healthz` HTTP surface, distinct from the
/// peer protocol's listen address.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Socket address the metrics/healthz server binds, e.g. `0.0.0.0:9090`.
    #[serde(default = "default_monitoring_addr")]
    pub listen_addr: String,
}

fn default_monitoring_addr() -> String {
    "0.0.0.0:9090".to_string()
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        MonitoringConfig {
            listen_addr: default_monitoring_addr(),
        }
    }
}

impl NodeConfig {
    /// Load and parse the config file at `path`, then apply environment
    /// overrides for the fields deployment scripts most commonly need to
    /// vary per-instance without editing the file: `TANGLED_DATA_DIR`,
    /// `TANGLED_LISTEN_ADDR`, `TANGLED_LOG_FORMAT`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let mut cfg: NodeConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        env_override("TANGLED_DATA_DIR", &mut cfg.node.data_dir);
        env_override("TANGLED_LISTEN_ADDR", &mut cfg.network.listen_addr);
        env_override("TANGLED_LOG_FORMAT", &mut cfg.logging.format);
        Ok(cfg)
    }
}
