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

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Prometheus counters and gauges for the tangle and peer subsystems,
//! registered once at startup and exposed over `/metrics`.

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use thiserror::Error;

/// Metrics registration errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A collector could not be constructed or registered.
    #[error("prometheus error: {0}")]
    Prom(#[from] prometheus::Error),
}

/// Metrics container, cheap to clone and shared across the tangle, peer,
/// and HTTP subsystems.
#[derive(Clone)]
pub struct Metrics {
    /// Registry all collectors below are registered to.
    pub registry: Registry,

    /// Total known sites.
    pub tangle_size: IntGauge,
    /// Current tip-set size.
    pub tip_set_size: IntGauge,
    /// Sites accepted, partitioned by ingest path (`local` or `merge`).
    pub sites_accepted_total: IntCounterVec,
    /// Validation rejections, partitioned by error kind.
    pub validation_rejections_total: IntCounterVec,

    /// Currently connected remotes.
    pub connected_peers: IntGauge,
    /// Periodic merge cycles run.
    pub merge_cycles_total: IntCounter,
    /// Merge cycles that ended in `MergeFailed`.
    pub merge_failures_total: IntCounter,
    /// High-water mark of the splice out-of-order buffer.
    pub splice_buffer_high_water: IntGauge,
    /// Pre-accept hook calls that returned a successful HTTP status.
    pub pre_accept_hook_ok_total: IntCounter,
    /// Pre-accept hook calls that failed or returned a non-success status.
    pub pre_accept_hook_failed_total: IntCounter,
}

impl Metrics {
    /// Construct and register every collector.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let tangle_size = IntGauge::new("tangled_tangle_size", "Total known sites")?;
        let tip_set_size = IntGauge::new("tangled_tip_set_size", "Current tip-set size")?;
        let sites_accepted_total = IntCounterVec::new(
            Opts::new("tangled_sites_accepted_total", "Sites accepted by ingest path"),
            &["path"],
        )?;
        let validation_rejections_total = IntCounterVec::new(
            Opts::new("tangled_validation_rejections_total", "Validation rejections by error kind"),
            &["kind"],
        )?;

        let connected_peers = IntGauge::new("tangled_connected_peers", "Currently connected remotes")?;
        let merge_cycles_total = IntCounter::new("tangled_merge_cycles_total", "Periodic merge cycles run")?;
        let merge_failures_total = IntCounter::new("tangled_merge_failures_total", "Merge cycles that failed")?;
        let splice_buffer_high_water = IntGauge::new(
            "tangled_splice_buffer_high_water",
            "High-water mark of the splice out-of-order buffer",
        )?;
        let pre_accept_hook_ok_total =
            IntCounter::new("tangled_pre_accept_hook_ok_total", "Pre-accept hook successes")?;
        let pre_accept_hook_failed_total =
            IntCounter::new("tangled_pre_accept_hook_failed_total", "Pre-accept hook failures")?;

        registry.register(Box::new(tangle_size.clone()))?;
        registry.register(Box::new(tip_set_size.clone()))?;
        registry.register(Box::new(sites_accepted_total.clone()))?;
        registry.register(Box::new(validation_rejections_total.clone()))?;
        registry.register(Box::new(connected_peers.clone()))?;
        registry.register(Box::new(merge_cycles_total.clone()))?;
        registry.register(Box::new(merge_failures_total.clone()))?;
        registry.register(Box::new(splice_buffer_high_water.clone()))?;
        registry.register(Box::new(pre_accept_hook_ok_total.clone()))?;
        registry.register(Box::new(pre_accept_hook_failed_total.clone()))?;

        Ok(Self {
            registry,
            tangle_size,
            tip_set_size,
            sites_accepted_total,
            validation_rejections_total,
            connected_peers,
            merge_cycles_total,
            merge_failures_total,
            splice_buffer_high_water,
            pre_accept_hook_ok_total,
            pre_accept_hook_failed_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_registers_every_collector_once() {
        let metrics = Metrics::new().unwrap();
        let families = metrics.registry.gather();
        assert_eq!(families.len(), 10);
    }

    #[test]
    fn labeled_counters_accept_distinct_label_values() {
        let metrics = Metrics::new().unwrap();
        metrics.sites_accepted_total.with_label_values(&["local"]).inc();
        metrics.sites_accepted_total.with_label_values(&["merge"]).inc_by(2);
        assert_eq!(metrics.sites_accepted_total.with_label_values(&["local"]).get(), 1);
        assert_eq!(metrics.sites_accepted_total.with_label_values(&["merge"]).get(), 2);
    }
}
