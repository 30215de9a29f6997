use crate::{
    component::{ComponentId, ComponentTable},
    connection::EdgeKey,
    request::Request,
    traffic::{EdgeTagTraffic, NodeTagTraffic},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};

/// Book-keeping of the engine itself for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub tick: u64,
    /// requests in flight carried over to the next tick
    pub active_requests: usize,
    pub generated: u64,
    pub completed: u64,
    /// requests discarded because of the population cap
    pub dropped: u64,
    /// wall-clock time spent computing the tick, measured by the driver
    #[serde(default)]
    pub tick_duration: Duration,
}

/// The snapshot produced by every [`Engine::tick`].
///
/// Latency percentiles, throughput and error rate only account for the
/// requests that completed during the tick.
///
/// [`Engine::tick`]: crate::engine::Engine::tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationMetrics {
    /// simulated time, in seconds, at the end of the tick
    pub timestamp: f64,
    pub latency_p50: f64,
    pub latency_p95: f64,
    pub latency_p99: f64,
    /// successfully completed requests per second
    pub throughput: f64,
    /// failed over completed requests, `0` when nothing completed
    pub error_rate: f64,
    pub component_utilization: BTreeMap<ComponentId, f64>,
    pub queue_depths: BTreeMap<ComponentId, u64>,
    /// requests per second sent over each edge
    pub edge_throughput: BTreeMap<EdgeKey, f64>,
    /// mean latency of the edge for the requests that crossed it
    pub edge_latency: BTreeMap<EdgeKey, f64>,
    pub node_tag_traffic: BTreeMap<ComponentId, NodeTagTraffic>,
    pub edge_tag_traffic: BTreeMap<EdgeKey, EdgeTagTraffic>,
    pub engine_stats: EngineStats,
}

/// Reduce the requests that completed during a tick, and the state of
/// the components at the end of it, into a [`SimulationMetrics`].
///
/// The per-tag traffic maps and the [`EngineStats`] are left empty, the
/// engine fills them in.
///
/// ```
/// use std::collections::BTreeMap;
/// use trafficsim_core::{component::ComponentTable, metrics::aggregate_metrics};
///
/// let metrics = aggregate_metrics(
///     &[],
///     &ComponentTable::new(),
///     0.1,
///     0.1,
///     BTreeMap::new(),
///     BTreeMap::new(),
/// );
/// assert_eq!(metrics.throughput, 0.0);
/// assert_eq!(metrics.error_rate, 0.0);
/// ```
pub fn aggregate_metrics(
    completed: &[Request],
    components: &ComponentTable,
    timestamp: f64,
    tick_duration_secs: f64,
    edge_throughput: BTreeMap<EdgeKey, f64>,
    edge_latency: BTreeMap<EdgeKey, f64>,
) -> SimulationMetrics {
    let mut latencies: Vec<f64> = completed
        .iter()
        .filter(|request| !request.is_failed())
        .map(Request::total_latency_ms)
        .collect();
    latencies.sort_by(f64::total_cmp);

    let total = completed.len();
    let succeeded = latencies.len();
    let failed = total - succeeded;

    let throughput = if tick_duration_secs > 0.0 {
        succeeded as f64 / tick_duration_secs
    } else {
        0.0
    };
    let error_rate = if total > 0 {
        failed as f64 / total as f64
    } else {
        0.0
    };

    let component_utilization = components
        .iter()
        .map(|(id, component)| (id.clone(), component.utilization()))
        .collect();
    let queue_depths = components
        .iter()
        .map(|(id, component)| (id.clone(), component.queue_size))
        .collect();

    SimulationMetrics {
        timestamp,
        latency_p50: percentile(&latencies, 0.50),
        latency_p95: percentile(&latencies, 0.95),
        latency_p99: percentile(&latencies, 0.99),
        throughput,
        error_rate,
        component_utilization,
        queue_depths,
        edge_throughput,
        edge_latency,
        ..SimulationMetrics::default()
    }
}

/// Nearest-rank percentile of already sorted values: the value at index
/// `ceil(p * n) - 1`, `0` for an empty list.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[index]
}
