use crate::{component::ComponentId, connection::EdgeKey, tag::Tag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rate of the traffic carrying one [`Tag`] during a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagTraffic {
    /// requests per second
    pub rps: f64,
    /// kilobytes per second
    #[serde(rename = "bytesPerSec")]
    pub kb_per_sec: f64,
}

pub type TagTrafficMap = BTreeMap<Tag, TagTraffic>;

/// Tagged traffic going through a component, split by direction.
///
/// `incoming`/`outgoing` are the requests flowing forward through the
/// topology, `response_*` the responses flowing back from the
/// component where each request completed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTagTraffic {
    pub incoming: TagTrafficMap,
    pub outgoing: TagTrafficMap,
    pub response_incoming: TagTrafficMap,
    pub response_outgoing: TagTrafficMap,
}

/// Tagged traffic over one edge. `response` flows from `to` back to
/// `from`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeTagTraffic {
    pub forward: TagTrafficMap,
    pub response: TagTrafficMap,
}

/// Everything [`TrafficRecorder`] learnt during a tick, as rates.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TickTraffic {
    pub(crate) nodes: BTreeMap<ComponentId, NodeTagTraffic>,
    pub(crate) edges: BTreeMap<EdgeKey, EdgeTagTraffic>,
    pub(crate) edge_throughput: BTreeMap<EdgeKey, f64>,
    pub(crate) edge_latency: BTreeMap<EdgeKey, f64>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counter {
    count: u64,
    kb: f64,
}

type Counters = BTreeMap<Tag, Counter>;

#[derive(Debug, Default)]
struct NodeCounters {
    incoming: Counters,
    outgoing: Counters,
    response_incoming: Counters,
    response_outgoing: Counters,
}

#[derive(Debug, Default)]
struct EdgeCounters {
    forward: Counters,
    response: Counters,
    /// requests that crossed the edge, all tags together
    count: u64,
    latency_sum_ms: f64,
}

/// Per-tick accumulator of the traffic crossing nodes and edges.
#[derive(Debug, Default)]
pub(crate) struct TrafficRecorder {
    nodes: BTreeMap<ComponentId, NodeCounters>,
    edges: BTreeMap<EdgeKey, EdgeCounters>,
}

impl Counter {
    fn add(&mut self, count: u64, kb: f64) {
        self.count += count;
        self.kb += kb;
    }

    fn rate(&self, tick_secs: f64) -> TagTraffic {
        TagTraffic {
            rps: self.count as f64 / tick_secs,
            kb_per_sec: self.kb / tick_secs,
        }
    }
}

fn record(counters: &mut Counters, tag: &Tag, count: u64, kb: f64) {
    counters.entry(tag.clone()).or_default().add(count, kb);
}

fn rates(counters: &Counters, tick_secs: f64) -> TagTrafficMap {
    counters
        .iter()
        .map(|(tag, counter)| (tag.clone(), counter.rate(tick_secs)))
        .collect()
}

impl TrafficRecorder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// `copies` requests tagged `tag` were sent from `from` to `to`, each
    /// of `payload_kb` and crossing an edge of `latency_ms`.
    pub(crate) fn forward(
        &mut self,
        from: &ComponentId,
        to: &ComponentId,
        tag: &Tag,
        copies: u64,
        payload_kb: f64,
        latency_ms: f64,
    ) {
        let kb = payload_kb * copies as f64;

        record(&mut self.node(from).outgoing, tag, copies, kb);
        record(&mut self.node(to).incoming, tag, copies, kb);

        let edge = self.edge(from, to);
        record(&mut edge.forward, tag, copies, kb);
        edge.count += copies;
        edge.latency_sum_ms += latency_ms * copies as f64;
    }

    /// A response of `kb` travels back along the `from -> to` edge,
    /// i.e. from `to` to `from`.
    pub(crate) fn response(&mut self, from: &ComponentId, to: &ComponentId, tag: &Tag, kb: f64) {
        record(&mut self.node(to).response_outgoing, tag, 1, kb);
        record(&mut self.node(from).response_incoming, tag, 1, kb);
        record(&mut self.edge(from, to).response, tag, 1, kb);
    }

    /// Walk back the path of a request that completed at the last
    /// component of `path`, attributing a response of `kb` to every hop.
    pub(crate) fn response_path(&mut self, path: &[ComponentId], tag: &Tag, kb: f64) {
        for hop in path.windows(2).rev() {
            self.response(&hop[0], &hop[1], tag, kb);
        }
    }

    fn node(&mut self, id: &ComponentId) -> &mut NodeCounters {
        self.nodes.entry(id.clone()).or_default()
    }

    fn edge(&mut self, from: &ComponentId, to: &ComponentId) -> &mut EdgeCounters {
        self.edges
            .entry(EdgeKey::new(from.clone(), to.clone()))
            .or_default()
    }

    /// Turn the counters into rates over a tick of `tick_secs` seconds.
    pub(crate) fn finish(self, tick_secs: f64) -> TickTraffic {
        let mut traffic = TickTraffic::default();
        if tick_secs <= 0.0 {
            return traffic;
        }

        for (id, node) in self.nodes {
            let node_traffic = NodeTagTraffic {
                incoming: rates(&node.incoming, tick_secs),
                outgoing: rates(&node.outgoing, tick_secs),
                response_incoming: rates(&node.response_incoming, tick_secs),
                response_outgoing: rates(&node.response_outgoing, tick_secs),
            };
            traffic.nodes.insert(id, node_traffic);
        }

        for (key, edge) in self.edges {
            if edge.count > 0 {
                traffic
                    .edge_throughput
                    .insert(key.clone(), edge.count as f64 / tick_secs);
                traffic
                    .edge_latency
                    .insert(key.clone(), edge.latency_sum_ms / edge.count as f64);
            }
            let edge_traffic = EdgeTagTraffic {
                forward: rates(&edge.forward, tick_secs),
                response: rates(&edge.response, tick_secs),
            };
            traffic.edges.insert(key, edge_traffic);
        }

        traffic
    }
}
