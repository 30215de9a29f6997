mod blueprint;

pub use self::blueprint::{Blueprint, BlueprintBuilder, TopologyError};
use crate::{
    component::{ComponentId, ComponentTable},
    connection::{Connection, EdgeKey},
};
use std::collections::{HashMap, HashSet};

/// Forward adjacency of the topology: for each component, the targets of
/// its outgoing connections in the order the connections were given.
///
/// Parallel connections appear as repeated targets.
pub type Adjacency = HashMap<ComponentId, Vec<ComponentId>>;

/// Everything about the shape of the topology the engine needs on every
/// tick, computed once from the component table and connection list.
#[derive(Debug, Clone)]
pub struct Topology {
    adjacency: Adjacency,
    entries: Vec<ComponentId>,
    connections: Vec<Connection>,
    /// index in `connections` of the first connection of each edge
    lookup: HashMap<EdgeKey, usize>,
    /// indices in `connections` of the outgoing connections of each
    /// component, parallel connections included
    outgoing: HashMap<ComponentId, Vec<usize>>,
    load_balancers: HashSet<ComponentId>,
}

/// Build the forward [`Adjacency`] of the given connections.
///
/// ```
/// use trafficsim_core::{connection::Connection, topology::build_adjacency};
///
/// let adjacency = build_adjacency(&[
///     Connection::builder("a", "b").build(),
///     Connection::builder("a", "c").build(),
///     Connection::builder("b", "c").build(),
/// ]);
///
/// assert_eq!(adjacency["a"].len(), 2);
/// assert_eq!(adjacency["b"].len(), 1);
/// assert!(!adjacency.contains_key("c"));
/// ```
pub fn build_adjacency(connections: &[Connection]) -> Adjacency {
    let mut adjacency = Adjacency::new();
    for connection in connections {
        adjacency
            .entry(connection.from.clone())
            .or_default()
            .push(connection.to.clone());
    }
    adjacency
}

/// The components traffic enters the topology from.
///
/// A component is an entry if it is a traffic source or if no
/// connection targets it. When that leaves nothing (every component is
/// part of a cycle) the first component of the table is used, so there
/// is always somewhere to inject traffic as long as the table is not
/// empty.
pub fn find_entry_nodes(components: &ComponentTable, connections: &[Connection]) -> Vec<ComponentId> {
    let has_incoming: HashSet<&str> = connections
        .iter()
        .map(|connection| connection.to.as_str())
        .collect();

    let entries: Vec<ComponentId> = components
        .iter()
        .filter(|(id, component)| {
            component.kind.is_traffic_source() || !has_incoming.contains(id.as_str())
        })
        .map(|(id, _)| id.clone())
        .collect();

    if entries.is_empty() {
        components.keys().take(1).cloned().collect()
    } else {
        entries
    }
}

impl Topology {
    pub fn new(components: &ComponentTable, connections: Vec<Connection>) -> Self {
        let adjacency = build_adjacency(&connections);
        let entries = find_entry_nodes(components, &connections);

        let mut lookup = HashMap::with_capacity(connections.len());
        let mut outgoing: HashMap<ComponentId, Vec<usize>> = HashMap::new();
        for (index, connection) in connections.iter().enumerate() {
            lookup.entry(connection.key()).or_insert(index);
            outgoing
                .entry(connection.from.clone())
                .or_default()
                .push(index);
        }

        let load_balancers = components
            .values()
            .filter(|component| component.kind.is_load_balancer())
            .map(|component| component.id.clone())
            .collect();

        Self {
            adjacency,
            entries,
            connections,
            lookup,
            outgoing,
            load_balancers,
        }
    }

    #[inline]
    pub fn adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    /// targets of the outgoing connections of `id`, empty for leaves
    pub fn neighbors(&self, id: &str) -> &[ComponentId] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    #[inline]
    pub fn entries(&self) -> &[ComponentId] {
        &self.entries
    }

    #[inline]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Every connection leaving `id`, in the order they were given.
    pub fn outgoing(&self, id: &str) -> impl Iterator<Item = &Connection> + '_ {
        self.outgoing
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|index| self.connections.get(*index))
    }

    /// The connection from `from` to `to`. With parallel connections,
    /// the first one given wins.
    pub fn connection(&self, from: &ComponentId, to: &ComponentId) -> Option<&Connection> {
        let key = EdgeKey::new(from.clone(), to.clone());
        self.lookup
            .get(&key)
            .and_then(|index| self.connections.get(*index))
    }

    #[inline]
    pub fn is_load_balancer(&self, id: &str) -> bool {
        self.load_balancers.contains(id)
    }

    #[inline]
    pub fn load_balancers(&self) -> &HashSet<ComponentId> {
        &self.load_balancers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ComponentKind};

    fn table(components: impl IntoIterator<Item = (&'static str, ComponentKind)>) -> ComponentTable {
        components
            .into_iter()
            .map(|(id, kind)| (ComponentId::new(id), Component::builder(id, kind).build()))
            .collect()
    }

    fn conn(from: &str, to: &str) -> Connection {
        Connection::builder(from, to).build()
    }

    #[test]
    fn empty_adjacency() {
        assert!(build_adjacency(&[]).is_empty());
    }

    #[test]
    fn adjacency_keeps_order_and_duplicates() {
        let adjacency = build_adjacency(&[conn("a", "b"), conn("a", "c"), conn("a", "b")]);
        assert_eq!(
            adjacency["a"],
            [ComponentId::new("b"), ComponentId::new("c"), ComponentId::new("b")]
        );
    }

    #[test]
    fn clients_are_always_entries() {
        let components = table([
            ("client", ComponentKind::WebClient),
            ("svc", ComponentKind::Service),
        ]);
        // even with an incoming edge
        let connections = [conn("client", "svc"), conn("svc", "client")];
        let entries = find_entry_nodes(&components, &connections);
        assert_eq!(entries, [ComponentId::new("client")]);
    }

    #[test]
    fn nodes_without_incoming_are_entries() {
        let components = table([("a", ComponentKind::Service), ("b", ComponentKind::Service)]);
        let entries = find_entry_nodes(&components, &[conn("a", "b")]);
        assert_eq!(entries, [ComponentId::new("a")]);
    }

    #[test]
    fn cycle_falls_back_to_first() {
        let components = table([("a", ComponentKind::Service), ("b", ComponentKind::Service)]);
        let entries = find_entry_nodes(&components, &[conn("a", "b"), conn("b", "a")]);
        assert_eq!(entries, [ComponentId::new("a")]);
    }

    #[test]
    fn empty_table_has_no_entries() {
        assert!(find_entry_nodes(&ComponentTable::new(), &[]).is_empty());
    }

    #[test]
    fn topology_lookups() {
        let components = table([
            ("client", ComponentKind::WebClient),
            ("lb", ComponentKind::LoadBalancer),
            ("s1", ComponentKind::Service),
        ]);
        let first = Connection::builder("lb", "s1").set_latency_ms(3.0).build();
        let second = Connection::builder("lb", "s1").set_latency_ms(9.0).build();
        let topology = Topology::new(&components, vec![conn("client", "lb"), first, second]);

        assert!(topology.is_load_balancer("lb"));
        assert!(!topology.is_load_balancer("s1"));
        assert_eq!(topology.neighbors("lb").len(), 2);
        assert!(topology.neighbors("s1").is_empty());
        assert_eq!(
            topology
                .connection(&ComponentId::new("lb"), &ComponentId::new("s1"))
                .map(|connection| connection.latency_ms),
            Some(3.0)
        );
        assert!(
            topology
                .connection(&ComponentId::new("s1"), &ComponentId::new("lb"))
                .is_none()
        );
    }

    #[test]
    fn outgoing_keeps_parallel_connections() {
        let components = table([("a", ComponentKind::Service), ("b", ComponentKind::Service)]);
        let first = Connection::builder("a", "b").set_latency_ms(3.0).build();
        let second = Connection::builder("a", "b").set_latency_ms(9.0).build();
        let topology = Topology::new(&components, vec![first, second]);

        let latencies: Vec<f64> = topology
            .outgoing("a")
            .map(|connection| connection.latency_ms)
            .collect();
        assert_eq!(latencies, [3.0, 9.0]);
        assert_eq!(topology.outgoing("b").count(), 0);
    }
}
