use crate::{
    component::{ComponentId, ComponentTable},
    connection::Connection,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Outcome of a failure injection: which component went down and which
/// of the components depending on it were pushed over capacity as a
/// result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub failed_node: ComponentId,
    /// number of components in `affected`
    pub cascade_depth: usize,
    /// overloaded components, in the order the cascade reached them
    pub affected: Vec<ComponentId>,
}

/// Walk the dependents of `failed` (the components with a connection to
/// it), breadth first, and redistribute their load.
///
/// Every dependent reached has its load scaled by
/// `replicas / max(replicas - 1, 1)`: the remaining replicas take over
/// the share of the lost one. A dependent pushed above its `max_rps`
/// is reported as affected and the walk continues with its own
/// dependents. Each component is visited at most once and `failed`
/// itself is never visited.
///
/// This does not change the liveness of `failed`.
pub fn propagate_failure(
    components: &mut ComponentTable,
    connections: &[Connection],
    failed: &ComponentId,
) -> FailureReport {
    let mut dependents: HashMap<&ComponentId, Vec<&ComponentId>> = HashMap::new();
    for connection in connections {
        dependents
            .entry(&connection.to)
            .or_default()
            .push(&connection.from);
    }
    let dependents_of = |id: &ComponentId| dependents.get(id).into_iter().flatten().copied();

    let mut affected = Vec::new();
    let mut visited: HashSet<&ComponentId> = HashSet::from([failed]);
    let mut queue: VecDeque<&ComponentId> = dependents_of(failed).collect();

    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        let Some(component) = components.get_mut(id) else {
            continue;
        };

        let replicas = f64::from(component.replicas);
        component.current_load *= replicas / (replicas - 1.0).max(1.0);

        if component.current_load > component.max_rps {
            affected.push(id.clone());
            queue.extend(dependents_of(id));
        }
    }

    FailureReport {
        failed_node: failed.clone(),
        cascade_depth: affected.len(),
        affected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ComponentKind};

    fn svc(id: &str, max_rps: f64, load: f64, replicas: u32) -> Component {
        Component::builder(id, ComponentKind::Service)
            .set_max_rps(max_rps)
            .set_current_load(load)
            .set_replicas(replicas)
            .build()
    }

    fn table(components: impl IntoIterator<Item = Component>) -> ComponentTable {
        components
            .into_iter()
            .map(|component| (component.id.clone(), component))
            .collect()
    }

    fn conn(from: &str, to: &str) -> Connection {
        Connection::builder(from, to).build()
    }

    #[test]
    fn overloaded_dependent_is_affected() {
        // 2 replicas: load doubles, 600 -> 1200 > 1000
        let mut components = table([svc("api", 1_000.0, 600.0, 2), svc("db", 1_000.0, 0.0, 1)]);
        let report = propagate_failure(&mut components, &[conn("api", "db")], &ComponentId::new("db"));

        assert_eq!(report.failed_node, "db");
        assert_eq!(report.affected, [ComponentId::new("api")]);
        assert_eq!(report.cascade_depth, 1);
        assert_eq!(components["api"].current_load, 1_200.0);
    }

    #[test]
    fn dependent_within_capacity_is_not_affected() {
        // 400 -> 800 <= 1000
        let mut components = table([svc("api", 1_000.0, 400.0, 2), svc("db", 1_000.0, 0.0, 1)]);
        let report = propagate_failure(&mut components, &[conn("api", "db")], &ComponentId::new("db"));

        assert!(report.affected.is_empty());
        assert_eq!(report.cascade_depth, 0);
        assert_eq!(components["api"].current_load, 800.0);
    }

    #[test]
    fn cascade_goes_upstream() {
        let mut components = table([
            svc("gw", 1_000.0, 600.0, 2),
            svc("api", 1_000.0, 600.0, 2),
            svc("db", 1_000.0, 0.0, 1),
        ]);
        let connections = [conn("gw", "api"), conn("api", "db")];
        let report = propagate_failure(&mut components, &connections, &ComponentId::new("db"));

        assert_eq!(
            report.affected,
            [ComponentId::new("api"), ComponentId::new("gw")]
        );
    }

    #[test]
    fn cascade_stops_at_healthy_node() {
        let mut components = table([
            svc("gw", 1_000.0, 600.0, 2),
            svc("api", 1_000.0, 100.0, 2),
            svc("db", 1_000.0, 0.0, 1),
        ]);
        let connections = [conn("gw", "api"), conn("api", "db")];
        let report = propagate_failure(&mut components, &connections, &ComponentId::new("db"));

        assert!(report.affected.is_empty());
        // never reached
        assert_eq!(components["gw"].current_load, 600.0);
    }

    #[test]
    fn single_replica_keeps_its_load() {
        let mut components = table([svc("api", 1_000.0, 600.0, 1), svc("db", 1_000.0, 0.0, 1)]);
        let report = propagate_failure(&mut components, &[conn("api", "db")], &ComponentId::new("db"));

        assert!(report.affected.is_empty());
        assert_eq!(components["api"].current_load, 600.0);
    }

    #[test]
    fn cycles_terminate() {
        let mut components = table([svc("a", 10.0, 600.0, 2), svc("b", 10.0, 600.0, 2)]);
        let connections = [conn("a", "b"), conn("b", "a")];
        let report = propagate_failure(&mut components, &connections, &ComponentId::new("b"));

        // `b` is the failed node and never revisited
        assert_eq!(report.affected, [ComponentId::new("a")]);
    }

    #[test]
    fn report_wire_format() {
        let mut components = table([svc("api", 1_000.0, 600.0, 2), svc("db", 1_000.0, 0.0, 1)]);
        let report = propagate_failure(&mut components, &[conn("api", "db")], &ComponentId::new("db"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["failedNode"], "db");
        assert_eq!(json["cascadeDepth"], 1);
        assert_eq!(json["affected"][0], "api");
        assert_eq!(serde_json::from_value::<FailureReport>(json).unwrap(), report);
    }

    #[test]
    fn unknown_dependents_are_skipped() {
        let mut components = table([svc("db", 1_000.0, 0.0, 1)]);
        let report = propagate_failure(&mut components, &[conn("ghost", "db")], &ComponentId::new("db"));
        assert!(report.affected.is_empty());
    }
}
