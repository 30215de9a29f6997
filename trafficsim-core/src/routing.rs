use crate::{
    component::ComponentId,
    generator::{uniform, uniform_index},
    tag::Tag,
    topology::Topology,
};
use rand_core::Rng;

/// Where a request goes next, and how many copies of it go there.
#[derive(Debug, Clone, PartialEq)]
pub struct NextHop {
    pub target: ComponentId,
    pub count: u32,
    /// the tag the copies carry, `None` to keep the request's tag
    pub out_tag: Option<Tag>,
}

impl NextHop {
    fn single(target: ComponentId) -> Self {
        Self {
            target,
            count: 1,
            out_tag: None,
        }
    }
}

/// Resolve the next hop(s) of a request tagged `tag` currently at `node`
/// having already gone through `visited`.
///
/// Neighbours already visited are never considered, so a request never
/// loops even when the topology has cycles. Then:
///
/// 1. a load balancer forwards to exactly one neighbour, picked
///    uniformly, ignoring any routing rule;
/// 2. otherwise, if a connection to an unvisited neighbour has a rule
///    for `tag` with a positive weight, the request fans out along every
///    connection with a matching rule: `floor(weight)` copies plus one
///    more with probability `fract(weight)`. Parallel connections to
///    the same neighbour are resolved one by one, each with its own
///    rules;
/// 3. otherwise the request goes to one neighbour, picked uniformly.
///
/// An empty result means the request has reached a leaf.
pub fn resolve_next_hops<R: Rng>(
    node: &ComponentId,
    tag: &Tag,
    visited: &[ComponentId],
    topology: &Topology,
    rng: &mut R,
) -> Vec<NextHop> {
    let unvisited: Vec<&ComponentId> = topology
        .neighbors(node.as_str())
        .iter()
        .filter(|neighbor| !visited.contains(*neighbor))
        .collect();

    if unvisited.is_empty() {
        return Vec::new();
    }

    if topology.is_load_balancer(node.as_str()) {
        return vec![pick_one(&unvisited, rng)];
    }

    // every connection is looked at on its own: parallel connections to
    // the same target each apply their own rule
    let rules: Vec<_> = topology
        .outgoing(node.as_str())
        .filter(|connection| !visited.contains(&connection.to))
        .filter_map(|connection| {
            let rule = connection.rule_for(tag.as_str())?;
            Some((&connection.to, rule))
        })
        .collect();

    if !rules.iter().any(|(_, rule)| rule.weight > 0.0) {
        return vec![pick_one(&unvisited, rng)];
    }

    rules
        .into_iter()
        .filter_map(|(target, rule)| {
            let weight = rule.weight.max(0.0);
            let mut count = weight.floor() as u32;
            let fraction = weight.fract();
            if fraction > 0.0 && uniform(rng) < fraction {
                count += 1;
            }

            (count > 0).then(|| NextHop {
                target: target.clone(),
                count,
                out_tag: rule.out_tag.clone(),
            })
        })
        .collect()
}

fn pick_one<R: Rng>(candidates: &[&ComponentId], rng: &mut R) -> NextHop {
    let index = uniform_index(rng, candidates.len());
    NextHop::single(candidates[index].clone())
}
