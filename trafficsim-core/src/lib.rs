/*!
# Traffic Simulation Core

A discrete-time model of request traffic flowing through a topology of
infrastructure components (clients, gateways, load balancers, services,
databases, queues...). There is no real network traffic involved: the
simulation is a numeric model advanced one fixed-duration tick at a
time.

The two inputs are a [`ComponentTable`] and a list of [`Connection`]s
(see [`Topology::builder`] to assemble and check them, or deserialize a
[`Blueprint`] from JSON). The [`Engine`] owns them for the whole run:

```
use trafficsim_core::{
    component::{Component, ComponentKind},
    connection::Connection,
    engine::Engine,
    profile::LoadProfile,
    topology::Topology,
};

let blueprint = Topology::builder()
    .add_component(
        Component::builder("client", ComponentKind::WebClient)
            .set_generated_rps(200.0)
            .build(),
    )
    .add_component(Component::builder("lb", ComponentKind::LoadBalancer).build())
    .add_component(Component::builder("api-1", ComponentKind::Service).build())
    .add_component(Component::builder("api-2", ComponentKind::Service).build())
    .add_connection(Connection::builder("client", "lb").build())
    .add_connection(Connection::builder("lb", "api-1").build())
    .add_connection(Connection::builder("lb", "api-2").build())
    .build()?;

let mut engine = Engine::builder().set_seed(42).build_from(blueprint);
engine.start("ramp 10s".parse()?);

for _ in 0..50 {
    let metrics = engine.tick();
    assert!(metrics.error_rate <= 1.0);
}

let report = engine.inject_failure("api-1")?;
assert_eq!(report.failed_node, "api-1");
# Ok::<(), anyhow::Error>(())
```

Every tick generates new requests at the entry components following the
[`LoadProfile`], recomputes the load of every component, moves every
request one hop further (or completes or fails it) and reduces the
outcome into [`SimulationMetrics`].

The engine is single threaded and never sleeps: driving it on a
wall-clock cadence is left to the caller (see the `trafficsim` crate).

[`ComponentTable`]: component::ComponentTable
[`Connection`]: connection::Connection
[`Topology::builder`]: topology::Topology::builder
[`Blueprint`]: topology::Blueprint
[`Engine`]: engine::Engine
[`LoadProfile`]: profile::LoadProfile
[`SimulationMetrics`]: metrics::SimulationMetrics
*/

pub mod component;
pub mod connection;
pub mod defaults;
pub mod engine;
pub mod failure;
pub mod generator;
pub mod latency;
pub mod metrics;
pub mod profile;
pub mod request;
pub mod routing;
pub mod tag;
mod time;
pub mod topology;
pub mod traffic;

pub use self::{
    component::{Component, ComponentId, ComponentKind, ComponentTable},
    connection::{Connection, EdgeKey},
    engine::{Engine, EngineBuilder, EngineError},
    failure::FailureReport,
    metrics::{EngineStats, SimulationMetrics},
    profile::{LoadProfile, ProfileKind},
    tag::Tag,
    topology::{Blueprint, Topology, TopologyError},
};
