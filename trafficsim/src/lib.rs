/*!
# Traffic Simulation Worker

Runs a [`trafficsim_core`] simulation in a background thread, ticking it
on a wall-clock cadence, and drives it through messages:

```
use std::time::Duration;
use trafficsim::{Component, ComponentKind, Connection, Event, LoadProfile, SimWorker, Topology};

let (components, connections) = Topology::builder()
    .add_component(
        Component::builder("client", ComponentKind::MobileClient)
            .set_generated_rps(50.0)
            .build(),
    )
    .add_component(Component::builder("api", ComponentKind::Service).build())
    .add_connection(Connection::builder("client", "api").build())
    .build()?
    .into_parts();

// tick every millisecond instead of every 100ms
let worker = SimWorker::with_cadence(components, connections, Duration::from_millis(1))?;
assert!(matches!(worker.events().recv(), Some(Event::Ready { .. })));

worker.start(LoadProfile::constant())?;
while let Some(event) = worker.events().recv() {
    if let Event::Tick(metrics) = event {
        assert_eq!(metrics.engine_stats.tick, 1);
        break;
    }
}

worker.shutdown()?;
# Ok::<(), anyhow::Error>(())
```

Commands never fail in the worker thread itself: a command the
simulation cannot honour (resuming a simulation that was never
started, failing an unknown component...) is answered with an
[`Event::Error`].
*/

mod worker;

// convenient re-export of `trafficsim_core` core objects
pub use trafficsim_core::{
    Blueprint, Component, ComponentId, ComponentKind, ComponentTable, Connection, EngineBuilder,
    EngineError, EngineStats, FailureReport, LoadProfile, SimulationMetrics, Topology,
};

pub use self::worker::{
    SimWorker,
    command::{Command, Event, EventReceiver, WorkerError},
};
