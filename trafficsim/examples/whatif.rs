//! What-if session: a shop under constant traffic, switched to a spike
//! profile without restarting, then losing its database replica.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example whatif -p trafficsim
//!   cargo run --example whatif -p trafficsim -- --cadence 1 --json

use anyhow::{Result, bail};
use clap::Parser;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use trafficsim::{
    Component, ComponentKind, Connection, Event, LoadProfile, SimWorker, SimulationMetrics,
    Topology,
};

#[derive(Parser)]
struct Command {
    /// wall-clock milliseconds between two ticks
    #[arg(long, default_value = "100")]
    cadence: u64,

    /// ticks spent in each phase of the session
    #[arg(long, default_value = "50")]
    phase: u64,

    #[arg(long, default_value = "db-replica")]
    fail: String,

    /// print every tick as a JSON line instead of a periodic summary
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cmd = Command::parse();

    let (components, connections) = Topology::builder()
        .add_component(
            Component::builder("web", ComponentKind::WebClient)
                .set_generated_rps(300.0)
                .build(),
        )
        .add_component(
            Component::builder("mobile", ComponentKind::MobileClient)
                .set_generated_rps(200.0)
                .build(),
        )
        .add_component(Component::builder("gw", ComponentKind::ApiGateway).build())
        .add_component(Component::builder("shop", ComponentKind::Service).build())
        .add_component(Component::builder("cache", ComponentKind::Redis).build())
        .add_component(
            Component::builder("db-primary", ComponentKind::Postgresql)
                .set_max_rps(600.0)
                .set_replicas(2)
                .build(),
        )
        .add_component(
            Component::builder("db-replica", ComponentKind::Postgresql)
                .set_max_rps(600.0)
                .build(),
        )
        .add_connection(Connection::builder("web", "gw").set_latency_ms(30.0).build())
        .add_connection(Connection::builder("mobile", "gw").set_latency_ms(60.0).build())
        .add_connection(Connection::builder("gw", "shop").build())
        .add_connection(
            Connection::builder("shop", "cache")
                .add_routing_rule("default", 1.0, None)
                .build(),
        )
        .add_connection(
            Connection::builder("shop", "db-primary")
                .add_routing_rule("default", 0.3, None)
                .build(),
        )
        .add_connection(Connection::builder("db-primary", "db-replica").build())
        .build()?
        .into_parts();

    let worker =
        SimWorker::with_cadence(components, connections, Duration::from_millis(cmd.cadence))?;
    let mut session = Session::new(cmd.json);

    session.wait_ready(&worker)?;

    worker.start(LoadProfile::constant())?;
    session.run(&worker, "constant", cmd.phase)?;

    worker.update_profile(LoadProfile::spike())?;
    session.run(&worker, "spike", cmd.phase)?;

    worker.inject_failure(cmd.fail.as_str())?;
    session.run(&worker, "failure", cmd.phase)?;

    worker.stop()?;
    worker.shutdown()?;

    println!("session lasted {:?}", session.started.elapsed());
    Ok(())
}

struct Session {
    json: bool,
    started: Instant,
}

impl Session {
    fn new(json: bool) -> Self {
        Self {
            json,
            started: Instant::now(),
        }
    }

    fn wait_ready(&self, worker: &SimWorker) -> Result<()> {
        match worker.events().recv() {
            Some(Event::Ready {
                components,
                entries,
            }) => {
                println!("{components} components, entering at {entries:?}");
                Ok(())
            }
            Some(event) => bail!("Unexpected event before the worker was ready: {event:?}"),
            None => bail!("Worker exited before being ready"),
        }
    }

    /// consume `ticks` ticks, reporting anything else the worker says
    fn run(&mut self, worker: &SimWorker, phase: &str, ticks: u64) -> Result<()> {
        let mut seen = 0;

        while seen < ticks {
            let Some(event) = worker.events().recv() else {
                bail!("Worker exited during the {phase} phase");
            };

            match event {
                Event::Tick(metrics) => {
                    seen += 1;
                    self.tick(phase, &metrics)?;
                }
                Event::FailureReport(report) => {
                    println!(
                        "[{phase}] {} down, {} component(s) overloaded: {:?}",
                        report.failed_node, report.cascade_depth, report.affected
                    );
                }
                Event::Error(error) => println!("[{phase}] worker error: {error}"),
                Event::Ready { .. } => (),
            }
        }

        Ok(())
    }

    fn tick(&self, phase: &str, metrics: &SimulationMetrics) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(metrics)?);
        } else if metrics.engine_stats.tick % 10 == 0 {
            println!(
                "[{phase}] t={:>5.1}s p50={:>7.2}ms p99={:>8.2}ms throughput={:>6.0}/s errors={:>5.1}% in-flight={}",
                metrics.timestamp,
                metrics.latency_p50,
                metrics.latency_p99,
                metrics.throughput,
                metrics.error_rate * 100.0,
                metrics.engine_stats.active_requests,
            );
        }
        Ok(())
    }
}
