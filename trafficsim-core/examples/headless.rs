//! Run a simulation as fast as possible, without any wall-clock pacing,
//! and print a summary of the run.
//!
//! ```sh
//! RUST_LOG=info cargo run --example headless -- --profile "ramp 30s" --ticks 600
//! cargo run --example headless -- --topology shop.json --fail db --fail-at 300
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::ProgressBar;
use std::{fs, path::PathBuf};
use tracing_subscriber::EnvFilter;
use trafficsim_core::{
    Blueprint, Component, ComponentKind, Connection, Engine, LoadProfile, Topology,
};

#[derive(Parser)]
struct Command {
    /// JSON file with the `components` and `connections` of the topology,
    /// a small built-in topology is used otherwise
    #[arg(long)]
    topology: Option<PathBuf>,

    #[arg(long, default_value = "constant")]
    profile: LoadProfile,

    #[arg(long, default_value = "300")]
    ticks: u64,

    #[arg(long, default_value = "0")]
    seed: u64,

    /// component to take down during the run
    #[arg(long)]
    fail: Option<String>,

    /// tick at which `--fail` happens
    #[arg(long, default_value = "100")]
    fail_at: u64,
}

fn builtin() -> Result<Blueprint> {
    let blueprint = Topology::builder()
        .add_component(
            Component::builder("web", ComponentKind::WebClient)
                .set_generated_rps(800.0)
                .build(),
        )
        .add_component(Component::builder("lb", ComponentKind::LoadBalancer).build())
        .add_component(Component::builder("api-1", ComponentKind::Service).build())
        .add_component(Component::builder("api-2", ComponentKind::Service).build())
        .add_component(
            Component::builder("db", ComponentKind::Postgresql)
                .set_max_rps(1_000.0)
                .build(),
        )
        .add_connection(Connection::builder("web", "lb").set_latency_ms(20.0).build())
        .add_connection(Connection::builder("lb", "api-1").build())
        .add_connection(Connection::builder("lb", "api-2").build())
        .add_connection(Connection::builder("api-1", "db").build())
        .add_connection(Connection::builder("api-2", "db").build())
        .build()?;
    Ok(blueprint)
}

fn load(path: &PathBuf) -> Result<Blueprint> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid topology {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cmd = Command::parse();

    let blueprint = match &cmd.topology {
        Some(path) => load(path)?,
        None => builtin()?,
    };

    let mut engine = Engine::builder().set_seed(cmd.seed).build_from(blueprint);
    engine.start(cmd.profile);

    let mut completed = 0u64;
    let mut errors = 0.0;
    let mut p99_max: f64 = 0.0;

    let pb = ProgressBar::new(cmd.ticks);
    for tick in 1..=cmd.ticks {
        if tick == cmd.fail_at
            && let Some(id) = &cmd.fail
        {
            let report = engine.inject_failure(id)?;
            pb.println(format!(
                "{id} failed, {} component(s) overloaded: {:?}",
                report.cascade_depth, report.affected
            ));
        }

        let metrics = engine.tick();
        completed += metrics.engine_stats.completed;
        errors += metrics.error_rate * metrics.engine_stats.completed as f64;
        p99_max = p99_max.max(metrics.latency_p99);
        pb.inc(1);
    }
    pb.finish_with_message("done");

    let error_rate = if completed > 0 {
        errors / completed as f64
    } else {
        0.0
    };

    println!("profile:       {}", cmd.profile);
    println!("ticks:         {}", engine.tick_count());
    println!("completed:     {completed}");
    println!("error rate:    {:.2}%", error_rate * 100.0);
    println!("worst p99:     {p99_max:.2}ms");
    println!("in flight:     {}", engine.active_requests());

    Ok(())
}
