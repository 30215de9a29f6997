use crate::{
    component::{Component, ComponentId, ComponentTable},
    connection::Connection,
    defaults::{DEFAULT_RESPONSE_SIZE_KB, DEFAULT_SEED, MAX_ACTIVE_REQUESTS, TICK_DURATION},
    failure::{FailureReport, propagate_failure},
    generator::{pick_tag, poisson_sample, uniform},
    latency::calculate_latency,
    metrics::{EngineStats, SimulationMetrics, aggregate_metrics},
    profile::LoadProfile,
    request::{FailureReason, Request, RequestIdGenerator},
    routing::resolve_next_hops,
    topology::{Blueprint, Topology},
    traffic::TrafficRecorder,
};
use rand_chacha::ChaChaRng;
use rand_core::SeedableRng as _;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// The simulation engine.
///
/// The engine owns the component table and every request in flight. It
/// is either _stopped_ or _running_ a [`LoadProfile`]: [`Engine::start`]
/// resets the simulation and starts running, [`Engine::stop`] discards
/// everything in flight. While running, each call to [`Engine::tick`]
/// advances the simulation by one tick and returns the metrics of that
/// tick.
///
/// The engine has no clock of its own: pausing is simply not calling
/// [`Engine::tick`].
///
/// All the randomness of the simulation (arrivals, tag draws, routing,
/// overload shedding) comes from one seedable [`ChaChaRng`]: the same
/// seed, inputs and sequence of calls always produce the same metrics.
///
/// # Example
///
/// ```
/// use trafficsim_core::{
///     component::{Component, ComponentKind, ComponentTable},
///     connection::Connection,
///     engine::Engine,
///     profile::LoadProfile,
/// };
///
/// let components: ComponentTable = [
///     Component::builder("client", ComponentKind::WebClient)
///         .set_generated_rps(100.0)
///         .build(),
///     Component::builder("api", ComponentKind::Service)
///         .set_max_rps(10_000.0)
///         .build(),
/// ]
/// .into_iter()
/// .map(|component| (component.id.clone(), component))
/// .collect();
/// let connections = vec![Connection::builder("client", "api").build()];
///
/// let mut engine = Engine::builder().set_seed(42).build(components, connections);
/// engine.start(LoadProfile::constant());
///
/// for _ in 0..10 {
///     let metrics = engine.tick();
///     assert!(metrics.timestamp > 0.0);
/// }
///
/// engine.stop();
/// assert_eq!(engine.tick().throughput, 0.0);
/// ```
pub struct Engine {
    components: ComponentTable,
    topology: Topology,
    /// `None` while stopped
    profile: Option<LoadProfile>,
    active: Vec<Request>,
    tick: u64,
    request_id_generator: RequestIdGenerator,
    rng: ChaChaRng,
    tick_duration: Duration,
    max_active_requests: usize,
}

/// Configure the [`Engine`] before building it, see [`Engine::builder`].
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    seed: u64,
    tick_duration: Duration,
    max_active_requests: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Unknown component `{0}'")]
    UnknownComponent(ComponentId),
    #[error("The simulation is not running")]
    NotRunning,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            tick_duration: TICK_DURATION,
            max_active_requests: MAX_ACTIVE_REQUESTS,
        }
    }
}

impl EngineBuilder {
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Simulated time covered by one tick. A zero duration is ignored.
    pub fn set_tick_duration(mut self, tick_duration: Duration) -> Self {
        if tick_duration.is_zero() {
            warn!("ignoring zero tick duration, keeping {:?}", self.tick_duration);
        } else {
            self.tick_duration = tick_duration;
        }
        self
    }

    /// Ceiling on the requests carried from one tick to the next, see
    /// [`MAX_ACTIVE_REQUESTS`].
    pub fn set_max_active_requests(mut self, max_active_requests: usize) -> Self {
        self.max_active_requests = max_active_requests;
        self
    }

    /// Build the engine for the given topology.
    ///
    /// The inputs are taken as they are: use [`Topology::builder`] to
    /// check them first.
    pub fn build(self, components: ComponentTable, connections: Vec<Connection>) -> Engine {
        let topology = Topology::new(&components, connections);

        Engine {
            components,
            topology,
            profile: None,
            active: Vec::new(),
            tick: 0,
            request_id_generator: RequestIdGenerator::new(),
            rng: ChaChaRng::seed_from_u64(self.seed),
            tick_duration: self.tick_duration,
            max_active_requests: self.max_active_requests,
        }
    }

    pub fn build_from(self, blueprint: Blueprint) -> Engine {
        let (components, connections) = blueprint.into_parts();
        self.build(components, connections)
    }
}

impl Engine {
    /// An engine with the default configuration, see [`EngineBuilder`].
    pub fn new(components: ComponentTable, connections: Vec<Connection>) -> Self {
        Self::builder().build(components, connections)
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Re-seed the engine's random-number generator.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaChaRng::seed_from_u64(seed);
    }

    #[inline]
    pub fn components(&self) -> &ComponentTable {
        &self.components
    }

    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.get(id)
    }

    #[inline]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.profile.is_some()
    }

    #[inline]
    pub fn profile(&self) -> Option<&LoadProfile> {
        self.profile.as_ref()
    }

    /// number of ticks since the last [`Engine::start`]
    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    #[inline]
    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// number of requests in flight
    #[inline]
    pub fn active_requests(&self) -> usize {
        self.active.len()
    }

    /// Start (or restart) the simulation under `profile`.
    ///
    /// Everything is reset: tick counter, requests in flight, loads and
    /// the liveness of every component.
    pub fn start(&mut self, profile: LoadProfile) {
        self.tick = 0;
        self.active.clear();
        for component in self.components.values_mut() {
            component.current_load = 0.0;
            component.is_alive = true;
        }
        self.profile = Some(profile);

        info!(
            profile = %profile,
            components = self.components.len(),
            entries = self.topology.entries().len(),
            "simulation started"
        );
    }

    /// Swap the profile of a running simulation without resetting it.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotRunning`] if the simulation is stopped.
    pub fn update_profile(&mut self, profile: LoadProfile) -> Result<(), EngineError> {
        let Some(current) = self.profile.as_mut() else {
            return Err(EngineError::NotRunning);
        };
        *current = profile;

        info!(profile = %profile, tick = self.tick, "profile updated");
        Ok(())
    }

    /// Stop the simulation, discarding every request in flight.
    pub fn stop(&mut self) {
        let discarded = self.active.len();

        self.profile = None;
        self.active.clear();
        for component in self.components.values_mut() {
            component.current_load = 0.0;
        }

        info!(tick = self.tick, discarded, "simulation stopped");
    }

    /// Take the component `id` down and compute the cascade of overloads
    /// on the components depending on it.
    ///
    /// The component stays down until the next [`Engine::start`].
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownComponent`] if `id` is not in the table.
    pub fn inject_failure(&mut self, id: &str) -> Result<FailureReport, EngineError> {
        let Some(component) = self.components.get_mut(id) else {
            return Err(EngineError::UnknownComponent(ComponentId::new(id)));
        };
        component.is_alive = false;
        let failed = component.id.clone();

        let report = propagate_failure(&mut self.components, self.topology.connections(), &failed);

        info!(
            node = %failed,
            cascade_depth = report.cascade_depth,
            "failure injected"
        );
        Ok(report)
    }

    fn elapsed(&self) -> Duration {
        let ticks = u32::try_from(self.tick).unwrap_or(u32::MAX);
        self.tick_duration.saturating_mul(ticks)
    }

    /// Advance the simulation by one tick.
    ///
    /// While stopped this does nothing and returns all-zero metrics.
    /// Otherwise, in order:
    ///
    /// 1. new requests are generated at the entry components, following
    ///    the load profile;
    /// 2. the load of every component is recomputed from the requests
    ///    in flight;
    /// 3. every request in flight is processed at its current component
    ///    (failing, completing at a leaf or moving on to its next hops);
    /// 4. the requests carried over to the next tick are capped, the
    ///    continuations past the ceiling are counted but never created;
    /// 5. the responses of the completed requests are walked back to
    ///    the entry;
    /// 6. the metrics of the tick are aggregated.
    pub fn tick(&mut self) -> SimulationMetrics {
        let Some(profile) = self.profile else {
            return SimulationMetrics::default();
        };

        self.tick += 1;
        let elapsed = self.elapsed();
        let tick_secs = self.tick_duration.as_secs_f64();
        let multiplier = profile.multiplier(elapsed);

        let generated = self.generate(multiplier * tick_secs);
        self.account_load(tick_secs);

        let mut recorder = TrafficRecorder::new();
        let Advance {
            next,
            completed,
            dropped,
        } = self.advance(&mut recorder);

        if dropped > 0 {
            warn!(tick = self.tick, dropped, "too many requests in flight, dropping the newest");
        }
        self.active = next;

        for request in completed.iter() {
            if request.is_failed() || request.visited().len() < 2 {
                continue;
            }
            let response_kb = self
                .components
                .get(request.current())
                .map_or(DEFAULT_RESPONSE_SIZE_KB, Component::response_size_kb);
            recorder.response_path(request.visited(), request.tag(), response_kb);
        }

        let traffic = recorder.finish(tick_secs);
        let mut metrics = aggregate_metrics(
            &completed,
            &self.components,
            elapsed.as_secs_f64(),
            tick_secs,
            traffic.edge_throughput,
            traffic.edge_latency,
        );
        metrics.node_tag_traffic = traffic.nodes;
        metrics.edge_tag_traffic = traffic.edges;
        metrics.engine_stats = EngineStats {
            tick: self.tick,
            active_requests: self.active.len(),
            generated,
            completed: completed.len() as u64,
            dropped,
            tick_duration: Duration::ZERO,
        };

        debug!(
            tick = self.tick,
            generated,
            completed = completed.len(),
            active = self.active.len(),
            error_rate = metrics.error_rate,
            "tick"
        );

        metrics
    }

    /// Inject the new requests of the tick at the entry components.
    /// `scale` converts a rate in requests per second into the mean
    /// number of arrivals during the tick.
    fn generate(&mut self, scale: f64) -> u64 {
        let mut generated = 0;

        for entry in self.topology.entries() {
            let Some(component) = self.components.get(entry) else {
                continue;
            };
            if component.generated_rps <= 0.0 {
                continue;
            }

            let arrivals = poisson_sample(component.generated_rps * scale, &mut self.rng);
            for _ in 0..arrivals {
                let tag = pick_tag(component.tag_distribution.as_deref(), &mut self.rng);
                self.active.push(Request::new(
                    self.request_id_generator.generate(),
                    tag,
                    entry.clone(),
                    component.payload_size_kb,
                ));
            }
            generated += arrivals;
        }

        generated
    }

    /// Recompute `current_load` from scratch: every live request adds
    /// one request per tick to the component it currently is at.
    fn account_load(&mut self, tick_secs: f64) {
        for component in self.components.values_mut() {
            component.current_load = 0.0;
        }

        let load = 1.0 / tick_secs;
        for request in self.active.iter().filter(|request| !request.is_failed()) {
            if let Some(component) = self.components.get_mut(request.current()) {
                component.current_load += load;
            }
        }
    }

    /// Process every request in flight exactly once.
    ///
    /// At most `max_active_requests` continuations are created: once
    /// the ceiling is reached the remaining copies are only counted as
    /// dropped.
    fn advance(&mut self, recorder: &mut TrafficRecorder) -> Advance {
        let active = std::mem::take(&mut self.active);
        let mut next = Vec::with_capacity(active.len().min(self.max_active_requests));
        let mut completed = Vec::new();
        let mut dropped = 0;

        for mut request in active {
            if request.is_failed() {
                completed.push(request);
                continue;
            }

            let Some(component) = self.components.get(request.current()) else {
                fail(&mut request, FailureReason::NotFound);
                completed.push(request);
                continue;
            };
            if !component.is_alive {
                fail(&mut request, FailureReason::NotAlive);
                completed.push(request);
                continue;
            }

            if !component.kind.is_traffic_source() {
                if component.max_rps > 0.0 && component.current_load > component.max_rps {
                    let overload = component.current_load / component.max_rps;
                    if uniform(&mut self.rng) < (overload - 1.0) / overload {
                        fail(&mut request, FailureReason::Overloaded);
                        completed.push(request);
                        continue;
                    }
                } else {
                    let latency = calculate_latency(component);
                    if latency.is_infinite() {
                        fail(&mut request, FailureReason::AtCapacity);
                        completed.push(request);
                        continue;
                    }
                    request.add_latency(latency);
                }
            }

            let hops = resolve_next_hops(
                request.current(),
                request.tag(),
                request.visited(),
                &self.topology,
                &mut self.rng,
            );
            if hops.is_empty() {
                completed.push(request);
                continue;
            }

            for hop in hops {
                let tag = hop.out_tag.unwrap_or_else(|| request.tag().clone());
                let edge_latency = self
                    .topology
                    .connection(request.current(), &hop.target)
                    .map_or(0.0, |connection| connection.latency_ms);

                recorder.forward(
                    request.current(),
                    &hop.target,
                    &tag,
                    u64::from(hop.count),
                    request.payload_size_kb(),
                    edge_latency,
                );

                let room = self.max_active_requests.saturating_sub(next.len());
                let kept = usize::try_from(hop.count).unwrap_or(usize::MAX).min(room);
                dropped += u64::from(hop.count) - kept as u64;

                for _ in 0..kept {
                    next.push(request.continue_to(
                        self.request_id_generator.generate(),
                        hop.target.clone(),
                        tag.clone(),
                        edge_latency,
                    ));
                }
            }
        }

        Advance {
            next,
            completed,
            dropped,
        }
    }
}

/// Outcome of [`Engine::advance`].
struct Advance {
    /// requests carried over to the next tick, oldest first
    next: Vec<Request>,
    completed: Vec<Request>,
    /// continuations not created because of the population ceiling
    dropped: u64,
}

fn fail(request: &mut Request, reason: FailureReason) {
    trace!(request = %request.id(), node = %request.current(), %reason, "request failed");
    request.fail(reason);
}
