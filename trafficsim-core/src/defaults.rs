use std::time::Duration;

/// Default duration of one simulation [`tick`].
///
/// This is both the amount of simulated time one call to [`tick`]
/// represents and the wall-clock cadence the driver is expected to
/// call it at.
///
/// ```
/// # use trafficsim_core::defaults::*;
/// assert_eq!(TICK_DURATION.as_millis(), 100);
/// ```
///
/// [`tick`]: crate::engine::Engine::tick
pub const TICK_DURATION: Duration = Duration::from_millis(100);

/// Length of one full cycle of the [`Spike`] load profile.
///
/// [`Spike`]: crate::profile::ProfileKind::Spike
pub const SPIKE_CYCLE: Duration = Duration::from_secs(10);

/// How long, at the start of each [`SPIKE_CYCLE`], the traffic stays at
/// its nominal rate before spiking.
pub const SPIKE_NORMAL_PHASE: Duration = Duration::from_secs(7);

/// Traffic multiplier applied during the spiking phase of a cycle.
pub const SPIKE_MULTIPLIER: f64 = 3.0;

/// Ceiling on the number of in-flight requests carried from one tick to
/// the next.
///
/// Any excess is dropped silently (newest first). See
/// [`EngineBuilder::set_max_active_requests`].
///
/// [`EngineBuilder::set_max_active_requests`]: crate::engine::EngineBuilder::set_max_active_requests
pub const MAX_ACTIVE_REQUESTS: usize = 100_000;

/// Tag given to generated requests when the entry component has no
/// (usable) tag distribution.
pub const DEFAULT_TAG: &str = "default";

/// Response size attributed to a completed request when neither the
/// terminal component nor its kind define one.
pub const DEFAULT_RESPONSE_SIZE_KB: f64 = 1.0;

/// Above this mean the Poisson sampler switches to a normal approximation.
pub const POISSON_NORMAL_THRESHOLD: f64 = 30.0;

/// Seed of the engine's random-number generator unless told otherwise.
pub const DEFAULT_SEED: u64 = 0;
