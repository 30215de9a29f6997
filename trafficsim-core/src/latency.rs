use crate::component::Component;

/// Latency, in milliseconds, of one hop through `component` at its
/// current load.
///
/// With `utilization = current_load / max_rps` this is the M/M/1
/// approximation `base + base * utilization / (1 - utilization)`: the
/// base latency when idle, twice the base latency at 50%, ten times at
/// 90%. At or above 100% the component cannot admit more work and the
/// latency is [`f64::INFINITY`]. So is it for a component without any
/// capacity (`max_rps <= 0`).
///
/// ```
/// use trafficsim_core::{
///     component::{Component, ComponentKind},
///     latency::calculate_latency,
/// };
///
/// let svc = Component::builder("svc", ComponentKind::Service)
///     .set_base_latency_ms(10.0)
///     .set_max_rps(1_000.0)
///     .set_current_load(500.0)
///     .build();
///
/// assert_eq!(calculate_latency(&svc), 20.0);
/// ```
pub fn calculate_latency(component: &Component) -> f64 {
    if component.max_rps <= 0.0 {
        return f64::INFINITY;
    }

    let utilization = component.current_load / component.max_rps;
    if utilization >= 1.0 {
        return f64::INFINITY;
    }

    let base = component.base_latency_ms;
    base + base * (utilization / (1.0 - utilization))
}
