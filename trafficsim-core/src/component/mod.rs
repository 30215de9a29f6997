mod id;
mod kind;

pub use self::{
    id::ComponentId,
    kind::{ComponentKind, KindDefaults, UnknownComponentKind},
};
use crate::{defaults::DEFAULT_RESPONSE_SIZE_KB, tag::TagWeight};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The component table: every simulated component, by identifier.
///
/// The table is ordered so that every pass over it (generation, load
/// accounting, metrics) happens in the same order from one run to the
/// next, which keeps seeded simulations reproducible.
pub type ComponentTable = BTreeMap<ComponentId, Component>;

/// A node of the simulated topology.
///
/// Components are owned by the [`Engine`] for the whole simulation run
/// and mutated in place on every tick: `current_load` is recomputed from
/// scratch at the start of each tick and `is_alive` is flipped by
/// failure injection.
///
/// Use [`Component::builder`] to start from the defaults of a
/// [`ComponentKind`].
///
/// [`Engine`]: crate::engine::Engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: ComponentId,

    #[serde(rename = "type")]
    pub kind: ComponentKind,

    /// saturation throughput (requests per second)
    pub max_rps: f64,

    /// requests per second currently attributed to this component
    #[serde(default)]
    pub current_load: f64,

    /// requests per second generated by this component (clients only)
    #[serde(default)]
    pub generated_rps: f64,

    pub base_latency_ms: f64,

    /// reserved for a quadratic latency model, not used by the simulation
    #[serde(default)]
    pub load_latency_factor: f64,

    #[serde(default = "alive")]
    pub is_alive: bool,

    #[serde(default = "one")]
    pub replicas: u32,

    #[serde(default)]
    pub queue_size: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_distribution: Option<Vec<TagWeight>>,

    #[serde(default)]
    pub payload_size_kb: f64,

    /// `0` means "use the default of the kind"
    #[serde(default)]
    pub response_size_kb: f64,
}

/// Builder for a [`Component`], obtained via [`Component::builder`].
///
/// ## Example
///
/// ```
/// use trafficsim_core::component::{Component, ComponentKind};
///
/// let db = Component::builder("orders-db", ComponentKind::Postgresql)
///     .set_max_rps(1_200.0)
///     .set_replicas(2)
///     .build();
///
/// assert_eq!(db.max_rps, 1_200.0);
/// assert_eq!(db.base_latency_ms, 5.0); // kind default
/// ```
#[derive(Debug, Clone)]
pub struct ComponentBuilder {
    component: Component,
}

fn alive() -> bool {
    true
}

fn one() -> u32 {
    1
}

impl Component {
    /// Start building a component with the [`KindDefaults`] of `kind`.
    pub fn builder(id: impl Into<ComponentId>, kind: ComponentKind) -> ComponentBuilder {
        let KindDefaults {
            max_rps,
            base_latency_ms,
            replicas,
        } = kind.defaults();

        ComponentBuilder {
            component: Self {
                id: id.into(),
                kind,
                max_rps,
                current_load: 0.0,
                generated_rps: 0.0,
                base_latency_ms,
                load_latency_factor: 0.0,
                is_alive: true,
                replicas,
                queue_size: 0,
                tag_distribution: None,
                payload_size_kb: 0.0,
                response_size_kb: 0.0,
            },
        }
    }

    /// `current_load / max_rps`, `0` when the component has no capacity
    /// configured.
    ///
    /// Traffic sources are never capacity constrained and always report
    /// `0`.
    pub fn utilization(&self) -> f64 {
        if self.kind.is_traffic_source() || self.max_rps <= 0.0 {
            0.0
        } else {
            self.current_load / self.max_rps
        }
    }

    /// Size of the response this component sends back when a request
    /// terminates here: its own configuration, otherwise the default
    /// of its kind, otherwise [`DEFAULT_RESPONSE_SIZE_KB`].
    pub fn response_size_kb(&self) -> f64 {
        if self.response_size_kb > 0.0 {
            self.response_size_kb
        } else {
            self.kind
                .default_response_size_kb()
                .unwrap_or(DEFAULT_RESPONSE_SIZE_KB)
        }
    }
}

impl ComponentBuilder {
    pub fn set_max_rps(mut self, max_rps: f64) -> Self {
        self.component.max_rps = max_rps;
        self
    }

    pub fn set_current_load(mut self, current_load: f64) -> Self {
        self.component.current_load = current_load;
        self
    }

    /// Requests per second this component injects in the topology.
    ///
    /// Only components the topology treats as entries generate traffic.
    pub fn set_generated_rps(mut self, generated_rps: f64) -> Self {
        self.component.generated_rps = generated_rps;
        self
    }

    pub fn set_base_latency_ms(mut self, base_latency_ms: f64) -> Self {
        self.component.base_latency_ms = base_latency_ms;
        self
    }

    pub fn set_replicas(mut self, replicas: u32) -> Self {
        self.component.replicas = replicas;
        self
    }

    pub fn set_alive(mut self, is_alive: bool) -> Self {
        self.component.is_alive = is_alive;
        self
    }

    pub fn set_queue_size(mut self, queue_size: u64) -> Self {
        self.component.queue_size = queue_size;
        self
    }

    pub fn set_tag_distribution(mut self, distribution: Vec<TagWeight>) -> Self {
        self.component.tag_distribution = Some(distribution);
        self
    }

    pub fn set_payload_size_kb(mut self, payload_size_kb: f64) -> Self {
        self.component.payload_size_kb = payload_size_kb;
        self
    }

    pub fn set_response_size_kb(mut self, response_size_kb: f64) -> Self {
        self.component.response_size_kb = response_size_kb;
        self
    }

    pub fn build(self) -> Component {
        self.component
    }
}
