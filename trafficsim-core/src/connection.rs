use crate::{component::ComponentId, tag::Tag};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Application protocol spoken over a [`Connection`].
///
/// Informational only: it does not change how traffic is simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Protocol {
    #[default]
    #[serde(rename = "REST")]
    Rest,
    #[serde(rename = "gRPC")]
    Grpc,
    WebSocket,
    GraphQL,
    #[serde(rename = "async")]
    Async,
    #[serde(rename = "TCP")]
    Tcp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
}

/// Per-tag fan-out on a [`Connection`].
///
/// A request tagged `tag` arriving on the source of the connection
/// spawns `weight` copies (in expectation) along this connection. The
/// integer part of the weight is always spawned, the fractional part is
/// the probability of spawning one more. Spawned copies are re-tagged
/// `out_tag` when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRule {
    pub tag: Tag,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_tag: Option<Tag>,
}

/// A directed edge of the topology: traffic flows from `from` to `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub from: ComponentId,
    pub to: ComponentId,
    #[serde(default)]
    pub protocol: Protocol,
    /// added to every request crossing this connection
    pub latency_ms: f64,
    /// advisory, not used by the latency model
    #[serde(default = "default_bandwidth_mbps")]
    pub bandwidth_mbps: f64,
    /// advisory, not used by the tick loop
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_rules: Option<Vec<RoutingRule>>,
}

/// Key of a directed edge, printed and parsed as `"from->to"`.
///
/// Parallel connections between the same two components share the same
/// key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeKey {
    pub from: ComponentId,
    pub to: ComponentId,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid edge key `{0}', expecting `from->to'")]
pub struct EdgeKeyParseError(String);

/// Builder for a [`Connection`], obtained via [`Connection::builder`].
#[derive(Debug, Clone)]
pub struct ConnectionBuilder {
    connection: Connection,
}

fn default_bandwidth_mbps() -> f64 {
    1_000.0
}

fn default_timeout_ms() -> f64 {
    5_000.0
}

impl Connection {
    /// Start building a `REST` connection with `1ms` of latency, `1000Mbps`
    /// of bandwidth and a `5s` timeout.
    ///
    /// ```
    /// use trafficsim_core::connection::Connection;
    ///
    /// let conn = Connection::builder("gw", "orders")
    ///     .set_latency_ms(3.0)
    ///     .add_routing_rule("checkout", 1.0, None)
    ///     .build();
    ///
    /// assert_eq!(conn.key().to_string(), "gw->orders");
    /// assert!(conn.rule_for("checkout").is_some());
    /// ```
    pub fn builder(from: impl Into<ComponentId>, to: impl Into<ComponentId>) -> ConnectionBuilder {
        ConnectionBuilder {
            connection: Self {
                from: from.into(),
                to: to.into(),
                protocol: Protocol::default(),
                latency_ms: 1.0,
                bandwidth_mbps: default_bandwidth_mbps(),
                timeout_ms: default_timeout_ms(),
                retry_policy: None,
                routing_rules: None,
            },
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.from.clone(), self.to.clone())
    }

    /// The first routing rule of this connection matching `tag`.
    pub fn rule_for(&self, tag: &str) -> Option<&RoutingRule> {
        self.routing_rules
            .as_deref()?
            .iter()
            .find(|rule| rule.tag.as_str() == tag)
    }
}

impl ConnectionBuilder {
    pub fn set_protocol(mut self, protocol: Protocol) -> Self {
        self.connection.protocol = protocol;
        self
    }

    pub fn set_latency_ms(mut self, latency_ms: f64) -> Self {
        self.connection.latency_ms = latency_ms;
        self
    }

    pub fn set_bandwidth_mbps(mut self, bandwidth_mbps: f64) -> Self {
        self.connection.bandwidth_mbps = bandwidth_mbps;
        self
    }

    pub fn set_timeout_ms(mut self, timeout_ms: f64) -> Self {
        self.connection.timeout_ms = timeout_ms;
        self
    }

    pub fn set_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.connection.retry_policy = Some(retry_policy);
        self
    }

    pub fn add_routing_rule(mut self, tag: &str, weight: f64, out_tag: Option<&str>) -> Self {
        self.connection
            .routing_rules
            .get_or_insert_with(Vec::new)
            .push(RoutingRule {
                tag: Tag::new(tag),
                weight,
                out_tag: out_tag.map(Tag::new),
            });
        self
    }

    pub fn build(self) -> Connection {
        self.connection
    }
}

impl EdgeKey {
    pub fn new(from: ComponentId, to: ComponentId) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

impl FromStr for EdgeKey {
    type Err = EdgeKeyParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((from, to)) = s.split_once("->") else {
            return Err(EdgeKeyParseError(s.to_owned()));
        };
        if from.is_empty() || to.is_empty() {
            return Err(EdgeKeyParseError(s.to_owned()));
        }
        Ok(Self::new(ComponentId::new(from), ComponentId::new(to)))
    }
}

impl Serialize for EdgeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EdgeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
