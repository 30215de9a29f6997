use crate::{component::ComponentId, tag::Tag};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// # [`Request`] Identifier
///
/// Unique for the lifetime of an [`Engine`]. A request that branches to
/// its next hop(s) is consumed and every continuation receives a new
/// identifier.
///
/// [`Engine`]: crate::engine::Engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

/// a generator for monotonically increasing **unique** [`RequestId`]
#[derive(Debug, Clone)]
pub struct RequestIdGenerator(u64);

/// Why a request did not make it to a leaf of the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// the request was routed to a component absent from the table
    #[error("Component not found")]
    NotFound,
    /// the component was taken down by failure injection
    #[error("Component is not alive")]
    NotAlive,
    /// the component is above its maximum throughput and shed the request
    #[error("Component is overloaded")]
    Overloaded,
    /// the component's utilization reached 100%
    #[error("Component is at capacity")]
    AtCapacity,
}

/// One unit of traffic in flight through the topology.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    id: RequestId,
    tag: Tag,
    current: ComponentId,
    /// every component this request went through, `current` included
    visited: Vec<ComponentId>,
    total_latency_ms: f64,
    failure: Option<FailureReason>,
    payload_size_kb: f64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self(1)
    }

    /// generate a new unique identifier
    pub fn generate(&mut self) -> RequestId {
        let id = self.0;
        self.0 = self.0.wrapping_add(1);

        debug_assert!(
            id != 0,
            "The generator wrapped around after `u64::MAX` requests. This shouldn't happen!"
        );

        RequestId(id)
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    /// A request freshly generated at the `entry` component.
    pub fn new(id: RequestId, tag: Tag, entry: ComponentId, payload_size_kb: f64) -> Self {
        Self {
            id,
            tag,
            visited: vec![entry.clone()],
            current: entry,
            total_latency_ms: 0.0,
            failure: None,
            payload_size_kb,
        }
    }

    /// The continuation of this request one hop further, to `target`.
    ///
    /// The new request inherits the visited path (extended with `target`)
    /// and the accumulated latency (plus `edge_latency_ms`).
    pub fn continue_to(
        &self,
        id: RequestId,
        target: ComponentId,
        tag: Tag,
        edge_latency_ms: f64,
    ) -> Self {
        let mut visited = Vec::with_capacity(self.visited.len() + 1);
        visited.extend_from_slice(&self.visited);
        visited.push(target.clone());

        Self {
            id,
            tag,
            current: target,
            visited,
            total_latency_ms: self.total_latency_ms + edge_latency_ms,
            failure: None,
            payload_size_kb: self.payload_size_kb,
        }
    }

    #[inline]
    pub fn id(&self) -> RequestId {
        self.id
    }

    #[inline]
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    #[inline]
    pub fn current(&self) -> &ComponentId {
        &self.current
    }

    #[inline]
    pub fn visited(&self) -> &[ComponentId] {
        &self.visited
    }

    #[inline]
    pub fn total_latency_ms(&self) -> f64 {
        self.total_latency_ms
    }

    #[inline]
    pub fn payload_size_kb(&self) -> f64 {
        self.payload_size_kb
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    #[inline]
    pub fn failure(&self) -> Option<FailureReason> {
        self.failure
    }

    pub(crate) fn add_latency(&mut self, latency_ms: f64) {
        self.total_latency_ms += latency_ms;
    }

    pub fn fail(&mut self, reason: FailureReason) {
        self.failure = Some(reason);
    }

    /// Override the accumulated latency, handy to build completed
    /// requests by hand.
    pub fn with_latency(mut self, total_latency_ms: f64) -> Self {
        self.total_latency_ms = total_latency_ms;
        self
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_is_monotonic() {
        let mut generator = RequestIdGenerator::new();
        let first = generator.generate();
        let second = generator.generate();
        assert!(first < second);
        assert_eq!(first.to_string(), "1");
    }

    #[test]
    fn new_request_visited_itself() {
        let mut generator = RequestIdGenerator::new();
        let request = Request::new(
            generator.generate(),
            Tag::default(),
            ComponentId::new("client"),
            10.0,
        );
        assert_eq!(request.visited(), [ComponentId::new("client")]);
        assert_eq!(request.current(), "client");
        assert!(!request.is_failed());
    }

    #[test]
    fn continuation_inherits_history() {
        let mut generator = RequestIdGenerator::new();
        let mut request = Request::new(
            generator.generate(),
            Tag::default(),
            ComponentId::new("client"),
            4.0,
        );
        request.add_latency(10.0);

        let next = request.continue_to(
            generator.generate(),
            ComponentId::new("svc"),
            Tag::new("read"),
            5.0,
        );

        assert_ne!(next.id(), request.id());
        assert_eq!(next.current(), "svc");
        assert_eq!(next.visited().len(), 2);
        assert_eq!(next.total_latency_ms(), 15.0);
        assert_eq!(next.tag(), &Tag::new("read"));
        assert_eq!(next.payload_size_kb(), 4.0);
    }

    #[test]
    fn failure_display() {
        assert_eq!(FailureReason::NotAlive.to_string(), "Component is not alive");
        assert_eq!(
            FailureReason::AtCapacity.to_string(),
            "Component is at capacity"
        );
    }
}
