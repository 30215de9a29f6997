use crate::{
    component::{Component, ComponentId, ComponentTable},
    connection::{Connection, EdgeKey},
    topology::Topology,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The two inputs of a simulation: a component table and a connection
/// list, checked to be consistent with each other.
///
/// Obtained from [`Topology::builder`] or deserialized from the wire
/// format (`{"components": [..], "connections": [..]}`), which goes
/// through the same validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBlueprint", into = "RawBlueprint")]
pub struct Blueprint {
    components: ComponentTable,
    connections: Vec<Connection>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Component with an empty identifier")]
    EmptyComponentId,
    #[error("Component `{0}' is defined more than once")]
    DuplicateComponent(ComponentId),
    #[error("Connection `{connection}' references unknown component `{endpoint}'")]
    UnknownEndpoint {
        connection: EdgeKey,
        endpoint: ComponentId,
    },
}

#[derive(Debug, Default)]
pub struct BlueprintBuilder {
    components: Vec<Component>,
    connections: Vec<Connection>,
}

#[derive(Serialize, Deserialize)]
struct RawBlueprint {
    #[serde(default)]
    components: Vec<Component>,
    #[serde(default)]
    connections: Vec<Connection>,
}

impl Topology {
    /// Start assembling a [`Blueprint`].
    ///
    /// ```
    /// use trafficsim_core::{
    ///     component::{Component, ComponentKind},
    ///     connection::Connection,
    ///     topology::Topology,
    /// };
    ///
    /// let blueprint = Topology::builder()
    ///     .add_component(Component::builder("pod", ComponentKind::KubernetesPod).build())
    ///     .add_component(Component::builder("client", ComponentKind::WebClient).build())
    ///     .add_component(Component::builder("api", ComponentKind::Service).build())
    ///     .add_connection(Connection::builder("client", "api").build())
    ///     .build()?;
    ///
    /// // grouping nodes never take part in the simulation
    /// assert_eq!(blueprint.components().len(), 2);
    /// # Ok::<(), trafficsim_core::topology::TopologyError>(())
    /// ```
    pub fn builder() -> BlueprintBuilder {
        BlueprintBuilder::default()
    }
}

impl Blueprint {
    #[inline]
    pub fn components(&self) -> &ComponentTable {
        &self.components
    }

    #[inline]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn into_parts(self) -> (ComponentTable, Vec<Connection>) {
        (self.components, self.connections)
    }
}

impl BlueprintBuilder {
    pub fn add_component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    pub fn add_components(mut self, components: impl IntoIterator<Item = Component>) -> Self {
        self.components.extend(components);
        self
    }

    pub fn add_connection(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    pub fn add_connections(mut self, connections: impl IntoIterator<Item = Connection>) -> Self {
        self.connections.extend(connections);
        self
    }

    /// Check and assemble the blueprint.
    ///
    /// Container kinds (racks, pods, VMs...) are left out of the
    /// component table and connections missing one of their endpoints
    /// are dropped.
    ///
    /// # Errors
    ///
    /// * [`TopologyError::EmptyComponentId`] and
    ///   [`TopologyError::DuplicateComponent`] for ill-identified
    ///   components;
    /// * [`TopologyError::UnknownEndpoint`] when a connection references
    ///   a component that is not in the table (including the containers
    ///   that were left out).
    pub fn build(self) -> Result<Blueprint, TopologyError> {
        let mut components = ComponentTable::new();

        for component in self.components {
            if component.id.is_empty() {
                return Err(TopologyError::EmptyComponentId);
            }
            if component.kind.is_container() {
                tracing::debug!(id = %component.id, kind = %component.kind, "skipping container");
                continue;
            }
            if components.contains_key(&component.id) {
                return Err(TopologyError::DuplicateComponent(component.id));
            }
            components.insert(component.id.clone(), component);
        }

        let mut connections = Vec::with_capacity(self.connections.len());
        for connection in self.connections {
            if connection.from.is_empty() || connection.to.is_empty() {
                tracing::debug!(edge = %connection.key(), "dropping connection with a missing endpoint");
                continue;
            }

            for endpoint in [&connection.from, &connection.to] {
                if !components.contains_key(endpoint) {
                    return Err(TopologyError::UnknownEndpoint {
                        connection: connection.key(),
                        endpoint: endpoint.clone(),
                    });
                }
            }

            connections.push(connection);
        }

        Ok(Blueprint {
            components,
            connections,
        })
    }
}

impl TryFrom<RawBlueprint> for Blueprint {
    type Error = TopologyError;

    fn try_from(raw: RawBlueprint) -> Result<Self, Self::Error> {
        Topology::builder()
            .add_components(raw.components)
            .add_connections(raw.connections)
            .build()
    }
}

impl From<Blueprint> for RawBlueprint {
    fn from(blueprint: Blueprint) -> Self {
        Self {
            components: blueprint.components.into_values().collect(),
            connections: blueprint.connections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentKind;

    fn service(id: &str) -> Component {
        Component::builder(id, ComponentKind::Service).build()
    }

    #[test]
    fn duplicate_component() {
        let error = Topology::builder()
            .add_component(service("a"))
            .add_component(service("a"))
            .build()
            .unwrap_err();
        assert_eq!(error, TopologyError::DuplicateComponent(ComponentId::new("a")));
    }

    #[test]
    fn empty_component_id() {
        let error = Topology::builder()
            .add_component(service(""))
            .build()
            .unwrap_err();
        assert_eq!(error, TopologyError::EmptyComponentId);
    }

    #[test]
    fn drops_connections_with_missing_endpoint() {
        let blueprint = Topology::builder()
            .add_component(service("a"))
            .add_connection(Connection::builder("a", "").build())
            .add_connection(Connection::builder("", "a").build())
            .build()
            .unwrap();
        assert!(blueprint.connections().is_empty());
    }

    #[test]
    fn rejects_unknown_endpoint() {
        let error = Topology::builder()
            .add_component(service("a"))
            .add_connection(Connection::builder("a", "b").build())
            .build()
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Connection `a->b' references unknown component `b'"
        );
    }

    #[test]
    fn rejects_connection_to_container() {
        let error = Topology::builder()
            .add_component(service("a"))
            .add_component(Component::builder("rack", ComponentKind::Rack).build())
            .add_connection(Connection::builder("a", "rack").build())
            .build()
            .unwrap_err();
        assert!(matches!(error, TopologyError::UnknownEndpoint { .. }));
    }

    #[test]
    fn deserialize_validates() {
        let json = r#"{
            "components": [
                {"id": "client", "type": "web_client", "maxRps": 0, "baseLatencyMs": 0, "generatedRps": 50},
                {"id": "api", "type": "service", "maxRps": 2000, "baseLatencyMs": 10},
                {"id": "dc", "type": "datacenter", "maxRps": 0, "baseLatencyMs": 0}
            ],
            "connections": [{"from": "client", "to": "api", "latencyMs": 2}]
        }"#;
        let blueprint: Blueprint = serde_json::from_str(json).unwrap();
        assert_eq!(blueprint.components().len(), 2);
        assert_eq!(blueprint.connections().len(), 1);

        let json = r#"{"connections": [{"from": "client", "to": "api", "latencyMs": 2}]}"#;
        assert!(serde_json::from_str::<Blueprint>(json).is_err());
    }
}
