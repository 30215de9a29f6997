use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Every kind of component the topology can be made of.
///
/// The kind decides the few behaviours that are not driven by the
/// numeric fields of a [`Component`]:
///
/// * [`is_traffic_source`]: clients generate the traffic and are never
///   capacity constrained;
/// * [`is_load_balancer`]: load balancers always forward 1:1 to one
///   uniformly chosen downstream, ignoring routing rules;
/// * [`is_container`]: grouping nodes that never take part in a
///   simulation.
///
/// [`Component`]: crate::component::Component
/// [`is_traffic_source`]: ComponentKind::is_traffic_source
/// [`is_load_balancer`]: ComponentKind::is_load_balancer
/// [`is_container`]: ComponentKind::is_container
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    // clients
    WebClient,
    MobileClient,
    ExternalApi,
    // network
    ApiGateway,
    LoadBalancer,
    Cdn,
    Dns,
    Waf,
    // compute
    Service,
    ServerlessFunction,
    Worker,
    CronJob,
    // data
    Postgresql,
    Mongodb,
    Cassandra,
    Redis,
    Memcached,
    S3,
    Nfs,
    Etcd,
    Elasticsearch,
    // messaging
    Kafka,
    Rabbitmq,
    EventBus,
    // reliability
    CircuitBreaker,
    RateLimiter,
    RetryPolicy,
    HealthCheck,
    FailoverController,
    // security
    AuthService,
    TlsTerminator,
    SecretManager,
    // observability
    Logging,
    MetricsCollector,
    Tracing,
    Alerting,
    // storage
    LocalSsd,
    Nvme,
    NetworkDisk,
    // infrastructure
    Region,
    AvailabilityZone,
    Vpc,
    DockerContainer,
    KubernetesPod,
    VmInstance,
    Rack,
    Datacenter,
}

/// Capacity and latency a freshly placed component of a given kind
/// starts with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindDefaults {
    pub max_rps: f64,
    pub base_latency_ms: f64,
    pub replicas: u32,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown component kind `{0}'")]
pub struct UnknownComponentKind(String);

impl ComponentKind {
    pub const ALL: [Self; 47] = [
        Self::WebClient,
        Self::MobileClient,
        Self::ExternalApi,
        Self::ApiGateway,
        Self::LoadBalancer,
        Self::Cdn,
        Self::Dns,
        Self::Waf,
        Self::Service,
        Self::ServerlessFunction,
        Self::Worker,
        Self::CronJob,
        Self::Postgresql,
        Self::Mongodb,
        Self::Cassandra,
        Self::Redis,
        Self::Memcached,
        Self::S3,
        Self::Nfs,
        Self::Etcd,
        Self::Elasticsearch,
        Self::Kafka,
        Self::Rabbitmq,
        Self::EventBus,
        Self::CircuitBreaker,
        Self::RateLimiter,
        Self::RetryPolicy,
        Self::HealthCheck,
        Self::FailoverController,
        Self::AuthService,
        Self::TlsTerminator,
        Self::SecretManager,
        Self::Logging,
        Self::MetricsCollector,
        Self::Tracing,
        Self::Alerting,
        Self::LocalSsd,
        Self::Nvme,
        Self::NetworkDisk,
        Self::Region,
        Self::AvailabilityZone,
        Self::Vpc,
        Self::DockerContainer,
        Self::KubernetesPod,
        Self::VmInstance,
        Self::Rack,
        Self::Datacenter,
    ];

    /// Clients: they generate traffic, report `0` utilization and are
    /// never failed for being overloaded.
    #[inline]
    pub const fn is_traffic_source(self) -> bool {
        matches!(self, Self::WebClient | Self::MobileClient | Self::ExternalApi)
    }

    #[inline]
    pub const fn is_load_balancer(self) -> bool {
        matches!(self, Self::LoadBalancer)
    }

    /// Grouping nodes of the authoring tool (a rack holding pods, ...).
    ///
    /// They are not part of the simulated traffic graph.
    #[inline]
    pub const fn is_container(self) -> bool {
        matches!(
            self,
            Self::DockerContainer
                | Self::KubernetesPod
                | Self::VmInstance
                | Self::Rack
                | Self::Datacenter
        )
    }

    /// The starting capacity of a component of this kind.
    ///
    /// ```
    /// # use trafficsim_core::component::ComponentKind;
    /// let defaults = ComponentKind::Service.defaults();
    /// assert_eq!(defaults.max_rps, 2_000.0);
    /// assert_eq!(defaults.base_latency_ms, 10.0);
    /// assert_eq!(defaults.replicas, 3);
    /// ```
    pub const fn defaults(self) -> KindDefaults {
        let (max_rps, base_latency_ms, replicas) = match self {
            Self::WebClient => (10_000.0, 0.0, 1),
            Self::MobileClient => (5_000.0, 0.0, 1),
            Self::ExternalApi => (50_000.0, 0.0, 1),
            Self::ApiGateway => (25_000.0, 5.0, 2),
            Self::LoadBalancer => (50_000.0, 1.0, 2),
            Self::Cdn => (500_000.0, 10.0, 1),
            Self::Dns => (200_000.0, 50.0, 1),
            Self::Waf => (20_000.0, 2.0, 2),
            Self::Service => (2_000.0, 10.0, 3),
            Self::ServerlessFunction => (3_000.0, 50.0, 1),
            Self::Worker => (200.0, 100.0, 2),
            Self::CronJob => (1.0, 1_000.0, 1),
            Self::Postgresql => (5_000.0, 5.0, 1),
            Self::Mongodb => (10_000.0, 3.0, 3),
            Self::Cassandra => (20_000.0, 2.0, 3),
            Self::Redis => (100_000.0, 1.0, 1),
            Self::Memcached => (50_000.0, 1.0, 3),
            Self::S3 => (5_500.0, 20.0, 1),
            Self::Nfs => (3_000.0, 5.0, 1),
            Self::Etcd => (10_000.0, 2.0, 3),
            Self::Elasticsearch => (5_000.0, 10.0, 3),
            Self::Kafka => (100_000.0, 5.0, 3),
            Self::Rabbitmq => (20_000.0, 2.0, 3),
            Self::EventBus => (50_000.0, 3.0, 1),
            Self::CircuitBreaker | Self::RateLimiter | Self::HealthCheck => (200_000.0, 0.0, 1),
            Self::RetryPolicy | Self::FailoverController => (200_000.0, 0.0, 1),
            Self::AuthService => (5_000.0, 15.0, 2),
            Self::TlsTerminator => (20_000.0, 1.0, 2),
            Self::SecretManager => (5_000.0, 5.0, 2),
            Self::Logging => (20_000.0, 10.0, 3),
            Self::MetricsCollector => (50_000.0, 0.0, 2),
            Self::Tracing => (30_000.0, 0.0, 2),
            Self::Alerting => (10_000.0, 0.0, 2),
            Self::LocalSsd => (80_000.0, 0.1, 1),
            Self::Nvme => (200_000.0, 0.05, 1),
            Self::NetworkDisk => (16_000.0, 1.0, 1),
            Self::Region
            | Self::AvailabilityZone
            | Self::Vpc
            | Self::DockerContainer
            | Self::KubernetesPod
            | Self::VmInstance
            | Self::Rack
            | Self::Datacenter => (0.0, 0.0, 1),
        };

        KindDefaults {
            max_rps,
            base_latency_ms,
            replicas,
        }
    }

    /// Size (in KB) of the response a component of this kind sends back
    /// when a request terminates on it.
    ///
    /// `None` when the kind has no sensible default, in which case
    /// [`DEFAULT_RESPONSE_SIZE_KB`] applies.
    ///
    /// [`DEFAULT_RESPONSE_SIZE_KB`]: crate::defaults::DEFAULT_RESPONSE_SIZE_KB
    pub const fn default_response_size_kb(self) -> Option<f64> {
        let size = match self {
            Self::ApiGateway | Self::Service | Self::ServerlessFunction => 2.0,
            Self::Cdn => 64.0,
            Self::Dns | Self::Etcd | Self::Worker | Self::CronJob => 0.5,
            Self::Postgresql | Self::Mongodb => 4.0,
            Self::Cassandra => 2.0,
            Self::Redis | Self::Memcached | Self::AuthService => 1.0,
            Self::S3 => 256.0,
            Self::Nfs => 64.0,
            Self::Elasticsearch => 16.0,
            Self::Kafka | Self::Rabbitmq | Self::EventBus => 0.1,
            Self::Logging | Self::MetricsCollector | Self::Tracing => 0.1,
            Self::LocalSsd | Self::Nvme | Self::NetworkDisk => 4.0,
            _ => return None,
        };
        Some(size)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WebClient => "web_client",
            Self::MobileClient => "mobile_client",
            Self::ExternalApi => "external_api",
            Self::ApiGateway => "api_gateway",
            Self::LoadBalancer => "load_balancer",
            Self::Cdn => "cdn",
            Self::Dns => "dns",
            Self::Waf => "waf",
            Self::Service => "service",
            Self::ServerlessFunction => "serverless_function",
            Self::Worker => "worker",
            Self::CronJob => "cron_job",
            Self::Postgresql => "postgresql",
            Self::Mongodb => "mongodb",
            Self::Cassandra => "cassandra",
            Self::Redis => "redis",
            Self::Memcached => "memcached",
            Self::S3 => "s3",
            Self::Nfs => "nfs",
            Self::Etcd => "etcd",
            Self::Elasticsearch => "elasticsearch",
            Self::Kafka => "kafka",
            Self::Rabbitmq => "rabbitmq",
            Self::EventBus => "event_bus",
            Self::CircuitBreaker => "circuit_breaker",
            Self::RateLimiter => "rate_limiter",
            Self::RetryPolicy => "retry_policy",
            Self::HealthCheck => "health_check",
            Self::FailoverController => "failover_controller",
            Self::AuthService => "auth_service",
            Self::TlsTerminator => "tls_terminator",
            Self::SecretManager => "secret_manager",
            Self::Logging => "logging",
            Self::MetricsCollector => "metrics_collector",
            Self::Tracing => "tracing",
            Self::Alerting => "alerting",
            Self::LocalSsd => "local_ssd",
            Self::Nvme => "nvme",
            Self::NetworkDisk => "network_disk",
            Self::Region => "region",
            Self::AvailabilityZone => "availability_zone",
            Self::Vpc => "vpc",
            Self::DockerContainer => "docker_container",
            Self::KubernetesPod => "kubernetes_pod",
            Self::VmInstance => "vm_instance",
            Self::Rack => "rack",
            Self::Datacenter => "datacenter",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = UnknownComponentKind;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownComponentKind(s.to_owned()))
    }
}
