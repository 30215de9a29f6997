use rand_chacha::ChaChaRng;
use rand_core::SeedableRng as _;
use std::time::Duration;
use trafficsim_core::{
    Blueprint, Component, ComponentId, ComponentKind, ComponentTable, Connection, Engine,
    LoadProfile, Tag,
    failure::propagate_failure,
    generator::poisson_sample,
    latency::calculate_latency,
    routing::resolve_next_hops,
    topology::Topology,
};

fn table(components: impl IntoIterator<Item = Component>) -> ComponentTable {
    components
        .into_iter()
        .map(|component| (component.id.clone(), component))
        .collect()
}

fn two_nodes() -> Engine {
    let components = table([
        Component::builder("client", ComponentKind::WebClient)
            .set_generated_rps(100.0)
            .build(),
        Component::builder("api", ComponentKind::Service)
            .set_max_rps(10_000.0)
            .build(),
    ]);
    let connections = vec![Connection::builder("client", "api").build()];

    Engine::builder()
        .set_tick_duration(Duration::from_millis(100))
        .build(components, connections)
}

#[test]
fn two_nodes_end_to_end() {
    let mut engine = two_nodes();
    engine.start(LoadProfile::constant());

    for _ in 0..5 {
        let metrics = engine.tick();
        assert!(metrics.latency_p50 >= 0.0);
        assert!(metrics.timestamp > 0.0);
    }

    engine.stop();
    let metrics = engine.tick();
    assert_eq!(metrics.throughput, 0.0);
    assert_eq!(metrics.error_rate, 0.0);
}

#[test]
fn inject_failure_marks_dead() {
    let mut engine = two_nodes();
    engine.start(LoadProfile::constant());
    engine.tick();

    let report = engine.inject_failure("api").unwrap();
    assert_eq!(report.failed_node, "api");
    assert!(!engine.component("api").unwrap().is_alive);
}

#[test]
fn latency_model() {
    for base in [1.0, 10.0, 250.0] {
        let idle = Component::builder("svc", ComponentKind::Service)
            .set_base_latency_ms(base)
            .set_max_rps(100.0)
            .build();
        assert_eq!(calculate_latency(&idle), base);

        let half = Component::builder("svc", ComponentKind::Service)
            .set_base_latency_ms(base)
            .set_max_rps(100.0)
            .set_current_load(50.0)
            .build();
        assert_eq!(calculate_latency(&half), 2.0 * base);

        let full = Component::builder("svc", ComponentKind::Service)
            .set_base_latency_ms(base)
            .set_max_rps(100.0)
            .set_current_load(100.0)
            .build();
        assert_eq!(calculate_latency(&full), f64::INFINITY);
    }
}

#[test]
fn poisson_properties() {
    let mut rng = ChaChaRng::seed_from_u64(3);
    assert_eq!(poisson_sample(0.0, &mut rng), 0);
    assert_eq!(poisson_sample(-10.0, &mut rng), 0);

    let samples = 10_000;
    let total: u64 = (0..samples).map(|_| poisson_sample(10.0, &mut rng)).sum();
    let mean = total as f64 / samples as f64;
    assert!((8.0..=12.0).contains(&mean), "mean {mean}");
}

#[test]
fn cascading_failure() {
    let mut components = table([
        Component::builder("api", ComponentKind::Service)
            .set_max_rps(1_000.0)
            .set_current_load(800.0)
            .set_replicas(2)
            .build(),
        Component::builder("cache", ComponentKind::Redis)
            .set_max_rps(10_000.0)
            .set_current_load(100.0)
            .set_replicas(2)
            .build(),
        Component::builder("db", ComponentKind::Postgresql).build(),
    ]);
    let connections = [
        Connection::builder("api", "db").build(),
        Connection::builder("cache", "db").build(),
    ];

    let report = propagate_failure(&mut components, &connections, &ComponentId::new("db"));
    assert_eq!(report.affected, [ComponentId::new("api")]);
    assert_eq!(report.cascade_depth, 1);
}

#[test]
fn routing_properties() {
    let components = table([
        Component::builder("lb", ComponentKind::LoadBalancer).build(),
        Component::builder("a", ComponentKind::Service).build(),
        Component::builder("b", ComponentKind::Service).build(),
    ]);
    let topology = Topology::new(
        &components,
        vec![
            Connection::builder("lb", "a").build(),
            Connection::builder("lb", "b").build(),
            Connection::builder("a", "b")
                .add_routing_rule("write", 3.0, None)
                .build(),
        ],
    );
    let mut rng = ChaChaRng::seed_from_u64(11);
    let lb = ComponentId::new("lb");
    let a = ComponentId::new("a");

    let hops = resolve_next_hops(&lb, &Tag::default(), &[lb.clone()], &topology, &mut rng);
    assert_eq!(hops.len(), 1);
    assert_eq!(hops[0].count, 1);

    let hops = resolve_next_hops(&a, &Tag::new("read"), &[a.clone()], &topology, &mut rng);
    assert_eq!(hops.len(), 1);
    assert_eq!(hops[0].count, 1);

    let hops = resolve_next_hops(&a, &Tag::new("write"), &[a.clone()], &topology, &mut rng);
    assert_eq!(hops.len(), 1);
    assert_eq!(hops[0].count, 3);

    let visited = [lb.clone(), a.clone(), ComponentId::new("b")];
    assert!(resolve_next_hops(&lb, &Tag::default(), &visited, &topology, &mut rng).is_empty());
}

#[test]
fn json_blueprint_run() {
    let json = r#"{
        "components": [
            {"id": "web", "type": "web_client", "maxRps": 0, "baseLatencyMs": 0,
             "generatedRps": 400, "payloadSizeKb": 2,
             "tagDistribution": [{"tag": "browse", "weight": 3}, {"tag": "buy", "weight": 1}]},
            {"id": "gw", "type": "api_gateway", "maxRps": 20000, "baseLatencyMs": 2},
            {"id": "catalog", "type": "service", "maxRps": 5000, "baseLatencyMs": 8},
            {"id": "orders", "type": "service", "maxRps": 2000, "baseLatencyMs": 12},
            {"id": "db", "type": "postgresql", "maxRps": 5000, "baseLatencyMs": 5,
             "responseSizeKb": 16},
            {"id": "k8s", "type": "kubernetes_pod", "maxRps": 0, "baseLatencyMs": 0}
        ],
        "connections": [
            {"from": "web", "to": "gw", "latencyMs": 20},
            {"from": "gw", "to": "catalog", "latencyMs": 1,
             "routingRules": [{"tag": "browse", "weight": 1}]},
            {"from": "gw", "to": "orders", "latencyMs": 1,
             "routingRules": [{"tag": "buy", "weight": 1}]},
            {"from": "catalog", "to": "db", "latencyMs": 1},
            {"from": "orders", "to": "db", "latencyMs": 1,
             "routingRules": [{"tag": "buy", "weight": 2, "outTag": "write"}]}
        ]
    }"#;

    let blueprint: Blueprint = serde_json::from_str(json).unwrap();
    assert!(!blueprint.components().contains_key("k8s"));

    let mut engine = Engine::builder().set_seed(2024).build_from(blueprint);
    engine.start(LoadProfile::constant());

    let mut last = None;
    for _ in 0..20 {
        last = Some(engine.tick());
    }
    let metrics = last.unwrap();

    assert_eq!(metrics.error_rate, 0.0);
    assert!(metrics.throughput > 0.0);
    // web -> gw -> catalog -> db
    assert!(metrics.latency_p50 > 20.0);
    assert_eq!(metrics.component_utilization["web"], 0.0);

    let db = &metrics.node_tag_traffic["db"];
    assert!(db.incoming.contains_key("browse"));
    assert!(db.incoming.contains_key("write"));
    assert!(db.response_outgoing.contains_key("browse"));

    let json = serde_json::to_value(&metrics).unwrap();
    assert!(json["edgeThroughput"]["gw->catalog"].as_f64().unwrap() > 0.0);
    assert!(json["nodeTagTraffic"]["web"]["responseIncoming"]["browse"]["bytesPerSec"]
        .as_f64()
        .is_some());
}

#[test]
fn spike_triples_traffic() {
    let components = table([
        Component::builder("client", ComponentKind::MobileClient)
            .set_generated_rps(1_000.0)
            .build(),
        Component::builder("api", ComponentKind::Service)
            .set_max_rps(1_000_000.0)
            .build(),
    ]);
    let mut engine = Engine::builder().set_seed(5).build(
        components,
        vec![Connection::builder("client", "api").build()],
    );
    engine.start(LoadProfile::spike());

    // ticks 1..=69 are the nominal phase, 70..=99 the spike
    let nominal: u64 = (1..=60).map(|_| engine.tick().engine_stats.generated).sum();
    for _ in 61..=70 {
        engine.tick();
    }
    let spike: u64 = (71..=90).map(|_| engine.tick().engine_stats.generated).sum();

    let nominal = nominal as f64 / 60.0;
    let spike = spike as f64 / 20.0;
    let ratio = spike / nominal;
    assert!((2.5..=3.5).contains(&ratio), "ratio {ratio}");
}
