//! Integration tests for latency simulators
//! Complements the inline unit tests in src/simulator.rs

use edgeplace_core::{
    JitterSimulator, LatencySimulator, Node, SimpleSimulator, SimulatorConfig, SimulatorKind,
    Task, TaskKind,
};

fn loads() -> Vec<f64> {
    (0..=60).map(|i| f64::from(i) * 0.25).collect()
}

#[test]
fn test_latency_monotone_in_load() {
    let mut sim = SimpleSimulator::default();
    let task = Task::new(0, TaskKind::IoT, 2.0);

    for capacity in [1.0, 5.0, 20.0] {
        let mut previous = f64::NEG_INFINITY;
        for load in loads() {
            let mut node = Node::edge(0, capacity, 5.0);
            node.current_load = load;
            let latency = sim.estimate_latency(&node, &task);
            assert!(latency.is_finite());
            assert!(
                latency >= previous,
                "latency dropped at load {load} (capacity {capacity})"
            );
            previous = latency;
        }
    }
}

#[test]
fn test_latency_strictly_increases_with_load() {
    let mut sim = SimpleSimulator::default();
    let task = Task::new(0, TaskKind::VANET, 1.0);
    let mut idle = Node::cloud(1, 100.0, 25.0);
    let mut busy = idle.clone();
    busy.current_load = 30.0;

    assert!(sim.estimate_latency(&busy, &task) > sim.estimate_latency(&idle, &task));

    idle.current_load = 150.0;
    assert!(sim.estimate_latency(&idle, &task) > sim.estimate_latency(&busy, &task));
}

#[test]
fn test_latency_monotone_in_size() {
    let mut sim = SimpleSimulator::default();
    let mut node = Node::edge(0, 10.0, 5.0);
    node.current_load = 4.0;

    let mut previous = f64::NEG_INFINITY;
    for step in 1..=40 {
        let task = Task::new(0, TaskKind::ARVR, f64::from(step) * 0.5);
        let latency = sim.estimate_latency(&node, &task);
        assert!(latency >= previous);
        previous = latency;
    }
}

#[test]
fn test_jitter_preserves_load_ordering_for_same_draw() {
    let task = Task::new(0, TaskKind::IoT, 1.0);
    let idle = Node::edge(0, 10.0, 5.0);
    let mut busy = idle.clone();
    busy.current_load = 6.0;

    // Two simulators with the same seed see the same draw on their first call
    let make = || JitterSimulator::new(SimpleSimulator::default(), 2.0, 10.0, 30.0, 99);
    let idle_latency = make().estimate_latency(&idle, &task);
    let busy_latency = make().estimate_latency(&busy, &task);
    assert!(busy_latency > idle_latency);
}

#[test]
fn test_edge_beats_idle_cloud_on_propagation() {
    let mut sim = SimpleSimulator::default();
    let task = Task::new(0, TaskKind::IoT, 1.0);
    let edge = Node::edge(0, 20.0, 5.0);
    let cloud = Node::cloud(1, 200.0, 25.0);
    assert!(sim.estimate_latency(&edge, &task) < sim.estimate_latency(&cloud, &task));
}

#[test]
fn test_config_factory_seeded() {
    let config = SimulatorConfig {
        kind: SimulatorKind::Jitter,
        ..SimulatorConfig::default()
    };
    let mut a = config.build(5).unwrap();
    let mut b = config.build(5).unwrap();
    let node = Node::cloud(1, 200.0, 25.0);
    let task = Task::new(0, TaskKind::VANET, 4.0);
    for _ in 0..20 {
        assert_eq!(a.estimate_latency(&node, &task), b.estimate_latency(&node, &task));
    }
}
