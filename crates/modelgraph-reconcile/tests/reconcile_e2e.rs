//! End-to-end reconciliation scenarios against an in-memory device graph.

use modelgraph_model::{Entity, EntityHandle, Relationship};
use modelgraph_reconcile::{
    Directive, EventSink, FactBundle, ReconcileEngine, ReconcileError, ReconcileEvent,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Sink recording the kind of every event it sees.
#[derive(Default, Clone)]
struct RecordingSink {
    seen: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    fn kinds(&self) -> Vec<String> {
        self.seen.lock().expect("sink lock").clone()
    }
}

impl EventSink for RecordingSink {
    fn notify(&self, event: ReconcileEvent<'_>) {
        let kind = match event {
            ReconcileEvent::EntityUpdated { .. } => "updated",
            ReconcileEvent::EntityRelocated { .. } => "relocated",
            ReconcileEvent::Applied { .. } => "applied",
        };
        self.seen.lock().expect("sink lock").push(kind.to_string());
    }
}

fn device() -> EntityHandle {
    let root = Entity::new("router1", "dev.Device", "Device").into_handle();
    root.write().add_relationship(Relationship::containment("routes"));
    root
}

fn route_bundle(id: &str, mask: i64) -> FactBundle {
    FactBundle::for_target(id)
        .relname("routes")
        .modname("pkg.IpRouteEntry")
        .classname("IpRouteEntry")
        .with("routemask", mask)
}

#[test]
fn scenario_a_new_route_is_added() {
    let engine = ReconcileEngine::new();
    let root = device();

    let report = engine
        .reconcile(&root, route_bundle("10.0.0.0_24", 24))
        .expect("add applies");

    assert_eq!(report.directive, Directive::Add);
    assert!(report.changed);

    let guard = root.read();
    let routes = guard.relationship("routes").expect("edge exists");
    let route = routes.get("10.0.0.0_24").expect("route added");
    assert_eq!(route.read().attribute("routemask"), Some(&json!(24)));
}

#[test]
fn scenario_b_drifted_route_is_updated() {
    let engine = ReconcileEngine::new();
    let root = device();
    engine
        .reconcile(&root, route_bundle("10.0.0.0_24", 24))
        .expect("seed route");

    let report = engine
        .reconcile(&root, route_bundle("10.0.0.0_24", 16))
        .expect("update applies");

    assert_eq!(report.directive, Directive::Update);
    assert!(report.changed);

    let guard = root.read();
    let routes = guard.relationship("routes").expect("edge exists");
    let route = routes.get("10.0.0.0_24").expect("route present");
    assert_eq!(route.read().attribute("routemask"), Some(&json!(16)));
}

#[test]
fn scenario_c_class_change_rebuilds_the_entity() {
    let engine = ReconcileEngine::new();
    let root = device();
    engine
        .reconcile(&root, route_bundle("10.0.0.0_24", 24))
        .expect("seed route");

    let rebuilt = FactBundle::for_target("10.0.0.0_24")
        .relname("routes")
        .modname("pkg.ApiRouteEntry")
        .classname("ApiRouteEntry")
        .with("routemask", 24);
    let report = engine.reconcile(&root, rebuilt).expect("rebuild applies");

    assert_eq!(report.directive, Directive::Rebuild);
    assert!(report.changed);

    let guard = root.read();
    let routes = guard.relationship("routes").expect("edge exists");
    let route = routes.get("10.0.0.0_24").expect("route recreated");
    let entity = route.read();
    assert!(entity.class_is("pkg.ApiRouteEntry", "ApiRouteEntry"));
    assert_eq!(entity.attribute("routemask"), Some(&json!(24)));
}

#[test]
fn repeated_bundle_settles_to_nochange() {
    let engine = ReconcileEngine::new();
    let root = device();

    engine
        .reconcile(&root, route_bundle("10.0.0.0_24", 24))
        .expect("first pass adds");
    let report = engine
        .reconcile(&root, route_bundle("10.0.0.0_24", 24))
        .expect("second pass is a noop");

    assert_eq!(report.directive, Directive::NoChange);
    assert!(!report.changed);
}

#[test]
fn batch_continues_past_a_failing_bundle() {
    let engine = ReconcileEngine::new();
    let root = device();

    let bundles = vec![
        route_bundle("10.0.0.0_24", 24),
        // No modname: this add must fail without poisoning the batch.
        FactBundle::for_target("192.168.1.0_24")
            .relname("routes")
            .with("routemask", 24),
        route_bundle("172.16.0.0_12", 12),
    ];
    let report = engine.reconcile_batch(&root, bundles);

    assert_eq!(report.applied.len(), 2);
    assert_eq!(report.changed_count(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].target_id, "192.168.1.0_24");

    let guard = root.read();
    let routes = guard.relationship("routes").expect("edge exists");
    assert!(routes.contains_id("10.0.0.0_24"));
    assert!(routes.contains_id("172.16.0.0_12"));
    assert!(!routes.contains_id("192.168.1.0_24"));
}

#[test]
fn applied_event_fires_for_every_outcome() {
    let sink = RecordingSink::default();
    let engine = ReconcileEngine::new().with_events(Box::new(sink.clone()));

    let root = device();
    engine
        .reconcile(&root, route_bundle("10.0.0.0_24", 24))
        .expect("add applies");
    engine
        .reconcile(&root, route_bundle("10.0.0.0_24", 24))
        .expect("nochange applies");

    // add emits updated + applied; nochange emits applied only.
    assert_eq!(sink.kinds(), vec!["updated", "applied", "applied"]);
}

#[test]
fn reference_edge_insert_emits_relocation() {
    let sink = RecordingSink::default();
    let engine = ReconcileEngine::new().with_events(Box::new(sink.clone()));

    let root = Entity::new("router1", "dev.Device", "Device").into_handle();
    root.write()
        .add_relationship(Relationship::reference("monitors"));

    let bundle = FactBundle::for_target("m1")
        .relname("monitors")
        .modname("mon.Monitor")
        .classname("Monitor")
        .with("interval", 60);
    engine.reconcile(&root, bundle).expect("add applies");

    assert_eq!(sink.kinds(), vec!["relocated", "updated", "applied"]);
}

#[test]
fn explicit_directive_override_is_validated() {
    let engine = ReconcileEngine::new();
    let root = device();

    // Forcing `add` without a modname fails before any mutation.
    let err = engine
        .reconcile_with_directive(
            &root,
            FactBundle::for_target("10.0.0.0_24").relname("routes"),
            Directive::Add,
        )
        .expect_err("add override needs modname");
    assert!(matches!(err, ReconcileError::InvalidInput(_)));

    let guard = root.read();
    assert!(guard.relationship("routes").expect("edge exists").is_empty());
}

#[test]
fn parent_path_falls_back_to_root_when_missing() {
    let engine = ReconcileEngine::new();
    let root = device();

    // "os" does not exist on this device; the route lands on the root's
    // own routes edge instead of erroring.
    let bundle = route_bundle("10.0.0.0_24", 24).parent("os");
    let report = engine.reconcile(&root, bundle).expect("add applies");
    assert!(report.changed);

    let guard = root.read();
    let routes = guard.relationship("routes").expect("edge exists");
    assert!(routes.contains_id("10.0.0.0_24"));
}
