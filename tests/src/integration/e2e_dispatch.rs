//! # End-to-End Dispatch
//!
//! ```text
//! trigger ──► Dispatcher ──► RouteTable ──► InputSender_P:n ──► injector
//!                 ▲                               │
//!                 └────────────── Ack ────────────┘
//! ```

#[cfg(test)]
mod tests {
    use super::super::fixtures::{runtime, wait_for};
    use keycast_runtime::ports::TargetResolver;
    use std::time::{Duration, Instant};

    const SINGLE: &str = r#"{
        "processes": [ { "id": "P", "path": "/opt/p", "instances": 1 } ],
        "key_bindings": [ { "trigger_key": "A", "sequences": [
            { "process": "P", "instance": 0, "actions": [ { "key": "X", "delay": 0 } ] } ] } ]
    }"#;

    #[test]
    fn test_trigger_reaches_single_route() {
        let (runtime, injector) = runtime(SINGLE);
        assert!(runtime.attach_configured_routes().is_empty());
        let registry = runtime.registry();

        registry.trigger("A").unwrap();

        assert!(wait_for(|| registry.route_metrics("P", 0).unwrap().processed == 1));
        assert!(wait_for(|| registry.dispatcher_metrics().acks == 1));

        let target = runtime.resolver().resolve("P", 0).unwrap();
        let keys: Vec<String> = injector.keys_for(target).iter().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["X"]);

        let dispatcher = registry.dispatcher_metrics();
        assert_eq!(dispatcher.triggers, 1);
        assert_eq!(dispatcher.sent, 1);
        assert_eq!(dispatcher.addressing_misses, 0);
        runtime.shutdown();
    }

    const BROADCAST: &str = r#"{
        "processes": [
            { "id": "P", "path": "/opt/p", "instances": 3 },
            { "id": "Q", "path": "/opt/q", "instances": 1 }
        ],
        "key_bindings": [
            { "trigger_key": "B", "sequences": [
                { "process": "P", "instance": -1,
                  "actions": [ { "key": "1" }, { "key": "2" }, { "key": "Enter" } ] } ] },
            { "trigger_key": "B", "sequences": [
                { "process": "Q", "instance": 0, "actions": [ { "key": "Z" } ] } ] }
        ]
    }"#;

    #[test]
    fn test_broadcast_sequence_in_order_on_every_instance() {
        let (runtime, injector) = runtime(BROADCAST);
        runtime.attach_configured_routes();
        let registry = runtime.registry();

        registry.trigger("B").unwrap();

        assert!(wait_for(|| (0..3).all(|i| registry.route_metrics("P", i).unwrap().processed == 3)));
        for instance in 0..3 {
            let target = runtime.resolver().resolve("P", instance).unwrap();
            let keys: Vec<String> = injector.keys_for(target).iter().map(ToString::to_string).collect();
            assert_eq!(keys, vec!["1", "2", "Enter"], "P:{instance}");
        }

        // Only the first binding for "B" fires.
        let q = runtime.resolver().resolve("Q", 0).unwrap();
        assert!(injector.keys_for(q).is_empty());
        assert_eq!(registry.route_metrics("Q", 0).unwrap().processed, 0);
        runtime.shutdown();
    }

    #[test]
    fn test_action_delay_paces_the_worker() {
        let (runtime, injector) = runtime(
            r#"{
            "processes": [ { "id": "P", "path": "/opt/p" } ],
            "key_bindings": [ { "trigger_key": "D", "sequences": [
                { "process": "P", "instance": 0,
                  "actions": [ { "key": "Q", "delay": 80 }, { "key": "W" } ] } ] } ]
        }"#,
        );
        runtime.attach_configured_routes();
        let registry = runtime.registry();

        let started = Instant::now();
        registry.trigger("D").unwrap();
        assert!(wait_for(|| registry.route_metrics("P", 0).unwrap().processed == 2));
        assert!(started.elapsed() >= Duration::from_millis(80));
        assert_eq!(injector.injections().len(), 2);
        runtime.shutdown();
    }

    #[test]
    fn test_unknown_trigger_is_ignored() {
        let (runtime, injector) = runtime(SINGLE);
        runtime.attach_configured_routes();
        let registry = runtime.registry();

        registry.trigger("nope").unwrap();
        registry.trigger("A").unwrap();
        assert!(wait_for(|| registry.route_metrics("P", 0).unwrap().processed == 1));

        assert_eq!(registry.dispatcher_metrics().triggers, 1);
        assert_eq!(injector.injections().len(), 1);
        assert_eq!(registry.addressing_misses(), 0);
        runtime.shutdown();
    }
}
