//! # Dynamic Routes
//!
//! Attach and detach while the dispatcher is live, plus the backpressure
//! and dead-letter paths.

#[cfg(test)]
mod tests {
    use super::super::fixtures::{config, runtime, runtime_with, wait_for};
    use keycast_bus::Command;
    use keycast_runtime::ports::{TargetHandle, TargetResolver};
    use keycast_runtime::{AttachError, DetachError};

    const SETTINGS: &str = r#"{
        "processes": [ { "id": "P", "path": "/opt/p", "instances": 2 } ],
        "key_bindings": [ { "trigger_key": "A", "sequences": [
            { "process": "P", "instance": -1, "actions": [ { "key": "X" } ] } ] } ]
    }"#;

    #[test]
    fn test_late_attach_receives_later_triggers() {
        let (runtime, injector) = runtime(SETTINGS);
        let registry = runtime.registry();
        registry.attach("P", 0).unwrap();

        registry.trigger("A").unwrap();
        assert!(wait_for(|| registry.route_metrics("P", 0).unwrap().processed == 1));

        registry.attach("P", 1).unwrap();
        registry.trigger("A").unwrap();
        assert!(wait_for(|| registry.route_metrics("P", 1).unwrap().processed == 1));
        assert!(wait_for(|| registry.route_metrics("P", 0).unwrap().processed == 2));

        let p1 = runtime.resolver().resolve("P", 1).unwrap();
        assert_eq!(injector.keys_for(p1).len(), 1);
        runtime.shutdown();
    }

    #[test]
    fn test_detached_target_becomes_a_miss() {
        let (runtime, _) = runtime(SETTINGS);
        runtime.attach_configured_routes();
        let registry = runtime.registry();

        registry.detach("P", 0).unwrap();
        registry.detach("P", 1).unwrap();
        assert_eq!(
            registry.detach("P", 1),
            Err(DetachError::RouteNotFound(keycast_bus::RouteIdentity::new("P", 1)))
        );

        registry.trigger("A").unwrap();
        assert!(wait_for(|| registry.addressing_misses() == 1));
        assert!(wait_for(|| registry.dispatcher_metrics().addressing_misses == 1));

        let dead = registry.dead_letters().receive_message().unwrap();
        assert_eq!(dead.command(), Command::KeyPress);
        assert_eq!(dead.target_instance(), -1);
        runtime.shutdown();
    }

    #[test]
    fn test_reattach_after_detach() {
        let (runtime, _) = runtime(SETTINGS);
        let registry = runtime.registry();

        registry.attach("P", 0).unwrap();
        assert!(matches!(registry.attach("P", 0), Err(AttachError::DuplicateRoute(_))));
        registry.detach("P", 0).unwrap();
        let handle = registry.attach("P", 0).unwrap();
        assert_eq!(handle.metrics().processed, 0);
        assert_eq!(registry.route_count(), 1);
        runtime.shutdown();
    }

    #[test]
    fn test_target_that_disappears_cannot_attach() {
        let (runtime, _) = runtime(SETTINGS);
        runtime.resolver().unregister("P", 1);

        let errors = runtime.attach_configured_routes();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], AttachError::UnresolvableTarget(_)));
        assert_eq!(runtime.registry().route_count(), 1);

        runtime.resolver().register("P", 1, TargetHandle::from_raw(0xbeef));
        runtime.registry().attach("P", 1).unwrap();
        assert_eq!(runtime.registry().route_count(), 2);
        runtime.shutdown();
    }

    #[test]
    fn test_oversized_sequence_is_dropped_whole() {
        let (runtime, injector) = runtime_with(
            config(2, 1),
            r#"{
            "processes": [ { "id": "P", "path": "/opt/p" } ],
            "key_bindings": [ { "trigger_key": "A", "sequences": [
                { "process": "P", "instance": 0,
                  "actions": [ { "key": "1" }, { "key": "2" }, { "key": "3" } ] } ] } ]
        }"#,
        );
        runtime.attach_configured_routes();
        let registry = runtime.registry();

        registry.trigger("A").unwrap();
        assert!(wait_for(|| registry.dispatcher_metrics().dropped == 1));

        assert_eq!(registry.route_metrics("P", 0).unwrap().processed, 0);
        assert!(injector.injections().is_empty());
        assert_eq!(registry.addressing_misses(), 0);

        let dead = registry.dead_letters().receive_batch(2);
        let keys: Vec<_> = dead.iter().filter_map(|e| e.key()).collect();
        assert_eq!(keys, vec!["1", "2"]);
        runtime.shutdown();
    }
}
