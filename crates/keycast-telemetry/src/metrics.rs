//! Prometheus metrics for the Keycast bus and runtime.
//!
//! All metrics follow the naming convention: `keycast_<area>_<metric>_<unit>`
//!
//! Counters are process-wide. Per-context counters live on the worker
//! contexts themselves; these aggregate across all of them.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // BUS METRICS
    // =========================================================================

    /// Events accepted by a route's inbound channel
    pub static ref EVENTS_ENQUEUED: IntCounter = IntCounter::new(
        "keycast_bus_events_enqueued_total",
        "Events accepted by a route's inbound channel"
    ).expect("metric creation failed");

    /// Events a channel refused
    pub static ref EVENTS_REJECTED: IntCounterVec = IntCounterVec::new(
        Opts::new("keycast_bus_events_rejected_total", "Events refused by a channel"),
        &["reason"]  // reason: full/closed/shutdown
    ).expect("metric creation failed");

    // =========================================================================
    // ROUTING METRICS
    // =========================================================================

    /// Events whose address matched no registered route
    pub static ref ADDRESSING_MISSES: IntCounter = IntCounter::new(
        "keycast_routing_addressing_misses_total",
        "Events dropped because no route matched their address"
    ).expect("metric creation failed");

    /// Currently attached routes
    pub static ref ROUTES_ACTIVE: IntGauge = IntGauge::new(
        "keycast_routing_routes_active",
        "Number of currently attached routes"
    ).expect("metric creation failed");

    // =========================================================================
    // INJECTION METRICS
    // =========================================================================

    /// Successful injections
    pub static ref INJECTIONS: IntCounter = IntCounter::new(
        "keycast_injector_injections_total",
        "Actions handed to the input injector successfully"
    ).expect("metric creation failed");

    /// Failed injections
    pub static ref INJECTION_FAILURES: IntCounter = IntCounter::new(
        "keycast_injector_failures_total",
        "Actions the input injector failed to deliver"
    ).expect("metric creation failed");
}

/// Handle proving the metrics were registered.
pub struct MetricsHandle {
    _registry: Registry,
}

/// Register all metrics with the global registry.
///
/// Registering twice is not an error.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Bus
        Box::new(EVENTS_ENQUEUED.clone()),
        Box::new(EVENTS_REJECTED.clone()),
        // Routing
        Box::new(ADDRESSING_MISSES.clone()),
        Box::new(ROUTES_ACTIVE.clone()),
        // Injection
        Box::new(INJECTIONS.clone()),
        Box::new(INJECTION_FAILURES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: REGISTRY.clone(),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_twice() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_counter_increment() {
        let before = ADDRESSING_MISSES.get();
        ADDRESSING_MISSES.inc();
        assert!(ADDRESSING_MISSES.get() > before);
    }

    #[test]
    fn test_encode_contains_registered_metric() {
        register_metrics().unwrap();
        EVENTS_REJECTED.with_label_values(&["full"]).inc();
        let text = encode_metrics().unwrap();
        assert!(text.contains("keycast_bus_events_rejected_total"));
    }
}
