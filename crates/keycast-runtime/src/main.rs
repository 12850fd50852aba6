//! # Keycast
//!
//! Broadcasts key bindings to every configured target instance.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging + metrics)
//! 2. Load runtime configuration (env) and settings (JSON)
//! 3. Build the routing registry and attach one route per process instance
//! 4. Read trigger names from stdin, one per line, until EOF or Ctrl+C
//! 5. Shut the registry down and log final metrics
//!
//! ```text
//! $ keycast config/settings.json
//! A            <- fires the bindings for trigger "A"
//! ```

use anyhow::{Context, Result};
use keycast_runtime::adapters::{spawn_trigger_reader, LoggingInjector, Settings};
use keycast_runtime::container::{Runtime, RuntimeConfig};
use keycast_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env()).context("telemetry init")?;

    let config = RuntimeConfig::from_env(std::env::args().nth(1).map(PathBuf::from))
        .context("invalid runtime configuration")?;
    let settings = Settings::load(&config.settings_path)
        .with_context(|| format!("loading {}", config.settings_path.display()))?;
    settings.log_summary();

    let runtime = Runtime::new(&config, settings, Arc::new(LoggingInjector))
        .context("failed to build runtime")?;
    runtime.attach_configured_routes();

    info!("Keycast is running. Type a trigger name per line, Ctrl+C to stop.");
    // Stdin is read on a plain thread; a pending read must not hold up exit.
    let mut triggers = spawn_trigger_reader(BufReader::new(std::io::stdin()))
        .context("spawning stdin reader")?;
    loop {
        tokio::select! {
            trigger = triggers.recv() => match trigger {
                Some(trigger) => {
                    if let Err(e) = runtime.registry().trigger(&trigger) {
                        warn!(trigger = %trigger, error = %e, "Trigger dropped");
                    }
                }
                None => {
                    info!("stdin closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    runtime.shutdown();

    match encode_metrics() {
        Ok(text) => info!(metrics = %text, "Final metrics"),
        Err(e) => warn!(error = %e, "Failed to encode metrics"),
    }

    Ok(())
}
