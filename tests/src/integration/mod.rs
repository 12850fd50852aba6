//! Cross-crate scenarios: settings file → runtime → registry → injector.

pub mod dynamic_routes;
pub mod e2e_dispatch;

#[cfg(test)]
pub(crate) mod fixtures {
    use keycast_runtime::adapters::{RecordingInjector, Settings};
    use keycast_runtime::container::{Runtime, RuntimeConfig};
    use keycast_runtime::RegistryConfig;
    use std::io::Write;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::NamedTempFile;

    /// Write `json` to a temp file and load it the way the binary does.
    pub fn settings_from_file(json: &str) -> Settings {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(json.as_bytes()).expect("write settings");
        Settings::load(file.path()).expect("valid settings")
    }

    pub fn config(capacity: usize, batch_size: usize) -> RuntimeConfig {
        RuntimeConfig {
            registry: RegistryConfig {
                channel_capacity: capacity,
                batch_size,
                poll_interval: Duration::from_millis(10),
            },
            ..RuntimeConfig::default()
        }
    }

    pub fn runtime(json: &str) -> (Runtime, Arc<RecordingInjector>) {
        runtime_with(config(256, 10), json)
    }

    pub fn runtime_with(config: RuntimeConfig, json: &str) -> (Runtime, Arc<RecordingInjector>) {
        let injector = Arc::new(RecordingInjector::new());
        let runtime = Runtime::new(&config, settings_from_file(json), injector.clone())
            .expect("runtime should start");
        (runtime, injector)
    }

    pub fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }
}
