//! Adapters for the runtime's ports.

pub mod injectors;
pub mod keys;
pub mod settings;
pub mod static_resolver;
pub mod triggers;

pub use injectors::{Injection, LoggingInjector, RecordingInjector};
pub use keys::{KeyCode, NamedKey};
pub use settings::{ProcessConfig, Settings, SettingsError};
pub use static_resolver::StaticResolver;
pub use triggers::spawn_trigger_reader;
