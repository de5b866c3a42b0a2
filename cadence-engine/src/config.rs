//! Configuration for the cadence daemon
//!
//! Bootstrap configuration is a single TOML file (see
//! `cadence_common::config` for how the file is located). Every field has a
//! built-in default, so an empty or missing file yields a working engine.
//!
//! Command-line flags override the file; see `main.rs`.

use cadence_common::Error;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Control loop and enrichment timing
    pub engine: EngineSettings,

    /// Media library persistence
    pub library: LibraryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Simulated session backend
    pub simulation: SimulationConfig,
}

/// Largest accepted event bus capacity. The bus preallocates every slot.
pub const MAX_EVENT_CAPACITY: usize = 1 << 16;

impl TomlConfig {
    /// Reject values that parse but cannot run
    pub fn validate(&self) -> cadence_common::Result<()> {
        let capacity = self.engine.event_capacity;
        if capacity == 0 || capacity > MAX_EVENT_CAPACITY {
            return Err(Error::Config(format!(
                "engine.event_capacity must be between 1 and {}, got {}",
                MAX_EVENT_CAPACITY, capacity
            )));
        }
        Ok(())
    }
}

/// Engine timing and policy settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Signal process termination when the playlist runs out
    pub play_and_exit: bool,

    /// Sleep between two control loop steps
    pub control_interval_ms: u64,

    /// Grace window before leftover output resources are destroyed
    pub gc_grace_ms: u64,

    /// Primary worker throttle unit; the delay after each entry is
    /// `(activity + 1) * preparse_time_unit_ms`
    pub preparse_time_unit_ms: u64,

    /// Sleep of an enrichment worker that found its queue empty
    pub idle_poll_ms: u64,

    /// Event bus channel capacity
    pub event_capacity: usize,

    /// Do not send entries that already carry title and artist to the
    /// fetch stage
    pub skip_fetch_when_tagged: bool,

    /// Ask the fetch stage for artwork
    pub fetch_art: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            play_and_exit: false,
            control_interval_ms: default_control_interval_ms(),
            gc_grace_ms: default_gc_grace_ms(),
            preparse_time_unit_ms: 1,
            idle_poll_ms: 10,
            event_capacity: 256,
            skip_fetch_when_tagged: false,
            fetch_art: false,
        }
    }
}

impl EngineSettings {
    pub fn control_interval(&self) -> Duration {
        Duration::from_millis(self.control_interval_ms)
    }

    pub fn gc_grace(&self) -> Duration {
        Duration::from_millis(self.gc_grace_ms)
    }

    pub fn preparse_time_unit(&self) -> Duration {
        Duration::from_millis(self.preparse_time_unit_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

fn default_control_interval_ms() -> u64 {
    50
}

fn default_gc_grace_ms() -> u64 {
    1000
}

/// Media library configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// JSON file the playlist is loaded from at startup and dumped to at
    /// shutdown. No persistence when unset.
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Simulated session timings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Time a session spends initializing
    pub init_ms: u64,

    /// Time a session plays before reaching end of stream
    pub track_ms: u64,

    /// Time between a stop request and the session becoming dead
    pub stop_ms: u64,

    /// Time the blocking destroy call takes
    pub destroy_ms: u64,

    /// Whether sessions also open a stream output
    pub stream_output: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            init_ms: 100,
            track_ms: 3000,
            stop_ms: 100,
            destroy_ms: 50,
            stream_output: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_common::config::parse_toml;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: TomlConfig = parse_toml("").unwrap();
        assert!(!config.engine.play_and_exit);
        assert_eq!(config.engine.control_interval(), Duration::from_millis(50));
        assert_eq!(config.engine.gc_grace(), Duration::from_secs(1));
        assert_eq!(config.engine.preparse_time_unit(), Duration::from_millis(1));
        assert_eq!(config.logging.level, "info");
        assert!(config.library.path.is_none());
        assert!(!config.engine.skip_fetch_when_tagged);
        assert!(!config.engine.fetch_art);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config: TomlConfig = parse_toml(
            r#"
            [engine]
            play_and_exit = true
            gc_grace_ms = 250

            [library]
            path = "/var/lib/cadence/library.json"

            [simulation]
            stream_output = true
            "#,
        )
        .unwrap();

        assert!(config.engine.play_and_exit);
        assert_eq!(config.engine.gc_grace(), Duration::from_millis(250));
        assert_eq!(config.engine.idle_poll_ms, 10);
        assert_eq!(
            config.library.path,
            Some(PathBuf::from("/var/lib/cadence/library.json"))
        );
        assert!(config.simulation.stream_output);
        assert_eq!(config.simulation.track_ms, 3000);
    }

    #[test]
    fn test_defaults_validate() {
        let config: TomlConfig = parse_toml("").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_event_capacity_is_config_error() {
        let config: TomlConfig = parse_toml("[engine]\nevent_capacity = 0").unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config: TomlConfig = parse_toml("[engine]\nevent_capacity = 1").unwrap();
        assert!(config.validate().is_ok());
        let _bus = cadence_common::EventBus::new(config.engine.event_capacity);

        let config: TomlConfig = parse_toml("[engine]\nevent_capacity = 70000").unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
