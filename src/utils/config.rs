// src/utils/config.rs
//! Kernel configuration
//!
//! Loaded once at host start from an optional `config/kernel.{toml,yaml,json}`
//! file, then overridden by `ZERO_KERNEL__<SECTION>__<KEY>` environment
//! variables.

use crate::event::EventPoolMode;
use crate::reference::ReferenceStrictCheckType;
use crate::utils::errors::Result;
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file stem, resolved relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/kernel";

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "ZERO_KERNEL";

/// Top-level kernel configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub host: HostConfig,
    pub reference: ReferenceConfig,
    pub task: TaskConfig,
    pub event: EventConfig,
    pub logging: LoggingConfig,
    pub demo: DemoConfig,
}

/// Profile of the host application embedding the kernel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Development build (defaults to `debug_assertions`)
    pub development: bool,

    /// Running inside an authoring/editor host
    pub editor: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            development: cfg!(debug_assertions),
            editor: false,
        }
    }
}

/// Reference pool settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// When double-release detection is active
    pub strict_check: ReferenceStrictCheckType,
}

/// Task pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Number of agents registered with the demo task pool
    pub agent_count: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self { agent_count: 4 }
    }
}

/// Event pool settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    pub mode: EventPoolMode,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Demo host loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Tick interval in milliseconds
    pub tick_ms: u64,

    /// Number of ticks before the demo stops (0 = until Ctrl-C)
    pub ticks: u64,

    /// Tasks submitted at startup
    pub task_count: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            tick_ms: 16,
            ticks: 300,
            task_count: 32,
        }
    }
}

impl KernelConfig {
    /// Load from the default location plus environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from an explicit file (required) or the default location (optional)
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_PATH).required(false),
        };

        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Whether reference pools should run double-release detection
    pub fn strict_check_enabled(&self) -> bool {
        self.reference.strict_check.is_enabled(&self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = KernelConfig::default();
        assert_eq!(config.task.agent_count, 4);
        assert_eq!(config.logging.level, "info");
        assert_eq!(
            config.reference.strict_check,
            ReferenceStrictCheckType::OnlyEnableWhenDevelopment
        );
        assert!(!config.event.mode.allow_multi_handler);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[host]
development = false
editor = true

[reference]
strict_check = "only_enable_in_editor"

[task]
agent_count = 8

[event.mode]
allow_multi_handler = true
allow_no_handler = true
"#
        )
        .unwrap();

        let config = KernelConfig::load_from(Some(file.path())).unwrap();
        assert_eq!(config.task.agent_count, 8);
        assert!(config.host.editor);
        assert!(config.event.mode.allow_multi_handler);
        assert!(config.event.mode.allow_no_handler);
        assert!(!config.event.mode.allow_duplicate_handler);
        assert!(config.strict_check_enabled());
        // Untouched sections keep their defaults
        assert_eq!(config.demo.tick_ms, 16);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(KernelConfig::load_from(Some(&path)).is_err());
    }
}
