// src/observability/mod.rs
//! Logging and metrics setup for kernel hosts
//!
//! The kernel itself only emits `tracing` events and `metrics` samples; a
//! host installs the subscriber and recorder once at startup.
//!
//! # Metrics
//!
//! | name                                   | kind    |
//! |----------------------------------------|---------|
//! | `zero_kernel_tasks_added_total`        | counter |
//! | `zero_kernel_tasks_completed_total`    | counter |
//! | `zero_kernel_tasks_failed_total`       | counter |
//! | `zero_kernel_tasks_removed_total`      | counter |
//! | `zero_kernel_tasks_waiting`            | gauge   |
//! | `zero_kernel_agents_working`           | gauge   |
//! | `zero_kernel_events_fired_total`       | counter |
//! | `zero_kernel_events_dispatched_total`  | counter |

use crate::utils::config::LoggingConfig;
use crate::utils::errors::{KernelError, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| KernelError::Observability(format!("invalid log filter: {}", e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| KernelError::Observability(format!("tracing init failed: {}", e)))
}

/// Install the global Prometheus recorder
///
/// The returned handle renders the current samples in text exposition format.
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| KernelError::Observability(format!("metrics init failed: {}", e)))
}
