// Copyright 2026 Sigflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization for sigflow
//!
//! Console output is always installed. With the `file-logging` feature a
//! daily-rotated plain-text log is written under a timestamped run folder as
//! well.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use sigflow_config::LoggingConfig;

/// Keeps background log writers alive; dropping it flushes them.
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Directory of the current run's log files, when file logging is on
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Build the filter used by every layer.
///
/// `RUST_LOG` wins when set so ad-hoc debugging keeps working.
pub fn build_filter(debug_flags: &CrateDebugFlags, base_level: &str) -> Result<EnvFilter> {
    if let Ok(directives) = std::env::var(EnvFilter::DEFAULT_ENV) {
        if !directives.trim().is_empty() {
            return EnvFilter::try_new(&directives)
                .with_context(|| format!("Invalid {} directives: {}", EnvFilter::DEFAULT_ENV, directives));
        }
    }

    let filter = debug_flags.to_filter_string(base_level);
    EnvFilter::try_new(&filter).with_context(|| format!("Invalid log filter: {}", filter))
}

/// Initialize console logging
///
/// # Arguments
/// * `debug_flags` - Per-crate debug flags for filtering
/// * `base_level` - Level applied to everything not raised by a flag
///
/// # Errors
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init_logging(debug_flags: &CrateDebugFlags, base_level: &str) -> Result<LoggingGuard> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_filter(build_filter(debug_flags, base_level)?);

    Registry::default()
        .with(console_layer)
        .try_init()
        .context("Failed to install global tracing subscriber")?;

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guard: None,
        log_dir: None,
    })
}

/// Debug flags named by `logging.debug_crates`; `"all"` enables every crate.
pub fn debug_flags_from_config(config: &LoggingConfig) -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::default();
    for crate_name in &config.debug_crates {
        if crate_name.trim() == "all" {
            flags.enable_all();
        } else {
            flags.enable(crate_name);
        }
    }
    flags
}

/// Initialize console logging from the `[logging]` section of `sigflow.toml`
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<LoggingGuard> {
    init_logging(&debug_flags_from_config(config), &config.level.to_lowercase())
}

/// Initialize console logging plus a rolling log file
///
/// Creates `<log_dir>/run_YYYYmmdd_HHMMSS/sigflow.log` (default base `./logs`).
#[cfg(feature = "file-logging")]
pub fn init_logging_with_file(
    debug_flags: &CrateDebugFlags,
    base_level: &str,
    log_dir: Option<PathBuf>,
) -> Result<LoggingGuard> {
    use tracing_appender::rolling;

    let base_log_dir = log_dir.unwrap_or_else(|| PathBuf::from("./logs"));
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let run_folder = base_log_dir.join(format!("run_{}", timestamp));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(build_filter(debug_flags, base_level)?);

    let file_appender = rolling::daily(&run_folder, "sigflow.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(build_filter(debug_flags, base_level)?);

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install global tracing subscriber")?;

    Ok(LoggingGuard {
        _file_guard: Some(guard),
        log_dir: Some(run_folder),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_from_flags() {
        if std::env::var(EnvFilter::DEFAULT_ENV).is_ok() {
            return;
        }
        let mut flags = CrateDebugFlags::default();
        flags.enable("sigflow-client");
        let filter = build_filter(&flags, "warn").unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("sigflow_client=debug"));
        assert!(rendered.contains("warn"));
    }

    #[test]
    fn test_build_filter_rejects_garbage_level() {
        if std::env::var(EnvFilter::DEFAULT_ENV).is_ok() {
            return;
        }
        let flags = CrateDebugFlags::default();
        assert!(build_filter(&flags, "sigflow_client=notalevel").is_err());
    }

    #[test]
    fn test_debug_flags_from_config() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            debug_crates: vec!["sigflow-client".to_string(), " sigflow_config ".to_string()],
        };
        let flags = debug_flags_from_config(&config);
        assert!(flags.is_enabled("sigflow_client"));
        assert!(flags.is_enabled("sigflow-config"));
        assert!(!flags.is_enabled("sigflow_observability"));

        let rendered = flags.to_filter_string(&config.level);
        assert!(rendered.contains("sigflow_client=debug"));
        assert!(rendered.contains("warn"));
    }

    #[test]
    fn test_debug_flags_from_config_all() {
        let config = LoggingConfig {
            level: "info".to_string(),
            debug_crates: vec!["all".to_string()],
        };
        let flags = debug_flags_from_config(&config);
        for crate_name in crate::KNOWN_CRATES {
            assert!(flags.is_enabled(crate_name));
        }
    }

    #[test]
    fn test_debug_flags_from_default_config_is_empty() {
        assert!(!debug_flags_from_config(&LoggingConfig::default()).any_enabled());
    }

    #[test]
    fn test_second_init_reports_error() {
        let flags = CrateDebugFlags::default();
        let first = init_logging(&flags, "info");
        let second = init_logging(&flags, "info");
        // Another test binary component may have installed a subscriber first;
        // either way the second call must fail without panicking.
        assert!(second.is_err());
        if let Ok(guard) = first {
            assert!(guard.log_dir().is_none());
        }
    }

    #[cfg(feature = "file-logging")]
    #[test]
    fn test_file_logging_creates_run_folder() {
        let dir = tempfile::tempdir().unwrap();
        let flags = CrateDebugFlags::default();
        // The global subscriber may already be taken by another test; the run
        // folder is created before installation either way.
        if let Ok(guard) = init_logging_with_file(&flags, "info", Some(dir.path().to_path_buf())) {
            assert!(guard.log_dir().unwrap().starts_with(dir.path()));
        }

        let runs: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("run_"))
            .collect();
        assert_eq!(runs.len(), 1);
    }
}
