// Copyright 2026 Sigflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later tiers win:
//! 1. TOML file (base values)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, SigflowConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "sigflow.toml";

/// Find the sigflow configuration file
///
/// Search order:
/// 1. `SIGFLOW_CONFIG_PATH` environment variable
/// 2. Current working directory: `./sigflow.toml`
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("SIGFLOW_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        } else {
            return Err(ConfigError::FileNotFound(format!(
                "Config file specified by SIGFLOW_CONFIG_PATH not found: {}",
                path.display()
            )));
        }
    }

    let mut search_paths = Vec::new();

    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet SIGFLOW_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// Validation is left to the caller (`validate_config`) so that partially
/// specified files can be completed by overrides first.
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<SigflowConfig> {
    let config_file = if let Some(path) = config_path {
        path.to_path_buf()
    } else {
        find_config_file()?
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: SigflowConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `O11Y_REALM` -> `connection.realm`
/// - `O11Y_TOKEN` -> `connection.token`
/// - `SIGFLOW_STREAM_URL` -> `connection.stream_url`
/// - `SIGFLOW_STOP_TIMEOUT_MS` -> `computation.stop_timeout_ms`
/// - `SIGFLOW_COLLECT_DEADLINE_MS` -> `computation.collect_deadline_ms`
/// - `SIGFLOW_LOG_LEVEL` -> `logging.level`
pub fn apply_environment_overrides(config: &mut SigflowConfig) {
    let vars: HashMap<&str, String> = [
        ("realm", "O11Y_REALM"),
        ("token", "O11Y_TOKEN"),
        ("stream_url", "SIGFLOW_STREAM_URL"),
        ("stop_timeout_ms", "SIGFLOW_STOP_TIMEOUT_MS"),
        ("collect_deadline_ms", "SIGFLOW_COLLECT_DEADLINE_MS"),
        ("log_level", "SIGFLOW_LOG_LEVEL"),
    ]
    .into_iter()
    .filter_map(|(key, var)| env::var(var).ok().map(|value| (key, value)))
    .collect();

    apply_overrides(config, |key| vars.get(key).cloned());
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - Map of CLI arguments (e.g., `{"realm": "eu0", "stop_timeout_ms": "500"}`)
pub fn apply_cli_overrides(config: &mut SigflowConfig, cli_args: &HashMap<String, String>) {
    apply_overrides(config, |key| cli_args.get(key).cloned());
}

/// Unparseable numeric overrides are ignored, keeping the previous value.
fn apply_overrides(config: &mut SigflowConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(value) = lookup("realm") {
        config.connection.realm = value;
    }
    if let Some(value) = lookup("token") {
        config.connection.token = value;
    }
    if let Some(value) = lookup("stream_url") {
        config.connection.stream_url = if value.is_empty() { None } else { Some(value) };
    }
    if let Some(value) = lookup("stop_timeout_ms") {
        if let Ok(ms) = value.parse::<u64>() {
            config.computation.stop_timeout_ms = ms;
        }
    }
    if let Some(value) = lookup("collect_deadline_ms") {
        if value.is_empty() || value == "none" {
            config.computation.collect_deadline_ms = None;
        } else if let Ok(ms) = value.parse::<u64>() {
            config.computation.collect_deadline_ms = Some(ms);
        }
    }
    if let Some(value) = lookup("log_level") {
        config.logging.level = value;
    }
}
