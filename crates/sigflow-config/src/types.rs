// Copyright 2026 Sigflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `sigflow.toml`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound for `computation.stop_timeout_ms`.
pub const MAX_STOP_TIMEOUT_MS: u64 = 2_000;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SigflowConfig {
    pub connection: ConnectionConfig,
    pub computation: ComputationConfig,
    pub logging: LoggingConfig,
}

/// Backend connection settings
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Deployment realm, e.g. `us1`
    pub realm: String,
    /// Access token. Prefer `O11Y_TOKEN` over putting it in the file.
    pub token: String,
    /// Explicit stream endpoint; derived from `realm` when unset
    pub stream_url: Option<String>,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.token.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("ConnectionConfig")
            .field("realm", &self.realm)
            .field("token", &token)
            .field("stream_url", &self.stream_url)
            .finish()
    }
}

/// Per-computation lifecycle settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ComputationConfig {
    /// Budget for the remote stop issued by `Computation::close`
    pub stop_timeout_ms: u64,
    /// Optional deadline for `Computation::collect`; unbounded when unset
    pub collect_deadline_ms: Option<u64>,
    /// Resolution used by callers that do not pass one explicitly
    pub default_resolution_ms: u64,
}

impl Default for ComputationConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: MAX_STOP_TIMEOUT_MS,
            collect_deadline_ms: None,
            default_resolution_ms: 60_000,
        }
    }
}

/// Logging settings consumed by `sigflow-observability`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Crates logged at debug level regardless of `level`
    pub debug_crates: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            debug_crates: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SigflowConfig::default();
        assert_eq!(config.computation.stop_timeout_ms, 2_000);
        assert_eq!(config.computation.collect_deadline_ms, None);
        assert_eq!(config.computation.default_resolution_ms, 60_000);
        assert_eq!(config.logging.level, "info");
        assert!(config.connection.stream_url.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: SigflowConfig = toml::from_str(
            r#"
            [connection]
            realm = "us1"

            [computation]
            collect_deadline_ms = 5000
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.realm, "us1");
        assert_eq!(config.computation.collect_deadline_ms, Some(5000));
        assert_eq!(config.computation.stop_timeout_ms, 2_000);
    }

    #[test]
    fn test_debug_redacts_token() {
        let connection = ConnectionConfig {
            realm: "us1".to_string(),
            token: "super-secret-token".to_string(),
            stream_url: None,
        };
        let rendered = format!("{:?}", connection);
        assert!(!rendered.contains("super-secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_serializes_to_json() {
        let json = serde_json::to_value(SigflowConfig::default()).unwrap();
        assert_eq!(json["computation"]["stop_timeout_ms"], 2_000);
    }
}
