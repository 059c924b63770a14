// Copyright 2026 Sigflow Developers
// SPDX-License-Identifier: Apache-2.0

//! # sigflow-observability
//!
//! Logging setup shared by sigflow binaries and test harnesses, with per-crate
//! debug flag support.
//!
//! ## Features
//! - `file-logging`: daily-rotated log file alongside console output

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Known sigflow crate names for debug flags (tracing target form)
pub const KNOWN_CRATES: &[&str] = &["sigflow", "sigflow_client", "sigflow_config", "sigflow_observability"];
