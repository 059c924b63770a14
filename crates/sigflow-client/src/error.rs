// Copyright 2026 Sigflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Error types for the sigflow client

/// Result type alias using ClientError
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced to callers of `Client` and `Computation`
///
/// Shutdown failures are never represented here: `Computation::close` and
/// `Client::close` log them instead.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connection establishment failed
    #[error("Failed to create SignalFlow client: {0}")]
    Connection(String),

    /// The client's connection was already released
    #[error("SignalFlow client is not initialized")]
    NotInitialized,

    /// The backend rejected the program or returned no computation
    #[error("Failed to execute SignalFlow program: {0}")]
    Execution(String),
}

/// Failures reported by a transport implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("stop failed: {0}")]
    Stop(String),

    #[error("connection closed")]
    Closed,
}
