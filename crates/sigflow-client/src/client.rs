// Copyright 2026 Sigflow Developers
// SPDX-License-Identifier: Apache-2.0

//! Client owning the connection to the analytics backend

use crate::computation::Computation;
use crate::error::{ClientError, Result};
use crate::transport::{
    stream_url_for_realm, Connection, ErrorSink, ExecuteRequest, StopRequest, StreamTransport,
};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use sigflow_config::{ComputationConfig, SigflowConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Ceiling for the time `Computation::close` waits on the remote stop
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Floor for the stop timeout; a zero budget would never see the stop finish
pub const MIN_STOP_TIMEOUT: Duration = Duration::from_millis(1);

/// Resolution used by `Client::execute_with_default_resolution` unless configured
pub const DEFAULT_RESOLUTION: Duration = Duration::from_secs(60);

/// Longest token prefix ever written to logs
const TOKEN_LOG_PREFIX: usize = 5;

/// Settings copied into every computation a client starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Clamped to `MIN_STOP_TIMEOUT..=STOP_TIMEOUT`
    pub stop_timeout: Duration,
    /// Bound for `Computation::collect`; unbounded when `None`
    pub collect_deadline: Option<Duration>,
    pub default_resolution: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            stop_timeout: STOP_TIMEOUT,
            collect_deadline: None,
            default_resolution: DEFAULT_RESOLUTION,
        }
    }
}

impl ClientOptions {
    pub fn from_config(config: &ComputationConfig) -> Self {
        Self::default()
            .with_stop_timeout(Duration::from_millis(config.stop_timeout_ms))
            .with_collect_deadline(config.collect_deadline_ms.map(Duration::from_millis))
            .with_default_resolution(Duration::from_millis(config.default_resolution_ms))
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout.clamp(MIN_STOP_TIMEOUT, STOP_TIMEOUT);
        self
    }

    pub fn with_default_resolution(mut self, resolution: Duration) -> Self {
        self.default_resolution = resolution;
        self
    }

    pub fn with_collect_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.collect_deadline = deadline;
        self
    }
}

/// Token prefix safe to log: at most 5 characters and never the whole token.
pub fn redact_token(token: &str) -> &str {
    let chars = token.chars().count();
    let keep = TOKEN_LOG_PREFIX.min(chars / 2);
    match token.char_indices().nth(keep) {
        Some((end, _)) => &token[..end],
        None => token,
    }
}

/// Whole-second UTC instant for a millisecond epoch timestamp.
///
/// The sub-second part is dropped (truncating toward zero).
fn epoch_ms_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ms / 1000, 0).single()
}

/// Connection to the analytics backend
///
/// # Example
/// ```ignore
/// use sigflow_client::{Client, transport::memory::MemoryTransport};
///
/// let transport = MemoryTransport::new();
/// let client = Client::connect(&transport, &token, "us1")?;
/// let computation = client.execute("data('cpu.utilization').publish()", start, stop, 60_000)?;
/// let result = computation.collect();
/// computation.close()?;
/// client.close();
/// ```
pub struct Client {
    connection: Mutex<Option<Arc<dyn Connection>>>,
    realm: String,
    options: ClientOptions,
}

impl Client {
    /// Connect to the stream endpoint of `realm`
    ///
    /// # Errors
    /// `ClientError::Connection` when the realm is empty or the transport
    /// cannot connect; the message carries the cause.
    pub fn connect(transport: &dyn StreamTransport, token: &str, realm: &str) -> Result<Self> {
        Self::connect_with_options(transport, token, realm, ClientOptions::default())
    }

    pub fn connect_with_options(
        transport: &dyn StreamTransport,
        token: &str,
        realm: &str,
        options: ClientOptions,
    ) -> Result<Self> {
        Self::open(transport, token, realm, None, options)
    }

    /// Connect using a loaded configuration
    ///
    /// `connection.stream_url`, when set, replaces the realm-derived endpoint.
    pub fn from_config(transport: &dyn StreamTransport, config: &SigflowConfig) -> Result<Self> {
        Self::open(
            transport,
            &config.connection.token,
            &config.connection.realm,
            config.connection.stream_url.as_deref(),
            ClientOptions::from_config(&config.computation),
        )
    }

    fn open(
        transport: &dyn StreamTransport,
        token: &str,
        realm: &str,
        stream_url: Option<&str>,
        options: ClientOptions,
    ) -> Result<Self> {
        info!(
            "Creating new SignalFlow client. Realm: {}, Token: {}... (truncated for security)",
            realm,
            redact_token(token)
        );

        let endpoint = match stream_url {
            Some(url) => url.to_string(),
            None if realm.trim().is_empty() => {
                let err = ClientError::Connection("realm must not be empty".to_string());
                error!("{}", err);
                return Err(err);
            }
            None => stream_url_for_realm(realm),
        };
        info!("Using Stream URL: {}", endpoint);

        let sink_realm = realm.to_string();
        let on_error: ErrorSink = Arc::new(move |err| {
            warn!(realm = %sink_realm, "Error in SignalFlow client: {}", err);
        });

        let connection = transport.connect(&endpoint, token, on_error).map_err(|e| {
            let err = ClientError::Connection(e.to_string());
            error!("{}", err);
            err
        })?;

        info!("Successfully created SignalFlow client for realm: {}", realm);
        Ok(Self {
            connection: Mutex::new(Some(Arc::from(connection))),
            realm: realm.to_string(),
            options,
        })
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn options(&self) -> ClientOptions {
        self.options
    }

    pub fn is_closed(&self) -> bool {
        self.connection.lock().is_none()
    }

    /// Start `program` over `[start_ms, stop_ms)` at `resolution_ms`
    ///
    /// Timestamps are milliseconds since the Unix epoch and are truncated to
    /// whole seconds before being sent.
    ///
    /// # Errors
    /// - `ClientError::NotInitialized` after `close`
    /// - `ClientError::Execution` when the window cannot be represented, the
    ///   backend rejects the program, or no computation comes back
    pub fn execute(
        &self,
        program: &str,
        start_ms: i64,
        stop_ms: i64,
        resolution_ms: i64,
    ) -> Result<Computation> {
        info!(
            "Executing SignalFlow program. Start: {}, Stop: {}, Resolution: {}ms",
            start_ms, stop_ms, resolution_ms
        );
        debug!("Program:\n{}", program);

        let connection = self.connection.lock().clone().ok_or_else(|| {
            error!("{}", ClientError::NotInitialized);
            ClientError::NotInitialized
        })?;

        let request = build_request(program, start_ms, stop_ms, resolution_ms)?;
        info!(
            "Converted timestamps - Start: {}, Stop: {}, Resolution: {:?}",
            request.start.to_rfc3339(),
            request.stop.to_rfc3339(),
            request.resolution
        );

        let subscription = match connection.execute(&request) {
            Ok(Some(subscription)) => subscription,
            Ok(None) => {
                return Err(execution_error(
                    "Received no computation from SignalFlow client".to_string(),
                ))
            }
            Err(e) => return Err(execution_error(e.to_string())),
        };

        let computation = Computation::new(subscription, self.options);
        info!(computation = computation.id(), "Successfully started SignalFlow execution");
        Ok(computation)
    }

    /// `execute` at the configured `default_resolution`
    pub fn execute_with_default_resolution(
        &self,
        program: &str,
        start_ms: i64,
        stop_ms: i64,
    ) -> Result<Computation> {
        let resolution_ms = i64::try_from(self.options.default_resolution.as_millis())
            .map_err(|_| execution_error("default resolution is out of range".to_string()))?;
        self.execute(program, start_ms, stop_ms, resolution_ms)
    }

    /// Stop the connection, best effort
    ///
    /// Errors from the transport are logged and dropped. Further calls do nothing.
    pub fn close(&self) {
        let Some(connection) = self.connection.lock().take() else {
            return;
        };

        match connection.stop(&StopRequest::default()) {
            Ok(()) => info!("Closed SignalFlow client for realm: {}", self.realm),
            Err(e) => debug!("Ignoring error while closing SignalFlow client: {}", e),
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("realm", &self.realm)
            .field("closed", &self.is_closed())
            .field("options", &self.options)
            .finish()
    }
}

fn execution_error(cause: String) -> ClientError {
    let err = ClientError::Execution(cause);
    error!("{}", err);
    err
}

fn build_request(
    program: &str,
    start_ms: i64,
    stop_ms: i64,
    resolution_ms: i64,
) -> Result<ExecuteRequest> {
    let start = epoch_ms_to_utc(start_ms)
        .ok_or_else(|| execution_error(format!("start time {} is out of range", start_ms)))?;
    let stop = epoch_ms_to_utc(stop_ms)
        .ok_or_else(|| execution_error(format!("stop time {} is out of range", stop_ms)))?;
    let resolution = u64::try_from(resolution_ms)
        .map(Duration::from_millis)
        .map_err(|_| execution_error(format!("resolution {}ms is negative", resolution_ms)))?;

    Ok(ExecuteRequest {
        program: program.to_string(),
        start,
        stop,
        resolution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::{ExecuteBehavior, MemoryTransport};

    #[test]
    fn test_redact_token() {
        assert_eq!(redact_token(""), "");
        assert_eq!(redact_token("a"), "");
        assert_eq!(redact_token("abcd"), "ab");
        assert_eq!(redact_token("abcdefghij"), "abcde");
        assert_eq!(redact_token("abcdefghijklmnopqrstuv"), "abcde");
        // Multibyte characters are never split
        assert_eq!(redact_token("ééééééééééé"), "ééééé");
    }

    #[test]
    fn test_epoch_ms_truncates_to_seconds() {
        let start = epoch_ms_to_utc(1_700_000_000_999).unwrap();
        assert_eq!(start.timestamp(), 1_700_000_000);
        assert_eq!(start.timestamp_subsec_millis(), 0);
        assert_eq!(epoch_ms_to_utc(-1_500).unwrap().timestamp(), -1);
        assert!(epoch_ms_to_utc(i64::MAX).is_none());
    }

    #[test]
    fn test_options_clamp_stop_timeout() {
        let options = ClientOptions::default().with_stop_timeout(Duration::from_secs(30));
        assert_eq!(options.stop_timeout, STOP_TIMEOUT);
        let options = ClientOptions::default().with_stop_timeout(Duration::ZERO);
        assert_eq!(options.stop_timeout, MIN_STOP_TIMEOUT);

        let mut config = ComputationConfig::default();
        config.stop_timeout_ms = 250;
        config.collect_deadline_ms = Some(1_000);
        let options = ClientOptions::from_config(&config);
        assert_eq!(options.stop_timeout, Duration::from_millis(250));
        assert_eq!(options.collect_deadline, Some(Duration::from_secs(1)));
        assert_eq!(options.default_resolution, DEFAULT_RESOLUTION);
    }

    #[test]
    fn test_execute_with_configured_default_resolution() {
        let transport = MemoryTransport::new();
        let mut config = SigflowConfig::default();
        config.connection.realm = "us1".to_string();
        config.connection.token = "token".to_string();
        config.computation.default_resolution_ms = 10_000;

        let client = Client::from_config(&transport, &config).unwrap();
        let _computation = client
            .execute_with_default_resolution("data('cpu').publish()", 0, 3_600_000)
            .unwrap();

        let calls = transport.execute_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].resolution, Duration::from_secs(10));
    }

    #[test]
    fn test_default_resolution_without_config() {
        let transport = MemoryTransport::new();
        let client = Client::connect(&transport, "token", "us1").unwrap();
        let _computation = client
            .execute_with_default_resolution("p", 0, 60_000)
            .unwrap();
        assert_eq!(transport.execute_calls()[0].resolution, DEFAULT_RESOLUTION);
    }

    #[test]
    fn test_connect_derives_endpoint() {
        let transport = MemoryTransport::new();
        let client = Client::connect(&transport, "token-value", "us1").unwrap();
        assert_eq!(client.realm(), "us1");
        assert_eq!(
            transport.connect_calls(),
            vec!["wss://stream.us1.signalfx.com/v2/signalflow".to_string()]
        );
    }

    #[test]
    fn test_empty_realm_rejected() {
        let transport = MemoryTransport::new();
        let err = Client::connect(&transport, "token", " ").unwrap_err();
        assert!(matches!(err, ClientError::Connection(_)));
        assert!(transport.connect_calls().is_empty());
    }

    #[test]
    fn test_from_config_uses_stream_url_override() {
        let transport = MemoryTransport::new();
        let mut config = SigflowConfig::default();
        config.connection.token = "token".to_string();
        config.connection.stream_url = Some("ws://127.0.0.1:9999/v2/signalflow".to_string());
        config.computation.stop_timeout_ms = 100;

        let client = Client::from_config(&transport, &config).unwrap();
        assert_eq!(client.options().stop_timeout, Duration::from_millis(100));
        assert_eq!(
            transport.connect_calls(),
            vec!["ws://127.0.0.1:9999/v2/signalflow".to_string()]
        );
    }

    #[test]
    fn test_execute_builds_request() {
        let transport = MemoryTransport::new();
        let client = Client::connect(&transport, "token", "us1").unwrap();
        let _computation = client
            .execute("data('cpu').publish()", 1_000_500, 4_600_900, 60_000)
            .unwrap();

        let calls = transport.execute_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "data('cpu').publish()");
        assert_eq!(calls[0].start.timestamp(), 1_000);
        assert_eq!(calls[0].stop.timestamp(), 4_600);
        assert_eq!(calls[0].resolution, Duration::from_secs(60));
    }

    #[test]
    fn test_execute_negative_resolution() {
        let transport = MemoryTransport::new();
        let client = Client::connect(&transport, "token", "us1").unwrap();
        let err = client.execute("p", 0, 1_000, -1).unwrap_err();
        assert!(matches!(err, ClientError::Execution(_)));
        assert!(transport.execute_calls().is_empty());
    }

    #[test]
    fn test_execute_empty_response() {
        let transport = MemoryTransport::new();
        transport.set_execute_behavior(ExecuteBehavior::Empty);
        let client = Client::connect(&transport, "token", "us1").unwrap();
        let err = client.execute("p", 0, 1_000, 1_000).unwrap_err();
        assert!(err.to_string().contains("no computation"));
    }

    #[test]
    fn test_close_is_idempotent() {
        let transport = MemoryTransport::new();
        let client = Client::connect(&transport, "token", "us1").unwrap();
        client.close();
        client.close();
        assert!(client.is_closed());
        assert_eq!(transport.connection_stop_count(), 1);
        drop(client);
        assert_eq!(transport.connection_stop_count(), 1);
    }
}
