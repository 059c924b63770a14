//! Boundary to the streaming wire-protocol client
//!
//! The protocol client (authentication, websocket framing, payload decoding)
//! lives behind these traits. `Client` and `Computation` only orchestrate it.

pub mod memory;

use crate::error::TransportError;
use crate::message::Message;
use chrono::{DateTime, Utc};
use crossbeam::channel::Receiver;
use std::sync::Arc;
use std::time::Duration;

/// Callback for errors the transport hits outside any request
pub type ErrorSink = Arc<dyn Fn(TransportError) + Send + Sync>;

/// Derive the streaming endpoint for a realm
pub fn stream_url_for_realm(realm: &str) -> String {
    format!("wss://stream.{}.signalfx.com/v2/signalflow", realm)
}

/// Request to start a program
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteRequest {
    pub program: String,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    pub resolution: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopRequest {
    pub reason: Option<String>,
}

/// Opens authenticated connections to the backend
pub trait StreamTransport: Send + Sync {
    fn connect(
        &self,
        endpoint: &str,
        token: &str,
        on_error: ErrorSink,
    ) -> Result<Box<dyn Connection>, TransportError>;
}

/// An open connection able to run programs
pub trait Connection: Send + Sync {
    /// Start a program. `Ok(None)` means the backend accepted the request but
    /// produced no computation.
    fn execute(
        &self,
        request: &ExecuteRequest,
    ) -> Result<Option<Arc<dyn Subscription>>, TransportError>;

    fn stop(&self, request: &StopRequest) -> Result<(), TransportError>;
}

/// A running computation's result stream
pub trait Subscription: Send + Sync {
    /// Receiver of stream messages; disconnected once the stream ends
    fn messages(&self) -> Receiver<Message>;

    /// Ask the backend to stop the computation.
    ///
    /// May block for an unbounded time and may panic.
    fn stop(&self, request: &StopRequest) -> Result<(), TransportError>;
}
