//! Client library for running streaming analytics programs.
//!
//! A [`Client`] owns the connection to the backend and starts programs; each
//! program is a [`Computation`] whose results are pulled one message at a time
//! with [`Computation::next`] or drained into per-series data with
//! [`Computation::collect`]. [`Computation::close`] is safe to call from any
//! thread, any number of times, and never blocks longer than two seconds.
//!
//! The wire protocol itself sits behind the [`transport`] traits.

mod client;
mod collect;
mod computation;
mod error;
mod message;
pub mod transport;

pub use client::{
    redact_token, Client, ClientOptions, DEFAULT_RESOLUTION, MIN_STOP_TIMEOUT, STOP_TIMEOUT,
};
pub use collect::{CollectResult, DataPoint};
pub use computation::{Computation, ComputationState};
pub use error::{ClientError, Result, TransportError};
pub use message::{DataMessage, Message, MetadataMessage, Payload, Value};
