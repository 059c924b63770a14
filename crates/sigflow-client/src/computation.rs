// Copyright 2026 Sigflow Developers
// SPDX-License-Identifier: Apache-2.0

//! A single running program and its result stream
//!
//! A `Computation` exclusively owns one subscription handle. Consumption
//! (`next`, `collect`) and shutdown (`close`) take `&self`, so one computation
//! can be shared between a consumer thread and a cleanup path.
//!
//! Shutdown contract:
//! 1. The first `close` takes the handle out of its slot under the lock.
//!    Later or concurrent calls find the slot empty and return at once.
//! 2. The remote stop runs on its own thread inside `catch_unwind`.
//! 3. `close` waits for that thread or for the stop timeout, whichever comes
//!    first, and returns `Ok(())` either way. A stop that never returns is
//!    left running detached.

use crate::client::{ClientOptions, MIN_STOP_TIMEOUT, STOP_TIMEOUT};
use crate::collect::CollectResult;
use crate::error::Result;
use crate::message::Message;
use crate::transport::{StopRequest, Subscription};
use crossbeam::channel::{self, select, Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

static NEXT_COMPUTATION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputationState {
    /// Handle present; consumption allowed
    Open,
    /// Handle taken by `close`; remote stop in flight
    Stopping,
    /// Terminal
    Stopped,
}

struct Slot {
    subscription: Option<Arc<dyn Subscription>>,
    state: ComputationState,
}

/// A running program whose results are consumed through `next` or `collect`
pub struct Computation {
    id: u64,
    slot: Mutex<Slot>,
    /// Captured at creation; multi-consumer, so concurrent `next` calls
    /// each see distinct messages
    messages: Receiver<Message>,
    /// Latched once the transport disconnects the stream
    exhausted: AtomicBool,
    options: ClientOptions,
}

impl Computation {
    pub(crate) fn new(subscription: Arc<dyn Subscription>, options: ClientOptions) -> Self {
        let messages = subscription.messages();
        Self {
            id: NEXT_COMPUTATION_ID.fetch_add(1, Ordering::Relaxed),
            slot: Mutex::new(Slot {
                subscription: Some(subscription),
                state: ComputationState::Open,
            }),
            messages,
            exhausted: AtomicBool::new(false),
            options,
        }
    }

    /// Process-unique id, used in log lines
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ComputationState {
        self.slot.lock().state
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().subscription.is_none()
    }

    /// `true` once the stream has been read to its end
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Acquire)
    }

    /// Block until the next message arrives or the stream ends
    ///
    /// Returns `None` once the stream is exhausted or the computation has been
    /// closed, and keeps returning `None` without blocking afterwards. No
    /// timeout applies: if the transport never ends the stream this waits
    /// forever.
    pub fn next(&self) -> Option<Message> {
        if self.is_exhausted() || self.is_closed() {
            return None;
        }

        match self.messages.recv() {
            Ok(message) => {
                trace!(computation = self.id, kind = message.kind(), "received message");
                Some(message)
            }
            Err(_) => {
                self.mark_exhausted();
                None
            }
        }
    }

    /// Drain the stream into a per-series mapping
    ///
    /// Blocks until the stream ends, unless a collect deadline is configured
    /// in `ClientOptions`. On a closed computation returns an error-flagged
    /// empty result immediately.
    pub fn collect(&self) -> CollectResult {
        let deadline = self
            .options
            .collect_deadline
            .map(|budget| Instant::now() + budget);
        self.drain(deadline)
    }

    /// Like `collect`, but stops reading at `deadline`
    ///
    /// A result cut short by the deadline has `timed_out` set and the
    /// computation stays open.
    pub fn collect_until(&self, deadline: Instant) -> CollectResult {
        self.drain(Some(deadline))
    }

    fn drain(&self, deadline: Option<Instant>) -> CollectResult {
        if self.is_closed() {
            warn!(computation = self.id, "collect called on a closed computation");
            return CollectResult::error("computation is closed");
        }

        let mut result = CollectResult::default();
        if self.is_exhausted() {
            return result;
        }

        loop {
            let received = match deadline {
                Some(deadline) => self.messages.recv_deadline(deadline),
                None => self
                    .messages
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(message) => result.absorb(message),
                Err(RecvTimeoutError::Disconnected) => {
                    self.mark_exhausted();
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        computation = self.id,
                        "collect deadline reached before end of stream"
                    );
                    result.timed_out = true;
                    break;
                }
            }
        }

        debug!(
            computation = self.id,
            series = result.data.len(),
            points = result.point_count(),
            "collected computation data"
        );
        result
    }

    fn mark_exhausted(&self) {
        if !self.exhausted.swap(true, Ordering::AcqRel) {
            debug!(computation = self.id, "stream ended");
        }
    }

    /// Take the handle out of the slot; only the first caller gets it
    fn take_subscription(&self) -> Option<Arc<dyn Subscription>> {
        let mut slot = self.slot.lock();
        let subscription = slot.subscription.take();
        if subscription.is_some() {
            slot.state = ComputationState::Stopping;
        }
        subscription
    }

    fn mark_stopped(&self) {
        self.slot.lock().state = ComputationState::Stopped;
    }

    /// Stop the computation
    ///
    /// Returns within the configured stop timeout (at most 2 seconds) even if
    /// the transport's stop hangs, fails or panics. Always `Ok(())`; failures
    /// are logged. Calling it again, from any thread, does nothing.
    pub fn close(&self) -> Result<()> {
        let Some(subscription) = self.take_subscription() else {
            return Ok(());
        };

        let id = self.id;
        let timeout = self.options.stop_timeout.clamp(MIN_STOP_TIMEOUT, STOP_TIMEOUT);
        debug!(computation = id, ?timeout, "stopping computation");

        let (done_tx, done_rx) = channel::bounded::<()>(1);
        let spawned = thread::Builder::new()
            .name(format!("sigflow-stop-{}", id))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    subscription.stop(&StopRequest::default())
                }));
                match outcome {
                    Ok(Ok(())) => debug!(computation = id, "computation stop acknowledged"),
                    Ok(Err(e)) => warn!(computation = id, "Ignoring computation stop error: {}", e),
                    Err(payload) => error!(
                        computation = id,
                        "Recovered from panic in computation stop: {}",
                        panic_message(payload.as_ref())
                    ),
                }
                let _ = done_tx.send(());
            });

        if let Err(e) = spawned {
            warn!(computation = id, "Could not spawn stop thread, abandoning stop: {}", e);
            self.mark_stopped();
            return Ok(());
        }

        select! {
            recv(done_rx) -> _ => {}
            recv(channel::after(timeout)) -> _ => {
                warn!(computation = id, ?timeout, "Timeout while stopping computation");
            }
        }

        self.mark_stopped();
        info!(computation = id, "computation closed");
        Ok(())
    }
}

impl Drop for Computation {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for Computation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("exhausted", &self.is_exhausted())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
