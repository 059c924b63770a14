//! In-process transport
//!
//! Stands in for the wire-protocol client when no backend is available:
//! executed programs get a `SubscriptionFeed` through which the caller pushes
//! messages and ends the stream. Connect, execute and stop outcomes are
//! scriptable and every call is recorded.

use crate::error::TransportError;
use crate::message::Message;
use crate::transport::{
    Connection, ErrorSink, ExecuteRequest, StopRequest, StreamTransport, Subscription,
};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How `Connection::execute` answers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExecuteBehavior {
    #[default]
    Accept,
    Reject(String),
    /// Accept the request but hand back no computation
    Empty,
}

/// How `Subscription::stop` behaves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopBehavior {
    /// Acknowledge and end the stream
    #[default]
    Ack,
    /// Return an error, leaving the stream open
    Fail,
    /// Acknowledge after a delay
    Delay(Duration),
    /// Block until `MemoryTransport::release_hung_stops`; after the release
    /// it acknowledges immediately
    Hang,
    Panic,
}

struct TransportState {
    connect_failure: Mutex<Option<String>>,
    connection_stop_failure: Mutex<Option<String>>,
    execute_behavior: Mutex<ExecuteBehavior>,
    stop_behavior: Mutex<StopBehavior>,
    connects: Mutex<Vec<String>>,
    executes: Mutex<Vec<ExecuteRequest>>,
    feeds: Mutex<VecDeque<SubscriptionFeed>>,
    error_sinks: Mutex<Vec<ErrorSink>>,
    connection_stops: AtomicUsize,
    /// Nothing is ever sent; dropping the sender releases hung stops
    hang_release: Mutex<Option<Sender<()>>>,
    hang_wait: Receiver<()>,
}

impl TransportState {
    fn new() -> Self {
        let (release, wait) = channel::bounded(0);
        Self {
            connect_failure: Mutex::new(None),
            connection_stop_failure: Mutex::new(None),
            execute_behavior: Mutex::new(ExecuteBehavior::default()),
            stop_behavior: Mutex::new(StopBehavior::default()),
            connects: Mutex::new(Vec::new()),
            executes: Mutex::new(Vec::new()),
            feeds: Mutex::new(VecDeque::new()),
            error_sinks: Mutex::new(Vec::new()),
            connection_stops: AtomicUsize::new(0),
            hang_release: Mutex::new(Some(release)),
            hang_wait: wait,
        }
    }
}

/// Scriptable transport that keeps everything in memory
#[derive(Clone)]
pub struct MemoryTransport {
    state: Arc<TransportState>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(TransportState::new()),
        }
    }

    /// Make the next `connect` calls fail with `reason`
    pub fn fail_connect(&self, reason: impl Into<String>) {
        *self.state.connect_failure.lock() = Some(reason.into());
    }

    /// Make `Connection::stop` fail with `reason`
    pub fn fail_connection_stop(&self, reason: impl Into<String>) {
        *self.state.connection_stop_failure.lock() = Some(reason.into());
    }

    pub fn set_execute_behavior(&self, behavior: ExecuteBehavior) {
        *self.state.execute_behavior.lock() = behavior;
    }

    /// Applies to subscriptions created after the call
    pub fn set_stop_behavior(&self, behavior: StopBehavior) {
        *self.state.stop_behavior.lock() = behavior;
    }

    /// Unblock every stop parked by `StopBehavior::Hang`
    pub fn release_hung_stops(&self) {
        self.state.hang_release.lock().take();
    }

    /// Endpoints passed to `connect`, in call order
    pub fn connect_calls(&self) -> Vec<String> {
        self.state.connects.lock().clone()
    }

    pub fn execute_calls(&self) -> Vec<ExecuteRequest> {
        self.state.executes.lock().clone()
    }

    pub fn connection_stop_count(&self) -> usize {
        self.state.connection_stops.load(Ordering::SeqCst)
    }

    /// Take the feed of the oldest executed program not yet taken
    pub fn take_feed(&self) -> Option<SubscriptionFeed> {
        self.state.feeds.lock().pop_front()
    }

    /// Deliver an asynchronous error to every connection's error sink
    pub fn emit_async_error(&self, error: TransportError) {
        let sinks = self.state.error_sinks.lock().clone();
        for sink in sinks {
            sink(error.clone());
        }
    }
}

impl StreamTransport for MemoryTransport {
    fn connect(
        &self,
        endpoint: &str,
        _token: &str,
        on_error: ErrorSink,
    ) -> Result<Box<dyn Connection>, TransportError> {
        self.state.connects.lock().push(endpoint.to_string());

        if let Some(reason) = self.state.connect_failure.lock().clone() {
            return Err(TransportError::Connect(reason));
        }

        self.state.error_sinks.lock().push(on_error);
        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
            stopped: AtomicBool::new(false),
        }))
    }
}

struct MemoryConnection {
    state: Arc<TransportState>,
    stopped: AtomicBool,
}

impl Connection for MemoryConnection {
    fn execute(
        &self,
        request: &ExecuteRequest,
    ) -> Result<Option<Arc<dyn Subscription>>, TransportError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.state.executes.lock().push(request.clone());

        match self.state.execute_behavior.lock().clone() {
            ExecuteBehavior::Reject(reason) => Err(TransportError::Rejected(reason)),
            ExecuteBehavior::Empty => Ok(None),
            ExecuteBehavior::Accept => {
                let (tx, rx) = channel::unbounded();
                let stream = Arc::new(StreamState {
                    sender: Mutex::new(Some(tx)),
                    receiver: rx,
                    stop_calls: AtomicUsize::new(0),
                });
                self.state.feeds.lock().push_back(SubscriptionFeed {
                    stream: Arc::clone(&stream),
                });
                Ok(Some(Arc::new(MemorySubscription {
                    stream,
                    stop_behavior: *self.state.stop_behavior.lock(),
                    state: Arc::clone(&self.state),
                })))
            }
        }
    }

    fn stop(&self, _request: &StopRequest) -> Result<(), TransportError> {
        self.state.connection_stops.fetch_add(1, Ordering::SeqCst);
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        match self.state.connection_stop_failure.lock().clone() {
            Some(reason) => Err(TransportError::Stop(reason)),
            None => Ok(()),
        }
    }
}

struct StreamState {
    /// The only sender; dropping it ends the stream
    sender: Mutex<Option<Sender<Message>>>,
    receiver: Receiver<Message>,
    stop_calls: AtomicUsize,
}

impl StreamState {
    fn finish(&self) {
        self.sender.lock().take();
    }
}

struct MemorySubscription {
    stream: Arc<StreamState>,
    stop_behavior: StopBehavior,
    state: Arc<TransportState>,
}

impl Subscription for MemorySubscription {
    fn messages(&self) -> Receiver<Message> {
        self.stream.receiver.clone()
    }

    fn stop(&self, _request: &StopRequest) -> Result<(), TransportError> {
        self.stream.stop_calls.fetch_add(1, Ordering::SeqCst);

        match self.stop_behavior {
            StopBehavior::Ack => {
                self.stream.finish();
                Ok(())
            }
            StopBehavior::Fail => Err(TransportError::Stop("backend refused stop".to_string())),
            StopBehavior::Delay(delay) => {
                std::thread::sleep(delay);
                self.stream.finish();
                Ok(())
            }
            StopBehavior::Hang => {
                let _ = self.state.hang_wait.recv();
                self.stream.finish();
                Ok(())
            }
            StopBehavior::Panic => panic!("subscription stop hit malformed channel state"),
        }
    }
}

/// Producer side of one executed program's stream
#[derive(Clone)]
pub struct SubscriptionFeed {
    stream: Arc<StreamState>,
}

impl SubscriptionFeed {
    /// Push a message; returns `false` once the stream has ended
    pub fn send(&self, message: Message) -> bool {
        match self.stream.sender.lock().as_ref() {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        }
    }

    pub fn send_all(&self, messages: impl IntoIterator<Item = Message>) -> bool {
        messages.into_iter().all(|message| self.send(message))
    }

    /// End the stream; consumers observe closure after draining
    pub fn finish(&self) {
        self.stream.finish();
    }

    pub fn is_finished(&self) -> bool {
        self.stream.sender.lock().is_none()
    }

    /// Number of times `Subscription::stop` reached the transport
    pub fn stop_count(&self) -> usize {
        self.stream.stop_calls.load(Ordering::SeqCst)
    }
}
