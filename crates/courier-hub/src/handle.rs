//! Writable side of one duplex connection.
//!
//! A [`ConnectionHandle`] wraps any [`Sink`] of JSON text frames behind an
//! async mutex so that the notifier and the connection's own receive loop
//! (which answers pings) can both write to it while per-connection write
//! order is preserved.
//!
//! Two constructors exist:
//!
//! - [`ConnectionHandle::new`] for a transport sink (the gateway passes the
//!   write half of an accepted `WebSocket`)
//! - [`ConnectionHandle::channel`] for an in-process listener reading from
//!   a bounded [`mpsc`] channel
//!
//! Every write is bounded by a deadline. A write that errors or times out is
//! reported as [`DeliveryFailed`]; the handle is not retried.
//!
//! [`ConnectionHandle::close`] ends a connection from the server side. It
//! trips a signal that the connection's receive loop waits on through
//! [`ConnectionHandle::closed`], so a peer that has been evicted is also
//! disconnected and will reconnect.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use courier_types::{ConnectionId, Event};
use futures::channel::mpsc;
use futures::{Sink, SinkExt};
use tokio::sync::{Mutex, watch};

use crate::error::DeliveryFailed;

type FrameSink = Pin<Box<dyn Sink<String, Error = String> + Send>>;

/// A live, writable connection to one peer.
///
/// Cloning a handle yields another reference to the same connection, not a
/// new connection. The registry owns the handle it was given; the receive
/// loop keeps one clone to answer pings.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sink: Arc<Mutex<FrameSink>>,
    closed: Arc<watch::Sender<bool>>,
}

impl ConnectionHandle {
    /// Wrap a transport sink that accepts JSON text frames.
    pub fn new<S>(sink: S) -> Self
    where
        S: Sink<String> + Send + 'static,
        S::Error: fmt::Display,
    {
        let sink: FrameSink = Box::pin(sink.sink_map_err(|e| e.to_string()));
        Self {
            id: ConnectionId::new(),
            sink: Arc::new(Mutex::new(sink)),
            closed: Arc::new(watch::channel(false).0),
        }
    }

    /// Create a handle backed by a bounded in-process channel.
    ///
    /// Returns the handle and the receiving end. Dropping the receiver makes
    /// every later write fail, which is how an in-process listener
    /// disconnects.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// The unique identifier of this connection.
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether [`ConnectionHandle::close`] has been called on any clone.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Close the connection from the server side.
    ///
    /// Marks the handle closed, waking every [`ConnectionHandle::closed`]
    /// waiter, then tries to close the sink within `deadline`. A sink that
    /// fails or stalls while closing is left to be dropped with the last
    /// clone. Closing twice is a no-op.
    pub async fn close(&self, deadline: Duration) {
        if self.closed.send_replace(true) {
            return;
        }
        let close = async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };
        match tokio::time::timeout(deadline, close).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(connection = %self.id, error = %e, "close failed"),
            Err(_elapsed) => tracing::debug!(connection = %self.id, "close timed out"),
        }
    }

    /// Resolve once the connection has been closed through any clone.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        // The sender lives in `self`, so this cannot fail before the close.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Serialize `event` and write it as one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryFailed::Serialization`] if the event cannot be
    /// encoded, otherwise the errors of [`ConnectionHandle::send_text`].
    pub async fn send(&self, event: &Event, deadline: Duration) -> Result<(), DeliveryFailed> {
        let text = event.to_json()?;
        self.send_text(text, deadline).await
    }

    /// Write one pre-encoded text frame.
    ///
    /// The deadline covers waiting for a concurrent writer on the same
    /// connection as well as the write itself.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryFailed::Transport`] if the sink rejects the frame
    /// and [`DeliveryFailed::TimedOut`] if the deadline elapses first.
    pub async fn send_text(&self, text: String, deadline: Duration) -> Result<(), DeliveryFailed> {
        let write = async {
            let mut sink = self.sink.lock().await;
            sink.send(text).await
        };

        match tokio::time::timeout(deadline, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DeliveryFailed::Transport(e)),
            Err(_elapsed) => Err(DeliveryFailed::TimedOut(deadline)),
        }
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
