//! The transport seam: one bidirectional connection to the talk endpoint.
//!
//! A [`Connector`] returns a [`TransportHandle`] immediately and drives the
//! actual socket on its own task. The two halves talk over channels: frames
//! go out as JSON text, and the socket side publishes a small closed set of
//! [`TransportEvent`]s. Dropping the handle is the unsubscribe, after which
//! nothing from that connection reaches its former owner.

use crate::{error::SessionError, protocol::ClientFrame};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

/// What the socket side reports, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Negotiation succeeded. Always published before any `Message`.
    Opened,
    /// One text message from the service.
    Message(String),
    /// The connection is gone. `error` is set when it ended through a
    /// failure (including failure to connect) rather than a normal close.
    Closed { error: Option<String> },
}

/// Opens connections. Failures are reported asynchronously as
/// [`TransportEvent::Closed`] on the returned handle.
pub trait Connector: Send + Sync {
    fn open(&self, address: &str) -> TransportHandle;
}

/// The owner's half of a connection.
#[derive(Debug)]
pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<String>,
    events: mpsc::Receiver<TransportEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    open: bool,
}

/// The socket's half of a connection, consumed by a [`Connector`] task.
#[derive(Debug)]
pub struct TransportPeer {
    /// Serialised frames to write to the socket.
    pub outbound: mpsc::UnboundedReceiver<String>,
    /// Where the socket side publishes what happened.
    pub events: mpsc::Sender<TransportEvent>,
    /// Resolves when the owner closes or drops its handle.
    pub shutdown: oneshot::Receiver<()>,
}

impl TransportHandle {
    /// Creates a connected handle/peer pair.
    pub fn pair(event_capacity: usize) -> (TransportHandle, TransportPeer) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(event_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        (
            TransportHandle {
                outbound: outbound_tx,
                events: events_rx,
                shutdown: Some(shutdown_tx),
                open: false,
            },
            TransportPeer {
                outbound: outbound_rx,
                events: events_tx,
                shutdown: shutdown_rx,
            },
        )
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Waits for the next event, tracking open/closed along the way.
    ///
    /// If the socket side disappears without saying goodbye this yields a
    /// `Closed` with an error, and `None` only after that.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        let event = match self.events.recv().await {
            Some(event) => event,
            None => {
                if self.shutdown.is_none() {
                    return None;
                }
                TransportEvent::Closed {
                    error: Some("transport ended without a close event".to_string()),
                }
            }
        };
        match &event {
            TransportEvent::Opened => self.open = true,
            TransportEvent::Closed { .. } => {
                self.open = false;
                self.shutdown = None;
            }
            TransportEvent::Message(_) => {}
        }
        Some(event)
    }

    /// Serialises and queues a frame. Returns `Ok(false)` when the frame was
    /// dropped because the connection is not open.
    pub fn send(&self, frame: &ClientFrame) -> Result<bool, SessionError> {
        if !self.open {
            debug!("Dropping frame, transport is not open");
            return Ok(false);
        }
        let text = frame.to_json()?;
        trace!(len = text.len(), "Queueing frame");
        Ok(self.outbound.send(text).is_ok())
    }

    /// Asks the socket side to close. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.open = false;
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
            debug!("Transport close requested");
        }
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.close();
    }
}
