//! Handles the WebSocket connection to the Play.ai talk endpoint.
//!
//! [`PlayAiConnector`] implements the core [`Connector`] seam on top of
//! tokio-tungstenite. Each `open` spawns one socket task that connects,
//! publishes `Opened`, and then proxies frames in both directions until either
//! side closes.

use futures_util::{SinkExt, StreamExt};
use playtalk_core::transport::{Connector, TransportEvent, TransportHandle, TransportPeer};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};
use tracing::{Instrument, debug, error, info, info_span, warn};

/// How many undelivered events a socket task may queue for its owner.
const EVENT_CAPACITY: usize = 64;

/// Opens talk sessions over WebSocket (`ws://` or `wss://`).
#[derive(Debug, Clone, Default)]
pub struct PlayAiConnector;

impl PlayAiConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for PlayAiConnector {
    /// Must be called from within a tokio runtime.
    fn open(&self, address: &str) -> TransportHandle {
        let (handle, peer) = TransportHandle::pair(EVENT_CAPACITY);
        let span = info_span!("playai_socket", address = %redact_query(address));
        tokio::spawn(run_socket(address.to_string(), peer).instrument(span));
        handle
    }
}

/// Runs one connection from negotiation to close.
async fn run_socket(address: String, peer: TransportPeer) {
    let TransportPeer {
        mut outbound,
        events,
        mut shutdown,
    } = peer;

    let ws_stream = tokio::select! {
        result = connect_async(address.as_str()) => match result {
            Ok((stream, response)) => {
                info!(status = %response.status(), "Connected to Play.ai.");
                stream
            }
            Err(e) => {
                error!(error = %e, "Failed to connect to Play.ai WebSocket");
                let _ = events
                    .send(TransportEvent::Closed { error: Some(e.to_string()) })
                    .await;
                return;
            }
        },
        _ = &mut shutdown => {
            debug!("Connection abandoned before it opened.");
            return;
        }
    };

    // Opened goes out before the first read, so no message can overtake it.
    if events.send(TransportEvent::Opened).await.is_err() {
        return;
    }
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let error = loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                debug!("Closing connection on request.");
                if let Err(e) = ws_tx.send(WsMessage::Close(None)).await {
                    debug!(error = %e, "Close frame not delivered");
                }
                break None;
            }
            Some(text) = outbound.recv() => {
                if let Err(e) = ws_tx.send(WsMessage::Text(text.into())).await {
                    error!(error = %e, "Failed to send frame to Play.ai");
                    break Some(e.to_string());
                }
            }
            incoming = ws_rx.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    if events.send(TransportEvent::Message(text.to_string())).await.is_err() {
                        break None;
                    }
                }
                Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => {
                        if events.send(TransportEvent::Message(text)).await.is_err() {
                            break None;
                        }
                    }
                    Err(_) => warn!(len = bytes.len(), "Ignoring non-UTF-8 binary message"),
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    info!(?frame, "Play.ai closed the connection.");
                    break None;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(error = %e, "Error receiving from Play.ai WebSocket");
                    break Some(e.to_string());
                }
                None => break None,
            },
        }
    };

    let _ = events.send(TransportEvent::Closed { error }).await;
    info!("Play.ai connection finished.");
}

/// Drops any query string before an address is logged.
fn redact_query(address: &str) -> &str {
    address.split('?').next().unwrap_or(address)
}
