use std::fmt;
use std::future::Future;

use tokio::sync::mpsc;

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};

/// Lifecycle and data events reported by a live connection, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The physical connection is open. Always the first event of a link.
    Opened,
    /// One complete inbound text message.
    Message(String),
    /// The connection is gone. Always the last event of a link.
    Closed(CloseReason),
}

/// Why a connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// Close code sent by the remote side, if any.
    pub code: Option<u16>,
    /// Free-form description.
    pub reason: String,
}

impl CloseReason {
    /// Closed by a remote close handshake or end of stream.
    pub fn remote(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Closed because the local side asked for it.
    pub fn local() -> Self {
        Self {
            code: None,
            reason: "closed locally".to_string(),
        }
    }

    /// Closed because of an I/O or protocol error.
    pub fn error(err: impl fmt::Display) -> Self {
        Self {
            code: None,
            reason: err.to_string(),
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {code})", self.reason),
            None => f.write_str(&self.reason),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Outbound {
    Text(String),
    Close,
}

/// Outbound half of a [`Link`].
///
/// Cloneable; all clones feed the same serialized write queue. Sends never
/// block and fail with [`TransportError::NotConnected`] once the connection
/// has closed.
#[derive(Debug, Clone)]
pub struct LinkSender {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl LinkSender {
    /// Queue a text message for sending.
    pub fn send(&self, text: String) -> Result<()> {
        self.tx
            .send(Outbound::Text(text))
            .map_err(|_| TransportError::NotConnected)
    }

    /// Ask the connection to close. Idempotent.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    /// Returns true once the connection can no longer send.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// One live connection: an outbound sender and the inbound event stream.
#[derive(Debug)]
pub struct Link {
    sender: LinkSender,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Link {
    pub(crate) fn channel() -> (
        Self,
        mpsc::UnboundedReceiver<Outbound>,
        mpsc::UnboundedSender<TransportEvent>,
    ) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        let link = Self {
            sender: LinkSender { tx: out_tx },
            events: ev_rx,
        };
        (link, out_rx, ev_tx)
    }

    /// Borrow the outbound sender.
    pub fn sender(&self) -> &LinkSender {
        &self.sender
    }

    /// Wait for the next event. Returns `None` after the connection task is gone.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Split into sender and event stream.
    pub fn into_parts(self) -> (LinkSender, mpsc::UnboundedReceiver<TransportEvent>) {
        (self.sender, self.events)
    }
}

/// Opens links to an endpoint.
///
/// This is the seam between the protocol client and the physical transport:
/// production code uses [`crate::WebSocketConnector`], tests use
/// [`crate::MemoryConnector`].
pub trait Connector: Send + Sync {
    /// Open one connection. The returned link starts with [`TransportEvent::Opened`].
    fn connect(&self, endpoint: &Endpoint) -> impl Future<Output = Result<Link>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_fails_after_receiver_dropped() {
        let (link, out_rx, _ev_tx) = Link::channel();
        link.sender().send("one".to_string()).unwrap();
        drop(out_rx);
        assert!(link.sender().is_closed());
        let err = link.sender().send("two".to_string()).unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }

    #[test]
    fn close_reason_display() {
        assert_eq!(
            CloseReason::remote(Some(1001), "going away").to_string(),
            "going away (code 1001)"
        );
        assert_eq!(CloseReason::local().to_string(), "closed locally");
    }

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (mut link, _out_rx, ev_tx) = Link::channel();
        ev_tx.send(TransportEvent::Opened).unwrap();
        ev_tx.send(TransportEvent::Message("a".into())).unwrap();
        ev_tx
            .send(TransportEvent::Closed(CloseReason::local()))
            .unwrap();
        drop(ev_tx);

        assert_eq!(link.next_event().await, Some(TransportEvent::Opened));
        assert_eq!(
            link.next_event().await,
            Some(TransportEvent::Message("a".into()))
        );
        assert!(matches!(
            link.next_event().await,
            Some(TransportEvent::Closed(_))
        ));
        assert_eq!(link.next_event().await, None);
    }
}
