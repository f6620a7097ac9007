//! In-process transport.
//!
//! [`MemoryServer::link`] produces a client [`Link`] wired to a scripted
//! server handle, so protocol behaviour (replies, pushes, disconnects) can be
//! driven without sockets.

use tokio::sync::mpsc;
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::traits::{CloseReason, Connector, Link, Outbound, TransportEvent};

/// Server side of an in-memory link.
#[derive(Debug)]
pub struct MemoryServer {
    inbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl MemoryServer {
    /// Create a connected client link and its server handle.
    ///
    /// The link's first event is already [`TransportEvent::Opened`].
    pub fn link() -> (Link, MemoryServer) {
        let (link, inbound, events) = Link::channel();
        let _ = events.send(TransportEvent::Opened);
        (link, MemoryServer { inbound, events })
    }

    /// Push one text message to the client.
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.events
            .send(TransportEvent::Message(text.into()))
            .map_err(|_| TransportError::NotConnected)
    }

    /// Wait for the next message written by the client.
    ///
    /// Returns `None` once the client closed the link or dropped every sender.
    pub async fn recv_text(&mut self) -> Option<String> {
        match self.inbound.recv().await? {
            Outbound::Text(text) => Some(text),
            Outbound::Close => None,
        }
    }

    /// Return a message the client already wrote, without waiting.
    pub fn try_recv_text(&mut self) -> Option<String> {
        match self.inbound.try_recv().ok()? {
            Outbound::Text(text) => Some(text),
            Outbound::Close => None,
        }
    }

    /// Drop the connection: further client sends fail and the client
    /// observes [`TransportEvent::Closed`].
    pub fn close(&mut self, reason: &str) {
        self.inbound.close();
        debug!(reason, "memory link closed by server");
        let _ = self
            .events
            .send(TransportEvent::Closed(CloseReason::remote(None, reason)));
    }
}

/// Connector that hands every new server handle to the test.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    servers: mpsc::UnboundedSender<MemoryServer>,
}

impl MemoryConnector {
    /// Create a connector and the receiver of the server side of each connection.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MemoryServer>) {
        let (servers, rx) = mpsc::unbounded_channel();
        (Self { servers }, rx)
    }
}

impl Connector for MemoryConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Link> {
        let (link, server) = MemoryServer::link();
        self.servers
            .send(server)
            .map_err(|_| TransportError::Shutdown)?;
        debug!(endpoint = %endpoint, "memory link opened");
        Ok(link)
    }
}
