use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::traits::{CloseReason, Connector, Link, Outbound, TransportEvent};

/// Default maximum inbound message size: 16 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Configuration for WebSocket connections.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Maximum inbound message size in bytes. Default: 16 MiB.
    pub max_message_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// WebSocket transport.
///
/// Each [`connect`](Connector::connect) opens one socket and spawns a task
/// that owns it exclusively: outbound messages are written in queue order,
/// inbound text messages are forwarded as [`TransportEvent::Message`], and a
/// single [`TransportEvent::Closed`] ends the event stream.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    config: TransportConfig,
}

impl WebSocketConnector {
    /// Create a connector with explicit configuration.
    pub fn with_config(config: TransportConfig) -> Self {
        Self { config }
    }
}

impl Connector for WebSocketConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Link> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_message_size);

        let (socket, _response) =
            tokio_tungstenite::connect_async_with_config(endpoint.as_str(), Some(ws_config), false)
                .await
                .map_err(|source| TransportError::Connect {
                    url: endpoint.to_string(),
                    source: Box::new(source),
                })?;
        info!(endpoint = %endpoint, "websocket connected");

        let (link, outbound, events) = Link::channel();
        let _ = events.send(TransportEvent::Opened);
        tokio::spawn(run_socket(socket, outbound, events));
        Ok(link)
    }
}

async fn run_socket(
    socket: Socket,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let (mut sink, mut stream) = socket.split();

    let reason = loop {
        tokio::select! {
            cmd = outbound.recv() => match cmd {
                Some(Outbound::Text(text)) => {
                    if let Err(err) = sink.send(Message::Text(text)).await {
                        break CloseReason::error(err);
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.close().await;
                    break CloseReason::local();
                }
            },
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Message(text));
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => {
                        let _ = events.send(TransportEvent::Message(text));
                    }
                    Err(_) => warn!("dropping non-utf8 binary message"),
                },
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(frame) => {
                            CloseReason::remote(Some(u16::from(frame.code)), frame.reason.to_string())
                        }
                        None => CloseReason::remote(None, "closed by server"),
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => break CloseReason::error(err),
                None => break CloseReason::remote(None, "stream ended"),
            },
        }
    };

    // Reject further sends before announcing the closure.
    outbound.close();
    debug!(%reason, "websocket closed");
    let _ = events.send(TransportEvent::Closed(reason));
}
