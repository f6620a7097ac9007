//! Full-duplex message transport for wsmux.
//!
//! A transport owns one physical connection and exposes it as a [`Link`]:
//! - a cloneable [`LinkSender`] for outbound text messages
//! - an ordered stream of [`TransportEvent`]s (opened, message, closed)
//!
//! Payloads are never interpreted here. Reconnection is not attempted either;
//! whoever owns the [`Connector`] decides when to connect again.

pub mod endpoint;
pub mod error;
pub mod memory;
pub mod traits;
pub mod websocket;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use memory::{MemoryConnector, MemoryServer};
pub use traits::{CloseReason, Connector, Link, LinkSender, TransportEvent};
pub use websocket::{TransportConfig, WebSocketConnector, DEFAULT_MAX_MESSAGE_SIZE};
