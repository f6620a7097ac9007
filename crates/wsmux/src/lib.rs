//! Multiplexed real-time subscriptions over a single WebSocket.
//!
//! One persistent connection carries many independent subscriptions (events,
//! alarms, parameter samples, link status, command queues and more). Replies
//! are correlated to requests, pushes are routed to the subscriptions they
//! belong to, and every subscription is restored transparently after a
//! reconnect.
//!
//! # Crate Structure
//!
//! - [`frame`] — Wire envelope codec
//! - [`transport`] — Connection abstraction (WebSocket, in-memory)
//! - [`client`] — Subscription client with replay (behind `client` feature)

/// Re-export frame types.
pub mod frame {
    pub use wsmux_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use wsmux_transport::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use wsmux_client::*;
}
