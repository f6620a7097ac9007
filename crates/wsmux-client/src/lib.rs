//! Multiplexed real-time subscription client.
//!
//! A [`SubscriptionClient`] carries many independent subscriptions over one
//! link. Requests are correlated to their replies by sequence number, push
//! frames are routed to subscription handles by topic tag and payload
//! identity, and the set of active subscriptions is replayed whenever a new
//! link is attached, so handles stream continuously across reconnects.
//!
//! ```no_run
//! use wsmux_client::{ClientConfig, SubscriptionClient, Topic};
//! use wsmux_transport::{Endpoint, WebSocketConnector};
//!
//! # async fn run() -> wsmux_client::Result<()> {
//! let client = SubscriptionClient::new(ClientConfig::default());
//! let endpoint = Endpoint::from_base_url("http://localhost:8090/", Some("simulator"))?;
//! let _connection = client.connect(&WebSocketConnector::default(), &endpoint).await?;
//! client.wait_connected().await?;
//!
//! let (_reply, mut events) = client.subscribe(Topic::Events).await?;
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
mod correlator;
pub mod error;
pub mod payload;
mod registry;
mod router;
pub mod subscription;
pub mod topic;

/// Client-local identity of a subscription handle.
pub type SubscriptionId = u64;

pub use client::{Connection, SubscriptionClient};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use payload::{
    Alarm, ClientInfo, CommandQueue, CommandQueueEntry, CommandQueueEvent, ConnectionInfo, Event,
    InitialReply, Instance, LinkEvent, LinkInfo, NamedObjectId, ParameterData,
    ParameterSubscriptionReply, ParameterValue, Processor, Statistics, StreamData, StreamEvent,
    SubscribedParameter, TimeInfo, TopicEvent,
};
pub use subscription::Subscription;
pub use topic::{
    AlarmSubscriptionRequest, ParameterSubscriptionRequest, ProcessorSubscriptionRequest, Topic,
};
