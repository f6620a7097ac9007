use wsmux_frame::FrameConfig;

/// Configuration for a [`crate::SubscriptionClient`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Codec settings applied to every frame sent and received.
    pub frame: FrameConfig,
}
