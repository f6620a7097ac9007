/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] wsmux_transport::TransportError),

    /// A frame could not be encoded or decoded.
    #[error("frame error: {0}")]
    Frame(#[from] wsmux_frame::FrameError),

    /// JSON serialization/deserialization error in a topic payload.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// No live connection; nothing was sent.
    #[error("not connected")]
    NotConnected,

    /// The connection closed while the request was pending.
    #[error("connection lost")]
    ConnectionLost,

    /// The server answered with an EXCEPTION frame.
    #[error("server exception {kind}: {message}")]
    ServerException { kind: String, message: String },

    /// A reply did not carry the payload its topic requires.
    #[error("unexpected reply for '{topic}': {reason}")]
    UnexpectedReply { topic: String, reason: String },

    /// The client has been closed.
    #[error("client closed")]
    Closed,
}

impl ClientError {
    /// Server-declared error kind, for [`ClientError::ServerException`].
    pub fn server_kind(&self) -> Option<&str> {
        match self {
            ClientError::ServerException { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
