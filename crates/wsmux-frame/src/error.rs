/// Errors that can occur during frame encoding/decoding.
///
/// Every variant describes a frame that cannot be used. Decoding callers
/// treat them as fatal to that single frame only.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame is valid JSON but does not follow the envelope layout.
    #[error("malformed frame: {reason}")]
    Malformed { reason: String },

    /// The frame is not valid JSON, or a body does not match its expected shape.
    #[error("frame json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The encoded frame exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

impl FrameError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
