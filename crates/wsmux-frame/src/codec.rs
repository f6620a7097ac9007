use serde_json::Value;

use crate::body::{DataBody, ExceptionBody, ReplyBody, RequestBody};
use crate::error::{FrameError, Result};
use crate::kind::{MessageKind, PROTOCOL_VERSION};

/// Default maximum encoded frame size: 16 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Number of elements in the envelope array.
const ENVELOPE_LEN: usize = 4;

/// One message exchanged over the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Protocol version of the sender.
    pub version: u32,
    /// Kind of message.
    pub kind: MessageKind,
    /// Request sequence. `0` for DATA frames.
    pub sequence: u64,
    /// Kind-specific body object.
    pub body: Value,
}

impl Frame {
    /// Create a REQUEST frame.
    pub fn request(sequence: u64, body: &RequestBody) -> Self {
        Self::new(MessageKind::Request, sequence, body.to_value())
    }

    /// Create a REPLY frame.
    pub fn reply(sequence: u64, body: &ReplyBody) -> Result<Self> {
        Ok(Self::new(MessageKind::Reply, sequence, to_object(body)?))
    }

    /// Create an EXCEPTION frame.
    pub fn exception(sequence: u64, body: &ExceptionBody) -> Result<Self> {
        Ok(Self::new(MessageKind::Exception, sequence, to_object(body)?))
    }

    /// Create a DATA frame.
    pub fn data(body: &DataBody) -> Result<Self> {
        Ok(Self::new(MessageKind::Data, 0, to_object(body)?))
    }

    fn new(kind: MessageKind, sequence: u64, body: Value) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            kind,
            sequence,
            body,
        }
    }

    /// Interpret the body as a request.
    pub fn request_body(&self) -> Result<RequestBody> {
        self.expect_kind(MessageKind::Request)?;
        RequestBody::from_value(&self.body)
    }

    /// Interpret the body as a reply.
    pub fn reply_body(&self) -> Result<ReplyBody> {
        self.expect_kind(MessageKind::Reply)?;
        Ok(serde_json::from_value(self.body.clone())?)
    }

    /// Interpret the body as an exception.
    pub fn exception_body(&self) -> Result<ExceptionBody> {
        self.expect_kind(MessageKind::Exception)?;
        Ok(serde_json::from_value(self.body.clone())?)
    }

    /// Interpret the body as push data.
    pub fn data_body(&self) -> Result<DataBody> {
        self.expect_kind(MessageKind::Data)?;
        Ok(serde_json::from_value(self.body.clone())?)
    }

    fn expect_kind(&self, expected: MessageKind) -> Result<()> {
        if self.kind == expected {
            Ok(())
        } else {
            Err(FrameError::malformed(format!(
                "expected {expected} frame, got {}",
                self.kind
            )))
        }
    }
}

fn to_object<T: serde::Serialize>(body: &T) -> Result<Value> {
    let value = serde_json::to_value(body)?;
    if !value.is_object() {
        return Err(FrameError::malformed("frame body must be an object"));
    }
    Ok(value)
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Version written into encoded frames. Default: [`PROTOCOL_VERSION`].
    pub protocol_version: u32,
    /// Maximum encoded frame size in bytes. Default: 16 MiB.
    pub max_frame_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Encode a frame into its wire text.
///
/// Wire format:
/// ```text
/// [ version, kind, sequence, { body } ]
///   e.g. [1,1,7,{"parameter":"subscribe","data":{"id":[...]}}]
/// ```
///
/// The frame's own `version` is ignored; the configured protocol version is
/// written instead.
pub fn encode_frame(frame: &Frame, config: &FrameConfig) -> Result<String> {
    if !frame.body.is_object() {
        return Err(FrameError::malformed("frame body must be an object"));
    }
    let text = serde_json::to_string(&(
        config.protocol_version,
        frame.kind.code(),
        frame.sequence,
        &frame.body,
    ))?;
    if text.len() > config.max_frame_size {
        return Err(FrameError::PayloadTooLarge {
            size: text.len(),
            max: config.max_frame_size,
        });
    }
    Ok(text)
}

/// Decode wire text into a frame.
///
/// Any deviation from the four-element envelope is reported as
/// [`FrameError::Malformed`]; nothing is partially decoded.
pub fn decode_frame(raw: &str, config: &FrameConfig) -> Result<Frame> {
    if raw.len() > config.max_frame_size {
        return Err(FrameError::PayloadTooLarge {
            size: raw.len(),
            max: config.max_frame_size,
        });
    }

    let value: Value = serde_json::from_str(raw)?;
    let Value::Array(items) = value else {
        return Err(FrameError::malformed("frame is not an array"));
    };
    if items.len() != ENVELOPE_LEN {
        return Err(FrameError::malformed(format!(
            "frame has {} elements (expected {ENVELOPE_LEN})",
            items.len()
        )));
    }

    let mut items = items.into_iter();
    let (Some(version), Some(kind), Some(sequence), Some(body)) =
        (items.next(), items.next(), items.next(), items.next())
    else {
        return Err(FrameError::malformed("frame envelope truncated"));
    };

    let version = version
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| FrameError::malformed("protocol version is not an unsigned integer"))?;
    if version != config.protocol_version {
        return Err(FrameError::malformed(format!(
            "protocol version {version} (expected {})",
            config.protocol_version
        )));
    }

    let code = kind
        .as_u64()
        .ok_or_else(|| FrameError::malformed("message kind is not an unsigned integer"))?;
    let kind = MessageKind::from_code(code)
        .ok_or_else(|| FrameError::malformed(format!("unknown message kind {code}")))?;

    let sequence = match sequence {
        Value::Null if kind == MessageKind::Data => 0,
        other => other
            .as_u64()
            .ok_or_else(|| FrameError::malformed("sequence is not an unsigned integer"))?,
    };

    if !body.is_object() {
        return Err(FrameError::malformed("frame body is not an object"));
    }

    Ok(Frame {
        version,
        kind,
        sequence,
        body,
    })
}
