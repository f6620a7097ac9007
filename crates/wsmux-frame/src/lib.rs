//! Wire envelope for the multiplexed subscription protocol.
//!
//! Every message on the connection is a JSON array of exactly four elements:
//! - protocol version (integer, currently `1`)
//! - message kind (`1` request, `2` reply, `3` exception, `4` data)
//! - request sequence (echoed by replies and exceptions, unused by data)
//! - body object, whose shape depends on the kind
//!
//! This crate is stateless: it only turns [`Frame`] values into text and back.

pub mod body;
pub mod codec;
pub mod error;
pub mod kind;

pub use body::{DataBody, ExceptionBody, ReplyBody, RequestBody};
pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_FRAME_SIZE};
pub use error::{FrameError, Result};
pub use kind::{MessageKind, PROTOCOL_VERSION};
