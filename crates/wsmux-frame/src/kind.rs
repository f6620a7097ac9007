//! Message kinds and protocol constants.
//!
//! Kind codes 1-4 are the only ones defined by protocol version 1.

/// Protocol version written into every outbound frame.
pub const PROTOCOL_VERSION: u32 = 1;

/// The second element of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Client-issued request, carries a fresh sequence number.
    Request,
    /// Successful terminal answer to a request.
    Reply,
    /// Failed terminal answer to a request.
    Exception,
    /// Unsolicited push data tagged with a topic.
    Data,
}

impl MessageKind {
    /// Wire code for this kind.
    pub fn code(self) -> u8 {
        match self {
            MessageKind::Request => 1,
            MessageKind::Reply => 2,
            MessageKind::Exception => 3,
            MessageKind::Data => 4,
        }
    }

    /// Parse a wire code. Returns `None` for codes outside 1-4.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(MessageKind::Request),
            2 => Some(MessageKind::Reply),
            3 => Some(MessageKind::Exception),
            4 => Some(MessageKind::Data),
            _ => None,
        }
    }

    /// Human-readable name, used in logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            MessageKind::Request => "REQUEST",
            MessageKind::Reply => "REPLY",
            MessageKind::Exception => "EXCEPTION",
            MessageKind::Data => "DATA",
        }
    }

    /// Returns true if this kind ends a request (reply or exception).
    pub fn is_terminal(self) -> bool {
        matches!(self, MessageKind::Reply | MessageKind::Exception)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
