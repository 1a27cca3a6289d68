//! Well-known frame kinds.
//!
//! The discriminator space is open-ended: anything the server sends that is
//! not listed here is carried as [`FrameKind::Other`] and can still be routed
//! to handlers by its raw string.

use std::fmt;

/// Frame kinds as seen on the RTM connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Sent by the server once the connection is established
    Hello,
    /// Liveness probe sent by the client
    Ping,
    /// Liveness reply sent by the server
    Pong,
    /// A chat message event
    Message,
    /// Server-side error report
    Error,
    /// Server is about to close the connection
    Goodbye,
    /// Any other discriminator
    Other(String),
}

impl FrameKind {
    /// The discriminator string as it appears in the `type` field
    pub fn as_str(&self) -> &str {
        match self {
            FrameKind::Hello => "hello",
            FrameKind::Ping => "ping",
            FrameKind::Pong => "pong",
            FrameKind::Message => "message",
            FrameKind::Error => "error",
            FrameKind::Goodbye => "goodbye",
            FrameKind::Other(s) => s,
        }
    }

    /// Map a raw discriminator onto a kind
    pub fn parse(value: &str) -> Self {
        match value {
            "hello" => FrameKind::Hello,
            "ping" => FrameKind::Ping,
            "pong" => FrameKind::Pong,
            "message" => FrameKind::Message,
            "error" => FrameKind::Error,
            "goodbye" => FrameKind::Goodbye,
            other => FrameKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for FrameKind {
    fn from(value: &str) -> Self {
        FrameKind::parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_kinds() {
        for kind in [
            FrameKind::Hello,
            FrameKind::Ping,
            FrameKind::Pong,
            FrameKind::Message,
            FrameKind::Error,
            FrameKind::Goodbye,
        ] {
            assert_eq!(FrameKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn test_unknown_kind_is_preserved() {
        let kind = FrameKind::parse("reaction_added");
        assert_eq!(kind, FrameKind::Other("reaction_added".to_string()));
        assert_eq!(kind.to_string(), "reaction_added");
    }
}
