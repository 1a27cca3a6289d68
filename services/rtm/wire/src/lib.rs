//! RTM envelope types, JSON text framing and well-known frame kinds.
//!
//! Every unit exchanged over the persistent connection is a single JSON
//! object carried in one text frame. Inbound envelopes always carry a `type`
//! discriminator (possibly missing for malformed input); outbound envelopes
//! carry `type` plus an `id` assigned immediately before transmission.
//!
//! ## Wire Format
//!
//! ```text
//! outbound: {"type": "ping", "id": 7}
//! inbound:  {"type": "message", "user": "U1", "channel": "C1", "text": "hi", "ts": "1.2"}
//! inbound:  {"type": "pong", "reply_to": 7}
//! ```
//!
//! ## Example
//!
//! ```rust
//! use rtm_wire::{decode_inbound, FrameKind, OutboundFrame};
//!
//! let frame = OutboundFrame::new(FrameKind::Ping).with("time", 42);
//! let text = frame.seal(1).encode().unwrap();
//! assert!(text.contains("\"id\":1"));
//!
//! let msg = decode_inbound(r#"{"type":"pong","reply_to":1}"#).unwrap();
//! assert_eq!(msg.kind(), Some(FrameKind::Pong));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod frame;
pub mod kind;

// Re-export main types
pub use codec::{decode_inbound, encode_outbound, MAX_FRAME_SIZE};
pub use error::WireError;
pub use frame::{InboundMessage, OutboundFrame, SealedFrame, ID_FIELD, TYPE_FIELD};
pub use kind::FrameKind;
