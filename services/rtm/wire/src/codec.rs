//! Encoding and decoding of JSON text frames.

use crate::error::WireError;
use crate::frame::{InboundMessage, SealedFrame};
use serde_json::Value;
use tracing::trace;

/// Maximum accepted text frame size (16 MiB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Decode one inbound text frame
pub fn decode_inbound(text: &str) -> Result<InboundMessage, WireError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(WireError::Size(text.len()));
    }

    match serde_json::from_str::<Value>(text)? {
        Value::Object(fields) => {
            trace!("Decoded inbound frame ({} bytes, {} fields)", text.len(), fields.len());
            Ok(InboundMessage::from_fields(fields))
        }
        _ => Err(WireError::NotAnObject),
    }
}

/// Encode one sealed outbound frame
pub fn encode_outbound(frame: &SealedFrame) -> Result<String, WireError> {
    let text = serde_json::to_string(frame.fields())?;
    if text.len() > MAX_FRAME_SIZE {
        return Err(WireError::Size(text.len()));
    }
    Ok(text)
}
