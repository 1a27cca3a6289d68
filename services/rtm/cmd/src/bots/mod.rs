//! Bots shipped with the runner.

mod logbot;
mod unfurl;

pub use logbot::LogBot;
pub use unfurl::UnfurlBot;

use rtm_wire::InboundMessage;

/// `channel`, `user` and `text` of a chat message, when all are present
pub(crate) fn message_parts(message: &InboundMessage) -> Option<(&str, &str, &str)> {
    Some((
        message.str_field("channel")?,
        message.str_field("user")?,
        message.str_field("text")?,
    ))
}

#[cfg(test)]
pub(crate) fn inbound(value: serde_json::Value) -> InboundMessage {
    InboundMessage::from_fields(value.as_object().cloned().unwrap_or_default())
}
