//! Envelope types for the RTM connection.
//!
//! [`OutboundFrame`] is built by callers and becomes a [`SealedFrame`] once an
//! id is assigned. A sealed frame cannot be modified, only encoded.
//! [`InboundMessage`] is the decoded form of every frame the server sends.

use crate::codec::encode_outbound;
use crate::error::WireError;
use crate::kind::FrameKind;
use serde_json::{Map, Value};

/// Name of the discriminator field
pub const TYPE_FIELD: &str = "type";
/// Name of the outbound id field
pub const ID_FIELD: &str = "id";

/// A frame waiting for an id
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundFrame {
    fields: Map<String, Value>,
}

impl OutboundFrame {
    /// Create a frame with the given discriminator
    pub fn new(kind: impl Into<FrameKind>) -> Self {
        let mut fields = Map::new();
        fields.insert(
            TYPE_FIELD.to_string(),
            Value::String(kind.into().as_str().to_string()),
        );
        Self { fields }
    }

    /// Wrap an existing field map. The map must carry a string `type`.
    pub fn from_fields(fields: Map<String, Value>) -> Result<Self, WireError> {
        match fields.get(TYPE_FIELD) {
            Some(Value::String(_)) => Ok(Self { fields }),
            _ => Err(WireError::MissingType),
        }
    }

    /// Add or replace a field
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// The discriminator of this frame
    pub fn kind(&self) -> FrameKind {
        self.fields
            .get(TYPE_FIELD)
            .and_then(Value::as_str)
            .map(FrameKind::parse)
            .unwrap_or_else(|| FrameKind::Other(String::new()))
    }

    /// Assign the frame id. Any caller-provided `id` field is overwritten.
    pub fn seal(mut self, id: u64) -> SealedFrame {
        self.fields.insert(ID_FIELD.to_string(), Value::from(id));
        SealedFrame {
            id,
            fields: self.fields,
        }
    }
}

/// A frame with its id assigned, ready for the transport
#[derive(Debug, Clone, PartialEq)]
pub struct SealedFrame {
    id: u64,
    fields: Map<String, Value>,
}

impl SealedFrame {
    /// The assigned id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// All fields including `type` and `id`
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Encode as one JSON text frame
    pub fn encode(&self) -> Result<String, WireError> {
        encode_outbound(self)
    }
}

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    fields: Map<String, Value>,
}

impl InboundMessage {
    /// Wrap a decoded field map
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// The raw `type` discriminator.
    ///
    /// Returns `None` when the field is missing, null, or not a string; such
    /// messages belong to the untyped bucket.
    pub fn message_type(&self) -> Option<&str> {
        self.fields.get(TYPE_FIELD).and_then(Value::as_str)
    }

    /// The discriminator as a [`FrameKind`]
    pub fn kind(&self) -> Option<FrameKind> {
        self.message_type().map(FrameKind::parse)
    }

    /// Look up a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Look up a string field
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// All fields
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consume the message and return its fields
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

impl From<Map<String, Value>> for InboundMessage {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_fields(fields)
    }
}
