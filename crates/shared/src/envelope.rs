//! The `{type, payload}` unit every frame is carried in.
//!
//! On the wire the payload fields sit beside `type` in one flat JSON object:
//! `{"type": "C_Login", "token": "abc"}`.

use serde_json::{Map, Value};

use crate::error::CodecError;

const TYPE_FIELD: &str = "type";

/// A decoded frame: its message type plus the remaining fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub kind: String,
    pub payload: Map<String, Value>,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// An envelope with an empty payload.
    pub fn empty(kind: impl Into<String>) -> Self {
        Self::new(kind, Map::new())
    }

    /// Split a flat JSON object into type and payload.
    pub fn from_value(value: Value) -> Result<Self, CodecError> {
        let Value::Object(mut fields) = value else {
            return Err(CodecError::NotAnObject);
        };
        let kind = match fields.remove(TYPE_FIELD) {
            Some(Value::String(kind)) if !kind.is_empty() => kind,
            _ => return Err(CodecError::MissingType),
        };
        Ok(Self {
            kind,
            payload: fields,
        })
    }

    /// Flatten back into a single JSON object.
    ///
    /// A `type` key inside the payload is overwritten by `kind`.
    pub fn into_value(self) -> Value {
        let mut fields = self.payload;
        fields.insert(TYPE_FIELD.to_string(), Value::String(self.kind));
        Value::Object(fields)
    }

    /// Same as [`into_value`](Self::into_value) without consuming.
    pub fn to_value(&self) -> Value {
        self.clone().into_value()
    }

    pub fn decode(text: &str) -> Result<Self, CodecError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&self.to_value())?)
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }
}
