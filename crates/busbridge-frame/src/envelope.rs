use bytes::BytesMut;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::codec::encode_frame;
use crate::error::{FrameError, Result};

/// Envelope type: point-to-point send.
pub const TYPE_SEND: &str = "send";
/// Envelope type: broadcast publish.
pub const TYPE_PUBLISH: &str = "publish";
/// Envelope type: subscribe to an address.
pub const TYPE_REGISTER: &str = "register";
/// Envelope type: drop a subscription.
pub const TYPE_UNREGISTER: &str = "unregister";
/// Envelope type: keepalive request.
pub const TYPE_PING: &str = "ping";
/// Envelope type: keepalive response sent by some bridges.
pub const TYPE_PONG: &str = "pong";
/// Envelope type: inbound message delivered by the bridge.
pub const TYPE_MESSAGE: &str = "message";
/// Envelope type: error notification from the bridge.
pub const TYPE_ERR: &str = "err";

/// Message headers. The bridge treats them as a flat JSON object.
pub type Headers = Map<String, Value>;

/// One decoded protocol message.
///
/// Fields the client does not model are kept in `extra` so that an envelope
/// survives a decode/encode cycle unchanged. Decoding accepts any JSON object:
/// a known field holding an unexpected JSON type lands in `extra` instead of
/// failing. A present `null` body decodes as `Some(Value::Null)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Envelope {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Headers>,
    #[serde(rename = "replyAddress", skip_serializing_if = "Option::is_none")]
    pub reply_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    /// Create a point-to-point send, optionally asking for a reply.
    pub fn send(
        address: impl Into<String>,
        body: Value,
        headers: Headers,
        reply_address: Option<String>,
    ) -> Self {
        Self {
            kind: Some(TYPE_SEND.to_string()),
            address: Some(address.into()),
            body: Some(body),
            headers: Some(headers),
            reply_address,
            ..Self::default()
        }
    }

    /// Create a publish to every subscriber of `address`.
    pub fn publish(address: impl Into<String>, body: Value, headers: Headers) -> Self {
        Self {
            kind: Some(TYPE_PUBLISH.to_string()),
            address: Some(address.into()),
            body: Some(body),
            headers: Some(headers),
            ..Self::default()
        }
    }

    /// Create a subscription request.
    pub fn register(address: impl Into<String>, headers: Headers) -> Self {
        Self {
            kind: Some(TYPE_REGISTER.to_string()),
            address: Some(address.into()),
            headers: Some(headers),
            ..Self::default()
        }
    }

    /// Create a subscription removal.
    pub fn unregister(address: impl Into<String>, headers: Headers) -> Self {
        Self {
            kind: Some(TYPE_UNREGISTER.to_string()),
            address: Some(address.into()),
            headers: Some(headers),
            ..Self::default()
        }
    }

    /// Create a keepalive ping.
    pub fn ping() -> Self {
        Self {
            kind: Some(TYPE_PING.to_string()),
            ..Self::default()
        }
    }

    /// Create an inbound message as the bridge delivers it.
    pub fn message(address: impl Into<String>, body: Value, headers: Headers) -> Self {
        Self {
            kind: Some(TYPE_MESSAGE.to_string()),
            address: Some(address.into()),
            body: Some(body),
            headers: Some(headers),
            ..Self::default()
        }
    }

    /// Create an error notification as the bridge delivers it.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            kind: Some(TYPE_ERR.to_string()),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Whether the envelope's `type` equals `kind`.
    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind.as_deref() == Some(kind)
    }

    /// Text of an `err` envelope. A non-string `message` is rendered as JSON.
    pub fn error_text(&self) -> String {
        match (&self.message, self.extra.get("message")) {
            (Some(message), _) => message.clone(),
            (None, Some(other)) => other.to_string(),
            (None, None) => String::new(),
        }
    }
}

impl From<Map<String, Value>> for Envelope {
    fn from(mut fields: Map<String, Value>) -> Self {
        let kind = take_string(&mut fields, "type");
        let address = take_string(&mut fields, "address");
        let reply_address = take_string(&mut fields, "replyAddress");
        let message = take_string(&mut fields, "message");
        let headers = match fields.remove("headers") {
            Some(Value::Object(headers)) => Some(headers),
            Some(other) => {
                fields.insert("headers".to_string(), other);
                None
            }
            None => None,
        };
        let body = fields.remove("body");
        Self {
            kind,
            address,
            body,
            headers,
            reply_address,
            message,
            extra: fields,
        }
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Map::<String, Value>::deserialize(deserializer).map(Self::from)
    }
}

/// Remove `key` if it holds a string; any other value stays in `fields`.
fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key)? {
        Value::String(text) => Some(text),
        other => {
            fields.insert(key.to_string(), other);
            None
        }
    }
}

/// Serialize an envelope and append it to `dst` as one frame.
pub fn encode_envelope(envelope: &Envelope, dst: &mut BytesMut) -> Result<()> {
    let payload = serde_json::to_vec(envelope).map_err(FrameError::Serialize)?;
    encode_frame(&payload, dst)
}

/// Parse one frame payload as an envelope.
pub fn decode_envelope(payload: &[u8]) -> Result<Envelope> {
    serde_json::from_slice(payload).map_err(FrameError::Malformed)
}
