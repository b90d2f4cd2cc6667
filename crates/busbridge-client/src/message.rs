use std::fmt;
use std::sync::Arc;

use busbridge_frame::{Envelope, Headers};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::connection::Connection;
use crate::error::{BridgeError, Result};

/// An inbound message delivered by the bridge.
///
/// Holds a handle to the connection it arrived on so handlers can answer
/// with [`Message::reply`].
#[derive(Clone)]
pub struct Message {
    address: String,
    body: Value,
    headers: Headers,
    reply_address: Option<String>,
    kind: Option<String>,
    extra: Map<String, Value>,
    connection: Arc<Connection>,
}

impl Message {
    pub(crate) fn from_envelope(
        address: String,
        envelope: Envelope,
        connection: Arc<Connection>,
    ) -> Self {
        Self {
            address,
            body: envelope.body.unwrap_or(Value::Null),
            headers: envelope.headers.unwrap_or_default(),
            reply_address: envelope.reply_address,
            kind: envelope.kind,
            extra: envelope.extra,
            connection,
        }
    }

    /// Address the message was delivered to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Message body (`Null` when the bridge sent none).
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Deserialize the body into a concrete type.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone())
            .map_err(|err| BridgeError::invalid_data(self.address.clone(), err))
    }

    /// Message headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Where a reply should go, if the sender asked for one.
    pub fn reply_address(&self) -> Option<&str> {
        self.reply_address.as_deref()
    }

    /// The envelope `type` the bridge stamped on the message, if any.
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    /// Envelope fields the client does not model (e.g. `failureCode`).
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Answer the sender on the message's reply address.
    pub fn reply<B: Serialize + ?Sized>(&self, body: &B, headers: Headers) -> Result<()> {
        let Some(reply_address) = self.reply_address.as_deref() else {
            return Err(BridgeError::NoReplyAddress(self.address.clone()));
        };
        let body = serde_json::to_value(body)
            .map_err(|err| BridgeError::invalid_data(reply_address, err))?;
        self.connection
            .write_envelope(&Envelope::send(reply_address, body, headers, None))
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("address", &self.address)
            .field("body", &self.body)
            .field("headers", &self.headers)
            .field("reply_address", &self.reply_address)
            .finish()
    }
}

/// Outcome of a request: the reply message, or a timeout.
#[derive(Debug, Clone)]
pub struct Response {
    reply_address: String,
    message: Option<Message>,
}

impl Response {
    pub(crate) fn reply(reply_address: String, message: Message) -> Self {
        Self {
            reply_address,
            message: Some(message),
        }
    }

    pub(crate) fn timed_out(reply_address: String) -> Self {
        Self {
            reply_address,
            message: None,
        }
    }

    /// True when no reply arrived before the request's timeout.
    pub fn is_timed_out(&self) -> bool {
        self.message.is_none()
    }

    /// The ephemeral address this request was correlated on.
    pub fn reply_address(&self) -> &str {
        &self.reply_address
    }

    /// The reply, unless the request timed out.
    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// Reply body, unless the request timed out.
    pub fn body(&self) -> Option<&Value> {
        self.message.as_ref().map(Message::body)
    }

    /// Take the reply message out of the response.
    pub fn into_message(self) -> Option<Message> {
        self.message
    }
}
