//! Length-prefixed JSON envelope framing for the event bus bridge protocol.
//!
//! Every message on the wire is framed as:
//! - A 4-byte big-endian payload length
//! - Exactly that many bytes of UTF-8 JSON text (one envelope)
//!
//! No partial reads, no buffer management in user code.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::BridgeCodec;
pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use envelope::{
    decode_envelope, encode_envelope, Envelope, Headers, TYPE_ERR, TYPE_MESSAGE, TYPE_PING,
    TYPE_PONG, TYPE_PUBLISH, TYPE_REGISTER, TYPE_SEND, TYPE_UNREGISTER,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
