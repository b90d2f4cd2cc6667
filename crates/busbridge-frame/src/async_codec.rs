//! `tokio_util::codec` adapter for the bridge framing.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
use crate::envelope::{decode_envelope, encode_envelope, Envelope};
use crate::error::{FrameError, Result};

/// Decodes and encodes whole envelopes on a tokio byte stream.
///
/// Use with `FramedRead`/`FramedWrite` (or `Framed`) around a `TcpStream`.
#[derive(Debug, Clone)]
pub struct BridgeCodec {
    max_payload_size: usize,
}

impl BridgeCodec {
    /// Codec with the default 16 MiB payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    /// Codec with an explicit payload limit.
    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }
}

impl Default for BridgeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for BridgeCodec {
    type Item = Envelope;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>> {
        match decode_frame(src, self.max_payload_size)? {
            Some(frame) => decode_envelope(&frame.payload).map(Some),
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>> {
        match self.decode(src)? {
            Some(envelope) => Ok(Some(envelope)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Envelope> for BridgeCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<()> {
        let start = dst.len();
        encode_envelope(&item, dst)?;
        let size = dst.len() - start - HEADER_SIZE;
        if size > self.max_payload_size {
            dst.truncate(start);
            return Err(FrameError::PayloadTooLarge {
                size,
                max: self.max_payload_size,
            });
        }
        Ok(())
    }
}
