//! TCP transport for the event bus bridge client.
//!
//! Resolves a bridge endpoint, opens the socket and hands out a
//! [`BridgeStream`] that the framing layer reads from and writes to.
//! This is the lowest layer of busbridge.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::BridgeStream;
pub use tcp::{connect, connect_timeout};
