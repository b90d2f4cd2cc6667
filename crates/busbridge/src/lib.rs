//! Client for event bus TCP bridges.
//!
//! The bridge speaks length-prefixed JSON envelopes over TCP: a 4-byte
//! big-endian length followed by one JSON object. This crate bundles the
//! layers needed to talk to it.
//!
//! # Crate Structure
//!
//! - [`transport`] — TCP connect and stream handling
//! - [`frame`] — Length-prefixed framing and the JSON envelope
//! - [`client`] — Connection, subscriptions and request/reply correlation

/// Re-export transport types.
pub mod transport {
    pub use busbridge_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use busbridge_frame::*;
}

/// Re-export client types.
pub mod client {
    pub use busbridge_client::*;
}

pub use busbridge_client::{
    BridgeError, ClientConfig, EventBusClient, Headers, Message, Response, Result,
};
