//! Event bus bridge client.
//!
//! This is the "just works" layer. Connect to a bridge, publish and send
//! messages, subscribe handlers to addresses and correlate replies, while
//! background loops keep the socket alive and route inbound frames.

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
mod pool;
mod replies;
mod router;
#[cfg(test)]
mod testing;
mod timer;

pub use busbridge_frame::{Envelope, Headers};
pub use client::EventBusClient;
pub use config::ClientConfig;
pub use connection::{Connection, ConnectionState};
pub use error::{BridgeError, DisconnectCause, Result};
pub use message::{Message, Response};
pub use replies::ReplyHandler;
pub use router::{ErrorHandler, MessageHandler};
