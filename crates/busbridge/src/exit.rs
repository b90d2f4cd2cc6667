use std::fmt;
use std::io;

use busbridge_client::{BridgeError, DisconnectCause};
use busbridge_frame::FrameError;
use busbridge_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_code(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => FAILURE,
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match &err {
        TransportError::Resolve { .. } => TRANSPORT_ERROR,
        TransportError::Connect { source, .. } | TransportError::Io(source) => io_code(source),
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    let code = match &err {
        FrameError::Io(source) => io_code(source),
        FrameError::PayloadTooLarge { .. } | FrameError::Serialize(_) | FrameError::Malformed(_) => {
            DATA_INVALID
        }
        FrameError::ConnectionClosed => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn bridge_error(context: &str, err: BridgeError) -> CliError {
    match err {
        BridgeError::Disconnected(DisconnectCause::Transport(err)) => transport_error(context, err),
        BridgeError::Disconnected(DisconnectCause::Frame(err)) => frame_error(context, err),
        BridgeError::Disconnected(cause) => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: disconnected: {cause}"))
        }
        BridgeError::InvalidData { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        BridgeError::ServerError(_) | BridgeError::NoReplyAddress(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        BridgeError::AlreadyConnected | BridgeError::Spawn { .. } => {
            CliError::new(INTERNAL, format!("{context}: {err}"))
        }
    }
}
