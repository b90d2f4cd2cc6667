use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::BridgeStream;

/// Connect to a bridge, blocking until the socket is established or fails.
pub fn connect(host: &str, port: u16) -> Result<BridgeStream> {
    connect_with(host, port, None)
}

/// Connect to a bridge, giving up on each candidate address after `timeout`.
pub fn connect_timeout(host: &str, port: u16, timeout: Duration) -> Result<BridgeStream> {
    connect_with(host, port, Some(timeout))
}

fn connect_with(host: &str, port: u16, timeout: Option<Duration>) -> Result<BridgeStream> {
    let addr = format!("{host}:{port}");
    let candidates = resolve(host, port)?;

    let mut last_err = None;
    for candidate in candidates {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
            None => TcpStream::connect(candidate),
        };
        match attempt {
            Ok(stream) => {
                debug!(%addr, resolved = %candidate, "connected to bridge");
                let stream = BridgeStream::from_tcp(stream);
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(err) => {
                debug!(%addr, resolved = %candidate, error = %err, "connect attempt failed");
                last_err = Some(err);
            }
        }
    }

    Err(TransportError::Connect {
        addr,
        source: last_err.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "address resolved to no candidates",
            )
        }),
    })
}

fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    (host, port)
        .to_socket_addrs()
        .map(|addrs| addrs.collect())
        .map_err(|source| TransportError::Resolve {
            addr: format!("{host}:{port}"),
            source,
        })
}
