//! In-process stand-in for the bridge, used by socket-level tests.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::time::Duration;

use busbridge_frame::{decode_envelope, encode_envelope, Envelope, TYPE_PING};
use bytes::BytesMut;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct FakeBridge {
    listener: TcpListener,
}

impl FakeBridge {
    pub(crate) fn bind() -> Self {
        Self {
            listener: TcpListener::bind("127.0.0.1:0").unwrap(),
        }
    }

    /// A port nothing listens on.
    pub(crate) fn unused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    pub(crate) fn port(&self) -> u16 {
        self.listener.local_addr().unwrap().port()
    }

    pub(crate) fn accept(&self) -> BridgeSide {
        let (stream, _) = self.listener.accept().unwrap();
        stream.set_read_timeout(Some(RECV_TIMEOUT)).unwrap();
        BridgeSide { stream }
    }
}

/// The bridge's end of one client connection.
pub(crate) struct BridgeSide {
    stream: TcpStream,
}

impl BridgeSide {
    /// Read one envelope, panicking on timeout or EOF.
    pub(crate) fn recv(&mut self) -> Envelope {
        self.try_recv().expect("bridge side hit EOF")
    }

    /// Read the next envelope that is not a keepalive ping.
    pub(crate) fn recv_skipping_pings(&mut self) -> Envelope {
        loop {
            let envelope = self.recv();
            if !envelope.is_kind(TYPE_PING) {
                return envelope;
            }
        }
    }

    /// Assert that nothing but pings arrives within `window`.
    pub(crate) fn expect_silence(&mut self, window: Duration) {
        self.stream.set_read_timeout(Some(window)).unwrap();
        loop {
            match self.try_recv_raw() {
                Ok(Some(envelope)) if envelope.is_kind(TYPE_PING) => continue,
                Ok(Some(envelope)) => panic!("unexpected frame: {envelope:?}"),
                Ok(None) => break,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    break
                }
                Err(err) => panic!("bridge side read failed: {err}"),
            }
        }
        self.stream.set_read_timeout(Some(RECV_TIMEOUT)).unwrap();
    }

    /// Read and discard frames until the client closes its end.
    pub(crate) fn drain_until_closed(&mut self) {
        while self.try_recv().is_some() {}
    }

    pub(crate) fn send(&mut self, envelope: &Envelope) {
        let mut buf = BytesMut::new();
        encode_envelope(envelope, &mut buf).unwrap();
        self.stream.write_all(&buf).unwrap();
    }

    /// Send `payload` as one frame without JSON encoding.
    pub(crate) fn send_raw(&mut self, payload: &[u8]) {
        let len = u32::try_from(payload.len()).unwrap();
        self.stream.write_all(&len.to_be_bytes()).unwrap();
        self.stream.write_all(payload).unwrap();
    }

    /// Close the socket as the bridge would on shutdown.
    pub(crate) fn close(self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    fn try_recv(&mut self) -> Option<Envelope> {
        self.try_recv_raw().expect("bridge side read failed")
    }

    fn try_recv_raw(&mut self) -> std::io::Result<Option<Envelope>> {
        let mut header = [0u8; 4];
        match self.stream.read_exact(&mut header) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) if err.kind() == ErrorKind::ConnectionReset => return Ok(None),
            Err(err) => return Err(err),
        }
        let len = u32::from_be_bytes(header) as usize;
        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload)?;
        Ok(Some(decode_envelope(&payload).unwrap()))
    }
}
