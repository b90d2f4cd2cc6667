use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;

use busbridge_frame::{Envelope, FrameError, FrameReader, FrameWriter};
use busbridge_transport::BridgeStream;
use tracing::{debug, info, trace, warn};

use crate::config::ClientConfig;
use crate::error::{BridgeError, DisconnectCause, Result};

/// Lifecycle of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Receives what the read and keepalive loops produce.
pub(crate) trait InboundSink: Send + Sync + 'static {
    /// One decoded envelope, in arrival order.
    fn on_envelope(&self, envelope: Envelope, connection: &Arc<Connection>);

    /// A loop detected that the connection is gone.
    fn on_failure(&self, error: BridgeError);
}

struct Session {
    state: ConnectionState,
    epoch: u64,
    control: Option<BridgeStream>,
}

struct LiveWriter {
    epoch: u64,
    writer: FrameWriter<BridgeStream>,
}

struct WriteFailure {
    error: BridgeError,
    closed_session: bool,
}

/// The socket to the bridge and the two loops that service it.
///
/// Every `connect` opens a new session numbered by an epoch. Loops remember
/// their epoch and stop as soon as it is no longer the live one, so a stale
/// loop never touches a later session. Writes are serialized through one
/// writer lock so frames never interleave.
pub struct Connection {
    config: ClientConfig,
    session: Mutex<Session>,
    wakeup: Condvar,
    writer: Mutex<Option<LiveWriter>>,
}

impl Connection {
    /// Create a detached connection.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            session: Mutex::new(Session {
                state: ConnectionState::Disconnected,
                epoch: 0,
                control: None,
            }),
            wakeup: Condvar::new(),
            writer: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.lock_session().state
    }

    /// Whether a socket is open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Open the socket, start both loops and send the first ping.
    pub(crate) fn connect(
        self: &Arc<Self>,
        host: &str,
        port: u16,
        sink: Weak<dyn InboundSink>,
    ) -> Result<()> {
        {
            let mut session = self.lock_session();
            if session.state != ConnectionState::Disconnected {
                return Err(BridgeError::AlreadyConnected);
            }
            session.state = ConnectionState::Connecting;
        }

        let (reader, epoch) = match self.open(host, port) {
            Ok(opened) => opened,
            Err(err) => {
                let mut session = self.lock_session();
                if session.state == ConnectionState::Connecting {
                    session.state = ConnectionState::Disconnected;
                }
                return Err(err);
            }
        };

        if let Err(err) = self.spawn_loops(reader, epoch, sink) {
            self.close(Some(epoch));
            return Err(err);
        }

        info!(host, port, epoch, "connected to bridge");
        self.write_envelope(&Envelope::ping())
    }

    fn open(&self, host: &str, port: u16) -> Result<(FrameReader<BridgeStream>, u64)> {
        let stream = match self.config.connect_timeout {
            Some(timeout) => busbridge_transport::connect_timeout(host, port, timeout),
            None => busbridge_transport::connect(host, port),
        }
        .map_err(|err| BridgeError::Disconnected(DisconnectCause::Transport(err)))?;

        let transport_err = |err| BridgeError::Disconnected(DisconnectCause::Transport(err));
        let reader_stream = stream.try_clone().map_err(transport_err)?;
        let control = stream.try_clone().map_err(transport_err)?;

        let frame_config = self.config.frame_config();
        let frame_err = |err| BridgeError::Disconnected(DisconnectCause::Frame(err));
        let reader =
            FrameReader::with_config_stream(reader_stream, frame_config.clone()).map_err(frame_err)?;
        let writer = FrameWriter::with_config_stream(stream, frame_config).map_err(frame_err)?;

        let mut session = self.lock_session();
        if session.state != ConnectionState::Connecting {
            drop(session);
            let _ = control.shutdown();
            return Err(BridgeError::not_connected());
        }
        session.epoch += 1;
        let epoch = session.epoch;
        *self.lock_writer() = Some(LiveWriter { epoch, writer });
        session.control = Some(control);
        session.state = ConnectionState::Connected;
        Ok((reader, epoch))
    }

    fn spawn_loops(
        self: &Arc<Self>,
        reader: FrameReader<BridgeStream>,
        epoch: u64,
        sink: Weak<dyn InboundSink>,
    ) -> Result<()> {
        let connection = Arc::clone(self);
        let read_sink = sink.clone();
        thread::Builder::new()
            .name("busbridge-read".to_string())
            .spawn(move || read_loop(connection, reader, epoch, read_sink))
            .map_err(|source| BridgeError::Spawn {
                what: "read loop",
                source,
            })?;

        let connection = Arc::clone(self);
        thread::Builder::new()
            .name("busbridge-keepalive".to_string())
            .spawn(move || keepalive_loop(connection, epoch, sink))
            .map_err(|source| BridgeError::Spawn {
                what: "keepalive",
                source,
            })?;
        Ok(())
    }

    /// Close the socket. Calling this while disconnected is a no-op.
    pub fn disconnect(&self) {
        if self.close(None) {
            info!("disconnected from bridge");
        }
    }

    /// Tear down the live session, or only `expected` if given.
    ///
    /// Returns true if this call performed the transition.
    fn close(&self, expected: Option<u64>) -> bool {
        let (epoch, control) = {
            let mut session = self.lock_session();
            if session.state == ConnectionState::Disconnected {
                return false;
            }
            if expected.is_some_and(|epoch| epoch != session.epoch) {
                return false;
            }
            session.state = ConnectionState::Disconnected;
            (session.epoch, session.control.take())
        };
        self.wakeup.notify_all();

        if let Some(control) = control {
            if let Err(err) = control.shutdown() {
                debug!(error = %err, "socket shutdown failed");
            }
        }

        let mut writer = self.lock_writer();
        if writer.as_ref().is_some_and(|live| live.epoch == epoch) {
            *writer = None;
        }
        true
    }

    /// Write one envelope on the live session.
    ///
    /// A transport failure closes the session before the error is returned.
    pub fn write_envelope(&self, envelope: &Envelope) -> Result<()> {
        self.write_for(None, envelope)
            .map_err(|failure| failure.error)
    }

    fn write_for(
        &self,
        expected: Option<u64>,
        envelope: &Envelope,
    ) -> std::result::Result<(), WriteFailure> {
        let mut guard = self.lock_writer();
        let Some(live) = guard.as_mut() else {
            return Err(WriteFailure {
                error: BridgeError::not_connected(),
                closed_session: false,
            });
        };
        if expected.is_some_and(|epoch| epoch != live.epoch) {
            return Err(WriteFailure {
                error: BridgeError::not_connected(),
                closed_session: false,
            });
        }

        match live.writer.write_envelope(envelope) {
            Ok(()) => {
                trace!(kind = ?envelope.kind, address = ?envelope.address, "frame sent");
                Ok(())
            }
            Err(err @ (FrameError::Serialize(_) | FrameError::PayloadTooLarge { .. })) => {
                Err(WriteFailure {
                    error: BridgeError::invalid_data(
                        envelope.address.clone().unwrap_or_default(),
                        err,
                    ),
                    closed_session: false,
                })
            }
            Err(err) => {
                let epoch = live.epoch;
                drop(guard);
                let closed_session = self.close(Some(epoch));
                if closed_session {
                    warn!(error = %err, "write failed; connection closed");
                }
                Err(WriteFailure {
                    error: BridgeError::Disconnected(DisconnectCause::Frame(err)),
                    closed_session,
                })
            }
        }
    }

    fn is_live(&self, epoch: u64) -> bool {
        let session = self.lock_session();
        session.state == ConnectionState::Connected && session.epoch == epoch
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_writer(&self) -> MutexGuard<'_, Option<LiveWriter>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.lock_session();
        f.debug_struct("Connection")
            .field("state", &session.state)
            .field("epoch", &session.epoch)
            .finish()
    }
}

fn read_loop(
    connection: Arc<Connection>,
    mut reader: FrameReader<BridgeStream>,
    epoch: u64,
    sink: Weak<dyn InboundSink>,
) {
    debug!(epoch, "read loop started");
    let cause = loop {
        match reader.read_envelope() {
            Ok(Some(envelope)) => {
                if !connection.is_live(epoch) {
                    debug!(epoch, "read loop stopped after local disconnect");
                    return;
                }
                let Some(sink) = sink.upgrade() else {
                    connection.close(Some(epoch));
                    return;
                };
                trace!(kind = ?envelope.kind, address = ?envelope.address, "frame received");
                sink.on_envelope(envelope, &connection);
            }
            Ok(None) => break DisconnectCause::ClosedByBridge,
            Err(err) => break DisconnectCause::Frame(err),
        }
    };

    if !connection.close(Some(epoch)) {
        debug!(epoch, "read loop stopped after local disconnect");
        return;
    }
    warn!(epoch, error = %cause, "connection to bridge lost");
    if let Some(sink) = sink.upgrade() {
        sink.on_failure(BridgeError::Disconnected(cause));
    }
}

fn keepalive_loop(connection: Arc<Connection>, epoch: u64, sink: Weak<dyn InboundSink>) {
    let interval = connection.config.ping_interval;
    loop {
        {
            let session = connection.lock_session();
            let (session, _) = connection
                .wakeup
                .wait_timeout_while(session, interval, |session| {
                    session.state == ConnectionState::Connected && session.epoch == epoch
                })
                .unwrap_or_else(PoisonError::into_inner);
            if session.state != ConnectionState::Connected || session.epoch != epoch {
                debug!(epoch, "keepalive stopped");
                return;
            }
        }

        if let Err(failure) = connection.write_for(Some(epoch), &Envelope::ping()) {
            if failure.closed_session {
                if let Some(sink) = sink.upgrade() {
                    sink.on_failure(failure.error);
                }
            }
            debug!(epoch, "keepalive stopped");
            return;
        }
    }
}
