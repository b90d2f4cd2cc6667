use std::sync::{Arc, Weak};
use std::time::Duration;

use busbridge_frame::{Envelope, Headers};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionState, InboundSink};
use crate::error::{BridgeError, Result};
use crate::message::{Message, Response};
use crate::pool::WorkerPool;
use crate::router::{ErrorHandler, MessageHandler, Removal, Router};

/// Client for an event bus TCP bridge.
///
/// Cheap to clone; all clones share one connection. Dropping the last clone
/// disconnects and stops the background threads.
///
/// ```no_run
/// use busbridge_client::EventBusClient;
/// use serde_json::json;
///
/// let client = EventBusClient::new()?;
/// client.connect("127.0.0.1", 7000)?;
/// client.request("math.add", &json!({"a": 2, "b": 3}), Default::default(), None, |response| {
///     println!("{:?}", response.body());
/// })?;
/// # Ok::<(), busbridge_client::BridgeError>(())
/// ```
#[derive(Clone)]
pub struct EventBusClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    connection: Arc<Connection>,
    router: Arc<Router>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.connection.disconnect();
    }
}

impl EventBusClient {
    /// Create a detached client with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a detached client. Starts the worker pool and reply timer.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let pool = WorkerPool::new("busbridge-worker", config.worker_threads)?;
        let router = Arc::new(Router::new(pool)?);
        let connection = Arc::new(Connection::new(config.clone()));
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                connection,
                router,
            }),
        })
    }

    /// Open the socket, send the first ping and start the background loops.
    pub fn connect(&self, host: &str, port: u16) -> Result<()> {
        let router: Weak<Router> = Arc::downgrade(&self.inner.router);
        let sink: Weak<dyn InboundSink> = router;
        self.inner.connection.connect(host, port, sink)
    }

    /// Close the socket and stop the loops. No-op when already disconnected.
    ///
    /// Registrations stay in place locally; a later `connect` does not
    /// re-register them with the bridge.
    pub fn disconnect(&self) {
        self.inner.connection.disconnect();
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Point-to-point send without waiting for a reply.
    pub fn send<B: Serialize + ?Sized>(
        &self,
        address: &str,
        body: &B,
        headers: Headers,
    ) -> Result<()> {
        let body = to_body(address, body)?;
        self.inner
            .connection
            .write_envelope(&Envelope::send(address, body, headers, None))
    }

    /// Point-to-point send whose reply (or timeout) is handed to `callback`.
    ///
    /// `timeout` falls back to [`ClientConfig::request_timeout`]. The callback
    /// runs exactly once on the worker pool, unless the send itself fails, in
    /// which case it never runs. Returns the reply address.
    pub fn request<B, F>(
        &self,
        address: &str,
        body: &B,
        headers: Headers,
        timeout: Option<Duration>,
        callback: F,
    ) -> Result<String>
    where
        B: Serialize + ?Sized,
        F: FnOnce(Response) + Send + 'static,
    {
        let body = to_body(address, body)?;
        let timeout = timeout.unwrap_or(self.inner.config.request_timeout);
        let replies = &self.inner.router.replies;
        let reply_address = replies.begin(Box::new(callback), timeout);

        let envelope = Envelope::send(address, body, headers, Some(reply_address.clone()));
        if let Err(err) = self.inner.connection.write_envelope(&envelope) {
            replies.cancel(&reply_address);
            return Err(err);
        }
        debug!(address, reply_address = %reply_address, "request sent");
        Ok(reply_address)
    }

    /// Deliver to every subscriber of `address`.
    pub fn publish<B: Serialize + ?Sized>(
        &self,
        address: &str,
        body: &B,
        headers: Headers,
    ) -> Result<()> {
        let body = to_body(address, body)?;
        self.inner
            .connection
            .write_envelope(&Envelope::publish(address, body, headers))
    }

    /// Subscribe `handler` to `address` and return its registration id.
    ///
    /// A fresh UUID is used when `id` is `None`; reusing an id on the same
    /// address replaces that handler. A `register` frame is sent every time.
    pub fn register<F>(
        &self,
        address: &str,
        id: Option<&str>,
        headers: Headers,
        handler: F,
    ) -> Result<String>
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        let id = id.map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
        let handler: MessageHandler = Arc::new(handler);
        let registry = &self.inner.router.registry;
        let previous = registry.insert(address, &id, handler);

        let written = self
            .inner
            .connection
            .write_envelope(&Envelope::register(address, headers));
        if let Err(err) = written {
            match previous {
                Some(previous) => {
                    registry.insert(address, &id, previous);
                }
                None => {
                    registry.remove(address, &id);
                }
            }
            return Err(err);
        }

        debug!(address, id = %id, "handler registered");
        Ok(id)
    }

    /// Remove one registration.
    ///
    /// Returns `Ok(false)` if `(address, id)` is unknown. The `unregister`
    /// frame is only sent once the last handler for `address` is gone; if
    /// that write fails the handler is put back and the error returned.
    pub fn unregister(&self, address: &str, id: &str, headers: Headers) -> Result<bool> {
        let registry = &self.inner.router.registry;
        match registry.remove(address, id) {
            Removal::NotFound => Ok(false),
            Removal::Remaining(_) => {
                debug!(address, id, "handler removed; others remain");
                Ok(true)
            }
            Removal::Emptied(handler) => {
                let written = self
                    .inner
                    .connection
                    .write_envelope(&Envelope::unregister(address, headers));
                if let Err(err) = written {
                    registry.insert(address, id, handler);
                    return Err(err);
                }
                debug!(address, id, "last handler removed");
                Ok(true)
            }
        }
    }

    /// Install the handler for bridge errors and connection loss, replacing
    /// any previous one.
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(BridgeError) + Send + Sync + 'static,
    {
        let handler: ErrorHandler = Arc::new(handler);
        self.inner.router.errors.set(handler);
    }

    /// Remove the error handler; asynchronous errors are then dropped.
    pub fn clear_error_handler(&self) {
        self.inner.router.errors.clear();
    }

    /// Number of handlers registered on `address`.
    pub fn registration_count(&self, address: &str) -> usize {
        self.inner.router.registry.count(address)
    }

    /// Requests still waiting for a reply or timeout.
    pub fn pending_replies(&self) -> usize {
        self.inner.router.replies.len()
    }
}

impl std::fmt::Debug for EventBusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBusClient")
            .field("connection", &self.inner.connection)
            .field("pending_replies", &self.pending_replies())
            .finish()
    }
}

fn to_body<B: Serialize + ?Sized>(address: &str, body: &B) -> Result<Value> {
    serde_json::to_value(body).map_err(|err| BridgeError::invalid_data(address, err))
}
