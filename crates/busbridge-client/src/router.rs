use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use busbridge_frame::{Envelope, TYPE_ERR};
use tracing::{debug, trace, warn};

use crate::connection::{Connection, InboundSink};
use crate::error::BridgeError;
use crate::message::Message;
use crate::pool::WorkerPool;
use crate::replies::ReplyCorrelator;

/// Callback invoked for every message delivered to a registered address.
pub type MessageHandler = Arc<dyn Fn(Message) + Send + Sync + 'static>;

/// Callback invoked for bridge errors and connection loss.
pub type ErrorHandler = Arc<dyn Fn(BridgeError) + Send + Sync + 'static>;

/// What [`SubscriptionRegistry::remove`] found. Carries the removed handler.
pub(crate) enum Removal {
    NotFound,
    Remaining(MessageHandler),
    Emptied(MessageHandler),
}

/// Handlers per address, each keyed by a registration id.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    entries: RwLock<HashMap<String, HashMap<String, MessageHandler>>>,
}

impl SubscriptionRegistry {
    /// Add or replace a handler. Returns the handler it replaced.
    pub(crate) fn insert(
        &self,
        address: &str,
        id: &str,
        handler: MessageHandler,
    ) -> Option<MessageHandler> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(address.to_string())
            .or_default()
            .insert(id.to_string(), handler)
    }

    pub(crate) fn remove(&self, address: &str, id: &str) -> Removal {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let Some(handlers) = entries.get_mut(address) else {
            return Removal::NotFound;
        };
        let Some(handler) = handlers.remove(id) else {
            return Removal::NotFound;
        };
        if handlers.is_empty() {
            entries.remove(address);
            Removal::Emptied(handler)
        } else {
            Removal::Remaining(handler)
        }
    }

    /// Snapshot of the handlers for `address`.
    pub(crate) fn handlers(&self, address: &str) -> Vec<MessageHandler> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(address)
            .map(|handlers| handlers.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, address: &str) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(address).map_or(0, HashMap::len)
    }
}

/// The single slot holding the client's error handler.
pub(crate) struct ErrorSink {
    slot: RwLock<Option<ErrorHandler>>,
    pool: WorkerPool,
}

impl ErrorSink {
    pub(crate) fn new(pool: WorkerPool) -> Self {
        Self {
            slot: RwLock::new(None),
            pool,
        }
    }

    pub(crate) fn set(&self, handler: ErrorHandler) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    pub(crate) fn clear(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub(crate) fn report(&self, error: BridgeError) {
        let handler = self
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match handler {
            Some(handler) => {
                self.pool.execute(move || handler(error));
            }
            None => debug!(error = %error, "no error handler installed; dropping error"),
        }
    }
}

/// Routes inbound envelopes to subscribers, pending replies or the error handler.
pub(crate) struct Router {
    pub(crate) registry: SubscriptionRegistry,
    pub(crate) replies: ReplyCorrelator,
    pub(crate) errors: ErrorSink,
    pool: WorkerPool,
}

impl Router {
    pub(crate) fn new(pool: WorkerPool) -> crate::Result<Self> {
        Ok(Self {
            registry: SubscriptionRegistry::default(),
            replies: ReplyCorrelator::new(pool.clone())?,
            errors: ErrorSink::new(pool.clone()),
            pool,
        })
    }

    pub(crate) fn dispatch(&self, envelope: Envelope, connection: &Arc<Connection>) {
        let Some(address) = envelope.address.clone() else {
            if envelope.is_kind(TYPE_ERR) {
                let message = envelope.error_text();
                warn!(message = %message, "bridge reported an error");
                self.errors.report(BridgeError::ServerError(message));
            } else {
                trace!(kind = ?envelope.kind, "ignoring frame without address");
            }
            return;
        };

        let handlers = self.registry.handlers(&address);
        if !handlers.is_empty() {
            let message = Message::from_envelope(address, envelope, Arc::clone(connection));
            for handler in handlers {
                let message = message.clone();
                self.pool.execute(move || handler(message));
            }
            return;
        }

        let message = Message::from_envelope(address.clone(), envelope, Arc::clone(connection));
        if !self.replies.resolve(&address, message) {
            debug!(address = %address, "no handler or pending reply; dropping message");
        }
    }
}

impl InboundSink for Router {
    fn on_envelope(&self, envelope: Envelope, connection: &Arc<Connection>) {
        self.dispatch(envelope, connection);
    }

    fn on_failure(&self, error: BridgeError) {
        self.errors.report(error);
    }
}
