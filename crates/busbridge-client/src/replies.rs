use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::message::{Message, Response};
use crate::pool::WorkerPool;
use crate::timer::DeadlineTimer;

/// One-shot callback receiving a request's reply or its timeout.
pub type ReplyHandler = Box<dyn FnOnce(Response) + Send + 'static>;

type ReplyMap = HashMap<String, ReplyHandler>;
type ReplyTable = Arc<Mutex<ReplyMap>>;

/// Pending request table keyed by ephemeral reply address.
///
/// Whoever removes an entry first (reply or deadline) owns its callback, so
/// each callback runs exactly once.
pub(crate) struct ReplyCorrelator {
    table: ReplyTable,
    timer: DeadlineTimer,
    pool: WorkerPool,
}

impl ReplyCorrelator {
    pub(crate) fn new(pool: WorkerPool) -> Result<Self> {
        let table: ReplyTable = Arc::default();

        let expire_table = Arc::clone(&table);
        let expire_pool = pool.clone();
        let timer = DeadlineTimer::spawn("busbridge-replies", move |address| {
            let handler = lock(&expire_table).remove(&address);
            if let Some(handler) = handler {
                debug!(reply_address = %address, "request timed out");
                expire_pool.execute(move || handler(Response::timed_out(address)));
            }
        })?;

        Ok(Self { table, timer, pool })
    }

    /// Record `handler` under a fresh reply address and arm its deadline.
    pub(crate) fn begin(&self, handler: ReplyHandler, timeout: Duration) -> String {
        let address = Uuid::new_v4().to_string();
        lock(&self.table).insert(address.clone(), handler);
        self.timer.schedule(address.clone(), timeout);
        address
    }

    /// Hand `message` to the callback waiting on `address`.
    ///
    /// Returns false if nothing is pending there (unknown, already answered,
    /// or timed out).
    pub(crate) fn resolve(&self, address: &str, message: Message) -> bool {
        let Some(handler) = self.take(address) else {
            return false;
        };
        let address = address.to_string();
        self.pool
            .execute(move || handler(Response::reply(address, message)));
        true
    }

    /// Drop a pending entry without running its callback.
    pub(crate) fn cancel(&self, address: &str) -> bool {
        self.take(address).is_some()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, address: &str) -> bool {
        lock(&self.table).contains_key(address)
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.table).len()
    }

    fn take(&self, address: &str) -> Option<ReplyHandler> {
        lock(&self.table).remove(address)
    }
}

fn lock(table: &Mutex<ReplyMap>) -> MutexGuard<'_, ReplyMap> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}
