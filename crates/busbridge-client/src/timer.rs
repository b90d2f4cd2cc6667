use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{BridgeError, Result};

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Deadline {
    at: Instant,
    seq: u64,
    key: String,
}

#[derive(Default)]
struct TimerState {
    queue: BinaryHeap<Reverse<Deadline>>,
    next_seq: u64,
    shutdown: bool,
}

struct TimerShared {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

/// Single thread firing keyed deadlines in order.
///
/// Entries are never cancelled: the expiry callback decides whether the key
/// still matters.
pub(crate) struct DeadlineTimer {
    shared: Arc<TimerShared>,
}

impl DeadlineTimer {
    pub(crate) fn spawn(
        name: &str,
        on_expire: impl Fn(String) + Send + 'static,
    ) -> Result<Self> {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState::default()),
            wakeup: Condvar::new(),
        });

        let thread_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_timer(&thread_shared, on_expire))
            .map_err(|source| BridgeError::Spawn {
                what: "timer",
                source,
            })?;

        Ok(Self { shared })
    }

    pub(crate) fn schedule(&self, key: String, after: Duration) {
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(Reverse(Deadline {
            at: Instant::now() + after,
            seq,
            key,
        }));
        drop(state);
        self.shared.wakeup.notify_one();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TimerState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        self.lock().shutdown = true;
        self.shared.wakeup.notify_one();
    }
}

fn run_timer(shared: &TimerShared, on_expire: impl Fn(String)) {
    let mut state = shared.state.lock().unwrap_or_else(PoisonError::into_inner);
    loop {
        if state.shutdown {
            trace!("deadline timer stopped");
            return;
        }

        let now = Instant::now();
        let next = state.queue.peek().map(|Reverse(deadline)| deadline.at);
        match next {
            None => {
                state = shared
                    .wakeup
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            Some(at) if at <= now => {
                if let Some(Reverse(deadline)) = state.queue.pop() {
                    drop(state);
                    on_expire(deadline.key);
                    state = shared.state.lock().unwrap_or_else(PoisonError::into_inner);
                }
            }
            Some(at) => {
                state = shared
                    .wakeup
                    .wait_timeout(state, at - now)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn fires_in_deadline_order() {
        let (tx, rx) = mpsc::channel();
        let timer = DeadlineTimer::spawn("test-timer", move |key| {
            let _ = tx.send(key);
        })
        .unwrap();

        timer.schedule("late".to_string(), Duration::from_millis(120));
        timer.schedule("early".to_string(), Duration::from_millis(20));
        timer.schedule("middle".to_string(), Duration::from_millis(60));

        let fired: Vec<String> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(fired, vec!["early", "middle", "late"]);
    }

    #[test]
    fn does_not_fire_early() {
        let (tx, rx) = mpsc::channel();
        let timer = DeadlineTimer::spawn("test-timer", move |key| {
            let _ = tx.send((key, Instant::now()));
        })
        .unwrap();

        let start = Instant::now();
        timer.schedule("k".to_string(), Duration::from_millis(80));
        let (_, fired_at) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(fired_at.duration_since(start) >= Duration::from_millis(80));
    }

    #[test]
    fn drop_stops_pending_deadlines() {
        let (tx, rx) = mpsc::channel();
        let timer = DeadlineTimer::spawn("test-timer", move |key| {
            let _ = tx.send(key);
        })
        .unwrap();

        timer.schedule("never".to_string(), Duration::from_millis(100));
        drop(timer);

        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }
}
