//! Per-key async lock table.
//!
//! Each key keeps a chain of one-shot channels: a new ticket waits on the
//! channel of the ticket queued before it and hands its own receiver to the
//! next one. Queue position is fixed when the ticket is issued, before any
//! await, so waiting can happen on a detached task without reordering.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::models::SyncKey;

/// Tail of each key's queue: the serial of the last ticket issued and the
/// receiver that fires when it is released.
type LockTable = HashMap<SyncKey, (u64, oneshot::Receiver<()>)>;

#[derive(Debug, Default)]
struct State {
    tails: LockTable,
    next_serial: u64,
}

/// Serializes work per sync key; different keys never contend.
///
/// Tickets are admitted in the order they were issued. Entries are dropped
/// from the table once the last queued ticket is released.
#[derive(Debug, Default, Clone)]
pub(crate) struct KeyedLocks {
    state: Arc<Mutex<State>>,
}

/// A reserved place in a key's queue
///
/// A ticket dropped before [`KeyTicket::acquire`] still waits its turn on a
/// background task, so the tickets behind it stay excluded.
#[derive(Debug)]
pub(crate) struct KeyTicket {
    parts: Option<TicketParts>,
}

#[derive(Debug)]
struct TicketParts {
    state: Arc<Mutex<State>>,
    key: SyncKey,
    serial: u64,
    previous: Option<oneshot::Receiver<()>>,
    release: oneshot::Sender<()>,
}

/// Exclusive access to one key until dropped
#[derive(Debug)]
pub(crate) struct KeyGuard {
    state: Arc<Mutex<State>>,
    key: SyncKey,
    serial: u64,
    release: Option<oneshot::Sender<()>>,
}

impl KeyedLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Take the next place in `key`'s queue without waiting.
    pub(crate) fn enqueue(&self, key: SyncKey) -> KeyTicket {
        let (release, released) = oneshot::channel();
        let mut state = lock_state(&self.state);
        state.next_serial += 1;
        let serial = state.next_serial;
        let previous = state
            .tails
            .insert(key, (serial, released))
            .map(|(_, receiver)| receiver);

        KeyTicket {
            parts: Some(TicketParts {
                state: Arc::clone(&self.state),
                key,
                serial,
                previous,
                release,
            }),
        }
    }

    #[cfg(test)]
    pub(crate) async fn acquire(&self, key: SyncKey) -> KeyGuard {
        self.enqueue(key).acquire().await
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        lock_state(&self.state).tails.len()
    }
}

impl KeyTicket {
    /// Wait until every ticket issued before this one has been released.
    pub(crate) async fn acquire(mut self) -> KeyGuard {
        match self.parts.take() {
            Some(parts) => parts.acquire().await,
            None => unreachable!("ticket parts are only taken on acquire or drop"),
        }
    }
}

impl TicketParts {
    async fn acquire(mut self) -> KeyGuard {
        if let Some(previous) = self.previous.take() {
            // A dropped sender means the holder is gone; either way it is our turn
            previous.await.ok();
        }
        self.into_guard()
    }

    fn into_guard(self) -> KeyGuard {
        KeyGuard {
            state: self.state,
            key: self.key,
            serial: self.serial,
            release: Some(self.release),
        }
    }
}

impl Drop for KeyTicket {
    fn drop(&mut self) {
        let Some(parts) = self.parts.take() else {
            return;
        };
        if parts.previous.is_none() {
            drop(parts.into_guard());
        } else if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                drop(parts.acquire().await);
            });
        }
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        let mut state = lock_state(&self.state);
        if let Some(release) = self.release.take() {
            release.send(()).ok();
        }
        // Nobody queued behind us
        if state
            .tails
            .get(&self.key)
            .is_some_and(|(serial, _)| *serial == self.serial)
        {
            state.tails.remove(&self.key);
        }
    }
}

fn lock_state(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
