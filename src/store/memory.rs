use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use essentials::{debug, warn};

use super::{
    pubsub::{PubSub, Subscription},
    state::{Outcome, RequestState, StoreEvent},
};
use crate::{codec::SerializedResponse, Error, Result};

/// Per-key request state plus the channel that wakes waiters once a key
/// settles.
///
/// Cloning the store yields another handle to the same state.
#[derive(Clone, Default)]
pub struct CoalescingStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    records: Mutex<HashMap<String, Record>>,
    events: PubSub<StoreEvent>,
    next_owner: AtomicU64,
}

/// Stored form of a [`RequestState`]. Each in-flight record carries the token
/// of its owner, so a guard that outlived a [`CoalescingStore::clear`] cannot
/// settle a newer owner's record.
#[derive(Debug, Clone)]
enum Record {
    Inflight { owner: u64 },
    Resolved(Arc<SerializedResponse>),
}

impl From<&Record> for RequestState {
    fn from(record: &Record) -> Self {
        match record {
            Record::Inflight { .. } => RequestState::Inflight,
            Record::Resolved(response) => RequestState::Resolved(response.clone()),
        }
    }
}

/// Result of [`CoalescingStore::lookup`].
pub enum Lookup {
    /// The key already holds a response.
    Resolved(Arc<SerializedResponse>),
    /// Another caller is performing the real call.
    Wait(Waiter),
    /// The key was absent and is now in flight; the holder performs the call.
    Owner(InflightGuard),
}

impl CoalescingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, Record>> {
        self.inner
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_owner(&self) -> u64 {
        self.inner.next_owner.fetch_add(1, Ordering::Relaxed)
    }

    fn notify(&self, key: &str, owner: u64, outcome: Outcome) {
        self.inner.events.notify(StoreEvent {
            key: key.to_string(),
            owner,
            outcome,
        });
    }

    pub fn get(&self, key: &str) -> Option<RequestState> {
        self.records().get(key).map(RequestState::from)
    }

    /// Marks an absent key as in flight. Returns `false` if the key already
    /// had a record.
    pub fn begin_inflight(&self, key: &str) -> bool {
        let mut records = self.records();
        if records.contains_key(key) {
            return false;
        }
        records.insert(
            key.to_string(),
            Record::Inflight {
                owner: self.next_owner(),
            },
        );
        debug!(key = key, "Request inflight");
        true
    }

    /// Stores the response for `key` and wakes everyone waiting on it.
    ///
    /// A key resolves once: resolving it again returns the stored response.
    pub fn resolve(&self, key: &str, response: SerializedResponse) -> Arc<SerializedResponse> {
        let (owner, response) = {
            let mut records = self.records();
            let owner = match records.get(key) {
                Some(Record::Resolved(existing)) => {
                    warn!(key = key, "Key is already resolved, keeping the first response");
                    return existing.clone();
                }
                Some(Record::Inflight { owner }) => *owner,
                None => self.next_owner(),
            };
            let response = Arc::new(response);
            records.insert(key.to_string(), Record::Resolved(response.clone()));
            (owner, response)
        };
        debug!(key = key, status = response.status, "Request resolved");
        self.notify(key, owner, Outcome::Resolved(response.clone()));
        response
    }

    /// Settles the record created for `owner`. If the store was cleared in the
    /// meantime the record is left alone and only that owner's waiters are
    /// woken.
    fn resolve_owned(
        &self,
        key: &str,
        owner: u64,
        response: SerializedResponse,
    ) -> Arc<SerializedResponse> {
        let response = {
            let mut records = self.records();
            match records.get(key) {
                Some(Record::Resolved(existing)) => {
                    warn!(key = key, "Key is already resolved, keeping the first response");
                    existing.clone()
                }
                Some(Record::Inflight { owner: current }) if *current == owner => {
                    let response = Arc::new(response);
                    records.insert(key.to_string(), Record::Resolved(response.clone()));
                    response
                }
                _ => {
                    debug!(key = key, "Store was cleared while the request was inflight");
                    Arc::new(response)
                }
            }
        };
        debug!(key = key, status = response.status, "Request resolved");
        self.notify(key, owner, Outcome::Resolved(response.clone()));
        response
    }

    /// Rolls an in-flight key back to its initial state and hands `error` to
    /// everyone waiting on it.
    pub fn abandon(&self, key: &str, error: Error) {
        let owner = {
            let mut records = self.records();
            match records.get(key) {
                Some(Record::Inflight { owner }) => {
                    let owner = *owner;
                    records.remove(key);
                    owner
                }
                _ => return,
            }
        };
        warn!(key = key, error = %error, "Request abandoned");
        self.notify(key, owner, Outcome::Failed(error));
    }

    /// Rolls the record created for `owner` back to its initial state and
    /// hands `error` to everyone waiting on that owner.
    fn abandon_owned(&self, key: &str, owner: u64, error: Error) {
        {
            let mut records = self.records();
            if let Some(Record::Inflight { owner: current }) = records.get(key) {
                if *current == owner {
                    records.remove(key);
                }
            }
        }
        warn!(key = key, error = %error, "Request abandoned");
        self.notify(key, owner, Outcome::Failed(error));
    }

    /// Waits until `key` settles and returns its response.
    pub async fn await_resolution(&self, key: &str) -> Result<Arc<SerializedResponse>> {
        let waiter = {
            let records = self.records();
            let owner = match records.get(key) {
                Some(Record::Resolved(response)) => return Ok(response.clone()),
                Some(Record::Inflight { owner }) => Some(*owner),
                None => None,
            };
            Waiter {
                key: key.to_string(),
                owner,
                subscription: self.inner.events.subscribe(),
            }
        };
        waiter.wait().await
    }

    /// Checks `key` and, if it is absent, marks it in flight in the same step.
    pub fn lookup(&self, key: &str) -> Lookup {
        let mut records = self.records();
        match records.get(key) {
            Some(Record::Resolved(response)) => Lookup::Resolved(response.clone()),
            Some(Record::Inflight { owner }) => Lookup::Wait(Waiter {
                key: key.to_string(),
                owner: Some(*owner),
                subscription: self.inner.events.subscribe(),
            }),
            None => {
                let owner = self.next_owner();
                records.insert(key.to_string(), Record::Inflight { owner });
                debug!(key = key, "Request inflight");
                Lookup::Owner(InflightGuard {
                    store: self.clone(),
                    key: key.to_string(),
                    owner,
                    finished: false,
                })
            }
        }
    }

    pub fn snapshot(&self) -> HashMap<String, RequestState> {
        self.records()
            .iter()
            .map(|(key, record)| (key.clone(), RequestState::from(record)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    pub fn clear(&self) {
        self.records().clear();
    }
}

/// A caller suspended on another caller's real call.
pub struct Waiter {
    key: String,
    /// `None` accepts whichever owner settles the key.
    owner: Option<u64>,
    subscription: Subscription<StoreEvent>,
}

impl Waiter {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn wait(mut self) -> Result<Arc<SerializedResponse>> {
        while let Some(event) = self.subscription.recv().await {
            if event.key != self.key || self.owner.is_some_and(|owner| owner != event.owner) {
                continue;
            }
            return match event.outcome {
                Outcome::Resolved(response) => Ok(response),
                Outcome::Failed(error) => Err(Error::coalesced(self.key, error)),
            };
        }
        Err(Error::Cancelled { key: self.key })
    }
}

/// Exclusive right to perform the real call for a key.
///
/// Dropping the guard without settling it rolls the key back and wakes the
/// waiters with [`Error::Cancelled`].
pub struct InflightGuard {
    store: CoalescingStore,
    key: String,
    owner: u64,
    finished: bool,
}

impl InflightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn resolve(mut self, response: SerializedResponse) -> Arc<SerializedResponse> {
        self.finished = true;
        self.store.resolve_owned(&self.key, self.owner, response)
    }

    pub fn fail(mut self, error: Error) {
        self.finished = true;
        self.store.abandon_owned(&self.key, self.owner, error);
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.store.abandon_owned(
                &self.key,
                self.owner,
                Error::Cancelled {
                    key: self.key.clone(),
                },
            );
        }
    }
}
