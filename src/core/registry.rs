//! Purpose: Pending-request and response-cache registry keyed by task key.
//! Exports: `RequestRegistry`, `CachePolicy`, `PendingResult`, `Outcome`.
//! Role: Single owner of in-flight calls; shares one network round trip per cached key.
//! Invariants: While caching is enabled, at most one in-flight call exists per key.
//! Invariants: The first outcome published for a call wins; later ones are dropped.
//! Invariants: Failed outcomes are never left in the cache.
//! Invariants: Eviction only detaches cache entries; in-flight waiters still resolve.
//! Notes: Constructed once per application and handed to clients explicitly.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::AbortHandle;

use super::error::{Error, ErrorKind};
use super::payload::Payload;
use super::task_key::{TaskKey, normalize_path};

pub type Outcome = Result<Payload, Error>;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CachePolicy {
    #[default]
    Off,
    /// Cached until cleared or cancelled.
    Forever,
    Ttl(Duration),
}

impl CachePolicy {
    pub fn enabled(self) -> bool {
        !matches!(self, CachePolicy::Off)
    }

    fn ttl(self) -> Option<Duration> {
        match self {
            CachePolicy::Ttl(ttl) => Some(ttl),
            _ => None,
        }
    }
}

impl From<bool> for CachePolicy {
    fn from(enabled: bool) -> Self {
        if enabled {
            CachePolicy::Forever
        } else {
            CachePolicy::Off
        }
    }
}

impl From<Duration> for CachePolicy {
    fn from(ttl: Duration) -> Self {
        CachePolicy::Ttl(ttl)
    }
}

/// Handle on a shared result slot; every waiter on a key holds one.
pub struct PendingResult {
    key: TaskKey,
    receiver: watch::Receiver<Option<Outcome>>,
}

impl PendingResult {
    pub fn key(&self) -> &TaskKey {
        &self.key
    }

    pub async fn wait(self) -> Outcome {
        let PendingResult { key, mut receiver } = self;
        match receiver.wait_for(Option::is_some).await {
            Ok(slot) => (*slot).clone().unwrap_or_else(|| Err(cancelled_error(&key))),
            Err(_) => Err(cancelled_error(&key)),
        }
    }
}

pub(crate) enum Registration {
    Joined(PendingResult),
    Leader(LeaderTicket),
}

pub(crate) struct LeaderTicket {
    pub(crate) id: u64,
    pub(crate) result: PendingResult,
}

struct InFlight {
    key: TaskKey,
    sender: watch::Sender<Option<Outcome>>,
    abort: Option<AbortHandle>,
    cache: CachePolicy,
    cancel_on_navigation: bool,
}

struct CacheEntry {
    id: u64,
    receiver: watch::Receiver<Option<Outcome>>,
    inserted_at: Instant,
    ttl: Option<Duration>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.saturating_duration_since(self.inserted_at) > ttl,
            None => false,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    in_flight: HashMap<u64, InFlight>,
    cache: HashMap<TaskKey, CacheEntry>,
}

#[derive(Default)]
pub struct RequestRegistry {
    state: Mutex<RegistryState>,
    next_id: AtomicU64,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins a live cached slot for `key` or registers a new in-flight call.
    pub(crate) fn register(
        &self,
        key: TaskKey,
        cache: CachePolicy,
        cancel_on_navigation: bool,
    ) -> Registration {
        let now = Instant::now();
        let mut state = self.lock();
        if cache.enabled() {
            let RegistryState { in_flight, cache: entries } = &mut *state;
            let mut stale = false;
            if let Some(entry) = entries.get(&key) {
                let flight = in_flight.get_mut(&entry.id);
                let pending = flight.is_some();
                if pending || !entry.is_expired(now) {
                    // A pinned joiner pins the shared call.
                    if let Some(flight) = flight {
                        flight.cancel_on_navigation &= cancel_on_navigation;
                    }
                    tracing::debug!(key = %key, in_flight = pending, "request served from registry");
                    return Registration::Joined(PendingResult {
                        key,
                        receiver: entry.receiver.clone(),
                    });
                }
                stale = true;
            }
            if stale {
                tracing::debug!(key = %key, "cache entry expired");
                entries.remove(&key);
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = watch::channel(None);
        state.in_flight.insert(
            id,
            InFlight {
                key: key.clone(),
                sender,
                abort: None,
                cache,
                cancel_on_navigation,
            },
        );
        if cache.enabled() {
            state.cache.insert(
                key.clone(),
                CacheEntry {
                    id,
                    receiver: receiver.clone(),
                    inserted_at: now,
                    ttl: cache.ttl(),
                },
            );
        }
        Registration::Leader(LeaderTicket {
            id,
            result: PendingResult { key, receiver },
        })
    }

    pub(crate) fn attach_abort(&self, id: u64, handle: AbortHandle) {
        let mut state = self.lock();
        match state.in_flight.get_mut(&id) {
            Some(flight) => flight.abort = Some(handle),
            // Already completed or cancelled; aborting a finished task is a no-op.
            None => handle.abort(),
        }
    }

    /// Takes call `id` out of the in-flight set so cancellation can no longer reach it.
    /// Returns `None` if it was cancelled first. The claim publishes on drop if the
    /// caller never does.
    pub(crate) fn claim(&self, id: u64) -> Option<Claim<'_>> {
        let flight = self.lock().in_flight.remove(&id)?;
        Some(Claim {
            registry: self,
            id,
            flight: Some(flight),
        })
    }

    /// Publishes the outcome of call `id`. Returns false if it was cancelled first.
    pub(crate) fn complete(&self, id: u64, outcome: Outcome) -> bool {
        match self.claim(id) {
            Some(claim) => {
                claim.publish(outcome);
                true
            }
            None => false,
        }
    }

    fn publish(&self, id: u64, flight: InFlight, outcome: Outcome) {
        let mut state = self.lock();
        let keep_cached = flight.cache.enabled() && outcome.is_ok();
        flight.sender.send_replace(Some(outcome));
        if !keep_cached {
            remove_cache_entry_for(&mut state, &flight.key, id);
        }
    }

    /// Cancels in-flight calls for `keys` and drops their cached entries.
    pub fn cancel(&self, keys: &[TaskKey]) -> usize {
        let mut state = self.lock();
        let ids: Vec<u64> = state
            .in_flight
            .iter()
            .filter(|(_, flight)| keys.contains(&flight.key))
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            if let Some(flight) = state.in_flight.remove(id) {
                reject_cancelled(flight);
            }
        }
        for key in keys {
            state.cache.remove(key);
        }
        if !ids.is_empty() {
            tracing::debug!(cancelled = ids.len(), "cancelled in-flight requests");
        }
        ids.len()
    }

    /// Cancels every in-flight call registered with `cancel_on_navigation`.
    pub fn cancel_navigation(&self) -> usize {
        self.cancel_where(|flight| flight.cancel_on_navigation)
    }

    pub fn cancel_all(&self) -> usize {
        self.cancel_where(|_| true)
    }

    /// Drops cache entries for `keys`. Calls still in flight keep running for their
    /// current waiters, but later lookups start a fresh call.
    pub fn evict(&self, keys: &[TaskKey]) -> usize {
        let mut state = self.lock();
        keys.iter()
            .filter(|key| state.cache.remove(*key).is_some())
            .count()
    }

    /// Drops cache entries whose request path starts with `prefix`.
    pub fn evict_prefix(&self, prefix: &str) -> usize {
        let prefix = normalize_path(prefix);
        let mut state = self.lock();
        let before = state.cache.len();
        state.cache.retain(|key, _| !key.path().starts_with(&prefix));
        before - state.cache.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.lock().in_flight.len()
    }

    pub fn cached_count(&self) -> usize {
        self.lock().cache.len()
    }

    pub fn contains(&self, key: &TaskKey) -> bool {
        let state = self.lock();
        state.cache.contains_key(key) || state.in_flight.values().any(|flight| &flight.key == key)
    }

    fn cancel_where(&self, predicate: impl Fn(&InFlight) -> bool) -> usize {
        let mut state = self.lock();
        let ids: Vec<u64> = state
            .in_flight
            .iter()
            .filter(|(_, flight)| predicate(flight))
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            if let Some(flight) = state.in_flight.remove(id) {
                remove_cache_entry_for(&mut state, &flight.key, *id);
                reject_cancelled(flight);
            }
        }
        ids.len()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An in-flight call owned by its leader task between the network round trip and
/// publication.
pub(crate) struct Claim<'a> {
    registry: &'a RequestRegistry,
    id: u64,
    flight: Option<InFlight>,
}

impl Claim<'_> {
    pub(crate) fn publish(mut self, outcome: Outcome) {
        if let Some(flight) = self.flight.take() {
            self.registry.publish(self.id, flight, outcome);
        }
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if let Some(flight) = self.flight.take() {
            let err = Error::new(ErrorKind::Internal)
                .with_message(format!("request abandoned before completion: {}", flight.key));
            self.registry.publish(self.id, flight, Err(err));
        }
    }
}

fn remove_cache_entry_for(state: &mut RegistryState, key: &TaskKey, id: u64) {
    if state.cache.get(key).is_some_and(|entry| entry.id == id) {
        state.cache.remove(key);
    }
}

fn reject_cancelled(flight: InFlight) {
    flight
        .sender
        .send_replace(Some(Err(cancelled_error(&flight.key))));
    if let Some(abort) = flight.abort {
        abort.abort();
    }
}

pub(crate) fn cancelled_error(key: &TaskKey) -> Error {
    Error::new(ErrorKind::Cancelled).with_message(format!("request cancelled: {key}"))
}
