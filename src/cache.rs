//! Derived-image cache.
//!
//! Compositing and encoding are the expensive part of a request. This module
//! keeps the encoded bytes of every successful transform in memory, keyed by
//! a fingerprint of the request, and makes sure concurrent requests for the
//! same output do the work only once.
//!
//! # Design
//!
//! ## Cache keys
//!
//! A [`Fingerprint`] is the SHA-256 of every field that changes output
//! bytes: source identifier, width, height, mode (with anchor or crop
//! ratios), effective background colour and output format. Two requests
//! differing in any of those never share an entry.
//!
//! ## Expiry
//!
//! Entries use a sliding expiration: every hit pushes the deadline out by the
//! configured window. [`MemoryStore`] leaves eviction to `moka`, which drops
//! idle entries in its housekeeping without waiting for a lookup.
//! [`ClockedStore`] follows an injected [`Clock`] so tests can move time by
//! hand; it sweeps expired entries whenever something is inserted.
//!
//! ## Single flight
//!
//! [`DerivedImageCache::get_or_compute`] registers the first caller for a
//! missing key as the leader. Later callers for the same key block until the
//! leader publishes its outcome and receive that same outcome, error
//! included. Only successes are stored. If the leader panics, its waiters are
//! released with an error and the next caller starts a fresh computation.

use crate::imaging::{ImagingError, Rgb, TransformMode, TransformRequest};
use log::debug;
use moka::Expiry;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Version of the key computation. Bump to invalidate every existing entry
/// when the key layout or the rendering changes.
const KEY_VERSION: u32 = 1;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Fingerprint
// ============================================================================

/// Hex SHA-256 identifying one derived image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of `request` rendered with `background`, the colour the
    /// request resolves to once the configured default is applied.
    pub fn of(request: &TransformRequest, background: Rgb) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"derived-image\0");
        hasher.update(KEY_VERSION.to_le_bytes());

        hasher.update(request.source.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(request.width.to_le_bytes());
        hasher.update(request.height.to_le_bytes());

        match request.mode {
            TransformMode::Fit => hasher.update([0]),
            TransformMode::FillCrop { anchor } => hasher.update([1, anchor.tag()]),
            TransformMode::RatioCrop(ratios) => {
                hasher.update([2]);
                for value in [ratios.width(), ratios.height(), ratios.left(), ratios.top()] {
                    hasher.update(value.to_bits().to_le_bytes());
                }
            }
            TransformMode::BoundedMax => hasher.update([3]),
        }

        hasher.update([background.r, background.g, background.b]);
        hasher.update([request.format.tag()]);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Source of the current time for [`ClockedStore`] expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Hand-driven clock. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *lock(&self.now) += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *lock(&self.now)
    }
}

// ============================================================================
// Store
// ============================================================================

/// Where encoded derived images live between requests.
pub trait CacheStore: Send + Sync {
    /// Bytes for `key` if present and not expired. A hit refreshes the entry's
    /// sliding expiration.
    fn get(&self, key: &Fingerprint) -> Option<Arc<[u8]>>;

    /// Store `bytes` under `key`, expiring after `ttl` without a hit.
    fn put(&self, key: Fingerprint, bytes: Arc<[u8]>, ttl: Duration);
}

#[derive(Debug, Clone)]
struct Entry {
    bytes: Arc<[u8]>,
    ttl: Duration,
}

/// Per-entry idle expiry: every write or read restarts the entry's window.
struct SlidingExpiry;

impl Expiry<Fingerprint, Entry> for SlidingExpiry {
    fn expire_after_create(
        &self,
        _key: &Fingerprint,
        entry: &Entry,
        _at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_read(
        &self,
        _key: &Fingerprint,
        entry: &Entry,
        _at: Instant,
        _remaining: Option<Duration>,
        _last_modified: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &Fingerprint,
        entry: &Entry,
        _at: Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process store backed by [`moka`], with sliding expiration and
/// background eviction of idle entries.
#[derive(Clone)]
pub struct MemoryStore {
    entries: moka::sync::Cache<Fingerprint, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: moka::sync::Cache::builder()
                .expire_after(SlidingExpiry)
                .build(),
        }
    }

    /// Number of live entries, after pending evictions have run.
    pub fn len(&self) -> usize {
        self.entries.run_pending_tasks();
        self.entries.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &Fingerprint) -> Option<Arc<[u8]>> {
        self.entries.get(key).map(|entry| entry.bytes)
    }

    fn put(&self, key: Fingerprint, bytes: Arc<[u8]>, ttl: Duration) {
        self.entries.insert(key, Entry { bytes, ttl });
    }
}

#[derive(Debug)]
struct ClockedEntry {
    entry: Entry,
    expires_at: Instant,
}

/// Store whose expiry follows an injected [`Clock`], for deterministic
/// tests of sliding expiration. Expired entries are swept on every insert.
#[derive(Debug)]
pub struct ClockedStore<C: Clock> {
    clock: C,
    entries: Mutex<HashMap<Fingerprint, ClockedEntry>>,
}

impl<C: Clock> ClockedStore<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, held| held.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C: Clock> CacheStore for ClockedStore<C> {
    fn get(&self, key: &Fingerprint) -> Option<Arc<[u8]>> {
        let now = self.clock.now();
        let mut entries = lock(&self.entries);
        let held = entries.get_mut(key)?;
        if held.expires_at <= now {
            entries.remove(key);
            return None;
        }
        held.expires_at = now + held.entry.ttl;
        Some(Arc::clone(&held.entry.bytes))
    }

    fn put(&self, key: Fingerprint, bytes: Arc<[u8]>, ttl: Duration) {
        let now = self.clock.now();
        let mut entries = lock(&self.entries);
        entries.retain(|_, held| held.expires_at > now);
        entries.insert(
            key,
            ClockedEntry {
                entry: Entry { bytes, ttl },
                expires_at: now + ttl,
            },
        );
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Snapshot of cache counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Served from the store.
    pub hits: u64,
    /// Computed by this caller.
    pub misses: u64,
    /// Waited on another caller's computation.
    pub coalesced: u64,
}

impl CacheStats {
    pub fn total(&self) -> u64 {
        self.hits + self.misses + self.coalesced
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 || self.coalesced > 0 {
            if self.coalesced > 0 {
                write!(
                    f,
                    "{} cached, {} coalesced, {} rendered ({} total)",
                    self.hits,
                    self.coalesced,
                    self.misses,
                    self.total()
                )
            } else {
                write!(
                    f,
                    "{} cached, {} rendered ({} total)",
                    self.hits,
                    self.misses,
                    self.total()
                )
            }
        } else {
            write!(f, "{} rendered", self.misses)
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
}

// ============================================================================
// Single-flight cache
// ============================================================================

type Outcome = Result<Arc<[u8]>, ImagingError>;

/// One in-progress computation that followers wait on.
#[derive(Default)]
struct Flight {
    outcome: Mutex<Option<Outcome>>,
    ready: Condvar,
}

impl Flight {
    fn wait(&self) -> Outcome {
        let mut outcome = lock(&self.outcome);
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            outcome = self
                .ready
                .wait(outcome)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Publishes the leader's outcome exactly once, even when the leader unwinds.
struct Leader<'a> {
    in_flight: &'a Mutex<HashMap<Fingerprint, Arc<Flight>>>,
    key: &'a Fingerprint,
    flight: Arc<Flight>,
    published: bool,
}

impl Leader<'_> {
    fn publish(&mut self, outcome: Outcome) {
        lock(self.in_flight).remove(self.key);
        *lock(&self.flight.outcome) = Some(outcome);
        self.flight.ready.notify_all();
        self.published = true;
    }
}

impl Drop for Leader<'_> {
    fn drop(&mut self) {
        if !self.published {
            self.publish(Err(ImagingError::EncodingFailure(format!(
                "computation for {} did not complete",
                self.key
            ))));
        }
    }
}

/// Store plus single-flight coordination and counters.
pub struct DerivedImageCache<S: CacheStore> {
    store: S,
    ttl: Duration,
    in_flight: Mutex<HashMap<Fingerprint, Arc<Flight>>>,
    counters: Counters,
}

impl<S: CacheStore> DerivedImageCache<S> {
    pub fn new(store: S, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            in_flight: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached bytes for `key`, computing them at most once across all
    /// concurrent callers.
    ///
    /// Only successful results are stored; an error is handed to the callers
    /// that were waiting and the next request tries again.
    pub fn get_or_compute<F>(&self, key: &Fingerprint, compute: F) -> Outcome
    where
        F: FnOnce() -> Result<Vec<u8>, ImagingError>,
    {
        if let Some(bytes) = self.store.get(key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!("cache hit {key}");
            return Ok(bytes);
        }

        let (flight, leading) = {
            let mut in_flight = lock(&self.in_flight);
            match in_flight.get(key) {
                Some(flight) => (Arc::clone(flight), false),
                None => {
                    let flight = Arc::new(Flight::default());
                    in_flight.insert(key.clone(), Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if !leading {
            self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
            debug!("cache coalesced {key}");
            return flight.wait();
        }

        let mut leader = Leader {
            in_flight: &self.in_flight,
            key,
            flight,
            published: false,
        };

        // Another leader may have finished between the first lookup and registration
        if let Some(bytes) = self.store.get(key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            leader.publish(Ok(Arc::clone(&bytes)));
            return Ok(bytes);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!("cache miss {key}");
        let outcome: Outcome = compute().map(Arc::from);
        if let Ok(bytes) = &outcome {
            self.store.put(key.clone(), Arc::clone(bytes), self.ttl);
        }
        leader.publish(outcome.clone());
        outcome
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
        }
    }
}
