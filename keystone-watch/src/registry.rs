//! Commit-watch registry
//!
//! `CommitWatchers` maps compiled path patterns to buckets of pending
//! watches. `notify` scans the buckets matching a changed path, claims the
//! watches whose baseline the new revision advances past, unlinks them
//! under the lock, and completes them after the lock is released.
//!
//! The bucket map is access-ordered and soft-bounded: once the number of
//! pattern entries exceeds the bound, the least-recently-used entry whose
//! bucket is *empty* is evicted. Entries with live watches are never
//! evicted, so the bound caps idle pattern metadata, not pending watches.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use keystone_core::{PathPattern, Revision};
use lru::LruCache;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::WatchError;
use crate::watch::{Completion, Watch, WatchListener, WatchState};

/// Default bound on idle pattern entries in the bucket map.
pub const DEFAULT_MAX_PATTERN_ENTRIES: usize = 8192;

type Bucket = HashMap<u64, Arc<Watch>>;

/// Registry of pending commit watches for one storage instance.
///
/// Watches are process-local: they are lost on restart, and a commit only
/// fans out within the instance that performed it.
pub struct CommitWatchers {
    inner: Arc<Inner>,
}

struct Inner {
    watches: Mutex<WatcherMap>,
    next_id: AtomicU64,
}

/// Point-in-time registry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchStats {
    /// Number of pattern entries in the bucket map (including empty ones
    /// awaiting eviction).
    pub pattern_entries: usize,
    /// Number of watches awaiting notification.
    pub pending_watches: usize,
}

impl CommitWatchers {
    /// Creates a registry with the default entry bound.
    pub fn new() -> CommitWatchers {
        CommitWatchers::with_capacity(DEFAULT_MAX_PATTERN_ENTRIES)
    }

    /// Creates a registry bounding idle pattern entries to
    /// `max_pattern_entries`.
    pub fn with_capacity(max_pattern_entries: usize) -> CommitWatchers {
        CommitWatchers {
            inner: Arc::new(Inner {
                watches: Mutex::new(WatcherMap::new(max_pattern_entries)),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Registers a watch and returns the handle that will resolve with the
    /// first revision newer than `baseline` that touches a path matching
    /// `pattern`.
    ///
    /// Fails before anything is inserted: on an invalid pattern, a
    /// relative baseline, or a closed registry. Dropping the returned
    /// handle cancels the watch.
    pub fn add(&self, baseline: Revision, pattern: &str) -> Result<WatchHandle, WatchError> {
        let (sender, receiver) = oneshot::channel();
        let (watch, pattern) = self.add0(baseline, pattern, Some(sender), None)?;
        Ok(WatchHandle {
            receiver,
            watch,
            pattern,
            registry: Arc::downgrade(&self.inner),
        })
    }

    /// Registers a listener-completed watch. The listener fires at most
    /// once, outside the registry lock.
    pub fn add_listener(
        &self,
        baseline: Revision,
        pattern: &str,
        listener: Box<dyn WatchListener>,
    ) -> Result<(), WatchError> {
        self.add0(baseline, pattern, None, Some(listener)).map(|_| ())
    }

    fn add0(
        &self,
        baseline: Revision,
        pattern: &str,
        sender: Option<Completion>,
        listener: Option<Box<dyn WatchListener>>,
    ) -> Result<(Arc<Watch>, Arc<PathPattern>), WatchError> {
        if baseline.is_relative() {
            return Err(WatchError::RelativeBaseline(baseline));
        }
        let pattern = PathPattern::of(pattern)?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let watch = Arc::new(Watch::new(id, baseline, sender, listener));

        let mut map = self.inner.watches.lock();
        if let Some(cause) = &map.closed {
            return Err(cause.clone());
        }
        map.insert(Arc::clone(&pattern), Arc::clone(&watch));
        drop(map);

        Ok((watch, pattern))
    }

    /// Fans a committed revision out to the watches matching `path`.
    ///
    /// Callers invoke this once per changed path after a commit. Revisions
    /// are expected to arrive in increasing order; that is a storage-engine
    /// contract, and the registry applies only the per-watch baseline
    /// filter on top of it.
    pub fn notify(&self, revision: Revision, path: &str) {
        let eligible = {
            let mut map = self.inner.watches.lock();
            if map.entries.is_empty() {
                return;
            }
            let mut eligible: Vec<Arc<Watch>> = Vec::new();
            let mut emptied: Vec<Arc<PathPattern>> = Vec::new();
            for (pattern, bucket) in map.entries.iter_mut() {
                if !pattern.matches(path) {
                    continue;
                }
                bucket.retain(|_, watch| {
                    if watch.state() == WatchState::Cancelled || watch.is_abandoned() {
                        return false;
                    }
                    if revision.advances_past(watch.baseline()) {
                        // A failed claim lost to a concurrent cancellation;
                        // drop it from the bucket either way.
                        if watch.claim() {
                            eligible.push(Arc::clone(watch));
                        }
                        false
                    } else {
                        tracing::debug!(
                            baseline = %watch.baseline(),
                            revision = %revision,
                            "not notifying a watch with a same or newer baseline",
                        );
                        true
                    }
                });
                if bucket.is_empty() {
                    emptied.push(Arc::clone(pattern));
                }
            }
            for pattern in emptied {
                map.entries.pop(&pattern);
            }
            eligible
        };

        for watch in eligible {
            watch.deliver(revision);
        }
    }

    /// Terminates every outstanding watch with the error produced by
    /// `cause`, except listener watches that opted out of failure
    /// propagation, which are silently dropped.
    ///
    /// Idempotent: the first close wins, later calls return immediately.
    /// Subsequent `add` calls fail fast with the stored cause.
    pub fn close(&self, cause: impl FnOnce() -> WatchError) {
        let (eligible, error) = {
            let mut map = self.inner.watches.lock();
            if map.closed.is_some() {
                return;
            }
            let error = cause();
            map.closed = Some(error.clone());
            let mut eligible: Vec<Arc<Watch>> = Vec::new();
            while let Some((_, bucket)) = map.entries.pop_lru() {
                for (_, watch) in bucket {
                    if !watch.claim() {
                        continue;
                    }
                    if watch.propagates_failure() {
                        eligible.push(watch);
                    } else {
                        watch.mark_removed();
                    }
                }
            }
            (eligible, error)
        };

        for watch in &eligible {
            watch.fail(&error);
        }
    }

    /// Point-in-time counters, mainly for tests and introspection.
    pub fn stats(&self) -> WatchStats {
        let map = self.inner.watches.lock();
        WatchStats {
            pattern_entries: map.entries.len(),
            pending_watches: map.entries.iter().map(|(_, bucket)| bucket.len()).sum(),
        }
    }
}

impl Default for CommitWatchers {
    fn default() -> CommitWatchers {
        CommitWatchers::new()
    }
}

impl fmt::Debug for CommitWatchers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("CommitWatchers")
            .field("pattern_entries", &stats.pattern_entries)
            .field("pending_watches", &stats.pending_watches)
            .finish()
    }
}

impl Inner {
    /// Removes a cancelled watch from its bucket. Runs from the holder's
    /// side, so it must take the registry lock itself.
    fn unlink(&self, pattern: &PathPattern, id: u64) {
        let mut map = self.watches.lock();
        map.unlink(pattern, id);
    }
}

/// The holder's side of a pending watch.
///
/// Await [`WatchHandle::recv`] to block until the first eligible commit.
/// Dropping the handle before notification cancels the watch and unlinks
/// it from the registry; a cancelled watch is never delivered a revision.
/// Timeouts are the holder's concern (`tokio::time::timeout` around
/// `recv`).
pub struct WatchHandle {
    receiver: oneshot::Receiver<Result<Revision, WatchError>>,
    watch: Arc<Watch>,
    pattern: Arc<PathPattern>,
    registry: Weak<Inner>,
}

impl WatchHandle {
    /// The registry-assigned watch id.
    pub fn id(&self) -> u64 {
        self.watch.id()
    }

    /// The baseline this watch waits to advance past.
    pub fn baseline(&self) -> Revision {
        self.watch.baseline()
    }

    /// The compiled pattern this watch is registered under.
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Waits for the first eligible commit.
    ///
    /// Resolves with the delivered revision, or with the close cause if
    /// the registry shut down first.
    pub async fn recv(mut self) -> Result<Revision, WatchError> {
        match (&mut self.receiver).await {
            Ok(result) => result,
            Err(_) => Err(WatchError::Aborted),
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        // Delivery already claimed the watch: nothing to clean up.
        if !self.watch.cancel() {
            return;
        }
        if let Some(inner) = self.registry.upgrade() {
            inner.unlink(&self.pattern, self.watch.id());
        }
        self.watch.mark_removed();
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("id", &self.watch.id())
            .field("baseline", &self.watch.baseline())
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

/// Access-ordered pattern → bucket map with empty-entry-only eviction.
struct WatcherMap {
    entries: LruCache<Arc<PathPattern>, Bucket>,
    max_entries: usize,
    closed: Option<WatchError>,
}

impl WatcherMap {
    fn new(max_entries: usize) -> WatcherMap {
        WatcherMap {
            entries: LruCache::unbounded(),
            max_entries,
            closed: None,
        }
    }

    fn insert(&mut self, pattern: Arc<PathPattern>, watch: Arc<Watch>) {
        let bucket = self.entries.get_or_insert_mut(pattern, Bucket::new);
        bucket.insert(watch.id(), watch);
        self.evict_idle();
    }

    /// Once the bound is exceeded, evicts the least-recently-used entry
    /// whose bucket is empty. Non-empty buckets are never evicted, which
    /// makes the bound a soft cap: with enough live patterns the map grows
    /// past it.
    fn evict_idle(&mut self) {
        if self.entries.len() <= self.max_entries {
            return;
        }
        let victim = self
            .entries
            .iter()
            .rev()
            .find(|(_, bucket)| bucket.is_empty())
            .map(|(pattern, _)| Arc::clone(pattern));
        if let Some(pattern) = victim {
            self.entries.pop(&pattern);
        }
    }

    fn unlink(&mut self, pattern: &PathPattern, id: u64) {
        if let Some(bucket) = self.entries.peek_mut(pattern) {
            bucket.remove(&id);
            if bucket.is_empty() {
                self.entries.pop(pattern);
            }
        }
    }
}
