use std::{
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use dashmap::{DashMap, mapref::entry::Entry};

use crate::{Clock, ConditionalIncrement, LimitStore, StoreUnavailable, SystemClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CounterRecord {
    pub count: u64,
    pub expires_at: i64,
}

/// In-process [`LimitStore`].
///
/// Counters and timestamps live in two [`DashMap`]s. Increments take the entry's shard
/// lock for the whole read-modify-write, which makes [`LimitStore::increment`] and
/// [`LimitStore::increment_if_below`] linearizable per key.
///
/// # Reclamation
///
/// Like a remote store with TTL support, expiry is lazy: an expired counter is still
/// returned by reads until reclamation removes it. Call [`MemoryLimitStore::cleanup`]
/// directly or start [`MemoryLimitStore::run_cleanup_loop`]. Minute marks carry no
/// expiry and are never reclaimed.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tiergate::{ConditionalIncrement, LimitStore, MemoryLimitStore};
///
/// # tokio_test_block_on(async {
/// let store = Arc::new(MemoryLimitStore::new());
///
/// assert_eq!(store.increment("k", i64::MAX).await.unwrap(), 1);
/// assert_eq!(
///     store.increment_if_below("k", i64::MAX, 1).await.unwrap(),
///     ConditionalIncrement::Rejected
/// );
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryLimitStore {
    counters: DashMap<String, CounterRecord>,
    timestamps: DashMap<String, i64>,
    clock: Arc<dyn Clock>,
    cleanup_generation: AtomicU64,
}

impl Default for MemoryLimitStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLimitStore {
    /// Create an empty store that reclaims against the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store that reclaims against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: DashMap::new(),
            timestamps: DashMap::new(),
            clock,
            cleanup_generation: AtomicU64::new(0),
        }
    }

    #[cfg(test)]
    pub(crate) fn counters(&self) -> &DashMap<String, CounterRecord> {
        &self.counters
    }

    #[cfg(test)]
    pub(crate) fn timestamps(&self) -> &DashMap<String, i64> {
        &self.timestamps
    }

    /// Number of counter records currently held, expired or not.
    pub fn counter_count(&self) -> usize {
        self.counters.len()
    }

    /// Remove counter records whose expiry has passed. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now_epoch_seconds();
        let before = self.counters.len();

        self.counters.retain(|_, record| record.expires_at > now);

        before.saturating_sub(self.counters.len())
    } // end method cleanup

    /// Run [`MemoryLimitStore::cleanup`] every `interval` on a background thread.
    ///
    /// The thread holds only a weak reference and exits once the store is dropped or
    /// the loop is stopped. Starting the loop again replaces the running one.
    pub fn run_cleanup_loop(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let generation = self.cleanup_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let store: Weak<Self> = Arc::downgrade(self);

        thread::spawn(move || {
            loop {
                thread::sleep(interval);

                let Some(store) = store.upgrade() else {
                    break;
                };

                if store.cleanup_generation.load(Ordering::SeqCst) != generation {
                    break;
                }

                let removed = store.cleanup();
                if removed > 0 {
                    tracing::debug!(removed, "memory.cleanup, reclaimed expired counters");
                }
            }
        })
    } // end method run_cleanup_loop

    /// Stop a loop started by [`MemoryLimitStore::run_cleanup_loop`].
    ///
    /// The thread notices on its next wake-up and exits without cleaning.
    pub fn stop_cleanup_loop(&self) {
        self.cleanup_generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl LimitStore for MemoryLimitStore {
    async fn get_counter(&self, key: &str) -> Result<Option<u64>, StoreUnavailable> {
        Ok(self.counters.get(key).map(|record| record.count))
    }

    async fn get_timestamp(&self, key: &str) -> Result<Option<i64>, StoreUnavailable> {
        Ok(self.timestamps.get(key).map(|ts| *ts))
    }

    async fn set_timestamp(&self, key: &str, epoch_seconds: i64) -> Result<(), StoreUnavailable> {
        self.timestamps.insert(key.to_string(), epoch_seconds);
        Ok(())
    }

    async fn increment(&self, key: &str, expires_at: i64) -> Result<u64, StoreUnavailable> {
        let mut record = self
            .counters
            .entry(key.to_string())
            .or_insert(CounterRecord {
                count: 0,
                expires_at,
            });

        record.count = record.count.saturating_add(1);
        record.expires_at = expires_at;

        Ok(record.count)
    }

    async fn increment_if_below(
        &self,
        key: &str,
        expires_at: i64,
        limit: u64,
    ) -> Result<ConditionalIncrement, StoreUnavailable> {
        match self.counters.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                if record.count >= limit {
                    return Ok(ConditionalIncrement::Rejected);
                }

                record.count += 1;
                record.expires_at = expires_at;

                Ok(ConditionalIncrement::Incremented(record.count))
            }
            Entry::Vacant(entry) => {
                entry.insert(CounterRecord {
                    count: 1,
                    expires_at,
                });

                Ok(ConditionalIncrement::Incremented(1))
            }
        }
    }
}
