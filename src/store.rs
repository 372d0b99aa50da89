//! Contract over the shared key-value store that holds all quota state.
//!
//! The guard keeps no state of its own between invocations; everything it knows comes
//! from round-trips through a [`LimitStore`]. Any backing store with per-key atomic
//! counters and a conditional write satisfies the contract:
//!
//! - [`MemoryLimitStore`](crate::MemoryLimitStore): in-process, for single-process
//!   deployments and tests
//! - `RedisLimitStore` (features `redis-tokio` / `redis-smol`): shared across processes

use std::future::Future;

use crate::StoreUnavailable;

/// Result of [`LimitStore::increment_if_below`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalIncrement {
    /// The counter was below the limit (or absent) and now holds this value.
    Incremented(u64),
    /// The counter had already reached the limit and was left unchanged.
    Rejected,
}

/// Atomic primitives over a remote key-value store.
///
/// Every failure to talk to the store is reported as [`StoreUnavailable`]; a missing
/// record is `Ok(None)`, never an error.
pub trait LimitStore: Send + Sync {
    /// Read a counter. `None` if the record does not exist.
    fn get_counter(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<u64>, StoreUnavailable>> + Send;

    /// Read a timestamp in epoch seconds. `None` if the record does not exist.
    fn get_timestamp(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<i64>, StoreUnavailable>> + Send;

    /// Unconditionally overwrite a timestamp.
    fn set_timestamp(
        &self,
        key: &str,
        epoch_seconds: i64,
    ) -> impl Future<Output = Result<(), StoreUnavailable>> + Send;

    /// Atomically add one to a counter, creating it at 1 when absent.
    ///
    /// Sets the record's expiry to `expires_at` (epoch seconds) on every call.
    /// Returns the post-increment count.
    fn increment(
        &self,
        key: &str,
        expires_at: i64,
    ) -> impl Future<Output = Result<u64, StoreUnavailable>> + Send;

    /// Atomically add one to a counter only if it is strictly below `limit` or absent.
    ///
    /// On success the expiry is set to `expires_at`. When the counter already reached
    /// `limit` the record is left untouched and [`ConditionalIncrement::Rejected`] is
    /// returned.
    fn increment_if_below(
        &self,
        key: &str,
        expires_at: i64,
        limit: u64,
    ) -> impl Future<Output = Result<ConditionalIncrement, StoreUnavailable>> + Send;
}
