use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use chrono::{TimeZone, Utc};

use crate::{
    Clock, ConditionalIncrement, DailyLimit, KeySegment, LimitStore, ManualClock, MemoryLimitStore,
    PolicyTable, RateLimitPolicy, StoreUnavailable, Throttle, ThrottleOptions, UtcDay,
};

pub(super) const ACTION: &str = "FEEDBACK";

pub(super) fn epoch(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> i64 {
    Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap().timestamp()
}

/// 2025-03-11 09:00:00 UTC
pub(super) fn t0() -> i64 {
    epoch(2025, 3, 11, 9, 0, 0)
}

pub(super) fn policy(
    minute_window_seconds: u64,
    actor_daily_limit: u64,
    global_daily_limit: u64,
) -> RateLimitPolicy {
    RateLimitPolicy {
        minute_window_seconds,
        actor_daily_limit: DailyLimit::try_from(actor_daily_limit).unwrap(),
        global_daily_limit: DailyLimit::try_from(global_daily_limit).unwrap(),
    }
}

pub(super) fn throttle_with<S: LimitStore>(
    store: S,
    clock: &Arc<ManualClock>,
    policies: PolicyTable,
) -> Throttle<S> {
    Throttle::new(ThrottleOptions {
        store,
        policies,
        prefix: None,
        clock: Some(clock.clone() as Arc<dyn Clock>),
    })
}

pub(super) fn memory_throttle(
    policy: RateLimitPolicy,
    clock: &Arc<ManualClock>,
) -> Throttle<MemoryLimitStore> {
    let policies = PolicyTable::new().with_policy(ACTION, policy).unwrap();
    throttle_with(MemoryLimitStore::new(), clock, policies)
}

pub(super) fn segment(s: &str) -> KeySegment {
    KeySegment::try_from(s).unwrap()
}

pub(super) fn day_of(epoch_seconds: i64) -> UtcDay {
    UtcDay::from_epoch_seconds(epoch_seconds).unwrap()
}

pub(super) async fn minute_mark<S: LimitStore>(
    throttle: &Throttle<S>,
    actor: &str,
) -> Option<i64> {
    let key = throttle
        .key_scheme()
        .minute_key(&segment(actor), &segment(ACTION));
    throttle.store().get_timestamp(&key).await.unwrap()
}

pub(super) async fn actor_daily<S: LimitStore>(
    throttle: &Throttle<S>,
    actor: &str,
    day: &UtcDay,
) -> Option<u64> {
    let key = throttle
        .key_scheme()
        .actor_daily_key(&segment(actor), &segment(ACTION), day);
    throttle.store().get_counter(&key).await.unwrap()
}

pub(super) async fn global_daily<S: LimitStore>(
    throttle: &Throttle<S>,
    day: &UtcDay,
) -> Option<u64> {
    let key = throttle.key_scheme().global_daily_key(&segment(ACTION), day);
    throttle.store().get_counter(&key).await.unwrap()
}

/// Memory store with switchable per-operation faults.
#[derive(Debug, Default)]
pub(super) struct FlakyStore {
    pub inner: MemoryLimitStore,
    pub fail_get_counter: AtomicBool,
    pub fail_get_timestamp: AtomicBool,
    pub fail_set_timestamp: AtomicBool,
    pub fail_increment: AtomicBool,
    pub fail_increment_if_below: AtomicBool,
}

impl FlakyStore {
    pub fn fail_reads(&self) {
        self.fail_get_counter.store(true, Ordering::SeqCst);
        self.fail_get_timestamp.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_set_timestamp.store(true, Ordering::SeqCst);
        self.fail_increment.store(true, Ordering::SeqCst);
        self.fail_increment_if_below.store(true, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        for flag in [
            &self.fail_get_counter,
            &self.fail_get_timestamp,
            &self.fail_set_timestamp,
            &self.fail_increment,
            &self.fail_increment_if_below,
        ] {
            flag.store(false, Ordering::SeqCst);
        }
    }

    fn check(
        flag: &AtomicBool,
        operation: &'static str,
        key: &str,
    ) -> Result<(), StoreUnavailable> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreUnavailable::new(operation, key, "injected fault"))
        } else {
            Ok(())
        }
    }
}

impl LimitStore for FlakyStore {
    async fn get_counter(&self, key: &str) -> Result<Option<u64>, StoreUnavailable> {
        Self::check(&self.fail_get_counter, "get_counter", key)?;
        self.inner.get_counter(key).await
    }

    async fn get_timestamp(&self, key: &str) -> Result<Option<i64>, StoreUnavailable> {
        Self::check(&self.fail_get_timestamp, "get_timestamp", key)?;
        self.inner.get_timestamp(key).await
    }

    async fn set_timestamp(&self, key: &str, epoch_seconds: i64) -> Result<(), StoreUnavailable> {
        Self::check(&self.fail_set_timestamp, "set_timestamp", key)?;
        self.inner.set_timestamp(key, epoch_seconds).await
    }

    async fn increment(&self, key: &str, expires_at: i64) -> Result<u64, StoreUnavailable> {
        Self::check(&self.fail_increment, "increment", key)?;
        self.inner.increment(key, expires_at).await
    }

    async fn increment_if_below(
        &self,
        key: &str,
        expires_at: i64,
        limit: u64,
    ) -> Result<ConditionalIncrement, StoreUnavailable> {
        Self::check(&self.fail_increment_if_below, "increment_if_below", key)?;
        self.inner.increment_if_below(key, expires_at, limit).await
    }
}
