use std::{future::Future, sync::Arc};

use crate::{
    Clock, KeyScheme, KeySegment, LimitStore, LimitTier, PolicyTable, RateLimitExceeded,
    StoreUnavailable, SystemClock, ThrottleGuard, ThrottledError, TiergateError, UtcDay,
};

/// Configuration for [`Throttle`].
///
/// # Examples
///
/// ```
/// use tiergate::{MemoryLimitStore, PolicyTable, RateLimitPolicy, Throttle, ThrottleOptions};
///
/// let throttle = Throttle::new(ThrottleOptions {
///     store: MemoryLimitStore::new(),
///     policies: PolicyTable::new()
///         .with_policy("PRIMM_FEEDBACK", RateLimitPolicy::default())
///         .unwrap(),
///     prefix: None,
///     clock: None,
/// });
///
/// assert_eq!(throttle.key_scheme().prefix().as_str(), "tiergate");
/// ```
#[derive(Debug)]
pub struct ThrottleOptions<S> {
    /// Backing store holding all quota state.
    pub store: S,

    /// Quotas per action type. Calls for unregistered action types are refused.
    pub policies: PolicyTable,

    /// Optional prefix for all store keys.
    ///
    /// If `None`, defaults to `"tiergate"`.
    pub prefix: Option<KeySegment>,

    /// Optional time source. If `None`, the system clock is used.
    pub clock: Option<Arc<dyn Clock>>,
}

/// Three-tier quota gate for cost-bearing actions.
///
/// Holds no quota state of its own: every check and every commit is a round-trip to the
/// [`LimitStore`], so any number of stateless workers can share one store.
///
/// # Tiers
///
/// For each action type's [`RateLimitPolicy`](crate::RateLimitPolicy):
///
/// 1. **Actor minute:** one admitted call per `minute_window_seconds` per actor
/// 2. **Actor daily:** at most `actor_daily_limit` calls per actor per UTC day (soft)
/// 3. **Global daily:** at most `global_daily_limit` calls per UTC day (hard)
///
/// # Consistency Semantics
///
/// - Admission reads the three tiers without locking; commits happen only after the
///   guarded action succeeded.
/// - The actor-daily commit is an unconditional increment, so a burst of concurrent
///   admitted calls from one actor may overshoot `actor_daily_limit` slightly.
/// - The global-daily commit is a conditional increment and can never push the counter
///   past `global_daily_limit`. A call admitted just before the limit was reached still
///   completes normally; its commit is reported as [`GuardState::RaceLost`](crate::GuardState::RaceLost).
/// - Store faults during admission reject the call; store faults during commit are
///   logged and skipped step by step.
pub struct Throttle<S> {
    store: S,
    policies: PolicyTable,
    key_scheme: KeyScheme,
    clock: Arc<dyn Clock>,
}

impl<S: LimitStore> Throttle<S> {
    /// Create a new [`Throttle`].
    pub fn new(options: ThrottleOptions<S>) -> Self {
        let prefix = options.prefix.unwrap_or_else(KeySegment::default_prefix);

        Self {
            store: options.store,
            policies: options.policies,
            key_scheme: KeyScheme::new(prefix),
            clock: options.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The policy table.
    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    /// The key scheme used to address the store.
    pub fn key_scheme(&self) -> &KeyScheme {
        &self.key_scheme
    }

    /// Run the admission checks for `actor_id` performing `action_type`.
    ///
    /// On success the returned guard is [`Admitted`](crate::GuardState::Admitted): run the
    /// guarded action, then call [`ThrottleGuard::commit`] if it succeeded or
    /// [`ThrottleGuard::abort`] if it failed. Dropping the guard without either records
    /// nothing.
    ///
    /// # Errors
    ///
    /// - [`TiergateError::RateLimitExceeded`]: a tier rejected the call; nothing was written
    /// - [`TiergateError::StoreUnavailable`]: the store could not be read (fail closed)
    /// - [`TiergateError::UnknownActionType`]: no policy for `action_type`
    /// - [`TiergateError::InvalidKeySegment`]: `actor_id` is not a valid key segment
    pub async fn acquire(
        &self,
        actor_id: &str,
        action_type: &str,
    ) -> Result<ThrottleGuard<'_, S>, TiergateError> {
        let (action_type, policy) = self
            .policies
            .get(action_type)
            .ok_or_else(|| TiergateError::UnknownActionType(action_type.to_string()))?;
        let actor = KeySegment::try_from(actor_id)?;

        let now = self.clock.now_epoch_seconds();
        let day = UtcDay::from_epoch_seconds(now)?;
        let keys = self.key_scheme.tier_keys(&actor, action_type, &day);

        tracing::debug!(actor = %actor, action_type = %action_type, day = %day, "throttle.enter");

        // 1. actor minute, skipped entirely for a zero window
        if policy.minute_window_seconds > 0 {
            let last_call = self
                .store
                .get_timestamp(&keys.minute)
                .await
                .map_err(|err| admission_fault(err, &actor, action_type))?;

            if let Some(last_call) = last_call {
                let window = i64::try_from(policy.minute_window_seconds).unwrap_or(i64::MAX);
                let elapsed = now.saturating_sub(last_call);

                if elapsed < window {
                    let retry_after_seconds =
                        u64::try_from(window.saturating_sub(elapsed)).unwrap_or(0);
                    return Err(reject(
                        LimitTier::ActorMinuteLimit,
                        retry_after_seconds,
                        &actor,
                        action_type,
                    ));
                }
            }
        }

        let until_next_day = u64::try_from(day.next_day_start_epoch_seconds().saturating_sub(now))
            .unwrap_or(0);

        // 2. actor daily
        let actor_daily_count = self
            .store
            .get_counter(&keys.actor_daily)
            .await
            .map_err(|err| admission_fault(err, &actor, action_type))?
            .unwrap_or(0);

        if actor_daily_count >= *policy.actor_daily_limit {
            return Err(reject(
                LimitTier::ActorDailyLimit,
                until_next_day,
                &actor,
                action_type,
            ));
        }

        // 3. global daily
        let global_daily_count = self
            .store
            .get_counter(&keys.global_daily)
            .await
            .map_err(|err| admission_fault(err, &actor, action_type))?
            .unwrap_or(0);

        if global_daily_count >= *policy.global_daily_limit {
            return Err(reject(
                LimitTier::GlobalDailyLimit,
                until_next_day,
                &actor,
                action_type,
            ));
        }

        tracing::debug!(
            actor = %actor,
            action_type = %action_type,
            actor_daily_count,
            global_daily_count,
            "throttle.admitted"
        );

        Ok(ThrottleGuard::admitted(
            &self.store,
            actor,
            action_type.clone(),
            *policy,
            now,
            day,
            keys,
        ))
    } // end method acquire

    /// Run `action` under the quota gate.
    ///
    /// The action runs only if admission passes. If it returns `Ok`, usage is committed
    /// to all three tiers and the value is returned, even when the global commit loses a
    /// race. If it returns `Err`, nothing is recorded and the error is returned untouched
    /// as [`ThrottledError::Action`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use tiergate::{MemoryLimitStore, PolicyTable, RateLimitPolicy, Throttle, ThrottleOptions, ThrottledError, LimitTier};
    /// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
    /// # let throttle = Throttle::new(ThrottleOptions {
    /// #     store: MemoryLimitStore::new(),
    /// #     policies: PolicyTable::new().with_policy("FEEDBACK", RateLimitPolicy::default()).unwrap(),
    /// #     prefix: None,
    /// #     clock: None,
    /// # });
    /// let first = throttle
    ///     .run("user_123", "FEEDBACK", || async { Ok::<_, std::io::Error>(42) })
    ///     .await;
    /// assert_eq!(first.unwrap(), 42);
    ///
    /// // Within the minute window.
    /// let second = throttle
    ///     .run("user_123", "FEEDBACK", || async { Ok::<_, std::io::Error>(43) })
    ///     .await;
    /// let exceeded = second.unwrap_err();
    /// assert_eq!(
    ///     exceeded.as_rate_limit_exceeded().unwrap().tier(),
    ///     LimitTier::ActorMinuteLimit
    /// );
    /// # });
    /// ```
    pub async fn run<F, Fut, T, E>(
        &self,
        actor_id: &str,
        action_type: &str,
        action: F,
    ) -> Result<T, ThrottledError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let guard = self
            .acquire(actor_id, action_type)
            .await
            .map_err(ThrottledError::Throttle)?;

        match action().await {
            Ok(value) => {
                guard.commit().await;
                Ok(value)
            }
            Err(err) => {
                guard.abort();
                Err(ThrottledError::Action(err))
            }
        }
    } // end method run
}

fn reject(
    tier: LimitTier,
    retry_after_seconds: u64,
    actor: &KeySegment,
    action_type: &KeySegment,
) -> TiergateError {
    tracing::warn!(
        actor = %actor,
        action_type = %action_type,
        tier = %tier,
        retry_after_seconds,
        "throttle.rejected"
    );

    RateLimitExceeded::new(tier, retry_after_seconds).into()
}

fn admission_fault(
    err: StoreUnavailable,
    actor: &KeySegment,
    action_type: &KeySegment,
) -> TiergateError {
    tracing::error!(
        actor = %actor,
        action_type = %action_type,
        error = %err,
        "throttle.admission.error, store unavailable, refusing call"
    );

    err.into()
}
