use crate::{
    ConditionalIncrement, KeySegment, LimitStore, RateLimitPolicy, StoreUnavailable, TierKeys,
    UtcDay,
};

/// Lifecycle of an admitted call.
///
/// ```text
/// Admitted ──► Committed | RaceLost
///     │
///     └──────► Aborted
/// ```
///
/// A call refused at admission never gets a guard: [`Throttle::acquire`](crate::Throttle::acquire)
/// returns [`RateLimitExceeded`](crate::RateLimitExceeded) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardState {
    /// All tiers passed; the guarded action may run.
    Admitted,
    /// The action succeeded and usage was recorded on every tier that could be reached.
    Committed,
    /// The action succeeded, but the global daily limit was reached by concurrent calls
    /// between admission and commit. The global counter was left at its limit.
    RaceLost,
    /// The action failed (or the guard was dropped before commit). Nothing was recorded.
    Aborted,
}

impl GuardState {
    /// Returns `true` for states a guard never leaves.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Admitted)
    }
}

/// A single write performed on commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitStep {
    /// Refresh of the actor's minute mark.
    MinuteMark,
    /// Unconditional increment of the actor's daily counter.
    ActorDaily,
    /// Conditional increment of the global daily counter.
    GlobalDaily,
}

/// Outcome of [`ThrottleGuard::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    /// [`GuardState::Committed`] or [`GuardState::RaceLost`].
    pub state: GuardState,
    /// Actor daily count after the increment; `None` if that step failed.
    pub actor_daily_count: Option<u64>,
    /// Global daily count after the increment; `None` if the race was lost or the step failed.
    pub global_daily_count: Option<u64>,
    /// Steps that hit a store fault and were skipped.
    pub failed_steps: Vec<CommitStep>,
}

impl CommitReport {
    /// Returns `true` if the global conditional increment was refused.
    pub fn is_race_lost(&self) -> bool {
        self.state == GuardState::RaceLost
    }

    /// Returns `true` if every step reached the store.
    pub fn is_complete(&self) -> bool {
        self.failed_steps.is_empty()
    }
}

/// An admitted call, returned by [`Throttle::acquire`](crate::Throttle::acquire).
///
/// Exactly one exit is taken:
///
/// - [`ThrottleGuard::commit`] after the guarded action succeeded
/// - [`ThrottleGuard::abort`] after it failed
/// - dropping the guard (panic, cancellation, early return) behaves like `abort`
///
/// Commit writes are best-effort and never fail the caller: the action has already
/// succeeded by then, and bookkeeping problems must not undo that.
#[derive(Debug)]
pub struct ThrottleGuard<'a, S: LimitStore> {
    store: &'a S,
    actor: KeySegment,
    action_type: KeySegment,
    policy: RateLimitPolicy,
    admitted_at: i64,
    day: UtcDay,
    keys: TierKeys,
    state: GuardState,
}

impl<'a, S: LimitStore> ThrottleGuard<'a, S> {
    pub(crate) fn admitted(
        store: &'a S,
        actor: KeySegment,
        action_type: KeySegment,
        policy: RateLimitPolicy,
        admitted_at: i64,
        day: UtcDay,
        keys: TierKeys,
    ) -> Self {
        Self {
            store,
            actor,
            action_type,
            policy,
            admitted_at,
            day,
            keys,
            state: GuardState::Admitted,
        }
    }

    /// Current state; always [`GuardState::Admitted`] until an exit is taken.
    pub fn state(&self) -> GuardState {
        self.state
    }

    /// The actor this call is charged to.
    pub fn actor(&self) -> &KeySegment {
        &self.actor
    }

    /// The action type being guarded.
    pub fn action_type(&self) -> &KeySegment {
        &self.action_type
    }

    /// The policy the call was admitted under.
    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Epoch seconds at admission; written as the minute mark on commit.
    pub fn admitted_at(&self) -> i64 {
        self.admitted_at
    }

    /// UTC day the call is counted against.
    pub fn day(&self) -> UtcDay {
        self.day
    }

    /// Store keys for the three tiers.
    pub fn keys(&self) -> &TierKeys {
        &self.keys
    }

    /// Record the call against all three tiers.
    ///
    /// Steps run in order, each independently: minute mark, actor daily increment,
    /// global daily conditional increment. A store fault in one step is logged and the
    /// next step still runs.
    pub async fn commit(mut self) -> CommitReport {
        let expires_at = self.day.expires_at();
        let mut failed_steps = Vec::new();

        tracing::debug!(
            actor = %self.actor,
            action_type = %self.action_type,
            "throttle.commit, action succeeded, recording usage"
        );

        if let Err(err) = self
            .store
            .set_timestamp(&self.keys.minute, self.admitted_at)
            .await
        {
            self.commit_fault(CommitStep::MinuteMark, &err);
            failed_steps.push(CommitStep::MinuteMark);
        }

        let actor_daily_count = match self
            .store
            .increment(&self.keys.actor_daily, expires_at)
            .await
        {
            Ok(count) => {
                if count > *self.policy.actor_daily_limit {
                    tracing::debug!(
                        actor = %self.actor,
                        action_type = %self.action_type,
                        count,
                        limit = *self.policy.actor_daily_limit,
                        "throttle.commit, actor daily count above limit after concurrent calls"
                    );
                }
                Some(count)
            }
            Err(err) => {
                self.commit_fault(CommitStep::ActorDaily, &err);
                failed_steps.push(CommitStep::ActorDaily);
                None
            }
        };

        let mut state = GuardState::Committed;
        let global_daily_count = match self
            .store
            .increment_if_below(
                &self.keys.global_daily,
                expires_at,
                *self.policy.global_daily_limit,
            )
            .await
        {
            Ok(ConditionalIncrement::Incremented(count)) => Some(count),
            Ok(ConditionalIncrement::Rejected) => {
                tracing::warn!(
                    action_type = %self.action_type,
                    actor = %self.actor,
                    limit = *self.policy.global_daily_limit,
                    "throttle.race_lost, global daily limit was reached by a concurrent request"
                );
                state = GuardState::RaceLost;
                None
            }
            Err(err) => {
                self.commit_fault(CommitStep::GlobalDaily, &err);
                failed_steps.push(CommitStep::GlobalDaily);
                None
            }
        };

        self.state = state;

        if state == GuardState::Committed {
            tracing::info!(
                actor = %self.actor,
                action_type = %self.action_type,
                actor_daily_count,
                global_daily_count,
                failed_steps = failed_steps.len(),
                "throttle.committed"
            );
        }

        CommitReport {
            state,
            actor_daily_count,
            global_daily_count,
            failed_steps,
        }
    } // end method commit

    /// Leave the guard without recording anything, because the guarded action failed.
    pub fn abort(mut self) -> GuardState {
        tracing::debug!(
            actor = %self.actor,
            action_type = %self.action_type,
            "throttle.aborted, action failed, no usage recorded"
        );

        self.state = GuardState::Aborted;
        self.state
    }

    fn commit_fault(&self, step: CommitStep, err: &StoreUnavailable) {
        tracing::error!(
            actor = %self.actor,
            action_type = %self.action_type,
            step = ?step,
            error = %err,
            "throttle.commit.error, store unavailable, skipping step"
        );
    }
}

impl<S: LimitStore> Drop for ThrottleGuard<'_, S> {
    fn drop(&mut self) {
        if self.state == GuardState::Admitted {
            tracing::debug!(
                actor = %self.actor,
                action_type = %self.action_type,
                "throttle.dropped, guard released before commit, no usage recorded"
            );
            self.state = GuardState::Aborted;
        }
    }
}
