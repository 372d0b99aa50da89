use std::fmt;

use crate::LimitTier;

/// Error type for this crate.
#[derive(Debug, thiserror::Error)]
pub enum TiergateError {
    /// One of the three quota tiers rejected the request at admission.
    #[error(transparent)]
    RateLimitExceeded(#[from] RateLimitExceeded),

    /// The backing store could not be reached or answered with an error.
    #[error(transparent)]
    StoreUnavailable(#[from] StoreUnavailable),

    /// No policy is registered for the requested action type.
    #[error("no rate limit policy registered for action type {0:?}")]
    UnknownActionType(String),

    /// An actor id, action type or key prefix failed validation.
    #[error("invalid key segment: {0}")]
    InvalidKeySegment(String),

    /// The policy table could not be loaded.
    #[error("invalid policy table: {0}")]
    InvalidPolicyTable(String),

    /// The clock produced a timestamp that cannot be mapped to a calendar day.
    #[error("timestamp {0} is outside the supported calendar range")]
    InvalidTimestamp(i64),

    /// Invalid Redis client connection count.
    #[cfg(any(feature = "redis-tokio", feature = "redis-smol"))]
    #[cfg_attr(docsrs, doc(cfg(any(feature = "redis-tokio", feature = "redis-smol"))))]
    #[error("invalid redis client connection count: {0}")]
    InvalidRedisClientConnectionCount(String),

    /// Redis error raised outside of a store operation (e.g. while connecting).
    #[cfg(any(feature = "redis-tokio", feature = "redis-smol"))]
    #[cfg_attr(docsrs, doc(cfg(any(feature = "redis-tokio", feature = "redis-smol"))))]
    #[error("redis error: {0}")]
    RedisError(#[from] redis::RedisError),
}

impl TiergateError {
    /// Returns the rejection details if this error is a quota rejection.
    pub fn as_rate_limit_exceeded(&self) -> Option<&RateLimitExceeded> {
        match self {
            Self::RateLimitExceeded(exceeded) => Some(exceeded),
            _ => None,
        }
    }

    /// Returns `true` if this error is a store fault.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

/// A quota tier rejected the request before the guarded action ran.
///
/// The tier is part of the contract: callers map it to distinct user-facing
/// responses ("slow down", "daily limit reached", "system busy").
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{tier}: {message}")]
pub struct RateLimitExceeded {
    tier: LimitTier,
    message: String,
    retry_after_seconds: u64,
}

impl RateLimitExceeded {
    /// Build a rejection for `tier` using the tier's default user-facing message.
    pub fn new(tier: LimitTier, retry_after_seconds: u64) -> Self {
        Self {
            tier,
            message: tier.default_message().to_string(),
            retry_after_seconds,
        }
    }

    /// The tier that rejected the request.
    pub fn tier(&self) -> LimitTier {
        self.tier
    }

    /// Human-readable message suitable for returning to the actor.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Best-effort hint for a `Retry-After` header.
    ///
    /// For the minute tier this is the remainder of the window; for the daily tiers it
    /// is the number of seconds until the next UTC day starts.
    pub fn retry_after_seconds(&self) -> u64 {
        self.retry_after_seconds
    }
}

/// Transport or server fault from the backing store.
///
/// Never interpreted as "record not found".
#[derive(Debug, thiserror::Error)]
#[error("store unavailable during {operation} on {key:?}: {source}")]
pub struct StoreUnavailable {
    operation: &'static str,
    key: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl StoreUnavailable {
    /// Wrap a store-specific error raised while running `operation` against `key`.
    pub fn new<E>(operation: &'static str, key: &str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self {
            operation,
            key: key.to_string(),
            source: source.into(),
        }
    }

    /// Name of the store operation that failed (e.g. `"increment"`).
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Key the failed operation was addressed to.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Failure of [`Throttle::run`](crate::Throttle::run).
///
/// Keeps the guarded action's own error apart from throttling failures so that the
/// action's error reaches the caller unchanged.
#[derive(Debug)]
pub enum ThrottledError<E> {
    /// Admission failed: a quota tier rejected the call, the store was unavailable,
    /// or the request was invalid. The action did not run.
    Throttle(TiergateError),
    /// The guarded action ran and failed. No quota was recorded.
    Action(E),
}

impl<E> ThrottledError<E> {
    /// Returns the rejection details if admission was refused by a quota tier.
    pub fn as_rate_limit_exceeded(&self) -> Option<&RateLimitExceeded> {
        match self {
            Self::Throttle(err) => err.as_rate_limit_exceeded(),
            Self::Action(_) => None,
        }
    }

    /// Returns `true` if the guarded action itself failed.
    pub fn is_action(&self) -> bool {
        matches!(self, Self::Action(_))
    }

    /// Extract the guarded action's error, if that is what failed.
    pub fn into_action(self) -> Option<E> {
        match self {
            Self::Action(err) => Some(err),
            Self::Throttle(_) => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for ThrottledError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Throttle(err) => write!(f, "{}", err),
            Self::Action(err) => write!(f, "{}", err),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ThrottledError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Throttle(err) => Some(err),
            Self::Action(err) => err.source(),
        }
    }
}
