use std::{borrow::Borrow, fmt, ops::Deref, sync::Arc};

use crate::TiergateError;

/// A validated component of a store key: an actor id, an action type or a key prefix.
///
/// This is a string with the following constraints:
/// - Must not be empty
/// - Must not be longer than 255 bytes
/// - Must not contain `:` or `#` (both are used as separators in store keys)
#[derive(Debug, Clone, PartialEq, PartialOrd, Hash, Eq, Ord)]
pub struct KeySegment(Arc<str>);

impl KeySegment {
    /// The default key prefix, `tiergate`.
    pub fn default_prefix() -> Self {
        Self(Arc::from("tiergate"))
    }

    /// Borrow the segment as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for KeySegment {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Borrow<str> for KeySegment {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for KeySegment {
    type Error = TiergateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Err(TiergateError::InvalidKeySegment(
                "key segment must not be empty".to_string(),
            ))
        } else if value.len() > 255 {
            Err(TiergateError::InvalidKeySegment(
                "key segment must not be longer than 255 bytes".to_string(),
            ))
        } else if value.contains(':') || value.contains('#') {
            Err(TiergateError::InvalidKeySegment(format!(
                "key segment {value:?} must not contain ':' or '#'"
            )))
        } else {
            Ok(Self(Arc::from(value)))
        }
    }
}

impl TryFrom<String> for KeySegment {
    type Error = TiergateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

/// Maximum number of calls per UTC day for a daily tier.
///
/// Must be greater than 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct DailyLimit(pub(crate) u64);

impl Deref for DailyLimit {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for DailyLimit {
    type Error = &'static str;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            Err("Daily limit must be greater than 0")
        } else {
            Ok(Self(value))
        }
    }
}

impl From<DailyLimit> for u64 {
    fn from(value: DailyLimit) -> Self {
        value.0
    }
}

/// The quota dimension that rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitTier {
    /// Too soon after the actor's previous admitted call for the same action type.
    ActorMinuteLimit,
    /// The actor used up the action type's daily allowance.
    ActorDailyLimit,
    /// All actors together used up the action type's daily allowance.
    GlobalDailyLimit,
}

impl LimitTier {
    /// Stable identifier of the tier, e.g. `ACTOR_DAILY_LIMIT`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActorMinuteLimit => "ACTOR_MINUTE_LIMIT",
            Self::ActorDailyLimit => "ACTOR_DAILY_LIMIT",
            Self::GlobalDailyLimit => "GLOBAL_DAILY_LIMIT",
        }
    }

    /// Message shown to the actor when this tier rejects a call.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::ActorMinuteLimit => "Too many requests. Please try again shortly.",
            Self::ActorDailyLimit => "You've reached your daily usage limit.",
            Self::GlobalDailyLimit => "The service is at capacity. Please try again later.",
        }
    }

    /// HTTP status for surfacing this rejection.
    ///
    /// Actor tiers are the caller's own doing (`429 Too Many Requests`); the global tier
    /// is a service-side condition (`503 Service Unavailable`).
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ActorMinuteLimit | Self::ActorDailyLimit => 429,
            Self::GlobalDailyLimit => 503,
        }
    }
}

impl fmt::Display for LimitTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
