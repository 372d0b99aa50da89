use std::{collections::HashMap, path::Path};

use crate::{DailyLimit, KeySegment, TiergateError};

/// Quotas for a single action type.
///
/// Different action types are fully independent: they share no counters and do not
/// influence each other's windows.
///
/// # Examples
///
/// ```
/// use tiergate::{DailyLimit, RateLimitPolicy};
///
/// let policy = RateLimitPolicy {
///     minute_window_seconds: 60,
///     actor_daily_limit: DailyLimit::try_from(20).unwrap(),
///     global_daily_limit: DailyLimit::try_from(100).unwrap(),
/// };
///
/// assert_eq!(*policy.actor_daily_limit, 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitPolicy {
    /// Minimum number of seconds between two admitted calls from the same actor.
    ///
    /// `0` disables the minute gate; the minute mark is then never read.
    pub minute_window_seconds: u64,
    /// Calls one actor may make per UTC day.
    ///
    /// Checked at admission only, so concurrent bursts may overshoot it slightly.
    pub actor_daily_limit: DailyLimit,
    /// Calls all actors together may make per UTC day.
    ///
    /// Backed by the store's conditional increment.
    pub global_daily_limit: DailyLimit,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            minute_window_seconds: 60,
            actor_daily_limit: DailyLimit(20),
            global_daily_limit: DailyLimit(100),
        }
    }
}

/// Action type -> policy mapping, loaded once at process start.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    policies: HashMap<KeySegment, RateLimitPolicy>,
}

impl PolicyTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `policy` for `action_type`, replacing any previous entry.
    pub fn with_policy(
        mut self,
        action_type: &str,
        policy: RateLimitPolicy,
    ) -> Result<Self, TiergateError> {
        self.policies.insert(KeySegment::try_from(action_type)?, policy);
        Ok(self)
    }

    /// Parse a table from JSON of the form
    /// `{"<action type>": {"minute_window_seconds": 60, "actor_daily_limit": 20, "global_daily_limit": 100}}`.
    pub fn from_json_str(json: &str) -> Result<Self, TiergateError> {
        let raw: HashMap<String, RateLimitPolicy> = serde_json::from_str(json)
            .map_err(|err| TiergateError::InvalidPolicyTable(err.to_string()))?;

        let mut policies = HashMap::with_capacity(raw.len());
        for (action_type, policy) in raw {
            let action_type = KeySegment::try_from(action_type)
                .map_err(|err| TiergateError::InvalidPolicyTable(err.to_string()))?;
            policies.insert(action_type, policy);
        }

        Ok(Self { policies })
    }

    /// Read and parse a JSON policy file. See [`PolicyTable::from_json_str`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TiergateError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|err| {
            TiergateError::InvalidPolicyTable(format!("reading {}: {err}", path.display()))
        })?;

        Self::from_json_str(&json)
    }

    /// Look up the policy and canonical action type for `action_type`.
    pub fn get(&self, action_type: &str) -> Option<(&KeySegment, &RateLimitPolicy)> {
        self.policies.get_key_value(action_type)
    }

    /// Number of registered action types.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Returns `true` if no action type is registered.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
