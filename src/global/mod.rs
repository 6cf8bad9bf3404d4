use std::{collections::HashMap, time::Duration};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Bound on one recipient's delivery attempt unless overridden.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(3);

pub fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Operator-supplied options shared by all notifier factories.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Options {
    /// Global delivery timeout override, e.g. "5s".
    #[serde(default, with = "humantime_serde")]
    #[schemars(with = "Option<String>")]
    pub timeout: Option<Duration>,
    /// Per-kind delivery timeout in seconds, keyed by notifier kind.
    #[serde(default)]
    pub notification_timeout: HashMap<String, u64>,
}

impl Options {
    /// Timeout resolution: per-kind override, then the global override,
    /// then the built-in default.
    pub fn timeout_for(&self, kind: &str) -> Duration {
        if let Some(secs) = self.notification_timeout.get(kind) {
            return Duration::from_secs(*secs);
        }
        self.timeout.unwrap_or(DEFAULT_SEND_TIMEOUT)
    }
}
