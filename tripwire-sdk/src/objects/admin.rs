//! Admin surface objects: runtime statistics and settings.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Counters published by the engine since startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    #[serde(with = "time::serde::rfc3339")]
    pub created_on: OffsetDateTime,
    pub num_event_types: u64,
    pub num_events: u64,
    pub num_triggers: u64,
    pub num_alerts: u64,
    pub num_trigger_jobs: u64,
}

/// Mutable engine settings exposed on the admin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AdminSettings {
    /// Verbose per-dispatch logging.
    #[serde(default)]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_to_debug_off() {
        let settings: AdminSettings = serde_json::from_str("{}").unwrap();
        assert!(!settings.debug);

        let settings: AdminSettings = serde_json::from_str(r#"{"debug":true}"#).unwrap();
        assert!(settings.debug);
    }
}
