//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration shared by the dispatcher and its stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deployment-scoping tag; partitions the outbound job topic
    /// (`Request-Job-<space>`).
    #[serde(default = "default_space")]
    pub space: String,

    /// Engine-reserved keys tolerated in event data and stripped before
    /// schema comparison.
    #[serde(default)]
    pub reserved_data_keys: Vec<String>,
}

fn default_space() -> String {
    "local".to_owned()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            space: default_space(),
            reserved_data_keys: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// The bus topic jobs are published on.
    pub fn job_topic(&self) -> String {
        format!("Request-Job-{}", self.space)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_carries_the_space_tag() {
        let config = EngineConfig {
            space: "stage".into(),
            ..EngineConfig::default()
        };
        assert_eq!(config.job_topic(), "Request-Job-stage");
    }
}
