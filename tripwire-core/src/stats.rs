//! Engine statistics.

use std::sync::{Mutex, PoisonError};

use time::OffsetDateTime;
use tripwire_sdk::AdminStats;

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    num_event_types: u64,
    num_events: u64,
    num_triggers: u64,
    num_alerts: u64,
    num_trigger_jobs: u64,
}

/// Dispatch counters since startup.
///
/// The only shared mutable state in the engine; guarded by a single lock
/// held just for the increment or the snapshot copy.
#[derive(Debug)]
pub struct WorkflowStats {
    created_on: OffsetDateTime,
    counters: Mutex<Counters>,
}

impl Default for WorkflowStats {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowStats {
    pub fn new() -> Self {
        Self {
            created_on: OffsetDateTime::now_utc(),
            counters: Mutex::new(Counters::default()),
        }
    }

    fn bump(&self, pick: impl FnOnce(&mut Counters) -> &mut u64) {
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *pick(&mut counters) += 1;
    }

    pub fn incr_event_types(&self) {
        self.bump(|c| &mut c.num_event_types);
    }

    pub fn incr_events(&self) {
        self.bump(|c| &mut c.num_events);
    }

    pub fn incr_triggers(&self) {
        self.bump(|c| &mut c.num_triggers);
    }

    pub fn incr_alerts(&self) {
        self.bump(|c| &mut c.num_alerts);
    }

    pub fn incr_trigger_jobs(&self) {
        self.bump(|c| &mut c.num_trigger_jobs);
    }

    pub fn snapshot(&self) -> AdminStats {
        let counters = *self
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        AdminStats {
            created_on: self.created_on,
            num_event_types: counters.num_event_types,
            num_events: counters.num_events,
            num_triggers: counters.num_triggers,
            num_alerts: counters.num_alerts,
            num_trigger_jobs: counters.num_trigger_jobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = WorkflowStats::new();
        stats.incr_events();
        stats.incr_events();
        stats.incr_trigger_jobs();

        let snap = stats.snapshot();
        assert_eq!(snap.num_events, 2);
        assert_eq!(snap.num_trigger_jobs, 1);
        assert_eq!(snap.num_alerts, 0);
    }
}
