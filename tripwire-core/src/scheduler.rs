//! Repeating-event scheduling: cron expression parsing and the single
//! time-wheel task that re-posts captured events on schedule.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};

use crate::DEFAULT_CHANNEL_BUFFER;
use crate::ident::Ident;
use crate::stores::Event;

/// Failures parsing or registering a schedule.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid cron expression {expr:?}: {reason}")]
    InvalidExpression { expr: String, reason: String },

    #[error("invalid interval {0:?}: expected a duration like 30s, 5m, 1h30m")]
    InvalidInterval(String),

    #[error("interval must be positive")]
    ZeroInterval,

    #[error("the scheduler is not running")]
    NotRunning,
}

/// A parsed repeating-event schedule.
///
/// `@every <duration>` repeats at a fixed interval; anything else is a
/// cron expression: standard five fields, or six with a leading seconds
/// column, plus the `@hourly`-style macros.
#[derive(Debug, Clone)]
pub enum CronSchedule {
    Every(Duration),
    Cron(Box<cron::Schedule>),
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        let expr = expr.trim();
        if let Some(interval) = expr.strip_prefix("@every ") {
            let interval = parse_duration(interval.trim())?;
            return Ok(CronSchedule::Every(interval));
        }

        let normalized = if expr.starts_with('@') {
            expr.to_owned()
        } else {
            match expr.split_whitespace().count() {
                // Standard five fields get a zero seconds column prepended.
                5 => format!("0 {expr}"),
                6 | 7 => expr.to_owned(),
                _ => {
                    return Err(ScheduleError::InvalidExpression {
                        expr: expr.to_owned(),
                        reason: "expected five fields, optionally preceded by seconds".into(),
                    });
                }
            }
        };

        let schedule =
            cron::Schedule::from_str(&normalized).map_err(|e| ScheduleError::InvalidExpression {
                expr: expr.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(CronSchedule::Cron(Box::new(schedule)))
    }

    /// The next fire time strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            CronSchedule::Every(interval) => {
                let interval = chrono::Duration::from_std(*interval).ok()?;
                now.checked_add_signed(interval)
            }
            CronSchedule::Cron(schedule) => schedule.after(&now).next(),
        }
    }
}

/// Parse a concatenated duration such as `90s`, `500ms`, or `1h30m`.
fn parse_duration(s: &str) -> Result<Duration, ScheduleError> {
    let invalid = || ScheduleError::InvalidInterval(s.to_owned());
    if s.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        if digits == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit = rest
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .count();
        let (unit, tail) = rest.split_at(unit);
        rest = tail;

        total += match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            "h" => Duration::from_secs(value * 3600),
            "d" => Duration::from_secs(value * 86_400),
            _ => return Err(invalid()),
        };
    }

    if total.is_zero() {
        return Err(ScheduleError::ZeroInterval);
    }
    Ok(total)
}

enum Command {
    Add {
        id: Ident,
        schedule: CronSchedule,
        event: Event,
    },
    Remove {
        id: Ident,
    },
    Entries {
        reply: oneshot::Sender<Vec<Ident>>,
    },
}

/// Handle to the scheduler task; cheap to clone.
///
/// Commands sent before the runner starts are buffered and applied when
/// it drains the channel.
#[derive(Clone)]
pub struct SchedulerHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl SchedulerHandle {
    pub async fn add(
        &self,
        id: Ident,
        schedule: CronSchedule,
        event: Event,
    ) -> Result<(), ScheduleError> {
        self.cmd_tx
            .send(Command::Add {
                id,
                schedule,
                event,
            })
            .await
            .map_err(|_| ScheduleError::NotRunning)
    }

    pub async fn remove(&self, id: Ident) -> Result<(), ScheduleError> {
        self.cmd_tx
            .send(Command::Remove { id })
            .await
            .map_err(|_| ScheduleError::NotRunning)
    }

    /// Ids of every registered entry.
    pub async fn entries(&self) -> Result<Vec<Ident>, ScheduleError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Entries { reply })
            .await
            .map_err(|_| ScheduleError::NotRunning)?;
        rx.await.map_err(|_| ScheduleError::NotRunning)
    }
}

struct Entry {
    schedule: CronSchedule,
    event: Event,
    next: Option<DateTime<Utc>>,
}

/// The scheduler task state; consumed by [`SchedulerRunner::run`].
pub struct SchedulerRunner {
    cmd_rx: mpsc::Receiver<Command>,
    entries: BTreeMap<Ident, Entry>,
}

/// Create a scheduler pair: the cloneable handle and the runner to spawn.
pub fn scheduler() -> (SchedulerHandle, SchedulerRunner) {
    let (cmd_tx, cmd_rx) = mpsc::channel(DEFAULT_CHANNEL_BUFFER);
    (
        SchedulerHandle { cmd_tx },
        SchedulerRunner {
            cmd_rx,
            entries: BTreeMap::new(),
        },
    )
}

impl SchedulerRunner {
    /// Run the time wheel until shutdown.
    ///
    /// Due entries re-send their captured event on `fire_tx` and advance
    /// to their next occurrence; an entry whose schedule is exhausted is
    /// dropped.
    pub async fn run(mut self, fire_tx: mpsc::Sender<Event>, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!("scheduler started");
        loop {
            let deadline = self
                .entries
                .values()
                .filter_map(|entry| entry.next)
                .min();

            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }

                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Add { id, schedule, event }) => {
                            let next = schedule.next_after(Utc::now());
                            tracing::debug!(id = %id, "scheduler: entry added");
                            self.entries.insert(id, Entry { schedule, event, next });
                        }
                        Some(Command::Remove { id }) => {
                            tracing::debug!(id = %id, "scheduler: entry removed");
                            self.entries.remove(&id);
                        }
                        Some(Command::Entries { reply }) => {
                            let _ = reply.send(self.entries.keys().cloned().collect());
                        }
                        None => break,
                    }
                }

                _ = sleep_until(deadline) => {
                    self.fire_due(&fire_tx).await;
                }
            }
        }
        tracing::info!("scheduler stopped");
    }

    async fn fire_due(&mut self, fire_tx: &mpsc::Sender<Event>) {
        let now = Utc::now();
        let mut exhausted = Vec::new();

        for (id, entry) in &mut self.entries {
            let Some(next) = entry.next else {
                exhausted.push(id.clone());
                continue;
            };
            if next > now {
                continue;
            }
            if fire_tx.send(entry.event.clone()).await.is_err() {
                tracing::warn!(id = %id, "scheduler: fire channel closed");
            }
            entry.next = entry.schedule.next_after(now);
        }

        for id in exhausted {
            self.entries.remove(&id);
        }
    }
}

async fn sleep_until(deadline: Option<DateTime<Utc>>) {
    match deadline {
        Some(deadline) => {
            let wait = (deadline - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use time::OffsetDateTime;

    fn template(id: &str) -> Event {
        Event {
            event_id: Ident::new(id),
            event_type_id: Ident::new("et-1"),
            data: Map::new(),
            created_on: OffsetDateTime::now_utc(),
            cron_schedule: Some("@every 10ms".into()),
            created_by: None,
        }
    }

    #[test]
    fn five_field_expressions_parse() {
        assert!(CronSchedule::parse("*/5 * * * *").is_ok());
        assert!(CronSchedule::parse("0 9 * * 1").is_ok());
    }

    #[test]
    fn six_field_expressions_keep_their_seconds() {
        assert!(CronSchedule::parse("30 */5 * * * *").is_ok());
    }

    #[test]
    fn macros_and_every_parse() {
        assert!(CronSchedule::parse("@hourly").is_ok());
        assert!(matches!(
            CronSchedule::parse("@every 1s"),
            Ok(CronSchedule::Every(d)) if d == Duration::from_secs(1)
        ));
        assert!(matches!(
            CronSchedule::parse("@every 1h30m"),
            Ok(CronSchedule::Every(d)) if d == Duration::from_secs(5400)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(CronSchedule::parse("whenever").is_err());
        assert!(CronSchedule::parse("* * *").is_err());
        assert!(CronSchedule::parse("@every soon").is_err());
        assert!(CronSchedule::parse("@every 0s").is_err());
    }

    #[test]
    fn next_after_advances() {
        let schedule = CronSchedule::parse("@every 30s").unwrap();
        let now = Utc::now();
        let next = schedule.next_after(now).unwrap();
        assert_eq!((next - now).num_seconds(), 30);

        let cron = CronSchedule::parse("0 * * * *").unwrap();
        assert!(cron.next_after(now).unwrap() > now);
    }

    #[tokio::test]
    async fn runner_fires_and_honors_removal() {
        let (handle, runner) = scheduler();
        let (fire_tx, mut fire_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(runner.run(fire_tx, shutdown_rx));

        let schedule = CronSchedule::parse("@every 10ms").unwrap();
        handle
            .add(Ident::new("r-1"), schedule, template("r-1"))
            .await
            .unwrap();

        let fired = tokio::time::timeout(Duration::from_secs(2), fire_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fired.event_id, Ident::new("r-1"));

        assert_eq!(handle.entries().await.unwrap(), vec![Ident::new("r-1")]);

        handle.remove(Ident::new("r-1")).await.unwrap();
        assert!(handle.entries().await.unwrap().is_empty());

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
