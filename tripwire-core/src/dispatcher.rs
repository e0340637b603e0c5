//! The dispatcher: the per-event pipeline and the engine's public
//! operation surface.
//!
//! `post_event` is the heart of the engine: validate → store → percolate →
//! per-trigger fan-out → bus publish → alert. Everything else on this type
//! is the operation surface the HTTP edge calls.

use std::sync::{Arc, Mutex, PoisonError};

use kanau::processor::Processor;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use tripwire_sdk::{AdminSettings, AdminStats, Pagination};
use uuid::Uuid;

use crate::DEFAULT_CHANNEL_BUFFER;
use crate::bus::MessageBus;
use crate::config::EngineConfig;
use crate::error::WorkflowError;
use crate::ident::{IdGen, Ident};
use crate::index::IndexStore;
use crate::scheduler::{CronSchedule, SchedulerHandle, SchedulerRunner, scheduler};
use crate::settings::SettingsStore;
use crate::stats::WorkflowStats;
use crate::stores::alerts::{DeleteAlert, GetAlert, ListAlerts, ListAlertsByTrigger, PutAlert};
use crate::stores::crons::{CronEventExists, DeleteCronEvent, ListCronEvents, PutCronEvent};
use crate::stores::event_types::{
    DeleteEventType, GetEventType, GetEventTypeIdByName, ListEventTypes, PutEventType,
};
use crate::stores::events::{
    DeleteEvent, EventTypeNameExists, GetEvent, ListEvents, ListEventsByType, LookupTypeName,
    PercolateEvent, PutEvent, QueryEvents, RegisterEventMapping,
};
use crate::stores::triggers::{DeleteTrigger, GetTrigger, ListTriggers, PutTrigger};
use crate::stores::{
    Alert, AlertStore, CronStore, Event, EventType, EventStore, EventTypeStore, Trigger,
    TriggerStore,
};
use crate::templating;

/// Index namespace handles, one per store.
#[derive(Clone)]
pub struct StoreHandles {
    pub event_types: Arc<dyn IndexStore>,
    pub events: Arc<dyn IndexStore>,
    pub triggers: Arc<dyn IndexStore>,
    pub alerts: Arc<dyn IndexStore>,
    pub crons: Arc<dyn IndexStore>,
}

impl StoreHandles {
    /// Five fresh in-memory namespaces.
    pub fn memory() -> Self {
        Self {
            event_types: Arc::new(crate::index::MemoryIndex::new()),
            events: Arc::new(crate::index::MemoryIndex::new()),
            triggers: Arc::new(crate::index::MemoryIndex::new()),
            alerts: Arc::new(crate::index::MemoryIndex::new()),
            crons: Arc::new(crate::index::MemoryIndex::new()),
        }
    }
}

/// The engine: stores, matcher, fan-out, cron, and the public operations.
///
/// Cheap to clone; clones share the same stores, scheduler, and counters.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    event_types: EventTypeStore,
    events: EventStore,
    triggers: TriggerStore,
    alerts: AlertStore,
    crons: CronStore,
    bus: Arc<dyn MessageBus>,
    ids: Arc<dyn IdGen>,
    scheduler: SchedulerHandle,
    runner: Mutex<Option<SchedulerRunner>>,
    stats: WorkflowStats,
    settings: SettingsStore,
    config: EngineConfig,
}

impl Dispatcher {
    pub fn new(
        handles: StoreHandles,
        bus: Arc<dyn MessageBus>,
        ids: Arc<dyn IdGen>,
        config: EngineConfig,
    ) -> Self {
        let (scheduler, runner) = scheduler();
        Self {
            inner: Arc::new(Inner {
                event_types: EventTypeStore::new(handles.event_types),
                events: EventStore::new(
                    handles.events.clone(),
                    config.reserved_data_keys.clone(),
                ),
                triggers: TriggerStore::new(handles.triggers, handles.events),
                alerts: AlertStore::new(handles.alerts),
                crons: CronStore::new(handles.crons),
                bus,
                ids,
                scheduler,
                runner: Mutex::new(Some(runner)),
                stats: WorkflowStats::new(),
                settings: SettingsStore::default(),
                config,
            }),
        }
    }

    /// The origin tag stamped on responses produced from this engine.
    pub fn origin(&self) -> String {
        format!("tripwire-{}", self.inner.config.space)
    }

    // -- event types ----------------------------------------------------

    /// Register a named event schema and publish its strict mapping.
    pub async fn post_event_type(
        &self,
        name: String,
        mapping: Value,
    ) -> Result<EventType, WorkflowError> {
        if name.is_empty() {
            return Err(WorkflowError::bad_request("event type name must not be empty"));
        }

        let existing = self
            .inner
            .event_types
            .process(GetEventTypeIdByName { name: name.clone() })
            .await?;
        let name_taken = existing.is_some()
            || self
                .inner
                .events
                .process(EventTypeNameExists { name: name.clone() })
                .await?;
        if name_taken {
            let existing = existing.unwrap_or_else(Ident::none);
            return Err(WorkflowError::Conflict(format!(
                "EventType name {name:?} already exists under EventTypeId {existing}"
            )));
        }

        let event_type = EventType {
            event_type_id: self.inner.ids.next_id(),
            name,
            mapping,
            created_on: OffsetDateTime::now_utc(),
        };
        let id = self
            .inner
            .event_types
            .process(PutEventType {
                event_type: event_type.clone(),
            })
            .await?;

        let registered = self
            .inner
            .events
            .process(RegisterEventMapping {
                name: event_type.name.clone(),
                mapping: event_type.mapping.clone(),
            })
            .await;
        if let Err(err) = registered {
            // Roll the registry row back so the name stays free.
            let _ = self.inner.event_types.process(DeleteEventType { id }).await;
            return Err(err.into());
        }

        tracing::info!(event_type_id = %event_type.event_type_id, "posted event type");
        self.inner.stats.incr_event_types();
        Ok(event_type)
    }

    pub async fn get_event_type(&self, id: Ident) -> Result<EventType, WorkflowError> {
        self.inner
            .event_types
            .process(GetEventType { id: id.clone() })
            .await?
            .ok_or(WorkflowError::NotFound(id))
    }

    pub async fn list_event_types(
        &self,
        page: Pagination,
    ) -> Result<(Vec<EventType>, u64), WorkflowError> {
        Ok(self.inner.event_types.process(ListEventTypes { page }).await?)
    }

    /// Remove the registry row.
    ///
    /// Events stored under the type's name and percolators of triggers
    /// referencing it are left in place.
    pub async fn delete_event_type(&self, id: Ident) -> Result<(), WorkflowError> {
        let deleted = self
            .inner
            .event_types
            .process(DeleteEventType { id: id.clone() })
            .await?;
        if !deleted {
            return Err(WorkflowError::NotFound(id.clone()));
        }
        tracing::info!(event_type_id = %id, "deleted event type");
        Ok(())
    }

    // -- events ---------------------------------------------------------

    /// Validate, store, and dispatch one event.
    ///
    /// An event carrying a cron schedule is routed to
    /// [`post_repeating_event`](Self::post_repeating_event) instead.
    ///
    /// The event is stored before any fan-out; per-trigger tasks run
    /// concurrently to completion even when some of them fail, and the
    /// most severe collected failure is returned. At-least-once: a
    /// returned error does not unwind stored side effects.
    pub async fn post_event(&self, mut event: Event) -> Result<Event, WorkflowError> {
        if event.cron_schedule.as_deref().is_some_and(|s| !s.is_empty()) {
            return self.post_repeating_event(event).await;
        }

        let event_type = self.resolve_event_type(&event.event_type_id).await?;

        event.event_id = self.inner.ids.next_id();
        event.created_on = OffsetDateTime::now_utc();

        self.inner
            .events
            .process(PutEvent {
                type_name: event_type.name.clone(),
                event: event.clone(),
                event_type: event_type.clone(),
            })
            .await?;
        tracing::info!(event_id = %event.event_id, "posted event");

        let matches = self
            .inner
            .events
            .process(PercolateEvent {
                type_name: event_type.name.clone(),
                data: event.data.clone(),
                event_id: event.event_id.clone(),
            })
            .await?;

        let failure = self.fan_out(&event, &event_type.event_type_id, matches).await;
        if let Some(err) = failure {
            return Err(err);
        }

        self.inner.stats.incr_events();
        Ok(event)
    }

    /// Run the per-trigger tasks concurrently and collect their failures
    /// through a channel drained after every sender is gone (the
    /// barrier). Returns the most severe failure, first-received among
    /// equals.
    async fn fan_out(
        &self,
        event: &Event,
        event_type_id: &Ident,
        matches: Vec<Ident>,
    ) -> Option<WorkflowError> {
        if matches.is_empty() {
            return None;
        }

        let (tx, mut rx) = mpsc::channel(DEFAULT_CHANNEL_BUFFER);
        for trigger_id in matches {
            let dispatcher = self.clone();
            let event = event.clone();
            let event_type_id = event_type_id.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = dispatcher
                    .run_trigger(event, event_type_id, trigger_id.clone())
                    .await;
                if let Err(err) = &outcome {
                    tracing::error!(trigger_id = %trigger_id, error = %err, "per-trigger task failed");
                }
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let mut worst: Option<WorkflowError> = None;
        while let Some(outcome) = rx.recv().await {
            if let Err(err) = outcome {
                let more_severe = worst
                    .as_ref()
                    .is_none_or(|current| err.kind() > current.kind());
                if more_severe {
                    worst = Some(err);
                }
            }
        }
        worst
    }

    /// One matched trigger: render the job, publish it, record the alert.
    ///
    /// The publish happens-before the alert write; a publish failure
    /// records nothing.
    async fn run_trigger(
        &self,
        event: Event,
        event_type_id: Ident,
        trigger_id: Ident,
    ) -> Result<(), WorkflowError> {
        let Some(trigger) = self
            .inner
            .triggers
            .process(GetTrigger {
                id: trigger_id.clone(),
            })
            .await?
        else {
            tracing::debug!(trigger_id = %trigger_id, "matched trigger no longer exists, skipping");
            return Ok(());
        };
        if !trigger.enabled {
            return Ok(());
        }
        // A trigger registered against several types matches through any of
        // them; re-check membership for this event's type.
        if !trigger.condition.event_type_ids.contains(&event_type_id) {
            return Ok(());
        }

        let job_id = self.inner.ids.next_id();
        let job = serde_json::to_value(&trigger.job).map_err(|e| {
            WorkflowError::internal(format!("dispatcher: job serialization failed: {e}"))
        })?;
        let rendered = templating::render_job(&job, &event.data).map_err(|e| {
            WorkflowError::internal(format!("dispatcher: job rendering failed: {e}"))
        })?;

        if self.inner.settings.get().await.debug {
            tracing::info!(job_id = %job_id, job = %rendered, "job submission");
        } else {
            tracing::debug!(job_id = %job_id, job = %rendered, "job submission");
        }

        self.inner
            .bus
            .publish(&self.inner.config.job_topic(), job_id.as_str(), &rendered)
            .await
            .map_err(|e| WorkflowError::internal(format!("dispatcher: {e}")))?;
        self.inner.stats.incr_trigger_jobs();

        self.post_alert(event.event_id.clone(), trigger_id, job_id)
            .await?;
        Ok(())
    }

    /// Register a repeating event: validate its schedule, persist it in
    /// the cron store, store it as a regular event **without** dispatching,
    /// and hand it to the scheduler.
    pub async fn post_repeating_event(&self, mut event: Event) -> Result<Event, WorkflowError> {
        let expr = event.cron_schedule.clone().unwrap_or_default();
        let schedule =
            CronSchedule::parse(&expr).map_err(|e| WorkflowError::bad_request(e.to_string()))?;

        event.event_id = self.inner.ids.next_id();
        event.created_on = OffsetDateTime::now_utc();

        self.inner
            .scheduler
            .add(event.event_id.clone(), schedule, event.clone())
            .await
            .map_err(|e| WorkflowError::internal(format!("scheduler: {e}")))?;

        if let Err(err) = self
            .inner
            .crons
            .process(PutCronEvent {
                event: event.clone(),
            })
            .await
        {
            let _ = self.inner.scheduler.remove(event.event_id.clone()).await;
            return Err(err.into());
        }

        let event_type = match self.resolve_event_type(&event.event_type_id).await {
            Ok(event_type) => event_type,
            Err(err) => {
                self.rollback_repeating(&event.event_id).await;
                return Err(err);
            }
        };

        let stored = self
            .inner
            .events
            .process(PutEvent {
                type_name: event_type.name.clone(),
                event: event.clone(),
                event_type,
            })
            .await;
        if let Err(err) = stored {
            self.rollback_repeating(&event.event_id).await;
            return Err(err.into());
        }

        tracing::info!(event_id = %event.event_id, schedule = %expr, "posted repeating event");
        self.inner.stats.incr_events();
        Ok(event)
    }

    async fn rollback_repeating(&self, id: &Ident) {
        let _ = self
            .inner
            .crons
            .process(DeleteCronEvent { id: id.clone() })
            .await;
        let _ = self.inner.scheduler.remove(id.clone()).await;
    }

    pub async fn get_event(&self, id: Ident) -> Result<Event, WorkflowError> {
        let type_name = self
            .inner
            .events
            .process(LookupTypeName { id: id.clone() })
            .await?;
        self.inner
            .events
            .process(GetEvent {
                type_name,
                id: id.clone(),
            })
            .await?
            .ok_or(WorkflowError::NotFound(id))
    }

    /// List events, optionally filtered by event type.
    ///
    /// When both filters are supplied, the id wins.
    pub async fn list_events(
        &self,
        event_type_id: Option<Ident>,
        event_type_name: Option<String>,
        page: Pagination,
    ) -> Result<(Vec<Event>, u64), WorkflowError> {
        let type_name = match (event_type_id, event_type_name) {
            (Some(id), _) => Some(self.resolve_event_type(&id).await?.name),
            (None, Some(name)) => Some(name),
            (None, None) => None,
        };
        Ok(self
            .inner
            .events
            .process(ListEvents { type_name, page })
            .await?)
    }

    /// List one type's events matching a caller-supplied query document.
    pub async fn query_events(
        &self,
        type_name: String,
        query: Value,
        page: Pagination,
    ) -> Result<(Vec<Event>, u64), WorkflowError> {
        Ok(self
            .inner
            .events
            .process(QueryEvents {
                type_name,
                query,
                page,
            })
            .await?)
    }

    /// List events carrying a given `eventTypeId`, scoped to that type's
    /// namespace.
    pub async fn list_events_by_event_type(
        &self,
        event_type_id: Ident,
        page: Pagination,
    ) -> Result<(Vec<Event>, u64), WorkflowError> {
        let event_type = self.resolve_event_type(&event_type_id).await?;
        Ok(self
            .inner
            .events
            .process(ListEventsByType {
                type_name: event_type.name,
                event_type_id,
                page,
            })
            .await?)
    }

    /// Delete an event; a repeating event also loses its cron row and its
    /// scheduler registration.
    pub async fn delete_event(&self, id: Ident) -> Result<(), WorkflowError> {
        let type_name = self
            .inner
            .events
            .process(LookupTypeName { id: id.clone() })
            .await?;
        let deleted = self
            .inner
            .events
            .process(DeleteEvent {
                type_name,
                id: id.clone(),
            })
            .await?;
        if !deleted {
            return Err(WorkflowError::NotFound(id));
        }

        if self
            .inner
            .crons
            .process(CronEventExists { id: id.clone() })
            .await?
        {
            self.inner
                .crons
                .process(DeleteCronEvent { id: id.clone() })
                .await?;
            let _ = self.inner.scheduler.remove(id.clone()).await;
        }

        tracing::info!(event_id = %id, "deleted event");
        Ok(())
    }

    // -- triggers -------------------------------------------------------

    /// Store a trigger and register its standing query under every
    /// referenced event type.
    pub async fn post_trigger(&self, mut trigger: Trigger) -> Result<Trigger, WorkflowError> {
        if trigger.condition.event_type_ids.is_empty() {
            return Err(WorkflowError::bad_request(
                "trigger condition must reference at least one event type",
            ));
        }

        let mut type_names = Vec::with_capacity(trigger.condition.event_type_ids.len());
        for id in &trigger.condition.event_type_ids {
            type_names.push(self.resolve_event_type(id).await?.name);
        }

        trigger.trigger_id = self.inner.ids.next_id();
        trigger.created_on = OffsetDateTime::now_utc();

        self.inner
            .triggers
            .process(PutTrigger {
                trigger: trigger.clone(),
                event_type_names: type_names,
            })
            .await?;

        tracing::info!(trigger_id = %trigger.trigger_id, "posted trigger");
        self.inner.stats.incr_triggers();
        Ok(trigger)
    }

    pub async fn get_trigger(&self, id: Ident) -> Result<Trigger, WorkflowError> {
        self.inner
            .triggers
            .process(GetTrigger { id: id.clone() })
            .await?
            .ok_or(WorkflowError::NotFound(id))
    }

    pub async fn list_triggers(
        &self,
        page: Pagination,
    ) -> Result<(Vec<Trigger>, u64), WorkflowError> {
        Ok(self.inner.triggers.process(ListTriggers { page }).await?)
    }

    pub async fn delete_trigger(&self, id: Ident) -> Result<(), WorkflowError> {
        let Some(trigger) = self
            .inner
            .triggers
            .process(GetTrigger { id: id.clone() })
            .await?
        else {
            return Err(WorkflowError::NotFound(id));
        };

        // Types whose registry row is already gone leave their percolator
        // behind; cleanup is best-effort.
        let mut type_names = Vec::new();
        for type_id in &trigger.condition.event_type_ids {
            match self
                .inner
                .event_types
                .process(GetEventType {
                    id: type_id.clone(),
                })
                .await
            {
                Ok(Some(event_type)) => type_names.push(event_type.name),
                Ok(None) => {
                    tracing::warn!(
                        trigger_id = %id,
                        event_type_id = %type_id,
                        "trigger references a deleted event type; leaving its percolator"
                    );
                }
                Err(err) => {
                    tracing::warn!(trigger_id = %id, error = %err, "event type lookup failed");
                }
            }
        }

        let deleted = self
            .inner
            .triggers
            .process(DeleteTrigger {
                id: id.clone(),
                event_type_names: type_names,
            })
            .await?;
        if !deleted {
            return Err(WorkflowError::NotFound(id.clone()));
        }
        tracing::info!(trigger_id = %id, "deleted trigger");
        Ok(())
    }

    // -- alerts ---------------------------------------------------------

    /// Record one (event, trigger, job) match. Called from the fan-out;
    /// append-only.
    pub async fn post_alert(
        &self,
        event_id: Ident,
        trigger_id: Ident,
        job_id: Ident,
    ) -> Result<Alert, WorkflowError> {
        let alert = Alert {
            alert_id: self.inner.ids.next_id(),
            event_id,
            trigger_id,
            job_id,
            created_on: OffsetDateTime::now_utc(),
        };
        self.inner
            .alerts
            .process(PutAlert {
                alert: alert.clone(),
            })
            .await?;
        tracing::info!(alert_id = %alert.alert_id, "posted alert");
        self.inner.stats.incr_alerts();
        Ok(alert)
    }

    pub async fn get_alert(&self, id: Ident) -> Result<Alert, WorkflowError> {
        self.inner
            .alerts
            .process(GetAlert { id: id.clone() })
            .await?
            .ok_or(WorkflowError::NotFound(id))
    }

    /// List alerts, optionally filtered by trigger. The filter must be a
    /// well-formed UUID.
    pub async fn list_alerts(
        &self,
        trigger_id: Option<String>,
        page: Pagination,
    ) -> Result<(Vec<Alert>, u64), WorkflowError> {
        match trigger_id {
            Some(raw) => {
                if Uuid::parse_str(&raw).is_err() {
                    return Err(WorkflowError::bad_request(
                        "malformed triggerId query parameter",
                    ));
                }
                Ok(self
                    .inner
                    .alerts
                    .process(ListAlertsByTrigger {
                        trigger_id: Ident::new(raw),
                        page,
                    })
                    .await?)
            }
            None => Ok(self.inner.alerts.process(ListAlerts { page }).await?),
        }
    }

    pub async fn delete_alert(&self, id: Ident) -> Result<(), WorkflowError> {
        let deleted = self
            .inner
            .alerts
            .process(DeleteAlert { id: id.clone() })
            .await?;
        if !deleted {
            return Err(WorkflowError::NotFound(id));
        }
        tracing::info!(alert_id = %id, "deleted alert");
        Ok(())
    }

    // -- admin ----------------------------------------------------------

    pub fn admin_stats(&self) -> AdminStats {
        self.inner.stats.snapshot()
    }

    pub async fn admin_settings(&self) -> AdminSettings {
        self.inner.settings.get().await
    }

    pub async fn update_admin_settings(&self, settings: AdminSettings) -> AdminSettings {
        self.inner.settings.replace(settings).await;
        self.inner.settings.get().await
    }

    // -- cron -----------------------------------------------------------

    /// Replay every cron row into the scheduler and start it.
    ///
    /// After this returns, the set of active scheduled entries equals the
    /// set of rows in the cron store. Fired entries re-enter
    /// [`post_event`](Self::post_event) as fresh events carrying
    /// `created_by = <origin id>`; their errors are logged and swallowed.
    pub async fn init_cron(
        &self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), WorkflowError> {
        let runner = self
            .inner
            .runner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| WorkflowError::internal("cron already initialized"))?;

        for event in self.inner.crons.process(ListCronEvents).await? {
            let expr = event.cron_schedule.clone().unwrap_or_default();
            match CronSchedule::parse(&expr) {
                Ok(schedule) => {
                    self.inner
                        .scheduler
                        .add(event.event_id.clone(), schedule, event)
                        .await
                        .map_err(|e| WorkflowError::internal(format!("scheduler: {e}")))?;
                }
                Err(err) => {
                    tracing::error!(
                        event_id = %event.event_id,
                        schedule = %expr,
                        error = %err,
                        "cron row no longer parses; not rescheduling"
                    );
                }
            }
        }

        let (fire_tx, mut fire_rx) = mpsc::channel::<Event>(DEFAULT_CHANNEL_BUFFER);
        tokio::spawn(runner.run(fire_tx, shutdown_rx));

        let dispatcher = self.clone();
        tokio::spawn(async move {
            while let Some(template) = fire_rx.recv().await {
                let spawned = Event {
                    event_id: Ident::none(),
                    event_type_id: template.event_type_id.clone(),
                    data: template.data.clone(),
                    created_on: OffsetDateTime::now_utc(),
                    cron_schedule: None,
                    created_by: Some(template.event_id.clone()),
                };
                if let Err(err) = dispatcher.post_event(spawned).await {
                    tracing::error!(
                        origin_event = %template.event_id,
                        error = %err,
                        "cron-spawned event failed"
                    );
                }
            }
        });

        tracing::info!("cron initialized");
        Ok(())
    }

    /// Ids of every active scheduler entry (observability surface).
    pub async fn scheduled_entries(&self) -> Result<Vec<Ident>, WorkflowError> {
        self.inner
            .scheduler
            .entries()
            .await
            .map_err(|e| WorkflowError::internal(format!("scheduler: {e}")))
    }

    // -- shared ---------------------------------------------------------

    /// An unknown referenced event-type id is a caller error.
    async fn resolve_event_type(&self, id: &Ident) -> Result<EventType, WorkflowError> {
        self.inner
            .event_types
            .process(GetEventType { id: id.clone() })
            .await?
            .ok_or_else(|| {
                WorkflowError::bad_request(format!("event type {id} does not exist"))
            })
    }
}
