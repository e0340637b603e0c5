//! Repeating-event tests: registration, replay after restart, teardown.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use time::OffsetDateTime;
use tokio::sync::watch;
use tripwire_core::bus::MemoryBus;
use tripwire_core::config::EngineConfig;
use tripwire_core::dispatcher::{Dispatcher, StoreHandles};
use tripwire_core::error::ErrorKind;
use tripwire_core::ident::{Ident, UuidGen};
use tripwire_core::stores::Event;
use tripwire_sdk::Pagination;

fn engine_over(handles: StoreHandles) -> (Dispatcher, Arc<MemoryBus>) {
    let bus = Arc::new(MemoryBus::new());
    let dispatcher = Dispatcher::new(
        handles,
        bus.clone(),
        Arc::new(UuidGen),
        EngineConfig::default(),
    );
    (dispatcher, bus)
}

fn repeating(event_type_id: &Ident, schedule: &str, data: Value) -> Event {
    Event {
        event_id: Ident::none(),
        event_type_id: event_type_id.clone(),
        data: data.as_object().cloned().unwrap_or_default(),
        created_on: OffsetDateTime::now_utc(),
        cron_schedule: Some(schedule.to_owned()),
        created_by: None,
    }
}

#[tokio::test]
async fn repeating_event_is_stored_but_not_dispatched() {
    let (engine, bus) = engine_over(StoreHandles::memory());

    let et = engine
        .post_event_type("heartbeat".into(), json!({"num": "integer"}))
        .await
        .unwrap();
    let posted = engine
        .post_event(repeating(&et.event_type_id, "@every 1h", json!({"num": 1})))
        .await
        .unwrap();

    // Stored and queryable like any event, but nothing was dispatched.
    assert!(engine.get_event(posted.event_id.clone()).await.is_ok());
    assert!(bus.messages().is_empty());
    let (alerts, _) = engine
        .list_alerts(None, Pagination::for_entity("alertId"))
        .await
        .unwrap();
    assert!(alerts.is_empty());
}

#[tokio::test]
async fn invalid_schedules_are_rejected() {
    let (engine, _) = engine_over(StoreHandles::memory());

    let et = engine
        .post_event_type("heartbeat".into(), json!({"num": "integer"}))
        .await
        .unwrap();
    let err = engine
        .post_event(repeating(&et.event_type_id, "whenever", json!({"num": 1})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[tokio::test]
async fn replay_after_restart_spawns_fresh_events() {
    let handles = StoreHandles::memory();

    // First life: register the repeating event, then stop without ever
    // starting the scheduler.
    let origin_id = {
        let (engine, _) = engine_over(handles.clone());
        let et = engine
            .post_event_type("heartbeat".into(), json!({"num": "integer"}))
            .await
            .unwrap();
        let posted = engine
            .post_event(repeating(&et.event_type_id, "@every 1s", json!({"num": 7})))
            .await
            .unwrap();
        posted.event_id
    };

    // Second life over the same storage: replay the cron rows.
    let (engine, bus) = engine_over(handles);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    engine.init_cron(shutdown_rx).await.unwrap();

    // The replayed entry matches the stored cron row.
    assert_eq!(engine.scheduled_entries().await.unwrap(), vec![origin_id.clone()]);

    // Within a couple of firings a spawned event carrying our id as its
    // creator shows up.
    let mut spawned = None;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let (events, _) = engine
            .list_events(None, None, Pagination::for_entity("eventId"))
            .await
            .unwrap();
        if let Some(hit) = events
            .iter()
            .find(|e| e.created_by.as_ref() == Some(&origin_id))
        {
            spawned = Some(hit.clone());
            break;
        }
    }
    let spawned = spawned.expect("no spawned event observed within 4s");
    assert_eq!(spawned.data["num"], 7);
    assert!(spawned.cron_schedule.is_none());

    // The cron row survives firing.
    assert_eq!(engine.scheduled_entries().await.unwrap(), vec![origin_id]);
    // Spawned events go through the normal pipeline (no triggers here, so
    // no bus traffic).
    assert!(bus.messages().is_empty());

    shutdown_tx.send(true).unwrap();
}

#[tokio::test]
async fn deleting_a_repeating_event_unschedules_it() {
    let handles = StoreHandles::memory();
    let (engine, _) = engine_over(handles);

    let et = engine
        .post_event_type("heartbeat".into(), json!({"num": "integer"}))
        .await
        .unwrap();
    let posted = engine
        .post_event(repeating(&et.event_type_id, "@every 1h", json!({"num": 1})))
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    engine.init_cron(shutdown_rx).await.unwrap();
    assert_eq!(
        engine.scheduled_entries().await.unwrap(),
        vec![posted.event_id.clone()]
    );

    engine.delete_event(posted.event_id.clone()).await.unwrap();
    assert!(engine.scheduled_entries().await.unwrap().is_empty());

    let err = engine.get_event(posted.event_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    shutdown_tx.send(true).unwrap();
}

#[tokio::test]
async fn cron_fires_keep_dispatching_matching_triggers() {
    use tripwire_core::stores::{Trigger, TriggerCondition, TriggerJob};

    let handles = StoreHandles::memory();
    let (engine, bus) = engine_over(handles);

    let et = engine
        .post_event_type("pulse".into(), json!({"num": "integer"}))
        .await
        .unwrap();
    engine
        .post_trigger(Trigger {
            trigger_id: Ident::none(),
            title: "on pulse".into(),
            condition: TriggerCondition {
                event_type_ids: vec![et.event_type_id.clone()],
                query: json!({"match": {"num": 7}}),
            },
            job: TriggerJob {
                task: json!("pulse $num"),
            },
            enabled: true,
            created_on: OffsetDateTime::now_utc(),
        })
        .await
        .unwrap();

    engine
        .post_event(repeating(&et.event_type_id, "@every 200ms", json!({"num": 7})))
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    engine.init_cron(shutdown_rx).await.unwrap();

    let mut fired = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if !bus.messages().is_empty() {
            fired = true;
            break;
        }
    }
    assert!(fired, "cron-spawned event never reached the bus");
    assert_eq!(bus.messages()[0].value, r#"{"task":"pulse 7"}"#);

    shutdown_tx.send(true).unwrap();
}
