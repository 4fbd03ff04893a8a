//! Unit tests for the store module.
//! In-memory only; persistence is covered by `tests/store.rs`.

#![allow(clippy::unwrap_used)]

use serde_json::{Value, json};

use crate::model::{ConnectionHealth, DebugState, LOG_LIMIT, LogRecord, RecordLevel};
use crate::store::{BASE_URL_KEY, BridgeStore, ChangeSource, DEBUG_KEY, LOGS_KEY, StorageChange};

const DEFAULT_URL: &str = "http://penguin.linux.test:5000";

fn record(message: &str) -> LogRecord {
    LogRecord {
        at: 0,
        level: RecordLevel::Info,
        message: message.to_string(),
    }
}

#[test]
fn storage_change_extracts_typed_values() {
    let change = StorageChange::new(BASE_URL_KEY, None, Some(json!("http://a")));

    assert_eq!(change.as_string().as_deref(), Some("http://a"));
    assert_eq!(change.extract::<String>().unwrap(), "http://a");
    assert!(change.extract::<u32>().is_err());
    assert_eq!(change.source, ChangeSource::Local);

    let removed = StorageChange::new(BASE_URL_KEY, Some(json!("http://a")), None);
    assert_eq!(removed.as_string_or(DEFAULT_URL), DEFAULT_URL);
}

#[tokio::test]
async fn base_url_defaults_until_set() {
    let store = BridgeStore::in_memory(DEFAULT_URL);
    assert_eq!(store.base_url(), DEFAULT_URL);

    store.set_base_url("http://localhost:5167/").await.unwrap();
    assert_eq!(store.base_url(), "http://localhost:5167");

    store.set_base_url("   ").await.unwrap();
    assert_eq!(store.base_url(), DEFAULT_URL);
}

#[tokio::test]
async fn subscribers_receive_matching_changes_only() {
    let store = BridgeStore::in_memory(DEFAULT_URL);
    let mut base_url_sub = store.subscribe(BASE_URL_KEY).await.unwrap();
    let mut all_sub = store.subscribe("*").await.unwrap();

    store.append_log(record("hello")).await.unwrap();
    store.set_base_url("http://b").await.unwrap();

    let change = base_url_sub.recv().await.unwrap();
    assert_eq!(change.key, BASE_URL_KEY);
    assert_eq!(change.as_string().as_deref(), Some("http://b"));

    assert_eq!(all_sub.recv().await.unwrap().key, LOGS_KEY);
    assert_eq!(all_sub.recv().await.unwrap().key, BASE_URL_KEY);
}

#[tokio::test]
async fn unchanged_writes_are_not_broadcast() {
    let store = BridgeStore::in_memory(DEFAULT_URL);
    store.set_base_url("http://b").await.unwrap();

    let mut sub = store.subscribe(BASE_URL_KEY).await.unwrap();
    store.set_base_url("http://b").await.unwrap();
    store.set_base_url("http://c").await.unwrap();

    assert_eq!(sub.recv().await.unwrap().as_string().as_deref(), Some("http://c"));
}

#[tokio::test]
async fn log_appends_are_bounded_and_ordered() {
    let store = BridgeStore::in_memory(DEFAULT_URL);

    for i in 0..LOG_LIMIT + 10 {
        store.append_log(record(&format!("m{i}"))).await.unwrap();
    }

    let logs = store.logs();
    assert_eq!(logs.len(), LOG_LIMIT);
    assert_eq!(logs.records().next().unwrap().message, "m10");
}

#[tokio::test]
async fn concurrent_appends_are_not_lost() {
    let store = BridgeStore::in_memory(DEFAULT_URL);

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.append_log(record(&format!("t{i}"))).await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(store.logs().len(), 20);
}

#[tokio::test]
async fn debug_state_round_trips_and_ignores_garbage() {
    let store = BridgeStore::in_memory(DEFAULT_URL);
    assert!(store.debug_state().is_none());

    let mut state = DebugState::default_for("http://a");
    state.health = ConnectionHealth::Error;
    state.last_error = Some("down".to_string());
    store.set_debug_state(&state).await.unwrap();
    assert_eq!(store.debug_state(), Some(state));

    store
        .set([(DEBUG_KEY.to_string(), Value::String("garbage".into()))])
        .await
        .unwrap();
    assert!(store.debug_state().is_none());
}

#[tokio::test]
async fn snapshot_reports_raw_persisted_values() {
    let store = BridgeStore::in_memory(DEFAULT_URL);

    let empty = store.snapshot();
    assert_eq!(empty.base_url, None);
    assert_eq!(empty.bridge_debug, None);
    assert_eq!(empty.bridge_logs, None);

    store.set_base_url("http://x").await.unwrap();
    store.append_log(record("a")).await.unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.base_url.as_deref(), Some("http://x"));
    assert_eq!(snapshot.bridge_logs.unwrap().len(), 1);
}

#[tokio::test]
async fn removing_a_key_notifies_with_none() {
    let store = BridgeStore::in_memory(DEFAULT_URL);
    store.set_base_url("http://x").await.unwrap();

    let mut sub = store.subscribe(BASE_URL_KEY).await.unwrap();
    store.remove(BASE_URL_KEY).await.unwrap();

    let change = sub.recv().await.unwrap();
    assert_eq!(change.new_value, None);
    assert_eq!(store.base_url(), DEFAULT_URL);
}
