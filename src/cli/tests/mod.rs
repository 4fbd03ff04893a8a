//! Unit tests for the CLI module
//!
//! Registry lookup, argument validation, formatting and the commands that
//! only touch configuration or the store. Backend-facing commands are
//! covered by the integration tests.

#![allow(clippy::unwrap_used, clippy::panic)]

use toml::Value;

use crate::{
    cli::{CliError, CliService, CommandEnv, formatting::format_toml_value},
    config::BridgeConfig,
    model::{LogRecord, RecordLevel},
    store::BridgeStore,
};

fn service() -> (CliService, BridgeStore) {
    let store = BridgeStore::in_memory("http://penguin.linux.test:5000");
    let env = CommandEnv::new(BridgeConfig::default(), store.clone());
    (CliService::new(env), store)
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn format_toml_value_scalars() {
    assert_eq!(format_toml_value(&Value::String("hi".into())), "\"hi\"");
    assert_eq!(format_toml_value(&Value::Integer(-123)), "-123");
    assert_eq!(format_toml_value(&Value::Float(-2.5)), "-2.5");
    assert_eq!(format_toml_value(&Value::Boolean(false)), "false");
}

#[test]
fn format_toml_value_collections() {
    let array = Value::Array(vec![Value::Integer(1), Value::Integer(2)]);
    assert_eq!(format_toml_value(&array), "[2]");

    let mut table = toml::map::Map::new();
    table.insert("key".to_string(), Value::Integer(1));
    assert_eq!(format_toml_value(&Value::Table(table)), "{1}");
}

#[tokio::test]
async fn registry_lists_every_category() {
    let (service, _store) = service();
    let listed = service.list_all();

    let categories: Vec<&str> = listed.iter().map(|(c, _)| c.as_str()).collect();
    assert_eq!(categories, vec!["bridge", "config", "media"]);

    let media = &listed.iter().find(|(c, _)| c == "media").unwrap().1;
    assert_eq!(
        media,
        &args(&["next", "pause", "play", "previous", "seek", "select", "stop"])
    );
}

#[tokio::test]
async fn unknown_command_is_reported() {
    let (service, _store) = service();

    let err = service.execute_command("audio", "mute", &[]).await.unwrap_err();
    assert!(matches!(err, CliError::CommandNotFound(_)));

    let err = service.execute_command("media", "rewind", &[]).await.unwrap_err();
    assert!(matches!(err, CliError::CommandNotFound(_)));
}

#[tokio::test]
async fn argument_count_is_validated() {
    let (service, _store) = service();

    let err = service.execute_command("media", "seek", &[]).await.unwrap_err();
    assert!(matches!(err, CliError::InvalidArguments(_)));

    let err = service
        .execute_command("media", "play", &args(&["extra"]))
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::InvalidArguments(_)));
}

#[tokio::test]
async fn config_get_reads_store_and_config() {
    let (service, _store) = service();

    let url = service
        .execute_command("config", "get", &args(&["base-url"]))
        .await
        .unwrap();
    assert_eq!(url, "base-url: http://penguin.linux.test:5000");

    let delay = service
        .execute_command("config", "get", &args(&["stream.reconnect_delay_ms"]))
        .await
        .unwrap();
    assert_eq!(delay, "stream.reconnect_delay_ms: 1500");

    let err = service
        .execute_command("config", "get", &args(&["stream.nope"]))
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::ConfigError(_)));
}

#[tokio::test]
async fn config_set_base_url_validates_and_resets() {
    let (service, store) = service();

    service
        .execute_command("config", "set", &args(&["base-url", "http://10.0.0.2:5000/"]))
        .await
        .unwrap();
    assert_eq!(store.base_url(), "http://10.0.0.2:5000");

    let err = service
        .execute_command("config", "set", &args(&["base-url", "ftp://nope"]))
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::InvalidArgument { .. }));
    assert_eq!(store.base_url(), "http://10.0.0.2:5000");

    service
        .execute_command("config", "set", &args(&["base-url", ""]))
        .await
        .unwrap();
    assert_eq!(store.base_url(), "http://penguin.linux.test:5000");
}

#[tokio::test]
async fn config_set_rejects_other_keys() {
    let (service, _store) = service();

    let err = service
        .execute_command("config", "set", &args(&["stream.reconnect_delay_ms", "10"]))
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::InvalidArgument { .. }));
}

#[tokio::test]
async fn bridge_logs_prints_tail() {
    let (service, store) = service();

    let empty = service.execute_command("bridge", "logs", &[]).await.unwrap();
    assert_eq!(empty, "No bridge logs recorded");

    for i in 0..5 {
        store
            .append_log(LogRecord::now(RecordLevel::Info, format!("entry {i}")))
            .await
            .unwrap();
    }

    let output = service
        .execute_command("bridge", "logs", &args(&["2"]))
        .await
        .unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("entry 3"));
    assert!(lines[1].ends_with("entry 4"));
}

#[tokio::test]
async fn bridge_status_shows_health() {
    let (service, _store) = service();

    let output = service.execute_command("bridge", "status", &[]).await.unwrap();
    assert!(output.contains("[idle]"));
    assert!(output.contains("http://penguin.linux.test:5000"));
}

#[tokio::test]
async fn help_mentions_run_and_commands() {
    let (service, _store) = service();
    let help = service.help_text();

    assert!(help.contains("run"));
    assert!(help.contains("seek"));
    assert!(help.contains("<position>"));
}
