#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::sync::Arc;

use mediabridge::{
    config::BridgeConfig,
    context::{BridgeContext, Persistence},
    model::{ConnectionHealth, PlaybackSnapshot, PlaybackStatus, SessionPlaybackState},
    session::{ActionDetails, ControlSurfaceAdapter, MediaAction, memory::MemorySession},
    store::BridgeStore,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

struct Bridge {
    store: BridgeStore,
    session: MemorySession,
    adapter: ControlSurfaceAdapter,
}

async fn bridge(server: &MockServer) -> Bridge {
    let config = BridgeConfig::default();
    let store = BridgeStore::in_memory(&config.backend.default_base_url);
    store.set_base_url(&server.uri()).await.unwrap();

    let ctx = BridgeContext::new("keepalive", Persistence::Direct(store.clone()), &config);
    ctx.load().await;

    let session = MemorySession::new();
    let adapter = ControlSurfaceAdapter::new(ctx, Some(Arc::new(session.clone())));

    Bridge {
        store,
        session,
        adapter,
    }
}

fn snapshot(status: PlaybackStatus) -> PlaybackSnapshot {
    PlaybackSnapshot {
        player_name: "spotify".into(),
        playback_status: status,
        title: Some("Schism".into()),
        artists: vec!["Tool".into()],
        art_url: Some("file:///music/lateralus cover.jpg".into()),
        duration_us: Some(400_000_000),
        position_us: 10_000_000,
        can_seek: true,
        ..PlaybackSnapshot::default()
    }
}

#[tokio::test]
async fn pause_key_while_paused_resumes_playback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/control/play"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut bridge = bridge(&server).await;
    bridge
        .adapter
        .apply_snapshot(snapshot(PlaybackStatus::Paused))
        .await;
    assert_eq!(
        bridge.session.playback_state(),
        Some(SessionPlaybackState::Paused)
    );

    let request = bridge
        .adapter
        .handle_action(ActionDetails::new(MediaAction::Pause))
        .await
        .unwrap();
    request.await.unwrap();

    server.verify().await;
    let logs = bridge.store.logs();
    assert!(
        logs.records()
            .any(|record| record.message == "sent control action: play")
    );
}

#[tokio::test]
async fn seek_to_moves_the_projection_before_the_backend_answers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/control/seek"))
        .and(query_param("positionUs", "42000000"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut bridge = bridge(&server).await;
    bridge
        .adapter
        .apply_snapshot(snapshot(PlaybackStatus::Paused))
        .await;

    let request = bridge
        .adapter
        .handle_action(ActionDetails::seek_to(42.0))
        .await
        .unwrap();
    assert_eq!(bridge.adapter.projector().position_now(), Some(42_000_000));
    assert_eq!(bridge.session.last_position().unwrap().position, 42.0);

    request.await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn seek_keys_default_to_ten_seconds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/control/seek"))
        .and(query_param("offsetUs", "-10000000"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/control/seek"))
        .and(query_param("offsetUs", "2500000"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut bridge = bridge(&server).await;

    let back = bridge
        .adapter
        .handle_action(ActionDetails::new(MediaAction::SeekBackward))
        .await
        .unwrap();
    let forward = bridge
        .adapter
        .handle_action(ActionDetails::seek_by(MediaAction::SeekForward, 2.5))
        .await
        .unwrap();
    back.await.unwrap();
    forward.await.unwrap();

    server.verify().await;
}

#[tokio::test]
async fn local_artwork_is_served_through_the_backend() {
    let server = MockServer::start().await;
    let mut bridge = bridge(&server).await;

    bridge
        .adapter
        .apply_snapshot(snapshot(PlaybackStatus::Playing))
        .await;

    let metadata = bridge.session.metadata().unwrap();
    assert_eq!(metadata.title, "Schism");
    assert_eq!(metadata.artist, "Tool");
    assert_eq!(
        metadata.artwork[0].src,
        format!(
            "{}/art?src=file%3A%2F%2F%2Fmusic%2Flateralus%20cover.jpg",
            server.uri()
        )
    );

    let debug = bridge.store.debug_state().unwrap();
    assert_eq!(debug.health, ConnectionHealth::Connected);
    assert_eq!(debug.last_state.unwrap().title.as_deref(), Some("Schism"));
}

#[tokio::test]
async fn failed_control_marks_the_context_unhealthy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/control/next"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let mut bridge = bridge(&server).await;
    let request = bridge
        .adapter
        .handle_action(ActionDetails::new(MediaAction::NextTrack))
        .await
        .unwrap();
    request.await.unwrap();

    let debug = bridge.store.debug_state().unwrap();
    assert_eq!(debug.health, ConnectionHealth::Error);
    assert!(debug.last_error.unwrap().starts_with("control failed"));

    let logs = bridge.store.logs();
    assert!(
        logs.records()
            .any(|record| record.message.starts_with("control action failed (next)"))
    );
}
