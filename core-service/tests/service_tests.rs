//! End-to-end flows through the service façade.

mod common;

use common::{advance, config, page, settle, track, MockCatalog, ReadyFactory};
use core_catalog::{CatalogError, SearchResult};
use core_runtime::events::{CatalogEvent, CoreEvent};
use core_service::{CoreError, CoreService, PlaybackConfig, PlaybackStatus};
use std::sync::Arc;
use std::time::Duration;

fn service(catalog: MockCatalog) -> (CoreService, Arc<ReadyFactory>) {
    let factory = Arc::new(ReadyFactory::default());
    let core = CoreService::with_catalog(
        config(factory.clone()),
        PlaybackConfig::default(),
        Arc::new(catalog),
    )
    .unwrap();
    (core, factory)
}

fn search_hit(external_ref: &str) -> SearchResult {
    SearchResult {
        external_ref: external_ref.to_string(),
        title: "Hit".to_string(),
        description: String::new(),
        channel_id: "ch-1".to_string(),
        channel_title: "Channel".to_string(),
        thumbnail_url: "https://img.example.com/hit.jpg".to_string(),
        published_at: "2024-01-01T00:00:00Z".to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_init_creates_the_live_output_once() {
    let (core, factory) = service(MockCatalog::new());

    assert_eq!(factory.created_count(), 1);
    assert!(core.controller().is_running());
    assert_eq!(core.controller().session().status, PlaybackStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_play_track_by_id_switches_to_the_fetched_track() {
    let mut catalog = MockCatalog::new();
    catalog
        .expect_fetch_track_by_id()
        .withf(|id| id == "t-1")
        .times(1)
        .returning(|id| Ok(track(id)));
    let (core, factory) = service(catalog);

    let played = core.play_track_by_id("t-1").await.unwrap();
    let session = core.controller().snapshot().await.unwrap();

    assert_eq!(played.id, "t-1");
    assert_eq!(session.current_track_id(), Some("t-1"));
    assert_eq!(session.status, PlaybackStatus::Playing);
    assert!(!session.is_user_initiated_pause);
    assert_eq!(factory.total_plays(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_catalog_failure_leaves_playback_alone() {
    let mut catalog = MockCatalog::new();
    catalog
        .expect_fetch_track_by_id()
        .returning(|_| Err(CatalogError::Schema("missing streamUri".to_string())));
    let (core, _factory) = service(catalog);

    let err = core.play_track_by_id("t-1").await.unwrap_err();

    assert!(err.is_contract_violation());
    let session = core.controller().snapshot().await.unwrap();
    assert_eq!(session.status, PlaybackStatus::Idle);
    assert!(session.current_track.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_play_search_result_loads_during_navigation() {
    let mut catalog = MockCatalog::new();
    catalog
        .expect_fetch_track_by_external_ref()
        .withf(|external_ref| external_ref == "yt-9")
        .returning(|_| Ok(track("t-9")));
    let (core, factory) = service(catalog);

    let played = core.play_search_result(&search_hit("yt-9")).await.unwrap();
    let session = core.controller().snapshot().await.unwrap();

    assert_eq!(played.id, "t-9");
    assert_eq!(session.current_track_id(), Some("t-9"));
    assert!(session.navigation_in_flight);

    advance(Duration::from_millis(500)).await;

    let session = core.controller().session();
    assert!(!session.navigation_in_flight);
    assert_eq!(session.status, PlaybackStatus::Playing);
    assert_eq!(factory.total_plays(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_up_next_skips_the_current_track() {
    let mut catalog = MockCatalog::new();
    catalog
        .expect_fetch_track_by_id()
        .returning(|id| Ok(track(id)));
    catalog
        .expect_fetch_related_tracks()
        .withf(|query| query.current_track_id == "t-1" && query.page == 1)
        .returning(|_| Ok(page(vec![track("t-1"), track("t-2"), track("t-3")])));
    let (core, _factory) = service(catalog);
    let mut events = core.events();

    core.play_track_by_id("t-1").await.unwrap();
    let queued = core.refresh_up_next().await.unwrap();
    let session = core.controller().snapshot().await.unwrap();

    assert_eq!(queued.map(|t| t.id), Some("t-2".to_string()));
    assert_eq!(
        session.up_next.as_ref().map(|t| t.id.as_str()),
        Some("t-2")
    );

    let mut resolved = None;
    while let Some(Ok(event)) = events.try_recv() {
        if let CoreEvent::Catalog(CatalogEvent::UpNextResolved { up_next_id, .. }) = event {
            resolved = Some(up_next_id);
        }
    }
    assert_eq!(resolved, Some(Some("t-2".to_string())));
}

#[tokio::test(start_paused = true)]
async fn test_refresh_up_next_requires_a_current_track() {
    let (core, _factory) = service(MockCatalog::new());

    let err = core.refresh_up_next().await.unwrap_err();
    assert!(matches!(err, CoreError::NoCurrentTrack));
}

#[tokio::test(start_paused = true)]
async fn test_empty_related_list_clears_up_next() {
    let mut catalog = MockCatalog::new();
    catalog
        .expect_fetch_track_by_id()
        .returning(|id| Ok(track(id)));
    catalog
        .expect_fetch_related_tracks()
        .returning(|_| Ok(page(vec![track("t-1")])));
    let (core, _factory) = service(catalog);

    core.play_track_by_id("t-1").await.unwrap();
    core.controller().set_up_next(Some(track("stale"))).unwrap();

    assert!(core.refresh_up_next().await.unwrap().is_none());
    assert!(core.controller().snapshot().await.unwrap().up_next.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_the_engine() {
    let (core, _factory) = service(MockCatalog::new());

    core.shutdown().await.unwrap();
    settle().await;

    assert!(!core.controller().is_running());
    // A second shutdown is harmless.
    core.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_invalid_config_is_rejected() {
    let factory = Arc::new(ReadyFactory::default());
    let mut bad = config(factory.clone());
    bad.page_size = 0;

    let err = CoreService::with_catalog(bad, PlaybackConfig::default(), Arc::new(MockCatalog::new()))
        .unwrap_err();

    assert!(matches!(err, CoreError::Runtime(_)));
    assert_eq!(factory.created_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_playback_config_is_rejected() {
    let factory = Arc::new(ReadyFactory::default());
    let playback = PlaybackConfig {
        preload_capacity: 0,
        ..Default::default()
    };

    let err = CoreService::with_catalog(config(factory), playback, Arc::new(MockCatalog::new()))
        .unwrap_err();
    assert!(matches!(err, CoreError::Playback(_)));
}

#[test]
fn test_init_outside_a_runtime_fails() {
    let factory = Arc::new(ReadyFactory::default());
    let err = CoreService::with_catalog(
        config(factory),
        PlaybackConfig::default(),
        Arc::new(MockCatalog::new()),
    )
    .unwrap_err();

    assert!(matches!(err, CoreError::InitializationFailed(_)));
}
