use super::*;
use crate::actuation::{RecordingPanel, RecordingSpeech};
use crate::arbiter::LedState;
use crate::config::StationConfig;
use crate::error::StationError;
use crate::events::{AlertKind, StationEvent};
use crate::geometry::{AllowList, Point, ZoneSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

fn create_test_config() -> StationConfig {
    let mut config = StationConfig::default();
    config.transport.bind = "127.0.0.1:0".to_string();
    config.timer.enabled = false;
    config.system.shutdown_timeout_seconds = 2;
    config
}

fn create_test_orchestrator() -> (StationOrchestrator, Arc<RecordingPanel>, Arc<RecordingSpeech>) {
    let panel = RecordingPanel::new();
    let speech = RecordingSpeech::new(Duration::from_millis(10));
    let orchestrator = StationOrchestrator::with_components(
        create_test_config(),
        ZoneSet::default(),
        AllowList::with_default(vec!["TRAY".to_string()]),
        panel.clone(),
        speech.clone(),
    );
    (orchestrator, panel, speech)
}

async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn test_orchestrator_creation() {
    let (mut orchestrator, _panel, _speech) = create_test_orchestrator();

    assert!(orchestrator.get_all_component_states().await.is_empty());
    assert!(orchestrator.snapshot().is_none());

    orchestrator.initialize().await.unwrap();
    let states = orchestrator.get_all_component_states().await;
    assert_eq!(states.len(), 3);
    assert_eq!(states.get("arbiter"), Some(&ComponentState::Stopped));
    assert!(!states.contains_key("keyboard"));
}

#[tokio::test]
async fn test_keyboard_registered_only_when_enabled() {
    let (mut orchestrator, _panel, _speech) = create_test_orchestrator();
    orchestrator.set_keyboard_enabled(true);
    orchestrator.initialize().await.unwrap();

    assert_eq!(
        orchestrator.get_component_state("keyboard").await,
        Some(ComponentState::Stopped)
    );
}

#[tokio::test]
async fn test_start_and_shutdown_drive_the_panel() {
    let (mut orchestrator, panel, speech) = create_test_orchestrator();
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    let states = orchestrator.get_all_component_states().await;
    assert!(states.values().all(|s| *s == ComponentState::Running));

    orchestrator
        .event_bus()
        .publish(StationEvent::alert(AlertKind::HardOut))
        .unwrap();

    assert!(wait_for(|| panel.shown().contains(&LedState::AlarmOn)).await);
    assert!(wait_for(|| !speech.spoken().is_empty()).await);
    assert_eq!(speech.spoken()[0], "Object left the work area.");

    let exit_code = orchestrator.shutdown().await.unwrap();
    assert_eq!(exit_code, 0);

    // The arbiter's final command is drained before the worker stops
    assert_eq!(panel.shown().last(), Some(&LedState::Off));

    let states = orchestrator.get_all_component_states().await;
    assert!(states.values().all(|s| *s == ComponentState::Stopped));

    let snapshot = orchestrator.snapshot().unwrap();
    assert_eq!(snapshot.stats.accepted, 1);
    assert_eq!(snapshot.led, LedState::Off);
}

#[tokio::test]
async fn test_observations_flow_through_tracking() {
    let (mut orchestrator, panel, _speech) = create_test_orchestrator();
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    // No table boundary and no regions: every sighting is outside its allowed set
    let bus = orchestrator.event_bus();
    for _ in 0..30 {
        bus.publish(StationEvent::observation(7, Point::new(10, 10)))
            .unwrap();
        sleep(Duration::from_millis(50)).await;
    }

    assert!(wait_for(|| panel.shown().contains(&LedState::PinkBlink)).await);

    orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_start_twice_is_an_error() {
    let (mut orchestrator, _panel, _speech) = create_test_orchestrator();
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    assert!(matches!(
        orchestrator.start().await,
        Err(StationError::System { .. })
    ));

    orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_user_request_ends_run() {
    let (mut orchestrator, panel, _speech) = create_test_orchestrator();
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    let bus = orchestrator.event_bus();
    let run = tokio::spawn(async move { orchestrator.run().await });

    sleep(Duration::from_millis(50)).await;
    bus.publish(StationEvent::ShutdownRequested {
        reason: "test".to_string(),
    })
    .unwrap();

    let exit_code = timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(exit_code, 0);
    assert_eq!(panel.shown().last(), Some(&LedState::Off));
}

#[tokio::test]
async fn test_new_fails_on_missing_zones() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config();
    config.zones.zones_path = dir.path().join("missing.json").display().to_string();

    assert!(matches!(
        StationOrchestrator::new(config).await,
        Err(StationError::Geometry { .. })
    ));
}

fn write_zone_files(dir: &std::path::Path) -> StationConfig {
    let zones = dir.join("zones.json");
    std::fs::write(
        &zones,
        r#"{
            "frame_size": {"width": 640, "height": 480},
            "zones": [
                {"name": "table", "pts": [[0, 0], [640, 0], [640, 480], [0, 480]]},
                {"name": "tray", "pts": [[100, 100], [200, 100], [200, 200], [100, 200]]}
            ]
        }"#,
    )
    .unwrap();

    let mut config = create_test_config();
    config.zones.zones_path = zones.display().to_string();
    config.zones.allow_path = dir.join("allow.json").display().to_string();
    config
}

#[tokio::test]
async fn test_new_loads_and_rescales_zones() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = write_zone_files(dir.path());
    config.zones.frame_width = Some(1280);
    config.zones.frame_height = Some(960);

    let orchestrator = StationOrchestrator::new(config).await.unwrap();
    let zones = orchestrator.zones();

    assert_eq!(zones.region_count(), 1);
    let table = zones.table().unwrap();
    assert_eq!(table.points()[2], Point::new(1280, 960));
    assert_eq!(zones.region("TRAY").unwrap().points()[0], Point::new(200, 200));
}

#[tokio::test]
async fn test_new_fails_on_missing_serial_device() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = write_zone_files(dir.path());
    config.actuation.serial_device = Some(dir.path().join("ttyUSB7").display().to_string());

    assert!(matches!(
        StationOrchestrator::new(config).await,
        Err(StationError::Hardware { .. })
    ));
}

#[tokio::test]
async fn test_shutdown_reason_types() {
    let signal_reason = ShutdownReason::Signal("SIGTERM".to_string());
    match signal_reason {
        ShutdownReason::Signal(sig) => assert_eq!(sig, "SIGTERM"),
        _ => panic!("Expected Signal shutdown reason"),
    }

    let user_reason = ShutdownReason::UserRequest("keyboard".to_string());
    assert_ne!(user_reason, ShutdownReason::Error("keyboard".to_string()));
    assert_eq!(format!("{:?}", user_reason), "UserRequest(\"keyboard\")");
}

#[tokio::test]
async fn test_component_state_transitions() {
    let (orchestrator, _panel, _speech) = create_test_orchestrator();
    let component = "test_component";

    assert_eq!(orchestrator.get_component_state(component).await, None);

    for state in [
        ComponentState::Starting,
        ComponentState::Running,
        ComponentState::Stopping,
        ComponentState::Stopped,
    ] {
        orchestrator
            .set_component_state(component, state.clone())
            .await;
        assert_eq!(orchestrator.get_component_state(component).await, Some(state));
    }
}
