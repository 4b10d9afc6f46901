use std::time::Duration;

use spectra_rs::{compute_bounds, generate_spectrum_trace};
use spectralab_session::{
    AcquisitionState, AnalyzerSession, BridgeInbound, ConfigPatch, ConnectionState, Preset,
    RuntimeConfig, TriggerMode,
};

fn fast_runtime() -> RuntimeConfig {
    RuntimeConfig {
        connect_delay: Duration::from_millis(40),
        capture_interval: Duration::from_millis(80),
        heartbeat_interval: Duration::from_millis(160),
        ..RuntimeConfig::default()
    }
}

async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn connect_arms_acquisition_after_handshake() {
    let session = AnalyzerSession::new(fast_runtime());
    session.connect();

    let snapshot = session.snapshot();
    assert_eq!(snapshot.connection_state, ConnectionState::Connecting);

    let session_probe = session.clone();
    assert!(
        wait_until(Duration::from_millis(500), move || {
            session_probe.snapshot().connection_state == ConnectionState::Connected
        })
        .await
    );

    let snapshot = session.snapshot();
    assert_eq!(snapshot.acquisition_state, AcquisitionState::Armed);
    assert!(snapshot.last_sync.is_some());
    assert!(snapshot
        .event_log
        .iter()
        .any(|e| e.message == "Analyzer connected"));
}

#[tokio::test]
async fn toggle_is_ignored_while_disconnected() {
    let session = AnalyzerSession::new(fast_runtime());
    session.toggle_acquisition();
    assert_eq!(
        session.snapshot().acquisition_state,
        AcquisitionState::Idle
    );
}

#[tokio::test]
async fn capture_cycle_installs_traces_markers_and_memories() {
    let session = AnalyzerSession::new(fast_runtime());
    session.connect();
    tokio::time::sleep(Duration::from_millis(80)).await;

    let initial_spectrum = session.snapshot().spectrum;
    let initial_memories = session.snapshot().trace_memories.len();

    session.toggle_acquisition();
    assert_eq!(
        session.snapshot().acquisition_state,
        AcquisitionState::Capturing
    );
    assert!(session
        .snapshot()
        .event_log
        .iter()
        .any(|e| e.message == "Started wideband acquisition"));

    let session_probe = session.clone();
    assert!(
        wait_until(Duration::from_secs(2), move || {
            session_probe.snapshot().trace_memories.len() > initial_memories
        })
        .await
    );

    let snapshot = session.snapshot();
    assert_ne!(snapshot.spectrum, initial_spectrum);
    assert_eq!(snapshot.markers.len(), 3);
    assert_eq!(snapshot.markers[0].label, "M1");
    assert!(snapshot.markers[0].amplitude >= snapshot.markers[1].amplitude);
    assert!(snapshot.last_sync.is_some());

    // The dispatcher eventually publishes display data for the live trace.
    let session_probe = session.clone();
    assert!(
        wait_until(Duration::from_secs(2), move || {
            session_probe.spectrum_view().is_some()
        })
        .await
    );
    let view = session.spectrum_view().unwrap();
    assert!(view.coords.is_some());
    assert!(view.noise_floor.unwrap() < -80.0);
}

#[tokio::test]
async fn disconnect_cancels_capture_timers() {
    let session = AnalyzerSession::new(fast_runtime());
    session.connect();
    tokio::time::sleep(Duration::from_millis(80)).await;
    session.toggle_acquisition();
    tokio::time::sleep(Duration::from_millis(200)).await;

    session.disconnect();
    let snapshot = session.snapshot();
    assert_eq!(snapshot.connection_state, ConnectionState::Disconnected);
    assert_eq!(snapshot.acquisition_state, AcquisitionState::Idle);

    let memories = session.snapshot().trace_memories.len();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(session.snapshot().trace_memories.len(), memories);
}

#[tokio::test]
async fn manual_marker_snaps_to_nearest_sample() {
    let session = AnalyzerSession::new(fast_runtime());

    session.add_marker_at_frequency(28.0e9);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.markers.len(), 1);
    assert!(!snapshot.marker_auto_peak_search);

    let marker = &snapshot.markers[0];
    assert_eq!(marker.label, "M1");
    assert!(snapshot
        .spectrum
        .iter()
        .any(|p| p.frequency == marker.frequency && p.amplitude == marker.amplitude));
}

#[tokio::test]
async fn marker_labels_are_never_reused() {
    let session = AnalyzerSession::new(fast_runtime());

    session.add_marker_at_frequency(26.0e9);
    session.add_marker_at_frequency(29.0e9);
    session.delete_marker("M1");
    session.add_marker_at_frequency(28.0e9);

    let labels: Vec<String> = session
        .snapshot()
        .markers
        .iter()
        .map(|m| m.label.clone())
        .collect();
    assert_eq!(labels, vec!["M2".to_string(), "M3".to_string()]);
}

#[tokio::test]
async fn moving_a_marker_resnaps_by_frequency() {
    let session = AnalyzerSession::new(fast_runtime());
    session.add_marker_at_frequency(26.0e9);
    let before = session.snapshot().markers[0].clone();

    session.move_marker_to_frequency("M1", 30.0e9);
    let after = session.snapshot().markers[0].clone();
    assert_ne!(before.frequency, after.frequency);
    assert_eq!(after.label, "M1");

    // Moving to the same snapped sample is a no-op.
    session.move_marker_to_frequency("M1", after.frequency);
    assert_eq!(session.snapshot().markers[0], after);
}

#[tokio::test]
async fn preset_recall_applies_config_and_logs() {
    let session = AnalyzerSession::new(fast_runtime());
    session.recall_preset(Preset::Fr2);

    let snapshot = session.snapshot();
    assert_eq!(snapshot.config.trigger_mode, TriggerMode::Video);
    assert_eq!(
        snapshot.config.path_mode,
        spectralab_session::PathMode::Correlation
    );
    assert_eq!(snapshot.config.span_ghz, 2.0);

    assert!(snapshot
        .event_log
        .iter()
        .any(|e| e.message == "Recalled preset 5g-fr2"));
    assert!(snapshot
        .event_log
        .iter()
        .any(|e| e.message == "Updated analyzer settings"));
}

#[tokio::test]
async fn config_update_regenerates_trace_only_when_connected() {
    let session = AnalyzerSession::new(fast_runtime());
    let initial = session.snapshot().spectrum;

    session.update_config(ConfigPatch {
        span_ghz: Some(2.0),
        ..Default::default()
    });
    let snapshot = session.snapshot();
    assert_eq!(snapshot.config.span_ghz, 2.0);
    assert_eq!(snapshot.spectrum, initial);

    session.connect();
    tokio::time::sleep(Duration::from_millis(80)).await;
    session.update_config(ConfigPatch {
        span_ghz: Some(3.0),
        ..Default::default()
    });
    assert_ne!(session.snapshot().spectrum, initial);
}

#[tokio::test]
async fn spectrum_message_updates_state_and_auto_markers() {
    let session = AnalyzerSession::new(fast_runtime());
    let frame = r#"{
        "type": "spectrum",
        "payload": [
            {"frequency": 1e9, "amplitude": -80.0},
            {"frequency": 2e9, "amplitude": -40.0},
            {"frequency": 3e9, "amplitude": -60.0}
        ]
    }"#;

    session.handle_raw_message(frame);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.spectrum.len(), 3);
    assert_eq!(snapshot.markers[0].amplitude, -40.0);
    assert!(snapshot.last_sync.is_some());
}

#[tokio::test]
async fn invalid_measurement_payload_leaves_state_unchanged() {
    let session = AnalyzerSession::new(fast_runtime());
    let before = session.snapshot();

    // `value` must be a string
    let frame = r#"{
        "type": "measurements",
        "payload": [{"id": "evm", "label": "Residual EVM", "value": 0.58, "status": "good"}]
    }"#;
    session.handle_raw_message(frame);

    let after = session.snapshot();
    assert_eq!(after.measurements, before.measurements);
    assert!(after
        .event_log
        .iter()
        .any(|e| e.message == "Bridge message failed schema validation"));
}

#[tokio::test]
async fn malformed_json_logs_a_parse_warning() {
    let session = AnalyzerSession::new(fast_runtime());
    session.handle_raw_message("{not json");
    assert!(session
        .snapshot()
        .event_log
        .iter()
        .any(|e| e.message == "Failed to parse bridge message"));
}

#[tokio::test]
async fn superseding_trace_wins_over_earlier_offload_result() {
    let session = AnalyzerSession::new(fast_runtime());

    let trace_a = generate_spectrum_trace(1.5, 1.0, 256, 1);
    let trace_b = generate_spectrum_trace(5.5, 1.0, 256, 2);
    let bounds_b = compute_bounds(&trace_b);

    session.apply_inbound(BridgeInbound::Spectrum(trace_a));
    session.apply_inbound(BridgeInbound::Spectrum(trace_b.clone()));

    let session_probe = session.clone();
    assert!(
        wait_until(Duration::from_secs(2), move || {
            session_probe
                .spectrum_view()
                .is_some_and(|view| view.generation == 2)
        })
        .await
    );

    // Let any straggling result resolve: the view must still describe the
    // latest trace.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let view = session.spectrum_view().unwrap();
    assert_eq!(view.generation, 2);
    assert_eq!(view.bounds, bounds_b);
    assert_eq!(session.snapshot().spectrum, trace_b);
}

#[tokio::test]
async fn unreachable_bridge_reports_connection_error() {
    let runtime = RuntimeConfig {
        bridge_url: Some("ws://127.0.0.1:9".to_string()),
        ..fast_runtime()
    };
    let session = AnalyzerSession::new(runtime);
    session.connect();

    let session_probe = session.clone();
    assert!(
        wait_until(Duration::from_secs(3), move || {
            session_probe
                .snapshot()
                .event_log
                .iter()
                .any(|e| e.message == "Failed to open WebSocket")
        })
        .await
    );
    assert_eq!(
        session.snapshot().connection_state,
        ConnectionState::Disconnected
    );
}

#[tokio::test]
async fn reset_restores_initial_state() {
    let session = AnalyzerSession::new(fast_runtime());
    session.connect();
    tokio::time::sleep(Duration::from_millis(80)).await;
    session.add_marker_at_frequency(28.0e9);

    session.reset();
    let snapshot = session.snapshot();
    assert_eq!(snapshot.connection_state, ConnectionState::Disconnected);
    assert!(snapshot.markers.is_empty());
    assert!(snapshot.marker_auto_peak_search);
    assert!(snapshot.event_log.is_empty());
}
