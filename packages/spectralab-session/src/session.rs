use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use spectra_rs::{
    append_many_with_limit, append_with_limit, generate_spectrum_trace, nearest_point, Bounds,
    ComputePath, DispatcherConfig, ProcessRequest, SpectrumDispatcher, SpectrumPoint, TaggedResult,
};

use crate::bridge;
use crate::config::{summarize_config_changes, Preset, RuntimeConfig};
use crate::error::{Result, SessionError};
use crate::logs::{event_entry, event_entry_at};
use crate::markers::{find_markers, next_marker_label};
use crate::measurements::walk_measurements;
use crate::protocol::{decode_inbound, BridgeInbound, BridgeOutbound, CaptureCommand};
use crate::state::{
    apply_patch, create_trace_memory, initial_state, EVENT_LOG_LIMIT, MEASUREMENT_LOG_LIMIT,
    TRACE_MEMORY_LIMIT,
};
use crate::types::{
    AcquisitionState, AnalyzerConfig, AnalyzerPatch, AnalyzerState, ConnectionState, LogLevel,
    Marker,
};

/// Capture-log entries are suppressed unless this much wall clock has passed
/// since the previous trace memory.
const CAPTURE_LOG_GAP_MS: i64 = 4000;

/// Latest processed display data for the current trace: bounds, noise floor,
/// and screen coordinates, tagged with the trace generation they belong to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectrumView {
    pub generation: u64,
    pub bounds: Bounds,
    pub noise_floor: Option<f64>,
    pub coords: Option<Vec<f32>>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl From<TaggedResult> for SpectrumView {
    fn from(tagged: TaggedResult) -> Self {
        Self {
            generation: tagged.generation,
            bounds: tagged.result.bounds,
            noise_floor: tagged.result.noise_floor,
            coords: tagged.result.coords,
            width: tagged.result.width,
            height: tagged.result.height,
        }
    }
}

#[derive(Default)]
struct SessionTasks {
    connect: Option<JoinHandle<()>>,
    capture: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    bridge: Option<JoinHandle<()>>,
}

impl SessionTasks {
    fn abort_connect(&mut self) {
        if let Some(handle) = self.connect.take() {
            handle.abort();
        }
    }

    fn abort_capture(&mut self) {
        if let Some(handle) = self.capture.take() {
            handle.abort();
        }
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
    }

    fn abort_bridge(&mut self) {
        if let Some(handle) = self.bridge.take() {
            handle.abort();
        }
    }

    fn abort_all(&mut self) {
        self.abort_connect();
        self.abort_capture();
        self.abort_bridge();
    }
}

pub(crate) struct SessionCore {
    pub(crate) runtime: RuntimeConfig,
    state: RwLock<AnalyzerState>,
    dispatcher: Arc<SpectrumDispatcher>,
    view: Arc<RwLock<Option<SpectrumView>>>,
    tasks: Mutex<SessionTasks>,
    outbound: Mutex<Option<mpsc::UnboundedSender<BridgeOutbound>>>,
}

impl SessionCore {
    fn new(runtime: RuntimeConfig) -> Self {
        let dispatcher = Arc::new(SpectrumDispatcher::new(DispatcherConfig {
            offload_threshold: runtime.offload_threshold,
        }));
        Self {
            runtime,
            state: RwLock::new(initial_state()),
            dispatcher,
            view: Arc::new(RwLock::new(None)),
            tasks: Mutex::new(SessionTasks::default()),
            outbound: Mutex::new(None),
        }
    }

    /// Single funnel for state mutation. The closure reads the current state
    /// and returns a patch, which is applied before the write lock is
    /// released, so readers never observe a partial update. The closure must
    /// not call back into the session.
    pub(crate) fn mutate<F>(&self, build: F)
    where
        F: FnOnce(&AnalyzerState) -> AnalyzerPatch,
    {
        let mut state = self.state.write();
        let patch = build(&state);
        apply_patch(&mut state, patch);
    }

    pub(crate) fn log_event(
        &self,
        level: LogLevel,
        source: &str,
        message: impl Into<String>,
        detail: Option<String>,
    ) {
        let message = message.into();
        self.mutate(|prev| AnalyzerPatch {
            event_log: Some(append_with_limit(
                &prev.event_log,
                event_entry(level, source, message, detail),
                EVENT_LOG_LIMIT,
            )),
            ..Default::default()
        });
    }

    fn generate_trace(&self, config: &AnalyzerConfig) -> Vec<SpectrumPoint> {
        let seed: u32 = rand::thread_rng().gen();
        generate_spectrum_trace(
            config.center_frequency_ghz,
            config.span_ghz,
            self.runtime.trace_points,
            seed,
        )
    }

    /// Kick off a processing pass for a freshly installed trace. The
    /// generation is claimed synchronously so a later installation always
    /// outranks this one, even if its result resolves first.
    pub(crate) fn submit_spectrum(&self, points: Vec<SpectrumPoint>) {
        let generation = self.dispatcher.begin_trace();
        let dispatcher = Arc::clone(&self.dispatcher);
        let view = Arc::clone(&self.view);
        let request =
            ProcessRequest::with_coords(points, self.runtime.view_width, self.runtime.view_height);
        tokio::spawn(async move {
            let tagged = dispatcher.process(generation, request).await;
            install_view(&dispatcher, &view, tagged);
        });
    }

    pub(crate) fn send_outbound(&self, message: BridgeOutbound) -> Result<()> {
        let guard = self.outbound.lock();
        let tx = guard.as_ref().ok_or(SessionError::BridgeClosed)?;
        tx.send(message).map_err(|_| SessionError::BridgeClosed)
    }

    pub(crate) fn clear_outbound(&self) {
        *self.outbound.lock() = None;
    }

    fn is_capturing(&self) -> bool {
        let state = self.state.read();
        state.connection_state == ConnectionState::Connected
            && state.acquisition_state == AcquisitionState::Capturing
    }

    /// Decode one raw bridge frame. Parse and validation failures become
    /// warning events and leave state untouched.
    pub(crate) fn handle_raw_message(&self, text: &str) {
        let value = match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => value,
            Err(err) => {
                warn!("bridge frame is not valid JSON: {err}");
                self.log_event(
                    LogLevel::Warning,
                    "bridge",
                    "Failed to parse bridge message",
                    Some(err.to_string()),
                );
                return;
            }
        };

        let message = match decode_inbound(value) {
            Ok(message) => message,
            Err(err) => {
                warn!("bridge frame failed validation: {err}");
                self.log_event(
                    LogLevel::Warning,
                    "bridge",
                    "Bridge message failed schema validation",
                    Some(err.to_string()),
                );
                return;
            }
        };

        self.apply_inbound(message);
    }

    /// Apply a validated inbound message as a state patch.
    pub(crate) fn apply_inbound(&self, message: BridgeInbound) {
        match message {
            BridgeInbound::Heartbeat => {
                self.mutate(|_| AnalyzerPatch {
                    last_sync: Some(Some(Utc::now())),
                    ..Default::default()
                });
            }

            BridgeInbound::Spectrum(points) => {
                let installed = points.clone();
                self.mutate(|prev| AnalyzerPatch {
                    markers: prev
                        .marker_auto_peak_search
                        .then(|| find_markers(&points)),
                    spectrum: Some(points.clone()),
                    last_sync: Some(Some(Utc::now())),
                    ..Default::default()
                });
                self.submit_spectrum(installed);
            }

            BridgeInbound::Measurements(measurements) => {
                self.mutate(|_| AnalyzerPatch {
                    measurements: Some(measurements),
                    last_sync: Some(Some(Utc::now())),
                    ..Default::default()
                });
            }

            BridgeInbound::Config(patch) => {
                let mut installed = None;
                self.mutate(|prev| {
                    let next_config = patch.merged_into(&prev.config);
                    let spectrum = (prev.connection_state == ConnectionState::Connected)
                        .then(|| self.generate_trace(&next_config));
                    let markers = prev.marker_auto_peak_search.then(|| {
                        find_markers(spectrum.as_deref().unwrap_or(&prev.spectrum))
                    });
                    installed = spectrum.clone();
                    AnalyzerPatch {
                        config: Some(patch),
                        spectrum,
                        markers,
                        last_sync: Some(Some(Utc::now())),
                        ..Default::default()
                    }
                });
                if let Some(trace) = installed {
                    self.submit_spectrum(trace);
                }
            }

            BridgeInbound::Acquisition(acquisition) => {
                self.mutate(|_| AnalyzerPatch {
                    acquisition_state: Some(acquisition),
                    last_sync: Some(Some(Utc::now())),
                    ..Default::default()
                });
            }

            BridgeInbound::State(patch) => {
                let installed = patch.spectrum.clone();
                self.mutate(|_| AnalyzerPatch {
                    model: patch.model,
                    serial: patch.serial,
                    firmware: patch.firmware,
                    connection_state: patch.connection_state,
                    acquisition_state: patch.acquisition_state,
                    config: patch.config,
                    measurements: patch.measurements,
                    spectrum: patch.spectrum,
                    markers: patch.markers,
                    marker_auto_peak_search: patch.marker_auto_peak_search,
                    last_sync: Some(Some(Utc::now())),
                    ..Default::default()
                });
                if let Some(trace) = installed {
                    self.submit_spectrum(trace);
                }
            }
        }
    }
}

/// Install a processed result unless a newer trace has superseded it. The
/// view generation never decreases, so a slow result can never clobber a
/// newer one.
fn install_view(
    dispatcher: &SpectrumDispatcher,
    view: &RwLock<Option<SpectrumView>>,
    tagged: TaggedResult,
) {
    let mut view = view.write();
    if view
        .as_ref()
        .is_some_and(|current| current.generation > tagged.generation)
    {
        debug!(
            generation = tagged.generation,
            "dropping outranked spectrum result"
        );
        return;
    }
    if !dispatcher.is_current(tagged.generation) {
        debug!(
            generation = tagged.generation,
            "dropping stale spectrum result"
        );
        return;
    }
    *view = Some(SpectrumView::from(tagged));
}

/// One simulated capture cycle: regenerate the trace, recompute markers,
/// walk the measurements, append trace memory and logs, stamp `lastSync`,
/// then hand the new trace to the dispatcher.
fn capture_tick(core: &SessionCore) {
    let mut installed = None;

    core.mutate(|prev| {
        let spectrum = core.generate_trace(&prev.config);
        let markers = prev
            .marker_auto_peak_search
            .then(|| find_markers(&spectrum));
        let (measurements, log_entries) =
            walk_measurements(&prev.measurements, &mut rand::thread_rng());

        let capture_time = Utc::now();
        let label = format!("Live capture • {}", capture_time.format("%H:%M:%S"));
        let memory = create_trace_memory(&spectrum, &prev.config, &label, capture_time);

        let should_log_capture = prev.trace_memories.last().map_or(true, |last| {
            capture_time - last.captured_at > ChronoDuration::milliseconds(CAPTURE_LOG_GAP_MS)
        });
        let event_log = should_log_capture.then(|| {
            append_with_limit(
                &prev.event_log,
                event_entry_at(
                    LogLevel::Info,
                    "acquisition",
                    format!("Captured trace ({:.1} GHz span)", prev.config.span_ghz),
                    Some(format!(
                        "Peak {:.1} dBm @ {:.3} GHz",
                        memory.peak_amplitude_dbm,
                        memory.peak_frequency_hz / 1e9
                    )),
                    capture_time,
                ),
                EVENT_LOG_LIMIT,
            )
        });

        let trace_memories =
            append_with_limit(&prev.trace_memories, memory, TRACE_MEMORY_LIMIT);
        let measurement_log =
            append_many_with_limit(&prev.measurement_log, log_entries, MEASUREMENT_LOG_LIMIT);

        installed = Some(spectrum.clone());
        AnalyzerPatch {
            spectrum: Some(spectrum),
            markers,
            measurements: Some(measurements),
            trace_memories: Some(trace_memories),
            event_log,
            measurement_log: Some(measurement_log),
            last_sync: Some(Some(capture_time)),
            ..Default::default()
        }
    });

    if let Some(trace) = installed {
        core.submit_spectrum(trace);
    }
}

async fn capture_loop(core: Arc<SessionCore>) {
    loop {
        tokio::time::sleep(core.runtime.capture_interval).await;
        if !core.is_capturing() {
            break;
        }
        capture_tick(&core);
    }
}

async fn heartbeat_loop(core: Arc<SessionCore>) {
    loop {
        tokio::time::sleep(core.runtime.heartbeat_interval).await;
        if !core.is_capturing() {
            break;
        }
        core.mutate(|_| AnalyzerPatch {
            last_sync: Some(Some(Utc::now())),
            ..Default::default()
        });
    }
}

/// Front door for the analyzer session. Commands may be issued from any
/// task; all of them resolve into atomic patches on the owned state.
///
/// With a bridge URL configured the session mirrors a remote instrument over
/// WebSocket; otherwise a local simulator drives the capture cycle. Must be
/// used inside a tokio runtime.
#[derive(Clone)]
pub struct AnalyzerSession {
    core: Arc<SessionCore>,
}

impl AnalyzerSession {
    pub fn new(runtime: RuntimeConfig) -> Self {
        Self {
            core: Arc::new(SessionCore::new(runtime)),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RuntimeConfig::default())
    }

    /// Consistent clone of the full session state.
    pub fn snapshot(&self) -> AnalyzerState {
        self.core.state.read().clone()
    }

    /// Latest processed display data, if a pass has completed.
    pub fn spectrum_view(&self) -> Option<SpectrumView> {
        self.core.view.read().clone()
    }

    /// Execution path the current trace size selects.
    pub fn compute_path(&self) -> ComputePath {
        let len = self.core.state.read().spectrum.len();
        self.core.dispatcher.path_for(len)
    }

    /// Open the analyzer link. Any previous link (including a half-open
    /// connect) is torn down first.
    pub fn connect(&self) {
        {
            let mut tasks = self.core.tasks.lock();
            tasks.abort_connect();
            tasks.abort_capture();
            tasks.abort_bridge();
        }
        self.core.clear_outbound();

        match self.core.runtime.bridge_url.clone() {
            Some(url) => {
                self.core.mutate(|prev| AnalyzerPatch {
                    connection_state: Some(ConnectionState::Connecting),
                    event_log: Some(append_with_limit(
                        &prev.event_log,
                        event_entry(
                            LogLevel::Info,
                            "connection",
                            "Opening analyzer session via bridge…",
                            Some(url.clone()),
                        ),
                        EVENT_LOG_LIMIT,
                    )),
                    ..Default::default()
                });

                let (tx, rx) = mpsc::unbounded_channel();
                *self.core.outbound.lock() = Some(tx);
                let handle = tokio::spawn(bridge::run(Arc::clone(&self.core), url, rx));
                self.core.tasks.lock().bridge = Some(handle);
            }
            None => {
                self.core.mutate(|prev| AnalyzerPatch {
                    connection_state: Some(ConnectionState::Connecting),
                    event_log: Some(append_with_limit(
                        &prev.event_log,
                        event_entry(
                            LogLevel::Info,
                            "connection",
                            "Opening analyzer session...",
                            None,
                        ),
                        EVENT_LOG_LIMIT,
                    )),
                    ..Default::default()
                });

                let core = Arc::clone(&self.core);
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(core.runtime.connect_delay).await;
                    core.mutate(|prev| AnalyzerPatch {
                        connection_state: Some(ConnectionState::Connected),
                        acquisition_state: Some(AcquisitionState::Armed),
                        last_sync: Some(Some(Utc::now())),
                        event_log: Some(append_with_limit(
                            &prev.event_log,
                            event_entry(
                                LogLevel::Info,
                                "connection",
                                "Analyzer connected",
                                Some("Acquisition armed; ready for capture.".to_string()),
                            ),
                            EVENT_LOG_LIMIT,
                        )),
                        ..Default::default()
                    });
                });
                self.core.tasks.lock().connect = Some(handle);
            }
        }
    }

    /// Close the link and return to idle. Pending connect timers and capture
    /// tasks are cancelled; an in-flight offloaded pass is neutralized by
    /// the staleness check when it resolves.
    pub fn disconnect(&self) {
        self.core.tasks.lock().abort_all();
        self.core.clear_outbound();

        self.core.mutate(|prev| AnalyzerPatch {
            connection_state: Some(ConnectionState::Disconnected),
            acquisition_state: Some(AcquisitionState::Idle),
            event_log: Some(append_with_limit(
                &prev.event_log,
                event_entry(
                    LogLevel::Info,
                    "connection",
                    "Analyzer link closed by user.",
                    None,
                ),
                EVENT_LOG_LIMIT,
            )),
            ..Default::default()
        });
    }

    /// Flip between armed and capturing. Ignored unless connected.
    pub fn toggle_acquisition(&self) {
        let (next, config) = {
            let state = self.core.state.read();
            if state.connection_state != ConnectionState::Connected {
                return;
            }
            let next = match state.acquisition_state {
                AcquisitionState::Capturing => AcquisitionState::Armed,
                _ => AcquisitionState::Capturing,
            };
            (next, state.config)
        };
        let starting = next == AcquisitionState::Capturing;

        if self.core.runtime.is_bridge_mode() {
            let command = if starting {
                CaptureCommand::StartCapture
            } else {
                CaptureCommand::StopCapture
            };
            if let Err(err) = self.core.send_outbound(BridgeOutbound::Command { command }) {
                self.core.log_event(
                    LogLevel::Error,
                    "connection",
                    "Bridge send failed",
                    Some(err.to_string()),
                );
            }
        }

        self.core.mutate(|prev| AnalyzerPatch {
            acquisition_state: Some(next),
            last_sync: starting.then(|| Some(Utc::now())),
            event_log: Some(append_with_limit(
                &prev.event_log,
                event_entry(
                    LogLevel::Info,
                    "acquisition",
                    if starting {
                        "Started wideband acquisition"
                    } else {
                        "Return to armed state"
                    },
                    starting.then(|| {
                        format!("Span {:.2} GHz • Path {}", config.span_ghz, config.path_mode)
                    }),
                ),
                EVENT_LOG_LIMIT,
            )),
            ..Default::default()
        });

        if !self.core.runtime.is_bridge_mode() {
            let mut tasks = self.core.tasks.lock();
            tasks.abort_capture();
            if starting {
                tasks.capture = Some(tokio::spawn(capture_loop(Arc::clone(&self.core))));
                tasks.heartbeat = Some(tokio::spawn(heartbeat_loop(Arc::clone(&self.core))));
            }
        }
    }

    /// Merge a partial config. While connected the trace is regenerated from
    /// the merged config immediately, keeping the acquisition loop in sync,
    /// and a summary of the changed fields is logged.
    pub fn update_config(&self, patch: crate::types::ConfigPatch) {
        let summary = if patch.is_empty() {
            String::new()
        } else {
            summarize_config_changes(&patch)
        };

        let mut installed = None;
        self.core.mutate(|prev| {
            let next_config = patch.merged_into(&prev.config);
            let spectrum = (prev.connection_state == ConnectionState::Connected)
                .then(|| self.core.generate_trace(&next_config));
            installed = spectrum.clone();

            AnalyzerPatch {
                config: Some(patch),
                spectrum,
                event_log: (!summary.is_empty()).then(|| {
                    append_with_limit(
                        &prev.event_log,
                        event_entry(
                            LogLevel::Info,
                            "config",
                            "Updated analyzer settings",
                            Some(summary.clone()),
                        ),
                        EVENT_LOG_LIMIT,
                    )
                }),
                ..Default::default()
            }
        });
        if let Some(trace) = installed {
            self.core.submit_spectrum(trace);
        }

        if self.core.runtime.is_bridge_mode() {
            if let Err(err) = self
                .core
                .send_outbound(BridgeOutbound::ConfigUpdate { payload: patch })
            {
                self.core.log_event(
                    LogLevel::Error,
                    "connection",
                    "Bridge send failed",
                    Some(err.to_string()),
                );
            }
        }
    }

    /// Apply one of the named instrument setups.
    pub fn recall_preset(&self, preset: Preset) {
        if self.core.runtime.is_bridge_mode() {
            if let Err(err) = self.core.send_outbound(BridgeOutbound::PresetRecall {
                preset: preset.as_str().to_string(),
            }) {
                self.core.log_event(
                    LogLevel::Error,
                    "connection",
                    "Bridge send failed",
                    Some(err.to_string()),
                );
            }
        }

        let patch = preset.patch();
        self.core.log_event(
            LogLevel::Info,
            "preset",
            format!("Recalled preset {}", preset.as_str()),
            Some(summarize_config_changes(&patch)),
        );
        self.update_config(patch);
    }

    /// Enable or disable auto peak search. Enabling recomputes markers
    /// immediately when a trace is present.
    pub fn set_marker_auto_peak_search(&self, enabled: bool) {
        self.core.mutate(|prev| AnalyzerPatch {
            marker_auto_peak_search: Some(enabled),
            markers: (enabled && !prev.spectrum.is_empty())
                .then(|| find_markers(&prev.spectrum)),
            ..Default::default()
        });
    }

    pub fn clear_markers(&self) {
        self.core.mutate(|_| AnalyzerPatch {
            markers: Some(Vec::new()),
            marker_auto_peak_search: Some(false),
            ..Default::default()
        });
    }

    /// Place a marker snapped to the sample nearest `frequency_hz`. Manual
    /// placement always wins over auto search.
    pub fn add_marker_at_frequency(&self, frequency_hz: f64) {
        self.core.mutate(|prev| {
            let Some(nearest) = nearest_point(&prev.spectrum, frequency_hz) else {
                return AnalyzerPatch::default();
            };
            let mut markers = prev.markers.clone();
            markers.push(Marker {
                label: next_marker_label(&prev.markers),
                frequency: nearest.frequency,
                amplitude: nearest.amplitude,
            });
            AnalyzerPatch {
                marker_auto_peak_search: Some(false),
                markers: Some(markers),
                ..Default::default()
            }
        });
    }

    pub fn delete_marker(&self, label: &str) {
        self.core.mutate(|prev| AnalyzerPatch {
            markers: Some(
                prev.markers
                    .iter()
                    .filter(|m| m.label != label)
                    .cloned()
                    .collect(),
            ),
            marker_auto_peak_search: Some(false),
            ..Default::default()
        });
    }

    /// Re-snap an existing marker to the sample nearest `frequency_hz`.
    /// A move that lands on the marker's current position is a no-op and
    /// does not disable auto search.
    pub fn move_marker_to_frequency(&self, label: &str, frequency_hz: f64) {
        self.core.mutate(|prev| {
            let Some(nearest) = nearest_point(&prev.spectrum, frequency_hz) else {
                return AnalyzerPatch::default();
            };
            let Some(existing) = prev.markers.iter().find(|m| m.label == label) else {
                return AnalyzerPatch::default();
            };
            if existing.frequency == nearest.frequency && existing.amplitude == nearest.amplitude
            {
                return AnalyzerPatch::default();
            }

            let markers = prev
                .markers
                .iter()
                .map(|m| {
                    if m.label == label {
                        Marker {
                            label: m.label.clone(),
                            frequency: nearest.frequency,
                            amplitude: nearest.amplitude,
                        }
                    } else {
                        m.clone()
                    }
                })
                .collect();
            AnalyzerPatch {
                marker_auto_peak_search: Some(false),
                markers: Some(markers),
                ..Default::default()
            }
        });
    }

    /// Restore the deterministic initial state and cancel every background
    /// task.
    pub fn reset(&self) {
        self.core.tasks.lock().abort_all();
        self.core.clear_outbound();
        *self.core.state.write() = initial_state();
        *self.core.view.write() = None;
    }

    /// Decode and apply one raw bridge frame (test and embedding hook; the
    /// bridge reader uses the same path).
    pub fn handle_raw_message(&self, text: &str) {
        self.core.handle_raw_message(text);
    }

    /// Apply an already-validated inbound message.
    pub fn apply_inbound(&self, message: BridgeInbound) {
        self.core.apply_inbound(message);
    }
}

impl Drop for SessionCore {
    fn drop(&mut self) {
        self.tasks.lock().abort_all();
    }
}
