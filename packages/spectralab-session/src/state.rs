use chrono::{DateTime, Duration, Utc};
use spectra_rs::{compute_noise_floor, generate_spectrum_trace, SpectrumPoint};

use crate::logs::create_short_id;
use crate::measurements::{measurement_snapshot, MEASUREMENT_SPECS};
use crate::types::{
    AcquisitionState, AnalyzerConfig, AnalyzerPatch, AnalyzerState, AppModule, ConnectionState,
    PathMode, SpecificationHighlight, TraceMemory, TriggerMode,
};

pub const TRACE_MEMORY_LIMIT: usize = 6;
pub const EVENT_LOG_LIMIT: usize = 60;
pub const MEASUREMENT_LOG_LIMIT: usize = 120;

/// Seed for the session's initial trace, fixed so a fresh session is
/// reproducible.
pub const INITIAL_TRACE_SEED: u32 = 0x9e37_79b9;

/// Summary snapshot of a completed capture. An empty trace still produces a
/// memory, pinned to the center frequency with floor-level amplitudes.
pub fn create_trace_memory(
    trace: &[SpectrumPoint],
    config: &AnalyzerConfig,
    label: &str,
    captured_at: DateTime<Utc>,
) -> TraceMemory {
    if trace.is_empty() {
        return TraceMemory {
            id: create_short_id("trace"),
            label: label.to_string(),
            captured_at,
            peak_frequency_hz: config.center_frequency_ghz * 1e9,
            peak_amplitude_dbm: -200.0,
            noise_floor_dbm: -200.0,
            reference_level_dbm: config.reference_level_dbm,
            span_ghz: config.span_ghz,
            path_mode: config.path_mode,
        };
    }

    let mut peak = trace[0];
    for p in &trace[1..] {
        if p.amplitude > peak.amplitude {
            peak = *p;
        }
    }
    let floor = compute_noise_floor(trace).unwrap_or(-200.0);

    TraceMemory {
        id: create_short_id("trace"),
        label: label.to_string(),
        captured_at,
        peak_frequency_hz: peak.frequency,
        peak_amplitude_dbm: round1(peak.amplitude),
        noise_floor_dbm: round1(floor),
        reference_level_dbm: config.reference_level_dbm,
        span_ghz: config.span_ghz,
        path_mode: config.path_mode,
    }
}

pub fn default_config() -> AnalyzerConfig {
    AnalyzerConfig {
        center_frequency_ghz: 28.0,
        span_ghz: 6.0,
        analysis_bandwidth_ghz: 8.0,
        reference_level_dbm: 10.0,
        rbw_khz: 100.0,
        vbw_khz: 30.0,
        attenuation_db: 20.0,
        averaging_count: 100,
        trigger_mode: TriggerMode::FreeRun,
        path_mode: PathMode::Correlation,
    }
}

/// Session state at start-up: disconnected, auto peak search on, the
/// deterministic initial trace installed, and three historical captures in
/// trace memory.
pub fn initial_state() -> AnalyzerState {
    let config = default_config();
    let spectrum = generate_spectrum_trace(
        config.center_frequency_ghz,
        config.span_ghz,
        spectra_rs::DEFAULT_TRACE_POINTS,
        INITIAL_TRACE_SEED,
    );

    let now = Utc::now();
    let correlation_config = AnalyzerConfig {
        span_ghz: 2.0,
        analysis_bandwidth_ghz: 2.0,
        trigger_mode: TriggerMode::Video,
        path_mode: PathMode::Correlation,
        ..config
    };
    let dual_path_config = AnalyzerConfig {
        center_frequency_ghz: 24.0,
        span_ghz: 4.0,
        analysis_bandwidth_ghz: 4.0,
        path_mode: PathMode::DualRf,
        ..config
    };
    let single_path_config = AnalyzerConfig {
        center_frequency_ghz: 18.0,
        span_ghz: 3.0,
        analysis_bandwidth_ghz: 3.0,
        path_mode: PathMode::SingleRf,
        ..config
    };

    let trace_memories = vec![
        memory_from(&correlation_config, 111, "Correlation capture • 12:05:16", now - Duration::minutes(7)),
        memory_from(&dual_path_config, 222, "Dual-path capture • 12:02:44", now - Duration::minutes(9)),
        memory_from(&single_path_config, 333, "Single-path capture • 11:59:02", now - Duration::minutes(12)),
    ];

    AnalyzerState {
        model: "T&M SPAX3044".to_string(),
        serial: "1023.0012K03/203".to_string(),
        firmware: "1.08.3".to_string(),
        connection_state: ConnectionState::Disconnected,
        acquisition_state: AcquisitionState::Idle,
        last_sync: None,
        config,
        measurements: MEASUREMENT_SPECS.iter().map(measurement_snapshot).collect(),
        spectrum,
        markers: Vec::new(),
        marker_auto_peak_search: true,
        trace_memories,
        event_log: Vec::new(),
        measurement_log: Vec::new(),
        specification_highlights: default_specification_highlights(),
        app_modules: default_app_modules(),
    }
}

fn memory_from(
    config: &AnalyzerConfig,
    seed: u32,
    label: &str,
    captured_at: DateTime<Utc>,
) -> TraceMemory {
    let trace = generate_spectrum_trace(
        config.center_frequency_ghz,
        config.span_ghz,
        spectra_rs::DEFAULT_TRACE_POINTS,
        seed,
    );
    create_trace_memory(&trace, config, label, captured_at)
}

/// Apply a patch atomically: every present field replaces the state field
/// wholesale, except `config`, which merges.
pub fn apply_patch(state: &mut AnalyzerState, patch: AnalyzerPatch) {
    if let Some(v) = patch.model {
        state.model = v;
    }
    if let Some(v) = patch.serial {
        state.serial = v;
    }
    if let Some(v) = patch.firmware {
        state.firmware = v;
    }
    if let Some(v) = patch.connection_state {
        state.connection_state = v;
    }
    if let Some(v) = patch.acquisition_state {
        state.acquisition_state = v;
    }
    if let Some(v) = patch.last_sync {
        state.last_sync = v;
    }
    if let Some(v) = patch.config {
        v.apply_to(&mut state.config);
    }
    if let Some(v) = patch.measurements {
        state.measurements = v;
    }
    if let Some(v) = patch.spectrum {
        state.spectrum = v;
    }
    if let Some(v) = patch.markers {
        state.markers = v;
    }
    if let Some(v) = patch.marker_auto_peak_search {
        state.marker_auto_peak_search = v;
    }
    if let Some(v) = patch.trace_memories {
        state.trace_memories = v;
    }
    if let Some(v) = patch.event_log {
        state.event_log = v;
    }
    if let Some(v) = patch.measurement_log {
        state.measurement_log = v;
    }
}

fn default_specification_highlights() -> Vec<SpecificationHighlight> {
    vec![
        SpecificationHighlight {
            title: "Analysis Bandwidth".to_string(),
            value: "Up to 8 GHz".to_string(),
            caption: "Dual 4 GHz paths, 8 GHz combined correlation".to_string(),
        },
        SpecificationHighlight {
            title: "Frequency Coverage".to_string(),
            value: "26.5 / 44 GHz".to_string(),
            caption: "SPAX3026 & SPAX3044 models".to_string(),
        },
        SpecificationHighlight {
            title: "Phase Noise".to_string(),
            value: "<-136 dBc/Hz".to_string(),
            caption: "At 10 kHz offset, 1 GHz carrier".to_string(),
        },
    ]
}

fn default_app_modules() -> Vec<AppModule> {
    vec![
        AppModule {
            id: "phase-noise".to_string(),
            name: "Phase Noise (KM129/130)".to_string(),
            summary: "Cross-correlation enhanced phase noise analyzer integrated in-box."
                .to_string(),
            enabled: true,
        },
        AppModule {
            id: "noise-figure".to_string(),
            name: "Noise Figure (KM125/126)".to_string(),
            summary:
                "Measure ultra-low NF without external noise source via dual-path correlation."
                    .to_string(),
            enabled: true,
        },
        AppModule {
            id: "dpd".to_string(),
            name: "DPD & Amplifier Test (KM118-120)".to_string(),
            summary: "Characterize PA linearity, AM/AM, AM/PM, and real-time DPD feedback."
                .to_string(),
            enabled: false,
        },
        AppModule {
            id: "crossact".to_string(),
            name: "CrossACT Automation".to_string(),
            summary: "Coordinate multi-channel measurements and synchronized triggering."
                .to_string(),
            enabled: true,
        },
    ]
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
