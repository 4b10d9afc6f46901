use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spectra_rs::SpectrumPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Connecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionState {
    Idle,
    Armed,
    Capturing,
}

/// Receiver path routing: single receiver, dual receiver, or
/// cross-correlation of both paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathMode {
    #[serde(rename = "1RF")]
    SingleRf,
    #[serde(rename = "2RF")]
    DualRf,
    #[serde(rename = "correlation")]
    Correlation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerMode {
    #[serde(rename = "free run")]
    FreeRun,
    #[serde(rename = "video")]
    Video,
    #[serde(rename = "external")]
    External,
}

impl std::fmt::Display for PathMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PathMode::SingleRf => "1RF",
            PathMode::DualRf => "2RF",
            PathMode::Correlation => "correlation",
        })
    }
}

impl std::fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TriggerMode::FreeRun => "free run",
            TriggerMode::Video => "video",
            TriggerMode::External => "external",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementStatus {
    Good,
    Warning,
    Critical,
}

/// Sweep and path settings owned by the acquisition state machine. Mutated
/// only through [`ConfigPatch`] application.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(rename = "centerFrequencyGHz")]
    pub center_frequency_ghz: f64,
    #[serde(rename = "spanGHz")]
    pub span_ghz: f64,
    #[serde(rename = "analysisBandwidthGHz")]
    pub analysis_bandwidth_ghz: f64,
    #[serde(rename = "referenceLevelDbm")]
    pub reference_level_dbm: f64,
    #[serde(rename = "rbwKHz")]
    pub rbw_khz: f64,
    #[serde(rename = "vbwKHz")]
    pub vbw_khz: f64,
    #[serde(rename = "attenuationDb")]
    pub attenuation_db: f64,
    #[serde(rename = "averagingCount")]
    pub averaging_count: u32,
    #[serde(rename = "triggerMode")]
    pub trigger_mode: TriggerMode,
    #[serde(rename = "pathMode")]
    pub path_mode: PathMode,
}

/// Partial update for [`AnalyzerConfig`]; absent fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(
        rename = "centerFrequencyGHz",
        skip_serializing_if = "Option::is_none"
    )]
    pub center_frequency_ghz: Option<f64>,
    #[serde(rename = "spanGHz", skip_serializing_if = "Option::is_none")]
    pub span_ghz: Option<f64>,
    #[serde(
        rename = "analysisBandwidthGHz",
        skip_serializing_if = "Option::is_none"
    )]
    pub analysis_bandwidth_ghz: Option<f64>,
    #[serde(rename = "referenceLevelDbm", skip_serializing_if = "Option::is_none")]
    pub reference_level_dbm: Option<f64>,
    #[serde(rename = "rbwKHz", skip_serializing_if = "Option::is_none")]
    pub rbw_khz: Option<f64>,
    #[serde(rename = "vbwKHz", skip_serializing_if = "Option::is_none")]
    pub vbw_khz: Option<f64>,
    #[serde(rename = "attenuationDb", skip_serializing_if = "Option::is_none")]
    pub attenuation_db: Option<f64>,
    #[serde(rename = "averagingCount", skip_serializing_if = "Option::is_none")]
    pub averaging_count: Option<u32>,
    #[serde(rename = "triggerMode", skip_serializing_if = "Option::is_none")]
    pub trigger_mode: Option<TriggerMode>,
    #[serde(rename = "pathMode", skip_serializing_if = "Option::is_none")]
    pub path_mode: Option<PathMode>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge into a full config, returning the result.
    pub fn merged_into(&self, config: &AnalyzerConfig) -> AnalyzerConfig {
        let mut next = *config;
        self.apply_to(&mut next);
        next
    }

    pub fn apply_to(&self, config: &mut AnalyzerConfig) {
        if let Some(v) = self.center_frequency_ghz {
            config.center_frequency_ghz = v;
        }
        if let Some(v) = self.span_ghz {
            config.span_ghz = v;
        }
        if let Some(v) = self.analysis_bandwidth_ghz {
            config.analysis_bandwidth_ghz = v;
        }
        if let Some(v) = self.reference_level_dbm {
            config.reference_level_dbm = v;
        }
        if let Some(v) = self.rbw_khz {
            config.rbw_khz = v;
        }
        if let Some(v) = self.vbw_khz {
            config.vbw_khz = v;
        }
        if let Some(v) = self.attenuation_db {
            config.attenuation_db = v;
        }
        if let Some(v) = self.averaging_count {
            config.averaging_count = v;
        }
        if let Some(v) = self.trigger_mode {
            config.trigger_mode = v;
        }
        if let Some(v) = self.path_mode {
            config.path_mode = v;
        }
    }
}

/// A placed or auto-detected marker. Labels are unique per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub label: String,
    pub frequency: f64,
    pub amplitude: f64,
}

/// Immutable summary snapshot of a completed capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceMemory {
    pub id: String,
    pub label: String,
    pub captured_at: DateTime<Utc>,
    pub peak_frequency_hz: f64,
    pub peak_amplitude_dbm: f64,
    pub noise_floor_dbm: f64,
    pub reference_level_dbm: f64,
    #[serde(rename = "spanGHz")]
    pub span_ghz: f64,
    pub path_mode: PathMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub source: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub measurement_id: String,
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub status: MeasurementStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
}

/// One tracked scalar measurement as displayed. `value` is the formatted
/// string shown on screen; the numeric baseline lives in
/// [`crate::measurements::MEASUREMENT_SPECS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: String,
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
    pub status: MeasurementStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificationHighlight {
    pub title: String,
    pub value: String,
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppModule {
    pub id: String,
    pub name: String,
    pub summary: String,
    pub enabled: bool,
}

/// Aggregate session state. Single logical owner; every external mutation
/// goes through [`crate::state::apply_patch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerState {
    pub model: String,
    pub serial: String,
    pub firmware: String,
    pub connection_state: ConnectionState,
    pub acquisition_state: AcquisitionState,
    pub last_sync: Option<DateTime<Utc>>,
    pub config: AnalyzerConfig,
    pub measurements: Vec<Measurement>,
    pub spectrum: Vec<SpectrumPoint>,
    pub markers: Vec<Marker>,
    pub marker_auto_peak_search: bool,
    pub trace_memories: Vec<TraceMemory>,
    pub event_log: Vec<EventLogEntry>,
    pub measurement_log: Vec<MeasurementLogEntry>,
    pub specification_highlights: Vec<SpecificationHighlight>,
    pub app_modules: Vec<AppModule>,
}

/// Atomic replace-whole-field update for [`AnalyzerState`]. `config` is the
/// one exception: it is itself a partial merge.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerPatch {
    pub model: Option<String>,
    pub serial: Option<String>,
    pub firmware: Option<String>,
    pub connection_state: Option<ConnectionState>,
    pub acquisition_state: Option<AcquisitionState>,
    pub last_sync: Option<Option<DateTime<Utc>>>,
    pub config: Option<ConfigPatch>,
    pub measurements: Option<Vec<Measurement>>,
    pub spectrum: Option<Vec<SpectrumPoint>>,
    pub markers: Option<Vec<Marker>>,
    pub marker_auto_peak_search: Option<bool>,
    pub trace_memories: Option<Vec<TraceMemory>>,
    pub event_log: Option<Vec<EventLogEntry>>,
    pub measurement_log: Option<Vec<MeasurementLogEntry>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_wire_names_keep_unit_suffixes() {
        let config = AnalyzerConfig {
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
        };
        let json = serde_json::to_value(config).unwrap();
        assert_eq!(json["centerFrequencyGHz"], 28.0);
        assert_eq!(json["rbwKHz"], 100.0);
        assert_eq!(json["triggerMode"], "free run");
        assert_eq!(json["pathMode"], "correlation");
    }

    #[test]
    fn config_patch_round_trips_partial_fields() {
        let patch: ConfigPatch =
            serde_json::from_str(r#"{"spanGHz": 2.0, "pathMode": "2RF"}"#).unwrap();
        assert_eq!(patch.span_ghz, Some(2.0));
        assert_eq!(patch.path_mode, Some(PathMode::DualRf));
        assert!(patch.center_frequency_ghz.is_none());

        let json = serde_json::to_value(patch).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 2);
    }

    #[test]
    fn config_patch_merge_leaves_absent_fields() {
        let config = AnalyzerConfig {
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
        };
        let patch = ConfigPatch {
            span_ghz: Some(2.0),
            ..Default::default()
        };
        let merged = patch.merged_into(&config);
        assert_eq!(merged.span_ghz, 2.0);
        assert_eq!(merged.center_frequency_ghz, 28.0);
        assert_eq!(merged.trigger_mode, TriggerMode::FreeRun);
    }
}
