use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::SessionError;
use crate::types::{ConfigPatch, PathMode, TriggerMode};

/// Runtime settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// WebSocket bridge URL; absent means the local simulator drives the
    /// session
    pub bridge_url: Option<String>,
    /// Capture cycle period while capturing
    pub capture_interval: Duration,
    /// Heartbeat period stamping `lastSync` while capturing
    pub heartbeat_interval: Duration,
    /// Simulated connection handshake delay
    pub connect_delay: Duration,
    /// Point count at which spectrum passes move off the control loop
    pub offload_threshold: usize,
    /// Samples per generated trace
    pub trace_points: usize,
    /// Viewport used for screen-space projection of the live trace
    pub view_width: u32,
    pub view_height: u32,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            bridge_url: env::var("ANALYZER_BRIDGE_URL").ok().filter(|v| !v.is_empty()),
            capture_interval: Duration::from_millis(
                env_parse("ANALYZER_CAPTURE_INTERVAL_MS", 1500),
            ),
            heartbeat_interval: Duration::from_millis(
                env_parse("ANALYZER_HEARTBEAT_INTERVAL_MS", 3000),
            ),
            connect_delay: Duration::from_millis(env_parse("ANALYZER_CONNECT_DELAY_MS", 800)),
            offload_threshold: env_parse("ANALYZER_OFFLOAD_THRESHOLD", 2048),
            trace_points: env_parse("ANALYZER_TRACE_POINTS", 256),
            view_width: env_parse("ANALYZER_VIEW_WIDTH", 960),
            view_height: env_parse("ANALYZER_VIEW_HEIGHT", 320),
        }
    }

    pub fn is_bridge_mode(&self) -> bool {
        self.bridge_url.is_some()
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bridge_url: None,
            capture_interval: Duration::from_millis(1500),
            heartbeat_interval: Duration::from_millis(3000),
            connect_delay: Duration::from_millis(800),
            offload_threshold: 2048,
            trace_points: 256,
            view_width: 960,
            view_height: 320,
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Named instrument setups recallable from the front panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Fr2,
    Satcom,
    Radar,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Fr2 => "5g-fr2",
            Preset::Satcom => "satcom",
            Preset::Radar => "radar",
        }
    }

    /// The partial config this preset applies.
    pub fn patch(&self) -> ConfigPatch {
        match self {
            Preset::Fr2 => ConfigPatch {
                center_frequency_ghz: Some(28.0),
                span_ghz: Some(2.0),
                analysis_bandwidth_ghz: Some(2.0),
                rbw_khz: Some(100.0),
                vbw_khz: Some(30.0),
                trigger_mode: Some(TriggerMode::Video),
                path_mode: Some(PathMode::Correlation),
                ..Default::default()
            },
            Preset::Satcom => ConfigPatch {
                center_frequency_ghz: Some(20.0),
                span_ghz: Some(1.0),
                analysis_bandwidth_ghz: Some(1.2),
                rbw_khz: Some(10.0),
                vbw_khz: Some(10.0),
                trigger_mode: Some(TriggerMode::FreeRun),
                path_mode: Some(PathMode::SingleRf),
                ..Default::default()
            },
            Preset::Radar => ConfigPatch {
                center_frequency_ghz: Some(77.0),
                span_ghz: Some(6.0),
                analysis_bandwidth_ghz: Some(4.0),
                rbw_khz: Some(50.0),
                vbw_khz: Some(20.0),
                trigger_mode: Some(TriggerMode::External),
                path_mode: Some(PathMode::DualRf),
                ..Default::default()
            },
        }
    }
}

impl FromStr for Preset {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "5g-fr2" => Ok(Preset::Fr2),
            "satcom" => Ok(Preset::Satcom),
            "radar" => Ok(Preset::Radar),
            other => Err(SessionError::UnknownPreset(other.to_string())),
        }
    }
}

/// Human-readable summary of the fields a patch changes, in declaration
/// order, joined with a bullet separator.
pub fn summarize_config_changes(patch: &ConfigPatch) -> String {
    let mut fragments = Vec::new();

    if let Some(v) = patch.center_frequency_ghz {
        fragments.push(format!("center {v:.2} GHz"));
    }
    if let Some(v) = patch.span_ghz {
        fragments.push(format!("span {v:.2} GHz"));
    }
    if let Some(v) = patch.analysis_bandwidth_ghz {
        fragments.push(format!("BW {v:.2} GHz"));
    }
    if let Some(v) = patch.reference_level_dbm {
        fragments.push(format!("ref {v:.1} dBm"));
    }
    if let Some(v) = patch.rbw_khz {
        fragments.push(format!("RBW {v:.0} kHz"));
    }
    if let Some(v) = patch.vbw_khz {
        fragments.push(format!("VBW {v:.0} kHz"));
    }
    if let Some(v) = patch.attenuation_db {
        fragments.push(format!("atten {v:.0} dB"));
    }
    if let Some(v) = patch.averaging_count {
        fragments.push(format!("avg ×{v}"));
    }
    if let Some(v) = patch.trigger_mode {
        fragments.push(format!("trigger {v}"));
    }
    if let Some(v) = patch.path_mode {
        fragments.push(format!("path {v}"));
    }

    fragments.join(" • ")
}
