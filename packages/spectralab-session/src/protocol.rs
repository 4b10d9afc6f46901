use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::{AcquisitionState, ConfigPatch, ConnectionState, Marker, Measurement};
use spectra_rs::SpectrumPoint;

/// Validated inbound bridge message, ready to apply as a state patch.
#[derive(Debug, Clone)]
pub enum BridgeInbound {
    Heartbeat,
    Spectrum(Vec<SpectrumPoint>),
    Measurements(Vec<Measurement>),
    Config(ConfigPatch),
    Acquisition(AcquisitionState),
    State(Box<StatePatchMessage>),
}

/// Loose partial state patch. Known fields are typed; unknown fields are
/// tolerated and carried through in `extra` rather than rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatePatchMessage {
    pub model: Option<String>,
    pub serial: Option<String>,
    pub firmware: Option<String>,
    #[serde(rename = "connectionState")]
    pub connection_state: Option<ConnectionState>,
    #[serde(rename = "acquisitionState")]
    pub acquisition_state: Option<AcquisitionState>,
    /// Normalized by the receiver; the bridge may send any timestamp shape
    #[serde(rename = "lastSync")]
    pub last_sync: Option<Value>,
    pub config: Option<ConfigPatch>,
    pub measurements: Option<Vec<Measurement>>,
    pub spectrum: Option<Vec<SpectrumPoint>>,
    pub markers: Option<Vec<Marker>>,
    #[serde(rename = "markerAutoPeakSearch")]
    pub marker_auto_peak_search: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("message is not a tagged envelope: {0}")]
    Envelope(String),

    #[error("unsupported message type: {0}")]
    UnknownType(String),

    #[error("{kind} payload failed validation: {message}")]
    Schema { kind: &'static str, message: String },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

/// Decode an already-parsed JSON value into a typed inbound message.
///
/// Validation failures carry the decoder's issue message so the caller can
/// log it; they never mutate state.
pub fn decode_inbound(value: Value) -> Result<BridgeInbound, ProtocolError> {
    let envelope: Envelope =
        serde_json::from_value(value).map_err(|err| ProtocolError::Envelope(err.to_string()))?;

    match envelope.kind.as_str() {
        "heartbeat" => Ok(BridgeInbound::Heartbeat),
        "spectrum" => Ok(BridgeInbound::Spectrum(expect_payload(
            "spectrum",
            envelope.payload,
        )?)),
        "measurements" => Ok(BridgeInbound::Measurements(expect_payload(
            "measurements",
            envelope.payload,
        )?)),
        "config" => Ok(BridgeInbound::Config(expect_payload(
            "config",
            envelope.payload,
        )?)),
        "acquisition" => Ok(BridgeInbound::Acquisition(expect_payload(
            "acquisition",
            envelope.payload,
        )?)),
        "state" => Ok(BridgeInbound::State(Box::new(expect_payload(
            "state",
            envelope.payload,
        )?))),
        other => Err(ProtocolError::UnknownType(other.to_string())),
    }
}

fn expect_payload<T: serde::de::DeserializeOwned>(
    kind: &'static str,
    payload: Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(payload).map_err(|err| ProtocolError::Schema {
        kind,
        message: err.to_string(),
    })
}

/// Capture control commands sent to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureCommand {
    StartCapture,
    StopCapture,
}

/// Outbound bridge messages; fire-and-forget.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum BridgeOutbound {
    #[serde(rename = "handshake")]
    Handshake { client: String, version: String },
    #[serde(rename = "command")]
    Command { command: CaptureCommand },
    #[serde(rename = "config.update")]
    ConfigUpdate { payload: ConfigPatch },
    #[serde(rename = "preset.recall")]
    PresetRecall { preset: String },
}

impl BridgeOutbound {
    pub fn handshake() -> Self {
        BridgeOutbound::Handshake {
            client: "spectralab".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
