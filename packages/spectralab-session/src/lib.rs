mod bridge;
pub mod config;
pub mod error;
pub mod logs;
pub mod markers;
pub mod measurements;
pub mod protocol;
pub mod session;
pub mod state;
pub mod types;

pub use config::{summarize_config_changes, Preset, RuntimeConfig};
pub use error::{Result, SessionError};
pub use markers::{find_markers, next_marker_label};
pub use protocol::{
    decode_inbound, BridgeInbound, BridgeOutbound, CaptureCommand, ProtocolError,
    StatePatchMessage,
};
pub use session::{AnalyzerSession, SpectrumView};
pub use state::{
    apply_patch, create_trace_memory, initial_state, EVENT_LOG_LIMIT, MEASUREMENT_LOG_LIMIT,
    TRACE_MEMORY_LIMIT,
};
pub use types::*;
