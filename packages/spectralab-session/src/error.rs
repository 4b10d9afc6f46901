use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("bridge connection is not open")]
    BridgeClosed,

    #[error("unknown preset: {0}")]
    UnknownPreset(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
