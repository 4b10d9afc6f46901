use thiserror::Error;

#[derive(Error, Debug)]
pub enum OffloadError {
    #[error("offloaded computation did not complete: {0}")]
    WorkerFailed(String),
}

pub type Result<T> = std::result::Result<T, OffloadError>;
