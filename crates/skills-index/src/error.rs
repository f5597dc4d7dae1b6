use thiserror::Error;

/// Errors raised inside the index. The service layer turns every variant
/// into an `{"error": ...}` payload.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("{0}")]
    NotFound(String),

    #[error("Read error: {0}")]
    Read(String),

    #[error("{0}")]
    Parse(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;
