use thiserror::Error;

/// Unified error type for overbar.
///
/// Host-side lookups never surface here — a missing source or filter is
/// handled by skipping the dependent operation (see `host`). These are the
/// genuinely fatal kinds: bad configuration, broken terminal, I/O.
#[derive(Error, Debug)]
pub enum OverbarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Terminal error: {0}")]
    Terminal(String),
}

pub type OverbarResult<T> = Result<T, OverbarError>;
