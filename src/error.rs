//! Error types for fusim.

use thiserror::Error;

/// Errors raised while selecting genes and assembling fusions.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A malformed line in a gene model or other text input.
    #[error("{0}")]
    Parse(String),

    /// A single simulated event cannot be built from the data it was given.
    /// The event is skipped; the run continues.
    #[error("{0}")]
    InputData(String),

    /// An alignment, reference or worker failure. Always fatal.
    #[error("{0}")]
    Resource(String),

    /// Rejected settings, detected before any work starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Every requested event was skipped.
    #[error("no fusions produced ({0} events skipped)")]
    NoFusions(usize),
}

impl Error {
    /// True when the error only affects the current event.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::InputData(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Resource(format!("{:#}", e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
