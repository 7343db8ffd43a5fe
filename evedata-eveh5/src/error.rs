//! eveH5 mapping error types.

use thiserror::Error;

/// Result type for eveH5 mapping operations.
pub type Result<T> = std::result::Result<T, Error>;

/// eveH5 mapping error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid import configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] evedata_core::Error),
}

impl Error {
    /// The wrapped core error, if any.
    #[must_use]
    pub fn as_core(&self) -> Option<&evedata_core::Error> {
        match self {
            Self::CoreError(e) => Some(e),
            _ => None,
        }
    }
}
