//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HDF5 library error.
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// Mapping or configuration error.
    #[error("import error: {0}")]
    Import(#[from] evedata_eveh5::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] evedata_core::Error),
}

impl Error {
    /// The underlying core error, if any.
    #[must_use]
    pub fn as_core(&self) -> Option<&evedata_core::Error> {
        match self {
            Self::CoreError(e) => Some(e),
            Self::Import(e) => e.as_core(),
            _ => None,
        }
    }
}
