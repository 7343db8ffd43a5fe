//! Error types for evedata-core.

use thiserror::Error;

/// Result type alias for evedata operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for evedata operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No mapper is registered for the declared schema version.
    #[error("No mapper for version {0}")]
    UnsupportedVersion(String),

    /// A structural expectation of the matched schema version is unmet.
    #[error("schema violation at {path}: {reason}")]
    SchemaViolation { path: String, reason: String },

    /// Payload-level inconsistency within one device.
    #[error("data integrity error in {device}{}: {reason}", at_index(.index))]
    DataIntegrity {
        device: String,
        index: Option<usize>,
        reason: String,
    },

    /// Redefinition boundaries of a device could not be determined.
    #[error("ambiguous mapping for {device}: {reason}")]
    AmbiguousMapping { device: String, reason: String },

    /// Item not present in the container.
    #[error("missing item: {0}")]
    MissingItem(String),

    /// Container backend failure.
    #[error("container error: {0}")]
    Container(String),

    /// Fill/join operands cannot be aligned.
    #[error("fill error: {0}")]
    Fill(String),

    /// Device data has no payload source.
    #[error("no data source for {0}")]
    NoDataSource(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[allow(clippy::ref_option)]
fn at_index(index: &Option<usize>) -> String {
    index.map(|i| format!(" at index {i}")).unwrap_or_default()
}

impl Error {
    /// Shorthand for a [`Error::SchemaViolation`].
    pub fn schema(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`Error::DataIntegrity`].
    pub fn integrity(device: impl Into<String>, index: Option<usize>, reason: impl Into<String>) -> Self {
        Self::DataIntegrity {
            device: device.into(),
            index,
            reason: reason.into(),
        }
    }

    /// Whether the error aborts a whole import rather than a single device.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedVersion(_) | Self::SchemaViolation { .. } | Self::Io(_)
        )
    }
}
