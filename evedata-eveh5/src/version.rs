//! Schema version detection.

use evedata_core::container::GroupItem;
use evedata_core::error::{Error, Result};
use evedata_core::file::SchemaVersion;

/// Root attribute holding the schema version.
pub const VERSION_ATTRIBUTE: &str = "EVEH5Version";

/// Reads the schema version from the root attributes.
///
/// # Errors
/// Returns [`Error::UnsupportedVersion`] if the attribute is missing or its
/// major part is not a number.
pub fn read_version(root: &GroupItem) -> Result<SchemaVersion> {
    let raw = root
        .attributes()
        .text(VERSION_ATTRIBUTE)
        .ok_or_else(|| Error::UnsupportedVersion("<missing>".to_string()))?;
    SchemaVersion::parse(&raw)
}
