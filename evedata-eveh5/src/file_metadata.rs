//! File level metadata and operator log messages.

use crate::mapper::MapperProfile;
use chrono::NaiveDateTime;
use evedata_core::container::{Column, GroupItem};
use evedata_core::error::{Error, Result};
use evedata_core::file::{epoch, FileMetadata, LogMessage};

const LIVE_COMMENT: &str = "LiveComment";

fn required(group: &GroupItem, name: &str) -> Result<String> {
    group
        .attributes()
        .text(name)
        .ok_or_else(|| Error::schema(group.path(), format!("missing attribute {name}")))
}

fn optional(group: Option<&GroupItem>, name: &str) -> Option<String> {
    group.and_then(|g| g.attributes().text(name))
}

fn legacy_start(root: &GroupItem) -> Result<NaiveDateTime> {
    let date = required(root, "StartDate")?;
    let time = required(root, "StartTime")?;
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%d.%m.%Y %H:%M:%S")
        .map_err(|e| Error::schema(root.path(), format!("bad start date {date} {time}: {e}")))
}

fn iso(path: &str, raw: &str) -> Result<NaiveDateTime> {
    raw.trim()
        .parse()
        .map_err(|e| Error::schema(path, format!("bad ISO timestamp {raw}: {e}")))
}

/// Reads the file level metadata from the root and `c1` attributes.
///
/// # Errors
/// Returns [`Error::SchemaViolation`] if a required attribute is missing or a
/// date cannot be parsed.
pub fn map_file_metadata(
    root: &GroupItem,
    c1: Option<&GroupItem>,
    profile: &MapperProfile,
    filename: &str,
) -> Result<FileMetadata> {
    let mut metadata = FileMetadata {
        filename: filename.to_string(),
        eveh5_version: required(root, "EVEH5Version")?,
        eve_version: required(root, "Version")?,
        xml_version: required(root, "XMLversion")?,
        measurement_station: required(root, "Location")?,
        description: root.attributes().text("Comment").unwrap_or_default(),
        preferred_axis: optional(c1, "preferredAxis").unwrap_or_default(),
        preferred_channel: optional(c1, "preferredChannel").unwrap_or_default(),
        preferred_normalisation_channel: optional(c1, "preferredNormalizationChannel")
            .unwrap_or_default(),
        ..FileMetadata::default()
    };

    metadata.start = if profile.iso_times {
        match optional(c1, "StartTimeISO").or_else(|| optional(Some(root), "StartTimeISO")) {
            Some(raw) => iso("/c1", &raw)?,
            None => legacy_start(root)?,
        }
    } else {
        legacy_start(root)?
    };
    metadata.end = match optional(c1, "EndTimeISO").filter(|_| profile.iso_times) {
        Some(raw) => iso("/c1", &raw)?,
        None => epoch(),
    };
    if profile.simulation_flag {
        metadata.simulation = root
            .attributes()
            .text("Simulation")
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("yes"));
    }
    log::debug!(
        "File {filename}: eveH5 {}, eve {}, station {}",
        metadata.eveh5_version,
        metadata.eve_version,
        metadata.measurement_station
    );
    Ok(metadata)
}

/// Reads `/LiveComment`; malformed entries are logged and skipped.
///
/// # Errors
/// Propagates read errors of the log dataset.
pub fn map_log_messages(root: &GroupItem) -> Result<Vec<LogMessage>> {
    let Some(leaf) = root.leaf(LIVE_COMMENT) else {
        return Ok(Vec::new());
    };
    let data = leaf.load()?;
    let Some(Column::Text(entries)) = data.into_columns().map(|(_, c)| c).find(Column::is_text)
    else {
        return Err(Error::schema(leaf.path(), "no text column"));
    };
    let mut messages = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry.parse::<LogMessage>() {
            Ok(message) => messages.push(message),
            Err(e) => log::warn!("Ignoring log message {entry:?}: {e}"),
        }
    }
    Ok(messages)
}
