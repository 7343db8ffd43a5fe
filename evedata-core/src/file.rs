//! Import root: file level metadata, log messages and section maps.

use crate::data::MeasureData;
use crate::error::{Error, Result};
use crate::scan::ScanDescription;
use crate::section::{Section, SectionMap};
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Schema version of an eveH5 file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SchemaVersion {
    major: u32,
    raw: String,
}

impl SchemaVersion {
    /// Parses `"7"` or `"5.0"`; only the major number selects a mapper.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedVersion`] if the major part is not a number.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let major = trimmed
            .split('.')
            .next()
            .and_then(|m| m.parse::<u32>().ok())
            .ok_or_else(|| Error::UnsupportedVersion(trimmed.to_string()))?;
        Ok(Self {
            major,
            raw: trimmed.to_string(),
        })
    }

    #[must_use]
    pub fn major(&self) -> u32 {
        self.major
    }

    /// Version string as stored in the file.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// 1970-01-01 00:00:00, used where a file records no time.
#[must_use]
pub fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// File level metadata.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FileMetadata {
    pub filename: String,
    pub eveh5_version: String,
    pub eve_version: String,
    pub xml_version: String,
    pub measurement_station: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub simulation: bool,
    pub preferred_axis: String,
    pub preferred_channel: String,
    pub preferred_normalisation_channel: String,
}

impl Default for FileMetadata {
    fn default() -> Self {
        Self {
            filename: String::new(),
            eveh5_version: String::new(),
            eve_version: String::new(),
            xml_version: String::new(),
            measurement_station: String::new(),
            description: String::new(),
            start: epoch(),
            end: epoch(),
            simulation: false,
            preferred_axis: String::new(),
            preferred_channel: String::new(),
            preferred_normalisation_channel: String::new(),
        }
    }
}

/// Operator comment recorded during the measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LogMessage {
    pub timestamp: NaiveDateTime,
    pub message: String,
}

impl FromStr for LogMessage {
    type Err = Error;

    /// Parses `"2024-06-03T12:01:32: message"`.
    fn from_str(s: &str) -> Result<Self> {
        let (timestamp, message) = s
            .split_once(": ")
            .ok_or_else(|| Error::schema("/LiveComment", format!("malformed entry {s:?}")))?;
        let timestamp = NaiveDateTime::parse_from_str(timestamp.trim(), "%Y-%m-%dT%H:%M:%S")
            .map_err(|e| Error::schema("/LiveComment", format!("bad timestamp: {e}")))?;
        Ok(Self {
            timestamp,
            message: message.to_string(),
        })
    }
}

/// One scan module and the devices it produced.
///
/// `data` holds the module's own copies of its devices, restricted to the
/// positions the module produced.
#[derive(Debug, Clone)]
pub struct ScanModule {
    pub id: u32,
    pub parent: u32,
    pub name: String,
    pub appended: Option<u32>,
    pub nested: Option<u32>,
    pub data: SectionMap<MeasureData>,
    pub positions: Vec<i64>,
}

impl ScanModule {
    /// The module used when no scan description is available.
    #[must_use]
    pub fn main() -> Self {
        Self {
            id: 1,
            parent: 0,
            name: "main".to_string(),
            appended: None,
            nested: None,
            data: SectionMap::new(),
            positions: Vec::new(),
        }
    }

    /// Identifiers of the module's devices, in insertion order.
    pub fn device_ids(&self) -> impl Iterator<Item = &str> {
        self.data.ids()
    }
}

/// A device that could not be imported.
#[derive(Debug)]
pub struct ImportIssue {
    pub device: String,
    pub error: Error,
}

/// Result of importing one eveH5 file.
#[derive(Debug)]
pub struct File {
    pub version: SchemaVersion,
    pub metadata: FileMetadata,
    pub log_messages: Vec<LogMessage>,
    pub standard: SectionMap<MeasureData>,
    pub snapshots: SectionMap<MeasureData>,
    pub monitors: SectionMap<MeasureData>,
    /// Monitors mapped onto position counts. Derived data, kept apart from
    /// the section maps and never consulted by [`File::get`].
    pub device_data: SectionMap<MeasureData>,
    pub position_timestamps: Option<MeasureData>,
    pub scan_modules: Vec<ScanModule>,
    pub scan: Option<ScanDescription>,
    pub import_errors: Vec<ImportIssue>,
}

impl File {
    /// Empty file for the given schema version.
    #[must_use]
    pub fn new(version: SchemaVersion) -> Self {
        Self {
            version,
            metadata: FileMetadata::default(),
            log_messages: Vec::new(),
            standard: SectionMap::new(),
            snapshots: SectionMap::new(),
            monitors: SectionMap::new(),
            device_data: SectionMap::new(),
            position_timestamps: None,
            scan_modules: Vec::new(),
            scan: None,
            import_errors: Vec::new(),
        }
    }

    /// Device map of a section; the timestamp section has none.
    #[must_use]
    pub fn section(&self, section: Section) -> Option<&SectionMap<MeasureData>> {
        match section {
            Section::Standard => Some(&self.standard),
            Section::Snapshot => Some(&self.snapshots),
            Section::Monitor => Some(&self.monitors),
            Section::Timestamp => None,
        }
    }

    /// Looks a device up in standard, then snapshot, then monitor section.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&MeasureData> {
        self.standard
            .get(id)
            .or_else(|| self.snapshots.get(id))
            .or_else(|| self.monitors.get(id))
    }

    /// The position to time table.
    ///
    /// # Errors
    /// Returns [`Error::MissingItem`] if the file had none.
    pub fn timestamps(&self) -> Result<&MeasureData> {
        self.position_timestamps
            .as_ref()
            .ok_or_else(|| Error::MissingItem("position timestamps".to_string()))
    }

    #[must_use]
    pub fn scan_module(&self, id: u32) -> Option<&ScanModule> {
        self.scan_modules.iter().find(|m| m.id == id)
    }

    /// Records a device that was skipped during import.
    pub fn record_issue(&mut self, device: impl Into<String>, error: Error) {
        let device = device.into();
        log::warn!("Skipping device {device}: {error}");
        self.import_errors.push(ImportIssue { device, error });
    }
}
