//! Measured device series.
//!
//! A [`MeasureData`] is one logical device series after mapping: index,
//! ragged values, per-index device options and exactly one [`Metadata`].
//! Payloads are deferred: an [`Importer`] describes which container leaves to
//! read and which preprocessing steps to run, and the result is cached on
//! first access. A loaded payload is never modified afterwards.

use crate::container::{Column, DeferredRead, LeafData};
use crate::error::{Error, Result};
use crate::metadata::Metadata;
use crate::section::Section;
use crate::value::{Ragged, Series, Value};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// One step applied to imported data before it is cached.
pub trait Preprocessing: Send + Sync + fmt::Debug {
    /// Name used in log output.
    fn name(&self) -> &'static str;

    /// Transforms a series into a new one.
    ///
    /// # Errors
    /// Returns an error if the series cannot be processed.
    fn process(&self, series: Series) -> Result<Series>;
}

/// Where the payload of a series comes from.
#[derive(Debug, Clone)]
pub enum ImportSource {
    /// One leaf; index column plus one or more value columns.
    ///
    /// With several value columns, each row holds one value per column.
    Columns {
        reader: DeferredRead,
        index: String,
        values: Vec<String>,
    },
    /// One leaf per index entry, each leaf holding one row (e.g. a spectrum).
    PerIndex(Vec<(i64, DeferredRead)>),
}

impl ImportSource {
    fn load(&self) -> Result<Series> {
        match self {
            Self::Columns {
                reader,
                index,
                values,
            } => {
                let mut data = reader.load()?;
                let index_column = take(&mut data, index, reader.path())?;
                let index = index_column.to_i64().ok_or_else(|| {
                    Error::integrity(reader.path(), None, format!("non-integer index column {index}"))
                })?;
                let mut columns = Vec::with_capacity(values.len());
                for name in values {
                    columns.push(take(&mut data, name, reader.path())?.into_ragged());
                }
                Series::new(index, merge_columns(columns))
            }
            Self::PerIndex(entries) => {
                let mut index = Vec::with_capacity(entries.len());
                let mut values = Ragged::with_capacity(entries.len(), 0);
                for (position, reader) in entries {
                    let mut row = Vec::new();
                    for (_, column) in reader.load()?.into_columns() {
                        row.extend(column.into_ragged().into_flat());
                    }
                    index.push(*position);
                    values.push_row(row);
                }
                Series::new(index, values)
            }
        }
    }
}

fn take(data: &mut LeafData, name: &str, path: &str) -> Result<Column> {
    data.take_column(name)
        .ok_or_else(|| Error::schema(path, format!("missing column {name}")))
}

fn merge_columns(mut columns: Vec<Ragged<Value>>) -> Ragged<Value> {
    if columns.len() == 1 {
        return columns.remove(0);
    }
    let rows = columns.iter().map(Ragged::len).min().unwrap_or(0);
    let mut merged = Ragged::with_capacity(rows, rows * columns.len());
    for i in 0..rows {
        merged.push_row(
            columns
                .iter()
                .filter_map(|c| c.row(i))
                .flat_map(|row| row.iter().cloned())
                .collect::<Vec<_>>(),
        );
    }
    merged
}

/// Recipe for reading a series: sources, then preprocessing steps.
#[derive(Debug, Clone)]
pub struct Importer {
    sources: Vec<ImportSource>,
    steps: Vec<Arc<dyn Preprocessing>>,
}

impl Importer {
    /// Index column plus one value column of a single leaf.
    pub fn columns(reader: DeferredRead, index: &str, value: &str) -> Self {
        Self::from_source(ImportSource::Columns {
            reader,
            index: index.to_string(),
            values: vec![value.to_string()],
        })
    }

    /// One leaf per index entry.
    #[must_use]
    pub fn per_index(entries: Vec<(i64, DeferredRead)>) -> Self {
        Self::from_source(ImportSource::PerIndex(entries))
    }

    #[must_use]
    pub fn from_source(source: ImportSource) -> Self {
        Self {
            sources: vec![source],
            steps: Vec::new(),
        }
    }

    /// Appends a preprocessing step.
    #[must_use]
    pub fn with_step(mut self, step: Arc<dyn Preprocessing>) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn sources(&self) -> &[ImportSource] {
        &self.sources
    }

    #[must_use]
    pub fn steps(&self) -> &[Arc<dyn Preprocessing>] {
        &self.steps
    }

    /// Reads every source, concatenates them and runs the steps in order.
    ///
    /// # Errors
    /// Propagates read and preprocessing errors.
    pub fn import(&self) -> Result<Series> {
        let mut index = Vec::new();
        let mut values = Ragged::new();
        for source in &self.sources {
            let series = source.load()?;
            let (i, v) = series.into_parts();
            index.extend(i);
            for row in v.rows() {
                values.push_row(row.iter().cloned());
            }
        }
        let mut series = Series::new(index, values)?;
        for step in &self.steps {
            log::trace!("running preprocessing step {}", step.name());
            series = step.process(series)?;
        }
        Ok(series)
    }
}

/// Deferred or loaded payload, resolved at most once.
#[derive(Debug, Clone)]
pub struct Payload {
    importer: Option<Importer>,
    cache: OnceLock<Series>,
}

impl Payload {
    /// Payload read on first access.
    #[must_use]
    pub fn deferred(importer: Importer) -> Self {
        Self {
            importer: Some(importer),
            cache: OnceLock::new(),
        }
    }

    /// Payload that is already in memory.
    #[must_use]
    pub fn loaded(series: Series) -> Self {
        let cache = OnceLock::new();
        let _ = cache.set(series);
        Self {
            importer: None,
            cache,
        }
    }

    #[must_use]
    pub fn importer(&self) -> Option<&Importer> {
        self.importer.as_ref()
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cache.get().is_some()
    }

    /// Returns the series, importing it on first access.
    ///
    /// # Errors
    /// Returns [`Error::NoDataSource`] without importer, or import errors
    /// tagged with `device`.
    pub fn get(&self, device: &str) -> Result<&Series> {
        if let Some(series) = self.cache.get() {
            return Ok(series);
        }
        let importer = self
            .importer
            .as_ref()
            .ok_or_else(|| Error::NoDataSource(device.to_string()))?;
        let series = importer.import().map_err(|e| e.for_device(device))?;
        Ok(self.cache.get_or_init(|| series))
    }

    /// New payload with one more preprocessing step.
    ///
    /// Deferred payloads stay deferred; loaded payloads are processed now.
    ///
    /// # Errors
    /// Propagates errors of an eagerly applied step.
    pub fn with_step(&self, step: Arc<dyn Preprocessing>) -> Result<Self> {
        match (&self.importer, self.cache.get()) {
            (Some(importer), _) => Ok(Self::deferred(importer.clone().with_step(step))),
            (None, Some(series)) => Ok(Self::loaded(step.process(series.clone())?)),
            (None, None) => Err(Error::NoDataSource("payload".to_string())),
        }
    }
}

impl Error {
    /// Attaches a device name to integrity errors raised without one.
    #[must_use]
    pub fn for_device(self, device: &str) -> Self {
        match self {
            Self::DataIntegrity {
                device: old,
                index,
                reason,
            } if old == "<series>" => Self::DataIntegrity {
                device: device.to_string(),
                index,
                reason,
            },
            other => other,
        }
    }
}

/// Region of interest of a multi-channel analyser.
#[derive(Debug, Clone)]
pub struct McaRoi {
    pub label: String,
    /// First and last channel; `-1` when unset.
    pub marker: [i64; 2],
    pub data: Payload,
}

/// Region of interest of a scientific camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraRoi {
    pub label: String,
    /// `[min_x, min_y, size_x, size_y]`.
    pub marker: [i64; 4],
}

/// One statistics plugin of a scientific camera.
#[derive(Debug, Clone)]
pub struct CameraStatistics {
    pub id: u32,
    pub fields: Vec<(String, Payload)>,
}

/// Reference to images stored outside the container.
///
/// Image files are read by external importers; only the reference series
/// and the file numbering correction live here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExternalFiles {
    pub file_number_offset: i64,
}

impl ExternalFiles {
    /// Corrects a recorded file number.
    #[must_use]
    pub fn file_number(&self, recorded: i64) -> i64 {
        recorded + self.file_number_offset
    }
}

/// Concrete kind of a device series.
#[derive(Debug, Clone)]
pub enum DataKind {
    Axis { set_values: Option<Vec<Value>> },
    StandardChannel,
    AverageChannel,
    IntervalChannel,
    NonnumericChannel,
    McaChannel { rois: Vec<McaRoi> },
    ScopeChannel,
    ScientificCamera {
        rois: Vec<CameraRoi>,
        statistics: Vec<CameraStatistics>,
        external: ExternalFiles,
    },
    SampleCamera { external: ExternalFiles },
    Monitor,
    /// Monitor re-indexed to position counts; `source` is the monitor id.
    Device { source: String },
    Timestamp,
    Skip,
}

impl DataKind {
    #[must_use]
    pub fn is_axis(&self) -> bool {
        matches!(self, Self::Axis { .. })
    }

    /// Detector channels of any flavour.
    #[must_use]
    pub fn is_channel(&self) -> bool {
        matches!(
            self,
            Self::StandardChannel
                | Self::AverageChannel
                | Self::IntervalChannel
                | Self::NonnumericChannel
                | Self::McaChannel { .. }
                | Self::ScopeChannel
                | Self::ScientificCamera { .. }
                | Self::SampleCamera { .. }
        )
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Axis { .. } => "AxisData",
            Self::StandardChannel => "StandardChannelData",
            Self::AverageChannel => "AverageChannelData",
            Self::IntervalChannel => "IntervalChannelData",
            Self::NonnumericChannel => "NonnumericChannelData",
            Self::McaChannel { .. } => "MCAChannelData",
            Self::ScopeChannel => "ScopeChannelData",
            Self::ScientificCamera { .. } => "ScientificCameraData",
            Self::SampleCamera { .. } => "SampleCameraData",
            Self::Monitor => "MonitorData",
            Self::Device { .. } => "DeviceData",
            Self::Timestamp => "TimestampData",
            Self::Skip => "SkipData",
        }
    }
}

/// One logical device series.
#[derive(Debug, Clone)]
pub struct MeasureData {
    id: String,
    section: Section,
    kind: DataKind,
    metadata: Arc<Metadata>,
    payload: Payload,
    options: Vec<(String, Payload)>,
    degraded: bool,
}

impl MeasureData {
    /// Creates a series together with its metadata.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        section: Section,
        kind: DataKind,
        metadata: Metadata,
        payload: Payload,
    ) -> Self {
        Self {
            id: id.into(),
            section,
            kind,
            metadata: Arc::new(metadata),
            payload,
            options: Vec::new(),
            degraded: false,
        }
    }

    /// Adds a per-index device option.
    #[must_use]
    pub fn with_option(mut self, name: impl Into<String>, payload: Payload) -> Self {
        let name = name.into();
        self.options.retain(|(n, _)| *n != name);
        self.options.push((name, payload));
        self
    }

    /// Flags degraded fidelity (an ambiguous mapping fallback was taken).
    #[must_use]
    pub fn into_degraded(mut self) -> Self {
        self.degraded = true;
        self
    }

    /// Same device with a different payload; metadata moves along.
    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Identifier within the section.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name, falling back to the identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        let name = self.metadata.name();
        if name.is_empty() {
            &self.id
        } else {
            name
        }
    }

    #[must_use]
    pub fn section(&self) -> Section {
        self.section
    }

    #[must_use]
    pub fn kind(&self) -> &DataKind {
        &self.kind
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Index and values, imported on first access.
    ///
    /// # Errors
    /// Propagates import errors.
    pub fn series(&self) -> Result<&Series> {
        self.payload.get(&self.id)
    }

    /// Position counts (or milliseconds for monitors).
    ///
    /// # Errors
    /// Propagates import errors.
    pub fn index(&self) -> Result<&[i64]> {
        Ok(self.series()?.index())
    }

    /// Option names in insertion order.
    pub fn option_names(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|(n, _)| n.as_str())
    }

    /// Per-index option series, `None` if the device has no such option.
    ///
    /// # Errors
    /// Propagates import errors.
    pub fn option(&self, name: &str) -> Result<Option<&Series>> {
        match self.options.iter().find(|(n, _)| n == name) {
            Some((n, payload)) => payload.get(&format!("{}.{n}", self.id)).map(Some),
            None => Ok(None),
        }
    }

    /// Raw option payload.
    #[must_use]
    pub fn option_payload(&self, name: &str) -> Option<&Payload> {
        self.options.iter().find(|(n, _)| n == name).map(|(_, p)| p)
    }
}
