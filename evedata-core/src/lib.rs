//! evedata-core: Entity model and container abstractions for eveH5 data.
//!
//! This crate provides the container item model with deferred payload reads,
//! the measured data and metadata types, and the import root [`File`].
//!

pub mod container;
pub mod data;
pub mod error;
pub mod file;
pub mod memory;
pub mod metadata;
pub mod scan;
pub mod section;
pub mod value;

pub use container::{
    AttrValue, Attributes, Column, ContainerSource, DeferredRead, FieldType, GroupItem, Item,
    LeafData, LeafItem, Resource,
};
pub use data::{
    CameraRoi, CameraStatistics, DataKind, ExternalFiles, ImportSource, Importer, McaRoi,
    MeasureData, Payload, Preprocessing,
};
pub use error::{Error, Result};
pub use file::{File, FileMetadata, ImportIssue, LogMessage, ScanModule, SchemaVersion};
pub use memory::MemoryContainer;
pub use metadata::{
    AverageSettings, DeviceInfo, McaCalibration, Metadata, MetadataBuilder, MetadataKind,
    SampleCameraSettings, ScientificCameraSettings,
};
pub use scan::{DeviceRole, ScanDescription, ScanModuleDescription};
pub use section::{Section, SectionMap};
pub use value::{Ragged, Series, Value};
