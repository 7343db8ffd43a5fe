//! evedata-eveh5: Versioned mappers for the eveH5 schema.
//!
//! This crate provides the import layer between a container and the
//! [`evedata_core::File`] model:
//! - Version detection and a table-driven [`VersionMapperFactory`]
//! - The [`EveH5Mapper`] for schema versions 4 to 7, with repairs of
//!   legacy position counts and redefined channels
//! - Special devices: MPSKIP detectors, MCAs and cameras
//! - Scan module assembly and monitor mapping
//!

pub mod camera;
pub mod config;
pub mod devices;
pub mod error;
pub mod factory;
pub mod file_metadata;
pub mod inventory;
pub mod mapper;
pub mod mca;
pub mod modules;
pub mod monitors;
pub mod mpskip;
pub mod version;

pub use config::ImportConfig;
pub use error::{Error, Result};
pub use factory::{MapperConstructor, VersionMapperFactory};
pub use mapper::{EveH5Mapper, MapperProfile, VersionMapper};
pub use version::{read_version, VERSION_ATTRIBUTE};
