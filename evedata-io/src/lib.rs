//! evedata-io: File access for eveH5 measurement files.
//!
//! This crate provides the HDF5 container backend (feature `hdf5`) and the
//! [`EveFileReader`] facade that selects a schema mapper and imports a file.
//!

mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
mod reader;

pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use crate::hdf5::Hdf5Container;
#[cfg(feature = "hdf5")]
pub use reader::load;
pub use reader::{load_resource, EveFileReader};
