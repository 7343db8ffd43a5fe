//! eveH5 file reader.
//!

use crate::Result;
use evedata_core::container::Resource;
use evedata_core::file::File;
use evedata_core::scan::ScanDescription;
use evedata_eveh5::{ImportConfig, VersionMapperFactory};
use rayon::prelude::*;
use std::path::Path;

/// Reads eveH5 containers into [`File`]s.
///
/// The mapper is chosen per container from the declared schema version.
#[derive(Debug, Clone, Default)]
pub struct EveFileReader {
    factory: VersionMapperFactory,
    config: ImportConfig,
}

impl EveFileReader {
    /// Creates a reader with the built-in mappers.
    #[must_use]
    pub fn new(config: ImportConfig) -> Self {
        Self {
            factory: VersionMapperFactory::new(),
            config,
        }
    }

    /// Creates a reader configured from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be read or is invalid.
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(ImportConfig::from_file(path)?))
    }

    /// Replaces the mapper registry.
    #[must_use]
    pub fn with_factory(mut self, factory: VersionMapperFactory) -> Self {
        self.factory = factory;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Maps an already opened container.
    ///
    /// # Errors
    /// Returns an error if no mapper supports the container's version or the
    /// mapping fails.
    pub fn read_resource(&self, resource: &Resource, scan: Option<ScanDescription>) -> Result<File> {
        let mapper = self.factory.get_mapper(resource)?;
        Ok(mapper.map_with_scan(resource, &self.config, scan)?)
    }

    /// Opens and maps an eveH5 file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or mapped.
    #[cfg(feature = "hdf5")]
    pub fn read<P: AsRef<Path>>(&self, path: P, scan: Option<ScanDescription>) -> Result<File> {
        let container = crate::hdf5::Hdf5Container::open(path)?;
        self.read_resource(&Resource::new(container), scan)
    }

    /// Maps several containers; each one succeeds or fails on its own.
    ///
    /// Results keep the order of `resources`.
    pub fn read_all(&self, resources: &[Resource]) -> Vec<Result<File>> {
        if self.config.parallel {
            resources
                .par_iter()
                .map(|resource| self.read_resource(resource, None))
                .collect()
        } else {
            resources
                .iter()
                .map(|resource| self.read_resource(resource, None))
                .collect()
        }
    }
}

/// Opens and maps an eveH5 file with the built-in mappers.
///
/// # Errors
/// Returns an error if the file cannot be opened or mapped.
#[cfg(feature = "hdf5")]
pub fn load<P: AsRef<Path>>(path: P, config: &ImportConfig) -> Result<File> {
    EveFileReader::new(config.clone()).read(path, None)
}

/// Maps a container with the built-in mappers.
///
/// # Errors
/// Returns an error if no mapper supports the container or the mapping fails.
pub fn load_resource(resource: &Resource, config: &ImportConfig) -> Result<File> {
    EveFileReader::new(config.clone()).read_resource(resource, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use evedata_core::container::{Attributes, Column, LeafData};
    use evedata_core::memory::MemoryContainer;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn container(version: &str) -> MemoryContainer {
        let mut c = MemoryContainer::new(format!("reader-{version}.h5"));
        for (name, value) in [
            ("EVEH5Version", version),
            ("Version", "1.39"),
            ("XMLversion", "9.2"),
            ("Location", "TEST"),
            ("StartDate", "01.02.2024"),
            ("StartTime", "08:30:00"),
        ] {
            c.set_attr("/", name, value).unwrap();
        }
        c
    }

    #[test]
    fn test_unsupported_version_is_fatal() {
        let reader = EveFileReader::default();
        let err = reader
            .read_resource(&Resource::new(container("2")), None)
            .unwrap_err();
        assert!(err.as_core().is_some_and(evedata_core::Error::is_fatal));
    }

    #[test]
    fn test_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"import": {{"monitors": {{"map": true, "default_direction": "next"}}, "strict": true}}}}"#
        )
        .unwrap();
        file.flush().unwrap();
        let reader = EveFileReader::from_config_file(file.path()).unwrap();
        assert!(reader.config().map_monitors);
        assert!(reader.config().strict);
        assert!(reader.config().sort_positions);

        let mut broken = NamedTempFile::new().unwrap();
        write!(broken, "{{\"import\": ").unwrap();
        broken.flush().unwrap();
        assert!(EveFileReader::from_config_file(broken.path()).is_err());
    }

    #[test]
    fn test_read_all_keeps_order() {
        let mut valid = container("7");
        valid
            .add_leaf(
                "/c1/meta/PosCountTimer",
                Attributes::new(),
                LeafData::new()
                    .with_column("PosCounter", Column::Int(vec![1, 2]))
                    .with_column("PosCountTimer", Column::Int(vec![0, 100])),
            )
            .unwrap();
        valid.add_group("/c1/main").unwrap();
        valid.add_group("/c1/snapshot").unwrap();
        let resources = [
            Resource::new(container("9")),
            Resource::new(valid),
            Resource::new(container("1")),
        ];
        for parallel in [false, true] {
            let reader = EveFileReader::new(ImportConfig::default().with_parallel(parallel));
            let results = reader.read_all(&resources);
            assert_eq!(results.len(), 3);
            assert!(results[0].is_err(), "parallel={parallel}");
            assert_eq!(results[1].as_ref().unwrap().metadata.filename, "reader-7.h5");
            assert!(results[2].is_err(), "parallel={parallel}");
        }
    }
}
