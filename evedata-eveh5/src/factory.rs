//! Table-driven selection of the mapper for a schema version.

use crate::mapper::{EveH5Mapper, VersionMapper};
use crate::version::read_version;
use evedata_core::container::Resource;
use evedata_core::error::{Error, Result};
use evedata_core::file::SchemaVersion;
use std::collections::BTreeMap;

/// Constructor of a mapper.
pub type MapperConstructor = fn() -> Box<dyn VersionMapper>;

/// Schema versions with a built-in mapper.
pub const DEFAULT_VERSIONS: [u32; 4] = [4, 5, 6, 7];

fn eveh5_v4() -> Box<dyn VersionMapper> {
    Box::new(EveH5Mapper::for_version(4))
}

fn eveh5_v5() -> Box<dyn VersionMapper> {
    Box::new(EveH5Mapper::for_version(5))
}

fn eveh5_v6() -> Box<dyn VersionMapper> {
    Box::new(EveH5Mapper::for_version(6))
}

fn eveh5_v7() -> Box<dyn VersionMapper> {
    Box::new(EveH5Mapper::for_version(7))
}

/// Registry from major schema version to mapper constructor.
#[derive(Clone, Debug)]
pub struct VersionMapperFactory {
    registry: BTreeMap<u32, MapperConstructor>,
}

impl Default for VersionMapperFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionMapperFactory {
    /// Factory with the built-in mappers for versions 4 to 7.
    #[must_use]
    pub fn new() -> Self {
        let constructors: [MapperConstructor; 4] = [eveh5_v4, eveh5_v5, eveh5_v6, eveh5_v7];
        Self {
            registry: DEFAULT_VERSIONS.into_iter().zip(constructors).collect(),
        }
    }

    /// Factory without any mapper.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            registry: BTreeMap::new(),
        }
    }

    /// Adds or replaces the mapper for `version`.
    pub fn register(&mut self, version: u32, constructor: MapperConstructor) -> &mut Self {
        if self.registry.insert(version, constructor).is_some() {
            log::debug!("Replaced mapper for version {version}");
        }
        self
    }

    /// Registered versions, ascending.
    pub fn versions(&self) -> impl Iterator<Item = u32> + '_ {
        self.registry.keys().copied()
    }

    /// Mapper for a schema version.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedVersion`] if no mapper is registered.
    pub fn mapper_for(&self, version: &SchemaVersion) -> Result<Box<dyn VersionMapper>> {
        let constructor = self.registry.get(&version.major()).ok_or_else(|| {
            log::error!("No mapper for version {version}");
            Error::UnsupportedVersion(version.raw().to_string())
        })?;
        log::info!("Using mapper for eveH5 version {version}");
        Ok(constructor())
    }

    /// Mapper for the schema version declared by a container.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedVersion`] if the version attribute is
    /// missing or no mapper is registered for it.
    pub fn get_mapper(&self, resource: &Resource) -> Result<Box<dyn VersionMapper>> {
        let root = resource.root()?;
        self.mapper_for(&read_version(&root)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::MapperProfile;
    use evedata_core::memory::MemoryContainer;

    fn resource(version: Option<&str>) -> Resource {
        let mut c = MemoryContainer::new("factory.h5");
        if let Some(v) = version {
            c.set_attr("/", "EVEH5Version", v).unwrap();
        }
        Resource::new(c)
    }

    #[test]
    fn test_default_versions() {
        let factory = VersionMapperFactory::new();
        assert_eq!(factory.versions().collect::<Vec<_>>(), vec![4, 5, 6, 7]);
        for (raw, major) in [("4", 4), ("5.0", 5), ("6", 6), ("7", 7)] {
            let mapper = factory.get_mapper(&resource(Some(raw))).unwrap();
            assert_eq!(mapper.profile().version, major);
        }
    }

    #[test]
    fn test_unknown_version() {
        let factory = VersionMapperFactory::new();
        let err = factory.get_mapper(&resource(Some("0"))).unwrap_err();
        assert_eq!(err.to_string(), "No mapper for version 0");
        assert!(factory.get_mapper(&resource(None)).is_err());
    }

    #[test]
    fn test_register_new_version() {
        fn eveh5_v8() -> Box<dyn VersionMapper> {
            Box::new(EveH5Mapper::new(MapperProfile::for_version(8).with_repairs(false)))
        }
        let mut factory = VersionMapperFactory::empty();
        assert!(factory.get_mapper(&resource(Some("8"))).is_err());
        factory.register(8, eveh5_v8);
        let mapper = factory.get_mapper(&resource(Some("8"))).unwrap();
        assert!(!mapper.profile().repairs);
    }
}
