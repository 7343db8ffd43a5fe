//! Import configuration.

use crate::error::{Error, Result};
use evedata_algorithms::Direction;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Options controlling how a file is mapped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Sort non-monotonic position counts and resolve duplicates.
    ///
    /// Off imports legacy datasets as recorded; their indices may then be
    /// unsorted and repeat.
    pub sort_positions: bool,
    /// Split channels redefined between scan modules into separate devices.
    pub split_redefined_channels: bool,
    /// Map monitors onto position counts, collected in `File::device_data`.
    pub map_monitors: bool,
    /// Search direction for monitors whose role in the scan is unknown.
    #[serde(with = "direction")]
    pub default_direction: Direction,
    /// Use the rayon pool for per-device work.
    pub parallel: bool,
    /// Abort on the first device error instead of skipping the device.
    pub strict: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            sort_positions: true,
            split_redefined_channels: true,
            map_monitors: false,
            default_direction: Direction::Previous,
            parallel: true,
            strict: false,
        }
    }
}

mod direction {
    use evedata_algorithms::Direction;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(direction: &Direction, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&direction.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Direction, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// Intermediate structs for the JSON file layout
#[derive(Deserialize)]
struct JsonConfig {
    #[serde(default)]
    import: JsonImport,
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonImport {
    repairs: JsonRepairs,
    monitors: JsonMonitors,
    parallel: bool,
    strict: bool,
}

impl Default for JsonImport {
    fn default() -> Self {
        Self {
            repairs: JsonRepairs::default(),
            monitors: JsonMonitors::default(),
            parallel: true,
            strict: false,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonRepairs {
    sort_positions: bool,
    split_redefined_channels: bool,
}

impl Default for JsonRepairs {
    fn default() -> Self {
        Self {
            sort_positions: true,
            split_redefined_channels: true,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonMonitors {
    map: bool,
    default_direction: String,
}

impl Default for JsonMonitors {
    fn default() -> Self {
        Self {
            map: false,
            default_direction: "previous".to_string(),
        }
    }
}

impl ImportConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or holds invalid values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let json_config: JsonConfig = serde_json::from_reader(reader)?;
        Self::from_json_config(json_config)
    }

    /// Load configuration from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or holds invalid values.
    pub fn from_json(json: &str) -> Result<Self> {
        let json_config: JsonConfig = serde_json::from_str(json)?;
        Self::from_json_config(json_config)
    }

    fn from_json_config(config: JsonConfig) -> Result<Self> {
        let import = config.import;
        let default_direction = import
            .monitors
            .default_direction
            .parse()
            .map_err(Error::Config)?;
        let config = Self {
            sort_positions: import.repairs.sort_positions,
            split_redefined_channels: import.repairs.split_redefined_channels,
            map_monitors: import.monitors.map,
            default_direction,
            parallel: import.parallel,
            strict: import.strict,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks option combinations.
    ///
    /// Splitting groups positions by flavour and relies on sorted positions.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for contradictory options.
    pub fn validate(&self) -> Result<()> {
        if self.split_redefined_channels && !self.sort_positions {
            return Err(Error::Config(
                "split_redefined_channels requires sort_positions".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_map_monitors(mut self, map_monitors: bool) -> Self {
        self.map_monitors = map_monitors;
        self
    }

    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn with_default_direction(mut self, direction: Direction) -> Self {
        self.default_direction = direction;
        self
    }
}
