//! Immutable device descriptors.
//!
//! Every [`crate::MeasureData`] owns exactly one [`Metadata`], created together
//! with it and shared through an `Arc`. The device fields (id, process
//! variable, access mode) are an optional capability: timestamp data has
//! none of them.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Device capability: identifier and transport of a physical device.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceInfo {
    /// Unique device identifier (XML id).
    pub id: String,
    /// EPICS process variable.
    pub pv: String,
    /// Transport, e.g. `ca` for channel access.
    pub access_mode: String,
}

impl DeviceInfo {
    /// Builds the capability from an `Access` attribute such as `ca:SimMt:01`.
    ///
    /// Only the first colon separates transport and process variable.
    #[must_use]
    pub fn from_access(id: &str, access: &str) -> Self {
        let (access_mode, pv) = access.split_once(':').unwrap_or(("", access));
        Self {
            id: id.to_string(),
            pv: pv.to_string(),
            access_mode: access_mode.to_string(),
        }
    }
}

/// Settings of an averaging detector channel.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AverageSettings {
    pub n_averages: i64,
    pub low_limit: f64,
    pub max_attempts: i64,
    pub max_deviation: f64,
}

/// Energy calibration of a multi-channel analyser.
///
/// `energy = offset + channel * slope + channel^2 * quadratic`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct McaCalibration {
    pub offset: f64,
    pub slope: f64,
    pub quadratic: f64,
}

impl Default for McaCalibration {
    fn default() -> Self {
        Self {
            offset: 0.0,
            slope: 1.0,
            quadratic: 0.0,
        }
    }
}

impl McaCalibration {
    /// Calibrated value of one channel.
    #[inline]
    #[must_use]
    pub fn calibrate(&self, channel: f64) -> f64 {
        self.offset + channel * self.slope + channel * channel * self.quadratic
    }

    /// Calibrated axis for a spectrum of `channels` channels.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn axis(&self, channels: usize) -> Vec<f64> {
        (0..channels).map(|c| self.calibrate(c as f64)).collect()
    }
}

/// Settings of a scientific (area detector) camera.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScientificCameraSettings {
    pub file_type: String,
    pub gain: f64,
    pub reverse_x: bool,
    pub reverse_y: bool,
}

/// Settings of a sample (consumer) camera.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SampleCameraSettings {
    pub file_type: String,
    pub beam_x: f64,
    pub beam_y: f64,
    pub fractional_x_position: f64,
    pub fractional_y_position: f64,
    pub skip_frames: i64,
    pub average_frames: i64,
}

/// Type-specific descriptor fields, one variant per data kind.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MetadataKind {
    Timestamp,
    Axis { deadband: Option<f64> },
    StandardChannel { normalize_id: Option<String> },
    AverageChannel {
        settings: AverageSettings,
        normalize_id: Option<String>,
    },
    IntervalChannel {
        trigger_interval: f64,
        normalize_id: Option<String>,
    },
    NonnumericChannel,
    McaChannel { calibration: McaCalibration },
    ScopeChannel,
    ScientificCamera(ScientificCameraSettings),
    SampleCamera(SampleCameraSettings),
    Monitor,
    Device,
    Skip {
        settings: AverageSettings,
        channel: String,
    },
}

impl MetadataKind {
    /// Short human readable type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::Axis { .. } => "axis",
            Self::StandardChannel { .. } => "channel",
            Self::AverageChannel { .. } => "average channel",
            Self::IntervalChannel { .. } => "interval channel",
            Self::NonnumericChannel => "non-numeric channel",
            Self::McaChannel { .. } => "MCA channel",
            Self::ScopeChannel => "scope channel",
            Self::ScientificCamera(_) => "scientific camera",
            Self::SampleCamera(_) => "sample camera",
            Self::Monitor => "monitor",
            Self::Device => "device",
            Self::Skip { .. } => "skip",
        }
    }

    /// Normalization id of normalized channels.
    #[must_use]
    pub fn normalize_id(&self) -> Option<&str> {
        match self {
            Self::StandardChannel { normalize_id }
            | Self::AverageChannel { normalize_id, .. }
            | Self::IntervalChannel { normalize_id, .. } => normalize_id.as_deref(),
            _ => None,
        }
    }
}

/// Immutable device descriptor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Metadata {
    name: String,
    unit: String,
    device: Option<DeviceInfo>,
    options: BTreeMap<String, Value>,
    kind: MetadataKind,
}

impl Metadata {
    /// Starts a descriptor of the given kind.
    pub fn builder(name: impl Into<String>, kind: MetadataKind) -> MetadataBuilder {
        MetadataBuilder {
            inner: Self {
                name: name.into(),
                unit: String::new(),
                device: None,
                options: BTreeMap::new(),
                kind,
            },
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Device capability, absent for timestamp data.
    #[must_use]
    pub fn device(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    /// Options that never change within one scan module.
    #[must_use]
    pub fn options(&self) -> &BTreeMap<String, Value> {
        &self.options
    }

    #[must_use]
    pub fn kind(&self) -> &MetadataKind {
        &self.kind
    }
}

/// Builder for [`Metadata`]; the result is immutable.
#[derive(Debug, Clone)]
pub struct MetadataBuilder {
    inner: Metadata,
}

impl MetadataBuilder {
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.inner.unit = unit.into();
        self
    }

    #[must_use]
    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.inner.device = Some(device);
        self
    }

    #[must_use]
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inner.options.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: MetadataKind) -> Self {
        self.inner.kind = kind;
        self
    }

    #[must_use]
    pub fn build(self) -> Metadata {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_device_info_splits_at_first_colon() {
        let info = DeviceInfo::from_access("SimMt:01", "ca:SimMt:testrack01000");
        assert_eq!(info.access_mode, "ca");
        assert_eq!(info.pv, "SimMt:testrack01000");
        assert_eq!(info.id, "SimMt:01");
    }

    #[test]
    fn test_device_info_without_transport() {
        let info = DeviceInfo::from_access("x", "plainpv");
        assert_eq!(info.access_mode, "");
        assert_eq!(info.pv, "plainpv");
    }

    #[test]
    fn test_mca_calibration() {
        let calibration = McaCalibration {
            offset: 1.0,
            slope: 2.0,
            quadratic: 0.5,
        };
        assert_relative_eq!(calibration.calibrate(2.0), 1.0 + 4.0 + 2.0);
        assert_eq!(calibration.axis(3).len(), 3);
        assert_relative_eq!(McaCalibration::default().calibrate(7.0), 7.0);
    }

    #[test]
    fn test_timestamp_metadata_has_no_device() {
        let metadata = Metadata::builder("PosCountTimer", MetadataKind::Timestamp)
            .with_unit("msecs")
            .build();
        assert!(metadata.device().is_none());
        assert_eq!(metadata.unit(), "msecs");
        assert_eq!(metadata.kind().type_name(), "timestamp");
    }

    #[test]
    fn test_normalize_id() {
        let kind = MetadataKind::IntervalChannel {
            trigger_interval: 0.1,
            normalize_id: Some("K0617:gw24126chan1".to_string()),
        };
        assert_eq!(kind.normalize_id(), Some("K0617:gw24126chan1"));
        assert_eq!(MetadataKind::Monitor.normalize_id(), None);
    }
}
