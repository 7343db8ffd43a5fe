//! Area detector cameras.
//!
//! Cameras store their images in external files; the container only holds
//! the file references, the camera options and the regions of interest and
//! statistics computed by the detector plugins. All of a camera's datasets
//! share the prefix `{cam}:`.

use crate::devices::{column_importer, describe, first_value, value_field};
use crate::inventory::Inventory;
use crate::mapper::{Collected, MapContext};
use evedata_algorithms::sorting::DuplicatePolicy;
use evedata_core::container::LeafItem;
use evedata_core::data::{CameraRoi, CameraStatistics, DataKind, ExternalFiles, MeasureData, Payload};
use evedata_core::error::{Error, Result};
use evedata_core::metadata::{MetadataKind, SampleCameraSettings, ScientificCameraSettings};
use evedata_core::section::Section;
use evedata_core::value::Value;
use std::collections::BTreeMap;

const SCIENTIFIC_SUFFIX: &str = ":TIFF1:chan1";
const SAMPLE_SUFFIX: &str = ":uvc1:chan1";

/// Main section options of a scientific camera.
const SCIENTIFIC_OPTIONS: [(&str, &str); 5] = [
    ("cam1:AcquireTime_RBV", "acquire_time"),
    ("cam1:Gain_RBV", "gain"),
    ("cam1:Temperature_RBV", "temperature"),
    ("cam1:Time", "time"),
    ("cam1:greatEyesCooler", "cooler"),
];

/// Snapshot values kept as metadata options.
const SCIENTIFIC_SNAPSHOT_OPTIONS: [(&str, &str); 3] = [
    ("TIFF1:FileName", "file_name"),
    ("cam1:Temperature", "temperature_setpoint"),
    ("cam1:TemperatureActual", "temperature_actual"),
];

const ROI_EXTENTS: [(&str, &str); 4] = [
    ("MinX_RBV", "min_x"),
    ("MinY_RBV", "min_y"),
    ("SizeX_RBV", "size_x"),
    ("SizeY_RBV", "size_y"),
];

fn cameras(inventory: &Inventory<'_>, suffix: &str) -> Vec<String> {
    inventory
        .main()
        .iter()
        .filter_map(|leaf| leaf.name().strip_suffix(suffix))
        .map(str::to_string)
        .collect()
}

fn option_name<'a>(leaf: &'a LeafItem, camera: &str) -> &'a str {
    leaf.name()
        .strip_prefix(camera)
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or_default()
}

fn first(leaf: &LeafItem) -> Result<Option<Value>> {
    let field = value_field(leaf)?;
    first_value(leaf, &field, None)
}

fn first_number(leaf: &LeafItem) -> Result<Option<f64>> {
    Ok(first(leaf)?.and_then(|v| v.as_f64()))
}

fn option_payload(leaf: &LeafItem, ctx: &MapContext<'_>) -> Result<Payload> {
    let field = value_field(leaf)?;
    let importer = ctx.repair(column_importer(leaf, &field), DuplicatePolicy::KeepFirst);
    Ok(Payload::deferred(importer))
}

/// `ROI{n}:{extent}` or `Stats{n}:{field}`.
fn numbered<'a>(option: &'a str, plugin: &str) -> Option<(u32, &'a str)> {
    let (head, field) = option.split_once(':')?;
    let number = head.strip_prefix(plugin)?.parse().ok()?;
    Some((number, field))
}

#[allow(clippy::cast_possible_truncation)]
fn as_count(value: Option<f64>, default: i64) -> i64 {
    value.map_or(default, |v| v.round() as i64)
}

/// Maps every `{cam}:TIFF1:chan1` camera, claiming its datasets.
pub fn map_scientific_cameras(inventory: &mut Inventory<'_>, ctx: &MapContext<'_>, out: &mut Collected) {
    for camera in cameras(inventory, SCIENTIFIC_SUFFIX) {
        let prefix = format!("{camera}:");
        let main = inventory.take_main_prefixed(&prefix);
        let snapshot = inventory.take_snapshot_prefixed(&prefix);
        out.absorb(&camera, map_scientific(&camera, &main, &snapshot, ctx));
    }
}

/// Maps every `{cam}:uvc1:chan1` camera, claiming its datasets.
pub fn map_sample_cameras(inventory: &mut Inventory<'_>, ctx: &MapContext<'_>, out: &mut Collected) {
    for camera in cameras(inventory, SAMPLE_SUFFIX) {
        let prefix = format!("{camera}:");
        let main = inventory.take_main_prefixed(&prefix);
        let snapshot = inventory.take_snapshot_prefixed(&prefix);
        out.absorb(&camera, map_sample(&camera, &main, &snapshot, ctx));
    }
}

fn reference<'a>(camera: &str, suffix: &str, main: &[&'a LeafItem]) -> Result<&'a LeafItem> {
    let name = format!("{camera}{suffix}");
    main.iter()
        .copied()
        .find(|leaf| leaf.name() == name)
        .ok_or(Error::MissingItem(name))
}

fn map_scientific(
    camera: &str,
    main: &[&LeafItem],
    snapshot: &[&LeafItem],
    ctx: &MapContext<'_>,
) -> Result<MeasureData> {
    let files = reference(camera, SCIENTIFIC_SUFFIX, main)?;
    let mut settings = ScientificCameraSettings {
        file_type: "tiff".to_string(),
        ..ScientificCameraSettings::default()
    };
    let mut options: Vec<(String, Payload)> = Vec::new();
    let mut rois: BTreeMap<u32, [i64; 4]> = BTreeMap::new();
    let mut statistics: BTreeMap<u32, Vec<(String, Payload)>> = BTreeMap::new();

    for &leaf in main {
        if std::ptr::eq(leaf, files) {
            continue;
        }
        let option = option_name(leaf, camera);
        if let Some((_, name)) = SCIENTIFIC_OPTIONS.iter().find(|(o, _)| *o == option) {
            if *name == "gain" {
                settings.gain = first_number(leaf)?.unwrap_or_default();
            }
            options.push(((*name).to_string(), option_payload(leaf, ctx)?));
        } else if let Some((n, extent)) = numbered(option, "ROI") {
            let Some(i) = ROI_EXTENTS.iter().position(|(e, _)| *e == extent) else {
                log::warn!("Option {option} unmapped");
                continue;
            };
            rois.entry(n).or_insert([-1; 4])[i] = as_count(first_number(leaf)?, -1);
            options.push((format!("roi{n}_{}", ROI_EXTENTS[i].1), option_payload(leaf, ctx)?));
        } else if let Some((n, field)) = numbered(option, "Stats") {
            let field = field.strip_suffix("_RBV").unwrap_or(field);
            statistics
                .entry(n)
                .or_default()
                .push((field.to_string(), option_payload(leaf, ctx)?));
        } else {
            log::warn!("Option {option} unmapped");
        }
    }

    let mut metadata_options = Vec::new();
    for &leaf in snapshot {
        let option = option_name(leaf, camera);
        match option {
            "cam1:ReverseX_RBV" => settings.reverse_x = first_number(leaf)?.is_some_and(|v| v != 0.0),
            "cam1:ReverseY_RBV" => settings.reverse_y = first_number(leaf)?.is_some_and(|v| v != 0.0),
            _ => match SCIENTIFIC_SNAPSHOT_OPTIONS.iter().find(|(o, _)| *o == option) {
                Some((_, name)) => {
                    if let Some(value) = first(leaf)? {
                        metadata_options.push((*name, value));
                    }
                }
                None => log::warn!("Option {option} unmapped"),
            },
        }
    }

    let mut metadata = describe(camera, files.attributes(), MetadataKind::ScientificCamera(settings));
    for (name, value) in metadata_options {
        metadata = metadata.with_option(name, value);
    }
    let kind = DataKind::ScientificCamera {
        rois: rois
            .into_iter()
            .map(|(n, marker)| CameraRoi {
                label: format!("ROI{n}"),
                marker,
            })
            .collect(),
        statistics: statistics
            .into_iter()
            .map(|(id, fields)| CameraStatistics { id, fields })
            .collect(),
        external: ExternalFiles::default(),
    };
    let mut data = MeasureData::new(
        camera,
        Section::Standard,
        kind,
        metadata.build(),
        option_payload(files, ctx)?,
    );
    for (name, payload) in options {
        data = data.with_option(name, payload);
    }
    log::debug!("Mapped scientific camera {camera}");
    Ok(data)
}

fn map_sample(
    camera: &str,
    main: &[&LeafItem],
    snapshot: &[&LeafItem],
    ctx: &MapContext<'_>,
) -> Result<MeasureData> {
    let files = reference(camera, SAMPLE_SUFFIX, main)?;
    let mut settings = SampleCameraSettings {
        file_type: "uvc".to_string(),
        ..SampleCameraSettings::default()
    };
    let mut apply = |option: &str, leaf: &LeafItem| -> Result<bool> {
        let value = first_number(leaf)?;
        match option {
            "uvc1:BeamX" => settings.beam_x = value.unwrap_or_default(),
            "uvc1:BeamY" => settings.beam_y = value.unwrap_or_default(),
            "uvc1:BeamXfrac" => settings.fractional_x_position = value.unwrap_or_default(),
            "uvc1:BeamYfrac" => settings.fractional_y_position = value.unwrap_or_default(),
            "uvc1:SkipFrames" => settings.skip_frames = as_count(value, 0),
            "uvc1:AvgFrames" => settings.average_frames = as_count(value, 0),
            _ => return Ok(false),
        }
        Ok(true)
    };

    // Snapshot first: values recorded during the scan take precedence.
    for &leaf in snapshot {
        let option = option_name(leaf, camera);
        if !apply(option, leaf)? {
            log::info!("Option {option} unmapped for camera {camera}");
        }
    }
    for &leaf in main {
        if std::ptr::eq(leaf, files) {
            continue;
        }
        let option = option_name(leaf, camera);
        if !apply(option, leaf)? {
            log::info!("Option {option} unmapped for camera {camera}");
        }
    }

    let metadata = describe(camera, files.attributes(), MetadataKind::SampleCamera(settings)).build();
    log::debug!("Mapped sample camera {camera}");
    Ok(MeasureData::new(
        camera,
        Section::Standard,
        DataKind::SampleCamera {
            external: ExternalFiles::default(),
        },
        metadata,
        option_payload(files, ctx)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportConfig;
    use crate::inventory::AuxGroups;
    use crate::mapper::MapperProfile;
    use approx::assert_relative_eq;
    use evedata_core::container::{Attributes, Column, LeafData, Resource};
    use evedata_core::memory::MemoryContainer;

    fn channel(c: &mut MemoryContainer, section: &str, name: &str, value: Column) {
        let access = format!("ca:{name}");
        let attributes: Attributes = [("DeviceType", "Channel"), ("Access", access.as_str())]
            .into_iter()
            .collect();
        let rows = value.len();
        let positions = [2, 5].into_iter().take(rows).collect();
        c.add_leaf(
            &format!("/c1/{section}/{name}"),
            attributes,
            LeafData::new()
                .with_column("PosCounter", Column::Int(positions))
                .with_column(name, value),
        )
        .unwrap();
    }

    fn run(c: MemoryContainer) -> (Collected, Vec<String>, Vec<String>) {
        let root = Resource::new(c).root().unwrap();
        let main = root.find_group("c1/main");
        let mut inventory = Inventory::new(main, root.find_group("c1/snapshot"), None);
        let config = ImportConfig::default();
        let profile = MapperProfile::for_version(7);
        let ctx = MapContext::new(&config, &profile, None, AuxGroups::of(main));
        let mut out = Collected::default();
        map_scientific_cameras(&mut inventory, &ctx, &mut out);
        map_sample_cameras(&mut inventory, &ctx, &mut out);
        let rest_main = inventory.main().iter().map(|l| l.name().to_string()).collect();
        let rest_snapshot = inventory.snapshot().iter().map(|l| l.name().to_string()).collect();
        (out, rest_main, rest_snapshot)
    }

    #[test]
    fn test_scientific_camera() {
        let cam = "GREYQMP02";
        let mut c = MemoryContainer::new("camera.h5");
        channel(&mut c, "main", &format!("{cam}:TIFF1:chan1"), Column::Text(vec!["a.tif".into(), "b.tif".into()]));
        for (option, value) in [
            ("cam1:AcquireTime_RBV", 0.5),
            ("cam1:Gain_RBV", 2.0),
            ("cam1:Temperature_RBV", -20.0),
            ("cam1:Time", 1.0),
            ("cam1:greatEyesCooler", 1.0),
            ("cam1:UNKNOWN", 1.0),
        ] {
            channel(&mut c, "main", &format!("{cam}:{option}"), Column::Float(vec![value, value]));
        }
        for roi in 1..=4 {
            for (i, extent) in ["MinX_RBV", "MinY_RBV", "SizeX_RBV", "SizeY_RBV"].iter().enumerate() {
                let value = 100 * i64::try_from(i).unwrap();
                channel(&mut c, "main", &format!("{cam}:ROI{roi}:{extent}"), Column::Int(vec![value, value]));
            }
        }
        for stats in 1..=5 {
            for field in ["Total_RBV", "MaxValue_RBV", "chan1"] {
                channel(&mut c, "main", &format!("{cam}:Stats{stats}:{field}"), Column::Float(vec![1.0, 2.0]));
            }
        }
        channel(&mut c, "snapshot", &format!("{cam}:TIFF1:FileName"), Column::Text(vec!["scan".into()]));
        channel(&mut c, "snapshot", &format!("{cam}:cam1:ReverseX_RBV"), Column::Int(vec![1]));
        channel(&mut c, "snapshot", &format!("{cam}:cam1:ReverseY_RBV"), Column::Int(vec![0]));
        channel(&mut c, "snapshot", &format!("{cam}:cam1:Temperature"), Column::Float(vec![-25.0]));
        channel(&mut c, "main", "SimChan:01", Column::Float(vec![1.0, 2.0]));

        let (out, rest_main, rest_snapshot) = run(c);
        assert!(out.failed.is_empty());
        assert_eq!(rest_main, vec!["SimChan:01"]);
        assert!(rest_snapshot.is_empty());

        let camera = &out.standard[0];
        assert_eq!(camera.id(), cam);
        assert_eq!(camera.metadata().device().unwrap().pv, format!("{cam}:TIFF1:chan1"));
        let DataKind::ScientificCamera { rois, statistics, external } = camera.kind() else {
            panic!("not a scientific camera");
        };
        assert_eq!(rois.len(), 4);
        assert!(rois.iter().all(|roi| roi.marker == [0, 100, 200, 300]));
        assert_eq!(statistics.len(), 5);
        let names: Vec<&str> = statistics[0].fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Total", "MaxValue", "chan1"]);
        assert_eq!(external.file_number_offset, 0);

        let MetadataKind::ScientificCamera(settings) = camera.metadata().kind() else {
            panic!("not a scientific camera");
        };
        assert_eq!(settings.file_type, "tiff");
        assert_relative_eq!(settings.gain, 2.0);
        assert!(settings.reverse_x);
        assert!(!settings.reverse_y);
        assert_eq!(camera.metadata().options().get("file_name"), Some(&Value::from("scan")));
        assert!(camera.option("acquire_time").unwrap().is_some());
        assert!(camera.option("roi2_size_x").unwrap().is_some());
        assert_eq!(camera.index().unwrap(), &[2, 5]);
    }

    #[test]
    fn test_sample_camera_prefers_main_values() {
        let cam = "fcm";
        let mut c = MemoryContainer::new("sample.h5");
        channel(&mut c, "main", &format!("{cam}:uvc1:chan1"), Column::Text(vec!["a.jpg".into(), "b.jpg".into()]));
        for option in ["uvc1:BeamX", "uvc1:BeamY", "uvc1:FileNumberRBV"] {
            channel(&mut c, "main", &format!("{cam}:{option}"), Column::Int(vec![42, 42]));
        }
        for option in [
            "uvc1:BeamX",
            "uvc1:BeamY",
            "uvc1:BeamXfrac",
            "uvc1:BeamYfrac",
            "uvc1:SkipFrames",
            "uvc1:AvgFrames",
        ] {
            channel(&mut c, "snapshot", &format!("{cam}:{option}"), Column::Int(vec![21, 21]));
        }

        let (out, rest_main, rest_snapshot) = run(c);
        assert!(rest_main.is_empty() && rest_snapshot.is_empty());
        let camera = &out.standard[0];
        assert!(matches!(camera.kind(), DataKind::SampleCamera { .. }));
        let MetadataKind::SampleCamera(settings) = camera.metadata().kind() else {
            panic!("not a sample camera");
        };
        assert_eq!(settings.file_type, "uvc");
        assert_relative_eq!(settings.beam_x, 42.0);
        assert_relative_eq!(settings.beam_y, 42.0);
        assert_relative_eq!(settings.fractional_x_position, 21.0);
        assert_eq!(settings.skip_frames, 21);
        assert_eq!(settings.average_frames, 21);
    }

    #[test]
    fn test_numbered_plugin_options() {
        assert_eq!(numbered("ROI3:MinX_RBV", "ROI"), Some((3, "MinX_RBV")));
        assert_eq!(numbered("Stats12:Total_RBV", "Stats"), Some((12, "Total_RBV")));
        assert_eq!(numbered("cam1:Gain_RBV", "ROI"), None);
    }
}
