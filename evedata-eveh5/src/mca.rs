//! Multi-channel analysers.
//!
//! An MCA is stored as a group below `/c1/main` with one single-row dataset
//! per position, named by the position count. Its options, regions of
//! interest and energy calibration live in datasets prefixed `{id}.` in the
//! main and snapshot sections.

use crate::devices::{column_importer, describe, first_value, value_field};
use crate::inventory::Inventory;
use crate::mapper::{Collected, MapContext};
use evedata_algorithms::sorting::DuplicatePolicy;
use evedata_core::container::{GroupItem, LeafItem};
use evedata_core::data::{DataKind, Importer, McaRoi, MeasureData, Payload};
use evedata_core::error::Result;
use evedata_core::metadata::{McaCalibration, MetadataKind};
use evedata_core::section::Section;
use evedata_core::value::Value;

const ACCESS_SUFFIX: &str = ".VAL";

/// Per-index options of the main section.
const OPTIONS: [(&str, &str); 4] = [
    ("ELTM", "life_time"),
    ("ERTM", "real_time"),
    ("PLTM", "preset_life_time"),
    ("PRTM", "preset_real_time"),
];

fn is_mca(group: &GroupItem) -> bool {
    let attributes = group.attributes();
    attributes.text("DeviceType").as_deref() == Some("Channel")
        && attributes
            .text("Access")
            .is_some_and(|access| access.ends_with(ACCESS_SUFFIX))
}

/// Number of a region of interest option such as `R0` or `R12`.
fn roi_number(option: &str) -> Option<u32> {
    option.strip_prefix('R')?.parse().ok()
}

/// `R{n}LO`, `R{n}HI`, `R{n}NM`.
fn roi_setting(option: &str) -> Option<(u32, &str)> {
    let rest = option.strip_prefix('R')?;
    let split = rest.len().checked_sub(2)?;
    let setting = rest.get(split..)?;
    Some((rest.get(..split)?.parse().ok()?, setting))
}

fn first(leaf: &LeafItem) -> Result<Option<Value>> {
    let field = value_field(leaf)?;
    first_value(leaf, &field, None)
}

#[derive(Debug, Default)]
struct RoiParts<'a> {
    data: Option<&'a LeafItem>,
    low: Option<&'a LeafItem>,
    high: Option<&'a LeafItem>,
    label: Option<&'a LeafItem>,
}

/// Maps every MCA of the main section, claiming its datasets.
pub fn map_mca(inventory: &mut Inventory<'_>, ctx: &MapContext<'_>, out: &mut Collected) {
    let groups: Vec<&GroupItem> = inventory
        .main_groups()
        .iter()
        .copied()
        .filter(|g| is_mca(g))
        .collect();
    for group in groups {
        let id = group.name();
        inventory.take_main_group(id);
        let prefix = format!("{id}.");
        let main = inventory.take_main_prefixed(&prefix);
        let snapshot = inventory.take_snapshot_prefixed(&prefix);
        out.absorb(id, map_one(group, &main, &snapshot, ctx));
    }
}

fn map_one(
    group: &GroupItem,
    main: &[&LeafItem],
    snapshot: &[&LeafItem],
    ctx: &MapContext<'_>,
) -> Result<MeasureData> {
    let id = group.name();
    let option_of = |leaf: &LeafItem| {
        leaf.name()
            .strip_prefix(id)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or_default()
            .to_string()
    };

    let mut spectra: Vec<(i64, _)> = Vec::new();
    for leaf in group.leaves() {
        match leaf.name().parse::<i64>() {
            Ok(position) => spectra.push((position, leaf.reader().clone())),
            Err(_) => log::warn!("Ignoring {} in MCA {id}", leaf.path()),
        }
    }
    spectra.sort_by_key(|(position, _)| *position);
    let importer = ctx.repair(Importer::per_index(spectra), DuplicatePolicy::KeepFirst);

    let mut rois: std::collections::BTreeMap<u32, RoiParts<'_>> = std::collections::BTreeMap::new();
    let mut options = Vec::new();
    for &leaf in main {
        let option = option_of(leaf);
        if let Some((_, name)) = OPTIONS.iter().find(|(short, _)| *short == option) {
            let field = value_field(leaf)?;
            let importer = ctx.repair(column_importer(leaf, &field), DuplicatePolicy::KeepFirst);
            options.push((*name, Payload::deferred(importer)));
        } else if let Some(n) = roi_number(&option) {
            rois.entry(n).or_default().data = Some(leaf);
        } else {
            log::warn!("Option {option} unmapped");
        }
    }

    let mut calibration = McaCalibration::default();
    let mut snapshot_options = Vec::new();
    for &leaf in snapshot {
        let option = option_of(leaf);
        let number = || first(leaf).map(|v| v.and_then(|v| v.as_f64()));
        match option.as_str() {
            "CALO" => calibration.offset = number()?.unwrap_or(calibration.offset),
            "CALS" => calibration.slope = number()?.unwrap_or(calibration.slope),
            "CALQ" => calibration.quadratic = number()?.unwrap_or(calibration.quadratic),
            other => match (roi_setting(other), OPTIONS.iter().find(|(short, _)| *short == other)) {
                (Some((n, "LO")), _) => rois.entry(n).or_default().low = Some(leaf),
                (Some((n, "HI")), _) => rois.entry(n).or_default().high = Some(leaf),
                (Some((n, "NM")), _) => rois.entry(n).or_default().label = Some(leaf),
                (_, Some((_, name))) => {
                    if let Some(value) = first(leaf)? {
                        snapshot_options.push((*name, value));
                    }
                }
                _ => log::warn!("Option {other} unmapped"),
            },
        }
    }

    let mut mca_rois = Vec::new();
    for (n, parts) in rois {
        let Some(data) = parts.data else {
            log::warn!("Region of interest R{n} of MCA {id} has no data");
            continue;
        };
        let marker = |leaf: Option<&LeafItem>| -> Result<i64> {
            #[allow(clippy::cast_possible_truncation)]
            let value = match leaf {
                Some(leaf) => first(leaf)?.and_then(|v| v.as_f64()).map(|v| v.round() as i64),
                None => None,
            };
            Ok(value.unwrap_or(-1))
        };
        let label = match parts.label {
            Some(leaf) => first(leaf)?.map(|v| v.to_string()).unwrap_or_default(),
            None => String::new(),
        };
        let field = value_field(data)?;
        let importer = ctx.repair(column_importer(data, &field), DuplicatePolicy::KeepFirst);
        mca_rois.push(McaRoi {
            label,
            marker: [marker(parts.low)?, marker(parts.high)?],
            data: Payload::deferred(importer),
        });
    }

    let mut metadata = describe(id, group.attributes(), MetadataKind::McaChannel { calibration });
    for (name, value) in snapshot_options {
        metadata = metadata.with_option(name, value);
    }
    let mut data = MeasureData::new(
        id,
        Section::Standard,
        DataKind::McaChannel { rois: mca_rois },
        metadata.build(),
        Payload::deferred(importer),
    );
    for (name, payload) in options {
        data = data.with_option(name, payload);
    }
    log::debug!("Mapped MCA {id}");
    Ok(data)
}
