//! MPSKIP fake-averaging scans.
//!
//! The MPSKIP detector records every single reading of an averaging loop at
//! a position of its own, counted by the `Counter-mot` axis. Mapping takes
//! the detector's bookkeeping datasets out of the file and leaves one
//! [`DataKind::Skip`] device carrying the counter positions and the
//! averaging settings. With a scan description, the channels of each MPSKIP
//! scan module are then regrouped into one ragged row per averaging loop and
//! merged into the enclosing module.

use crate::devices::{describe, first_value, value_field, MSECS};
use crate::inventory::Inventory;
use crate::mapper::{Collected, MapContext};
use evedata_algorithms::preprocess::{RearrangeRawValues, SelectPositions};
use evedata_core::container::LeafItem;
use evedata_core::data::{DataKind, Importer, MeasureData};
use evedata_core::error::{Error, Result};
use evedata_core::file::{File, ScanModule};
use evedata_core::metadata::{AverageSettings, Metadata, MetadataKind};
use evedata_core::scan::{DeviceRole, ScanDescription};
use evedata_core::section::Section;
use evedata_core::value::Value;
use std::sync::Arc;

/// Axis counting the readings of one averaging loop.
pub const COUNTER: &str = "Counter-mot";

const PREFIX: &str = "MPSKIP:";
const SKIP_COUNT: &str = "skipcountchan1";
const COUNTER_CHANNEL: &str = "counterchan1";
const CHANNEL: &str = "chan1";
const MONITORS: [&str; 5] = ["detector", "limit", "maxdev", "skipcount", "reset"];

/// Maps every MPSKIP detector, claiming its bookkeeping datasets.
///
/// Files without an MPSKIP skip counter keep `Counter-mot` as an ordinary
/// device.
pub fn map_mpskip(inventory: &mut Inventory<'_>, ctx: &MapContext<'_>, out: &mut Collected) {
    let bases: Vec<String> = inventory
        .main()
        .iter()
        .filter_map(|leaf| leaf.name().strip_suffix(SKIP_COUNT))
        .filter(|base| base.starts_with(PREFIX))
        .map(str::to_string)
        .collect();
    if bases.is_empty() {
        return;
    }
    let Some(counter) = inventory.take_main(COUNTER) else {
        for base in bases {
            out.failed.push((base, Error::MissingItem(COUNTER.to_string())));
        }
        return;
    };
    for base in &bases {
        let skip_count = inventory.take_main(&format!("{base}{SKIP_COUNT}"));
        inventory.take_main(&format!("{base}{COUNTER_CHANNEL}"));
        inventory.take_snapshot(&format!("{base}{SKIP_COUNT}"));
        inventory.take_snapshot(&format!("{base}{COUNTER_CHANNEL}"));
        let monitors: Vec<(&str, Option<&LeafItem>)> = MONITORS
            .iter()
            .map(|name| (*name, inventory.take_monitor(&format!("{base}{name}"))))
            .collect();
        out.absorb(base, map_skip(base, counter, skip_count, &monitors, ctx));
    }
}

/// Last value recorded by a monitor.
fn monitor_value(leaf: &LeafItem) -> Result<Option<Value>> {
    let field = value_field(leaf)?;
    let series = Importer::columns(leaf.reader().clone(), MSECS, &field).import()?;
    let value = series.iter().last().and_then(|(_, row)| row.first().cloned());
    Ok(value)
}

#[allow(clippy::cast_possible_truncation)]
fn as_count(value: Option<f64>) -> i64 {
    value.map_or(0, |v| v.round() as i64)
}

fn map_skip(
    base: &str,
    counter: &LeafItem,
    skip_count: Option<&LeafItem>,
    monitors: &[(&str, Option<&LeafItem>)],
    ctx: &MapContext<'_>,
) -> Result<MeasureData> {
    let mut settings = AverageSettings::default();
    let mut channel = format!("{base}{CHANNEL}");
    let mut n_averages = None;
    for (name, leaf) in monitors {
        let Some(leaf) = leaf else {
            log::warn!("Could not find monitor dataset {base}{name}");
            continue;
        };
        let value = monitor_value(leaf)?;
        let number = value.as_ref().and_then(Value::as_f64);
        match *name {
            "detector" => {
                if let Some(value) = value {
                    channel = value.to_string();
                }
            }
            "limit" => settings.low_limit = number.unwrap_or_default(),
            "maxdev" => settings.max_deviation = number.unwrap_or_default(),
            "skipcount" => n_averages = number,
            _ => {}
        }
    }
    if n_averages.is_none() {
        if let Some(leaf) = skip_count {
            let field = value_field(leaf)?;
            n_averages = first_value(leaf, &field, None)?.and_then(|v| v.as_f64());
        }
    }
    settings.n_averages = as_count(n_averages);
    settings.max_attempts = ctx
        .scan
        .and_then(|scan| scan.set_values(COUNTER))
        .map_or(0, |values| i64::try_from(values.len()).unwrap_or(i64::MAX));

    // The skip device inherits the counter's identity and readings.
    let counter_data = crate::devices::map_axis(counter, Section::Standard, ctx)?;
    let metadata = describe(COUNTER, counter.attributes(), MetadataKind::Skip { settings, channel }).build();
    log::debug!("Mapped MPSKIP detector {base}");
    Ok(MeasureData::new(
        base,
        Section::Standard,
        DataKind::Skip,
        metadata,
        counter_data.payload().clone(),
    ))
}

fn rebuild(source: &Metadata, kind: MetadataKind) -> Metadata {
    let mut builder = Metadata::builder(source.name(), kind).with_unit(source.unit());
    if let Some(device) = source.device() {
        builder = builder.with_device(device.clone());
    }
    for (name, value) in source.options() {
        builder = builder.with_option(name.clone(), value.clone());
    }
    builder.build()
}

/// Splits ascending positions into runs of consecutive values.
fn runs(positions: &[i64]) -> Vec<Vec<i64>> {
    let mut runs: Vec<Vec<i64>> = Vec::new();
    for &p in positions {
        match runs.last_mut() {
            Some(run) if run.last().is_some_and(|&last| last + 1 == p) => run.push(p),
            _ => runs.push(vec![p]),
        }
    }
    runs
}

/// Converts one channel of an MPSKIP module into a per-loop device.
fn convert(source: &MeasureData, id: &str, skip: &MeasureData, scan: &ScanDescription) -> Result<MeasureData> {
    let MetadataKind::Skip { settings, .. } = skip.metadata().kind() else {
        return Err(Error::integrity(skip.id(), None, "not an MPSKIP device"));
    };
    let payload = source
        .payload()
        .with_step(Arc::new(SelectPositions::of(skip.id(), skip.payload().clone())))?
        .with_step(Arc::new(RearrangeRawValues::new(skip.id(), skip.payload().clone())))?;
    let (kind, metadata_kind) = if scan.role(id) == Some(DeviceRole::Axis) {
        let deadband = match source.metadata().kind() {
            MetadataKind::Axis { deadband } => *deadband,
            _ => None,
        };
        (
            DataKind::Axis {
                set_values: scan.set_values(id).map(<[Value]>::to_vec),
            },
            MetadataKind::Axis { deadband },
        )
    } else {
        (
            DataKind::AverageChannel,
            MetadataKind::AverageChannel {
                settings: settings.clone(),
                normalize_id: source.metadata().kind().normalize_id().map(str::to_string),
            },
        )
    };
    Ok(MeasureData::new(
        id,
        Section::Standard,
        kind,
        rebuild(source.metadata(), metadata_kind),
        payload,
    ))
}

/// Regroups the channels of every MPSKIP scan module and merges the module
/// into its parent.
///
/// The counter positions of a skip device are divided into runs of
/// consecutive positions, one run per MPSKIP module in scan order.
///
/// # Errors
/// Returns an error if the counter positions cannot be read.
pub fn merge_mpskip_modules(file: &File, scan: &ScanDescription, modules: &mut Vec<ScanModule>) -> Result<()> {
    let skips: Vec<&MeasureData> = file
        .standard
        .values()
        .filter(|d| matches!(d.kind(), DataKind::Skip))
        .collect();
    let described: Vec<_> = scan.mpskip_modules().collect();
    for skip in skips {
        let runs = runs(skip.index()?);
        if runs.len() != described.len() {
            log::warn!(
                "MPSKIP device {} spans {} position run(s) for {} MPSKIP module(s)",
                skip.id(),
                runs.len(),
                described.len()
            );
        }
        for (description, run) in described.iter().zip(runs) {
            let payload = skip
                .payload()
                .with_step(Arc::new(SelectPositions::new(run.iter().copied())))?;
            let module_skip = skip.clone().with_payload(payload);

            let mut converted = Vec::new();
            for channel in description.channels.iter().chain(&description.axes) {
                if channel.starts_with(PREFIX) || channel == COUNTER {
                    continue;
                }
                let split_id = format!("{channel}_{}", description.id);
                let Some(source) = file.standard.get(&split_id).or_else(|| file.standard.get(channel)) else {
                    log::debug!("MPSKIP module {} uses {channel}, which was not mapped", description.id);
                    continue;
                };
                converted.push(convert(source, channel, &module_skip, scan)?);
            }

            let target = modules
                .iter()
                .position(|m| m.id == description.parent)
                .or_else(|| modules.iter().position(|m| m.id == description.id));
            let Some(target) = target else {
                log::warn!("No scan module to hold MPSKIP module {}", description.id);
                continue;
            };
            let module = &mut modules[target];
            module.data.insert(skip.id(), module_skip);
            for data in converted {
                module.data.insert(data.id().to_string(), data);
            }
            if module.id != description.id {
                log::info!("Merged MPSKIP module {} into module {}", description.id, module.id);
                modules.retain(|m| m.id != description.id);
            } else {
                module.positions = run;
            }
        }
    }
    Ok(())
}
