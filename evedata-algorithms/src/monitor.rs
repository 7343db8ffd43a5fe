//! Re-indexing of monitors onto position counts.
//!
//! Monitors record a value whenever the device changes, indexed by
//! milliseconds since scan start. Mapping a monitor produces a new device
//! series indexed by position counts; the monitor itself is left untouched.

use crate::sorting::{resolve_duplicates, sort_by_position, DuplicatePolicy};
use crate::timestamp::{Direction, TimestampIndex, BEFORE_START};
use evedata_core::data::{DataKind, MeasureData, Payload};
use evedata_core::error::{Error, Result};
use evedata_core::metadata::{Metadata, MetadataKind};
use evedata_core::scan::{DeviceRole, ScanDescription};
use evedata_core::section::Section;
use evedata_core::value::Series;
use rayon::prelude::*;

/// Collapses repeated timestamps of a monitor series, keeping the last entry.
///
/// Several `-1` entries describe the state before scan start; only the last
/// of them is meaningful. Duplicated regular timestamps are logged.
#[must_use]
pub fn collapse(device: &str, series: &Series) -> Series {
    let sorted = sort_by_position(series);
    let index = sorted.index();
    let duplicates = index
        .windows(2)
        .filter(|w| w[0] == w[1] && w[0] != BEFORE_START)
        .count();
    if duplicates > 0 {
        log::warn!("Monitor {device} has {duplicates} duplicated timestamps, keeping the last value");
    }
    resolve_duplicates(&sorted, DuplicatePolicy::KeepLast)
}

/// Search direction for a monitor: axes map to the next position, channels
/// and devices of unknown role to `fallback`.
#[must_use]
pub fn direction_for(device: &str, scan: Option<&ScanDescription>, fallback: Direction) -> Direction {
    match scan.and_then(|s| s.role(device)) {
        Some(DeviceRole::Axis) => Direction::Next,
        Some(DeviceRole::Channel) => Direction::Previous,
        None => fallback,
    }
}

/// Maps one monitor onto position counts.
///
/// # Errors
/// Returns an error if the monitor is not a monitor or its payload cannot be
/// imported.
pub fn map_monitor(
    monitor: &MeasureData,
    index: &TimestampIndex,
    direction: Direction,
) -> Result<MeasureData> {
    if monitor.section() != Section::Monitor {
        return Err(Error::integrity(
            monitor.id(),
            None,
            format!("expected a monitor, found {} data", monitor.section()),
        ));
    }
    let collapsed = collapse(monitor.id(), monitor.series()?);
    let collapsed_len = collapsed.len();
    let positions = index.get_position(collapsed.index(), direction);
    let (_, values) = collapsed.into_parts();
    let mapped = Series::new(positions, values)?;
    // Several changes between two positions leave the last one in effect.
    let mapped = resolve_duplicates(&sort_by_position(&mapped), DuplicatePolicy::KeepLast);
    let superseded = collapsed_len - mapped.len();
    if superseded > 0 {
        log::warn!(
            "Monitor {}: {superseded} change(s) superseded within one position, keeping the last",
            monitor.id()
        );
    }

    let source = monitor.metadata();
    let mut metadata = Metadata::builder(source.name(), MetadataKind::Device).with_unit(source.unit());
    if let Some(device) = source.device() {
        metadata = metadata.with_device(device.clone());
    }
    for (name, value) in source.options() {
        metadata = metadata.with_option(name.clone(), value.clone());
    }
    log::debug!("Mapped monitor {} onto {} positions", monitor.id(), mapped.len());
    Ok(MeasureData::new(
        monitor.id(),
        Section::Standard,
        DataKind::Device {
            source: monitor.id().to_string(),
        },
        metadata.build(),
        Payload::loaded(mapped),
    ))
}

/// Maps many monitors, optionally in parallel.
///
/// Results keep the order of `monitors`; each monitor fails on its own.
pub fn map_monitors<'a, I>(
    monitors: I,
    index: &TimestampIndex,
    scan: Option<&ScanDescription>,
    fallback: Direction,
    parallel: bool,
) -> Vec<(String, Result<MeasureData>)>
where
    I: IntoIterator<Item = &'a MeasureData>,
{
    let monitors: Vec<&MeasureData> = monitors.into_iter().collect();
    let map_one = |monitor: &&MeasureData| {
        let direction = direction_for(monitor.id(), scan, fallback);
        (monitor.id().to_string(), map_monitor(monitor, index, direction))
    };
    if parallel {
        monitors.par_iter().map(map_one).collect()
    } else {
        monitors.iter().map(map_one).collect()
    }
}
