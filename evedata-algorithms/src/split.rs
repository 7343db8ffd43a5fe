//! Splitting of redefined detector channels.
//!
//! Older files store one physical dataset per device even if the device was
//! used as a plain, averaging or interval channel in different scan modules.
//! The auxiliary average and interval groups record which positions belong
//! to which flavour. This module turns those positions into segments; each
//! segment later becomes a device of its own named `{id}_{segment}`.

use crate::preprocess::SelectPositions;
use evedata_core::data::Payload;
use evedata_core::error::{Error, Result};
use evedata_core::scan::ScanDescription;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Channel flavour of a segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SegmentKind {
    /// No auxiliary group covers the positions.
    Standard,
    /// Covered by the average metadata group.
    Average,
    /// Covered by the interval (standard deviation) group.
    Interval,
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => f.write_str("standard"),
            Self::Average => f.write_str("average"),
            Self::Interval => f.write_str("interval"),
        }
    }
}

/// Positions recorded in the auxiliary groups of one device.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuxiliaryPositions {
    /// Positions of the average metadata group, if present.
    pub average: Option<Vec<i64>>,
    /// Positions of the interval group, if present.
    pub interval: Option<Vec<i64>>,
}

impl AuxiliaryPositions {
    /// Returns true if no auxiliary group exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.average.is_none() && self.interval.is_none()
    }
}

/// One part of a split device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    /// Identifier of the new device, `{id}_{number}`.
    pub id: String,
    /// Scan module id, or the running segment number without scan description.
    pub number: u32,
    /// Channel flavour.
    pub kind: SegmentKind,
    /// Positions of the segment, ascending.
    pub positions: Vec<i64>,
}

impl Segment {
    /// Payload restricted to this segment's positions.
    ///
    /// # Errors
    /// Propagates errors of an already loaded payload.
    pub fn select(&self, payload: &Payload) -> Result<Payload> {
        payload.with_step(Arc::new(SelectPositions::new(self.positions.iter().copied())))
    }
}

fn ambiguous(device: &str, reason: impl Into<String>) -> Error {
    Error::AmbiguousMapping {
        device: device.to_string(),
        reason: reason.into(),
    }
}

/// Divides the positions of a device into segments of one flavour each.
///
/// Returns no segments if the device has no auxiliary groups. With a scan
/// description, positions are grouped by the scan module that produced them;
/// otherwise maximal runs of equal flavour form segments numbered from 1.
///
/// # Errors
/// Returns [`Error::AmbiguousMapping`] if a position is claimed by both
/// auxiliary groups, an auxiliary position is not part of the dataset, a
/// position belongs to no scan module, or a scan module mixes flavours.
pub fn plan_split(
    device: &str,
    positions: &[i64],
    aux: &AuxiliaryPositions,
    scan: Option<&ScanDescription>,
) -> Result<Vec<Segment>> {
    if aux.is_empty() {
        return Ok(Vec::new());
    }
    let known: BTreeSet<i64> = positions.iter().copied().collect();
    let average: BTreeSet<i64> = aux.average.iter().flatten().copied().collect();
    let interval: BTreeSet<i64> = aux.interval.iter().flatten().copied().collect();

    if let Some(p) = average.intersection(&interval).next() {
        return Err(ambiguous(
            device,
            format!("position {p} is both averaged and interval-measured"),
        ));
    }
    if let Some(p) = average.union(&interval).find(|p| !known.contains(*p)) {
        return Err(ambiguous(
            device,
            format!("auxiliary position {p} is not part of the dataset"),
        ));
    }

    let kind_of = |p: &i64| {
        if average.contains(p) {
            SegmentKind::Average
        } else if interval.contains(p) {
            SegmentKind::Interval
        } else {
            SegmentKind::Standard
        }
    };

    let mut segments: Vec<Segment> = Vec::new();
    match scan {
        Some(scan) => {
            let mut modules: BTreeMap<u32, (SegmentKind, Vec<i64>)> = BTreeMap::new();
            for &p in &known {
                let module = scan
                    .module_of(p)
                    .ok_or_else(|| ambiguous(device, format!("position {p} belongs to no scan module")))?;
                let kind = kind_of(&p);
                let entry = modules.entry(module).or_insert((kind, Vec::new()));
                if entry.0 != kind {
                    return Err(ambiguous(
                        device,
                        format!("scan module {module} mixes {} and {kind} positions", entry.0),
                    ));
                }
                entry.1.push(p);
            }
            for (module, (kind, positions)) in modules {
                segments.push(Segment {
                    id: format!("{device}_{module}"),
                    number: module,
                    kind,
                    positions,
                });
            }
        }
        None => {
            for &p in &known {
                let kind = kind_of(&p);
                match segments.last_mut() {
                    Some(last) if last.kind == kind => last.positions.push(p),
                    _ => {
                        let number = u32::try_from(segments.len() + 1).unwrap_or(u32::MAX);
                        segments.push(Segment {
                            id: format!("{device}_{number}"),
                            number,
                            kind,
                            positions: vec![p],
                        });
                    }
                }
            }
        }
    }
    log::debug!("Device {device} spans {} segment(s)", segments.len());
    Ok(segments)
}
