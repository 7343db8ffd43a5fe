//! Joining of axis and channel series on common position counts.
//!
//! Devices only record values at the positions where they were set or
//! read, so the series of an axis and a channel generally differ in length.
//! A fill mode decides which positions make up the joined result and how
//! gaps are handled. Inputs are never modified; every call returns new
//! arrays.

use evedata_core::data::MeasureData;
use evedata_core::error::{Error, Result};
use evedata_core::value::{Ragged, Series, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// Strategy for joining an axis with channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FillMode {
    /// Only positions where axis and every channel have values.
    NoFill,
    /// Channel positions; the axis carries its last value forward.
    LastFill,
    /// Axis positions; missing channel values become NaN.
    NaNFill,
    /// Union of axis and channel positions, axis carried forward, channels NaN.
    LastNaNFill,
}

impl fmt::Display for FillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoFill => "NoFill",
            Self::LastFill => "LastFill",
            Self::NaNFill => "NaNFill",
            Self::LastNaNFill => "LastNaNFill",
        };
        f.write_str(name)
    }
}

impl FromStr for FillMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NoFill" => Ok(Self::NoFill),
            "LastFill" => Ok(Self::LastFill),
            "NaNFill" => Ok(Self::NaNFill),
            "LastNaNFill" => Ok(Self::LastNaNFill),
            other => Err(Error::Fill(format!("unknown fill mode {other}"))),
        }
    }
}

/// Result of a join: one row per position for the axis and every channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Joined {
    /// Joined position counts, ascending.
    pub positions: Vec<i64>,
    /// Axis values, one row per position.
    pub axis: Ragged<Value>,
    /// Channel values in the order the channels were given.
    pub channels: Vec<Ragged<Value>>,
}

impl Joined {
    /// Number of joined positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if no position survived the join.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Row lookup by position; a repeated position resolves to its last row.
struct Lookup<'a> {
    series: &'a Series,
    rows: HashMap<i64, usize>,
}

impl<'a> Lookup<'a> {
    fn new(series: &'a Series) -> Self {
        let rows = series
            .index()
            .iter()
            .enumerate()
            .map(|(i, &p)| (p, i))
            .collect();
        Self { series, rows }
    }

    fn at(&self, position: i64) -> Option<&'a [Value]> {
        let row = *self.rows.get(&position)?;
        self.series.values().row(row)
    }

    fn positions(&self) -> BTreeSet<i64> {
        self.rows.keys().copied().collect()
    }
}

/// Carry-forward source: axis rows merged with snapshot rows, where the
/// axis wins at equal positions.
struct CarryForward<'a> {
    positions: Vec<i64>,
    rows: Vec<&'a [Value]>,
}

impl<'a> CarryForward<'a> {
    fn new(axis: &'a Series, snapshot: Option<&'a Series>) -> Self {
        let mut entries: Vec<(i64, u8, usize, &'a [Value])> = Vec::new();
        if let Some(snapshot) = snapshot {
            entries.extend(snapshot.iter().enumerate().map(|(i, (p, r))| (p, 0, i, r)));
        }
        entries.extend(axis.iter().enumerate().map(|(i, (p, r))| (p, 1, i, r)));
        entries.sort_by_key(|&(p, source, i, _)| (p, source, i));
        Self {
            positions: entries.iter().map(|e| e.0).collect(),
            rows: entries.into_iter().map(|e| e.3).collect(),
        }
    }

    fn at(&self, position: i64) -> Option<&'a [Value]> {
        let k = self.positions.partition_point(|&p| p <= position);
        k.checked_sub(1).map(|k| self.rows[k])
    }
}

fn load<'a>(data: &'a MeasureData, role: &str) -> Result<&'a Series> {
    if !data.section().is_position_indexed() {
        return Err(Error::Fill(format!(
            "{role} {} is indexed by time, map it to positions first",
            data.id()
        )));
    }
    data.series()
        .map_err(|e| Error::Fill(format!("cannot load {role} {}: {e}", data.id())))
}

/// Joins an axis with one or more channels.
///
/// `snapshot` is the snapshot series of the axis, if any; it serves as an
/// additional carry-forward source in the `Last*` modes.
///
/// # Errors
/// Returns [`Error::Fill`] if no channel is given, an operand is indexed by
/// time, or a payload cannot be loaded.
pub fn fill(
    mode: FillMode,
    axis: &MeasureData,
    channels: &[&MeasureData],
    snapshot: Option<&MeasureData>,
) -> Result<Joined> {
    if channels.is_empty() {
        return Err(Error::Fill("at least one channel is required".to_string()));
    }
    let axis_series = load(axis, "axis")?;
    let channel_series = channels
        .iter()
        .map(|c| load(c, "channel"))
        .collect::<Result<Vec<_>>>()?;
    let snapshot_series = snapshot.map(|s| load(s, "snapshot")).transpose()?;

    let axis_lookup = Lookup::new(axis_series);
    let channel_lookups: Vec<Lookup<'_>> = channel_series.iter().map(|s| Lookup::new(s)).collect();

    let axis_positions = axis_lookup.positions();
    let channel_positions = channel_lookups
        .iter()
        .map(Lookup::positions)
        .reduce(|acc, p| match mode {
            FillMode::NoFill => acc.intersection(&p).copied().collect(),
            _ => acc.union(&p).copied().collect(),
        })
        .unwrap_or_default();

    let positions: Vec<i64> = match mode {
        FillMode::NoFill => axis_positions.intersection(&channel_positions).copied().collect(),
        FillMode::LastFill => channel_positions.into_iter().collect(),
        FillMode::NaNFill => axis_positions.into_iter().collect(),
        FillMode::LastNaNFill => axis_positions.union(&channel_positions).copied().collect(),
    };

    let carry = matches!(mode, FillMode::LastFill | FillMode::LastNaNFill)
        .then(|| CarryForward::new(axis_series, snapshot_series));
    let nan = [Value::nan()];

    let mut axis_values = Ragged::with_capacity(positions.len(), positions.len());
    for &position in &positions {
        let row = match &carry {
            Some(carry) => carry.at(position),
            None => axis_lookup.at(position),
        };
        axis_values.push_row(row.unwrap_or(&nan[..]).iter().cloned());
    }

    let channel_values = channel_lookups
        .iter()
        .map(|lookup| {
            let mut values = Ragged::with_capacity(positions.len(), positions.len());
            for &position in &positions {
                values.push_row(lookup.at(position).unwrap_or(&nan[..]).iter().cloned());
            }
            values
        })
        .collect();

    log::debug!(
        "{mode} join of {} with {} channel(s): {} positions",
        axis.id(),
        channels.len(),
        positions.len()
    );
    Ok(Joined {
        positions,
        axis: axis_values,
        channels: channel_values,
    })
}
