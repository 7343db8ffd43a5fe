//! Mapping of monitor timestamps to position counts.
//!
//! The position timestamp table records, for every position count, the
//! milliseconds elapsed since scan start. Lookups are binary searches on the
//! timestamp column; a query before the first or after the last timestamp is
//! clamped to the first or last position.

use evedata_core::data::MeasureData;
use evedata_core::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Timestamp recorded for events before the scan started.
pub const BEFORE_START: i64 = -1;

/// Search direction for [`TimestampIndex::get_position`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Smallest position whose timestamp is not earlier than the query.
    Next,
    /// Largest position whose timestamp is not later than the query.
    #[default]
    Previous,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Next => f.write_str("next"),
            Self::Previous => f.write_str("previous"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "next" => Ok(Self::Next),
            "previous" => Ok(Self::Previous),
            other => Err(format!("unknown direction {other:?}")),
        }
    }
}

/// Query accepted by [`TimestampIndex::get_position`]: a single timestamp
/// yields a single position, a slice yields one position per entry.
pub trait TimestampQuery {
    /// Positions returned for this query.
    type Output;

    /// Looks the query up in `index`.
    fn lookup(self, index: &TimestampIndex, direction: Direction) -> Self::Output;
}

impl TimestampQuery for i64 {
    type Output = i64;

    fn lookup(self, index: &TimestampIndex, direction: Direction) -> i64 {
        index.position_of(self, direction)
    }
}

impl TimestampQuery for &[i64] {
    type Output = Vec<i64>;

    fn lookup(self, index: &TimestampIndex, direction: Direction) -> Vec<i64> {
        self.iter()
            .map(|&t| index.position_of(t, direction))
            .collect()
    }
}

impl<const N: usize> TimestampQuery for &[i64; N] {
    type Output = Vec<i64>;

    fn lookup(self, index: &TimestampIndex, direction: Direction) -> Vec<i64> {
        self.as_slice().lookup(index, direction)
    }
}

/// Position timestamp lookup table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimestampIndex {
    positions: Vec<i64>,
    timestamps: Vec<i64>,
}

impl TimestampIndex {
    /// Builds the table from the position timestamp series of a file.
    ///
    /// # Errors
    /// Returns an error if the series cannot be imported, holds
    /// non-numeric timestamps or is empty.
    pub fn new(data: &MeasureData) -> Result<Self> {
        let series = data.series()?;
        let stamps = series.first_numbers().ok_or_else(|| {
            Error::integrity(data.id(), None, "position timestamps must be numeric")
        })?;
        #[allow(clippy::cast_possible_truncation)]
        let timestamps = stamps.into_iter().map(|t| t.round() as i64).collect();
        Self::from_parts(series.index().to_vec(), timestamps)
    }

    /// Builds the table from explicit columns.
    ///
    /// Rows are ordered by position; timestamps are expected to grow with
    /// the position count.
    ///
    /// # Errors
    /// Returns [`Error::DataIntegrity`] if the columns differ in length or
    /// are empty.
    pub fn from_parts(positions: Vec<i64>, timestamps: Vec<i64>) -> Result<Self> {
        if positions.len() != timestamps.len() {
            return Err(Error::integrity(
                "position timestamps",
                None,
                format!("{} positions but {} timestamps", positions.len(), timestamps.len()),
            ));
        }
        if positions.is_empty() {
            return Err(Error::integrity("position timestamps", None, "table is empty"));
        }
        let mut pairs: Vec<(i64, i64)> = positions.into_iter().zip(timestamps).collect();
        pairs.sort_by_key(|&(p, _)| p);
        if pairs.windows(2).any(|w| w[1].1 < w[0].1) {
            log::warn!("Position timestamps are not monotonic, sorting by timestamp");
            pairs.sort_by_key(|&(_, t)| t);
        }
        let (positions, timestamps) = pairs.into_iter().unzip();
        Ok(Self {
            positions,
            timestamps,
        })
    }

    /// Position counts in table order.
    #[must_use]
    pub fn positions(&self) -> &[i64] {
        &self.positions
    }

    /// Timestamps in table order.
    #[must_use]
    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    /// Maps timestamps to position counts.
    ///
    /// `-1` (before scan start) maps to the first position.
    pub fn get_position<Q: TimestampQuery>(&self, query: Q, direction: Direction) -> Q::Output {
        query.lookup(self, direction)
    }

    fn position_of(&self, timestamp: i64, direction: Direction) -> i64 {
        let first = self.positions[0];
        let last = self.positions[self.positions.len() - 1];
        if timestamp == BEFORE_START {
            return first;
        }
        match direction {
            Direction::Previous => {
                let k = self.timestamps.partition_point(|&t| t <= timestamp);
                if k == 0 {
                    first
                } else {
                    self.positions[k - 1]
                }
            }
            Direction::Next => {
                let k = self.timestamps.partition_point(|&t| t < timestamp);
                self.positions.get(k).copied().unwrap_or(last)
            }
        }
    }
}
