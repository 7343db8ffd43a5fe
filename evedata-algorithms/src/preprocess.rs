//! Row selection and MPSKIP rearrangement steps.

use evedata_core::data::{Payload, Preprocessing};
use evedata_core::error::{Error, Result};
use evedata_core::value::{Ragged, Series};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug)]
enum PositionSource {
    Fixed(HashSet<i64>),
    Of { device: String, payload: Payload },
}

/// Keeps the rows whose position is in a given set.
///
/// Used when one physical dataset is split into several devices, each
/// importing only its share of the rows.
#[derive(Clone, Debug)]
pub struct SelectPositions {
    source: PositionSource,
}

impl SelectPositions {
    /// Selects a fixed set of positions.
    pub fn new(positions: impl IntoIterator<Item = i64>) -> Self {
        Self {
            source: PositionSource::Fixed(positions.into_iter().collect()),
        }
    }

    /// Selects the positions of another device, read when the step runs.
    pub fn of(device: impl Into<String>, payload: Payload) -> Self {
        Self {
            source: PositionSource::Of {
                device: device.into(),
                payload,
            },
        }
    }

    /// Applies the selection to a series.
    ///
    /// # Errors
    /// Returns an error if the positions of the referenced device cannot be
    /// imported.
    pub fn select(&self, series: &Series) -> Result<Series> {
        let keep = |set: &HashSet<i64>| -> Vec<usize> {
            series
                .index()
                .iter()
                .enumerate()
                .filter(|(_, p)| set.contains(p))
                .map(|(i, _)| i)
                .collect()
        };
        let rows = match &self.source {
            PositionSource::Fixed(set) => keep(set),
            PositionSource::Of { device, payload } => {
                let set: HashSet<i64> = payload.get(device)?.index().iter().copied().collect();
                keep(&set)
            }
        };
        Ok(series.select(&rows))
    }
}

impl Preprocessing for SelectPositions {
    fn name(&self) -> &'static str {
        "select positions"
    }

    fn process(&self, series: Series) -> Result<Series> {
        self.select(&series)
    }
}

/// Regroups raw MPSKIP readings into one ragged row per averaging loop.
///
/// The skip counter restarts for every loop; a decrease of the counter marks
/// the start of the next loop. Each loop is assigned the position preceding
/// its first reading, i.e. the position of the next-outer scan module.
/// Readings at positions without a skip count are dropped.
#[derive(Clone, Debug)]
pub struct RearrangeRawValues {
    device: String,
    skip: Payload,
}

impl RearrangeRawValues {
    /// Uses the skip counter series of `device`.
    pub fn new(device: impl Into<String>, skip: Payload) -> Self {
        Self {
            device: device.into(),
            skip,
        }
    }

    /// Regroups `series` by an explicit skip counter series.
    ///
    /// # Errors
    /// Returns [`Error::DataIntegrity`] if a skip count is not numeric.
    pub fn rearrange(series: &Series, skip: &Series) -> Result<Series> {
        let mut counts = HashMap::with_capacity(skip.len());
        for (i, (position, values)) in skip.iter().enumerate() {
            let count = values
                .first()
                .and_then(evedata_core::value::Value::as_f64)
                .ok_or_else(|| Error::integrity("<series>", Some(i), "skip count is not numeric"))?;
            counts.insert(position, count);
        }

        let mut index = Vec::new();
        let mut values = Ragged::new();
        let mut current = Vec::new();
        let mut previous: Option<f64> = None;
        for (position, row) in series.iter() {
            let Some(&count) = counts.get(&position) else {
                continue;
            };
            let starts_loop = previous.is_none_or(|p| count < p);
            if starts_loop {
                if previous.is_some() {
                    values.push_row(std::mem::take(&mut current));
                }
                index.push(position - 1);
            }
            current.extend(row.iter().cloned());
            previous = Some(count);
        }
        if previous.is_some() {
            values.push_row(current);
        }
        Series::new(index, values)
    }
}

impl Preprocessing for RearrangeRawValues {
    fn name(&self) -> &'static str {
        "rearrange raw values"
    }

    fn process(&self, series: Series) -> Result<Series> {
        let skip = self.skip.get(&self.device)?;
        Self::rearrange(&series, skip)
    }
}
