//! Scalar values, ragged arrays and indexed value series.
//!
//! A device reading at one index may consist of zero, one or several values
//! (averaging detectors, per-readout read-back values, spectra). [`Ragged`]
//! stores such sequences flat with a row offset table, in the same columnar
//! spirit as the rest of the crate.

use crate::error::{Error, Result};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single scalar reading.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    /// Numeric reading; integer readings are widened to `f64`.
    Number(f64),
    /// Text reading (monitors, non-numeric channels).
    Text(String),
}

impl Value {
    /// The NaN sentinel used for missing rows.
    #[must_use]
    pub fn nan() -> Self {
        Self::Number(f64::NAN)
    }

    /// Returns true for the NaN sentinel.
    #[must_use]
    pub fn is_nan(&self) -> bool {
        matches!(self, Self::Number(v) if v.is_nan())
    }

    /// Numeric view of the value.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    /// Text view of the value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }

    /// Bitwise equality; NaN equals NaN.
    #[must_use]
    pub fn bit_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Ragged array: a sequence of rows, each holding zero or more values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ragged<T> {
    offsets: Vec<usize>,
    values: Vec<T>,
}

impl<T> Default for Ragged<T> {
    fn default() -> Self {
        Self {
            offsets: vec![0],
            values: Vec::new(),
        }
    }
}

impl<T> Ragged<T> {
    /// Creates an empty ragged array.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty ragged array with reserved capacity.
    #[must_use]
    pub fn with_capacity(rows: usize, values: usize) -> Self {
        let mut offsets = Vec::with_capacity(rows + 1);
        offsets.push(0);
        Self {
            offsets,
            values: Vec::with_capacity(values),
        }
    }

    /// One value per row.
    #[must_use]
    pub fn from_scalars(values: Vec<T>) -> Self {
        let offsets = (0..=values.len()).collect();
        Self { offsets, values }
    }

    /// Builds a ragged array from explicit rows.
    pub fn from_rows<R, I>(rows: R) -> Self
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = T>,
    {
        let mut ragged = Self::new();
        for row in rows {
            ragged.push_row(row);
        }
        ragged
    }

    /// Appends one row.
    pub fn push_row<I: IntoIterator<Item = T>>(&mut self, row: I) {
        self.values.extend(row);
        self.offsets.push(self.values.len());
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Returns true if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of values over all rows.
    #[must_use]
    pub fn total_values(&self) -> usize {
        self.values.len()
    }

    /// Values of row `i`.
    #[must_use]
    pub fn row(&self, i: usize) -> Option<&[T]> {
        let start = *self.offsets.get(i)?;
        let end = *self.offsets.get(i + 1)?;
        Some(&self.values[start..end])
    }

    /// Iterates over rows.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[T]> + '_ {
        self.offsets
            .windows(2)
            .map(move |w| &self.values[w[0]..w[1]])
    }

    /// Flat view of all values.
    #[must_use]
    pub fn flat(&self) -> &[T] {
        &self.values
    }

    /// Consumes the array into its flat values.
    #[must_use]
    pub fn into_flat(self) -> Vec<T> {
        self.values
    }

    /// Returns true when every row holds exactly one value.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        self.offsets.windows(2).all(|w| w[1] - w[0] == 1)
    }
}

impl<T: Clone> Ragged<T> {
    /// New ragged array holding the given rows in the given order.
    ///
    /// Indices past the end are skipped.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        let mut out = Self::with_capacity(indices.len(), indices.len());
        for &i in indices {
            if let Some(row) = self.row(i) {
                out.push_row(row.iter().cloned());
            }
        }
        out
    }
}

/// An index sequence with one ragged row per index.
///
/// The index holds position counts or milliseconds, depending on the
/// section of the owning device.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Series {
    index: Vec<i64>,
    values: Ragged<Value>,
}

impl Series {
    /// Creates a series.
    ///
    /// # Errors
    /// Returns [`Error::DataIntegrity`] if index and value lengths differ.
    pub fn new(index: Vec<i64>, values: Ragged<Value>) -> Result<Self> {
        if index.len() != values.len() {
            return Err(Error::integrity(
                "<series>",
                Some(index.len().min(values.len())),
                format!(
                    "{} index entries but {} value rows",
                    index.len(),
                    values.len()
                ),
            ));
        }
        Ok(Self { index, values })
    }

    /// Creates a series with one value per index.
    ///
    /// # Errors
    /// Returns [`Error::DataIntegrity`] if lengths differ.
    pub fn scalars(index: Vec<i64>, values: Vec<Value>) -> Result<Self> {
        Self::new(index, Ragged::from_scalars(values))
    }

    /// Index sequence.
    #[must_use]
    pub fn index(&self) -> &[i64] {
        &self.index
    }

    /// Ragged values.
    #[must_use]
    pub fn values(&self) -> &Ragged<Value> {
        &self.values
    }

    /// Number of index entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true for an empty series.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of values over all rows.
    #[must_use]
    pub fn total_values(&self) -> usize {
        self.values.total_values()
    }

    /// Row at index position `i`.
    #[must_use]
    pub fn row(&self, i: usize) -> Option<(i64, &[Value])> {
        Some((*self.index.get(i)?, self.values.row(i)?))
    }

    /// Iterates over `(index, values)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &[Value])> + '_ {
        self.index.iter().copied().zip(self.values.rows())
    }

    /// New series holding the given rows in the given order.
    #[must_use]
    pub fn select(&self, rows: &[usize]) -> Self {
        let rows: Vec<usize> = rows.iter().copied().filter(|&i| i < self.len()).collect();
        Self {
            index: rows.iter().map(|&i| self.index[i]).collect(),
            values: self.values.select(&rows),
        }
    }

    /// First value of every row as number, `None` if any row is empty or text.
    #[must_use]
    pub fn first_numbers(&self) -> Option<Vec<f64>> {
        self.values
            .rows()
            .map(|row| row.first().and_then(Value::as_f64))
            .collect()
    }

    /// Returns true if no value is text.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.values.flat().iter().all(|v| v.as_f64().is_some())
    }

    /// Consumes the series into its parts.
    #[must_use]
    pub fn into_parts(self) -> (Vec<i64>, Ragged<Value>) {
        (self.index, self.values)
    }

    /// Bitwise equality of index and values; NaN equals NaN.
    #[must_use]
    pub fn bit_eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.values.offsets == other.values.offsets
            && self
                .values
                .flat()
                .iter()
                .zip(other.values.flat())
                .all(|(a, b)| a.bit_eq(b))
    }
}
