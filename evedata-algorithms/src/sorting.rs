//! Stable position sorting and duplicate resolution.
//!
//! Older eveH5 files occasionally store position counts out of order, and
//! axes may carry several rows for one position. Both passes return new
//! series and keep the relative order of equal positions.

use evedata_core::data::Preprocessing;
use evedata_core::error::Result;
use evedata_core::value::Series;

/// Which row survives when a position occurs more than once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DuplicatePolicy {
    /// Keep the first row (channels).
    KeepFirst,
    /// Keep the last row (axes).
    KeepLast,
}

/// Returns true if the index is non-decreasing.
#[must_use]
pub fn is_sorted(index: &[i64]) -> bool {
    index.windows(2).all(|w| w[0] <= w[1])
}

/// Row order that sorts `index` stably.
#[must_use]
pub fn sort_permutation(index: &[i64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..index.len()).collect();
    order.sort_by_key(|&i| index[i]);
    order
}

/// Stable sort of a series by position.
///
/// Rows with equal positions keep their relative order, so sorting twice
/// yields the same series as sorting once.
#[must_use]
pub fn sort_by_position(series: &Series) -> Series {
    if is_sorted(series.index()) {
        return series.clone();
    }
    series.select(&sort_permutation(series.index()))
}

/// Keeps one row per position of a sorted series.
#[must_use]
pub fn resolve_duplicates(series: &Series, policy: DuplicatePolicy) -> Series {
    let index = series.index();
    let rows: Vec<usize> = (0..index.len())
        .filter(|&i| match policy {
            DuplicatePolicy::KeepFirst => i == 0 || index[i - 1] != index[i],
            DuplicatePolicy::KeepLast => i + 1 == index.len() || index[i + 1] != index[i],
        })
        .collect();
    if rows.len() == index.len() {
        return series.clone();
    }
    series.select(&rows)
}

/// Preprocessing step sorting rows by position.
#[derive(Clone, Copy, Debug, Default)]
pub struct SortPositions;

impl Preprocessing for SortPositions {
    fn name(&self) -> &'static str {
        "sort positions"
    }

    fn process(&self, series: Series) -> Result<Series> {
        if is_sorted(series.index()) {
            return Ok(series);
        }
        log::debug!("Re-sorting {} rows by position", series.len());
        Ok(series.select(&sort_permutation(series.index())))
    }
}

/// Preprocessing step removing duplicated positions.
#[derive(Clone, Copy, Debug)]
pub struct ResolveDuplicates(pub DuplicatePolicy);

impl Preprocessing for ResolveDuplicates {
    fn name(&self) -> &'static str {
        "resolve duplicate positions"
    }

    fn process(&self, series: Series) -> Result<Series> {
        let sorted = SortPositions.process(series)?;
        Ok(resolve_duplicates(&sorted, self.0))
    }
}
