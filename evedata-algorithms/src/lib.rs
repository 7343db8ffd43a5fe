//! evedata-algorithms: Repair passes and transforms for eveH5 data.
//!
//! This crate provides the algorithms applied to imported device series:
//! - **Sorting** - stable position sort and duplicate resolution
//! - **Split** - channel-redefinition segments from auxiliary groups
//! - **Preprocessing** - position selection and MPSKIP rearrangement
//! - **Timestamp** - position lookup for monitor timestamps
//! - **Monitor** - re-indexing of monitors onto position counts
//! - **Fill** - joining axes and channels in four fill modes
//!
#![warn(missing_docs)]

pub mod fill;
pub mod monitor;
pub mod preprocess;
pub mod sorting;
pub mod split;
pub mod timestamp;

pub use fill::{fill, FillMode, Joined};
pub use monitor::{collapse, direction_for, map_monitor, map_monitors};
pub use preprocess::{RearrangeRawValues, SelectPositions};
pub use sorting::{
    is_sorted, resolve_duplicates, sort_by_position, DuplicatePolicy, ResolveDuplicates,
    SortPositions,
};
pub use split::{plan_split, AuxiliaryPositions, Segment, SegmentKind};
pub use timestamp::{Direction, TimestampIndex, TimestampQuery, BEFORE_START};
