//! Monitor datasets of `/device` and their mapping onto position counts.

use crate::config::ImportConfig;
use crate::devices::{describe, value_field, MSECS};
use evedata_algorithms::monitor::map_monitors;
use evedata_algorithms::timestamp::TimestampIndex;
use evedata_core::container::LeafItem;
use evedata_core::data::{DataKind, Importer, MeasureData, Payload};
use evedata_core::error::{Error, Result};
use evedata_core::file::File;
use evedata_core::metadata::MetadataKind;
use evedata_core::section::Section;

/// Maps one `/device/{id}` dataset, indexed by milliseconds since scan start.
///
/// # Errors
/// Returns [`Error::SchemaViolation`] if the dataset lacks the time column.
pub fn map_monitor(leaf: &LeafItem) -> Result<MeasureData> {
    if !leaf.fields().iter().any(|f| f == MSECS) {
        return Err(Error::schema(leaf.path(), format!("missing {MSECS} column")));
    }
    let id = leaf.name();
    let field = value_field(leaf)?;
    let importer = Importer::columns(leaf.reader().clone(), MSECS, &field);
    log::debug!("Mapped monitor {id}");
    Ok(MeasureData::new(
        id,
        Section::Monitor,
        DataKind::Monitor,
        describe(id, leaf.attributes(), MetadataKind::Monitor).build(),
        Payload::deferred(importer),
    ))
}

/// Collects a position indexed copy of every monitor in
/// [`File::device_data`]. The section maps stay untouched.
///
/// Monitors whose id is already taken by a standard device are left out.
///
/// # Errors
/// Returns an error if the position timestamps are unusable, or a monitor
/// fails in strict mode.
pub fn map_monitors_to_positions(file: &mut File, config: &ImportConfig) -> Result<()> {
    let index = TimestampIndex::new(file.timestamps()?)?;
    let results = map_monitors(
        file.monitors.values(),
        &index,
        file.scan.as_ref(),
        config.default_direction,
        config.parallel,
    );
    let mut added = 0_usize;
    for (id, result) in results {
        if file.standard.contains(&id) {
            log::warn!("Monitor {id} shares its id with a standard device, not mapped");
            continue;
        }
        match result {
            Ok(data) => {
                file.device_data.insert(id, data);
                added += 1;
            }
            Err(e) if config.strict => return Err(e),
            Err(e) => file.record_issue(id, e),
        }
    }
    log::info!("Mapped {added} monitor(s) onto position counts");
    Ok(())
}
