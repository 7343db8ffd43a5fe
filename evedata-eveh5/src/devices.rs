//! Generic axes, detector channels, snapshots and position timestamps.
//!
//! Every dataset of `/c1/main` not claimed by a special device mapper is
//! classified here by its `DeviceType` and `Detectortype` attributes.
//! Average and interval channels pick up their settings from the auxiliary
//! groups; channels redefined between scan modules are split.

use crate::inventory::AuxGroups;
use crate::mapper::MapContext;
use evedata_algorithms::preprocess::SelectPositions;
use evedata_algorithms::sorting::DuplicatePolicy;
use evedata_algorithms::split::{plan_split, AuxiliaryPositions, SegmentKind};
use evedata_core::container::{AttrValue, Attributes, FieldType, GroupItem, LeafItem};
use evedata_core::data::{DataKind, Importer, MeasureData, Payload};
use evedata_core::error::{Error, Result};
use evedata_core::metadata::{AverageSettings, DeviceInfo, Metadata, MetadataBuilder, MetadataKind};
use evedata_core::section::Section;
use evedata_core::value::Value;
use std::sync::Arc;

/// Index column of every position indexed dataset.
pub const POS_COUNTER: &str = "PosCounter";

/// Index column of monitor datasets.
pub const MSECS: &str = "mSecsSinceStart";

const TIMESTAMP_GROUP: &str = "meta";
const TIMESTAMP_DATASET: &str = "PosCountTimer";

/// Value field of a dataset: the field named like the dataset, else the
/// first non-index field.
///
/// # Errors
/// Returns [`Error::SchemaViolation`] if the dataset has no value field.
pub fn value_field(leaf: &LeafItem) -> Result<String> {
    let fields = leaf.fields();
    if fields.iter().any(|f| f == leaf.name()) {
        return Ok(leaf.name().to_string());
    }
    fields
        .iter()
        .find(|f| *f != POS_COUNTER && *f != MSECS)
        .cloned()
        .ok_or_else(|| Error::schema(leaf.path(), "no value field"))
}

/// Metadata builder carrying name, unit and device capability from the
/// dataset attributes.
pub fn describe(id: &str, attributes: &Attributes, kind: MetadataKind) -> MetadataBuilder {
    let name = attributes.text("Name").unwrap_or_else(|| id.to_string());
    let mut builder = Metadata::builder(name, kind);
    if let Some(unit) = attributes.text("Unit") {
        builder = builder.with_unit(unit);
    }
    if let Some(access) = attributes.text("Access") {
        builder = builder.with_device(DeviceInfo::from_access(id, &access));
    }
    builder
}

/// Importer for the index column and one value field of a dataset.
#[must_use]
pub fn column_importer(leaf: &LeafItem, field: &str) -> Importer {
    Importer::columns(leaf.reader().clone(), POS_COUNTER, field)
}

/// Position index of a dataset, read now.
///
/// # Errors
/// Propagates read errors; a missing or non-integer index is a schema violation.
pub fn read_index(leaf: &LeafItem) -> Result<Vec<i64>> {
    let mut data = leaf.load()?;
    data.take_column(POS_COUNTER)
        .and_then(|c| c.to_i64())
        .ok_or_else(|| Error::schema(leaf.path(), "missing or non-integer position column"))
}

/// First value of `field`, optionally restricted to a set of positions.
///
/// # Errors
/// Propagates read errors.
pub fn first_value(leaf: &LeafItem, field: &str, positions: Option<&[i64]>) -> Result<Option<Value>> {
    let series = column_importer(leaf, field).import()?;
    let value = series
        .iter()
        .find(|(p, _)| positions.is_none_or(|set| set.contains(p)))
        .and_then(|(_, row)| row.first().cloned());
    Ok(value)
}

fn first_number(leaf: Option<&LeafItem>, field: &str, positions: Option<&[i64]>) -> Result<Option<f64>> {
    match leaf {
        Some(leaf) => Ok(first_value(leaf, field, positions)?.and_then(|v| v.as_f64())),
        None => Ok(None),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn as_count(value: Option<f64>) -> i64 {
    value.map_or(0, |v| v.round() as i64)
}

fn is_numeric(leaf: &LeafItem, field: &str) -> bool {
    leaf.field_type(field).is_none_or(FieldType::is_numeric)
}

/// Maps `/c1/meta/PosCountTimer` to the position timestamp series.
///
/// A position recorded twice keeps its last timestamp.
///
/// # Errors
/// Returns [`Error::SchemaViolation`] if the dataset is missing.
pub fn map_timestamps(c1: &GroupItem, ctx: &MapContext<'_>) -> Result<MeasureData> {
    let leaf = c1
        .group(TIMESTAMP_GROUP)
        .and_then(|meta| meta.leaf(TIMESTAMP_DATASET))
        .ok_or_else(|| Error::schema(c1.path(), "missing meta/PosCountTimer"))?;
    let unit = leaf
        .attributes()
        .text("Unit")
        .unwrap_or_else(|| "msecs".to_string());
    let metadata = Metadata::builder(TIMESTAMP_DATASET, MetadataKind::Timestamp)
        .with_unit(unit)
        .build();
    let importer = ctx.repair(column_importer(leaf, TIMESTAMP_DATASET), DuplicatePolicy::KeepLast);
    Ok(MeasureData::new(
        TIMESTAMP_DATASET,
        Section::Timestamp,
        DataKind::Timestamp,
        metadata,
        Payload::deferred(importer),
    ))
}

/// Maps an axis dataset of the main or snapshot section.
///
/// # Errors
/// Returns an error if the dataset has no value field.
pub fn map_axis(leaf: &LeafItem, section: Section, ctx: &MapContext<'_>) -> Result<MeasureData> {
    let id = leaf.name();
    let field = value_field(leaf)?;
    let deadband = leaf.attributes().get("Deadband").and_then(AttrValue::as_f64);
    let metadata = describe(id, leaf.attributes(), MetadataKind::Axis { deadband }).build();
    let importer = ctx.repair(column_importer(leaf, &field), DuplicatePolicy::KeepLast);
    let set_values = ctx
        .scan
        .and_then(|scan| scan.set_values(id))
        .map(<[Value]>::to_vec);
    log::debug!("Mapped axis {id} ({section})");
    Ok(MeasureData::new(
        id,
        section,
        DataKind::Axis { set_values },
        metadata,
        Payload::deferred(importer),
    ))
}

/// Maps a snapshot dataset; `DeviceType` decides between axis and channel.
///
/// # Errors
/// Returns an error if the dataset has no value field.
pub fn map_snapshot(leaf: &LeafItem, ctx: &MapContext<'_>) -> Result<MeasureData> {
    if leaf.attributes().text("DeviceType").as_deref() == Some("Axis") {
        return map_axis(leaf, Section::Snapshot, ctx);
    }
    let id = leaf.name();
    let field = value_field(leaf)?;
    let (kind, metadata_kind) = if is_numeric(leaf, &field) {
        (
            DataKind::StandardChannel,
            MetadataKind::StandardChannel { normalize_id: None },
        )
    } else {
        (DataKind::NonnumericChannel, MetadataKind::NonnumericChannel)
    };
    let importer = ctx.repair(column_importer(leaf, &field), DuplicatePolicy::KeepLast);
    Ok(MeasureData::new(
        id,
        Section::Snapshot,
        kind,
        describe(id, leaf.attributes(), metadata_kind).build(),
        Payload::deferred(importer),
    ))
}

/// Outcome of mapping one channel dataset.
#[derive(Debug, Default)]
pub struct ChannelMapping {
    /// One device, or one per segment of a split channel.
    pub data: Vec<MeasureData>,
    /// Reported problem that did not prevent the mapping.
    pub issue: Option<Error>,
}

fn declared_kind(attributes: &Attributes) -> SegmentKind {
    match attributes.text("Detectortype").as_deref() {
        Some("Average") => SegmentKind::Average,
        Some("Interval") => SegmentKind::Interval,
        _ => SegmentKind::Standard,
    }
}

/// Channel dataset plus the auxiliary datasets describing it.
struct ChannelSource<'a> {
    leaf: &'a LeafItem,
    id: &'a str,
    payload: Payload,
    normalized: Option<(&'a LeafItem, String)>,
    aux: AuxGroups<'a>,
}

impl ChannelSource<'_> {
    fn option_payload(
        &self,
        leaf: &LeafItem,
        field: &str,
        positions: Option<&[i64]>,
        ctx: &MapContext<'_>,
    ) -> Payload {
        let mut importer = ctx.repair(column_importer(leaf, field), DuplicatePolicy::KeepFirst);
        if let Some(positions) = positions {
            importer = importer.with_step(Arc::new(SelectPositions::new(positions.iter().copied())));
        }
        Payload::deferred(importer)
    }

    fn average_settings(&self, positions: Option<&[i64]>) -> Result<AverageSettings> {
        let count = self.aux.average(self.id, "AverageCount");
        let attempts = self.aux.average(self.id, "Attempts");
        let limits = self.aux.average(self.id, "Limit-MaxDev");
        Ok(AverageSettings {
            n_averages: as_count(first_number(count, "Preset", positions)?),
            low_limit: first_number(limits, "Limit", positions)?.unwrap_or_default(),
            max_attempts: as_count(first_number(attempts, "MaxAttempts", positions)?),
            max_deviation: first_number(limits, "maxDeviation", positions)?.unwrap_or_default(),
        })
    }

    /// Builds the device for one flavour; `positions` restricts a segment.
    fn build(
        &self,
        id: &str,
        kind: SegmentKind,
        payload: Payload,
        positions: Option<&[i64]>,
        ctx: &MapContext<'_>,
    ) -> Result<MeasureData> {
        let normalize_id = self.normalized.as_ref().map(|(_, n)| n.clone());
        let mut options: Vec<(&str, Payload)> = Vec::new();
        let (data_kind, metadata_kind) = match kind {
            SegmentKind::Standard => (DataKind::StandardChannel, MetadataKind::StandardChannel { normalize_id }),
            SegmentKind::Average => {
                let settings = self.average_settings(positions)?;
                if let Some(leaf) = self.aux.average(self.id, "AverageCount") {
                    options.push(("average_count", self.option_payload(leaf, "AverageCount", positions, ctx)));
                }
                if let Some(leaf) = self.aux.average(self.id, "Attempts") {
                    options.push(("attempts", self.option_payload(leaf, "Attempts", positions, ctx)));
                }
                (
                    DataKind::AverageChannel,
                    MetadataKind::AverageChannel { settings, normalize_id },
                )
            }
            SegmentKind::Interval => {
                let spread = self.aux.interval(self.id, "TrigIntv-StdDev");
                let trigger_interval = first_number(spread, "TriggerIntv", positions)?.unwrap_or_default();
                if let Some(leaf) = self.aux.interval(self.id, "Count") {
                    options.push(("counts", self.option_payload(leaf, "Count", positions, ctx)));
                }
                if let Some(leaf) = spread {
                    options.push(("std", self.option_payload(leaf, "StandardDeviation", positions, ctx)));
                }
                (
                    DataKind::IntervalChannel,
                    MetadataKind::IntervalChannel {
                        trigger_interval,
                        normalize_id,
                    },
                )
            }
        };
        if let Some((leaf, _)) = &self.normalized {
            let field = value_field(leaf)?;
            options.push(("normalized", self.option_payload(leaf, &field, positions, ctx)));
        }
        let metadata = describe(self.id, self.leaf.attributes(), metadata_kind).build();
        let mut data = MeasureData::new(id, Section::Standard, data_kind, metadata, payload);
        for (name, payload) in options {
            data = data.with_option(name, payload);
        }
        log::debug!("Mapped {kind} channel {id}");
        Ok(data)
    }
}

/// Maps a channel dataset of the main section.
///
/// Without auxiliary groups (or with splitting disabled) one device results,
/// its flavour taken from `Detectortype`. Otherwise the auxiliary positions
/// decide; a channel spanning several flavours becomes one device per
/// segment. An undecidable split keeps the device whole and flags it
/// degraded.
///
/// # Errors
/// Returns an error if the dataset or its auxiliary metadata cannot be read.
pub fn map_channel(leaf: &LeafItem, ctx: &MapContext<'_>) -> Result<ChannelMapping> {
    let id = leaf.name();
    let field = value_field(leaf)?;
    if !is_numeric(leaf, &field) {
        let importer = ctx.repair(column_importer(leaf, &field), DuplicatePolicy::KeepFirst);
        let data = MeasureData::new(
            id,
            Section::Standard,
            DataKind::NonnumericChannel,
            describe(id, leaf.attributes(), MetadataKind::NonnumericChannel).build(),
            Payload::deferred(importer),
        );
        return Ok(ChannelMapping {
            data: vec![data],
            issue: None,
        });
    }

    let importer = ctx.repair(column_importer(leaf, &field), DuplicatePolicy::KeepFirst);
    let source = ChannelSource {
        leaf,
        id,
        payload: Payload::deferred(importer),
        normalized: ctx.aux.normalized(id),
        aux: ctx.aux,
    };
    let declared = declared_kind(leaf.attributes());
    let average = ctx.aux.average(id, "AverageCount");
    let interval = ctx
        .aux
        .interval(id, "Count")
        .or_else(|| ctx.aux.interval(id, "TrigIntv-StdDev"));

    if !ctx.splits() || (average.is_none() && interval.is_none()) {
        let data = source.build(id, declared, source.payload.clone(), None, ctx)?;
        return Ok(ChannelMapping {
            data: vec![data],
            issue: None,
        });
    }

    let positions = source.payload.get(id)?.index().to_vec();
    let aux = AuxiliaryPositions {
        average: average.map(read_index).transpose()?,
        interval: interval.map(read_index).transpose()?,
    };
    match plan_split(id, &positions, &aux, ctx.scan) {
        Ok(segments) if segments.len() > 1 => {
            log::info!("Splitting redefined channel {id} into {} devices", segments.len());
            let mut data = Vec::with_capacity(segments.len());
            for segment in &segments {
                let payload = segment.select(&source.payload)?;
                data.push(source.build(&segment.id, segment.kind, payload, Some(&segment.positions), ctx)?);
            }
            Ok(ChannelMapping { data, issue: None })
        }
        Ok(segments) => {
            let kind = segments.first().map_or(declared, |s| s.kind);
            let data = source.build(id, kind, source.payload.clone(), None, ctx)?;
            Ok(ChannelMapping {
                data: vec![data],
                issue: None,
            })
        }
        Err(e @ Error::AmbiguousMapping { .. }) => {
            log::warn!("{e}; keeping {id} unsplit");
            let data = source
                .build(id, declared, source.payload.clone(), None, ctx)?
                .into_degraded();
            Ok(ChannelMapping {
                data: vec![data],
                issue: Some(e),
            })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportConfig;
    use crate::mapper::MapperProfile;
    use approx::assert_relative_eq;
    use evedata_core::container::{Column, LeafData, Resource};
    use evedata_core::memory::MemoryContainer;
    use evedata_core::metadata::MetadataKind;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs.iter().copied().collect()
    }

    fn numbers(name: &str, positions: Vec<i64>, values: Vec<f64>) -> LeafData {
        LeafData::new()
            .with_column(POS_COUNTER, Column::Int(positions))
            .with_column(name, Column::Float(values))
    }

    fn channel_attrs(name: &str, detector: &str) -> Attributes {
        let access = format!("ca:{name}");
        attrs(&[
            ("DeviceType", "Channel"),
            ("Access", access.as_str()),
            ("Name", name),
            ("Unit", "mA"),
            ("Detectortype", detector),
        ])
    }

    fn average_fixture(c: &mut MemoryContainer, name: &str, positions: Vec<i64>) {
        let n = positions.len();
        c.add_leaf(
            &format!("/c1/main/averagemeta/{name}__AverageCount"),
            Attributes::new(),
            LeafData::new()
                .with_column(POS_COUNTER, Column::Int(positions.clone()))
                .with_column("AverageCount", Column::Int(vec![3; n]))
                .with_column("Preset", Column::Int(vec![3; n])),
        )
        .unwrap();
        c.add_leaf(
            &format!("/c1/main/averagemeta/{name}__Attempts"),
            Attributes::new(),
            LeafData::new()
                .with_column(POS_COUNTER, Column::Int(positions.clone()))
                .with_column("Attempts", Column::Int(vec![1; n]))
                .with_column("MaxAttempts", Column::Int(vec![4; n])),
        )
        .unwrap();
        c.add_leaf(
            &format!("/c1/main/averagemeta/{name}__Limit-MaxDev"),
            Attributes::new(),
            LeafData::new()
                .with_column(POS_COUNTER, Column::Int(positions))
                .with_column("Limit", Column::Float(vec![21.42; n]))
                .with_column("maxDeviation", Column::Float(vec![0.21; n])),
        )
        .unwrap();
    }

    fn map_main(c: MemoryContainer, name: &str) -> Result<ChannelMapping> {
        let root = Resource::new(c).root()?;
        let main = root.find_group("c1/main");
        let config = ImportConfig::default();
        let profile = MapperProfile::for_version(7);
        let ctx = MapContext::new(&config, &profile, None, AuxGroups::of(main));
        let leaf = main.and_then(|m| m.leaf(name)).ok_or_else(|| Error::MissingItem(name.into()))?;
        map_channel(leaf, &ctx)
    }

    #[test]
    fn test_average_channel_settings() {
        let name = "mlsCurrent:Mnt1chan1";
        let mut c = MemoryContainer::new("avg.h5");
        c.add_leaf(
            &format!("/c1/main/{name}"),
            channel_attrs(name, "Standard"),
            numbers(name, vec![2, 5], vec![42.0, 42.0]),
        )
        .unwrap();
        average_fixture(&mut c, name, vec![2, 5]);
        let mapping = map_main(c, name).unwrap();
        assert_eq!(mapping.data.len(), 1);
        let data = &mapping.data[0];
        assert!(matches!(data.kind(), DataKind::AverageChannel));
        let MetadataKind::AverageChannel { settings, .. } = data.metadata().kind() else {
            panic!("not an average channel");
        };
        assert_eq!(settings.n_averages, 3);
        assert_eq!(settings.max_attempts, 4);
        assert_relative_eq!(settings.low_limit, 21.42);
        assert_relative_eq!(settings.max_deviation, 0.21);
        assert_eq!(data.option("attempts").unwrap().unwrap().index(), &[2, 5]);
        assert_eq!(data.metadata().device().unwrap().pv, name);
    }

    #[test]
    fn test_interval_channel() {
        let name = "mlsCurrent:Mnt1chan1";
        let mut c = MemoryContainer::new("interval.h5");
        c.add_leaf(
            &format!("/c1/main/{name}"),
            channel_attrs(name, "Interval"),
            numbers(name, vec![2, 5], vec![42.0, 42.0]),
        )
        .unwrap();
        c.add_leaf(
            &format!("/c1/main/standarddev/{name}__Count"),
            Attributes::new(),
            numbers("Count", vec![2, 5], vec![42.0, 42.0]),
        )
        .unwrap();
        c.add_leaf(
            &format!("/c1/main/standarddev/{name}__TrigIntv-StdDev"),
            Attributes::new(),
            LeafData::new()
                .with_column(POS_COUNTER, Column::Int(vec![2, 5]))
                .with_column("TriggerIntv", Column::Float(vec![0.1, 0.1]))
                .with_column("StandardDeviation", Column::Float(vec![42.21, 42.21])),
        )
        .unwrap();
        let mapping = map_main(c, name).unwrap();
        let data = &mapping.data[0];
        assert!(matches!(data.kind(), DataKind::IntervalChannel));
        let MetadataKind::IntervalChannel { trigger_interval, .. } = data.metadata().kind() else {
            panic!("not an interval channel");
        };
        assert_relative_eq!(*trigger_interval, 0.1);
        let std = data.option("std").unwrap().unwrap();
        assert_relative_eq!(std.first_numbers().unwrap()[0], 42.21);
        assert!(data.option("counts").unwrap().is_some());
    }

    #[test]
    fn test_redefined_channel_is_split() {
        let name = "det";
        let mut c = MemoryContainer::new("split.h5");
        c.add_leaf(
            &format!("/c1/main/{name}"),
            channel_attrs(name, "Standard"),
            numbers(name, vec![1, 2, 3, 4], vec![1.0, 2.0, 3.0, 4.0]),
        )
        .unwrap();
        average_fixture(&mut c, name, vec![3, 4]);
        let mapping = map_main(c, name).unwrap();
        let ids: Vec<&str> = mapping.data.iter().map(MeasureData::id).collect();
        assert_eq!(ids, vec!["det_1", "det_2"]);
        assert!(matches!(mapping.data[0].kind(), DataKind::StandardChannel));
        assert!(matches!(mapping.data[1].kind(), DataKind::AverageChannel));
        assert_eq!(mapping.data[1].index().unwrap(), &[3, 4]);
        let total: usize = mapping
            .data
            .iter()
            .map(|d| d.series().unwrap().total_values())
            .sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_ambiguous_split_is_degraded() {
        let name = "det";
        let mut c = MemoryContainer::new("ambiguous.h5");
        c.add_leaf(
            &format!("/c1/main/{name}"),
            channel_attrs(name, "Average"),
            numbers(name, vec![1, 2], vec![1.0, 2.0]),
        )
        .unwrap();
        average_fixture(&mut c, name, vec![2, 9]);
        let mapping = map_main(c, name).unwrap();
        assert_eq!(mapping.data.len(), 1);
        assert!(mapping.data[0].is_degraded());
        assert!(matches!(mapping.issue, Some(Error::AmbiguousMapping { .. })));
    }

    #[test]
    fn test_nonnumeric_and_normalized_channels() {
        let mut c = MemoryContainer::new("misc.h5");
        c.add_leaf(
            "/c1/main/wftest:filenamechan1",
            channel_attrs("wftest:filenamechan1", "Standard"),
            LeafData::new()
                .with_column(POS_COUNTER, Column::Int(vec![2]))
                .with_column("wftest:filenamechan1", Column::Text(vec!["a.txt".into()])),
        )
        .unwrap();
        let name = "K0617:gw24126chan1";
        c.add_leaf(
            &format!("/c1/main/{name}"),
            channel_attrs(name, "Standard"),
            numbers(name, vec![2, 5], vec![1.0, 2.0]),
        )
        .unwrap();
        c.add_leaf(
            &format!("/c1/main/normalized/{name}__A2980:gw24103chan1"),
            attrs(&[("channel", name), ("normalizeId", "A2980:gw24103chan1")]),
            numbers(name, vec![2, 5], vec![0.5, 1.0]),
        )
        .unwrap();
        let root = Resource::new(c).root().unwrap();
        let main = root.find_group("c1/main");
        let config = ImportConfig::default();
        let profile = MapperProfile::for_version(7);
        let ctx = MapContext::new(&config, &profile, None, AuxGroups::of(main));

        let text = map_channel(main.unwrap().leaf("wftest:filenamechan1").unwrap(), &ctx).unwrap();
        assert!(matches!(text.data[0].kind(), DataKind::NonnumericChannel));

        let normalized = map_channel(main.unwrap().leaf(name).unwrap(), &ctx).unwrap();
        let data = &normalized.data[0];
        assert_eq!(data.metadata().kind().normalize_id(), Some("A2980:gw24103chan1"));
        assert!(data.option("normalized").unwrap().is_some());
    }

    #[test]
    fn test_timestamps_and_snapshot_axis() {
        let mut c = MemoryContainer::new("meta.h5");
        c.add_leaf(
            "/c1/meta/PosCountTimer",
            attrs(&[("Unit", "msecs")]),
            LeafData::new()
                .with_column(POS_COUNTER, Column::Int(vec![2, 1, 2]))
                .with_column("PosCountTimer", Column::Int(vec![100, 0, 120])),
        )
        .unwrap();
        c.add_leaf(
            "/c1/snapshot/SimMt:testrack01000",
            attrs(&[("DeviceType", "Axis"), ("Access", "ca:SimMt:testrack01000"), ("Unit", "degrees")]),
            numbers("SimMt:testrack01000", vec![5, 2], vec![42.0, 41.0]),
        )
        .unwrap();
        let root = Resource::new(c).root().unwrap();
        let c1 = root.group("c1").unwrap();
        let config = ImportConfig::default();
        let profile = MapperProfile::for_version(7);
        let ctx = MapContext::new(&config, &profile, None, AuxGroups::default());
        let timestamps = map_timestamps(c1, &ctx).unwrap();
        assert_eq!(timestamps.metadata().unit(), "msecs");
        assert!(timestamps.metadata().device().is_none());
        assert_eq!(timestamps.index().unwrap(), &[1, 2]);
        assert_eq!(timestamps.series().unwrap().values().row(1).unwrap(), &[Value::Number(120.0)]);

        let axis = map_snapshot(c1.find_group("snapshot").unwrap().leaf("SimMt:testrack01000").unwrap(), &ctx).unwrap();
        assert_eq!(axis.section(), Section::Snapshot);
        assert!(axis.kind().is_axis());
        assert_eq!(axis.index().unwrap(), &[2, 5]);
        assert_eq!(axis.metadata().unit(), "degrees");
    }

    #[test]
    fn test_first_value_restricted_to_positions() {
        let mut c = MemoryContainer::new("first.h5");
        c.add_leaf(
            "/c1/main/averagemeta/det__Limit-MaxDev",
            Attributes::new(),
            LeafData::new()
                .with_column(POS_COUNTER, Column::Int(vec![2, 4, 6]))
                .with_column("Limit", Column::Float(vec![1.0, 2.0, 3.0])),
        )
        .unwrap();
        let root = Resource::new(c).root().unwrap();
        let leaf = root.find_group("c1/main/averagemeta").unwrap().leaf("det__Limit-MaxDev").unwrap();
        assert_eq!(first_value(leaf, "Limit", None).unwrap(), Some(Value::Number(1.0)));
        assert_eq!(first_value(leaf, "Limit", Some(&[5, 6][..])).unwrap(), Some(Value::Number(3.0)));
        assert_eq!(first_value(leaf, "Limit", Some(&[7][..])).unwrap(), None);
    }
}
