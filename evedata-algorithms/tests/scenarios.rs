use evedata_algorithms::{fill, map_monitors, Direction, FillMode, TimestampIndex};
use evedata_core::{
    DataKind, DeviceRole, MeasureData, Metadata, MetadataKind, Payload, ScanDescription, Section,
    Series, Value,
};

fn numbers(id: &str, section: Section, index: Vec<i64>, values: Vec<f64>) -> MeasureData {
    let kind = match section {
        Section::Monitor => DataKind::Monitor,
        Section::Timestamp => DataKind::Timestamp,
        _ => DataKind::StandardChannel,
    };
    let metadata = match section {
        Section::Monitor => MetadataKind::Monitor,
        Section::Timestamp => MetadataKind::Timestamp,
        _ => MetadataKind::StandardChannel { normalize_id: None },
    };
    MeasureData::new(
        id,
        section,
        kind,
        Metadata::builder(id, metadata).build(),
        Payload::loaded(Series::scalars(index, values.into_iter().map(Value::Number).collect()).unwrap()),
    )
}

#[test]
fn test_fill_is_repeatable_and_leaves_inputs_untouched() {
    let axis = numbers("mot", Section::Standard, vec![1, 3, 5], vec![1.0, 3.0, 5.0]);
    let chan = numbers("det", Section::Standard, vec![2, 3, 4], vec![2.0, 3.0, 4.0]);
    let before = axis.series().unwrap().clone();
    for mode in [FillMode::NoFill, FillMode::LastFill, FillMode::NaNFill, FillMode::LastNaNFill] {
        let first = fill(mode, &axis, &[&chan], None).unwrap();
        let second = fill(mode, &axis, &[&chan], None).unwrap();
        assert_eq!(first.positions, second.positions);
        let bits = |j: &evedata_algorithms::Joined| -> Vec<u64> {
            j.axis
                .flat()
                .iter()
                .chain(j.channels[0].flat())
                .filter_map(Value::as_f64)
                .map(f64::to_bits)
                .collect()
        };
        assert_eq!(bits(&first), bits(&second));
    }
    assert!(axis.series().unwrap().bit_eq(&before));
}

#[test]
fn test_monitors_onto_positions() {
    let timestamps = numbers("PosCountTimer", Section::Timestamp, vec![1, 2, 3], vec![0.0, 100.0, 250.0]);
    let index = TimestampIndex::new(&timestamps).unwrap();
    let motor = numbers("mot:rbv", Section::Monitor, vec![-1, 150], vec![0.5, 1.5]);
    let temp = numbers("temp", Section::Monitor, vec![-1, 150], vec![20.0, 21.0]);
    let scan = ScanDescription::new().with_role("mot:rbv", DeviceRole::Axis);
    let mapped = map_monitors([&motor, &temp], &index, Some(&scan), Direction::Previous, false);
    let motor_positions = mapped[0].1.as_ref().unwrap().index().unwrap().to_vec();
    let temp_positions = mapped[1].1.as_ref().unwrap().index().unwrap().to_vec();
    assert_eq!(motor_positions, vec![1, 3]);
    assert_eq!(temp_positions, vec![1, 2]);
    assert_eq!(motor.section(), Section::Monitor);
}
