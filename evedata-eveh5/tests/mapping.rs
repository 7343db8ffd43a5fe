//! End-to-end mapping of in-memory eveH5 containers.

use evedata_core::container::{Attributes, Column, LeafData, Resource};
use evedata_core::data::DataKind;
use evedata_core::error::Error;
use evedata_core::memory::MemoryContainer;
use evedata_core::metadata::MetadataKind;
use evedata_core::scan::{ScanDescription, ScanModuleDescription};
use evedata_core::value::Value;
use evedata_eveh5::{ImportConfig, VersionMapperFactory};
use std::sync::atomic::Ordering;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn attrs(pairs: &[(&str, &str)]) -> Attributes {
    pairs.iter().map(|(k, v)| (*k, *v)).collect()
}

fn numbers(name: &str, positions: Vec<i64>, values: Vec<f64>) -> LeafData {
    LeafData::new()
        .with_column("PosCounter", Column::Int(positions))
        .with_column(name, Column::Float(values))
}

fn monitor(name: &str, msecs: Vec<i64>, values: Column) -> LeafData {
    LeafData::new()
        .with_column("mSecsSinceStart", Column::Int(msecs))
        .with_column(name, values)
}

fn axis(c: &mut MemoryContainer, name: &str, positions: Vec<i64>, values: Vec<f64>) {
    let access = format!("ca:{name}");
    c.add_leaf(
        &format!("/c1/main/{name}"),
        attrs(&[("DeviceType", "Axis"), ("Access", access.as_str()), ("Unit", "mm")]),
        numbers(name, positions, values),
    )
    .unwrap();
}

fn channel(c: &mut MemoryContainer, name: &str, positions: Vec<i64>, values: Vec<f64>) {
    let access = format!("ca:{name}");
    c.add_leaf(
        &format!("/c1/main/{name}"),
        attrs(&[
            ("DeviceType", "Channel"),
            ("Access", access.as_str()),
            ("Detectortype", "Standard"),
        ]),
        numbers(name, positions, values),
    )
    .unwrap();
}

/// Minimal valid container of the given schema version with `positions`
/// recorded 100 ms apart.
fn skeleton(version: &str, positions: Vec<i64>) -> MemoryContainer {
    let mut c = MemoryContainer::new(format!("v{version}.h5"));
    for (name, value) in [
        ("EVEH5Version", version),
        ("Version", "1.39"),
        ("XMLversion", "9.2"),
        ("Location", "TEST"),
        ("StartDate", "12.03.2024"),
        ("StartTime", "10:00:00"),
        ("Simulation", "no"),
    ] {
        c.set_attr("/", name, value).unwrap();
    }
    let timestamps = positions.iter().map(|p| p * 100).collect();
    c.add_leaf(
        "/c1/meta/PosCountTimer",
        attrs(&[("Unit", "msecs")]),
        LeafData::new()
            .with_column("PosCounter", Column::Int(positions))
            .with_column("PosCountTimer", Column::Int(timestamps)),
    )
    .unwrap();
    c.add_group("/c1/main").unwrap();
    c.add_group("/c1/snapshot").unwrap();
    c
}

fn basic(version: &str) -> MemoryContainer {
    let mut c = skeleton(version, vec![1, 2, 3]);
    axis(&mut c, "mot", vec![1, 3, 2, 2], vec![0.1, 0.3, 0.2, 0.25]);
    channel(&mut c, "det", vec![1, 2, 3], vec![10.0, 20.0, 30.0]);
    c.add_leaf(
        "/c1/snapshot/mot",
        attrs(&[("DeviceType", "Axis")]),
        numbers("mot", vec![1, 3], vec![0.0, 0.3]),
    )
    .unwrap();
    c.add_leaf(
        "/device/shutter",
        attrs(&[("Name", "Shutter")]),
        monitor("shutter", vec![-1, 150], Column::Text(vec!["closed".into(), "open".into()])),
    )
    .unwrap();
    c
}

fn map(
    c: MemoryContainer,
    config: &ImportConfig,
    scan: Option<ScanDescription>,
) -> evedata_core::Result<evedata_core::File> {
    init_logging();
    let resource = Resource::new(c);
    let factory = VersionMapperFactory::new();
    factory.get_mapper(&resource)?.map_with_scan(&resource, config, scan)
}

#[test]
fn test_all_versions_map_every_device_once() {
    for version in ["4", "5", "6", "7"] {
        let file = map(basic(version), &ImportConfig::default(), None).unwrap();
        assert_eq!(file.version.major().to_string(), version);
        let ids: Vec<&str> = file.standard.ids().collect();
        assert_eq!(ids.len(), 2, "version {version}");
        assert!(ids.contains(&"mot") && ids.contains(&"det"));
        assert!(file.snapshots.contains("mot"));
        assert!(file.monitors.contains("shutter"));
        assert!(file.import_errors.is_empty());
        assert_eq!(file.metadata.measurement_station, "TEST");

        let mot = file.standard.get("mot").unwrap();
        assert_eq!(mot.index().unwrap(), &[1, 2, 3]);
        // Repeated positions of an axis keep the last reading.
        assert_eq!(mot.series().unwrap().values().row(1).unwrap(), &[Value::Number(0.25)]);

        assert_eq!(file.scan_modules.len(), 1);
        assert_eq!(file.scan_modules[0].positions, vec![1, 2, 3]);
        assert_eq!(file.scan_modules[0].data.len(), 2);
    }
}

#[test]
fn test_repeated_positions_are_unique_after_repairs() {
    let mut c = skeleton("7", vec![1, 2, 2, 3]);
    axis(&mut c, "mot", vec![1, 2, 3], vec![0.1, 0.2, 0.3]);
    c.add_leaf(
        "/c1/snapshot/mot",
        attrs(&[("DeviceType", "Axis")]),
        numbers("mot", vec![3, 1, 3], vec![0.3, 0.0, 0.35]),
    )
    .unwrap();
    c.add_leaf(
        "/c1/snapshot/ring",
        attrs(&[("DeviceType", "Channel")]),
        numbers("ring", vec![1, 1], vec![299.0, 300.0]),
    )
    .unwrap();

    let file = map(c, &ImportConfig::default(), None).unwrap();
    let mot = file.snapshots.get("mot").unwrap();
    assert_eq!(mot.index().unwrap(), &[1, 3]);
    assert_eq!(mot.series().unwrap().values().row(1).unwrap(), &[Value::Number(0.35)]);
    let ring = file.snapshots.get("ring").unwrap();
    assert_eq!(ring.index().unwrap(), &[1]);
    assert_eq!(ring.series().unwrap().values().row(0).unwrap(), &[Value::Number(300.0)]);
    assert_eq!(file.timestamps().unwrap().index().unwrap(), &[1, 2, 3]);
}

#[test]
fn test_unsorted_positions_kept_when_repairs_are_off() {
    let config = ImportConfig {
        sort_positions: false,
        split_redefined_channels: false,
        ..ImportConfig::default()
    };
    let file = map(basic("7"), &config, None).unwrap();
    assert_eq!(file.standard.get("mot").unwrap().index().unwrap(), &[1, 3, 2, 2]);
}

#[test]
fn test_plain_channels_are_not_read_while_mapping() {
    let plain = basic("7");
    let reads = plain.read_counter();
    map(plain, &ImportConfig::default(), None).unwrap();
    let baseline = reads.load(Ordering::Relaxed);

    let mut extra = basic("7");
    channel(&mut extra, "det2", vec![1, 2, 3], vec![1.0, 2.0, 3.0]);
    let reads = extra.read_counter();
    let file = map(extra, &ImportConfig::default(), None).unwrap();
    assert_eq!(reads.load(Ordering::Relaxed), baseline);
    assert!(file.standard.contains("det2"));
}

#[test]
fn test_missing_snapshot_violates_v5() {
    let mut c = MemoryContainer::new("nosnap.h5");
    for (name, value) in [
        ("EVEH5Version", "5"),
        ("Version", "1.39"),
        ("XMLversion", "9.2"),
        ("Location", "TEST"),
        ("StartDate", "12.03.2024"),
        ("StartTime", "10:00:00"),
    ] {
        c.set_attr("/", name, value).unwrap();
    }
    c.add_leaf(
        "/c1/meta/PosCountTimer",
        Attributes::new(),
        LeafData::new()
            .with_column("PosCounter", Column::Int(vec![1]))
            .with_column("PosCountTimer", Column::Int(vec![0])),
    )
    .unwrap();
    c.add_group("/c1/main").unwrap();
    let mut v4 = c.clone();
    let err = map(c, &ImportConfig::default(), None).unwrap_err();
    assert!(matches!(err, Error::SchemaViolation { .. }), "{err}");

    v4.set_attr("/", "EVEH5Version", "4").unwrap();
    assert!(map(v4, &ImportConfig::default(), None).is_ok());
}

#[test]
fn test_unsupported_version() {
    let err = map(basic("3"), &ImportConfig::default(), None).unwrap_err();
    assert!(matches!(err, Error::UnsupportedVersion(ref v) if v == "3"));
}

#[test]
fn test_broken_device_is_isolated_unless_strict() {
    let mut c = basic("7");
    c.add_leaf(
        "/c1/main/broken",
        attrs(&[("DeviceType", "Channel")]),
        LeafData::new().with_column("PosCounter", Column::Int(vec![1])),
    )
    .unwrap();

    let file = map(c.clone(), &ImportConfig::default(), None).unwrap();
    assert!(!file.standard.contains("broken"));
    assert_eq!(file.import_errors.len(), 1);
    assert_eq!(file.import_errors[0].device, "broken");

    let strict = ImportConfig::default().with_strict(true);
    assert!(map(c, &strict, None).is_err());
}

#[test]
fn test_monitors_mapped_onto_positions() {
    let config = ImportConfig::default().with_map_monitors(true);
    let file = map(basic("7"), &config, None).unwrap();
    let shutter = file.device_data.get("shutter").unwrap();
    assert!(matches!(shutter.kind(), DataKind::Device { source } if source == "shutter"));
    assert_eq!(shutter.index().unwrap(), &[1]);
    assert_eq!(shutter.series().unwrap().values().row(0).unwrap(), &[Value::from("open")]);
    // Section maps only hold what the file recorded.
    let ids: Vec<&str> = file.standard.ids().collect();
    assert_eq!(ids.len(), 2);
    assert!(!file.standard.contains("shutter"));
    assert!(file.get("shutter").is_some_and(|m| matches!(m.kind(), DataKind::Monitor)));
    assert!(file.monitors.contains("shutter"));
}

#[test]
fn test_consistent_scan_modules() {
    let scan = ScanDescription::new()
        .with_module(ScanModuleDescription {
            id: 1,
            name: "outer".into(),
            axes: vec!["mot".into()],
            positions: vec![1, 3],
            ..ScanModuleDescription::default()
        })
        .with_module(ScanModuleDescription {
            id: 2,
            parent: 1,
            name: "inner".into(),
            channels: vec!["det".into()],
            positions: vec![2],
            ..ScanModuleDescription::default()
        });
    let file = map(basic("7"), &ImportConfig::default(), Some(scan)).unwrap();
    assert_eq!(file.scan_modules.len(), 2);
    let inner = file.scan_module(2).unwrap();
    assert_eq!(inner.device_ids().collect::<Vec<_>>(), vec!["det"]);
    assert_eq!(inner.data.get("det").unwrap().index().unwrap(), &[2]);
    let outer = file.scan_module(1).unwrap();
    assert_eq!(outer.data.get("mot").unwrap().index().unwrap(), &[1, 3]);
}

#[test]
fn test_inconsistent_scan_modules_are_reset() {
    let scan = ScanDescription::new().with_module(ScanModuleDescription {
        id: 1,
        name: "partial".into(),
        axes: vec!["mot".into()],
        positions: vec![1, 2],
        ..ScanModuleDescription::default()
    });
    let file = map(basic("7"), &ImportConfig::default(), Some(scan)).unwrap();
    assert_eq!(file.scan_modules.len(), 1);
    assert_eq!(file.scan_modules[0].name, "main");
    assert_eq!(file.scan_modules[0].positions, vec![1, 2, 3]);
}

fn mpskip() -> MemoryContainer {
    let positions = vec![2, 3, 4, 7, 8, 9];
    let mut c = skeleton("7", vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    axis(&mut c, "Counter-mot", positions.clone(), vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
    channel(&mut c, "det", positions.clone(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    channel(&mut c, "MPSKIP:scan1skipcountchan1", vec![2, 7], vec![3.0, 3.0]);
    channel(&mut c, "MPSKIP:scan1counterchan1", positions, vec![1.0; 6]);
    c.add_leaf(
        "/c1/snapshot/MPSKIP:scan1skipcountchan1",
        Attributes::new(),
        numbers("MPSKIP:scan1skipcountchan1", vec![1], vec![3.0]),
    )
    .unwrap();
    c.add_leaf(
        "/device/MPSKIP:scan1detector",
        Attributes::new(),
        monitor("MPSKIP:scan1detector", vec![-1], Column::Text(vec!["det".into()])),
    )
    .unwrap();
    for (name, value) in [("limit", 0.5), ("maxdev", 2.0), ("skipcount", 3.0)] {
        let name = format!("MPSKIP:scan1{name}");
        c.add_leaf(
            &format!("/device/{name}"),
            Attributes::new(),
            monitor(&name, vec![-1, 10], Column::Float(vec![0.0, value])),
        )
        .unwrap();
    }
    c
}

#[test]
fn test_mpskip_without_scan_description() {
    let file = map(mpskip(), &ImportConfig::default(), None).unwrap();
    let ids: Vec<&str> = file.standard.ids().collect();
    assert!(ids.contains(&"MPSKIP:scan1"));
    assert!(ids.contains(&"det"));
    assert!(!ids.iter().any(|id| *id == "Counter-mot" || id.ends_with("chan1")));
    assert!(file.monitors.is_empty());
    assert!(file.snapshots.is_empty());

    let skip = file.standard.get("MPSKIP:scan1").unwrap();
    assert!(matches!(skip.kind(), DataKind::Skip));
    assert_eq!(skip.index().unwrap(), &[2, 3, 4, 7, 8, 9]);
    let MetadataKind::Skip { settings, channel } = skip.metadata().kind() else {
        panic!("not an MPSKIP device");
    };
    assert_eq!(channel, "det");
    assert_eq!(settings.n_averages, 3);
    assert!((settings.low_limit - 0.5).abs() < f64::EPSILON);
    assert!((settings.max_deviation - 2.0).abs() < f64::EPSILON);
    // Without scan description the number of attempts is unknown.
    assert_eq!(settings.max_attempts, 0);
    // Only the missing reset monitor is reported, and only as a warning.
    assert!(file.import_errors.is_empty());

    assert_eq!(file.scan_modules.len(), 1);
    assert!(file.scan_modules[0].data.contains("MPSKIP:scan1"));
}

#[test]
fn test_mpskip_modules_regroup_channels() {
    let module = |id: u32, positions: Vec<i64>| ScanModuleDescription {
        id,
        name: format!("skip {id}"),
        axes: vec!["Counter-mot".into()],
        channels: vec!["MPSKIP:scan1chan1".into(), "det".into()],
        positions,
        ..ScanModuleDescription::default()
    };
    let scan = ScanDescription::new()
        .with_module(module(2, vec![2, 3, 4]))
        .with_module(module(5, vec![7, 8, 9]))
        .with_set_values(
            "Counter-mot",
            vec![Value::from(1_i64), Value::from(2_i64), Value::from(3_i64)],
        );
    let file = map(mpskip(), &ImportConfig::default(), Some(scan)).unwrap();

    let skip = file.standard.get("MPSKIP:scan1").unwrap();
    let MetadataKind::Skip { settings, .. } = skip.metadata().kind() else {
        panic!("not an MPSKIP device");
    };
    assert_eq!(settings.max_attempts, 3);

    assert_eq!(file.scan_modules.len(), 2);
    for (id, run, loop_index) in [(2, vec![2, 3, 4], 1), (5, vec![7, 8, 9], 6)] {
        let module = file.scan_module(id).unwrap();
        assert_eq!(module.positions, run);
        assert_eq!(module.data.get("MPSKIP:scan1").unwrap().index().unwrap(), run.as_slice());
        let det = module.data.get("det").unwrap();
        assert!(matches!(det.kind(), DataKind::AverageChannel));
        assert_eq!(det.index().unwrap(), &[loop_index]);
        assert_eq!(det.series().unwrap().total_values(), 3);
    }
}
