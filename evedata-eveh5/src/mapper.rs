//! Version mappers.
//!
//! All registered schema revisions share one physical layout and differ in
//! the attributes they guarantee. A [`MapperProfile`] records those
//! differences; [`EveH5Mapper`] runs the common mapping routine for a
//! profile.

use crate::camera::{map_sample_cameras, map_scientific_cameras};
use crate::config::ImportConfig;
use crate::devices::{map_axis, map_channel, map_snapshot, map_timestamps, ChannelMapping};
use crate::file_metadata::{map_file_metadata, map_log_messages};
use crate::inventory::{AuxGroups, Inventory};
use crate::mca::map_mca;
use crate::modules::assemble_scan_modules;
use crate::monitors::{map_monitor, map_monitors_to_positions};
use crate::mpskip::map_mpskip;
use crate::version::read_version;
use evedata_algorithms::sorting::{DuplicatePolicy, ResolveDuplicates};
use evedata_core::container::{LeafItem, Resource};
use evedata_core::data::{Importer, MeasureData};
use evedata_core::error::{Error, Result};
use evedata_core::file::{File, ImportIssue};
use evedata_core::scan::ScanDescription;
use evedata_core::section::Section;
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;

const CHAIN_GROUP: &str = "c1";
const MAIN_GROUP: &str = "main";
const SNAPSHOT_GROUP: &str = "snapshot";
const MONITOR_GROUP: &str = "device";

/// What a schema revision guarantees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapperProfile {
    /// Major schema version.
    pub version: u32,
    /// `/c1/snapshot` must exist (v5 and later).
    pub snapshot_required: bool,
    /// `StartTimeISO`/`EndTimeISO` on `c1` (v6 and later).
    pub iso_times: bool,
    /// `Simulation` root attribute (v7 and later).
    pub simulation_flag: bool,
    /// Stores one physical dataset per device and needs the legacy repairs.
    pub repairs: bool,
}

impl MapperProfile {
    #[must_use]
    pub fn for_version(version: u32) -> Self {
        Self {
            version,
            snapshot_required: version >= 5,
            iso_times: version >= 6,
            simulation_flag: version >= 7,
            repairs: true,
        }
    }

    #[must_use]
    pub fn with_repairs(mut self, repairs: bool) -> Self {
        self.repairs = repairs;
        self
    }
}

/// Shared state of one mapping run.
#[derive(Clone, Copy, Debug)]
pub struct MapContext<'a> {
    pub config: &'a ImportConfig,
    pub profile: &'a MapperProfile,
    pub scan: Option<&'a ScanDescription>,
    pub aux: AuxGroups<'a>,
}

impl<'a> MapContext<'a> {
    #[must_use]
    pub fn new(
        config: &'a ImportConfig,
        profile: &'a MapperProfile,
        scan: Option<&'a ScanDescription>,
        aux: AuxGroups<'a>,
    ) -> Self {
        Self {
            config,
            profile,
            scan,
            aux,
        }
    }

    /// Position counts get sorted and deduplicated on import.
    ///
    /// Turning `sort_positions` off imports legacy files as recorded: indices
    /// may then be unsorted and repeat.
    #[must_use]
    pub fn sorts(&self) -> bool {
        self.profile.repairs && self.config.sort_positions
    }

    /// Redefined channels get split.
    #[must_use]
    pub fn splits(&self) -> bool {
        self.sorts() && self.config.split_redefined_channels
    }

    /// Adds the position repair step: sorted positions, one entry each.
    #[must_use]
    pub fn repair(&self, importer: Importer, policy: DuplicatePolicy) -> Importer {
        if self.sorts() {
            importer.with_step(Arc::new(ResolveDuplicates(policy)))
        } else {
            importer
        }
    }
}

/// Devices produced by one mapping run, before they are placed in a [`File`].
#[derive(Debug, Default)]
pub struct Collected {
    pub standard: Vec<MeasureData>,
    pub snapshots: Vec<MeasureData>,
    pub monitors: Vec<MeasureData>,
    /// Devices kept with degraded fidelity.
    pub degraded: Vec<(String, Error)>,
    /// Devices that could not be mapped.
    pub failed: Vec<(String, Error)>,
}

impl Collected {
    /// Files a device under its section.
    pub fn push(&mut self, data: MeasureData) {
        match data.section() {
            Section::Snapshot => self.snapshots.push(data),
            Section::Monitor => self.monitors.push(data),
            Section::Standard | Section::Timestamp => self.standard.push(data),
        }
    }

    pub fn absorb(&mut self, device: &str, result: Result<MeasureData>) {
        match result {
            Ok(data) => self.push(data),
            Err(e) => self.failed.push((device.to_string(), e)),
        }
    }

    fn absorb_channel(&mut self, device: &str, result: Result<ChannelMapping>) {
        match result {
            Ok(mapping) => {
                for data in mapping.data {
                    self.push(data);
                }
                if let Some(issue) = mapping.issue {
                    self.degraded.push((device.to_string(), issue));
                }
            }
            Err(e) => self.failed.push((device.to_string(), e)),
        }
    }
}

/// Maps the contents of one container onto a [`File`].
pub trait VersionMapper: Send + Sync + fmt::Debug {
    fn profile(&self) -> &MapperProfile;

    /// Maps a container, using an already parsed scan description.
    ///
    /// # Errors
    /// Returns an error if the container does not match the schema version;
    /// per-device errors only abort in strict mode.
    fn map_with_scan(
        &self,
        resource: &Resource,
        config: &ImportConfig,
        scan: Option<ScanDescription>,
    ) -> Result<File>;

    /// Maps a container without scan description.
    ///
    /// # Errors
    /// See [`VersionMapper::map_with_scan`].
    fn map(&self, resource: &Resource, config: &ImportConfig) -> Result<File> {
        self.map_with_scan(resource, config, None)
    }
}

/// Mapper for the eveH5 layout shared by schema versions 4 to 7.
#[derive(Clone, Debug)]
pub struct EveH5Mapper {
    profile: MapperProfile,
}

impl EveH5Mapper {
    #[must_use]
    pub fn new(profile: MapperProfile) -> Self {
        Self { profile }
    }

    #[must_use]
    pub fn for_version(version: u32) -> Self {
        Self::new(MapperProfile::for_version(version))
    }
}

fn map_main_leaf(leaf: &LeafItem, ctx: &MapContext<'_>) -> Result<ChannelMapping> {
    if leaf.attributes().text("DeviceType").as_deref() == Some("Axis") {
        let data = map_axis(leaf, Section::Standard, ctx)?;
        return Ok(ChannelMapping {
            data: vec![data],
            issue: None,
        });
    }
    map_channel(leaf, ctx)
}

fn map_remaining(inventory: &mut Inventory<'_>, ctx: &MapContext<'_>, out: &mut Collected) {
    let main = inventory.drain_main();
    let results: Vec<(&str, Result<ChannelMapping>)> = if ctx.config.parallel {
        main.par_iter()
            .map(|leaf| (leaf.name(), map_main_leaf(leaf, ctx)))
            .collect()
    } else {
        main.iter()
            .map(|leaf| (leaf.name(), map_main_leaf(leaf, ctx)))
            .collect()
    };
    for (device, result) in results {
        out.absorb_channel(device, result);
    }

    for leaf in inventory.drain_snapshot() {
        out.absorb(leaf.name(), map_snapshot(leaf, ctx));
    }
    for leaf in inventory.drain_monitors() {
        out.absorb(leaf.name(), map_monitor(leaf));
    }
    for group in inventory.drain_main_groups() {
        log::warn!("Group {} unmapped", group.path());
    }
}

fn place(target: &mut evedata_core::section::SectionMap<MeasureData>, data: Vec<MeasureData>) {
    for device in data {
        let id = device.id().to_string();
        if target.insert(id.clone(), device).is_some() {
            log::warn!("Device {id} mapped twice, keeping the last one");
        }
    }
}

impl VersionMapper for EveH5Mapper {
    fn profile(&self) -> &MapperProfile {
        &self.profile
    }

    fn map_with_scan(
        &self,
        resource: &Resource,
        config: &ImportConfig,
        scan: Option<ScanDescription>,
    ) -> Result<File> {
        let root = resource.root()?;
        let version = read_version(&root)?;
        let mut file = File::new(version);
        let c1 = root.group(CHAIN_GROUP);
        file.metadata = map_file_metadata(&root, c1, &self.profile, resource.identity())?;
        file.log_messages = map_log_messages(&root)?;

        let c1 = c1.ok_or_else(|| Error::schema("/", "missing group c1"))?;
        let main = c1
            .group(MAIN_GROUP)
            .ok_or_else(|| Error::schema(c1.path(), "missing group main"))?;
        let snapshot = c1.group(SNAPSHOT_GROUP);
        if self.profile.snapshot_required && snapshot.is_none() {
            return Err(Error::schema(c1.path(), "missing group snapshot"));
        }
        let ctx = MapContext::new(config, &self.profile, scan.as_ref(), AuxGroups::of(Some(main)));
        if !ctx.sorts() && self.profile.repairs {
            log::warn!("Position repairs disabled; indices may be unsorted or repeat");
        }
        file.position_timestamps = Some(map_timestamps(c1, &ctx)?);
        let mut inventory = Inventory::new(Some(main), snapshot, root.group(MONITOR_GROUP));
        let mut out = Collected::default();
        map_mpskip(&mut inventory, &ctx, &mut out);
        map_mca(&mut inventory, &ctx, &mut out);
        map_scientific_cameras(&mut inventory, &ctx, &mut out);
        map_sample_cameras(&mut inventory, &ctx, &mut out);
        map_remaining(&mut inventory, &ctx, &mut out);

        for (device, error) in out.failed {
            if config.strict {
                return Err(error);
            }
            file.record_issue(device, error);
        }
        for (device, error) in out.degraded {
            if config.strict {
                return Err(error);
            }
            file.import_errors.push(ImportIssue { device, error });
        }
        place(&mut file.standard, out.standard);
        place(&mut file.snapshots, out.snapshots);
        place(&mut file.monitors, out.monitors);
        file.scan = scan;

        assemble_scan_modules(&mut file)?;
        if config.map_monitors {
            map_monitors_to_positions(&mut file, config)?;
        }
        log::info!(
            "Mapped {} (eveH5 {}): {} standard, {} snapshot, {} monitor devices, {} scan module(s), {} issue(s)",
            resource.identity(),
            file.version,
            file.standard.len(),
            file.snapshots.len(),
            file.monitors.len(),
            file.scan_modules.len(),
            file.import_errors.len()
        );
        Ok(file)
    }
}
