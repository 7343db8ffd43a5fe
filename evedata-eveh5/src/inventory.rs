//! Datasets still waiting to be mapped.
//!
//! Special devices (MCA, cameras, MPSKIP) claim their datasets first; what is
//! left afterwards goes through the generic axis/channel classification.

use evedata_core::container::{GroupItem, LeafItem};

/// Group names below `/c1/main` holding auxiliary channel metadata.
pub const AVERAGE_GROUP: &str = "averagemeta";
pub const INTERVAL_GROUP: &str = "standarddev";
pub const NORMALIZED_GROUP: &str = "normalized";

const AUXILIARY_GROUPS: [&str; 3] = [AVERAGE_GROUP, INTERVAL_GROUP, NORMALIZED_GROUP];

/// Auxiliary metadata groups of the main section.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuxGroups<'a> {
    pub average: Option<&'a GroupItem>,
    pub interval: Option<&'a GroupItem>,
    pub normalized: Option<&'a GroupItem>,
}

impl<'a> AuxGroups<'a> {
    #[must_use]
    pub fn of(main: Option<&'a GroupItem>) -> Self {
        Self {
            average: main.and_then(|m| m.group(AVERAGE_GROUP)),
            interval: main.and_then(|m| m.group(INTERVAL_GROUP)),
            normalized: main.and_then(|m| m.group(NORMALIZED_GROUP)),
        }
    }

    /// `averagemeta/{id}__{suffix}`.
    #[must_use]
    pub fn average(&self, id: &str, suffix: &str) -> Option<&'a LeafItem> {
        self.average?.leaf(&format!("{id}__{suffix}"))
    }

    /// `standarddev/{id}__{suffix}`.
    #[must_use]
    pub fn interval(&self, id: &str, suffix: &str) -> Option<&'a LeafItem> {
        self.interval?.leaf(&format!("{id}__{suffix}"))
    }

    /// Normalized copy `normalized/{id}__{normId}` and the normalizing channel.
    #[must_use]
    pub fn normalized(&self, id: &str) -> Option<(&'a LeafItem, String)> {
        let prefix = format!("{id}__");
        self.normalized?.leaves().find_map(|leaf| {
            let norm = leaf.name().strip_prefix(&prefix)?;
            let norm = leaf
                .attributes()
                .text("normalizeId")
                .unwrap_or_else(|| norm.to_string());
            Some((leaf, norm))
        })
    }
}

/// Leaves and groups of one file not yet claimed by a mapper.
#[derive(Debug, Default)]
pub struct Inventory<'a> {
    main: Vec<&'a LeafItem>,
    main_groups: Vec<&'a GroupItem>,
    snapshot: Vec<&'a LeafItem>,
    monitors: Vec<&'a LeafItem>,
}

fn take<'a>(items: &mut Vec<&'a LeafItem>, name: &str) -> Option<&'a LeafItem> {
    let pos = items.iter().position(|l| l.name() == name)?;
    Some(items.remove(pos))
}

fn take_where<'a>(items: &mut Vec<&'a LeafItem>, pred: impl Fn(&str) -> bool) -> Vec<&'a LeafItem> {
    let (taken, kept): (Vec<_>, Vec<_>) = items.drain(..).partition(|l| pred(l.name()));
    *items = kept;
    taken
}

impl<'a> Inventory<'a> {
    /// Collects the datasets of `/c1/main`, `/c1/snapshot` and `/device`.
    #[must_use]
    pub fn new(
        main: Option<&'a GroupItem>,
        snapshot: Option<&'a GroupItem>,
        devices: Option<&'a GroupItem>,
    ) -> Self {
        Self {
            main: main.map(|g| g.leaves().collect()).unwrap_or_default(),
            main_groups: main
                .map(|g| {
                    g.groups()
                        .filter(|sub| !AUXILIARY_GROUPS.contains(&sub.name()))
                        .collect()
                })
                .unwrap_or_default(),
            snapshot: snapshot.map(|g| g.leaves().collect()).unwrap_or_default(),
            monitors: devices.map(|g| g.leaves().collect()).unwrap_or_default(),
        }
    }

    pub fn main(&self) -> &[&'a LeafItem] {
        &self.main
    }

    pub fn main_groups(&self) -> &[&'a GroupItem] {
        &self.main_groups
    }

    pub fn snapshot(&self) -> &[&'a LeafItem] {
        &self.snapshot
    }

    pub fn monitors(&self) -> &[&'a LeafItem] {
        &self.monitors
    }

    pub fn take_main(&mut self, name: &str) -> Option<&'a LeafItem> {
        take(&mut self.main, name)
    }

    pub fn take_snapshot(&mut self, name: &str) -> Option<&'a LeafItem> {
        take(&mut self.snapshot, name)
    }

    pub fn take_monitor(&mut self, name: &str) -> Option<&'a LeafItem> {
        take(&mut self.monitors, name)
    }

    pub fn take_main_group(&mut self, name: &str) -> Option<&'a GroupItem> {
        let pos = self.main_groups.iter().position(|g| g.name() == name)?;
        Some(self.main_groups.remove(pos))
    }

    /// Removes every main dataset whose name starts with `prefix`.
    pub fn take_main_prefixed(&mut self, prefix: &str) -> Vec<&'a LeafItem> {
        take_where(&mut self.main, |name| name.starts_with(prefix))
    }

    /// Removes every snapshot dataset whose name starts with `prefix`.
    pub fn take_snapshot_prefixed(&mut self, prefix: &str) -> Vec<&'a LeafItem> {
        take_where(&mut self.snapshot, |name| name.starts_with(prefix))
    }

    /// Removes and returns everything left in the main section.
    pub fn drain_main(&mut self) -> Vec<&'a LeafItem> {
        std::mem::take(&mut self.main)
    }

    /// Removes and returns everything left in the snapshot section.
    pub fn drain_snapshot(&mut self) -> Vec<&'a LeafItem> {
        std::mem::take(&mut self.snapshot)
    }

    /// Removes and returns every monitor dataset left.
    pub fn drain_monitors(&mut self) -> Vec<&'a LeafItem> {
        std::mem::take(&mut self.monitors)
    }

    /// Removes and returns the main groups left.
    pub fn drain_main_groups(&mut self) -> Vec<&'a GroupItem> {
        std::mem::take(&mut self.main_groups)
    }
}
