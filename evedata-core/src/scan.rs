//! Already-parsed scan description.
//!
//! The XML scan description is parsed elsewhere; this is the part of it the
//! import layer consumes: scan modules with the positions they produced, axis
//! set values and device role hints.

use crate::value::Value;
use std::collections::HashMap;

/// Role of a device in the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    Axis,
    Channel,
}

/// One scan module of the scan description.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanModuleDescription {
    pub id: u32,
    pub parent: u32,
    pub name: String,
    pub appended: Option<u32>,
    pub nested: Option<u32>,
    pub axes: Vec<String>,
    pub channels: Vec<String>,
    /// Position counts produced by this module.
    pub positions: Vec<i64>,
}

impl ScanModuleDescription {
    /// Whether the module uses the MPSKIP fake-averaging detector.
    #[must_use]
    pub fn has_mpskip(&self) -> bool {
        self.channels.iter().any(|c| c.starts_with("MPSKIP"))
    }

    /// Whether the module uses the given device.
    #[must_use]
    pub fn uses(&self, device: &str) -> bool {
        self.axes.iter().chain(&self.channels).any(|d| d == device)
    }
}

/// Parsed scan description.
#[derive(Debug, Clone, Default)]
pub struct ScanDescription {
    modules: Vec<ScanModuleDescription>,
    set_values: HashMap<String, Vec<Value>>,
    roles: HashMap<String, DeviceRole>,
}

impl ScanDescription {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_module(mut self, module: ScanModuleDescription) -> Self {
        for axis in &module.axes {
            self.roles.entry(axis.clone()).or_insert(DeviceRole::Axis);
        }
        for channel in &module.channels {
            self.roles.entry(channel.clone()).or_insert(DeviceRole::Channel);
        }
        self.modules.push(module);
        self
    }

    #[must_use]
    pub fn with_set_values(mut self, axis: impl Into<String>, values: Vec<Value>) -> Self {
        self.set_values.insert(axis.into(), values);
        self
    }

    #[must_use]
    pub fn with_role(mut self, device: impl Into<String>, role: DeviceRole) -> Self {
        self.roles.insert(device.into(), role);
        self
    }

    #[must_use]
    pub fn modules(&self) -> &[ScanModuleDescription] {
        &self.modules
    }

    #[must_use]
    pub fn module(&self, id: u32) -> Option<&ScanModuleDescription> {
        self.modules.iter().find(|m| m.id == id)
    }

    /// Scan module that produced `position`.
    #[must_use]
    pub fn module_of(&self, position: i64) -> Option<u32> {
        self.modules
            .iter()
            .find(|m| m.positions.contains(&position))
            .map(|m| m.id)
    }

    /// Set values of an axis as given in the scan description.
    #[must_use]
    pub fn set_values(&self, axis: &str) -> Option<&[Value]> {
        self.set_values.get(axis).map(Vec::as_slice)
    }

    #[must_use]
    pub fn role(&self, device: &str) -> Option<DeviceRole> {
        self.roles.get(device).copied()
    }

    /// Modules using the MPSKIP detector.
    pub fn mpskip_modules(&self) -> impl Iterator<Item = &ScanModuleDescription> {
        self.modules.iter().filter(|m| m.has_mpskip())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description() -> ScanDescription {
        ScanDescription::new()
            .with_module(ScanModuleDescription {
                id: 1,
                name: "WL".to_string(),
                axes: vec!["nmEnerg:io2600wl2e.A".to_string()],
                positions: vec![1, 4],
                ..ScanModuleDescription::default()
            })
            .with_module(ScanModuleDescription {
                id: 2,
                parent: 1,
                name: "Skip".to_string(),
                axes: vec!["Counter-mot".to_string()],
                channels: vec!["MPSKIP:euvr01chan1".to_string()],
                positions: vec![2, 3],
                ..ScanModuleDescription::default()
            })
    }

    #[test]
    fn test_module_of_position() {
        let scan = description();
        assert_eq!(scan.module_of(3), Some(2));
        assert_eq!(scan.module_of(4), Some(1));
        assert_eq!(scan.module_of(9), None);
    }

    #[test]
    fn test_roles_from_modules() {
        let scan = description().with_role("Counter-mot", DeviceRole::Channel);
        assert_eq!(scan.role("nmEnerg:io2600wl2e.A"), Some(DeviceRole::Axis));
        assert_eq!(scan.role("Counter-mot"), Some(DeviceRole::Channel));
        assert_eq!(scan.role("unknown"), None);
    }

    #[test]
    fn test_mpskip_modules() {
        let scan = description();
        let ids: Vec<u32> = scan.mpskip_modules().map(|m| m.id).collect();
        assert_eq!(ids, vec![2]);
        assert!(scan.module(2).unwrap().uses("Counter-mot"));
    }
}
