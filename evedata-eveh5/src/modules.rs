//! Scan modules and the position consistency check.

use crate::mpskip::merge_mpskip_modules;
use evedata_algorithms::preprocess::SelectPositions;
use evedata_core::data::MeasureData;
use evedata_core::error::Result;
use evedata_core::file::{File, ScanModule};
use evedata_core::scan::{ScanDescription, ScanModuleDescription};
use evedata_core::section::SectionMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Single module holding every standard device.
fn main_module(file: &File) -> Result<ScanModule> {
    let mut module = ScanModule::main();
    module.positions = file.timestamps()?.index()?.to_vec();
    module.data = file
        .standard
        .iter()
        .map(|(id, data)| (id, data.clone()))
        .collect();
    Ok(module)
}

/// Copy of a module's devices restricted to the module's positions.
///
/// A device split per scan module (`{id}_{module}`) is preferred over the
/// unsplit device.
fn module_data(file: &File, description: &ScanModuleDescription) -> Result<SectionMap<MeasureData>> {
    let mut data = SectionMap::new();
    for device in description.axes.iter().chain(&description.channels) {
        let split_id = format!("{device}_{}", description.id);
        let Some(source) = file.standard.get(&split_id).or_else(|| file.standard.get(device)) else {
            continue;
        };
        let select = Arc::new(SelectPositions::new(description.positions.iter().copied()));
        let restricted = source.clone().with_payload(source.payload().with_step(select)?);
        data.insert(device.clone(), restricted);
    }
    Ok(data)
}

fn described_modules(file: &File, scan: &ScanDescription) -> Result<Vec<ScanModule>> {
    scan.modules()
        .iter()
        .map(|description| {
            Ok(ScanModule {
                id: description.id,
                parent: description.parent,
                name: description.name.clone(),
                appended: description.appended,
                nested: description.nested,
                data: module_data(file, description)?,
                positions: description.positions.clone(),
            })
        })
        .collect()
}

/// Whether the modules together produced exactly the recorded positions.
fn consistent(modules: &[ScanModule], recorded: &[i64]) -> bool {
    let produced: BTreeSet<i64> = modules.iter().flat_map(|m| m.positions.iter().copied()).collect();
    let recorded: BTreeSet<i64> = recorded.iter().copied().collect();
    produced == recorded
}

/// Builds the scan modules of `file`.
///
/// Without scan description, one `main` module holds all standard devices.
/// Otherwise each described module gets its own copies of the devices it
/// used; if the modules' positions do not add up to the recorded positions,
/// the modules are reset to the single `main` module.
///
/// # Errors
/// Returns an error if the position timestamps cannot be read.
pub fn assemble_scan_modules(file: &mut File) -> Result<()> {
    let modules = match &file.scan {
        None => vec![main_module(file)?],
        Some(scan) if scan.modules().is_empty() => vec![main_module(file)?],
        Some(scan) => {
            let mut modules = described_modules(file, scan)?;
            if scan.mpskip_modules().next().is_some() {
                log::info!("Cannot perform consistency check due to MPSKIP module.");
                merge_mpskip_modules(file, scan, &mut modules)?;
                modules
            } else if consistent(&modules, file.timestamps()?.index()?) {
                modules
            } else {
                log::warn!("Calculated positions don't match actual positions: reset scan modules");
                vec![main_module(file)?]
            }
        }
    };
    log::debug!("Assembled {} scan module(s)", modules.len());
    file.scan_modules = modules;
    Ok(())
}
