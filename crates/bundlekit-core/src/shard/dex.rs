use bundlekit_schema::{DEX_DIRECTORY, ModuleEntry, ModuleName, ZipPath};
use indexmap::IndexMap;

use crate::dex::{dex_file_index, dex_file_name};
use crate::error::{BundleError, Result};

/// Renumber the dex files of several modules into one `classesN.dex`
/// sequence. Base files keep their names; the other modules follow in
/// module order, each in its own index order.
pub fn rename_dex_from_all_modules(
    dex_by_module: &IndexMap<ModuleName, Vec<ModuleEntry>>,
) -> Result<Vec<ModuleEntry>> {
    let mut renamed: Vec<ModuleEntry> = dex_by_module
        .iter()
        .filter(|(module, _)| module.is_base())
        .flat_map(|(_, entries)| entries.iter().cloned())
        .collect();
    let mut next = renamed.len() as u32 + 1;
    let dex = ZipPath::new(DEX_DIRECTORY);

    for (module, entries) in dex_by_module.iter().filter(|(module, _)| !module.is_base()) {
        let mut indexed = entries
            .iter()
            .map(|entry| {
                dex_file_index(entry.path.file_name())
                    .map(|index| (index, entry))
                    .ok_or_else(|| {
                        BundleError::TargetingInvariant(format!(
                            "Unexpected dex file '{}' in module '{module}'",
                            entry.path
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        indexed.sort_by_key(|(index, _)| *index);
        for (_, entry) in indexed {
            renamed.push(entry.with_path(dex.join(&dex_file_name(next))));
            next += 1;
        }
    }
    Ok(renamed)
}
