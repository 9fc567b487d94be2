use std::collections::{BTreeMap, BTreeSet};

use bundlekit_schema::{
    ApkTargeting, Assets, DimensionTargeting, ModuleSplit, ResourceTable, TargetedAssetsDirectory,
    TargetingDimension, ZipPath,
};

use super::{ModuleSplitSplitter, in_directories, take_entries};
use crate::error::Result;

/// Moves language-specific resources and `#lang_` assets directories of the
/// master split into one split per language. Values without a locale and
/// fallback assets directories stay in the master split.
#[derive(Debug, Clone, Copy, Default)]
pub struct LanguageSplitter;

#[derive(Default)]
struct LanguageContent {
    table: Option<ResourceTable>,
    directories: Vec<TargetedAssetsDirectory>,
}

impl ModuleSplitSplitter for LanguageSplitter {
    fn split(&self, mut split: ModuleSplit) -> Result<Vec<ModuleSplit>> {
        if !split.is_master_split {
            return Ok(vec![split]);
        }

        let mut languages: BTreeMap<String, LanguageContent> = BTreeMap::new();
        if let Some(table) = &split.resource_table {
            for config_value in table.config_values() {
                if let Some(language) = config_value.config.language() {
                    languages.entry(language).or_default();
                }
            }
            for (language, content) in &mut languages {
                let language_table = table.filter_values(|entry| {
                    entry
                        .config_values
                        .iter()
                        .filter(|v| v.config.language().as_ref() == Some(language))
                        .cloned()
                        .collect()
                });
                content.table = Some(language_table);
            }
        }

        let mut master_directories = Vec::new();
        if let Some(assets) = split.assets_config.take() {
            for directory in assets.directories {
                let language = directory
                    .targeting
                    .language
                    .as_ref()
                    .and_then(|t| t.values.first().cloned());
                match language {
                    Some(language) => languages.entry(language).or_default().directories.push(directory),
                    None => master_directories.push(directory),
                }
            }
            split.assets_config = Some(Assets {
                directories: master_directories,
            });
        }
        if languages.is_empty() {
            return Ok(vec![split]);
        }

        if let Some(table) = split.resource_table.take() {
            let master_table = table.filter_values(|entry| {
                entry
                    .config_values
                    .iter()
                    .filter(|v| v.config.language().is_none())
                    .cloned()
                    .collect()
            });
            split.resource_table = (!master_table.is_empty()).then_some(master_table);
        }
        let master_files = split
            .resource_table
            .as_ref()
            .map(ResourceTable::referenced_files)
            .unwrap_or_default();

        let universe: BTreeSet<String> = languages.keys().cloned().collect();
        let mut outputs = Vec::with_capacity(languages.len() + 1);
        for (language, content) in languages {
            let directory_paths: BTreeSet<ZipPath> =
                content.directories.iter().map(|d| d.path.clone()).collect();
            let files: BTreeSet<ZipPath> = content
                .table
                .as_ref()
                .map(ResourceTable::referenced_files)
                .unwrap_or_default()
                .into_iter()
                .filter(|path| !master_files.contains(path))
                .collect();

            let mut language_split = split.derived(ApkTargeting {
                language: Some(DimensionTargeting::new(
                    [language.clone()],
                    universe.iter().filter(|l| **l != language).cloned(),
                )),
                ..split.apk_targeting.clone()
            });
            language_split.entries = take_entries(&mut split.entries, |e| {
                files.contains(&e.path) || in_directories(e, &directory_paths)
            });
            language_split.resource_table = content.table.filter(|t| !t.is_empty());
            language_split.assets_config = (!content.directories.is_empty()).then_some(Assets {
                directories: content.directories,
            });
            outputs.push(language_split);
        }

        tracing::debug!(
            module = %split.module_name,
            dimension = %TargetingDimension::Language,
            languages = universe.len(),
            "split languages"
        );
        outputs.insert(0, split);
        Ok(outputs)
    }

    fn dimension(&self) -> Option<TargetingDimension> {
        Some(TargetingDimension::Language)
    }
}
