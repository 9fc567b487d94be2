//! Compiled resource table tree.
//!
//! Packages, types and entries are identified by numeric id; every level
//! is an immutable value that merges rebuild from their inputs. Source
//! references point into the table's source pool and are location
//! metadata only.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::entry::ZipPath;

/// Density value of configurations that are density independent (`nodpi`).
pub const DENSITY_NONE: u32 = 0xFFFF;

/// Density value of vector configurations that match any density (`anydpi`).
pub const DENSITY_ANY: u32 = 0xFFFE;

/// Resource table of one module or split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResourceTable {
    /// Opaque pool of source file names referenced by [`SourceRef`]s.
    pub source_pool: Vec<u8>,
    /// Resource packages, in declaration order.
    pub packages: Vec<Package>,
    /// Overlayable declarations referenced by index from entries.
    pub overlayables: Vec<Overlayable>,
}

/// A resource package (`0x7f` for apps).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Package id.
    pub id: u32,
    /// Package name.
    pub name: String,
    /// Resource types of the package.
    pub types: Vec<ResourceType>,
}

/// A resource type (`drawable`, `string`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceType {
    /// Type id.
    pub id: u32,
    /// Type name.
    pub name: String,
    /// Entries of this type.
    pub entries: Vec<ResourceEntry>,
}

/// One named resource and its per-configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResourceEntry {
    /// Entry id.
    pub id: u32,
    /// Entry name.
    pub name: String,
    /// Visibility declared for the entry.
    pub visibility: Visibility,
    /// `<add-resource>` declaration, if any.
    pub allow_new: Option<AllowNew>,
    /// Overlayable declaration, if any.
    pub overlayable_item: Option<OverlayableItem>,
    /// Values, one per configuration.
    pub config_values: Vec<ConfigValue>,
}

/// Source location of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    /// Index into the table's source pool.
    pub path_idx: u32,
    /// Line number.
    pub line: u32,
    /// Column number.
    pub column: u32,
}

/// Visibility levels of a resource entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VisibilityLevel {
    /// No explicit visibility.
    #[default]
    Unknown,
    /// Private to the package.
    Private,
    /// Public API of the package.
    Public,
}

/// Visibility declaration of a resource entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Visibility {
    /// Declared level.
    pub level: VisibilityLevel,
    /// Where it was declared.
    pub source: Option<SourceRef>,
    /// Developer comment.
    pub comment: String,
}

/// Declaration that allows a resource to be added by an overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AllowNew {
    /// Where it was declared.
    pub source: Option<SourceRef>,
    /// Developer comment.
    pub comment: String,
}

/// A named overlayable declaration of the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlayable {
    /// Overlayable name.
    pub name: String,
    /// Actor allowed to overlay.
    pub actor: String,
    /// Where it was declared.
    pub source: Option<SourceRef>,
}

/// Link from an entry to one of the table's [`Overlayable`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayableItem {
    /// Index into [`ResourceTable::overlayables`].
    pub overlayable_idx: u32,
    /// Policies allowing the overlay.
    pub policies: Vec<String>,
    /// Where it was declared.
    pub source: Option<SourceRef>,
    /// Developer comment.
    pub comment: String,
}

/// Device configuration a value applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Configuration {
    /// Screen density in dpi; `0` for the default configuration.
    pub density: u32,
    /// BCP-47 locale, empty for the default configuration.
    pub locale: String,
    /// Minimum SDK qualifier, `0` if absent.
    pub sdk_version: u32,
    /// Any remaining qualifiers, verbatim (`land-night`).
    pub qualifiers: String,
}

impl Configuration {
    /// Whether the configuration selects a specific density bucket.
    pub fn is_density_specific(&self) -> bool {
        !matches!(self.density, 0 | DENSITY_NONE | DENSITY_ANY)
    }

    /// Language subtag of the locale (`fr` for `fr-CA`), if any.
    pub fn language(&self) -> Option<String> {
        let language = self.locale.split(['-', '_']).next().unwrap_or_default();
        (!language.is_empty()).then(|| language.to_lowercase())
    }

    /// The same configuration without its density qualifier.
    pub fn without_density(&self) -> Self {
        Self {
            density: 0,
            ..self.clone()
        }
    }
}

/// A value of an entry in one configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValue {
    /// Configuration the value applies to.
    pub config: Configuration,
    /// The value.
    pub value: Value,
}

/// A resource value with its declaration metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    /// Where it was declared.
    pub source: Option<SourceRef>,
    /// Developer comment.
    pub comment: String,
    /// Whether the value can be overridden by an overlay.
    pub weak: bool,
    /// The payload.
    pub item: Item,
}

/// Payload of a resource value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Item {
    /// Reference to another resource.
    Reference {
        /// Target resource id.
        id: u32,
        /// Target resource name.
        name: String,
    },
    /// Styled or plain string.
    String(String),
    /// Raw, unprocessed string.
    RawString(String),
    /// A file inside the module, for example a drawable.
    File {
        /// Path of the file entry.
        path: ZipPath,
    },
    /// Integer, boolean or color primitive.
    Primitive(Primitive),
    /// Style, array or plural made of keyed items.
    Compound(Vec<CompoundEntry>),
}

/// Primitive resource values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Primitive {
    /// Integer.
    Int(i64),
    /// Boolean.
    Bool(bool),
    /// ARGB color.
    Color(u32),
}

/// One keyed element of a compound value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundEntry {
    /// Key (attribute name, plural quantity, array index).
    pub key: String,
    /// Where it was declared.
    pub source: Option<SourceRef>,
    /// Element payload.
    pub item: Item,
}

/// Recursive removal of source references, producing the location-free
/// projection of a node.
pub trait StripSource {
    /// Copy of `self` with every source reference cleared.
    fn strip_source(&self) -> Self;
}

impl StripSource for ResourceTable {
    fn strip_source(&self) -> Self {
        Self {
            source_pool: Vec::new(),
            packages: self.packages.iter().map(StripSource::strip_source).collect(),
            overlayables: self.overlayables.iter().map(StripSource::strip_source).collect(),
        }
    }
}

impl StripSource for Package {
    fn strip_source(&self) -> Self {
        Self {
            types: self.types.iter().map(StripSource::strip_source).collect(),
            ..self.clone()
        }
    }
}

impl StripSource for ResourceType {
    fn strip_source(&self) -> Self {
        Self {
            entries: self.entries.iter().map(StripSource::strip_source).collect(),
            ..self.clone()
        }
    }
}

impl StripSource for ResourceEntry {
    fn strip_source(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            visibility: self.visibility.strip_source(),
            allow_new: self.allow_new.as_ref().map(StripSource::strip_source),
            overlayable_item: self.overlayable_item.as_ref().map(StripSource::strip_source),
            config_values: self.config_values.iter().map(StripSource::strip_source).collect(),
        }
    }
}

impl StripSource for Visibility {
    fn strip_source(&self) -> Self {
        Self {
            source: None,
            ..self.clone()
        }
    }
}

impl StripSource for AllowNew {
    fn strip_source(&self) -> Self {
        Self {
            source: None,
            ..self.clone()
        }
    }
}

impl StripSource for Overlayable {
    fn strip_source(&self) -> Self {
        Self {
            source: None,
            ..self.clone()
        }
    }
}

impl StripSource for OverlayableItem {
    fn strip_source(&self) -> Self {
        Self {
            source: None,
            ..self.clone()
        }
    }
}

impl StripSource for ConfigValue {
    fn strip_source(&self) -> Self {
        Self {
            config: self.config.clone(),
            value: self.value.strip_source(),
        }
    }
}

impl StripSource for Value {
    fn strip_source(&self) -> Self {
        Self {
            source: None,
            comment: self.comment.clone(),
            weak: self.weak,
            item: self.item.strip_source(),
        }
    }
}

impl StripSource for Item {
    fn strip_source(&self) -> Self {
        match self {
            Self::Compound(entries) => {
                Self::Compound(entries.iter().map(StripSource::strip_source).collect())
            }
            other => other.clone(),
        }
    }
}

impl StripSource for CompoundEntry {
    fn strip_source(&self) -> Self {
        Self {
            key: self.key.clone(),
            source: None,
            item: self.item.strip_source(),
        }
    }
}

impl Item {
    fn collect_files(&self, files: &mut BTreeSet<ZipPath>) {
        match self {
            Self::File { path } => {
                files.insert(path.clone());
            }
            Self::Compound(entries) => {
                for entry in entries {
                    entry.item.collect_files(files);
                }
            }
            _ => {}
        }
    }
}

impl ResourceTable {
    /// Whether the table holds no package.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Every config value of every entry.
    pub fn config_values(&self) -> impl Iterator<Item = &ConfigValue> {
        self.packages
            .iter()
            .flat_map(|p| &p.types)
            .flat_map(|t| &t.entries)
            .flat_map(|e| &e.config_values)
    }

    /// File entries referenced by any value.
    pub fn referenced_files(&self) -> BTreeSet<ZipPath> {
        let mut files = BTreeSet::new();
        for config_value in self.config_values() {
            config_value.value.item.collect_files(&mut files);
        }
        files
    }

    /// Rebuild the table keeping, per entry, only the values returned by
    /// `select`. Entries left without values, types without entries and
    /// packages without types are dropped.
    pub fn filter_values<F>(&self, mut select: F) -> Self
    where
        F: FnMut(&ResourceEntry) -> Vec<ConfigValue>,
    {
        let packages = self
            .packages
            .iter()
            .filter_map(|package| {
                let types: Vec<ResourceType> = package
                    .types
                    .iter()
                    .filter_map(|res_type| {
                        let entries: Vec<ResourceEntry> = res_type
                            .entries
                            .iter()
                            .filter_map(|entry| {
                                let config_values = select(entry);
                                (!config_values.is_empty()).then(|| ResourceEntry {
                                    config_values,
                                    ..entry.clone()
                                })
                            })
                            .collect();
                        (!entries.is_empty()).then(|| ResourceType {
                            entries,
                            ..res_type.clone()
                        })
                    })
                    .collect();
                (!types.is_empty()).then(|| Package {
                    types,
                    ..package.clone()
                })
            })
            .collect();
        Self {
            source_pool: self.source_pool.clone(),
            packages,
            overlayables: self.overlayables.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_value(path: &str, source: Option<SourceRef>) -> Value {
        Value {
            source,
            comment: String::new(),
            weak: false,
            item: Item::File {
                path: ZipPath::new(path),
            },
        }
    }

    #[test]
    fn strip_source_reaches_nested_compound_items() {
        let source = Some(SourceRef {
            path_idx: 1,
            line: 4,
            column: 2,
        });
        let value = Value {
            item: Item::Compound(vec![CompoundEntry {
                key: "android:textColor".to_string(),
                source,
                item: Item::Primitive(Primitive::Color(0xFF00_0000)),
            }]),
            ..file_value("res/a.png", source)
        };
        let stripped = value.strip_source();
        assert_eq!(stripped.source, None);
        let Item::Compound(entries) = &stripped.item else {
            panic!("expected a compound item");
        };
        assert_eq!(entries[0].source, None);
    }

    #[test]
    fn configuration_language_and_density() {
        let config = Configuration {
            locale: "fr-CA".to_string(),
            density: 320,
            ..Configuration::default()
        };
        assert_eq!(config.language().as_deref(), Some("fr"));
        assert!(config.is_density_specific());
        assert!(!config.without_density().is_density_specific());
        assert_eq!(Configuration::default().language(), None);
    }

    #[test]
    fn filter_values_drops_empty_nodes() {
        let table = ResourceTable {
            source_pool: Vec::new(),
            packages: vec![Package {
                id: 0x7f,
                name: "com.example".to_string(),
                types: vec![ResourceType {
                    id: 1,
                    name: "drawable".to_string(),
                    entries: vec![ResourceEntry {
                        id: 0,
                        name: "icon".to_string(),
                        visibility: Visibility::default(),
                        allow_new: None,
                        overlayable_item: None,
                        config_values: vec![ConfigValue {
                            config: Configuration {
                                density: 480,
                                ..Configuration::default()
                            },
                            value: file_value("res/drawable-xxhdpi/icon.png", None),
                        }],
                    }],
                }],
            }],
            overlayables: Vec::new(),
        };

        assert_eq!(
            table.referenced_files(),
            BTreeSet::from([ZipPath::new("res/drawable-xxhdpi/icon.png")])
        );
        assert!(table.filter_values(|_| Vec::new()).is_empty());
        assert_eq!(table.filter_values(|e| e.config_values.clone()), table);
    }
}
