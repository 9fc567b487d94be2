//! The subset of the Android manifest the engine reads and fuses.

use serde::{Deserialize, Serialize};

/// Metadata key under which a fused manifest lists the modules it absorbed.
pub const FUSED_MODULE_NAMES_KEY: &str = "com.android.dynamic.apk.fused.modules";

/// Decoded `AndroidManifest` of a module.
///
/// Only the parts the splitting and merging engine reads are modelled;
/// attribute-level editing is out of scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AndroidManifest {
    /// Application package name.
    pub package_name: String,
    /// Split id of a feature module, `None` for base.
    pub split_id: Option<String>,
    /// `minSdkVersion`, if declared.
    pub min_sdk_version: Option<u32>,
    /// Whether the application is debuggable.
    pub debuggable: bool,
    /// Kind of module this manifest belongs to.
    pub module_type: ModuleType,
    /// How the module is delivered.
    pub delivery: Delivery,
    /// Declared application components.
    pub components: Vec<ManifestComponent>,
    /// `<meta-data>` elements of the application.
    pub metadata: Vec<MetaData>,
}

/// Kind of bundle module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    /// Module with code and resources.
    #[default]
    Feature,
    /// Module made only of assets.
    AssetOnly,
}

/// Delivery mode of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Delivery {
    /// Installed with the app.
    InstallTime {
        /// Whether the module can be uninstalled later.
        removable: bool,
    },
    /// Downloaded when requested.
    OnDemand,
    /// Installed when device conditions match.
    Conditional,
}

impl Default for Delivery {
    fn default() -> Self {
        Self::InstallTime { removable: false }
    }
}

/// Kinds of application components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// `<activity>`.
    Activity,
    /// `<service>`.
    Service,
    /// `<receiver>`.
    Receiver,
    /// `<provider>`.
    Provider,
}

/// One declared application component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestComponent {
    /// Component kind.
    pub kind: ComponentKind,
    /// Fully qualified class name.
    pub name: String,
}

/// One `<meta-data>` element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetaData {
    /// `android:name`.
    pub name: String,
    /// `android:value`.
    pub value: String,
}

impl AndroidManifest {
    /// Minimal install-time manifest for `package_name`.
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            split_id: None,
            min_sdk_version: None,
            debuggable: false,
            module_type: ModuleType::Feature,
            delivery: Delivery::default(),
            components: Vec::new(),
            metadata: Vec::new(),
        }
    }

    /// `minSdkVersion`, defaulting to 1 as the platform does.
    pub fn effective_min_sdk(&self) -> u32 {
        self.min_sdk_version.unwrap_or(1)
    }

    /// Whether the module is delivered at install time and cannot be removed.
    pub fn is_permanent_install_time(&self) -> bool {
        self.delivery == Delivery::InstallTime { removable: false }
    }

    /// Value of the `<meta-data>` element called `name`.
    pub fn metadata_value(&self, name: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.value.as_str())
    }

    /// Set `<meta-data>` `name`, replacing any previous value.
    pub fn set_metadata(&mut self, name: &str, value: impl Into<String>) {
        self.metadata.retain(|m| m.name != name);
        self.metadata.push(MetaData {
            name: name.to_string(),
            value: value.into(),
        });
    }

    /// Modules recorded as fused into this manifest.
    pub fn fused_module_names(&self) -> Vec<String> {
        self.metadata_value(FUSED_MODULE_NAMES_KEY)
            .map(|v| v.split(',').map(str::to_string).collect())
            .unwrap_or_default()
    }
}
