// src/registry/mod.rs

//! In-memory plugin registry model
//!
//! The registry is the flat store the resolver operates on: a list of
//! plugin descriptors, a list of fragments, and a `resolved` flag. Record
//! types keep their identifying attributes as `Option<String>` because a
//! descriptor missing a required attribute must be representable; the
//! resolver disables such descriptors rather than rejecting them up front.
//!
//! Cross references between records are index handles, never owning
//! pointers: a descriptor's `fragments` list holds indices into the
//! registry's fragment store, and an extension point's resolved
//! `extensions` list holds [`ExtensionRef`] handles naming the host
//! descriptor and the extension's position within it.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::version::PluginVersion;

/// A single `(id, version)` plugin record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Human-readable plugin name (required attribute)
    pub name: Option<String>,
    /// Plugin identifier (required attribute)
    pub id: Option<String>,
    /// Declared version string (required attribute)
    pub version: Option<String>,
    /// Prerequisite plugins this descriptor requires
    #[serde(default)]
    pub requires: Vec<Prerequisite>,
    /// Extensions contributed to other plugins' extension points
    #[serde(default)]
    pub extensions: Vec<Extension>,
    /// Extension points this plugin publishes
    #[serde(default)]
    pub extension_points: Vec<ExtensionPoint>,
    /// Runtime libraries
    #[serde(default)]
    pub libraries: Vec<Library>,
    /// Indices into the registry's fragment store, filled by linkage
    #[serde(default)]
    pub fragments: Vec<usize>,
    /// Whether this descriptor participates in the resolved registry
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

impl PluginDescriptor {
    pub fn new(
        name: impl Into<String>,
        id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            id: Some(id.into()),
            version: Some(version.into()),
            requires: Vec::new(),
            extensions: Vec::new(),
            extension_points: Vec::new(),
            libraries: Vec::new(),
            fragments: Vec::new(),
            enabled: true,
        }
    }

    pub fn with_requires(mut self, requires: Vec<Prerequisite>) -> Self {
        self.requires = requires;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<Extension>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_extension_points(mut self, points: Vec<ExtensionPoint>) -> Self {
        self.extension_points = points;
        self
    }

    pub fn with_libraries(mut self, libraries: Vec<Library>) -> Self {
        self.libraries = libraries;
        self
    }

    /// The declared version in parsed form; `1.0.0` when absent or malformed
    pub fn version_id(&self) -> PluginVersion {
        self.version
            .as_deref()
            .map_or_else(PluginVersion::default, PluginVersion::parse_lenient)
    }

    /// Look up a declared extension point by its id
    pub fn extension_point(&self, id: &str) -> Option<&ExtensionPoint> {
        self.extension_points
            .iter()
            .find(|pt| pt.id.as_deref() == Some(id))
    }
}

/// A requirement one plugin declares on another plugin id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prerequisite {
    /// Target plugin id (required attribute)
    pub plugin: Option<String>,
    /// Requested version; absent means "latest"
    pub version: Option<String>,
    /// True for an exact match, false for a compatible match
    #[serde(default)]
    pub exact: bool,
    /// The version the target actually resolved to, written by resolution
    #[serde(default)]
    pub resolved_version: Option<String>,
}

impl Prerequisite {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: Some(plugin.into()),
            version: None,
            exact: false,
            resolved_version: None,
        }
    }

    /// Require a compatible match against the given version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Require an exact match against the given version
    pub fn with_exact_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self.exact = true;
        self
    }

    /// The requested version in parsed form, if one was declared
    pub fn version_id(&self) -> Option<PluginVersion> {
        self.version.as_deref().map(PluginVersion::parse_lenient)
    }
}

/// A contribution to another plugin's extension point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extension {
    pub name: Option<String>,
    pub id: Option<String>,
    /// Target in `"pluginId.extensionPointId"` form (required attribute)
    pub extension_point: Option<String>,
}

impl Extension {
    pub fn new(extension_point: impl Into<String>) -> Self {
        Self {
            name: None,
            id: None,
            extension_point: Some(extension_point.into()),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Handle to an extension, naming its host descriptor and position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRef {
    pub plugin_id: String,
    pub plugin_version: String,
    /// Index into the host descriptor's extension list
    pub extension: usize,
}

/// A point other plugins extend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionPoint {
    /// Point identifier, unqualified (required attribute)
    pub id: Option<String>,
    /// Human-readable name (required attribute)
    pub name: Option<String>,
    /// Extensions attached here by cross-linking
    #[serde(default)]
    pub extensions: Vec<ExtensionRef>,
}

impl ExtensionPoint {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            extensions: Vec::new(),
        }
    }
}

/// A runtime library entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    /// Library name (required attribute)
    pub name: Option<String>,
}

impl Library {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// An auxiliary contribution bound to a specific plugin version
///
/// Fragments are merged into their target plugin before resolution; their
/// extensions, extension points, libraries, and prerequisites become part
/// of the target descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginFragment {
    pub name: Option<String>,
    pub id: Option<String>,
    pub version: Option<String>,
    /// Target plugin id (required attribute)
    pub plugin_id: Option<String>,
    /// Target plugin version (required attribute)
    pub plugin_version: Option<String>,
    #[serde(default)]
    pub requires: Vec<Prerequisite>,
    #[serde(default)]
    pub extensions: Vec<Extension>,
    #[serde(default)]
    pub extension_points: Vec<ExtensionPoint>,
    #[serde(default)]
    pub libraries: Vec<Library>,
}

impl PluginFragment {
    pub fn new(
        name: impl Into<String>,
        id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            id: Some(id.into()),
            version: Some(version.into()),
            plugin_id: None,
            plugin_version: None,
            requires: Vec::new(),
            extensions: Vec::new(),
            extension_points: Vec::new(),
            libraries: Vec::new(),
        }
    }

    /// Bind the fragment to its target plugin version
    pub fn for_plugin(
        mut self,
        plugin_id: impl Into<String>,
        plugin_version: impl Into<String>,
    ) -> Self {
        self.plugin_id = Some(plugin_id.into());
        self.plugin_version = Some(plugin_version.into());
        self
    }

    pub fn with_requires(mut self, requires: Vec<Prerequisite>) -> Self {
        self.requires = requires;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<Extension>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_extension_points(mut self, points: Vec<ExtensionPoint>) -> Self {
        self.extension_points = points;
        self
    }

    pub fn with_libraries(mut self, libraries: Vec<Library>) -> Self {
        self.libraries = libraries;
        self
    }

    /// The fragment's own version in parsed form
    pub fn version_id(&self) -> PluginVersion {
        self.version
            .as_deref()
            .map_or_else(PluginVersion::default, PluginVersion::parse_lenient)
    }

    /// The targeted plugin version in parsed form
    pub fn target_version_id(&self) -> PluginVersion {
        self.plugin_version
            .as_deref()
            .map_or_else(PluginVersion::default, PluginVersion::parse_lenient)
    }
}

/// The registry of declared plugins and fragments
///
/// Mutated in place by [`RegistryResolver::resolve`](crate::RegistryResolver::resolve):
/// fragments are attached and merged, `enabled` flags flipped, prerequisite
/// `resolved_version`s annotated, and (with trimming on) disabled
/// descriptors removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginRegistry {
    pub(crate) plugins: Vec<PluginDescriptor>,
    pub(crate) fragments: Vec<PluginFragment>,
    #[serde(default)]
    resolved: bool,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_plugin(&mut self, plugin: PluginDescriptor) {
        self.plugins.push(plugin);
    }

    pub fn add_fragment(&mut self, fragment: PluginFragment) {
        self.fragments.push(fragment);
    }

    pub fn plugins(&self) -> &[PluginDescriptor] {
        &self.plugins
    }

    /// Mutable access to the stored descriptors, e.g. to veto a version
    /// before resolution
    pub fn plugins_mut(&mut self) -> &mut [PluginDescriptor] {
        &mut self.plugins
    }

    pub fn fragments(&self) -> &[PluginFragment] {
        &self.fragments
    }

    /// First descriptor carrying the given id, enabled or not
    pub fn plugin(&self, id: &str) -> Option<&PluginDescriptor> {
        self.plugins
            .iter()
            .find(|pd| pd.id.as_deref() == Some(id))
    }

    /// Like [`plugin`](Self::plugin), but an error when absent
    pub fn require_plugin(&self, id: &str) -> Result<&PluginDescriptor> {
        self.plugin(id)
            .ok_or_else(|| Error::PluginNotFound(id.to_string()))
    }

    /// Descriptor with the given id at the given version
    ///
    /// Versions compare in parsed form, so `"1.2"` finds a plugin declared
    /// as `"1.2.0"`.
    pub fn plugin_at(&self, id: &str, version: &str) -> Option<&PluginDescriptor> {
        let wanted = PluginVersion::parse_lenient(version);
        self.plugins
            .iter()
            .find(|pd| pd.id.as_deref() == Some(id) && pd.version_id() == wanted)
    }

    pub(crate) fn plugin_index_at(&self, id: &str, version: &str) -> Option<usize> {
        let wanted = PluginVersion::parse_lenient(version);
        self.plugins
            .iter()
            .position(|pd| pd.id.as_deref() == Some(id) && pd.version_id() == wanted)
    }

    /// Remove the descriptor with the given id and version, if present
    pub fn remove_plugin(&mut self, id: &str, version: &str) -> bool {
        match self.plugin_index_at(id, version) {
            Some(i) => {
                self.plugins.remove(i);
                true
            }
            None => false,
        }
    }

    /// Whether this registry has already been resolved
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub(crate) fn mark_resolved(&mut self) {
        self.resolved = true;
    }
}
