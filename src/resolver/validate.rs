// src/resolver/validate.rs

//! Required-attribute validation
//!
//! The resolver assumes required attributes exist once the dependency walk
//! starts, so descriptors and fragments are checked up front. A descriptor
//! failing these checks is disabled; a fragment is dropped before linkage.

use crate::registry::{
    Extension, ExtensionPoint, Library, PluginDescriptor, PluginFragment, PluginRegistry,
    Prerequisite,
};

/// A descriptor is usable when its own identity and every contained
/// element carry their required attributes.
pub(crate) fn required_plugin_descriptor(
    plugin: &PluginDescriptor,
    registry: &PluginRegistry,
) -> bool {
    if plugin.name.is_none() || plugin.id.is_none() || plugin.version.is_none() {
        return false;
    }
    plugin.requires.iter().all(required_prerequisite)
        && plugin.extensions.iter().all(required_extension)
        && plugin.extension_points.iter().all(required_extension_point)
        && plugin.libraries.iter().all(required_library)
        && plugin
            .fragments
            .iter()
            .filter_map(|&i| registry.fragments().get(i))
            .all(required_fragment)
}

pub(crate) fn required_prerequisite(prerequisite: &Prerequisite) -> bool {
    prerequisite.plugin.is_some()
}

pub(crate) fn required_extension(extension: &Extension) -> bool {
    extension.extension_point.is_some()
}

pub(crate) fn required_extension_point(point: &ExtensionPoint) -> bool {
    point.name.is_some() && point.id.is_some()
}

pub(crate) fn required_library(library: &Library) -> bool {
    library.name.is_some()
}

pub(crate) fn required_fragment(fragment: &PluginFragment) -> bool {
    fragment.name.is_some()
        && fragment.id.is_some()
        && fragment.plugin_id.is_some()
        && fragment.plugin_version.is_some()
        && fragment.version.is_some()
}
