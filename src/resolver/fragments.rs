// src/resolver/fragments.rs

//! Fragment linkage and merging
//!
//! Fragments are folded into their target plugins before the dependency
//! walk starts, so the resolver only ever sees complete descriptors. Two
//! passes: linkage attaches each usable fragment to the descriptor whose
//! `(id, version)` it names, and merging splices the contents of the
//! newest suitable fragment per fragment id into the plugin.

use std::collections::HashSet;

use tracing::trace;

use super::status::{Diagnostic, ResolveStatus};
use super::validate;
use crate::registry::PluginRegistry;

/// Attach each validated fragment to the descriptor it targets
///
/// A fragment id is linked at most once: later fragments sharing the id
/// are skipped, even when they carry a newer version or target a different
/// plugin.
pub(crate) fn link_fragments(registry: &mut PluginRegistry, status: &mut ResolveStatus) {
    let mut seen: HashSet<String> = HashSet::new();
    for i in 0..registry.fragments.len() {
        if !validate::required_fragment(&registry.fragments[i]) {
            let fragment = &registry.fragments[i];
            let diagnostic = if let Some(id) = &fragment.id {
                Diagnostic::FragmentMissingAttr { fragment: id.clone() }
            } else if let Some(name) = &fragment.name {
                Diagnostic::FragmentMissingAttr {
                    fragment: name.clone(),
                }
            } else {
                Diagnostic::FragmentMissingIdName
            };
            status.add(diagnostic);
            continue;
        }
        // validation guarantees the attributes below are present
        let Some(id) = registry.fragments[i].id.clone() else {
            continue;
        };
        if !seen.insert(id.clone()) {
            continue;
        }
        let Some(plugin_id) = registry.fragments[i].plugin_id.clone() else {
            continue;
        };
        let Some(plugin_version) = registry.fragments[i].plugin_version.clone() else {
            continue;
        };
        match registry.plugin_index_at(&plugin_id, &plugin_version) {
            Some(pd) => registry.plugins[pd].fragments.push(i),
            None => status.add(Diagnostic::FragmentTargetMissing {
                plugin_id,
                fragment_id: id,
            }),
        }
    }
}

/// Fold attached fragment contents into their plugins
pub(crate) fn merge_fragments(registry: &mut PluginRegistry) {
    for pd in 0..registry.plugins.len() {
        if registry.plugins[pd].fragments.is_empty() {
            continue;
        }
        merge_plugin_fragments(registry, pd);
    }
}

/// Merge one plugin's fragments, newest suitable version per fragment id
///
/// A fragment qualifies when its target version agrees with the plugin on
/// major and minor; among those, the greatest fragment version wins and
/// the rest are discarded without diagnostic.
fn merge_plugin_fragments(registry: &mut PluginRegistry, pd: usize) {
    let target_version = registry.plugins[pd].version_id();
    let mut remaining = registry.plugins[pd].fragments.clone();
    while let Some(&first) = remaining.first() {
        let current_id = registry.fragments[first].id.clone();
        let (with_id, later): (Vec<usize>, Vec<usize>) = remaining
            .iter()
            .partition(|&&f| registry.fragments[f].id == current_id);
        remaining = later;

        let mut latest: Option<usize> = None;
        let mut latest_version = None;
        for f in with_id {
            let fragment = &registry.fragments[f];
            let target = fragment.target_version_id();
            if target.major != target_version.major || target.minor != target_version.minor {
                continue;
            }
            let version = fragment.version_id();
            if latest.is_none() || latest_version.is_some_and(|lv| version.is_greater_than(&lv)) {
                latest = Some(f);
                latest_version = Some(version);
            }
        }
        if let Some(f) = latest {
            splice_fragment(registry, f, pd);
        }
    }
}

/// Splice one fragment's contributions into the plugin descriptor
fn splice_fragment(registry: &mut PluginRegistry, f: usize, pd: usize) {
    let fragment = registry.fragments[f].clone();
    trace!(
        fragment = fragment.id.as_deref().unwrap_or(""),
        plugin = registry.plugins[pd].id.as_deref().unwrap_or(""),
        "merging fragment into plugin"
    );
    let plugin = &mut registry.plugins[pd];
    plugin.extensions.extend(fragment.extensions);
    plugin.extension_points.extend(fragment.extension_points);
    plugin.libraries.extend(fragment.libraries);
    plugin.requires.extend(fragment.requires);
}
