// src/resolver/engine.rs

//! The registry resolver
//!
//! Drives the full resolution pass: fragment linkage and merging,
//! required-attribute validation, index construction, root detection, the
//! recursive constraint walk with rollback and orphan recovery, per-id
//! dependency resolution, and the final trim and cross-link of the
//! registry.
//!
//! The walk is a depth-first traversal from the root plugins. Entering a
//! `parent requires child` edge adds a constraint to the child id's index
//! entry; a constraint that no descriptor can satisfy, or a prerequisite
//! revisited along the current path, fails the branch. Failure rolls back
//! every constraint the failing descriptor contributed and records the
//! detached target ids as orphans, which are re-seeded as roots once the
//! current sweep runs dry.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use super::constraint::{Constraint, ConstraintId, IndexEntry, PrereqRef};
use super::fragments;
use super::status::{Diagnostic, ResolveStatus};
use super::validate;
use crate::registry::{ExtensionRef, PluginRegistry};

/// Option key enabling verbose resolution traces
pub const OPTION_DEBUG_RESOLVE: &str = "registry/debug/resolve";

/// Resolves a plugin registry into a consistent, cross-linked state
///
/// # Example
///
/// ```
/// use registrar::{PluginDescriptor, PluginRegistry, Prerequisite, RegistryResolver};
///
/// let mut registry = PluginRegistry::new();
/// registry.add_plugin(
///     PluginDescriptor::new("App", "app", "1.0.0")
///         .with_requires(vec![Prerequisite::new("lib")]),
/// );
/// registry.add_plugin(PluginDescriptor::new("Lib", "lib", "2.1.0"));
///
/// let resolver = RegistryResolver::new();
/// let status = resolver.resolve(&mut registry);
/// assert!(status.is_ok());
/// assert_eq!(
///     registry.plugin("app").unwrap().requires[0].resolved_version.as_deref(),
///     Some("2.1.0"),
/// );
/// ```
pub struct RegistryResolver {
    trim_plugins: bool,
    cross_link: bool,
    debug_resolve: bool,
}

impl RegistryResolver {
    pub fn new() -> Self {
        Self {
            trim_plugins: true,
            cross_link: true,
            debug_resolve: false,
        }
    }

    /// Create a resolver configured from string debug options
    ///
    /// Only [`OPTION_DEBUG_RESOLVE`] is recognised; a case-insensitive
    /// `"true"` enables trace output, anything else leaves it off.
    pub fn with_debug_options(options: &HashMap<String, String>) -> Self {
        let mut resolver = Self::new();
        resolver.debug_resolve = options
            .get(OPTION_DEBUG_RESOLVE)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        resolver
    }

    /// Whether disabled descriptors are removed from the registry after
    /// resolution (default true)
    pub fn set_trim_plugins(&mut self, value: bool) {
        self.trim_plugins = value;
    }

    /// Whether extensions are attached to their extension points after
    /// resolution (default true)
    pub fn set_cross_link(&mut self, value: bool) {
        self.cross_link = value;
    }

    /// Resolve the registry in place
    ///
    /// Idempotent: an already-resolved registry returns an empty OK status
    /// without being touched. Otherwise every fault encountered is recorded
    /// as a warning diagnostic in the returned status and the offending
    /// descriptor disabled; the call itself never fails.
    pub fn resolve(&self, registry: &mut PluginRegistry) -> ResolveStatus {
        if registry.is_resolved() {
            return ResolveStatus::new();
        }
        let mut resolution = Resolution {
            reg: registry,
            index: BTreeMap::new(),
            arena: Vec::new(),
            status: ResolveStatus::new(),
            debug: self.debug_resolve,
        };
        resolution.run(self.trim_plugins, self.cross_link);
        let status = resolution.status;
        registry.mark_resolved();
        status
    }
}

impl Default for RegistryResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Rollback log for one DFS subtree
struct Cookie {
    ok: bool,
    changes: Vec<ConstraintId>,
}

impl Cookie {
    fn new() -> Self {
        Self {
            ok: true,
            changes: Vec::new(),
        }
    }

    /// Record a constraint; refuses when its prerequisite was already
    /// traversed on this path, which signals a loop.
    fn add_change(&mut self, cid: ConstraintId, arena: &[Constraint]) -> bool {
        let prereq = arena[cid].prereq;
        if self.changes.iter().any(|&c| arena[c].prereq == prereq) {
            return false;
        }
        self.changes.push(cid);
        true
    }
}

/// State for a single resolution pass, dropped when it completes
struct Resolution<'a> {
    reg: &'a mut PluginRegistry,
    index: BTreeMap<String, IndexEntry>,
    arena: Vec<Constraint>,
    status: ResolveStatus,
    debug: bool,
}

impl Resolution<'_> {
    fn run(&mut self, trim: bool, cross_link: bool) {
        fragments::link_fragments(self.reg, &mut self.status);
        fragments::merge_fragments(self.reg);
        self.check_required_components();
        self.build_index();

        let mut roots = self.find_roots();
        if roots.is_empty() {
            self.status.add(Diagnostic::UnableToResolve);
            return;
        }
        roots.sort();

        self.walk_roots(&mut roots);
        self.resolve_dependencies(&roots);
        self.link_registry(trim, cross_link);
    }

    /// Disable descriptors missing any required attribute
    fn check_required_components(&mut self) {
        for i in 0..self.reg.plugins.len() {
            if !self.reg.plugins[i].enabled {
                continue;
            }
            if validate::required_plugin_descriptor(&self.reg.plugins[i], self.reg) {
                continue;
            }
            self.reg.plugins[i].enabled = false;
            let pd = &self.reg.plugins[i];
            let diagnostic = if let Some(id) = &pd.id {
                Diagnostic::PluginMissingAttr { plugin: id.clone() }
            } else if let Some(name) = &pd.name {
                Diagnostic::PluginMissingAttr {
                    plugin: name.clone(),
                }
            } else {
                Diagnostic::PluginMissingIdName
            };
            self.status.add(diagnostic);
        }
    }

    /// Index every identified descriptor under its plugin id
    fn build_index(&mut self) {
        for i in 0..self.reg.plugins.len() {
            let Some(id) = self.reg.plugins[i].id.clone() else {
                continue;
            };
            self.index
                .entry(id.clone())
                .or_insert_with(|| IndexEntry::new(id))
                .insert_version(i, self.reg);
        }
    }

    /// Ids that no highest-version descriptor names as a prerequisite
    ///
    /// Only the top version of each id demotes candidates; prerequisites
    /// declared by older versions do not. Every non-highest version of a
    /// root id is disabled here.
    fn find_roots(&mut self) -> Vec<String> {
        let mut candidates: Vec<String> = self.index.keys().cloned().collect();
        for entry in self.index.values() {
            let Some(&top) = entry.versions().first() else {
                continue;
            };
            for prq in &self.reg.plugins[top].requires {
                if let Some(target) = &prq.plugin {
                    candidates.retain(|c| c != target);
                }
            }
        }

        if candidates.is_empty() {
            if self.debug {
                debug!("no roots");
            }
            return candidates;
        }

        for id in &candidates {
            let Some(entry) = self.index.get(id) else {
                continue;
            };
            for (i, &pd) in entry.versions().iter().enumerate() {
                if i == 0 {
                    if self.debug {
                        debug!("root {} {}", id, self.reg.plugins[pd].version_id());
                    }
                } else {
                    if self.debug {
                        debug!("root {} {} disabled", id, self.reg.plugins[pd].version_id());
                    }
                    self.reg.plugins[pd].enabled = false;
                }
            }
        }
        candidates
    }

    /// Walk every root, re-seeding orphaned subtrees as new roots until a
    /// sweep produces none
    fn walk_roots(&mut self, roots: &mut Vec<String>) {
        let mut orphans: Vec<String> = Vec::new();
        let mut i = 0;
        while i < roots.len() {
            let id = roots[i].clone();
            let mut cookie = Cookie::new();
            self.resolve_node(&id, None, None, &mut cookie, &mut orphans);
            i += 1;
            if i == roots.len() {
                let rescued: Vec<String> = orphans
                    .iter()
                    .filter(|o| !roots.contains(o))
                    .cloned()
                    .collect();
                for orphan in rescued {
                    if self.debug {
                        debug!("orphan {}", orphan);
                    }
                    roots.push(orphan);
                }
            }
        }
    }

    /// Recursive constraint setup for one plugin id
    fn resolve_node(
        &mut self,
        child: &str,
        parent: Option<usize>,
        prereq: Option<PrereqRef>,
        cookie: &mut Cookie,
        orphans: &mut Vec<String>,
    ) {
        if self.debug {
            debug!("PUSH> {}", child);
        }

        if !self.index.contains_key(child) {
            if let Some(p) = parent {
                self.status.add(Diagnostic::PrereqDisabled {
                    parent: self.plugin_id(p),
                    child: child.to_string(),
                });
            }
            if self.debug {
                debug!("<POP  {} not found", child);
            }
            cookie.ok = false;
            return;
        }

        self.arena.push(Constraint::new(self.reg, parent, prereq));
        let cid = self.arena.len() - 1;

        let child_pd = match self.index.get_mut(child) {
            Some(entry) if parent.is_some() => {
                entry.add_constraint(cid, &*self.reg, &mut self.arena)
            }
            Some(entry) => entry.matching_descriptor_for(cid, &*self.reg, &mut self.arena),
            None => None,
        };
        let Some(child_pd) = child_pd else {
            if let Some(p) = parent {
                self.status.add(Diagnostic::UnsatisfiedPrereq {
                    parent: self.plugin_id(p),
                    child: child.to_string(),
                });
                if self.debug {
                    debug!("<POP  {} unable to satisfy constraint", child);
                }
            } else if self.debug {
                debug!("<POP  {} no matching descriptor", child);
            }
            cookie.ok = false;
            return;
        };

        if parent.is_some() && !cookie.add_change(cid, &self.arena) {
            let parent_id = parent.map(|p| self.plugin_id(p)).unwrap_or_default();
            self.status.add(Diagnostic::PrereqLoop {
                parent: parent_id,
                child: child.to_string(),
            });
            if self.debug {
                debug!("<POP  {} prerequisite loop", child);
            }
            cookie.ok = false;
            return;
        }

        // subtree already handled for this constraint's group
        if self
            .index
            .get(child)
            .is_some_and(|e| e.is_resolved_for(cid, &self.arena))
        {
            if self.debug {
                debug!("<POP  {} already resolved", child);
            }
            return;
        }

        let prereq_count = self.reg.plugins[child_pd].requires.len();
        for i in 0..prereq_count {
            if !cookie.ok {
                break;
            }
            let Some(target) = self.reg.plugins[child_pd].requires[i].plugin.clone() else {
                continue;
            };
            let pref = PrereqRef {
                plugin: child_pd,
                index: i,
            };
            self.resolve_node(&target, Some(child_pd), Some(pref), cookie, orphans);
        }

        if !cookie.ok {
            // drop everything this descriptor contributed; its freed
            // targets become orphans to retry as roots
            for k in 0..cookie.changes.len() {
                let ccid = cookie.changes[k];
                if self.arena[ccid].parent != Some(child_pd) {
                    continue;
                }
                let Some(pref) = self.arena[ccid].prereq else {
                    continue;
                };
                let Some(target) = self.reg.plugins[pref.plugin].requires[pref.index]
                    .plugin
                    .clone()
                else {
                    continue;
                };
                self.remove_constraint_for(&target, pref);
                if !orphans.contains(&target) {
                    orphans.push(target);
                }
            }
            if let Some(p) = parent {
                self.status.add(Diagnostic::PrereqDisabled {
                    parent: self.plugin_id(p),
                    child: child.to_string(),
                });
            }
            self.reg.plugins[child_pd].enabled = false;
            if self.debug {
                debug!("<POP  {} failed to resolve subtree", child);
            }
            return;
        }

        if let Some(entry) = self.index.get_mut(child) {
            entry.mark_resolved_for(cid, &self.arena);
        }
        if self.debug {
            debug!("<POP  {} {}", child, self.reg.plugins[child_pd].version_id());
        }
    }

    fn remove_constraint_for(&mut self, target: &str, pref: PrereqRef) {
        match self.index.get_mut(target) {
            Some(entry) => entry.remove_constraint_for(pref, &mut self.arena),
            None => {
                if self.debug {
                    debug!("unable to locate index entry for {}", target);
                }
            }
        }
    }

    /// Settle every id on its best-matching versions and annotate
    /// prerequisites with the chosen version strings
    fn resolve_dependencies(&mut self, roots: &[String]) {
        let Resolution {
            reg, index, arena, ..
        } = self;
        let reg = &mut **reg;
        for entry in index.values_mut() {
            entry.resolve_dependencies(roots, reg, arena);
        }
    }

    fn link_registry(&mut self, trim: bool, cross_link: bool) {
        if trim {
            self.trim_registry();
        }
        if cross_link {
            for pd in 0..self.reg.plugins.len() {
                self.link_plugin(pd);
            }
        }
    }

    /// Remove every disabled descriptor from the registry
    fn trim_registry(&mut self) {
        let debug = self.debug;
        self.reg.plugins.retain(|pd| {
            if pd.enabled {
                true
            } else {
                if debug {
                    debug!(
                        "removing {} {}",
                        pd.id.as_deref().unwrap_or(""),
                        pd.version_id()
                    );
                }
                false
            }
        });
    }

    fn link_plugin(&mut self, pd: usize) {
        if !self.reg.plugins[pd].enabled || self.reg.plugins[pd].extensions.is_empty() {
            // extensions of disabled plugins stay unlinked
            return;
        }
        for ext in 0..self.reg.plugins[pd].extensions.len() {
            self.link_extension(pd, ext);
        }
    }

    /// Attach one extension to the extension point it targets
    fn link_extension(&mut self, host: usize, ext: usize) {
        let Some(target) = self.reg.plugins[host].extensions[ext].extension_point.clone() else {
            return;
        };
        let host_id = self.plugin_id(host);

        let Some((plugin_id, point_id)) = target.rsplit_once('.') else {
            self.status.add(Diagnostic::ExtensionPointUnknown {
                target,
                plugin: host_id,
            });
            return;
        };
        let Some(target_pd) = self
            .reg
            .plugins
            .iter()
            .position(|p| p.id.as_deref() == Some(plugin_id))
        else {
            self.status.add(Diagnostic::ExtensionPointUnknown {
                target,
                plugin: host_id,
            });
            return;
        };
        if !self.reg.plugins[target_pd].enabled {
            self.status.add(Diagnostic::ExtensionPointDisabled {
                target,
                plugin: host_id,
            });
            return;
        }

        let host_version = self.reg.plugins[host].version.clone().unwrap_or_default();
        let point = self.reg.plugins[target_pd]
            .extension_points
            .iter_mut()
            .find(|pt| pt.id.as_deref() == Some(point_id));
        match point {
            Some(pt) => pt.extensions.push(ExtensionRef {
                plugin_id: host_id,
                plugin_version: host_version,
                extension: ext,
            }),
            None => self.status.add(Diagnostic::ExtensionPointUnknown {
                target,
                plugin: host_id,
            }),
        }
    }

    fn plugin_id(&self, pd: usize) -> String {
        self.reg.plugins[pd].id.clone().unwrap_or_default()
    }
}
