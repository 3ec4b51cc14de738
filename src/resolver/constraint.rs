// src/resolver/constraint.rs

//! Constraint index for the dependency walk
//!
//! One [`IndexEntry`] exists per plugin id, holding every declared version
//! of that id in descending order plus the concurrency groups. A group
//! collects prerequisite constraints that one descriptor can satisfy
//! simultaneously; the first group is the base group and outlives its
//! constraints. Additional groups let independent prerequisite chains pin
//! different versions of the same id, but only for library-like plugins
//! with no extension surface.
//!
//! Constraints live in a resolver-scoped arena and are referenced by index
//! everywhere: from groups, from the walk's rollback cookies, and from the
//! prerequisite annotations written after resolution.

use tracing::trace;

use crate::registry::{PluginRegistry, Prerequisite};
use crate::version::{MatchRule, PluginVersion};

pub(crate) type ConstraintId = usize;

/// Identity of a prerequisite: host descriptor index and position within
/// the host's requires list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PrereqRef {
    pub plugin: usize,
    pub index: usize,
}

impl PrereqRef {
    pub(crate) fn get<'r>(&self, registry: &'r PluginRegistry) -> &'r Prerequisite {
        &registry.plugins[self.plugin].requires[self.index]
    }
}

/// One `parent requires child` relation in matchable form
#[derive(Debug, Clone)]
pub(crate) struct Constraint {
    /// Descriptor index of the requiring plugin; `None` for root lookups
    pub parent: Option<usize>,
    pub prereq: Option<PrereqRef>,
    pub version: Option<PluginVersion>,
    pub rule: MatchRule,
    /// Owning group within the target id's entry, once accepted
    pub group: Option<usize>,
}

impl Constraint {
    pub(crate) fn new(
        registry: &PluginRegistry,
        parent: Option<usize>,
        prereq: Option<PrereqRef>,
    ) -> Self {
        let mut version = None;
        let mut rule = MatchRule::Latest;
        if let Some(pref) = prereq {
            let prq = pref.get(registry);
            version = prq.version_id();
            rule = match version {
                None => MatchRule::Latest,
                Some(_) if prq.exact => MatchRule::Exact,
                Some(_) => MatchRule::Compatible,
            };
        }
        Self {
            parent,
            prereq,
            version,
            rule,
            group: None,
        }
    }

    /// Render `parent->target(version,rule)` for trace output
    pub(crate) fn describe(&self, registry: &PluginRegistry) -> String {
        let Some(pref) = self.prereq else {
            return String::from("(root)");
        };
        let parent = self
            .parent
            .and_then(|p| registry.plugins[p].id.clone())
            .unwrap_or_default();
        let prq = pref.get(registry);
        let target = prq.plugin.clone().unwrap_or_default();
        match &prq.version {
            None => format!("{}->{}(any)", parent, target),
            Some(v) => format!("{}->{}({},{})", parent, target, v, self.rule),
        }
    }
}

/// A set of constraints on one id that a single descriptor satisfies
#[derive(Debug, Default)]
pub(crate) struct ConstraintGroup {
    constraints: Vec<ConstraintId>,
    // Tracks the winner as constraints come and go; a change of winner
    // invalidates the group's resolved mark.
    last_resolved: Option<usize>,
    resolved: bool,
    best_match: Option<usize>,
    best_match_enabled: bool,
}

impl ConstraintGroup {
    fn new() -> Self {
        Self::default()
    }
}

/// Per-id version list and concurrency groups
#[derive(Debug)]
pub(crate) struct IndexEntry {
    id: String,
    versions: Vec<usize>,
    groups: Vec<ConstraintGroup>,
}

impl IndexEntry {
    pub(crate) fn new(id: String) -> Self {
        Self {
            id,
            versions: Vec::new(),
            groups: vec![ConstraintGroup::new()],
        }
    }

    /// Descriptor indices for this id, newest first
    pub(crate) fn versions(&self) -> &[usize] {
        &self.versions
    }

    /// Insert a descriptor keeping descending version order; an exact
    /// duplicate of an already-indexed version is ignored.
    pub(crate) fn insert_version(&mut self, pd: usize, registry: &PluginRegistry) {
        let version = registry.plugins[pd].version_id();
        let mut at = self.versions.len();
        for (i, &other) in self.versions.iter().enumerate() {
            let existing = registry.plugins[other].version_id();
            if version == existing {
                return;
            }
            if version.is_greater_than(&existing) {
                at = i;
                break;
            }
        }
        self.versions.insert(at, pd);
    }

    /// The group a constraint belongs to; unowned constraints fall to base
    fn group_of(&self, cid: ConstraintId, arena: &[Constraint]) -> usize {
        arena[cid].group.unwrap_or(0)
    }

    /// Enabled descriptors satisfying every constraint in the group,
    /// newest first
    fn matching_descriptors(
        &self,
        group: usize,
        registry: &PluginRegistry,
        arena: &[Constraint],
    ) -> Vec<usize> {
        let mut constrained: Vec<usize> = self
            .versions
            .iter()
            .copied()
            .filter(|&pd| registry.plugins[pd].enabled)
            .collect();
        for &cid in &self.groups[group].constraints {
            let c = &arena[cid];
            if c.rule == MatchRule::Latest {
                continue;
            }
            let Some(required) = c.version else { continue };
            constrained
                .retain(|&pd| c.rule.satisfies(&registry.plugins[pd].version_id(), &required));
            if constrained.is_empty() {
                break;
            }
        }
        constrained
    }

    fn matching_descriptor(
        &self,
        group: usize,
        registry: &PluginRegistry,
        arena: &[Constraint],
    ) -> Option<usize> {
        self.matching_descriptors(group, registry, arena).first().copied()
    }

    /// Best match for the group a (root) constraint falls under, without
    /// adding the constraint anywhere
    pub(crate) fn matching_descriptor_for(
        &self,
        cid: ConstraintId,
        registry: &PluginRegistry,
        arena: &mut Vec<Constraint>,
    ) -> Option<usize> {
        let group = self.group_of(cid, arena);
        if arena[cid].prereq.is_none() {
            arena[cid].group = Some(group);
        }
        self.matching_descriptor(group, registry, arena)
    }

    /// Tentatively add the constraint to one group; reverted when the
    /// group loses its last satisfier.
    fn add_to_group(
        &mut self,
        group: usize,
        cid: ConstraintId,
        registry: &PluginRegistry,
        arena: &mut Vec<Constraint>,
    ) -> Option<usize> {
        self.groups[group].constraints.push(cid);
        arena[cid].group = Some(group);
        match self.matching_descriptor(group, registry, arena) {
            None => {
                self.groups[group].constraints.pop();
                arena[cid].group = None;
                None
            }
            Some(best) => {
                let entry = &mut self.groups[group];
                if entry.last_resolved != Some(best) {
                    entry.last_resolved = Some(best);
                    entry.resolved = false;
                }
                Some(best)
            }
        }
    }

    /// Place a new constraint, returning the descriptor that now best
    /// satisfies its group
    ///
    /// Walks existing groups first. A group that keeps a satisfier accepts
    /// the constraint outright while there is no concurrency, and otherwise
    /// only when the winner has no extension surface. Failing all groups, a
    /// fresh group is opened, which both the base group's winner and the
    /// new group's winner must permit.
    pub(crate) fn add_constraint(
        &mut self,
        cid: ConstraintId,
        registry: &PluginRegistry,
        arena: &mut Vec<Constraint>,
    ) -> Option<usize> {
        let group_count = self.groups.len();
        for group in 0..self.groups.len() {
            if let Some(best) = self.add_to_group(group, cid, registry, arena) {
                if group_count <= 1 || allows_concurrency(registry, best) {
                    return Some(best);
                }
                // winner publishes extensions; it cannot coexist
                self.remove_constraint(cid, arena);
            }
        }

        match self.matching_descriptor(0, registry, arena) {
            Some(base_best) if allows_concurrency(registry, base_best) => {}
            _ => return None,
        }
        self.groups.push(ConstraintGroup::new());
        let group = self.groups.len() - 1;
        match self.add_to_group(group, cid, registry, arena) {
            Some(best) if allows_concurrency(registry, best) => {
                trace!(
                    id = %self.id,
                    "new concurrency group for {}",
                    arena[cid].describe(registry)
                );
                Some(best)
            }
            Some(_) => {
                self.remove_constraint(cid, arena);
                None
            }
            None => {
                self.groups.pop();
                None
            }
        }
    }

    /// Detach a constraint from its group; an emptied non-base group is
    /// deleted.
    pub(crate) fn remove_constraint(&mut self, cid: ConstraintId, arena: &mut Vec<Constraint>) {
        let group = self.group_of(cid, arena);
        let entry = &mut self.groups[group];
        entry.constraints.retain(|&c| c != cid);
        entry.last_resolved = None;
        entry.resolved = false;
        arena[cid].group = None;
        if group != 0 && self.groups[group].constraints.is_empty() {
            self.groups.remove(group);
            // surviving groups shifted down; re-home their constraints
            for (g, grp) in self.groups.iter().enumerate().skip(group) {
                for &c in &grp.constraints {
                    arena[c].group = Some(g);
                }
            }
        }
    }

    /// Drop every constraint created for the given prerequisite
    pub(crate) fn remove_constraint_for(&mut self, prereq: PrereqRef, arena: &mut Vec<Constraint>) {
        let doomed: Vec<ConstraintId> = self
            .groups
            .iter()
            .flat_map(|g| g.constraints.iter().copied())
            .filter(|&cid| arena[cid].prereq == Some(prereq))
            .collect();
        for cid in doomed {
            trace!(id = %self.id, constraint = cid, "removing constraint");
            self.remove_constraint(cid, arena);
        }
    }

    pub(crate) fn is_resolved_for(&self, cid: ConstraintId, arena: &[Constraint]) -> bool {
        self.groups[self.group_of(cid, arena)].resolved
    }

    pub(crate) fn mark_resolved_for(&mut self, cid: ConstraintId, arena: &[Constraint]) {
        let group = self.group_of(cid, arena);
        self.groups[group].resolved = true;
    }

    /// Number of concurrency groups currently open
    #[cfg(test)]
    pub(crate) fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Pick each group's winner, disable every version, then re-enable
    /// the winners and annotate their prerequisites
    pub(crate) fn resolve_dependencies(
        &mut self,
        roots: &[String],
        registry: &mut PluginRegistry,
        arena: &[Constraint],
    ) {
        for group in 0..self.groups.len() {
            self.preresolve(group, roots, registry, arena);
        }
        for &pd in &self.versions {
            registry.plugins[pd].enabled = false;
        }
        for group in 0..self.groups.len() {
            self.resolve_group(group, registry, arena);
        }
    }

    fn preresolve(
        &mut self,
        group: usize,
        roots: &[String],
        registry: &PluginRegistry,
        arena: &[Constraint],
    ) {
        if self.groups[group].constraints.is_empty() {
            // unconstrained ids only resolve when they are roots; the
            // latest version wins, keeping whatever enabled state it has
            if roots.iter().any(|r| r == &self.id) {
                let best = self.versions.first().copied();
                let entry = &mut self.groups[group];
                entry.best_match = best;
                entry.best_match_enabled =
                    best.map(|pd| registry.plugins[pd].enabled).unwrap_or(false);
            }
        } else {
            let best = self.matching_descriptor(group, registry, arena);
            if best.is_none() {
                trace!(id = %self.id, "no resolved descriptor");
            }
            let entry = &mut self.groups[group];
            entry.best_match = best;
            entry.best_match_enabled = best.is_some();
        }
    }

    fn resolve_group(&self, group: usize, registry: &mut PluginRegistry, arena: &[Constraint]) {
        let entry = &self.groups[group];
        let Some(best) = entry.best_match else { return };
        registry.plugins[best].enabled = entry.best_match_enabled;
        if !entry.best_match_enabled {
            return;
        }
        let version = registry.plugins[best].version_id().to_string();
        for &cid in &entry.constraints {
            if let Some(pref) = arena[cid].prereq {
                registry.plugins[pref.plugin].requires[pref.index].resolved_version =
                    Some(version.clone());
            }
        }
    }
}

/// Concurrent versions are permitted only for plugins with no extension
/// surface: a second contributor to the extension-point graph cannot be
/// represented.
fn allows_concurrency(registry: &PluginRegistry, pd: usize) -> bool {
    let plugin = &registry.plugins[pd];
    plugin.extensions.is_empty() && plugin.extension_points.is_empty()
}
