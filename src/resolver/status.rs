// src/resolver/status.rs

//! Diagnostics accumulated during registry resolution
//!
//! Resolution never aborts on a bad descriptor; every fault is recorded as
//! one warning-level diagnostic and the offending descriptor is disabled.
//! The full set is returned to the caller as a [`ResolveStatus`].

use std::fmt;

/// A single resolution fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A fragment is missing one of its required attributes
    FragmentMissingAttr { fragment: String },
    /// A fragment carries neither an id nor a name
    FragmentMissingIdName,
    /// A fragment names a `(plugin, version)` pair absent from the registry
    FragmentTargetMissing { plugin_id: String, fragment_id: String },
    /// A plugin descriptor is missing one of its required attributes
    PluginMissingAttr { plugin: String },
    /// A plugin descriptor carries neither an id nor a name
    PluginMissingIdName,
    /// A prerequisite names a plugin id with no usable descriptor
    PrereqDisabled { parent: String, child: String },
    /// The dependency walk revisited the same prerequisite
    PrereqLoop { parent: String, child: String },
    /// No descriptor satisfies the combined constraints on a plugin id
    UnsatisfiedPrereq { parent: String, child: String },
    /// An extension targets an unknown plugin or extension point
    ExtensionPointUnknown { target: String, plugin: String },
    /// An extension targets an extension point in a disabled plugin
    ExtensionPointDisabled { target: String, plugin: String },
    /// The registry has no root plugins to resolve from
    UnableToResolve,
}

impl Diagnostic {
    /// Stable message identifier for this diagnostic kind
    pub fn code(&self) -> &'static str {
        match self {
            Diagnostic::FragmentMissingAttr { .. } => "parse.fragmentMissingAttr",
            Diagnostic::FragmentMissingIdName => "parse.fragmentMissingIdName",
            Diagnostic::FragmentTargetMissing { .. } => "parse.missingFragmentPd",
            Diagnostic::PluginMissingAttr { .. } => "parse.pluginMissingAttr",
            Diagnostic::PluginMissingIdName => "parse.pluginMissingIdName",
            Diagnostic::PrereqDisabled { .. } => "parse.prereqDisabled",
            Diagnostic::PrereqLoop { .. } => "parse.prereqLoop",
            Diagnostic::UnsatisfiedPrereq { .. } => "parse.unsatisfiedPrereq",
            Diagnostic::ExtensionPointUnknown { .. } => "parse.extPointUnknown",
            Diagnostic::ExtensionPointDisabled { .. } => "parse.extPointDisabled",
            Diagnostic::UnableToResolve => "plugin.unableToResolve",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::FragmentMissingAttr { fragment } => {
                write!(f, "Fragment {} ignored: required attribute missing", fragment)
            }
            Diagnostic::FragmentMissingIdName => {
                write!(f, "Fragment ignored: both id and name are missing")
            }
            Diagnostic::FragmentTargetMissing {
                plugin_id,
                fragment_id,
            } => write!(
                f,
                "Plugin {} not found for fragment {}; fragment ignored",
                plugin_id, fragment_id
            ),
            Diagnostic::PluginMissingAttr { plugin } => {
                write!(f, "Plugin {} disabled: required attribute missing", plugin)
            }
            Diagnostic::PluginMissingIdName => {
                write!(f, "Plugin disabled: both id and name are missing")
            }
            Diagnostic::PrereqDisabled { parent, child } => write!(
                f,
                "Plugin {} disabled: prerequisite plugin {} is missing or disabled",
                parent, child
            ),
            Diagnostic::PrereqLoop { parent, child } => {
                write!(f, "Prerequisite loop detected from {} to {}", parent, child)
            }
            Diagnostic::UnsatisfiedPrereq { parent, child } => write!(
                f,
                "Plugin {} disabled: no version of prerequisite plugin {} satisfies its constraints",
                parent, child
            ),
            Diagnostic::ExtensionPointUnknown { target, plugin } => write!(
                f,
                "Extension point {} referenced by plugin {} is unknown",
                target, plugin
            ),
            Diagnostic::ExtensionPointDisabled { target, plugin } => write!(
                f,
                "Extension point {} referenced by plugin {} belongs to a disabled plugin",
                target, plugin
            ),
            Diagnostic::UnableToResolve => {
                write!(f, "Unable to resolve plugin registry: no root plugins found")
            }
        }
    }
}

/// Append-only collection of diagnostics returned by `resolve`
#[derive(Debug, Clone, Default)]
pub struct ResolveStatus {
    diagnostics: Vec<Diagnostic>,
}

impl ResolveStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// True when resolution produced no diagnostics
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Diagnostics in the order they were produced
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Diagnostics carrying the given message identifier
    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.code() == code)
    }
}

impl fmt::Display for ResolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.diagnostics.is_empty() {
            return write!(f, "OK");
        }
        for (i, d) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", d.code(), d)?;
        }
        Ok(())
    }
}
