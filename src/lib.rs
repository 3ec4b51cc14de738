// src/lib.rs

//! Registrar — plugin registry resolution
//!
//! A batch resolver for plugin registries: given a set of declared plugin
//! descriptors with prerequisites, fragments, extensions, extension
//! points, and libraries, it produces a consistent, cross-linked registry
//! in which every enabled plugin's prerequisites are satisfied
//! simultaneously by exactly one concrete version of each referenced
//! plugin.
//!
//! # Architecture
//!
//! - Registry model: flat in-memory store of descriptors and fragments,
//!   cross-referenced by index handles
//! - Version algebra: `major.minor.service` identifiers with exact,
//!   compatible, and latest match arithmetic
//! - Resolver: fragment merging, validation, constraint propagation over a
//!   per-id version index with rollback and orphan recovery, then trim and
//!   extension cross-linking
//!
//! Resolution never fails outright; faults surface as warning diagnostics
//! in the returned [`ResolveStatus`] and the offending descriptors are
//! disabled.

mod error;
pub mod registry;
pub mod resolver;
pub mod version;

pub use error::{Error, Result};
pub use registry::{
    Extension, ExtensionPoint, ExtensionRef, Library, PluginDescriptor, PluginFragment,
    PluginRegistry, Prerequisite,
};
pub use resolver::{Diagnostic, RegistryResolver, ResolveStatus, OPTION_DEBUG_RESOLVE};
pub use version::{MatchRule, PluginVersion};
