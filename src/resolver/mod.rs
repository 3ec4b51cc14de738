// src/resolver/mod.rs

//! Registry resolution: constraint solving, rollback, and cross-linking
//!
//! This module turns a registry of declared plugin descriptors into a
//! consistent runtime view: fragments merged into their plugins, exactly
//! one enabled version per constrained plugin id (more only for
//! library-like plugins pinned to different versions by independent
//! chains), prerequisites annotated with the versions they resolved to,
//! and extensions attached to their extension points.

mod constraint;
mod engine;
mod fragments;
mod status;
mod validate;

pub use engine::{RegistryResolver, OPTION_DEBUG_RESOLVE};
pub use status::{Diagnostic, ResolveStatus};
