//! Foundation types for the defmap engine.
//!
//! This module provides fundamental types used throughout the crate:
//! - [`CrateId`], [`FileId`] - opaque host-assigned identifiers
//! - [`Name`] - cheap-to-clone identifier strings
//! - [`Namespace`], [`NsSet`] - the namespaces an item can occupy
//! - [`DeclHash`] - structural hash of a declaration surface
//! - [`CancellationToken`] - cooperative cancellation
//!
//! This module has NO dependencies on other defmap modules.

mod cancel;
mod ids;
mod ns;

pub use cancel::{CancellationToken, Cancelled};
pub use ids::{CrateId, DeclHash, FileId};
pub use ns::{Namespace, NsSet};

/// Identifier string: a module, item or macro name, or one path segment.
///
/// `SmolStr` keeps short names inline and makes clones cheap, which matters
/// because names are copied into every `VisItem` and `ModPath`.
pub type Name = smol_str::SmolStr;
