//! Source and macro-expansion providers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::base::FileId;
use crate::input::ItemStubs;

/// Host-side view of source files.
///
/// The engine identifies files by the opaque [`FileId`] keys this provider
/// hands out; paths only appear at the seam where `mod name;` and `include!`
/// targets are located.
pub trait SourceProvider: Sync {
    /// Pre-parsed declaration surface of a file. `None` for files the host
    /// cannot stub (too large, not source, ..): the owning crate is then
    /// built without that subtree.
    fn stubs(&self, file: FileId) -> Option<Arc<ItemStubs>>;

    /// Cheap change counter for a file, compared before rehashing.
    fn modification_stamp(&self, file: FileId) -> u64;

    /// Resolve `relative` against `dir`, returning the file if it exists.
    fn resolve_relative(&self, dir: &Path, relative: &str) -> Option<FileId>;

    /// Directory containing `file`.
    fn directory(&self, file: FileId) -> Option<PathBuf>;

    /// Whether a previously-missing path now exists. Drives invalidation of
    /// `CrateDefMap::missed_files`.
    fn path_exists(&self, path: &Path) -> bool;
}

/// Declarative-macro expansion, performed by the host's syntax layer.
///
/// The engine hands over the definition body and call body verbatim (both
/// raw text) and receives the expansion already lowered to stubs, as if the
/// items were written at the call site. Returning `None` means the expansion
/// failed; the call is then dropped with a best-effort map, never an error.
pub trait MacroExpander: Sync {
    fn expand(&self, def_body: &str, call_body: &str) -> Option<Arc<ItemStubs>>;
}

/// Expander that expands nothing. Useful for hosts without macro support
/// and for tests that exercise pure item/import resolution.
pub struct NullExpander;

impl MacroExpander for NullExpander {
    fn expand(&self, _def_body: &str, _call_body: &str) -> Option<Arc<ItemStubs>> {
        None
    }
}
