//! Item collection and the fixed-point resolver.
//!
//! [`ModCollector`](mod_collector) walks one items-owner's stubs and turns
//! them into scope entries, pending [`Import`]s and pending
//! [`MacroCallInfo`]s; it resolves nothing. [`DefCollector`] then drives the
//! fixed point: resolve imports, expand macros, collect the expansions, and
//! repeat until a full pass changes nothing.

mod def_collector;
mod mod_collector;

pub use def_collector::DefCollector;

use std::sync::Arc;

use crate::base::{CancellationToken, CrateId, FileId, Name};
use crate::input::{CrateInfo, MacroExpander, SourceProvider};
use crate::model::{MacroIndex, ModId, PerNs, Visibility};

/// Bound on macro-expansion nesting; recursive macros terminate here.
pub(crate) const EXPANSION_RECURSION_LIMIT: u32 = 128;

/// Safety bound on glob-import replay. A valid program reaches its fixed
/// point far below this; hitting it is a defect signal, handled by logging
/// and truncating rather than unwinding.
pub(crate) const GLOB_RECURSION_LIMIT: u32 = 100;

/// Everything a crate build borrows from its environment.
pub struct CollectorInputs<'a> {
    pub crate_id: CrateId,
    pub info: Arc<CrateInfo>,
    pub source: &'a dyn SourceProvider,
    pub expander: &'a dyn MacroExpander,
    pub cancel: &'a CancellationToken,
}

/// A `use`/`extern crate` item waiting for resolution.
#[derive(Clone, Debug)]
pub struct Import {
    pub containing_mod: ModId,
    pub use_path: Vec<Name>,
    /// Name the import binds; the alias when one was written.
    pub name_in_scope: Name,
    pub visibility: Visibility,
    pub is_glob: bool,
    pub is_extern_crate: bool,
    /// `#[prelude_import]` glob, which replaces the crate's prelude.
    pub is_prelude: bool,
    /// Crate a `$crate` leading segment refers to, when the import came out
    /// of a macro expansion.
    pub dollar_crate: Option<CrateId>,
    pub status: PartialResolvedImport,
}

#[derive(Clone, PartialEq, Debug)]
pub enum PartialResolvedImport {
    /// No namespace resolved yet.
    Unresolved,
    /// Some namespace resolved; retried every pass, but its partial result
    /// is already recorded so progress propagates.
    Indeterminate(PerNs),
    /// All namespaces resolved, or the path crossed into a finished crate.
    Resolved(PerNs),
}

/// A macro call waiting for its definition (and then expansion).
#[derive(Clone, Debug)]
pub struct MacroCallInfo {
    pub containing_mod: ModId,
    pub macro_index: MacroIndex,
    pub path: Vec<Name>,
    /// Raw body text, handed to the expander (or, for `include!`, the
    /// target path).
    pub body: String,
    /// File the call textually sits in; `include!` resolves relative to it.
    pub containing_file: Option<FileId>,
    /// Expansion nesting depth of the call site.
    pub depth: u32,
    pub dollar_crate: Option<CrateId>,
}
