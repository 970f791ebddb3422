//! # defmap
//!
//! Incremental name resolution for a graph of crates: given per-module item
//! stubs supplied by a host (parser, IDE, build tool), build one `CrateDefMap`
//! per crate mapping every syntactic path to the item(s) it denotes, with
//! glob imports, cfg-conditional compilation, declarative macro expansion and
//! visibility handled by a fixed-point resolver.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! build     → per-crate build facade, dependency-ordered parallel scheduler
//!   ↓
//! service   → per-crate DefMapHolder cache, rebuild/recheck invalidation
//!   ↓
//! collect   → ModCollector (stub walk) + DefCollector (fixed point)
//!   ↓
//! resolve   → pure path resolution against a CrateDefMap
//!   ↓
//! hash      → structural declaration-surface hashing, change detection
//!   ↓
//! model     → ModPath, Visibility, PerNs, ModData tree, CrateDefMap
//!   ↓
//! input     → host collaborator surface: item stubs, cfg, crate graph
//!   ↓
//! base      → primitives (CrateId, FileId, Name, cancellation)
//! ```
//!
//! The engine never parses text and never touches the file system directly:
//! both live behind the `input` traits. Resolution failures are data, not
//! errors. An unresolved path is the expected steady state for code that is
//! still being typed.

/// Foundation types: CrateId, FileId, Name, namespaces, cancellation
pub mod base;

/// Host collaborator surface: item stubs, cfg expressions, crate graph,
/// source provider, macro expander
pub mod input;

/// Resolved data model: module tree, visibility, per-namespace candidates
pub mod model;

/// Structural hashing of a file's declaration surface
pub mod hash;

/// Path resolution against a built `CrateDefMap`
pub mod resolve;

/// Item collection and the import/macro fixed-point resolver
pub mod collect;

/// Per-crate cache of built maps and the invalidation state machine
pub mod service;

/// Build facade and the cross-crate parallel scheduler
pub mod build;

pub use base::{CancellationToken, Cancelled, CrateId, DeclHash, FileId, Name, Namespace, NsSet};
pub use build::{BuildError, BuildSources, get_or_update_if_needed};
pub use model::{CrateDefMap, ModId, ModPath, PerNs, VisItem, Visibility};
pub use resolve::{ResolveMode, ResolvePathResult};
pub use service::DefMapService;
