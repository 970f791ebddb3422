//! Shared test support: the fixture DSL and the in-memory project.
#![allow(dead_code)]

pub mod fixture;
pub mod project;

pub use project::TestProject;

use defmap::model::PerNs;

/// Assert a resolution has exactly one types-namespace candidate and return
/// its rendered path.
pub fn single_type_path(per_ns: &PerNs) -> String {
    assert_eq!(
        per_ns.types.len(),
        1,
        "expected exactly one types candidate, got {:?}",
        per_ns.types
    );
    per_ns.types[0].path.to_string()
}

/// Assert a resolution is empty in every namespace.
pub fn assert_unresolved(per_ns: &PerNs) {
    assert!(per_ns.is_empty(), "expected no resolution, got {per_ns:?}");
}
