//! The crate graph provider.
//!
//! Supplies crate identity, edition, cfg configuration, environment and the
//! dependency list. Dependency order is what the scheduler builds on: the
//! provider must hand out a topological order with dependencies first.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::base::{CrateId, FileId, Name};
use crate::input::CfgOptions;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Edition {
    Edition2015,
    Edition2018,
    Edition2021,
    Edition2024,
}

/// One direct dependency edge: `name` is how the dependent refers to it
/// (the extern-prelude name), which can differ from the dependency's own
/// package name under Cargo renames.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Dependency {
    pub name: Name,
    pub crate_id: CrateId,
}

/// Everything the engine knows about one crate.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CrateInfo {
    pub name: Name,
    pub edition: Edition,
    pub cfg_options: Arc<CfgOptions>,
    pub env: FxHashMap<String, String>,
    pub dependencies: Vec<Dependency>,
    pub root_file: FileId,
}

/// Host-side crate graph.
///
/// `Sync` because the scheduler queries it from worker threads.
pub trait CrateGraph: Sync {
    fn crate_info(&self, krate: CrateId) -> Option<Arc<CrateInfo>>;

    /// All crates, dependencies before dependents.
    fn topo_sorted(&self) -> Vec<CrateId>;

    /// Direct reverse dependencies of `krate`.
    fn reverse_dependencies(&self, krate: CrateId) -> Vec<CrateId>;

    /// Transitive dependencies of `krate`, in no particular order.
    fn flat_dependencies(&self, krate: CrateId) -> Vec<CrateId> {
        let mut seen: Vec<CrateId> = Vec::new();
        let mut queue: Vec<CrateId> = vec![krate];
        while let Some(current) = queue.pop() {
            let Some(info) = self.crate_info(current) else { continue };
            for dep in &info.dependencies {
                if !seen.contains(&dep.crate_id) {
                    seen.push(dep.crate_id);
                    queue.push(dep.crate_id);
                }
            }
        }
        seen
    }
}
