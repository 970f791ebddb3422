//! Building def maps: the per-crate facade and the cross-crate scheduler.
//!
//! The scheduler walks the crate graph in dependency order, rebuilding only
//! crates whose holders say so, in parallel where the graph allows it. A
//! crate's build only ever sees finished dependency maps: a crate is
//! submitted to the pool when its last in-flight dependency completes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::base::{CancellationToken, Cancelled, CrateId};
use crate::collect::{CollectorInputs, DefCollector};
use crate::hash::is_crate_changed;
use crate::input::{CrateGraph, CrateInfo, MacroExpander, SourceProvider};
use crate::model::{CrateDefMap, CrateMetaData, MacroIndex, ModData, ModPath};
use crate::service::{DefMapHolder, DefMapService};

/// The three host collaborators a build borrows.
pub struct BuildSources<'a> {
    pub graph: &'a dyn CrateGraph,
    pub source: &'a dyn SourceProvider,
    pub expander: &'a dyn MacroExpander,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    #[error("crate {0} is missing from the crate graph")]
    MissingCrateInfo(CrateId),
}

/// Build one crate's def map from source truth.
///
/// Returns `Ok(None)` when the crate is structurally unindexable (its root
/// file has no stubs); that is a best-effort outcome, not an error.
pub fn build_def_map(
    crate_id: CrateId,
    info: &Arc<CrateInfo>,
    dependencies: FxHashMap<CrateId, Arc<CrateDefMap>>,
    sources: &BuildSources<'_>,
    cancel: &CancellationToken,
) -> Result<Option<CrateDefMap>, BuildError> {
    cancel.check()?;
    let Some(root_stubs) = sources.source.stubs(info.root_file) else {
        tracing::warn!(krate = %info.name, "crate root not indexable, skipping build");
        return Ok(None);
    };

    let root_enabled_inner = root_stubs
        .inner_cfg
        .as_ref()
        .is_none_or(|expr| expr.eval(&info.cfg_options));
    let root_mod_macro_index = dependencies
        .values()
        .map(|dep| dep.root_mod_macro_index + 1)
        .max()
        .unwrap_or(0);
    let root_data = ModData::new(
        None,
        ModPath::root(crate_id),
        MacroIndex::root(root_mod_macro_index),
        true,
        root_enabled_inner,
        Some(info.root_file),
        String::new(),
        sources.source.directory(info.root_file),
        root_stubs.inner_macro_use,
        false,
    );
    let def_map = CrateDefMap::new(
        crate_id,
        CrateMetaData::new(info),
        dependencies,
        root_data,
        root_mod_macro_index,
    );

    let inputs = CollectorInputs {
        crate_id,
        info: info.clone(),
        source: sources.source,
        expander: sources.expander,
        cancel,
    };
    let mut collector = DefCollector::new(def_map, inputs);
    collector.collect_root()?;
    collector.collect()?;
    let def_map = collector.finish();

    if cfg!(debug_assertions) && is_crate_changed(&def_map, info, sources.source) {
        tracing::error!(krate = %info.name, "def map considered outdated immediately after build");
    }
    Ok(Some(def_map))
}

/// Return up-to-date def maps for `crates`, rebuilding them and any stale
/// (reverse) dependencies first.
///
/// The stamp comparison outside the lock is the fast path; everything else
/// runs under the service's build lock. Cancellation mid-batch leaves the
/// unbuilt crates marked rebuild-needed, so the next call resumes where
/// this one stopped.
pub fn get_or_update_if_needed(
    service: &DefMapService,
    sources: &BuildSources<'_>,
    cancel: &CancellationToken,
    crates: &[CrateId],
) -> Result<FxHashMap<CrateId, Option<Arc<CrateDefMap>>>, BuildError> {
    fn current_maps(
        holders: &[Arc<DefMapHolder>],
    ) -> FxHashMap<CrateId, Option<Arc<CrateDefMap>>> {
        holders.iter().map(|holder| (holder.crate_id(), holder.def_map())).collect()
    }

    let holders: Vec<_> = crates.iter().map(|&crate_id| service.holder(crate_id)).collect();
    if holders.iter().all(|holder| holder.has_latest_stamp()) {
        return Ok(current_maps(&holders));
    }

    let _guard = service.build_lock.lock();
    if holders.iter().all(|holder| holder.has_latest_stamp()) {
        return Ok(current_maps(&holders));
    }
    DefMapUpdater::new(Some(crates), service, sources, cancel).run()?;
    Ok(current_maps(&holders))
}

/// Rebuild whatever is stale across the whole crate graph.
pub fn update_all_crates(
    service: &DefMapService,
    sources: &BuildSources<'_>,
    cancel: &CancellationToken,
) -> Result<(), BuildError> {
    let _guard = service.build_lock.lock();
    DefMapUpdater::new(None, service, sources, cancel).run()
}

/// Decides which crates rebuild, expands the set to reverse dependents and
/// hands the result to [`DefMapsBuilder`].
struct DefMapUpdater<'a> {
    service: &'a DefMapService,
    sources: &'a BuildSources<'a>,
    cancel: &'a CancellationToken,
    /// Crates in scope for this update, topologically sorted: the requested
    /// roots plus all of their dependencies (or the whole graph).
    scope: Vec<CrateId>,
    topo_all: Vec<CrateId>,
}

impl<'a> DefMapUpdater<'a> {
    fn new(
        root_crates: Option<&[CrateId]>,
        service: &'a DefMapService,
        sources: &'a BuildSources<'a>,
        cancel: &'a CancellationToken,
    ) -> DefMapUpdater<'a> {
        let topo_all = sources.graph.topo_sorted();
        let scope = match root_crates {
            None => topo_all.clone(),
            Some(roots) => {
                let mut in_scope: FxHashSet<CrateId> = roots.iter().copied().collect();
                for &root in roots {
                    in_scope.extend(sources.graph.flat_dependencies(root));
                }
                topo_all.iter().copied().filter(|crate_id| in_scope.contains(crate_id)).collect()
            }
        };
        DefMapUpdater { service, sources, cancel, scope, topo_all }
    }

    fn run(&self) -> Result<(), BuildError> {
        self.cancel.check()?;
        let started = Instant::now();

        let to_check: Vec<CrateId> = self
            .scope
            .iter()
            .copied()
            .filter(|&crate_id| !self.service.holder(crate_id).has_latest_stamp())
            .collect();
        let to_update = self.find_crates_to_update(&to_check)?;

        self.service.remove_stale_def_maps(&self.topo_all);
        if to_update.is_empty() {
            return Ok(());
        }

        // Reverse dependents may consume items that changed, so they
        // rebuild too. Marking them rebuild-needed up front means a
        // cancelled batch resumes coherently later.
        let with_reverse = self.with_reverse_dependencies(&to_update);
        for &crate_id in &with_reverse {
            self.service.holder(crate_id).set_should_rebuild();
        }
        let to_build: Vec<CrateId> = self
            .scope
            .iter()
            .copied()
            .filter(|crate_id| with_reverse.contains(crate_id))
            .collect();

        let updated = to_build.len();
        DefMapsBuilder::new(self.service, self.sources, self.cancel, to_build).build()?;
        tracing::info!(
            crates = updated,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "updated def maps"
        );
        Ok(())
    }

    /// Evaluate the holders' accumulated triggers; checking is hash work,
    /// so crates are checked in parallel when there are several.
    fn find_crates_to_update(&self, to_check: &[CrateId]) -> Result<Vec<CrateId>, BuildError> {
        use rayon::prelude::*;

        let needs_update = |crate_id: CrateId| -> Option<CrateId> {
            let Some(info) = self.sources.graph.crate_info(crate_id) else {
                // not in the graph anymore; removed as stale below
                return None;
            };
            self.service
                .holder(crate_id)
                .update_should_rebuild(&info, self.sources.source)
                .then_some(crate_id)
        };

        let to_update: Vec<CrateId> = if to_check.len() > 1 {
            to_check.par_iter().filter_map(|&crate_id| needs_update(crate_id)).collect()
        } else {
            to_check.iter().filter_map(|&crate_id| needs_update(crate_id)).collect()
        };
        self.cancel.check()?;
        // parallel filtering loses dependency order; restore it
        Ok(self
            .scope
            .iter()
            .copied()
            .filter(|crate_id| to_update.contains(crate_id))
            .collect())
    }

    fn with_reverse_dependencies(&self, crates: &[CrateId]) -> FxHashSet<CrateId> {
        let mut result: FxHashSet<CrateId> = FxHashSet::default();
        let mut queue: Vec<CrateId> = crates.to_vec();
        while let Some(crate_id) = queue.pop() {
            if !result.insert(crate_id) {
                continue;
            }
            queue.extend(self.sources.graph.reverse_dependencies(crate_id));
        }
        result
    }
}

/// Builds a topologically-sorted batch of crates on the rayon pool.
///
/// Each crate tracks how many of its dependencies are still in flight;
/// crates at zero are spawned immediately, and completing a crate submits
/// any reverse dependent that reaches zero. The first error wins and later
/// tasks bail out early.
struct DefMapsBuilder<'a> {
    service: &'a DefMapService,
    sources: &'a BuildSources<'a>,
    cancel: &'a CancellationToken,
    crates: Vec<CrateId>,
    crate_set: FxHashSet<CrateId>,
    /// dep -> dependents, edges within the batch
    dependents: FxHashMap<CrateId, Vec<CrateId>>,
    remaining_deps: FxHashMap<CrateId, AtomicUsize>,
    /// Finished maps usable as dependency snapshots, pre-seeded with the
    /// published maps of crates that are not being rebuilt.
    built: Mutex<FxHashMap<CrateId, Arc<CrateDefMap>>>,
    error: Mutex<Option<BuildError>>,
}

impl<'a> DefMapsBuilder<'a> {
    fn new(
        service: &'a DefMapService,
        sources: &'a BuildSources<'a>,
        cancel: &'a CancellationToken,
        crates: Vec<CrateId>,
    ) -> DefMapsBuilder<'a> {
        let crate_set: FxHashSet<CrateId> = crates.iter().copied().collect();

        let mut dependents: FxHashMap<CrateId, Vec<CrateId>> = FxHashMap::default();
        let mut remaining_deps: FxHashMap<CrateId, AtomicUsize> = FxHashMap::default();
        let mut built: FxHashMap<CrateId, Arc<CrateDefMap>> = FxHashMap::default();

        for &crate_id in &crates {
            let mut in_batch_deps = 0;
            if let Some(info) = sources.graph.crate_info(crate_id) {
                for dep in &info.dependencies {
                    if crate_set.contains(&dep.crate_id) {
                        in_batch_deps += 1;
                        dependents.entry(dep.crate_id).or_default().push(crate_id);
                    }
                }
            }
            remaining_deps.insert(crate_id, AtomicUsize::new(in_batch_deps));

            // reused dependency maps: crates outside the batch keep their
            // published map and never occupy a worker
            for dep in sources.graph.flat_dependencies(crate_id) {
                if !crate_set.contains(&dep) {
                    if let Some(map) = service.def_map(dep) {
                        built.insert(dep, map);
                    }
                }
            }
        }

        DefMapsBuilder {
            service,
            sources,
            cancel,
            crates,
            crate_set,
            dependents,
            remaining_deps,
            built: Mutex::new(built),
            error: Mutex::new(None),
        }
    }

    fn build(&self) -> Result<(), BuildError> {
        let ready: Vec<CrateId> = self
            .crates
            .iter()
            .copied()
            .filter(|crate_id| {
                self.remaining_deps[crate_id].load(Ordering::Acquire) == 0
            })
            .collect();
        if ready.is_empty() && !self.crates.is_empty() {
            tracing::error!("dependency cycle in crate batch, nothing is ready to build");
            return Ok(());
        }

        rayon::scope(|scope| {
            for crate_id in ready {
                scope.spawn(move |scope| self.build_crate(scope, crate_id));
            }
        });

        match self.error.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn build_crate<'s>(&'s self, scope: &rayon::Scope<'s>, crate_id: CrateId) {
        if self.error.lock().is_some() || self.cancel.is_cancelled() {
            // fail fast; unbuilt crates stay rebuild-marked
            return;
        }
        let Some(info) = self.sources.graph.crate_info(crate_id) else {
            *self.error.lock() = Some(BuildError::MissingCrateInfo(crate_id));
            return;
        };

        let dependency_maps: FxHashMap<CrateId, Arc<CrateDefMap>> = {
            let built = self.built.lock();
            self.sources
                .graph
                .flat_dependencies(crate_id)
                .into_iter()
                .filter_map(|dep| built.get(&dep).map(|map| (dep, map.clone())))
                .collect()
        };

        match build_def_map(crate_id, &info, dependency_maps, self.sources, self.cancel) {
            Ok(def_map) => {
                let def_map = def_map.map(Arc::new);
                if let Some(def_map) = &def_map {
                    self.built.lock().insert(crate_id, def_map.clone());
                }
                self.service.set_def_map(crate_id, def_map);
                self.submit_ready_dependents(scope, crate_id);
            }
            Err(error) => {
                let mut slot = self.error.lock();
                if slot.is_none() {
                    *slot = Some(error);
                }
            }
        }
    }

    fn submit_ready_dependents<'s>(&'s self, scope: &rayon::Scope<'s>, finished: CrateId) {
        let Some(dependents) = self.dependents.get(&finished) else {
            return;
        };
        for &dependent in dependents {
            debug_assert!(self.crate_set.contains(&dependent));
            let remaining = self.remaining_deps[&dependent].fetch_sub(1, Ordering::AcqRel);
            if remaining == 1 {
                scope.spawn(move |scope| self.build_crate(scope, dependent));
            }
        }
    }
}
