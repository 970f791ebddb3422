//! Per-crate cache of built def maps and the invalidation state machine.
//!
//! Nothing here rebuilds anything: the service accumulates invalidation
//! triggers (structural, coarse, per-file) and answers "does this crate
//! need a rebuild" when the scheduler asks. Three triggers accumulate
//! independently per crate:
//!
//! - `should_rebuild`: structural (metadata change, never built); it
//!   supersedes and clears the other two.
//! - `should_recheck`: coarse ("something changed somewhere, re-verify
//!   every file hash"); promotes to a full file enumeration once, then
//!   clears itself.
//! - `changed_files`: specific files the host flagged dirty.
//!
//! Freshness is a stamp compared against a global structure version: every
//! trigger decrements the stamp, a successful rebuild captures the current
//! version, an interrupted rebuild leaves the stamp behind so the next
//! attempt resumes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::base::{CrateId, FileId};
use crate::hash::{any_file_changed, is_crate_changed, is_file_changed};
use crate::input::{CrateInfo, SourceProvider};
use crate::model::CrateDefMap;

/// Stores one crate's latest [`CrateDefMap`] and the state needed to decide
/// whether it is still valid.
pub struct DefMapHolder {
    crate_id: CrateId,
    def_map: RwLock<Option<Arc<CrateDefMap>>>,
    /// Value of the global structure version captured when `def_map` was
    /// last known fresh. Decremented (never advanced) by triggers, so a
    /// fresh holder always compares unequal after any event.
    stamp: AtomicI64,
    should_rebuild: AtomicBool,
    should_recheck: AtomicBool,
    changed_files: Mutex<FxHashSet<FileId>>,
    structure_version: Arc<AtomicI64>,
}

impl DefMapHolder {
    fn new(crate_id: CrateId, structure_version: Arc<AtomicI64>) -> DefMapHolder {
        DefMapHolder {
            crate_id,
            def_map: RwLock::new(None),
            stamp: AtomicI64::new(-1),
            should_rebuild: AtomicBool::new(true),
            should_recheck: AtomicBool::new(false),
            changed_files: Mutex::new(FxHashSet::default()),
            structure_version,
        }
    }

    pub fn crate_id(&self) -> CrateId {
        self.crate_id
    }

    /// Published map, if any. Lock-free for practical purposes: the map
    /// behind the Arc is immutable, the RwLock only guards the slot.
    pub fn def_map(&self) -> Option<Arc<CrateDefMap>> {
        self.def_map.read().clone()
    }

    /// O(1) fast path: nothing observable changed since the last rebuild.
    pub fn has_latest_stamp(&self) -> bool {
        self.stamp.load(Ordering::Acquire) == self.structure_version.load(Ordering::Acquire)
    }

    fn capture_latest_stamp(&self) {
        self.stamp
            .store(self.structure_version.load(Ordering::Acquire), Ordering::Release);
    }

    fn outdate_stamp(&self) {
        self.stamp.fetch_sub(1, Ordering::AcqRel);
    }

    /// Structural trigger. Supersedes and clears the finer triggers.
    pub fn set_should_rebuild(&self) {
        self.should_rebuild.store(true, Ordering::Release);
        self.outdate_stamp();
        self.should_recheck.store(false, Ordering::Release);
        self.changed_files.lock().clear();
    }

    /// Coarse trigger: verify every file hash on the next check.
    pub fn set_should_recheck(&self) {
        self.should_recheck.store(true, Ordering::Release);
        self.outdate_stamp();
    }

    /// Fine trigger: one file the host saw change.
    pub fn add_changed_file(&self, file: FileId) {
        self.changed_files.lock().insert(file);
        self.outdate_stamp();
    }

    /// Publish a freshly built map (or `None` for an unindexable crate) and
    /// capture the stamp. Only a completed build may call this.
    pub fn set_def_map(&self, def_map: Option<Arc<CrateDefMap>>) {
        *self.def_map.write() = def_map;
        self.should_rebuild.store(false, Ordering::Release);
        self.capture_latest_stamp();
    }

    /// Resolve the accumulated triggers to a rebuild decision, without
    /// false negatives. A false answer also captures the stamp, so the fast
    /// path holds until the next trigger.
    pub fn update_should_rebuild(
        &self,
        info: &CrateInfo,
        provider: &dyn SourceProvider,
    ) -> bool {
        let rebuild = self.compute_should_rebuild(info, provider);
        if rebuild {
            self.set_should_rebuild();
        } else {
            self.capture_latest_stamp();
        }
        rebuild
    }

    fn compute_should_rebuild(&self, info: &CrateInfo, provider: &dyn SourceProvider) -> bool {
        if self.should_rebuild.load(Ordering::Acquire) {
            return true;
        }
        let Some(def_map) = self.def_map() else {
            return true;
        };
        if is_crate_changed(&def_map, info, provider) {
            return true;
        }
        // recheck promotes to a full enumeration exactly once
        if self.should_recheck.swap(false, Ordering::AcqRel)
            && any_file_changed(provider, info, &def_map)
        {
            return true;
        }
        // changed files must be consulted even when everything above said
        // no; a file whose declared surface is untouched is then proven
        // harmless and dropped
        let changed_files: Vec<FileId> = self.changed_files.lock().drain().collect();
        changed_files
            .into_iter()
            .any(|file| is_file_changed(provider, info, &def_map, file))
    }
}

/// Session-wide resolution cache: one [`DefMapHolder`] per crate, the
/// global build lock, and the reverse indices that route file events to
/// crates. Constructed once per session, dropped with it.
pub struct DefMapService {
    holders: Mutex<FxHashMap<CrateId, Arc<DefMapHolder>>>,
    /// Coarse lock serializing build batches. Holder state has its own
    /// fine-grained locks; published maps are read without any lock.
    pub build_lock: Mutex<()>,
    file_to_crates: Mutex<FxHashMap<FileId, Vec<CrateId>>>,
    /// Merged `missed_files` across crates: creating one of these paths
    /// must trigger the owning crate's rebuild.
    missed_files: Mutex<FxHashMap<PathBuf, Vec<CrateId>>>,
    structure_version: Arc<AtomicI64>,
}

impl Default for DefMapService {
    fn default() -> DefMapService {
        DefMapService::new()
    }
}

impl DefMapService {
    pub fn new() -> DefMapService {
        DefMapService {
            holders: Mutex::new(FxHashMap::default()),
            build_lock: Mutex::new(()),
            file_to_crates: Mutex::new(FxHashMap::default()),
            missed_files: Mutex::new(FxHashMap::default()),
            structure_version: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn holder(&self, crate_id: CrateId) -> Arc<DefMapHolder> {
        self.holders
            .lock()
            .entry(crate_id)
            .or_insert_with(|| {
                Arc::new(DefMapHolder::new(crate_id, self.structure_version.clone()))
            })
            .clone()
    }

    pub fn def_map(&self, crate_id: CrateId) -> Option<Arc<CrateDefMap>> {
        self.holder(crate_id).def_map()
    }

    /// Host hook: the global code structure advanced (project reload, IDE
    /// restart). Stamps go stale without touching per-crate triggers.
    pub fn bump_structure_version(&self) {
        self.structure_version.fetch_add(1, Ordering::AcqRel);
    }

    /// Publish a built map and refresh the file and missed-path indices.
    pub fn set_def_map(&self, crate_id: CrateId, def_map: Option<Arc<CrateDefMap>>) {
        {
            let mut file_to_crates = self.file_to_crates.lock();
            file_to_crates.retain(|_, crates| {
                crates.retain(|&c| c != crate_id);
                !crates.is_empty()
            });
            let mut missed = self.missed_files.lock();
            missed.retain(|_, crates| {
                crates.retain(|&c| c != crate_id);
                !crates.is_empty()
            });
            if let Some(def_map) = &def_map {
                for &file in def_map.file_infos.keys() {
                    file_to_crates.entry(file).or_default().push(crate_id);
                }
                for path in &def_map.missed_files {
                    missed.entry(path.clone()).or_default().push(crate_id);
                }
            }
        }
        self.holder(crate_id).set_def_map(def_map);
    }

    /// Crates whose module tree contains `file`.
    pub fn find_crates(&self, file: FileId) -> Vec<CrateId> {
        self.file_to_crates.lock().get(&file).cloned().unwrap_or_default()
    }

    /// Host event: a file appeared. Crates that looked for it rebuild.
    ///
    /// File events advance the structure version: every crate's fast path
    /// breaks, and the next update re-verifies each cheaply.
    pub fn on_file_added(&self, path: &Path) {
        self.bump_structure_version();
        let owners = self.missed_files.lock().get(path).cloned().unwrap_or_default();
        for crate_id in owners {
            self.holder(crate_id).set_should_rebuild();
        }
    }

    /// Host event: a file disappeared.
    pub fn on_file_removed(&self, file: FileId) {
        self.bump_structure_version();
        for crate_id in self.find_crates(file) {
            self.holder(crate_id).set_should_rebuild();
        }
    }

    /// Host event: a file's content changed.
    pub fn on_file_changed(&self, file: FileId) {
        self.bump_structure_version();
        for crate_id in self.find_crates(file) {
            self.holder(crate_id).add_changed_file(file);
        }
    }

    pub fn schedule_rebuild(&self, crate_id: CrateId) {
        self.holder(crate_id).set_should_rebuild();
    }

    pub fn schedule_rebuild_all(&self) {
        for holder in self.holders.lock().values() {
            holder.set_should_rebuild();
        }
    }

    /// Project configuration changed in some unspecified way: verify
    /// everything on the next update.
    pub fn schedule_recheck_all(&self) {
        for holder in self.holders.lock().values() {
            holder.set_should_recheck();
        }
    }

    /// Drop holders for crates no longer in the graph.
    pub fn remove_stale_def_maps(&self, all_crates: &[CrateId]) {
        let alive: FxHashSet<CrateId> = all_crates.iter().copied().collect();
        let mut stale: FxHashSet<CrateId> = FxHashSet::default();
        self.holders.lock().retain(|&crate_id, _| {
            let keep = alive.contains(&crate_id);
            if !keep {
                stale.insert(crate_id);
            }
            keep
        });
        if stale.is_empty() {
            return;
        }
        self.file_to_crates.lock().retain(|_, crates| {
            crates.retain(|c| !stale.contains(c));
            !crates.is_empty()
        });
        self.missed_files.lock().retain(|_, crates| {
            crates.retain(|c| !stale.contains(c));
            !crates.is_empty()
        });
    }
}
