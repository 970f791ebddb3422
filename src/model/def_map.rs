use std::fmt;
use std::ops::Index;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::base::{CrateId, DeclHash, FileId, Name};
use crate::input::{CfgOptions, CrateInfo, Dependency, Edition};
use crate::model::{DeclMacroDef, MacroDef, ModData, ModId, ModPath, PerNs, VisItem, Visibility};

/// Bookkeeping for one file participating in a crate's module tree.
///
/// A file pulled in via `include!` shares its `mod_id` with the including
/// file but keeps its own stamp and hash.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FileInfo {
    pub modification_stamp: u64,
    pub mod_id: ModId,
    pub hash: DeclHash,
}

/// Snapshot of the crate-graph facts a `CrateDefMap` was built against.
/// Compared wholesale to detect "the project configuration changed under
/// this crate".
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CrateMetaData {
    pub name: Name,
    pub edition: Edition,
    pub cfg_options: Arc<CfgOptions>,
    pub env: FxHashMap<String, String>,
    pub dependencies: Vec<Dependency>,
}

impl CrateMetaData {
    pub fn new(info: &CrateInfo) -> CrateMetaData {
        CrateMetaData {
            name: info.name.clone(),
            edition: info.edition,
            cfg_options: info.cfg_options.clone(),
            env: info.env.clone(),
            dependencies: info.dependencies.clone(),
        }
    }
}

static NEXT_TIMESTAMP: AtomicU64 = AtomicU64::new(1);

/// The resolved namespace of one crate: the module tree plus everything
/// needed to query it and to decide later whether it is still fresh.
///
/// Built once per rebuild. The public surface is immutable afterwards;
/// `file_infos` and `missed_files` are append-only during the build and
/// frozen with it.
pub struct CrateDefMap {
    crate_id: CrateId,
    arena: Vec<ModData>,
    root: ModId,
    /// Direct dependencies by extern-prelude name.
    pub direct_dependencies: FxHashMap<Name, CrateId>,
    /// Transitive dependency maps, snapshots taken when this build started.
    all_dependencies: FxHashMap<CrateId, Arc<CrateDefMap>>,
    /// Names resolvable as crate roots. Seeded from `direct_dependencies`,
    /// extended by `extern crate dep as alias;` in the crate root.
    pub extern_prelude: IndexMap<Name, CrateId>,
    /// The prelude module, set by a `#[prelude_import]` glob import.
    pub prelude: Option<(CrateId, ModId)>,
    pub file_infos: FxHashMap<FileId, FileInfo>,
    /// Paths that do not currently exist but would change resolution if
    /// created: unresolved `mod` declarations and `include!` targets.
    pub missed_files: Vec<PathBuf>,
    pub meta: CrateMetaData,
    /// First element of the root module's `MacroIndex`; strictly greater
    /// than every dependency's.
    pub root_mod_macro_index: u32,
    /// Session-unique, monotonically increasing identity of this build.
    /// Caches keyed on "this exact map" compare it instead of deep contents.
    pub timestamp: u64,
}

impl CrateDefMap {
    pub fn new(
        crate_id: CrateId,
        meta: CrateMetaData,
        all_dependencies: FxHashMap<CrateId, Arc<CrateDefMap>>,
        root_data: ModData,
        root_mod_macro_index: u32,
    ) -> CrateDefMap {
        let direct_dependencies: FxHashMap<Name, CrateId> = meta
            .dependencies
            .iter()
            .filter(|dep| all_dependencies.contains_key(&dep.crate_id))
            .map(|dep| (dep.name.clone(), dep.crate_id))
            .collect();
        let extern_prelude: IndexMap<Name, CrateId> = meta
            .dependencies
            .iter()
            .filter(|dep| all_dependencies.contains_key(&dep.crate_id))
            .map(|dep| (dep.name.clone(), dep.crate_id))
            .collect();
        CrateDefMap {
            crate_id,
            arena: vec![root_data],
            root: ModId(0),
            direct_dependencies,
            all_dependencies,
            extern_prelude,
            prelude: None,
            file_infos: FxHashMap::default(),
            missed_files: Vec::new(),
            meta,
            root_mod_macro_index,
            timestamp: NEXT_TIMESTAMP.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn crate_id(&self) -> CrateId {
        self.crate_id
    }

    pub fn root(&self) -> ModId {
        self.root
    }

    pub fn alloc_mod(&mut self, data: ModData) -> ModId {
        let id = ModId(self.arena.len() as u32);
        self.arena.push(data);
        id
    }

    pub fn mod_mut(&mut self, id: ModId) -> &mut ModData {
        &mut self.arena[id.index()]
    }

    /// Number of allocated module nodes, reachable or not.
    pub fn mod_count(&self) -> usize {
        self.arena.len()
    }

    /// The def map a crate id refers to: this one or a dependency snapshot.
    pub fn def_map(&self, crate_id: CrateId) -> Option<&CrateDefMap> {
        if crate_id == self.crate_id {
            Some(self)
        } else {
            self.all_dependencies.get(&crate_id).map(Arc::as_ref)
        }
    }

    pub fn dependency_map(&self, crate_id: CrateId) -> Option<&Arc<CrateDefMap>> {
        self.all_dependencies.get(&crate_id)
    }

    /// Walk `segments` down `child_modules` from the root of this map.
    pub fn local_mod_by_path(&self, segments: &[Name]) -> Option<ModId> {
        segments.iter().try_fold(self.root, |current, segment| {
            self[current].child_modules.get(segment).copied()
        })
    }

    /// Resolve a `ModPath` to its owning map and module, crossing into
    /// dependency maps when the path belongs to another crate.
    pub fn mod_by_path<'a>(&'a self, path: &ModPath) -> Option<(&'a CrateDefMap, ModId)> {
        let def_map = self.def_map(path.crate_id())?;
        let mod_id = def_map.local_mod_by_path(path.segments())?;
        Some((def_map, mod_id))
    }

    /// Module the types-namespace item refers to, if it is a mod or enum.
    pub fn try_cast_to_mod<'a>(&'a self, item: &VisItem) -> Option<(&'a CrateDefMap, ModId)> {
        if !item.is_mod_or_enum {
            return None;
        }
        let resolved = self.mod_by_path(&item.path);
        if resolved.is_none() {
            tracing::warn!(path = %item.path, "mod-or-enum item without a module node");
        }
        resolved
    }

    /// The crate root as a candidate set: a public module item.
    pub fn root_as_per_ns(&self) -> PerNs {
        PerNs::types(VisItem::new(
            ModPath::root(self.crate_id),
            Visibility::Public,
            true,
        ))
    }

    /// The module as it appears in its parent's scope. Root modules have no
    /// parent entry; use [`root_as_per_ns`](Self::root_as_per_ns) for them.
    pub fn as_vis_item(&self, id: ModId) -> Option<VisItem> {
        let data = &self[id];
        let parent = data.parent?;
        let name = data.name()?;
        self[parent]
            .visible_items
            .get(name)
            .and_then(|per_ns| per_ns.types_mod_or_enum())
            .cloned()
    }

    pub fn as_per_ns(&self, id: ModId) -> PerNs {
        if id == self.root {
            return self.root_as_per_ns();
        }
        match self.as_vis_item(id) {
            Some(item) => PerNs::types(item),
            None => {
                // Inconsistent visible_items/child_modules would land here;
                // degrade to an empty resolution.
                tracing::error!(path = %self[id].path, "module missing from parent scope");
                PerNs::empty()
            }
        }
    }

    /// `id` and its chain of parents up to the crate root.
    pub fn ancestors(&self, id: ModId) -> impl Iterator<Item = ModId> + '_ {
        std::iter::successors(Some(id), move |&current| self[current].parent)
    }

    pub fn nth_parent(&self, id: ModId, n: usize) -> Option<ModId> {
        self.ancestors(id).nth(n)
    }

    /// All modules reachable from `start` through `child_modules`,
    /// `start` included.
    pub fn descendants(&self, start: ModId) -> Vec<ModId> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend(self[current].child_modules.values().copied());
        }
        result
    }

    pub fn add_visited_file(
        &mut self,
        file: FileId,
        mod_id: ModId,
        hash: DeclHash,
        modification_stamp: u64,
    ) {
        self.file_infos.insert(file, FileInfo { modification_stamp, mod_id, hash });
    }

    /// Resolve the target of `extern crate name;`.
    pub fn resolve_extern_crate(&self, name: &Name) -> Option<CrateId> {
        if name == "self" {
            Some(self.crate_id)
        } else {
            self.direct_dependencies.get(name).copied()
        }
    }

    /// Import every macro a dependency exports into this crate root's
    /// legacy scope (`#[macro_use] extern crate dep;`).
    ///
    /// Exported macros are the macros namespace of the dependency's root
    /// scope, which covers both `#[macro_export]` definitions and root-level
    /// `use` aliases regardless of the alias visibility.
    pub fn import_all_macros_exported(&mut self, from_crate: CrateId) {
        let Some(from) = self.all_dependencies.get(&from_crate) else {
            tracing::warn!(%from_crate, "macro_use import from unknown dependency");
            return;
        };
        let mut imported: Vec<(Name, Arc<DeclMacroDef>)> = Vec::new();
        for (name, per_ns) in &from[from.root].visible_items {
            for macro_item in &per_ns.macros {
                if let Some(MacroDef::Decl(def)) = from.macro_def(macro_item) {
                    imported.push((name.clone(), def));
                }
            }
        }
        let root = self.root;
        for (name, def) in imported {
            self.mod_mut(root).add_legacy_macro(name, def);
        }
    }

    /// Definition behind a macros-namespace item.
    pub fn macro_def(&self, item: &VisItem) -> Option<MacroDef> {
        let def_map = self.def_map(item.crate_id())?;
        let containing = def_map.local_mod_by_path(item.containing_mod().segments())?;
        let data = &def_map[containing];
        let name = item.name()?;
        if data.proc_macros.contains(name) {
            return None;
        }
        if let Some(defs) = data.legacy_macros.get(name) {
            let def = defs
                .iter()
                .find(|def| def.has_macro_export)
                .or_else(|| defs.first())?;
            return Some(MacroDef::Decl(def.clone()));
        }
        data.macros2.get(name).map(|def| MacroDef::Macro2(def.clone()))
    }

    /// Finalize after the fixed point: everything still reachable from the
    /// root is, by definition, not shadowed.
    pub fn after_built(&mut self) {
        for id in self.descendants(self.root) {
            self.mod_mut(id).is_shadowed_by_other_file = false;
        }
    }

    /// Consumer query: candidate items of a module, restricted to a
    /// namespace set and a name filter. The backbone of completion-style
    /// lookups.
    pub fn candidates(
        &self,
        module: ModId,
        namespaces: crate::base::NsSet,
        mut name_filter: impl FnMut(&Name) -> bool,
    ) -> Vec<(Name, Vec<VisItem>)> {
        use crate::base::Namespace;

        self[module]
            .visible_items
            .iter()
            .filter(|(name, _)| name_filter(name))
            .filter_map(|(name, per_ns)| {
                let mut items: Vec<VisItem> = Vec::new();
                if namespaces.contains(Namespace::Types) {
                    items.extend(per_ns.types.iter().cloned());
                }
                if namespaces.contains(Namespace::Values) {
                    items.extend(per_ns.values.iter().cloned());
                }
                if namespaces.contains(Namespace::Macros) {
                    items.extend(per_ns.macros.iter().cloned());
                }
                if items.is_empty() { None } else { Some((name.clone(), items)) }
            })
            .collect()
    }
}

impl Index<ModId> for CrateDefMap {
    type Output = ModData;

    fn index(&self, id: ModId) -> &ModData {
        &self.arena[id.index()]
    }
}

impl fmt::Debug for CrateDefMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CrateDefMap({} {:?}, {} mods, ts={})",
            self.meta.name,
            self.crate_id,
            self.arena.len(),
            self.timestamp
        )
    }
}
