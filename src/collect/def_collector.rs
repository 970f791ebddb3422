//! The fixed-point solver: resolves imports and expands macros until no
//! further pass makes progress, growing the def map as expansions surface
//! new items, imports and calls.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::base::{Cancelled, FileId, Name};
use crate::collect::mod_collector::{LegacyMacros, ModCollector, within_expansion_limit};
use crate::collect::{CollectorInputs, GLOB_RECURSION_LIMIT, Import, MacroCallInfo, PartialResolvedImport};
use crate::hash::compute_file_hash;
use crate::input::ItemStubs;
use crate::model::{CrateDefMap, ImportType, MacroDef, ModId, PerNs, Visibility};
use crate::resolve::ResolveMode;

/// Resolves all imports and expands all macros of one crate.
///
/// Owns the evolving `CrateDefMap` for the duration of the build; dependency
/// maps inside it are finished snapshots and never change under us.
pub struct DefCollector<'a> {
    pub(crate) def_map: CrateDefMap,
    pub(crate) inputs: CollectorInputs<'a>,
    /// Reversed glob-import graph: for each target module, the modules that
    /// glob-import it and must receive later additions.
    glob_imports: FxHashMap<ModId, FxHashMap<ModId, Visibility>>,
    pub(crate) unresolved_imports: Vec<Import>,
    resolved_imports: Vec<Import>,
    pub(crate) macro_calls: Vec<MacroCallInfo>,
    /// False during initial collection; once the fixed point starts, item
    /// additions replay through glob imports.
    propagate_updates: bool,
}

impl<'a> DefCollector<'a> {
    pub fn new(def_map: CrateDefMap, inputs: CollectorInputs<'a>) -> DefCollector<'a> {
        DefCollector {
            def_map,
            inputs,
            glob_imports: FxHashMap::default(),
            unresolved_imports: Vec::new(),
            resolved_imports: Vec::new(),
            macro_calls: Vec::new(),
            propagate_updates: false,
        }
    }

    /// Collect the crate root file's declaration tree.
    pub fn collect_root(&mut self) -> Result<(), Cancelled> {
        let root_file = self.inputs.info.root_file;
        let Some(stubs) = self.inputs.source.stubs(root_file) else {
            tracing::warn!(krate = %self.inputs.info.name, "crate root file has no stubs");
            return Ok(());
        };
        let root = self.def_map.root();
        self.collect_file(root, root_file, stubs, None, 0)?;
        Ok(())
    }

    /// Run the fixed point and freeze the map.
    pub fn collect(&mut self) -> Result<(), Cancelled> {
        self.propagate_updates = true;
        loop {
            self.inputs.cancel.check()?;
            // Re-run in a loop: an expansion can replace a cfg-disabled
            // module with an enabled one of the same path, invalidating
            // entries collected under the shadowed module.
            self.remove_invalid_entries();
            self.sort_imports();
            self.resolve_imports()?;
            if !self.expand_macros()? {
                break;
            }
        }
        self.def_map.after_built();
        Ok(())
    }

    pub fn finish(self) -> CrateDefMap {
        self.def_map
    }

    /// Collect one file's stubs into `mod_id` and record its hash and
    /// modification stamp. `include_site` carries the `include!` context
    /// when the file was spliced in: the included file itself (children
    /// resolve relative to it) and the call's macro index (included macro
    /// calls sit at the call's position, not the module's).
    pub(crate) fn collect_file(
        &mut self,
        mod_id: ModId,
        file: FileId,
        stubs: Arc<ItemStubs>,
        include_site: Option<(FileId, crate::model::MacroIndex)>,
        macro_depth: u32,
    ) -> Result<LegacyMacros, Cancelled> {
        let hash = compute_file_hash(&stubs, &self.inputs.info.cfg_options);
        let stamp = self.inputs.source.modification_stamp(file);

        let (include_file, macro_index_override) = match include_site {
            Some((included, index)) => (Some(included), Some(index)),
            None => (None, None),
        };
        let parent_macro_index = macro_index_override
            .unwrap_or_else(|| self.def_map[mod_id].macro_index.clone());
        let deeply_enabled = self.def_map[mod_id].is_deeply_enabled_by_cfg();
        let mut collector = ModCollector {
            dc: &mut *self,
            mod_id,
            parent_macro_index,
            macro_depth,
            dollar_crate: None,
            local_inner_macros: false,
            include_file,
            deeply_enabled,
            legacy_macros: LegacyMacros::default(),
        };
        collector.collect(&stubs, false)?;
        let legacy = std::mem::take(&mut collector.legacy_macros);

        self.def_map.add_visited_file(file, mod_id, hash, stamp);
        Ok(legacy)
    }

    /// Add an item to a module scope. During the fixed point the addition
    /// also replays through glob imports of the module.
    pub(crate) fn on_add_item(&mut self, mod_id: ModId, name: Name, per_ns: PerNs) -> bool {
        if per_ns.is_empty() {
            return false;
        }
        if !self.propagate_updates {
            return self.def_map.mod_mut(mod_id).push_resolution(name, per_ns);
        }
        let visibility = item_visibility(&per_ns);
        self.update(mod_id, &[(name, per_ns)], &visibility, ImportType::Named)
    }

    // ------------------------------------------------------------
    // Import resolution
    // ------------------------------------------------------------

    /// Inner fixed point over the unresolved-import list. Runs until no
    /// import flips to resolved and no indeterminate import's partial
    /// result changes.
    fn resolve_imports(&mut self) -> Result<(), Cancelled> {
        loop {
            let mut resolved_any = false;
            let mut changed_indeterminate = false;

            let mut index = 0;
            while index < self.unresolved_imports.len() {
                self.inputs.cancel.check()?;
                let status = self.resolve_import(&self.unresolved_imports[index]);
                match status {
                    PartialResolvedImport::Unresolved => {
                        index += 1;
                    }
                    PartialResolvedImport::Indeterminate(_) => {
                        if self.unresolved_imports[index].status == status {
                            index += 1;
                            continue;
                        }
                        self.unresolved_imports[index].status = status;
                        let import = self.unresolved_imports[index].clone();
                        // record the partial result so forward progress
                        // propagates before full resolution
                        if self.record_resolved_import(&import) {
                            changed_indeterminate = true;
                        }
                        index += 1;
                    }
                    PartialResolvedImport::Resolved(_) => {
                        self.unresolved_imports[index].status = status;
                        let import = self.unresolved_imports.swap_remove(index);
                        self.record_resolved_import(&import);
                        self.resolved_imports.push(import);
                        resolved_any = true;
                    }
                }
            }

            if !resolved_any && !changed_indeterminate {
                return Ok(());
            }
        }
    }

    fn resolve_import(&self, import: &Import) -> PartialResolvedImport {
        if import.is_extern_crate {
            let crate_name = &import.use_path[0];
            let Some(dep) = self.def_map.resolve_extern_crate(crate_name) else {
                return PartialResolvedImport::Unresolved;
            };
            let root_per_ns = match self.def_map.def_map(dep) {
                Some(dep_map) => dep_map.root_as_per_ns(),
                None => return PartialResolvedImport::Unresolved,
            };
            return PartialResolvedImport::Resolved(root_per_ns.adjust(&import.visibility, true));
        }

        let result = self.def_map.resolve_path_fp(
            import.containing_mod,
            &import.use_path,
            ResolveMode::Import,
            import.visibility.is_invisible(),
            import.dollar_crate,
        );
        if !result.reached_fixed_point || result.resolved.is_empty() {
            return PartialResolvedImport::Unresolved;
        }

        // Any intermediate module from another crate means that crate's map
        // is final; this resolution cannot improve within this build.
        if result.visited_other_crate {
            return PartialResolvedImport::Resolved(result.resolved);
        }

        let resolved_in_all_namespaces = result.resolved.has_all_namespaces();
        let resolved_glob = import.is_glob && !result.resolved.types.is_empty();
        if resolved_in_all_namespaces || resolved_glob {
            PartialResolvedImport::Resolved(result.resolved)
        } else {
            PartialResolvedImport::Indeterminate(result.resolved)
        }
    }

    /// Apply an import's (possibly partial) resolution to its module scope.
    /// Returns true if any scope changed.
    fn record_resolved_import(&mut self, import: &Import) -> bool {
        let def = match &import.status {
            PartialResolvedImport::Resolved(per_ns)
            | PartialResolvedImport::Indeterminate(per_ns) => per_ns.clone(),
            PartialResolvedImport::Unresolved => {
                tracing::error!(?import, "recording an unresolved import");
                return false;
            }
        };
        if import.is_glob {
            self.record_resolved_glob_import(import, &def)
        } else {
            self.record_resolved_named_import(import, def)
        }
    }

    fn record_resolved_glob_import(&mut self, import: &Import, def: &PerNs) -> bool {
        let Some(types_item) = def.types_mod_or_enum().cloned() else {
            tracing::warn!(path = ?import.use_path, "glob import of a non-module");
            return false;
        };
        let Some((target_map, target_mod)) = self.def_map.try_cast_to_mod(&types_item) else {
            return false;
        };
        let target_crate = target_map.crate_id();

        if import.is_prelude {
            self.def_map.prelude = Some((target_crate, target_mod));
            return true;
        }

        if target_crate == self.def_map.crate_id() {
            // Same-crate glob: import what is visible now, then keep the
            // edge so later additions replay into the importing module.
            let containing_path = self.def_map[import.containing_mod].path.clone();
            let items = self.def_map[target_mod]
                .visible_items_filtered(|visibility| visibility.is_visible_from_mod(&containing_path));
            let changed =
                self.update(import.containing_mod, &items, &import.visibility, ImportType::Glob);

            let edges = self.glob_imports.entry(target_mod).or_default();
            let keep_existing = edges
                .get(&import.containing_mod)
                .is_some_and(|existing| existing.is_strictly_more_permissive(&import.visibility));
            if !keep_existing {
                edges.insert(import.containing_mod, import.visibility.clone());
            }
            changed
        } else {
            // Cross-crate glob: the dependency is complete, import once.
            let items =
                target_map[target_mod].visible_items_filtered(Visibility::is_visible_from_other_crate);
            self.update(import.containing_mod, &items, &import.visibility, ImportType::Glob)
        }
    }

    fn record_resolved_named_import(&mut self, import: &Import, def: PerNs) -> bool {
        let containing = import.containing_mod;
        let name = import.name_in_scope.clone();

        // `extern crate` in the crate root adds to the extern prelude,
        // making the alias usable in absolute paths
        if import.is_extern_crate
            && self.def_map[containing].is_crate_root()
            && name != "_"
        {
            if let Some(item) = def.types.first() {
                self.def_map.extern_prelude.insert(name.clone(), item.crate_id());
            }
        }

        // An import of something the importing module cannot see is kept,
        // demoted to Invisible, so "exists but private" stays observable.
        let containing_path = self.def_map[containing].path.clone();
        let def = def.map_items(|item| {
            if item.visibility.is_invisible()
                || item.visibility.is_visible_from_mod(&containing_path)
            {
                item.clone()
            } else {
                let mut demoted = item.clone();
                demoted.visibility = Visibility::Invisible;
                demoted
            }
        });
        self.update(containing, &[(name, def)], &import.visibility, ImportType::Named)
    }

    // ------------------------------------------------------------
    // Visible-item update and glob propagation
    // ------------------------------------------------------------

    /// Merge `resolutions` into `mod_id` with `visibility`, then replay any
    /// change into every module glob-importing `mod_id`, transitively.
    fn update(
        &mut self,
        mod_id: ModId,
        resolutions: &[(Name, PerNs)],
        visibility: &Visibility,
        import_type: ImportType,
    ) -> bool {
        self.update_recursive(mod_id, resolutions, visibility, import_type, 0)
    }

    fn update_recursive(
        &mut self,
        mod_id: ModId,
        resolutions: &[(Name, PerNs)],
        // all resolutions are imported with this visibility; the
        // visibilities inside the PerNs values are overwritten
        visibility: &Visibility,
        import_type: ImportType,
        depth: u32,
    ) -> bool {
        if depth > GLOB_RECURSION_LIMIT {
            // expected unreachable; degrade instead of corrupting the build
            tracing::error!(module = %self.def_map[mod_id].path, "glob import replay exceeded depth limit");
            return false;
        }

        let mut changed_resolutions: Vec<(Name, PerNs)> = Vec::new();
        for (name, def) in resolutions {
            let changed = if name == "_" {
                self.push_trait_resolution(mod_id, def, visibility)
            } else {
                let adjusted = def
                    .adjust(visibility, import_type == ImportType::Named)
                    .adjust_multiresolve();
                if adjusted.is_empty() {
                    false
                } else {
                    self.def_map.mod_mut(mod_id).push_resolution(name.clone(), adjusted)
                }
            };
            if changed {
                changed_resolutions.push((name.clone(), def.clone()));
            }
        }
        if changed_resolutions.is_empty() {
            return false;
        }

        let Some(glob_edges) = self.glob_imports.get(&mod_id) else {
            return true;
        };
        let glob_edges: Vec<(ModId, Visibility)> =
            glob_edges.iter().map(|(&importing, vis)| (importing, vis.clone())).collect();
        for (glob_importing_mod, glob_visibility) in glob_edges {
            // every resolution in this batch shares `visibility`, so one
            // reachability check covers them all
            let importing_path = &self.def_map[glob_importing_mod].path;
            if !visibility.is_visible_from_mod(importing_path) {
                continue;
            }
            self.update_recursive(
                glob_importing_mod,
                &changed_resolutions,
                &glob_visibility,
                ImportType::Glob,
                depth + 1,
            );
        }
        true
    }

    /// `use path::Trait as _;`: usable for method resolution, unnameable.
    fn push_trait_resolution(
        &mut self,
        mod_id: ModId,
        def: &PerNs,
        visibility: &Visibility,
    ) -> bool {
        let mut changed = false;
        for trait_item in &def.types {
            if trait_item.is_mod_or_enum {
                continue;
            }
            let data = self.def_map.mod_mut(mod_id);
            let previous = data.unnamed_trait_imports.get(&trait_item.path);
            if previous.is_none_or(|existing| visibility.is_strictly_more_permissive(existing)) {
                data.unnamed_trait_imports.insert(trait_item.path.clone(), visibility.clone());
                changed = true;
            }
        }
        changed
    }

    // ------------------------------------------------------------
    // Macro expansion
    // ------------------------------------------------------------

    /// Resolve and expand every pending macro call whose definition is in
    /// scope. Returns true if anything was expanded.
    fn expand_macros(&mut self) -> Result<bool, Cancelled> {
        let mut changed = false;
        let mut index = 0;
        while index < self.macro_calls.len() {
            self.inputs.cancel.check()?;

            if self.macro_calls[index].path.last().map(Name::as_str) == Some("include") {
                let call = self.macro_calls.swap_remove(index);
                self.expand_include(&call)?;
                changed = true;
                continue;
            }

            let call = &self.macro_calls[index];
            let def = self.def_map.resolve_macro_call(
                call.containing_mod,
                &call.path,
                &call.macro_index,
                call.dollar_crate,
            );
            let Some(def) = def else {
                index += 1;
                continue;
            };
            let call = self.macro_calls.swap_remove(index);
            changed = true;
            self.collect_expansion(&call, &def)?;
        }
        Ok(changed)
    }

    fn collect_expansion(&mut self, call: &MacroCallInfo, def: &MacroDef) -> Result<(), Cancelled> {
        if !within_expansion_limit(call.depth) {
            return Ok(());
        }
        let Some(stubs) = self.inputs.expander.expand(def.body(), &call.body) else {
            tracing::debug!(path = ?call.path, "macro expansion failed");
            return Ok(());
        };

        let local_inner_macros = match def {
            MacroDef::Decl(decl) => decl.has_local_inner_macros,
            MacroDef::Macro2(_) => false,
        };
        let deeply_enabled = self.def_map[call.containing_mod].is_deeply_enabled_by_cfg();
        let mut collector = ModCollector {
            dc: &mut *self,
            mod_id: call.containing_mod,
            parent_macro_index: call.macro_index.clone(),
            macro_depth: call.depth + 1,
            dollar_crate: Some(def.crate_id()),
            local_inner_macros,
            include_file: None,
            deeply_enabled,
            legacy_macros: LegacyMacros::default(),
        };
        collector.collect(&stubs, true)
    }

    /// `include!` splices a file into the calling module itself; no new
    /// `ModData` is created.
    fn expand_include(&mut self, call: &MacroCallInfo) -> Result<(), Cancelled> {
        if !within_expansion_limit(call.depth) {
            return Ok(());
        }
        let Some(containing_file) = call.containing_file else {
            return Ok(());
        };
        let Some(directory) = self.inputs.source.directory(containing_file) else {
            return Ok(());
        };
        let target = call.body.trim().trim_matches('"');
        match self.inputs.source.resolve_relative(&directory, target) {
            Some(included) => {
                if let Some(stubs) = self.inputs.source.stubs(included) {
                    self.collect_file(
                        call.containing_mod,
                        included,
                        stubs,
                        Some((included, call.macro_index.clone())),
                        call.depth + 1,
                    )?;
                }
            }
            None => {
                self.def_map.missed_files.push(directory.join(target));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------
    // Worklist maintenance
    // ------------------------------------------------------------

    /// Drop imports and calls whose module is no longer reachable from the
    /// root; a later collection can replace a cfg-disabled module with an
    /// enabled one of the same path, orphaning the old node.
    fn remove_invalid_entries(&mut self) {
        let reachable: FxHashSet<ModId> =
            self.def_map.descendants(self.def_map.root()).into_iter().collect();
        self.unresolved_imports.retain(|import| reachable.contains(&import.containing_mod));
        self.macro_calls.retain(|call| reachable.contains(&call.containing_mod));
    }

    /// Resolution-order heuristic: cfg-enabled before disabled, named
    /// before glob, names already bound before fresh ones, deeper modules
    /// before shallow ones. Makes shadowing ties deterministic for
    /// real-project patterns like a glob plus a named import of one name.
    fn sort_imports(&mut self) {
        let mut imports = std::mem::take(&mut self.unresolved_imports);
        imports.sort_by_key(|import| {
            let data = &self.def_map[import.containing_mod];
            let already_in_scope = data.visible_items.contains_key(&import.name_in_scope);
            (
                import.visibility == Visibility::CfgDisabled,
                import.is_glob,
                !already_in_scope,
                std::cmp::Reverse(data.path.segments().len()),
            )
        });
        self.unresolved_imports = imports;
    }
}

/// Visibility shared by a freshly collected item's candidates.
fn item_visibility(per_ns: &PerNs) -> Visibility {
    per_ns
        .types
        .first()
        .or_else(|| per_ns.values.first())
        .or_else(|| per_ns.macros.first())
        .map(|item| item.visibility.clone())
        .unwrap_or(Visibility::Public)
}
