//! Walks one items-owner's stub list and lowers it into the def map.
//!
//! The collector fills `ModData` nodes with declared items, queues imports
//! and macro calls on the owning [`DefCollector`], and carries legacy
//! (`macro_rules!`) definitions forward to lexically later code. It never
//! resolves a path.

use std::path::PathBuf;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::base::{Cancelled, Name, NsSet};
use crate::collect::{DefCollector, EXPANSION_RECURSION_LIMIT, Import, MacroCallInfo, PartialResolvedImport};
use crate::input::{
    CfgExpr, CfgOptions, EnumStub, ExternCrateStub, ItemStubs, MacroCallStub, MacroDefStub,
    Macro2DefStub, ModDeclStub, ModStub, RawVisibility, SimpleStub, StubItem, UseStub,
};
use crate::model::{
    DeclMacroDef, Macro2Def, MacroIndex, ModData, ModId, PerNs, VisItem, Visibility,
};

/// Legacy macros accumulated while walking one items-owner, keyed by name
/// with the latest definition winning. Returned to the enclosing scope for
/// `#[macro_use]` and textual-order propagation.
pub(crate) type LegacyMacros = FxHashMap<Name, Arc<DeclMacroDef>>;

pub(crate) struct ModCollector<'c, 'a> {
    pub(crate) dc: &'c mut DefCollector<'a>,
    pub(crate) mod_id: ModId,
    /// `mod_id`'s own index when collecting declared items, the call's index
    /// when collecting expansion output.
    pub(crate) parent_macro_index: MacroIndex,
    pub(crate) macro_depth: u32,
    pub(crate) dollar_crate: Option<crate::base::CrateId>,
    /// Set while collecting the expansion of a `#[macro_export(local_inner_macros)]`
    /// macro: unqualified calls inside it resolve in the defining crate.
    pub(crate) local_inner_macros: bool,
    /// The file items came from when it was `include!`-ed; child `mod`
    /// declarations then resolve relative to it.
    pub(crate) include_file: Option<crate::base::FileId>,
    pub(crate) deeply_enabled: bool,
    pub(crate) legacy_macros: LegacyMacros,
}

impl ModCollector<'_, '_> {
    pub(crate) fn collect(
        &mut self,
        stubs: &ItemStubs,
        propagate_legacy_macros: bool,
    ) -> Result<(), Cancelled> {
        let options = self.dc.inputs.info.cfg_options.clone();

        // `#[macro_use] extern crate` is hoisted: its macros must be in
        // scope before any other item of the module is collected.
        for item in &stubs.items {
            if let StubItem::ExternCrate(extern_crate) = item {
                self.collect_extern_crate(extern_crate, &options);
            }
        }

        let mut macro_index_in_parent = 0u32;
        for item in &stubs.items {
            match item {
                StubItem::ExternCrate(_) => {}
                StubItem::Simple(simple) => self.collect_simple(simple, &options),
                StubItem::Use(import) => self.collect_use(import, &options),
                StubItem::Enum(enum_stub) => self.collect_enum(enum_stub, &options),
                StubItem::Mod(module) => {
                    self.collect_inline_mod(module, macro_index_in_parent, &options)?;
                    macro_index_in_parent += 1;
                }
                StubItem::ModDecl(decl) => {
                    self.collect_mod_decl(decl, macro_index_in_parent, &options)?;
                    macro_index_in_parent += 1;
                }
                StubItem::MacroCall(call) => {
                    self.collect_macro_call(call, macro_index_in_parent, &options);
                    macro_index_in_parent += 1;
                }
                StubItem::MacroDef(def) => {
                    self.collect_macro_def(def, macro_index_in_parent, &options);
                    macro_index_in_parent += 1;
                }
                StubItem::Macro2Def(def) => self.collect_macro2_def(def, &options),
            }
        }

        if propagate_legacy_macros {
            self.propagate_legacy_macros(self.mod_id);
        }
        Ok(())
    }

    fn enabled(&self, cfg: &Option<CfgExpr>, options: &CfgOptions) -> bool {
        self.deeply_enabled && cfg.as_ref().is_none_or(|expr| expr.eval(options))
    }

    fn mod_path(&self) -> crate::model::ModPath {
        self.dc.def_map[self.mod_id].path.clone()
    }

    fn collect_simple(&mut self, item: &SimpleStub, options: &CfgOptions) {
        let enabled = self.enabled(&item.cfg, options);
        let visibility = self.convert_visibility(&item.visibility, enabled);
        let vis_item =
            VisItem::new(self.mod_path().append(item.name.clone()), visibility, false);
        let per_ns = PerNs::from_item(vis_item, item.namespaces);
        self.dc.on_add_item(self.mod_id, item.name.clone(), per_ns);

        if item.is_proc_macro {
            self.dc.def_map.mod_mut(self.mod_id).proc_macros.insert(item.name.clone());
        }
    }

    fn collect_use(&mut self, import: &UseStub, options: &CfgOptions) {
        // `use self;` binds nothing
        if !import.is_glob
            && import.alias.is_none()
            && import.path.len() == 1
            && import.path[0] == "self"
        {
            return;
        }
        let enabled = self.enabled(&import.cfg, options);
        let name_in_scope = import
            .name_in_scope()
            .cloned()
            .or_else(|| import.path.last().cloned())
            .unwrap_or_else(|| Name::from("_"));
        self.dc.unresolved_imports.push(Import {
            containing_mod: self.mod_id,
            use_path: import.path.clone(),
            name_in_scope,
            visibility: self.convert_visibility(&import.visibility, enabled),
            is_glob: import.is_glob,
            is_extern_crate: false,
            is_prelude: import.is_prelude,
            dollar_crate: self.dollar_crate,
            status: PartialResolvedImport::Unresolved,
        });
    }

    fn collect_extern_crate(&mut self, extern_crate: &ExternCrateStub, options: &CfgOptions) {
        let name_in_scope = extern_crate.alias.clone().unwrap_or_else(|| extern_crate.name.clone());
        if extern_crate.name == "self" && name_in_scope == "self" {
            return;
        }
        let enabled = self.enabled(&extern_crate.cfg, options);
        self.dc.unresolved_imports.push(Import {
            containing_mod: self.mod_id,
            use_path: vec![extern_crate.name.clone()],
            name_in_scope,
            visibility: self.convert_visibility(&extern_crate.visibility, enabled),
            is_glob: false,
            is_extern_crate: true,
            is_prelude: false,
            dollar_crate: None,
            status: PartialResolvedImport::Unresolved,
        });

        if enabled && extern_crate.has_macro_use {
            if let Some(dep) = self.dc.def_map.resolve_extern_crate(&extern_crate.name) {
                if dep != self.dc.def_map.crate_id() {
                    self.dc.def_map.import_all_macros_exported(dep);
                }
            }
        }
    }

    fn collect_enum(&mut self, enum_stub: &EnumStub, options: &CfgOptions) {
        let enabled_outer = self.enabled(&enum_stub.cfg, options);
        let parent_data = &self.dc.def_map[self.mod_id];
        let enum_path = parent_data.path.append(enum_stub.name.clone());
        let mut enum_data = ModData::new(
            Some(self.mod_id),
            enum_path.clone(),
            // never propagated into, position is irrelevant
            MacroIndex::new(vec![]),
            enabled_outer,
            true,
            parent_data.file_id,
            format!("{}::{}", parent_data.file_relative_path, enum_stub.name),
            parent_data.owned_directory.clone(),
            false,
            true,
        );
        for variant in &enum_stub.variants {
            let variant_enabled = enabled_outer
                && variant.cfg.as_ref().is_none_or(|expr| expr.eval(options));
            // disabled variants stay, marked disabled, so diagnostics can
            // still see that they existed
            let visibility =
                if variant_enabled { Visibility::Public } else { Visibility::CfgDisabled };
            let variant_item =
                VisItem::new(enum_path.append(variant.name.clone()), visibility, false);
            enum_data.push_resolution(
                variant.name.clone(),
                PerNs::from_item(variant_item, NsSet::TYPES_AND_VALUES),
            );
        }
        let enum_id = self.dc.def_map.alloc_mod(enum_data);

        let visibility = self.convert_visibility(&enum_stub.visibility, enabled_outer);
        let vis_item = VisItem::new(enum_path, visibility, true);
        let changed =
            self.dc.on_add_item(self.mod_id, enum_stub.name.clone(), PerNs::types(vis_item));
        if changed {
            self.dc
                .def_map
                .mod_mut(self.mod_id)
                .child_modules
                .insert(enum_stub.name.clone(), enum_id);
        }
    }

    fn collect_inline_mod(
        &mut self,
        module: &ModStub,
        index: u32,
        options: &CfgOptions,
    ) -> Result<(), Cancelled> {
        let enabled_outer = self.enabled(&module.cfg, options);
        let parent_data = &self.dc.def_map[self.mod_id];
        let child_path = parent_data.path.append(module.name.clone());
        let mut child_data = ModData::new(
            Some(self.mod_id),
            child_path,
            self.parent_macro_index.append(index),
            enabled_outer,
            true,
            parent_data.file_id,
            format!("{}::{}", parent_data.file_relative_path, module.name),
            parent_data.owned_directory.as_ref().map(|dir| dir.join(module.name.as_str())),
            module.has_macro_use,
            false,
        );
        seed_legacy_macros(&mut child_data, parent_data);
        let child_id = self.dc.def_map.alloc_mod(child_data);

        let child_macro_index = self.dc.def_map[child_id].macro_index.clone();
        let mut child_collector = ModCollector {
            dc: &mut *self.dc,
            mod_id: child_id,
            parent_macro_index: child_macro_index,
            macro_depth: self.macro_depth,
            dollar_crate: self.dollar_crate,
            local_inner_macros: self.local_inner_macros,
            include_file: self.include_file,
            deeply_enabled: enabled_outer,
            legacy_macros: LegacyMacros::default(),
        };
        child_collector.collect(&module.items, false)?;
        let child_legacy = std::mem::take(&mut child_collector.legacy_macros);

        self.finish_child_module(
            child_id,
            &module.name,
            module.has_macro_use,
            child_legacy,
            self.convert_visibility(&module.visibility, enabled_outer),
        );
        Ok(())
    }

    fn collect_mod_decl(
        &mut self,
        decl: &ModDeclStub,
        index: u32,
        options: &CfgOptions,
    ) -> Result<(), Cancelled> {
        self.dc.inputs.cancel.check()?;
        let enabled_outer = self.enabled(&decl.cfg, options);

        let parent_owned_directory = match self.include_file {
            Some(file) => self.dc.inputs.source.directory(file),
            None => self.dc.def_map[self.mod_id].owned_directory.clone(),
        };
        let Some((file, owned_directory)) =
            self.resolve_mod_decl_file(decl, parent_owned_directory.as_deref())
        else {
            // nothing enters the scope for an unresolved `mod foo;`
            return Ok(());
        };
        let Some(stubs) = self.dc.inputs.source.stubs(file) else {
            return Ok(());
        };

        let enabled_inner =
            stubs.inner_cfg.as_ref().is_none_or(|expr| expr.eval(options));
        let has_macro_use = decl.has_macro_use || stubs.inner_macro_use;

        let parent_data = &self.dc.def_map[self.mod_id];
        let child_path = parent_data.path.append(decl.name.clone());
        let mut child_data = ModData::new(
            Some(self.mod_id),
            child_path,
            self.parent_macro_index.append(index),
            enabled_outer,
            enabled_inner,
            Some(file),
            String::new(),
            owned_directory,
            has_macro_use,
            false,
        );
        seed_legacy_macros(&mut child_data, parent_data);
        let child_id = self.dc.def_map.alloc_mod(child_data);

        let child_legacy = self.dc.collect_file(child_id, file, stubs, None, self.macro_depth)?;

        // a file whose own `#![cfg]` is off contributes a CfgDisabled entry
        let visibility = if enabled_inner {
            self.convert_visibility(&decl.visibility, enabled_outer)
        } else {
            Visibility::CfgDisabled
        };
        self.finish_child_module(child_id, &decl.name, has_macro_use, child_legacy, visibility);
        Ok(())
    }

    /// Shared tail of inline-mod and mod-decl collection: bubble macros out
    /// of `#[macro_use]` children and publish the module in its parent's
    /// scope, keeping `child_modules` consistent with `visible_items` by
    /// updating both only when the scope entry actually changed.
    fn finish_child_module(
        &mut self,
        child_id: ModId,
        name: &Name,
        has_macro_use: bool,
        child_legacy: LegacyMacros,
        visibility: Visibility,
    ) {
        if has_macro_use && self.dc.def_map[child_id].is_deeply_enabled_by_cfg() {
            self.dc
                .def_map
                .mod_mut(self.mod_id)
                .add_legacy_macros(child_legacy.iter());
            self.legacy_macros.extend(child_legacy);
        }

        let child_path = self.dc.def_map[child_id].path.clone();
        let vis_item = VisItem::new(child_path, visibility, true);
        let changed = self.dc.on_add_item(self.mod_id, name.clone(), PerNs::types(vis_item));
        if changed {
            self.dc.def_map.mod_mut(self.mod_id).child_modules.insert(name.clone(), child_id);
        }
    }

    /// Locate the file behind `mod name;`: `name.rs` then `name/mod.rs`
    /// under the owning directory, unless a `#[path]` attribute overrides
    /// the search. Returns the file and the directory the child will own.
    fn resolve_mod_decl_file(
        &mut self,
        decl: &ModDeclStub,
        parent_owned_directory: Option<&std::path::Path>,
    ) -> Option<(crate::base::FileId, Option<PathBuf>)> {
        let source = self.dc.inputs.source;
        match &decl.path_attr {
            Some(path_attr) => {
                // For a non-inline module the attribute is relative to the
                // declaring file, for inline nesting to the owned directory.
                let mod_data = &self.dc.def_map[self.mod_id];
                let base = if mod_data.is_file() && self.include_file.is_none() {
                    mod_data.file_id.and_then(|file| source.directory(file))
                } else {
                    parent_owned_directory.map(PathBuf::from)
                }?;
                match source.resolve_relative(&base, path_attr) {
                    Some(file) => {
                        let owned = source.directory(file);
                        Some((file, owned))
                    }
                    None => {
                        self.dc.def_map.missed_files.push(base.join(path_attr));
                        None
                    }
                }
            }
            None => {
                let base = parent_owned_directory?;
                let as_file = format!("{}.rs", decl.name);
                let as_dir = format!("{}/mod.rs", decl.name);
                if let Some(file) = source.resolve_relative(base, &as_file) {
                    return Some((file, Some(base.join(decl.name.as_str()))));
                }
                if let Some(file) = source.resolve_relative(base, &as_dir) {
                    return Some((file, Some(base.join(decl.name.as_str()))));
                }
                self.dc.def_map.missed_files.push(base.join(&as_file));
                self.dc.def_map.missed_files.push(base.join(&as_dir));
                None
            }
        }
    }

    fn collect_macro_call(&mut self, call: &MacroCallStub, index: u32, options: &CfgOptions) {
        // cfg-disabled macros are never expanded
        if !self.enabled(&call.cfg, options) {
            return;
        }
        if call.body_hash.is_none() && call.path.last().map(Name::as_str) != Some("include") {
            return;
        }
        let mut path = call.path.clone();
        if self.local_inner_macros && path.len() == 1 {
            // local_inner_macros: unqualified calls in the expansion resolve
            // in the defining crate
            path.insert(0, Name::from("$crate"));
        }
        let containing_file = self.include_file.or(self.dc.def_map[self.mod_id].file_id);
        self.dc.macro_calls.push(MacroCallInfo {
            containing_mod: self.mod_id,
            macro_index: self.parent_macro_index.append(index),
            path,
            body: call.body.clone(),
            containing_file,
            depth: self.macro_depth,
            dollar_crate: self.dollar_crate,
        });
    }

    fn collect_macro_def(&mut self, def: &MacroDefStub, index: u32, options: &CfgOptions) {
        if !self.enabled(&def.cfg, options) {
            return;
        }
        let macro_path = self.mod_path().append(def.name.clone());
        let def_info = Arc::new(DeclMacroDef {
            crate_id: self.dc.def_map.crate_id(),
            path: macro_path.clone(),
            macro_index: self.parent_macro_index.append(index),
            body: def.body.clone(),
            body_hash: def.body_hash,
            has_macro_export: def.has_macro_export,
            has_local_inner_macros: def.has_local_inner_macros,
        });
        self.dc
            .def_map
            .mod_mut(self.mod_id)
            .add_legacy_macro(def.name.clone(), def_info.clone());
        self.legacy_macros.insert(def.name.clone(), def_info);

        if def.has_macro_export {
            let vis_item = VisItem::new(macro_path, Visibility::Public, false);
            let root = self.dc.def_map.root();
            self.dc.on_add_item(root, def.name.clone(), PerNs::macros(vis_item));
        }
    }

    fn collect_macro2_def(&mut self, def: &Macro2DefStub, options: &CfgOptions) {
        if !self.enabled(&def.cfg, options) {
            return;
        }
        let macro_path = self.mod_path().append(def.name.clone());
        let crate_id = self.dc.def_map.crate_id();
        self.dc.def_map.mod_mut(self.mod_id).macros2.insert(
            def.name.clone(),
            Arc::new(Macro2Def {
                crate_id,
                path: macro_path.clone(),
                body: def.body.clone(),
                body_hash: def.body_hash,
            }),
        );

        let visibility = self.convert_visibility(&def.visibility, true);
        let vis_item = VisItem::new(macro_path, visibility, false);
        self.dc.on_add_item(self.mod_id, def.name.clone(), PerNs::macros(vis_item));
    }

    /// Carry macros expanded at this position into lexically later sibling
    /// modules, and bubble them to the parent when this module carries
    /// `#[macro_use]`:
    /// ```text
    /// mod before;   // does not see them
    /// foo!();
    /// mod after;    // sees them
    /// ```
    fn propagate_legacy_macros(&mut self, mod_id: ModId) {
        if self.legacy_macros.is_empty() {
            return;
        }
        let children: Vec<ModId> =
            self.dc.def_map[mod_id].child_modules.values().copied().collect();
        for child in children {
            let child_data = &self.dc.def_map[child];
            if child_data.is_enum
                || !MacroIndex::should_propagate(&self.parent_macro_index, &child_data.macro_index)
            {
                continue;
            }
            for descendant in self.dc.def_map.descendants(child) {
                self.dc.def_map.mod_mut(descendant).add_legacy_macros(self.legacy_macros.iter());
            }
        }
        if self.dc.def_map[mod_id].has_macro_use {
            if let Some(parent) = self.dc.def_map[mod_id].parent {
                self.dc.def_map.mod_mut(parent).add_legacy_macros(self.legacy_macros.iter());
                self.propagate_legacy_macros(parent);
            }
        }
    }

    fn convert_visibility(&self, raw: &RawVisibility, enabled: bool) -> Visibility {
        if !enabled {
            return Visibility::CfgDisabled;
        }
        match raw {
            RawVisibility::Public => Visibility::Public,
            RawVisibility::RestrictedCrate => {
                let root = self.dc.def_map.root();
                self.dc.def_map[root].visibility_in_self()
            }
            RawVisibility::Private => self.dc.def_map[self.mod_id].visibility_in_self(),
            RawVisibility::Restricted(path) => {
                self.resolve_restricted_visibility(path).unwrap_or_else(|| {
                    let root = self.dc.def_map.root();
                    self.dc.def_map[root].visibility_in_self()
                })
            }
        }
    }

    /// `pub(in path)`: the path names an ancestor of the declaring module.
    /// Mixed forms like `pub(in self::super::foo)` are not supported and
    /// fall back to crate visibility.
    fn resolve_restricted_visibility(&self, path: &[Name]) -> Option<Visibility> {
        let def_map = &self.dc.def_map;
        if path.iter().all(|segment| segment == "super") {
            let target = def_map.nth_parent(self.mod_id, path.len())?;
            return Some(def_map[target].visibility_in_self());
        }
        let mut ancestors: Vec<ModId> = def_map.ancestors(self.mod_id).collect();
        ancestors.reverse();
        let target = *ancestors.get(path.len())?;
        if def_map[target].path.segments() == path {
            Some(def_map[target].visibility_in_self())
        } else {
            None
        }
    }
}

/// A child module starts with the legacy macros visible at its declaration
/// point.
fn seed_legacy_macros(child: &mut ModData, parent: &ModData) {
    for (name, defs) in &parent.legacy_macros {
        child.legacy_macros.insert(name.clone(), defs.clone());
    }
}

/// Expansion-depth guard shared by macro and `include!` processing.
pub(crate) fn within_expansion_limit(depth: u32) -> bool {
    if depth >= EXPANSION_RECURSION_LIMIT {
        tracing::warn!(depth, "macro expansion depth limit reached, call dropped");
        return false;
    }
    true
}
