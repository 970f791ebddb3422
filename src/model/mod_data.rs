use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::base::{FileId, Name};
use crate::model::{DeclMacroDef, Macro2Def, MacroIndex, ModPath, PerNs, Visibility};

/// Index of a [`ModData`] node in its crate's arena.
///
/// Parent/child links are stored as indices, so the module tree has
/// back-pointers without shared ownership.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModId(pub u32);

impl ModId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ModId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModId({})", self.0)
    }
}

/// One node of the module tree: a module, a file, or an enum acting as a
/// namespace for its variants.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ModData {
    pub parent: Option<ModId>,
    pub path: ModPath,
    pub macro_index: MacroIndex,
    /// Whether the ancestor chain (including the declaring `mod` item's own
    /// attributes) is cfg-enabled.
    pub is_deeply_enabled_by_cfg_outer: bool,
    /// Whether the module's own file-level `#![cfg(..)]` holds. Always true
    /// for inline modules.
    pub is_enabled_by_cfg_inner: bool,
    /// Containing file.
    pub file_id: Option<FileId>,
    /// `::`-joined inline nesting inside the file; empty when this module IS
    /// the file.
    pub file_relative_path: String,
    /// Directory that owns this module's child files (`name.rs`,
    /// `name/mod.rs` candidates are resolved against it).
    pub owned_directory: Option<PathBuf>,
    pub has_macro_use: bool,
    pub is_enum: bool,
    /// The resolved namespace contents of this module.
    pub visible_items: FxHashMap<Name, PerNs>,
    /// Owned children. Always a subset of the mod-or-enum entries of
    /// `visible_items`: both are updated together under one changed flag, so
    /// a candidate that lost the visibility tie-break never leaks in here.
    pub child_modules: FxHashMap<Name, ModId>,
    /// Macros visible here under legacy textual scoping. Several defs per
    /// name are possible (textual shadowing keeps them all, lookup picks by
    /// position).
    pub legacy_macros: FxHashMap<Name, Vec<Arc<DeclMacroDef>>>,
    /// Macros-2.0 definitions declared in this module.
    pub macros2: FxHashMap<Name, Arc<Macro2Def>>,
    /// Names of proc macros declared in this module.
    pub proc_macros: FxHashSet<Name>,
    /// Traits imported as `use path::Trait as _;`, usable but unnameable.
    pub unnamed_trait_imports: FxHashMap<ModPath, Visibility>,
    /// False once the module is reachable from the crate root through
    /// `child_modules`. A file stays shadowed when another cfg-enabled mod
    /// declaration with the same path won the scope; it is then reachable
    /// only through `CrateDefMap::file_infos`.
    pub is_shadowed_by_other_file: bool,
}

impl ModData {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        parent: Option<ModId>,
        path: ModPath,
        macro_index: MacroIndex,
        is_deeply_enabled_by_cfg_outer: bool,
        is_enabled_by_cfg_inner: bool,
        file_id: Option<FileId>,
        file_relative_path: String,
        owned_directory: Option<PathBuf>,
        has_macro_use: bool,
        is_enum: bool,
    ) -> ModData {
        ModData {
            parent,
            path,
            macro_index,
            is_deeply_enabled_by_cfg_outer,
            is_enabled_by_cfg_inner,
            file_id,
            file_relative_path,
            owned_directory,
            has_macro_use,
            is_enum,
            visible_items: FxHashMap::default(),
            child_modules: FxHashMap::default(),
            legacy_macros: FxHashMap::default(),
            macros2: FxHashMap::default(),
            proc_macros: FxHashSet::default(),
            unnamed_trait_imports: FxHashMap::default(),
            is_shadowed_by_other_file: true,
        }
    }

    /// True when the module is a whole `.rs` file rather than an inline
    /// `mod { .. }` block or enum.
    pub fn is_file(&self) -> bool {
        self.file_relative_path.is_empty() && !self.is_enum
    }

    pub fn is_crate_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn name(&self) -> Option<&Name> {
        self.path.name()
    }

    pub fn is_deeply_enabled_by_cfg(&self) -> bool {
        self.is_deeply_enabled_by_cfg_outer && self.is_enabled_by_cfg_inner
    }

    /// The `pub(self)` visibility of this module.
    pub fn visibility_in_self(&self) -> Visibility {
        Visibility::Restricted(self.path.clone())
    }

    /// Candidates for `name` in this module's scope, empty if unknown.
    pub fn visible_item(&self, name: &Name) -> PerNs {
        self.visible_items.get(name).cloned().unwrap_or_default()
    }

    /// All scope entries passing a visibility filter, with unnamed trait
    /// imports surfaced under the `_` pseudo-name.
    pub fn visible_items_filtered(
        &self,
        mut filter: impl FnMut(&Visibility) -> bool,
    ) -> Vec<(Name, PerNs)> {
        let mut result: Vec<(Name, PerNs)> = self
            .visible_items
            .iter()
            .filter_map(|(name, per_ns)| {
                let filtered = per_ns.filter_visibility(&mut filter);
                if filtered.is_empty() { None } else { Some((name.clone(), filtered)) }
            })
            .collect();
        for (path, visibility) in &self.unnamed_trait_imports {
            if !filter(visibility) {
                continue;
            }
            let trait_item = crate::model::VisItem {
                path: path.clone(),
                visibility: visibility.clone(),
                is_mod_or_enum: false,
                is_from_named_import: true,
            };
            result.push((Name::from("_"), PerNs::types(trait_item)));
        }
        result
    }

    /// Merge candidates for `name` into this scope. Returns true if the
    /// scope changed.
    pub fn push_resolution(&mut self, name: Name, def: PerNs) -> bool {
        debug_assert!(!def.is_empty());
        match self.visible_items.get(&name) {
            None => {
                self.visible_items.insert(name, def);
                true
            }
            Some(existing) => match PerNs::merge_from_import(existing, &def) {
                Some(merged) => {
                    self.visible_items.insert(name, merged);
                    true
                }
                None => false,
            },
        }
    }

    pub fn add_legacy_macro(&mut self, name: Name, def: Arc<DeclMacroDef>) {
        self.legacy_macros.entry(name).or_default().push(def);
    }

    pub fn add_legacy_macros<'a>(
        &mut self,
        defs: impl IntoIterator<Item = (&'a Name, &'a Arc<DeclMacroDef>)>,
    ) {
        for (name, def) in defs {
            self.add_legacy_macro(name.clone(), def.clone());
        }
    }
}
