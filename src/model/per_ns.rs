use std::fmt;

use rustc_hash::FxHashMap;

use crate::base::{CrateId, Name, Namespace, NsSet};
use crate::model::{ModPath, Visibility};

/// Whether a resolution entered a scope through a named (`use a::B;`,
/// explicit declaration, macro expansion) or glob (`use a::*;`) binding.
/// Named bindings always shadow glob bindings of the same name.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ImportType {
    Named,
    Glob,
}

/// An item as visible in some module: either declared there or imported.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct VisItem {
    /// Full path to the item in its declaring crate, including its name.
    pub path: ModPath,
    pub visibility: Visibility,
    pub is_mod_or_enum: bool,
    /// See [`ImportType`]; stored on the item so candidate sets remember how
    /// they were bound.
    pub is_from_named_import: bool,
}

impl VisItem {
    pub fn new(path: ModPath, visibility: Visibility, is_mod_or_enum: bool) -> VisItem {
        debug_assert!(
            is_mod_or_enum || !path.segments().is_empty(),
            "only a mod or enum item may sit at a crate root path"
        );
        VisItem { path, visibility, is_mod_or_enum, is_from_named_import: true }
    }

    /// Module the item is explicitly declared in.
    pub fn containing_mod(&self) -> ModPath {
        self.path.parent()
    }

    pub fn name(&self) -> Option<&Name> {
        self.path.name()
    }

    pub fn crate_id(&self) -> CrateId {
        self.path.crate_id()
    }

    /// Re-bind the item under an import: the import's visibility replaces
    /// the item's unless the item is already invisible, which must stick.
    pub fn adjust(&self, visibility: Visibility, is_from_named_import: bool) -> VisItem {
        VisItem {
            path: self.path.clone(),
            visibility: if self.visibility.is_invisible() {
                self.visibility.clone()
            } else {
                visibility
            },
            is_mod_or_enum: self.is_mod_or_enum,
            is_from_named_import,
        }
    }
}

/// All candidate resolutions of one name in one scope, split by namespace.
///
/// Multiple entries per namespace model deliberate multi-resolution, e.g.
/// several cfg-disabled declarations of the same name that diagnostics still
/// want to see.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct PerNs {
    pub types: Vec<VisItem>,
    pub values: Vec<VisItem>,
    pub macros: Vec<VisItem>,
}

impl PerNs {
    pub fn empty() -> PerNs {
        PerNs::default()
    }

    pub fn from_item(item: VisItem, namespaces: NsSet) -> PerNs {
        PerNs {
            types: if namespaces.contains(Namespace::Types) { vec![item.clone()] } else { vec![] },
            values: if namespaces.contains(Namespace::Values) { vec![item.clone()] } else { vec![] },
            macros: if namespaces.contains(Namespace::Macros) { vec![item] } else { vec![] },
        }
    }

    pub fn types(item: VisItem) -> PerNs {
        PerNs { types: vec![item], ..PerNs::default() }
    }

    pub fn macros(item: VisItem) -> PerNs {
        PerNs { macros: vec![item], ..PerNs::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.values.is_empty() && self.macros.is_empty()
    }

    pub fn has_all_namespaces(&self) -> bool {
        !self.types.is_empty() && !self.values.is_empty() && !self.macros.is_empty()
    }

    /// First candidate in the types namespace that is a module or enum.
    pub fn types_mod_or_enum(&self) -> Option<&VisItem> {
        self.types.iter().find(|item| item.is_mod_or_enum)
    }

    pub fn adjust(&self, visibility: &Visibility, is_from_named_import: bool) -> PerNs {
        self.map_items(|item| item.adjust(visibility.clone(), is_from_named_import))
    }

    pub fn filter_visibility(&self, mut filter: impl FnMut(&Visibility) -> bool) -> PerNs {
        PerNs {
            types: self.types.iter().filter(|i| filter(&i.visibility)).cloned().collect(),
            values: self.values.iter().filter(|i| filter(&i.visibility)).cloned().collect(),
            macros: self.macros.iter().filter(|i| filter(&i.visibility)).cloned().collect(),
        }
    }

    pub fn map_items(&self, mut f: impl FnMut(&VisItem) -> VisItem) -> PerNs {
        PerNs {
            types: self.types.iter().map(&mut f).collect(),
            values: self.values.iter().map(&mut f).collect(),
            macros: self.macros.iter().map(&mut f).collect(),
        }
    }

    /// Merge two candidate sources, preferring `self` per namespace unless
    /// its candidates are strictly less visible than `other`'s. Used when a
    /// name can come from several lookup sources (legacy macro scope, module
    /// scope, extern prelude, prelude).
    pub fn or(&self, other: &PerNs) -> PerNs {
        PerNs {
            types: ns_or(&self.types, &other.types),
            values: ns_or(&self.values, &other.values),
            macros: ns_or(&self.macros, &other.macros),
        }
    }

    /// Collapse redundant multi-resolution candidates: duplicates of one
    /// path keep the widest visibility, and a set that is entirely
    /// cfg-disabled keeps a single representative. The single-representative
    /// rule is a documented simplification, cheap on the common case of many
    /// identical cfg'd-out declarations.
    pub fn adjust_multiresolve(&self) -> PerNs {
        PerNs {
            types: ns_adjust_multiresolve(&self.types),
            values: ns_adjust_multiresolve(&self.values),
            macros: ns_adjust_multiresolve(&self.macros),
        }
    }

    /// Merge `new` into `existing` under the import precedence rules,
    /// returning the merged set if anything would change.
    ///
    /// Precedence, applied per namespace:
    /// 1. a strictly wider visibility tier wins outright;
    /// 2. at equal tier, named bindings beat glob bindings;
    /// 3. otherwise candidates are united by path, keeping the widest
    ///    visibility for each.
    pub fn merge_from_import(existing: &PerNs, new: &PerNs) -> Option<PerNs> {
        let types = merge_ns(&new.types, &existing.types);
        let values = merge_ns(&new.values, &existing.values);
        let macros = merge_ns(&new.macros, &existing.macros);
        if types == existing.types && values == existing.values && macros == existing.macros {
            return None;
        }
        Some(PerNs { types, values, macros })
    }
}

fn ns_or(this: &[VisItem], other: &[VisItem]) -> Vec<VisItem> {
    if this.is_empty() {
        return other.to_vec();
    }
    if other.is_empty() {
        return this.to_vec();
    }
    let this_tier = ns_tier(this);
    let other_tier = ns_tier(other);
    if this_tier < other_tier && this_tier <= Visibility::Invisible.tier() {
        other.to_vec()
    } else {
        this.to_vec()
    }
}

/// Widest visibility tier present in a candidate set.
fn ns_tier(items: &[VisItem]) -> u8 {
    items.iter().map(|i| i.visibility.tier()).max().unwrap_or(0)
}

fn ns_adjust_multiresolve(items: &[VisItem]) -> Vec<VisItem> {
    if items.len() <= 1 {
        return items.to_vec();
    }
    if items.iter().all(|i| i.visibility == Visibility::CfgDisabled) {
        return vec![items[0].clone()];
    }
    unite_by_path(items, &[])
}

fn merge_ns(new: &[VisItem], existing: &[VisItem]) -> Vec<VisItem> {
    if new.is_empty() {
        return existing.to_vec();
    }
    if existing.is_empty() {
        return new.to_vec();
    }

    let new_tier = ns_tier(new);
    let existing_tier = ns_tier(existing);
    if new_tier > existing_tier {
        return new.to_vec();
    }
    if existing_tier > new_tier {
        return existing.to_vec();
    }

    let new_named = ns_import_type(new) == ImportType::Named;
    let existing_named = ns_import_type(existing) == ImportType::Named;
    if !new_named && existing_named {
        return existing.to_vec();
    }
    if new_named && !existing_named {
        return new.to_vec();
    }

    // Keeping one representative for cfg-disabled-only ties avoids growing
    // candidate sets across many disabled duplicates.
    if new_tier == Visibility::CfgDisabled.tier() {
        return new.to_vec();
    }

    unite_by_path(existing, new)
}

/// United candidate set keyed by item path; when both sides bind the same
/// path, the strictly more permissive visibility is kept, ties keep the
/// first-seen entry.
fn unite_by_path(existing: &[VisItem], new: &[VisItem]) -> Vec<VisItem> {
    let mut by_path: FxHashMap<&ModPath, VisItem> = FxHashMap::default();
    let mut order: Vec<&ModPath> = Vec::new();
    for item in existing.iter().chain(new) {
        match by_path.get(&item.path) {
            None => {
                order.push(&item.path);
                by_path.insert(&item.path, item.clone());
            }
            Some(present) => {
                if item.visibility.is_strictly_more_permissive(&present.visibility) {
                    by_path.insert(&item.path, item.clone());
                }
            }
        }
    }
    order
        .into_iter()
        .filter_map(|path| by_path.remove(path))
        .collect()
}

fn ns_import_type(items: &[VisItem]) -> ImportType {
    // All candidates of one set enter through one import kind; a mixed set
    // would mean a missed merge upstream.
    debug_assert!(
        items.iter().all(|i| i.is_from_named_import == items[0].is_from_named_import),
        "candidate set mixes named and glob bindings"
    );
    if items[0].is_from_named_import { ImportType::Named } else { ImportType::Glob }
}

impl fmt::Debug for PerNs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_struct("PerNs");
        if !self.types.is_empty() {
            map.field("types", &self.types);
        }
        if !self.values.is_empty() {
            map.field("values", &self.values);
        }
        if !self.macros.is_empty() {
            map.field("macros", &self.macros);
        }
        map.finish()
    }
}
