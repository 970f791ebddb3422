//! Pure path resolution against a `CrateDefMap`.
//!
//! All resolution logic lives here, keeping the model a pure data
//! structure. Nothing in this module mutates a map: resolution during a
//! build and resolution on behalf of consumers run the same code.

use crate::base::{CrateId, Name};
use crate::model::{CrateDefMap, MacroDef, MacroIndex, ModId, PerNs, VisItem, Visibility};

/// Import resolution tolerates partially-built scopes and reports whether
/// retrying later could improve the answer; general resolution assumes a
/// finished map.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ResolveMode {
    Import,
    Other,
}

#[derive(Clone, Debug)]
pub struct ResolvePathResult {
    pub resolved: PerNs,
    /// False signals "inconclusive, retry once more imports have landed".
    pub reached_fixed_point: bool,
    /// True when any intermediate module belonged to another crate; that
    /// crate's map is complete, so the answer cannot change in this build.
    pub visited_other_crate: bool,
}

impl ResolvePathResult {
    fn empty(reached_fixed_point: bool) -> ResolvePathResult {
        ResolvePathResult {
            resolved: PerNs::empty(),
            reached_fixed_point,
            visited_other_crate: false,
        }
    }
}

/// Leading-segment classification of a path.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum PathKind {
    Plain,
    /// `self` is `Super(0)`.
    Super(usize),
    Crate,
    /// Leading `::`, encoded as a leading empty segment.
    Absolute,
    /// `$crate` from a macro expansion, carrying the defining crate.
    DollarCrate(CrateId),
}

/// Classify the leading segments; returns the kind and how many segments it
/// consumed.
fn path_kind(path: &[Name], dollar_crate: Option<CrateId>) -> (PathKind, usize) {
    match path.first().map(Name::as_str) {
        Some("$crate") => match dollar_crate {
            Some(crate_id) => (PathKind::DollarCrate(crate_id), 1),
            None => {
                tracing::warn!(?path, "$crate path outside any macro expansion");
                (PathKind::Plain, 0)
            }
        },
        Some("crate") => (PathKind::Crate, 1),
        Some("super") => {
            let level = path.iter().take_while(|s| s.as_str() == "super").count();
            (PathKind::Super(level), level)
        }
        Some("self") => {
            if path.get(1).map(Name::as_str) == Some("super") {
                let (kind, skip) = path_kind(&path[1..], dollar_crate);
                (kind, skip + 1)
            } else {
                (PathKind::Super(0), 1)
            }
        }
        Some("") => (PathKind::Absolute, 1),
        _ => (PathKind::Plain, 0),
    }
}

impl CrateDefMap {
    /// Resolve `path` as seen from `containing`, walking intermediate
    /// segments through the types namespace.
    ///
    /// `with_invisible` keeps invisible/cfg-disabled candidates in play;
    /// imports of already-invisible items need that to stay observable.
    /// `dollar_crate` is the crate a surrounding macro expansion's `$crate`
    /// refers to, `None` outside expansions.
    pub fn resolve_path_fp(
        &self,
        containing: ModId,
        path: &[Name],
        mode: ResolveMode,
        with_invisible: bool,
        dollar_crate: Option<CrateId>,
    ) -> ResolvePathResult {
        let (kind, mut segment_index) = path_kind(path, dollar_crate);

        let edition_2015 = self.meta.edition == crate::input::Edition::Edition2015;
        let first_per_ns = match kind {
            PathKind::DollarCrate(crate_id) => match self.def_map(crate_id) {
                Some(def_map) => def_map.root_as_per_ns(),
                None => {
                    tracing::warn!(%crate_id, "$crate refers to a crate outside the dependency set");
                    return ResolvePathResult::empty(true);
                }
            },
            PathKind::Crate => self.root_as_per_ns(),
            PathKind::Super(level) => match self.nth_parent(containing, level) {
                Some(mod_id) => self.as_per_ns(mod_id),
                None => return ResolvePathResult::empty(true),
            },
            // Edition-2015 plain imports and absolute paths are
            // crate-relative with an extern-prelude fallback.
            PathKind::Absolute | PathKind::Plain
                if edition_2015
                    && (kind == PathKind::Absolute || mode == ResolveMode::Import) =>
            {
                let segment = &path[segment_index];
                segment_index += 1;
                self.resolve_name_in_crate_root_or_extern_prelude(segment)
            }
            PathKind::Absolute => {
                let crate_name = &path[segment_index];
                segment_index += 1;
                match self.extern_prelude.get(crate_name) {
                    Some(&crate_id) => extern_crate_root_as_per_ns(crate_id),
                    // extern crate declarations can still add to the extern
                    // prelude in this build
                    None => return ResolvePathResult::empty(false),
                }
            }
            PathKind::Plain => {
                let segment = &path[segment_index];
                segment_index += 1;
                self.resolve_name_in_module(containing, segment)
            }
        };

        let mut current = first_per_ns;
        let mut visited_other_crate = false;
        for segment in &path[segment_index..] {
            // Path segments remain but the path so far did not resolve in
            // the types namespace: no resolution yet.
            let visible: Vec<&VisItem> = current
                .types
                .iter()
                .filter(|item| with_invisible || !item.visibility.is_invisible())
                .collect();
            if visible.is_empty() {
                return ResolvePathResult::empty(false);
            }
            // Could be an associated item path (`Struct::method`); those are
            // out of this engine's namespace and conclusively unresolved.
            let Some(mod_item) = visible.iter().find(|item| item.is_mod_or_enum) else {
                return ResolvePathResult::empty(true);
            };
            let Some((def_map, mod_id)) = self.try_cast_to_mod(mod_item) else {
                return ResolvePathResult::empty(true);
            };
            if def_map.crate_id() != self.crate_id() {
                visited_other_crate = true;
            }
            current = def_map[mod_id].visible_item(segment);
        }

        let resolved = if with_invisible {
            current
        } else {
            current.filter_visibility(|visibility| !visibility.is_invisible())
        };
        ResolvePathResult { resolved, reached_fixed_point: true, visited_other_crate }
    }

    /// Resolve one name in a module scope, in order:
    /// legacy macro scope, the module's own scope, extern prelude, prelude.
    pub fn resolve_name_in_module(&self, mod_id: ModId, name: &Name) -> PerNs {
        let data = &self[mod_id];
        let from_legacy_macro = match data.legacy_macros.get(name) {
            Some(defs) => {
                let visibility = if defs.iter().any(|def| def.has_macro_export) {
                    Visibility::Public
                } else {
                    data.visibility_in_self()
                };
                PerNs::macros(VisItem::new(data.path.append(name.clone()), visibility, false))
            }
            None => PerNs::empty(),
        };
        let from_scope = data.visible_item(name);
        let from_extern_prelude = self.resolve_name_in_extern_prelude(name);
        let from_prelude = self.resolve_name_in_prelude(name);
        from_legacy_macro.or(&from_scope).or(&from_extern_prelude).or(&from_prelude)
    }

    fn resolve_name_in_extern_prelude(&self, name: &Name) -> PerNs {
        match self.extern_prelude.get(name) {
            Some(&crate_id) => extern_crate_root_as_per_ns(crate_id),
            None => PerNs::empty(),
        }
    }

    fn resolve_name_in_crate_root_or_extern_prelude(&self, name: &Name) -> PerNs {
        let from_crate_root = self[self.root()].visible_item(name);
        let from_extern_prelude = self.resolve_name_in_extern_prelude(name);
        from_crate_root.or(&from_extern_prelude)
    }

    fn resolve_name_in_prelude(&self, name: &Name) -> PerNs {
        let Some((prelude_crate, prelude_mod)) = self.prelude else {
            return PerNs::empty();
        };
        match self.def_map(prelude_crate) {
            Some(def_map) => def_map[prelude_mod].visible_item(name),
            None => PerNs::empty(),
        }
    }

    /// Resolve a macro call to its definition.
    ///
    /// One-segment calls consult the legacy scope first, restricted to
    /// definitions lexically before the call; everything else goes through
    /// general path resolution in the macros namespace. Cfg-disabled macros
    /// are never expanded, so invisible candidates stay excluded.
    pub fn resolve_macro_call(
        &self,
        containing: ModId,
        path: &[Name],
        call_index: &MacroIndex,
        dollar_crate: Option<CrateId>,
    ) -> Option<MacroDef> {
        if path.len() == 1 {
            let data = &self[containing];
            let name = &path[0];
            if let Some(defs) = data.legacy_macros.get(name) {
                // nearest definition lexically before the call
                let preceding = defs
                    .iter()
                    .filter(|def| def.macro_index < *call_index)
                    .max_by(|a, b| a.macro_index.cmp(&b.macro_index));
                if let Some(def) = preceding {
                    return Some(MacroDef::Decl(def.clone()));
                }
            }
            // Module-scoped macros (macros 2.0, `use` aliases). Deliberately
            // not resolve_name_in_module: its legacy-scope contribution has
            // no lexical-position filter and would see later definitions.
            let from_scope = data.visible_item(name);
            let def_item =
                from_scope.macros.iter().find(|item| !item.visibility.is_invisible())?;
            return self.macro_def(def_item);
        }
        let result =
            self.resolve_path_fp(containing, path, ResolveMode::Other, false, dollar_crate);
        let def_item = result.resolved.macros.first()?;
        self.macro_def(def_item)
    }
}

/// A dependency's crate root as a candidate set, without needing its map.
fn extern_crate_root_as_per_ns(crate_id: CrateId) -> PerNs {
    PerNs::types(VisItem::new(
        crate::model::ModPath::root(crate_id),
        Visibility::Public,
        true,
    ))
}
