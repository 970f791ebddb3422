//! Structural hashing of a file's declaration surface.
//!
//! The hash answers one question cheaply: can an edit to this file have
//! changed name resolution anywhere? Function bodies never reach the stub
//! layer, and order-insensitive declarations are sorted before hashing, so
//! body edits and pure reordering produce the same hash. Macro calls and
//! `macro_rules!` definitions stay in textual order because legacy scoping
//! makes their order observable.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::base::{DeclHash, FileId};
use crate::input::{
    CfgExpr, CfgOptions, CrateInfo, ItemStubs, SourceProvider, StubItem,
};
use crate::model::{CrateDefMap, CrateMetaData};

/// Hash the declaration surface of one file.
pub fn compute_file_hash(stubs: &ItemStubs, options: &CfgOptions) -> DeclHash {
    let mut hasher = FxHasher::default();
    cfg_enabled(&stubs.inner_cfg, options).hash(&mut hasher);
    hash_items_owner(stubs, options, true).hash(&mut hasher);
    DeclHash(hasher.finish())
}

fn cfg_enabled(cfg: &Option<CfgExpr>, options: &CfgOptions) -> bool {
    cfg.as_ref().is_none_or(|expr| expr.eval(options))
}

/// Hash one items-owner, recursing into inline modules. `deeply_enabled`
/// tracks the ancestor cfg state; disabled subtrees still hash (their
/// declarations exist, just disabled) but their macro calls do not, since
/// disabled macros are never collected.
fn hash_items_owner(stubs: &ItemStubs, options: &CfgOptions, deeply_enabled: bool) -> u64 {
    // Declarations whose relative order cannot matter are hashed as a
    // sorted multiset; macro calls and legacy macro defs keep their order.
    let mut unordered: Vec<u64> = Vec::new();
    let mut ordered: Vec<u64> = Vec::new();

    for item in &stubs.items {
        match item {
            StubItem::Simple(simple) => {
                let enabled = deeply_enabled && cfg_enabled(&simple.cfg, options);
                unordered.push(hash_entry(|hasher| {
                    0u8.hash(hasher);
                    simple.name.as_str().hash(hasher);
                    hash_visibility(&simple.visibility, hasher);
                    simple.namespaces.bits().hash(hasher);
                    simple.is_proc_macro.hash(hasher);
                    enabled.hash(hasher);
                }));
            }
            StubItem::Enum(enum_stub) => {
                let enabled = deeply_enabled && cfg_enabled(&enum_stub.cfg, options);
                let mut variants: Vec<u64> = enum_stub
                    .variants
                    .iter()
                    .map(|variant| {
                        hash_entry(|hasher| {
                            variant.name.as_str().hash(hasher);
                            (enabled && cfg_enabled(&variant.cfg, options)).hash(hasher);
                        })
                    })
                    .collect();
                variants.sort_unstable();
                unordered.push(hash_entry(|hasher| {
                    1u8.hash(hasher);
                    enum_stub.name.as_str().hash(hasher);
                    hash_visibility(&enum_stub.visibility, hasher);
                    enabled.hash(hasher);
                    variants.hash(hasher);
                }));
            }
            StubItem::ModDecl(decl) => {
                let enabled = deeply_enabled && cfg_enabled(&decl.cfg, options);
                unordered.push(hash_entry(|hasher| {
                    2u8.hash(hasher);
                    decl.name.as_str().hash(hasher);
                    hash_visibility(&decl.visibility, hasher);
                    decl.has_macro_use.hash(hasher);
                    decl.path_attr.hash(hasher);
                    enabled.hash(hasher);
                }));
            }
            StubItem::Mod(module) => {
                let enabled = deeply_enabled && cfg_enabled(&module.cfg, options);
                let body = hash_items_owner(&module.items, options, enabled);
                unordered.push(hash_entry(|hasher| {
                    3u8.hash(hasher);
                    module.name.as_str().hash(hasher);
                    hash_visibility(&module.visibility, hasher);
                    module.has_macro_use.hash(hasher);
                    enabled.hash(hasher);
                    body.hash(hasher);
                }));
            }
            StubItem::Use(import) => {
                let enabled = deeply_enabled && cfg_enabled(&import.cfg, options);
                unordered.push(hash_entry(|hasher| {
                    4u8.hash(hasher);
                    for segment in &import.path {
                        segment.as_str().hash(hasher);
                    }
                    import.alias.as_ref().map(|a| a.as_str()).hash(hasher);
                    hash_visibility(&import.visibility, hasher);
                    import.is_glob.hash(hasher);
                    import.is_prelude.hash(hasher);
                    enabled.hash(hasher);
                }));
            }
            StubItem::ExternCrate(extern_crate) => {
                let enabled = deeply_enabled && cfg_enabled(&extern_crate.cfg, options);
                unordered.push(hash_entry(|hasher| {
                    5u8.hash(hasher);
                    extern_crate.name.as_str().hash(hasher);
                    extern_crate.alias.as_ref().map(|a| a.as_str()).hash(hasher);
                    hash_visibility(&extern_crate.visibility, hasher);
                    extern_crate.has_macro_use.hash(hasher);
                    enabled.hash(hasher);
                }));
            }
            StubItem::MacroCall(call) => {
                if !(deeply_enabled && cfg_enabled(&call.cfg, options)) {
                    continue;
                }
                ordered.push(hash_entry(|hasher| {
                    6u8.hash(hasher);
                    for segment in &call.path {
                        segment.as_str().hash(hasher);
                    }
                    match call.body_hash {
                        Some(body_hash) => body_hash.hash(hasher),
                        None => call.body.hash(hasher),
                    }
                }));
            }
            StubItem::MacroDef(def) => {
                if !(deeply_enabled && cfg_enabled(&def.cfg, options)) {
                    continue;
                }
                ordered.push(hash_entry(|hasher| {
                    7u8.hash(hasher);
                    def.name.as_str().hash(hasher);
                    def.body_hash.hash(hasher);
                    def.has_macro_export.hash(hasher);
                    def.has_local_inner_macros.hash(hasher);
                }));
            }
            StubItem::Macro2Def(def) => {
                let enabled = deeply_enabled && cfg_enabled(&def.cfg, options);
                if !enabled {
                    continue;
                }
                unordered.push(hash_entry(|hasher| {
                    8u8.hash(hasher);
                    def.name.as_str().hash(hasher);
                    hash_visibility(&def.visibility, hasher);
                    def.body_hash.hash(hasher);
                }));
            }
        }
    }

    unordered.sort_unstable();
    hash_entry(|hasher| {
        unordered.hash(hasher);
        ordered.hash(hasher);
    })
}

fn hash_entry(fill: impl FnOnce(&mut FxHasher)) -> u64 {
    let mut hasher = FxHasher::default();
    fill(&mut hasher);
    hasher.finish()
}

fn hash_visibility(visibility: &crate::input::RawVisibility, hasher: &mut FxHasher) {
    let (tag, path) = visibility.hash_tag();
    tag.hash(hasher);
    for segment in path {
        segment.as_str().hash(hasher);
    }
}

/// Whether a file's *declared surface* differs from what `def_map` was
/// built against. Body-only edits return false here and must not trigger a
/// rebuild.
pub fn is_file_changed(
    provider: &dyn SourceProvider,
    info: &CrateInfo,
    def_map: &CrateDefMap,
    file: FileId,
) -> bool {
    let Some(file_info) = def_map.file_infos.get(&file) else {
        // Not part of this crate's tree; additions are handled through
        // missed-file tracking instead.
        return false;
    };
    if provider.modification_stamp(file) == file_info.modification_stamp {
        return false;
    }
    let Some(stubs) = provider.stubs(file) else {
        return true;
    };
    compute_file_hash(&stubs, &info.cfg_options) != file_info.hash
}

/// Structural staleness of a whole crate: its metadata snapshot no longer
/// matches the graph, or a file it failed to find now exists.
pub fn is_crate_changed(
    def_map: &CrateDefMap,
    info: &CrateInfo,
    provider: &dyn SourceProvider,
) -> bool {
    if def_map.meta != CrateMetaData::new(info) {
        tracing::debug!(krate = %info.name, "crate metadata changed");
        return true;
    }
    def_map.missed_files.iter().any(|path| provider.path_exists(path))
}

/// Full per-file recheck, used when the host only knows "something changed
/// somewhere".
pub fn any_file_changed(
    provider: &dyn SourceProvider,
    info: &CrateInfo,
    def_map: &CrateDefMap,
) -> bool {
    def_map
        .file_infos
        .keys()
        .any(|&file| is_file_changed(provider, info, def_map, file))
}
