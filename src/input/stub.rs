//! Light item descriptors.
//!
//! A host lowers each items-owner (file, inline module, macro expansion
//! output) into an ordered [`ItemStubs`] sequence. Stubs carry exactly what
//! name resolution needs: kind, name, raw visibility, cfg predicate, and for
//! macros the raw body text plus a content hash. Function bodies, field
//! lists and expression-level detail never reach the engine, which is what
//! makes body-only edits invisible to change detection.

use crate::base::{Name, NsSet};
use crate::input::CfgExpr;

/// Ordered declaration list of one items-owner.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ItemStubs {
    /// File-level `#![cfg(..)]`, if any. Only meaningful for file roots.
    pub inner_cfg: Option<CfgExpr>,
    /// File-level `#![macro_use]`. Only meaningful for file roots.
    pub inner_macro_use: bool,
    pub items: Vec<StubItem>,
}

impl ItemStubs {
    pub fn new(items: Vec<StubItem>) -> ItemStubs {
        ItemStubs { inner_cfg: None, inner_macro_use: false, items }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum StubItem {
    /// Any named item that is not a module or enum: fn, struct, trait,
    /// const, static, type alias, proc-macro definition.
    Simple(SimpleStub),
    /// `mod name;`
    ModDecl(ModDeclStub),
    /// `mod name { .. }`
    Mod(ModStub),
    /// `enum Name { .. }`; variants are namespace contents, so enums get a
    /// stub kind of their own.
    Enum(EnumStub),
    /// One leaf of a `use` tree, already flattened by the host.
    Use(UseStub),
    /// `extern crate name;`
    ExternCrate(ExternCrateStub),
    /// `path!(..)` in item position.
    MacroCall(MacroCallStub),
    /// `macro_rules! name { .. }`
    MacroDef(MacroDefStub),
    /// `macro name { .. }` (macros 2.0)
    Macro2Def(Macro2DefStub),
}

/// Raw visibility token, canonicalized so the hash layer sees one spelling
/// per meaning (`pub(in crate)` is `RestrictedCrate`, `pub(self)` is
/// `Private`).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum RawVisibility {
    Public,
    /// `pub(crate)` and `pub(in crate)`
    RestrictedCrate,
    /// `pub(in some::path)`, path relative to the declaring module chain
    Restricted(Vec<Name>),
    Private,
}

impl RawVisibility {
    /// Canonicalizing constructor for `pub(..)` restrictions.
    pub fn restricted(path: Vec<Name>) -> RawVisibility {
        match path.as_slice() {
            [] => RawVisibility::RestrictedCrate,
            [single] if single == "crate" => RawVisibility::RestrictedCrate,
            [single] if single == "self" => RawVisibility::Private,
            _ => RawVisibility::Restricted(path),
        }
    }

    /// Stable tag hashed into the declaration surface.
    pub(crate) fn hash_tag(&self) -> (u8, &[Name]) {
        match self {
            RawVisibility::Public => (0, &[]),
            RawVisibility::RestrictedCrate => (1, &[]),
            RawVisibility::Restricted(path) => (2, path),
            RawVisibility::Private => (3, &[]),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SimpleStub {
    pub name: Name,
    pub visibility: RawVisibility,
    pub cfg: Option<CfgExpr>,
    /// Namespaces the item occupies, decided by the host from the item kind.
    pub namespaces: NsSet,
    /// Set for `#[proc_macro]`/`#[proc_macro_derive]` definitions.
    pub is_proc_macro: bool,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ModDeclStub {
    pub name: Name,
    pub visibility: RawVisibility,
    pub cfg: Option<CfgExpr>,
    pub has_macro_use: bool,
    /// `#[path = ".."]` override, verbatim.
    pub path_attr: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ModStub {
    pub name: Name,
    pub visibility: RawVisibility,
    pub cfg: Option<CfgExpr>,
    pub has_macro_use: bool,
    pub items: ItemStubs,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EnumStub {
    pub name: Name,
    pub visibility: RawVisibility,
    pub cfg: Option<CfgExpr>,
    pub variants: Vec<VariantStub>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct VariantStub {
    pub name: Name,
    pub cfg: Option<CfgExpr>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct UseStub {
    /// Path segments; a leading empty segment encodes `::absolute` paths.
    pub path: Vec<Name>,
    /// `use path as alias;`
    pub alias: Option<Name>,
    pub visibility: RawVisibility,
    pub cfg: Option<CfgExpr>,
    pub is_glob: bool,
    /// `#[prelude_import]`
    pub is_prelude: bool,
}

impl UseStub {
    /// The name this import binds in scope. None for globs.
    pub fn name_in_scope(&self) -> Option<&Name> {
        if self.is_glob {
            return None;
        }
        self.alias.as_ref().or_else(|| self.path.last())
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ExternCrateStub {
    pub name: Name,
    pub alias: Option<Name>,
    pub visibility: RawVisibility,
    pub cfg: Option<CfgExpr>,
    pub has_macro_use: bool,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MacroCallStub {
    pub path: Vec<Name>,
    /// Raw token text between the delimiters.
    pub body: String,
    /// Content hash of `body`; None only for `include!` where the body is a
    /// path, not token soup.
    pub body_hash: Option<u64>,
    pub cfg: Option<CfgExpr>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MacroDefStub {
    pub name: Name,
    pub body: String,
    pub body_hash: u64,
    pub cfg: Option<CfgExpr>,
    pub has_macro_export: bool,
    pub has_local_inner_macros: bool,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Macro2DefStub {
    pub name: Name,
    pub visibility: RawVisibility,
    pub body: String,
    pub body_hash: u64,
    pub cfg: Option<CfgExpr>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restricted_visibility_canonicalization() {
        assert_eq!(RawVisibility::restricted(vec![]), RawVisibility::RestrictedCrate);
        assert_eq!(
            RawVisibility::restricted(vec!["crate".into()]),
            RawVisibility::RestrictedCrate
        );
        assert_eq!(RawVisibility::restricted(vec!["self".into()]), RawVisibility::Private);
        assert_eq!(
            RawVisibility::restricted(vec!["super".into()]),
            RawVisibility::Restricted(vec!["super".into()])
        );
    }

    #[test]
    fn test_use_stub_name_in_scope() {
        let mut import = UseStub {
            path: vec!["a".into(), "b".into()],
            alias: None,
            visibility: RawVisibility::Private,
            cfg: None,
            is_glob: false,
            is_prelude: false,
        };
        assert_eq!(import.name_in_scope(), Some(&Name::from("b")));

        import.alias = Some("c".into());
        assert_eq!(import.name_in_scope(), Some(&Name::from("c")));

        import.is_glob = true;
        assert_eq!(import.name_in_scope(), None);
    }
}
