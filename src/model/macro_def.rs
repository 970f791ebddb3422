use std::sync::Arc;

use crate::base::CrateId;
use crate::model::{MacroIndex, ModPath};

/// A `macro_rules!` definition, scoped by lexical (legacy) rules.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DeclMacroDef {
    pub crate_id: CrateId,
    pub path: ModPath,
    pub macro_index: MacroIndex,
    /// Raw body text; only ever interpreted by the host's expander.
    pub body: String,
    pub body_hash: u64,
    pub has_macro_export: bool,
    pub has_local_inner_macros: bool,
}

/// A macros-2.0 `macro` definition; ordinary item scoping applies.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Macro2Def {
    pub crate_id: CrateId,
    pub path: ModPath,
    pub body: String,
    pub body_hash: u64,
}

/// A resolved macro definition of either kind.
#[derive(Clone, Debug)]
pub enum MacroDef {
    Decl(Arc<DeclMacroDef>),
    Macro2(Arc<Macro2Def>),
}

impl MacroDef {
    pub fn crate_id(&self) -> CrateId {
        match self {
            MacroDef::Decl(def) => def.crate_id,
            MacroDef::Macro2(def) => def.crate_id,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            MacroDef::Decl(def) => &def.body,
            MacroDef::Macro2(def) => &def.body,
        }
    }
}
