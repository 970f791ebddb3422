//! The engine's input surface.
//!
//! Everything the engine consumes arrives through this module: pre-parsed
//! item stubs ([`ItemStubs`]), conditional-compilation predicates
//! ([`CfgExpr`] evaluated against a crate's [`CfgOptions`]), the crate graph
//! ([`CrateGraph`]), file contents and relative-path resolution
//! ([`SourceProvider`]) and macro expansion ([`MacroExpander`]).
//!
//! The split keeps the core free of parsing and file-system concerns: a host
//! implements the three traits, and the engine treats their answers as
//! ground truth.

mod cfg;
mod graph;
mod source;
mod stub;

pub use cfg::{CfgExpr, CfgOptions};
pub use graph::{CrateGraph, CrateInfo, Dependency, Edition};
pub use source::{MacroExpander, NullExpander, SourceProvider};
pub use stub::{
    EnumStub, ExternCrateStub, ItemStubs, MacroCallStub, MacroDefStub, Macro2DefStub, ModDeclStub,
    ModStub, RawVisibility, SimpleStub, StubItem, UseStub, VariantStub,
};
