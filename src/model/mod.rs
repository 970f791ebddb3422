//! The resolved data model.
//!
//! [`CrateDefMap`] is the output of a crate build: an arena of [`ModData`]
//! nodes forming the module tree, each mapping names to [`PerNs`] candidate
//! sets of [`VisItem`]s. Everything here is plain data; the algorithms that
//! fill it live in `collect`, and the pure queries over it in `resolve`.

mod def_map;
mod macro_def;
mod macro_index;
mod mod_data;
mod path;
mod per_ns;
mod visibility;

pub use def_map::{CrateDefMap, CrateMetaData, FileInfo};
pub use macro_def::{DeclMacroDef, Macro2Def, MacroDef};
pub use macro_index::MacroIndex;
pub use mod_data::{ModData, ModId};
pub use path::ModPath;
pub use per_ns::{ImportType, PerNs, VisItem};
pub use visibility::Visibility;
