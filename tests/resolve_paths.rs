//! End-to-end path resolution over built def maps.

mod helpers;

use helpers::{TestProject, assert_unresolved, single_type_path};

#[test]
fn test_nested_module_path_resolves() {
    let project = TestProject::new(
        r#"
//- /lib.rs crate:main
fn main
mod a {
    pub mod b {
        pub mod c {
            pub struct Foo
        }
    }
}
"#,
    );
    project.build_all().unwrap();

    let resolved = project.resolve("main", "", "a::b::c::Foo");
    assert_eq!(single_type_path(&resolved), "a::b::c::Foo");
    let item = &resolved.types[0];
    assert_eq!(item.visibility, defmap::Visibility::Public);
    assert!(!item.is_mod_or_enum);
    // unit structs live in both namespaces
    assert_eq!(resolved.values.len(), 1);
}

#[test]
fn test_crate_and_super_paths() {
    let project = TestProject::new(
        r#"
//- /lib.rs crate:main
pub struct Top
mod outer {
    pub struct Mid
    pub mod inner {
        pub struct Deep
    }
}
"#,
    );
    project.build_all().unwrap();

    assert_eq!(single_type_path(&project.resolve("main", "outer::inner", "crate::Top")), "Top");
    assert_eq!(single_type_path(&project.resolve("main", "outer::inner", "super::Mid")), "outer::Mid");
    assert_eq!(
        single_type_path(&project.resolve("main", "outer::inner", "super::super::Top")),
        "Top"
    );
    assert_eq!(single_type_path(&project.resolve("main", "outer", "self::Mid")), "outer::Mid");
    // walking above the root resolves to nothing
    assert_unresolved(&project.resolve("main", "", "super::Top"));
}

#[test]
fn test_unresolved_paths_are_empty_not_errors() {
    let project = TestProject::new(
        r#"
//- /lib.rs crate:main
mod a {
    pub struct Real
}
"#,
    );
    project.build_all().unwrap();

    assert_unresolved(&project.resolve("main", "", "a::Missing"));
    assert_unresolved(&project.resolve("main", "", "nowhere::at::all"));
    // associated-item shaped paths are conclusively out of scope here
    assert_unresolved(&project.resolve("main", "", "a::Real::method"));
}

#[test]
fn test_enum_variants_resolve_through_enum() {
    let project = TestProject::new(
        r#"
//- /lib.rs crate:main
pub enum Direction { North, South }
"#,
    );
    project.build_all().unwrap();

    let resolved = project.resolve("main", "", "Direction::North");
    assert_eq!(single_type_path(&resolved), "Direction::North");
    // the enum itself is a mod-like types entry
    let enum_item = project.resolve("main", "", "Direction");
    assert!(enum_item.types[0].is_mod_or_enum);
}

#[test]
fn test_cross_crate_resolution_via_extern_prelude() {
    let project = TestProject::new(
        r#"
//- /dep.rs crate:dep
pub struct Exported
mod private_mod {
    pub struct Hidden
}

//- /lib.rs crate:main deps:dep
fn main
"#,
    );
    project.build_all().unwrap();

    assert_eq!(single_type_path(&project.resolve("main", "", "dep::Exported")), "Exported");
    // the private module still resolves as a name; its restriction is on
    // the item, for consumers to enforce against their location
    let private_mod = project.resolve("main", "", "dep::private_mod");
    let dep_root = defmap::ModPath::root(project.crate_id("dep"));
    assert!(!private_mod.types[0].visibility.is_visible_from_other_crate());
    assert!(private_mod.types[0].visibility.is_visible_from_mod(&dep_root));
}

#[test]
fn test_edition_2015_absolute_path_falls_back_to_extern_prelude() {
    let project = TestProject::new(
        r#"
//- /dep.rs crate:dep
pub struct Thing

//- /lib.rs crate:main deps:dep edition:2015
pub struct Local
"#,
    );
    project.build_all().unwrap();

    // ::dep::Thing resolves through crate root then the extern prelude
    assert_eq!(single_type_path(&project.resolve("main", "", "::dep::Thing")), "Thing");
    // and crate-root items win the fallback order
    assert_eq!(single_type_path(&project.resolve("main", "", "::Local")), "Local");
}

#[test]
fn test_file_module_tree() {
    let project = TestProject::new(
        r#"
//- /lib.rs crate:main
mod a;

//- /a.rs
pub mod b;
pub struct InA

//- /a/b.rs
pub struct InB
"#,
    );
    project.build_all().unwrap();

    assert_eq!(single_type_path(&project.resolve("main", "", "a::InA")), "a::InA");
    assert_eq!(single_type_path(&project.resolve("main", "", "a::b::InB")), "a::b::InB");
}

#[test]
fn test_mod_rs_layout_and_path_attribute() {
    let project = TestProject::new(
        r#"
//- /lib.rs crate:main
mod a;
#[path = "custom/location.rs"]
mod weird;

//- /a/mod.rs
pub struct InA

//- /custom/location.rs
pub struct Found
"#,
    );
    project.build_all().unwrap();

    assert_eq!(single_type_path(&project.resolve("main", "", "a::InA")), "a::InA");
    assert_eq!(single_type_path(&project.resolve("main", "", "weird::Found")), "weird::Found");
}

#[test]
fn test_candidate_query_filters_by_namespace_and_name() {
    let project = TestProject::new(
        r#"
//- /lib.rs crate:main
pub struct Alpha
pub fn alpha_fn
pub trait AlphaTrait
pub struct Beta
"#,
    );
    project.build_all().unwrap();

    let def_map = project.def_map("main");
    let types_only = def_map.candidates(def_map.root(), defmap::NsSet::TYPES, |name| {
        name.starts_with("Alpha") || name.starts_with("alpha")
    });
    let names: Vec<&str> = types_only.iter().map(|(name, _)| name.as_str()).collect();
    assert!(names.contains(&"Alpha"));
    assert!(names.contains(&"AlphaTrait"));
    // alpha_fn is values-only, Beta fails the name filter
    assert!(!names.contains(&"alpha_fn"));
    assert!(!names.contains(&"Beta"));
}

#[test]
fn test_missing_mod_file_is_recorded_not_fatal() {
    let project = TestProject::new(
        r#"
//- /lib.rs crate:main
mod missing;
pub struct Present
"#,
    );
    project.build_all().unwrap();

    let def_map = project.def_map("main");
    assert_eq!(single_type_path(&project.resolve("main", "", "Present")), "Present");
    assert_unresolved(&project.resolve("main", "", "missing"));
    let missed: Vec<String> =
        def_map.missed_files.iter().map(|p| p.display().to_string()).collect();
    assert!(missed.contains(&"/missing.rs".to_string()), "missed: {missed:?}");
    assert!(missed.contains(&"/missing/mod.rs".to_string()), "missed: {missed:?}");
}
