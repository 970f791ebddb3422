//! In-memory host: files, crate graph and a trivial expander, driving the
//! real service and scheduler.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use defmap::base::{CancellationToken, CrateId, FileId, Name};
use defmap::build::{BuildError, BuildSources, get_or_update_if_needed, update_all_crates};
use defmap::input::{
    CfgOptions, CrateGraph, CrateInfo, Dependency, Edition, ItemStubs, MacroExpander,
    SourceProvider,
};
use defmap::model::{CrateDefMap, ModId, PerNs};
use defmap::resolve::ResolveMode;
use defmap::service::DefMapService;

use crate::helpers::fixture::{self, parse_items, split_path};

struct FileRecord {
    path: PathBuf,
    stubs: Arc<ItemStubs>,
    stamp: u64,
}

pub struct TestProject {
    files: RwLock<Vec<FileRecord>>,
    by_path: RwLock<HashMap<PathBuf, usize>>,
    crates: Vec<Arc<CrateInfo>>,
    crate_names: Vec<String>,
    pub service: DefMapService,
}

impl TestProject {
    /// Parse a fixture and set up files plus the crate graph. Crates must
    /// be declared before the crates that depend on them.
    pub fn new(fixture_text: &str) -> TestProject {
        let mut project = TestProject {
            files: RwLock::new(Vec::new()),
            by_path: RwLock::new(HashMap::new()),
            crates: Vec::new(),
            crate_names: Vec::new(),
            service: DefMapService::new(),
        };

        let mut pending_crates: Vec<(String, FileId, Vec<String>, Option<String>, Vec<(String, Option<String>)>)> =
            Vec::new();
        for file in fixture::parse_fixture(fixture_text) {
            let file_id = project.insert_file(&file.path, &file.text);
            if let Some(crate_name) = file.crate_name {
                pending_crates.push((crate_name, file_id, file.deps, file.edition, file.cfg));
            }
        }

        for (name, root_file, deps, edition, cfg) in pending_crates {
            let dependencies = deps
                .iter()
                .map(|dep| Dependency {
                    name: Name::from(dep.as_str()),
                    crate_id: project.try_crate_id(dep).unwrap_or_else(|| {
                        panic!("crate {dep} must be declared before its dependents")
                    }),
                })
                .collect();
            let mut cfg_options = CfgOptions::new();
            for (key, value) in cfg {
                match value {
                    Some(value) => {
                        cfg_options.insert_key_value(key.as_str().into(), value.as_str().into())
                    }
                    None => cfg_options.insert_atom(key.as_str().into()),
                }
            }
            let edition = match edition.as_deref() {
                Some("2015") => Edition::Edition2015,
                Some("2018") => Edition::Edition2018,
                Some("2024") => Edition::Edition2024,
                Some("2021") | None => Edition::Edition2021,
                Some(other) => panic!("unknown edition {other}"),
            };
            project.crates.push(Arc::new(CrateInfo {
                name: Name::from(name.as_str()),
                edition,
                cfg_options: Arc::new(cfg_options),
                env: Default::default(),
                dependencies,
                root_file,
            }));
            project.crate_names.push(name);
        }
        project
    }

    fn insert_file(&self, path: &str, text: &str) -> FileId {
        let path = normalize(Path::new(path));
        let mut files = self.files.write().unwrap();
        let id = FileId(files.len() as u32);
        files.push(FileRecord {
            path: path.clone(),
            stubs: Arc::new(parse_items(text)),
            stamp: 0,
        });
        self.by_path.write().unwrap().insert(path, files.len() - 1);
        id
    }

    pub fn file_id(&self, path: &str) -> FileId {
        let path = normalize(Path::new(path));
        let index = self.by_path.read().unwrap()[&path];
        FileId(index as u32)
    }

    /// Replace a file's declaration surface and raise the host's
    /// file-changed event, like an editor save would.
    pub fn change_file(&self, path: &str, new_text: &str) {
        let file = self.file_id(path);
        {
            let mut files = self.files.write().unwrap();
            let record = &mut files[file.0 as usize];
            record.stubs = Arc::new(parse_items(new_text));
            record.stamp += 1;
        }
        self.service.on_file_changed(file);
    }

    /// Bump a file's modification stamp without touching its declarations:
    /// the shape of a function-body-only edit.
    pub fn touch_file(&self, path: &str) {
        let file = self.file_id(path);
        self.files.write().unwrap()[file.0 as usize].stamp += 1;
        self.service.on_file_changed(file);
    }

    /// Create a file after the fact and raise the file-added event.
    pub fn add_file(&self, path: &str, text: &str) {
        self.insert_file(path, text);
        self.service.on_file_added(&normalize(Path::new(path)));
    }

    pub fn try_crate_id(&self, name: &str) -> Option<CrateId> {
        self.crate_names
            .iter()
            .position(|candidate| candidate == name)
            .map(|index| CrateId(index as u32))
    }

    pub fn crate_id(&self, name: &str) -> CrateId {
        self.try_crate_id(name)
            .unwrap_or_else(|| panic!("no crate named {name} in fixture"))
    }

    pub fn sources(&self) -> BuildSources<'_> {
        BuildSources { graph: self, source: self, expander: self }
    }

    pub fn build_all(&self) -> Result<(), BuildError> {
        update_all_crates(&self.service, &self.sources(), &CancellationToken::new())
    }

    pub fn update(&self, crate_name: &str) -> Result<Option<Arc<CrateDefMap>>, BuildError> {
        let crate_id = self.crate_id(crate_name);
        let mut maps = get_or_update_if_needed(
            &self.service,
            &self.sources(),
            &CancellationToken::new(),
            &[crate_id],
        )?;
        Ok(maps.remove(&crate_id).flatten())
    }

    /// The built map of a crate; panics if missing so tests read cleanly.
    pub fn def_map(&self, crate_name: &str) -> Arc<CrateDefMap> {
        self.service
            .def_map(self.crate_id(crate_name))
            .unwrap_or_else(|| panic!("crate {crate_name} has no def map; was build_all called?"))
    }

    /// Module id for a `::`-separated path inside a crate ("" is the root).
    pub fn module(&self, def_map: &CrateDefMap, path: &str) -> ModId {
        if path.is_empty() {
            return def_map.root();
        }
        let segments: Vec<Name> = path.split("::").map(Name::from).collect();
        def_map
            .local_mod_by_path(&segments)
            .unwrap_or_else(|| panic!("no module {path} in {def_map:?}"))
    }

    /// Resolve `path` as written in module `from` of `crate_name`.
    pub fn resolve(&self, crate_name: &str, from: &str, path: &str) -> PerNs {
        let def_map = self.def_map(crate_name);
        let module = self.module(&def_map, from);
        def_map
            .resolve_path_fp(module, &split_path(path), ResolveMode::Other, false, None)
            .resolved
    }
}

impl SourceProvider for TestProject {
    fn stubs(&self, file: FileId) -> Option<Arc<ItemStubs>> {
        self.files.read().unwrap().get(file.0 as usize).map(|record| record.stubs.clone())
    }

    fn modification_stamp(&self, file: FileId) -> u64 {
        self.files.read().unwrap()[file.0 as usize].stamp
    }

    fn resolve_relative(&self, dir: &Path, relative: &str) -> Option<FileId> {
        let path = normalize(&dir.join(relative));
        self.by_path.read().unwrap().get(&path).map(|&index| FileId(index as u32))
    }

    fn directory(&self, file: FileId) -> Option<PathBuf> {
        self.files
            .read()
            .unwrap()
            .get(file.0 as usize)
            .and_then(|record| record.path.parent().map(Path::to_path_buf))
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.by_path.read().unwrap().contains_key(&normalize(path))
    }
}

impl CrateGraph for TestProject {
    fn crate_info(&self, krate: CrateId) -> Option<Arc<CrateInfo>> {
        self.crates.get(krate.0 as usize).cloned()
    }

    fn topo_sorted(&self) -> Vec<CrateId> {
        // fixture declaration order is dependency order by construction
        (0..self.crates.len() as u32).map(CrateId).collect()
    }

    fn reverse_dependencies(&self, krate: CrateId) -> Vec<CrateId> {
        self.crates
            .iter()
            .enumerate()
            .filter(|(_, info)| info.dependencies.iter().any(|dep| dep.crate_id == krate))
            .map(|(index, _)| CrateId(index as u32))
            .collect()
    }
}

impl MacroExpander for TestProject {
    fn expand(&self, def_body: &str, _call_body: &str) -> Option<Arc<ItemStubs>> {
        // declarative enough for name resolution: the definition body IS
        // the expansion, written in fixture syntax
        Some(Arc::new(parse_items(def_body)))
    }
}

/// Lexically normalize `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                result.pop();
            }
            other => result.push(other),
        }
    }
    result
}
