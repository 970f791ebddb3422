use std::fmt;
use std::sync::Arc;

use crate::base::{CrateId, Name};

/// Path to a module or to an item in a module: a crate plus an ordered
/// sequence of segment names. Immutable; `parent` and `append` are pure
/// derivations. The crate root is the empty-segment path.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ModPath {
    crate_id: CrateId,
    segments: Arc<[Name]>,
}

impl ModPath {
    pub fn root(crate_id: CrateId) -> ModPath {
        ModPath { crate_id, segments: Arc::from([]) }
    }

    pub fn new(crate_id: CrateId, segments: impl Into<Arc<[Name]>>) -> ModPath {
        ModPath { crate_id, segments: segments.into() }
    }

    pub fn crate_id(&self) -> CrateId {
        self.crate_id
    }

    pub fn segments(&self) -> &[Name] {
        &self.segments
    }

    pub fn is_crate_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment. `None` for the crate root.
    pub fn name(&self) -> Option<&Name> {
        self.segments.last()
    }

    /// Path with the last segment dropped. The root is its own parent.
    pub fn parent(&self) -> ModPath {
        match self.segments.split_last() {
            Some((_, init)) => ModPath { crate_id: self.crate_id, segments: Arc::from(init) },
            None => self.clone(),
        }
    }

    pub fn append(&self, segment: Name) -> ModPath {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(segment);
        ModPath { crate_id: self.crate_id, segments: segments.into() }
    }

    /// `mod1::mod2` is a sub-path of `mod1::mod2::mod3` (and of itself).
    pub fn is_sub_path_of(&self, other: &ModPath) -> bool {
        self.crate_id == other.crate_id
            && self.segments.len() <= other.segments.len()
            && self.segments.iter().zip(other.segments.iter()).all(|(a, b)| a == b)
    }
}

impl fmt::Debug for ModPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModPath({}: {})", self.crate_id, self)
    }
}

impl fmt::Display for ModPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "crate");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "::")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}
