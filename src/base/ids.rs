use std::fmt;

/// Identifier of a crate in the host's crate graph.
///
/// Assigned by the crate graph provider and stable across rebuilds of a
/// single session. The engine only ever compares and hashes it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CrateId(pub u32);

impl fmt::Debug for CrateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CrateId({})", self.0)
    }
}

impl fmt::Display for CrateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a file, assigned by the source provider.
///
/// Opaque to the engine: it is a key into the provider and into
/// `CrateDefMap::file_infos`, nothing more.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub u32);

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

/// Structural hash of one file's declaration surface.
///
/// Two files with the same `DeclHash` declare the same items, imports and
/// macros (up to reordering of order-insensitive declarations), so neither
/// can affect name resolution differently from the other.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclHash(pub u64);

impl fmt::Debug for DeclHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeclHash({:016x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_compare_by_value() {
        assert_eq!(CrateId(3), CrateId(3));
        assert_ne!(FileId(0), FileId(1));
        assert!(CrateId(1) < CrateId(2));
    }

    #[test]
    fn test_decl_hash_debug_is_hex() {
        let hash = DeclHash(0xdead_beef);
        assert_eq!(format!("{hash:?}"), "DeclHash(00000000deadbeef)");
    }
}
