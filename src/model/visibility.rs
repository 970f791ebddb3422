use std::fmt;

use crate::model::ModPath;

/// Resolved visibility of an item or import.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    /// Visible from the named module and everything below it. Private items
    /// are `Restricted` to their own module.
    Restricted(ModPath),
    /// An import of an item the importing module cannot see. Kept instead of
    /// dropped so consumers can still say "this exists but is private".
    Invisible,
    /// Disabled by a false `#[cfg(..)]`. Kept for the same diagnostic reason.
    CfgDisabled,
}

impl Visibility {
    pub fn is_visible_from_other_crate(&self) -> bool {
        matches!(self, Visibility::Public)
    }

    pub fn is_visible_from_mod(&self, module: &ModPath) -> bool {
        match self {
            Visibility::Public => true,
            Visibility::Restricted(in_mod) => in_mod.is_sub_path_of(module),
            Visibility::Invisible | Visibility::CfgDisabled => false,
        }
    }

    /// Strict partial order: Public > Restricted > Invisible > CfgDisabled,
    /// and between two restrictions, the proper ancestor (within one crate)
    /// is the more permissive one.
    pub fn is_strictly_more_permissive(&self, other: &Visibility) -> bool {
        match (self, other) {
            (Visibility::Restricted(this), Visibility::Restricted(that)) => {
                this.crate_id() == that.crate_id() && this != that && this.is_sub_path_of(that)
            }
            (Visibility::Public, _) => !matches!(other, Visibility::Public),
            (Visibility::Restricted(_), _) => {
                matches!(other, Visibility::Invisible | Visibility::CfgDisabled)
            }
            (Visibility::Invisible, _) => matches!(other, Visibility::CfgDisabled),
            (Visibility::CfgDisabled, _) => false,
        }
    }

    pub fn is_invisible(&self) -> bool {
        matches!(self, Visibility::Invisible | Visibility::CfgDisabled)
    }

    /// Coarse tier used when merging candidate sets: candidates of different
    /// tiers never coexist, the wider tier wins outright.
    pub(crate) fn tier(&self) -> u8 {
        match self {
            Visibility::Public => 3,
            Visibility::Restricted(_) => 2,
            Visibility::Invisible => 1,
            Visibility::CfgDisabled => 0,
        }
    }
}

impl fmt::Debug for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "Public"),
            Visibility::Restricted(path) => write!(f, "Restricted(in {path})"),
            Visibility::Invisible => write!(f, "Invisible"),
            Visibility::CfgDisabled => write!(f, "CfgDisabled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::base::{CrateId, Name};

    fn restricted(segments: &[&str]) -> Visibility {
        Visibility::Restricted(ModPath::new(
            CrateId(0),
            segments.iter().map(|s| Name::from(*s)).collect::<Vec<_>>(),
        ))
    }

    #[test]
    fn test_visible_from_mod() {
        let in_a = restricted(&["a"]);
        let mod_a_b = ModPath::new(CrateId(0), vec![Name::from("a"), Name::from("b")]);
        let mod_c = ModPath::new(CrateId(0), vec![Name::from("c")]);
        assert!(Visibility::Public.is_visible_from_mod(&mod_c));
        assert!(in_a.is_visible_from_mod(&mod_a_b));
        assert!(!in_a.is_visible_from_mod(&mod_c));
        assert!(!Visibility::Invisible.is_visible_from_mod(&mod_c));
        assert!(!Visibility::CfgDisabled.is_visible_from_mod(&mod_c));
    }

    #[rstest]
    #[case(Visibility::Public, Visibility::Invisible, true)]
    #[case(Visibility::Public, Visibility::CfgDisabled, true)]
    #[case(Visibility::Public, Visibility::Public, false)]
    #[case(Visibility::Invisible, Visibility::CfgDisabled, true)]
    #[case(Visibility::CfgDisabled, Visibility::Public, false)]
    #[case(Visibility::Invisible, Visibility::Invisible, false)]
    fn test_permissiveness_order(
        #[case] left: Visibility,
        #[case] right: Visibility,
        #[case] expected: bool,
    ) {
        assert_eq!(left.is_strictly_more_permissive(&right), expected);
    }

    #[test]
    fn test_restricted_permissiveness_is_ancestry() {
        let in_root = restricted(&[]);
        let in_a = restricted(&["a"]);
        assert!(in_root.is_strictly_more_permissive(&in_a));
        assert!(!in_a.is_strictly_more_permissive(&in_root));
        // irreflexive
        assert!(!in_a.is_strictly_more_permissive(&in_a));
        // public beats any restriction
        assert!(Visibility::Public.is_strictly_more_permissive(&in_root));
        assert!(in_a.is_strictly_more_permissive(&Visibility::Invisible));
    }

    #[test]
    fn test_order_has_no_cycles() {
        let all = [
            Visibility::Public,
            restricted(&[]),
            restricted(&["a"]),
            Visibility::Invisible,
            Visibility::CfgDisabled,
        ];
        for a in &all {
            for b in &all {
                if a.is_strictly_more_permissive(b) {
                    assert!(!b.is_strictly_more_permissive(a), "{a:?} <> {b:?}");
                }
            }
        }
    }
}
