//! Conditional-compilation predicates.
//!
//! Stubs carry the raw `#[cfg(..)]` predicate rather than a pre-evaluated
//! flag: the same file (and therefore the same stub tree) can belong to
//! several crates with different feature sets, so enablement is decided per
//! crate at collection time.

use rustc_hash::FxHashSet;

use crate::base::Name;

/// A `#[cfg(..)]` predicate.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum CfgExpr {
    /// `#[cfg(unix)]`
    Atom(Name),
    /// `#[cfg(feature = "x")]`
    KeyValue { key: Name, value: Name },
    /// `#[cfg(all(..))]`
    All(Vec<CfgExpr>),
    /// `#[cfg(any(..))]`
    Any(Vec<CfgExpr>),
    /// `#[cfg(not(..))]`
    Not(Box<CfgExpr>),
    /// A predicate the host could not parse. Evaluates to false, like rustc
    /// treats malformed cfg input.
    Invalid,
}

impl CfgExpr {
    pub fn eval(&self, options: &CfgOptions) -> bool {
        match self {
            CfgExpr::Atom(name) => options.check_atom(name),
            CfgExpr::KeyValue { key, value } => options.check_key_value(key, value),
            CfgExpr::All(exprs) => exprs.iter().all(|e| e.eval(options)),
            CfgExpr::Any(exprs) => exprs.iter().any(|e| e.eval(options)),
            CfgExpr::Not(expr) => !expr.eval(options),
            CfgExpr::Invalid => false,
        }
    }
}

/// The cfg atoms and key-value pairs enabled for one crate.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct CfgOptions {
    atoms: FxHashSet<Name>,
    key_values: FxHashSet<(Name, Name)>,
}

impl CfgOptions {
    pub fn new() -> CfgOptions {
        CfgOptions::default()
    }

    pub fn insert_atom(&mut self, atom: Name) {
        self.atoms.insert(atom);
    }

    pub fn insert_key_value(&mut self, key: Name, value: Name) {
        self.key_values.insert((key, value));
    }

    pub fn check_atom(&self, atom: &Name) -> bool {
        self.atoms.contains(atom)
    }

    pub fn check_key_value(&self, key: &Name, value: &Name) -> bool {
        self.key_values.contains(&(key.clone(), value.clone()))
    }
}
