use std::fmt;

/// Lexicographic address of a macro def, macro call or module.
///
/// For a call `foo1!()` inside `mod1::mod2` the index is
/// `[crate_ordinal, index_of_mod1, index_of_mod2, local_index_of_foo1]`,
/// extended by one element per further nesting level (module or macro
/// expansion site). The crate ordinal is chosen greater than every
/// dependency's, so definitions imported from dependencies always sort
/// before local code.
///
/// The total order answers "is this macro definition lexically before that
/// call", which is what legacy (`macro_rules!`) scoping needs.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacroIndex {
    indices: Vec<u32>,
}

impl MacroIndex {
    pub fn new(indices: Vec<u32>) -> MacroIndex {
        MacroIndex { indices }
    }

    pub fn root(crate_ordinal: u32) -> MacroIndex {
        MacroIndex { indices: vec![crate_ordinal] }
    }

    pub fn append(&self, index: u32) -> MacroIndex {
        let mut indices = self.indices.clone();
        indices.push(index);
        MacroIndex { indices }
    }

    /// Whether legacy macros visible at `call` should flow into module
    /// `module`: true iff neither index prefixes the other and `call` sorts
    /// before `module` at the first diverging position. A prefix relation
    /// means one contains the other, where textual-order propagation does
    /// not apply.
    pub fn should_propagate(call: &MacroIndex, module: &MacroIndex) -> bool {
        let mismatch = call
            .indices
            .iter()
            .zip(module.indices.iter())
            .position(|(a, b)| a != b);
        match mismatch {
            Some(position) => call.indices[position] < module.indices[position],
            None => false,
        }
    }
}

impl fmt::Debug for MacroIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacroIndex{:?}", self.indices)
    }
}
