use indexmap::IndexSet;
use smartstring::alias::String;

/// Insertion-ordered name table.
///
/// Indices are assigned densely in first-insertion order and never change, so
/// they double as ids for productions, token names and lexical states.
#[derive(Default, Debug, Clone)]
pub struct Symtab {
    set: IndexSet<String>,
}

impl Symtab {
    pub fn new() -> Self {
        Self {
            set: IndexSet::new(),
        }
    }

    /// Returns the index of `sym`, inserting it if needed. The flag is `true`
    /// when the name was not present before.
    pub fn add(&mut self, sym: &str) -> (usize, bool) {
        self.set.insert_full(String::from(sym))
    }

    pub fn idx(&self, sym: &str) -> Option<usize> {
        self.set.get_index_of(sym)
    }

    pub fn sym(&self, idx: usize) -> Option<&str> {
        self.set.get_index(idx).map(|x| x.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.set.iter().map(|x| x.as_str())
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}
