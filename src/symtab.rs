// LLL, a little Lisp with an explicit-control evaluator.
// Copyright (C) 2024 Matthew Rothlisberger

// LLL is licensed under the terms of the GNU Affero General Public
// License, version 3. See the top level LICENSE file for the license
// text.

// Find full copyright information in the top level COPYRIGHT file.

// <>

// src/symtab.rs

// A table to associate symbol names with canonical symbol instances.

// <>

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use rustc_hash::FxHashMap;

/// Canonical handle for an interned name
///
/// Two symbols are equal only when they are the same interned
/// instance; the text is never compared after interning.
#[derive(Clone)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Keywords are interned alongside symbols and keep their colon
    pub fn is_keyword(&self) -> bool {
        self.0.starts_with(':')
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const u8 as usize
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({}@{:#x})", self.0, self.addr())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Append-only mapping from text to its one canonical symbol
#[derive(Default)]
pub struct SymbolTable {
    by_name: FxHashMap<Rc<str>, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(approx_cap: usize) -> Self {
        Self {
            by_name: FxHashMap::with_capacity_and_hasher(approx_cap, Default::default()),
        }
    }

    /// Returns the existing symbol for `name`, or registers a new one
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(sym) = self.by_name.get(name) {
            return sym.clone();
        }

        let text: Rc<str> = Rc::from(name);
        let sym = Symbol(Rc::clone(&text));
        self.by_name.insert(text, sym.clone());
        sym
    }

    /// Looks up a name without interning it
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.by_name.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_test() {
        let mut tab = SymbolTable::new();

        let sym = tab.intern("testsym");

        assert!(tab.lookup("nothere").is_none());
        assert_eq!(tab.lookup("testsym").unwrap(), sym);
        assert_eq!(sym.name(), "testsym");
    }

    #[test]
    fn same_text_same_instance() {
        let mut tab = SymbolTable::new();

        // built from distinct buffers on purpose
        let first = String::from("lambda");
        let second: String = ['l', 'a', 'm', 'b', 'd', 'a'].iter().collect();

        let a = tab.intern(&first);
        let b = tab.intern(&second);
        assert_eq!(a, b);
        assert_eq!(tab.len(), 1);

        let c = tab.intern("lambdas");
        assert_ne!(a, c);
    }

    #[test]
    fn equality_is_identity() {
        let mut one = SymbolTable::new();
        let mut two = SymbolTable::new();

        // equal text interned in different tables is not the same symbol
        assert_ne!(one.intern("x"), two.intern("x"));
    }

    #[test]
    fn manysym() {
        let mut tab = SymbolTable::with_capacity(16);

        // generates symbols a00 - z99
        let mut syms = vec![];
        for i in 0..2600u32 {
            let name = format!(
                "{}{}{}",
                char::from((i / 100 + 97) as u8),
                (i % 100) / 10,
                i % 10
            );
            syms.push(tab.intern(&name));
        }

        assert_eq!(tab.len(), 2600);
        assert_eq!(tab.intern("m13"), syms[1213]);
        assert_eq!(tab.lookup("g92").unwrap(), syms[692]);
    }

    #[test]
    fn keywords_share_the_table() {
        let mut tab = SymbolTable::new();

        let key = tab.intern(":true");
        let sym = tab.intern("true");

        assert!(key.is_keyword());
        assert!(!sym.is_keyword());
        assert_ne!(key, sym);
        assert_eq!(key.to_string(), ":true");
    }
}
