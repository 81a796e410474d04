//! Name pool — interning for identifier-like short strings and symbols
//!
//! Interned names are shared `Rc<str>` values: two `create_name` calls with
//! the same bytes hand back the same allocation. Pools form a parent chain;
//! a child first checks its own table, then delegates lookups upward, and a
//! child can be dropped independently of its parent.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::item::{Symbol, Target};

/// Symbols longer than this are allocated unshared rather than pooled.
pub const POOLABLE_SYMBOL_LIMIT: usize = 64;

#[derive(Debug, Default)]
pub struct NamePool {
    names: RefCell<HashMap<Box<str>, Rc<str>>>,
    symbols: RefCell<HashMap<Box<str>, Rc<Symbol>>>,
    parent: Option<Rc<NamePool>>,
}

impl NamePool {
    pub fn new() -> Rc<Self> {
        Rc::new(NamePool::default())
    }

    pub fn with_parent(parent: Rc<NamePool>) -> Rc<Self> {
        Rc::new(NamePool {
            names: RefCell::new(HashMap::new()),
            symbols: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    /// Existing interned name, or None. Never inserts.
    pub fn lookup(&self, name: &str) -> Option<Rc<str>> {
        if let Some(found) = self.names.borrow().get(name) {
            return Some(found.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    /// Idempotent insert: returns the existing entry if present anywhere in
    /// the chain, otherwise interns into this pool.
    pub fn create_name(&self, name: &str) -> Rc<str> {
        if let Some(found) = self.lookup(name) {
            return found;
        }
        let interned: Rc<str> = Rc::from(name);
        self.names
            .borrow_mut()
            .insert(Box::from(name), interned.clone());
        interned
    }

    /// Intern a symbol. Symbols past the poolable limit are allocated
    /// unshared; symbols with a namespace target are never pooled because
    /// the target participates in identity.
    pub fn create_symbol(&self, name: &str, target: Option<Rc<Target>>) -> Rc<Symbol> {
        if target.is_some() || name.len() > POOLABLE_SYMBOL_LIMIT {
            let interned = self.create_name(name);
            return Rc::new(match target {
                Some(t) => Symbol::with_target(interned, t),
                None => Symbol::new(interned),
            });
        }
        if let Some(found) = self.lookup_symbol(name) {
            return found;
        }
        let symbol = Rc::new(Symbol::new(self.create_name(name)));
        self.symbols
            .borrow_mut()
            .insert(Box::from(name), symbol.clone());
        symbol
    }

    fn lookup_symbol(&self, name: &str) -> Option<Rc<Symbol>> {
        if let Some(found) = self.symbols.borrow().get(name) {
            return Some(found.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup_symbol(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Number of names interned in this pool (excluding parents).
    pub fn count(&self) -> usize {
        self.names.borrow().len()
    }

    pub fn print_stats(&self) {
        tracing::debug!(
            names = self.count(),
            symbols = self.symbols.borrow().len(),
            has_parent = self.parent.is_some(),
            "name pool stats"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_name_is_idempotent() {
        let pool = NamePool::new();
        let a = pool.create_name("title");
        let b = pool.create_name("title");
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(pool.count(), 1);
    }

    #[test]
    fn lookup_never_inserts() {
        let pool = NamePool::new();
        assert!(pool.lookup("missing").is_none());
        assert_eq!(pool.count(), 0);
    }

    #[test]
    fn child_delegates_to_parent() {
        let parent = NamePool::new();
        let name = parent.create_name("shared");
        let child = NamePool::with_parent(parent);
        let found = child.create_name("shared");
        assert!(Rc::ptr_eq(&name, &found));
        assert_eq!(child.count(), 0);

        child.create_name("local");
        assert_eq!(child.count(), 1);
    }

    #[test]
    fn long_symbols_are_not_pooled() {
        let pool = NamePool::new();
        let long = "x".repeat(POOLABLE_SYMBOL_LIMIT + 1);
        let a = pool.create_symbol(&long, None);
        let b = pool.create_symbol(&long, None);
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(a, b);

        let short_a = pool.create_symbol("nbsp", None);
        let short_b = pool.create_symbol("nbsp", None);
        assert!(Rc::ptr_eq(&short_a, &short_b));
    }
}
