//! Parsed formula cache
//!
//! Keyed by the exact formula text. When the cache is full it is wiped as a
//! whole before the next insert; there is no per-entry eviction.

use crate::expr::Expr;
use ahash::AHashMap;
use std::rc::Rc;

#[derive(Debug)]
pub struct FormulaCache {
    entries: AHashMap<String, Rc<Expr>>,
    capacity: usize,
}

impl FormulaCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: AHashMap::new(),
            capacity,
        }
    }

    pub fn get(&self, text: &str) -> Option<Rc<Expr>> {
        self.entries.get(text).cloned()
    }

    /// Store a parsed tree, flushing everything first if the cache is full
    pub fn insert(&mut self, text: String, expr: Rc<Expr>) {
        if self.entries.len() >= self.capacity {
            log::debug!("formula cache full ({} entries), flushing", self.entries.len());
            self.entries.clear();
        }
        self.entries.insert(text, expr);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FormulaValue;

    fn literal(n: f64) -> Rc<Expr> {
        Rc::new(Expr::Literal(FormulaValue::Number(n)))
    }

    #[test]
    fn test_get_and_insert() {
        let mut cache = FormulaCache::new(10);
        assert!(cache.get("=1").is_none());
        cache.insert("=1".into(), literal(1.0));
        assert!(matches!(
            cache.get("=1").as_deref(),
            Some(Expr::Literal(FormulaValue::Number(n))) if *n == 1.0
        ));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_full_cache_is_flushed() {
        let mut cache = FormulaCache::new(2);
        cache.insert("=1".into(), literal(1.0));
        cache.insert("=2".into(), literal(2.0));
        cache.insert("=3".into(), literal(3.0));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("=1").is_none());
        assert!(cache.get("=3").is_some());

        cache.clear();
        assert!(cache.is_empty());
    }
}
