//! Single-owner registry of queryable entities.
//!
//! An ordered singly linked chain of nodes, each owning its successor; the
//! head is the most recently pushed entity. Lookup is a linear scan from the
//! head, so if an identifier were ever duplicated the most recent entity wins.
//! Nothing in the dispatch protocol removes entries, which is what keeps
//! identifier assignment dense and collision-free.
//!
//! Identifiers come from the registry's own monotone counter
//! ([`HandleRegistry::allocate_id`]) rather than from its current length, so
//! they would stay unique even if removal were introduced later.

use crate::entity::EntityId;

/// Anything the registry can index: carries a stable integer identifier.
pub trait Identified {
    fn id(&self) -> EntityId;
}

struct Node<T> {
    inner: T,
    next: Option<Box<Node<T>>>,
}

/// Owning linked container mapping identifiers to entities.
pub struct HandleRegistry<T> {
    head: Option<Box<Node<T>>>,
    next_id: EntityId,
    len: usize,
}

impl<T: Identified> HandleRegistry<T> {
    pub fn new() -> Self {
        Self {
            head: None,
            next_id: 0,
            len: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Hand out the next identifier. Monotone, never reused.
    pub fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Prepend an entity; O(1). Returns its identifier.
    ///
    /// If the entity carries an externally assigned identifier (tables are
    /// created with the id named by the first ingest message), the counter is
    /// bumped past it so later allocations cannot collide.
    pub fn push(&mut self, entity: T) -> EntityId {
        let id = entity.id();
        self.next_id = self.next_id.max(id + 1);
        self.head = Some(Box::new(Node {
            inner: entity,
            next: self.head.take(),
        }));
        self.len += 1;
        id
    }

    /// Remove and return the head entity.
    pub fn pop(&mut self) -> Option<T> {
        self.head.take().map(|node| {
            self.head = node.next;
            self.len -= 1;
            node.inner
        })
    }

    /// Linear scan from the head; first match wins.
    pub fn find(&self, id: EntityId) -> Option<&T> {
        self.iter().find(|entity| entity.id() == id)
    }

    pub fn find_mut(&mut self, id: EntityId) -> Option<&mut T> {
        let mut ptr = self.head.as_deref_mut();
        while let Some(node) = ptr {
            if node.inner.id() == id {
                return Some(&mut node.inner);
            }
            ptr = node.next.as_deref_mut();
        }
        None
    }

    /// Splice `entity` in as the immediate successor of the node matching
    /// `id`. Silent no-op if `id` is absent: callers are expected to have
    /// validated existence with [`HandleRegistry::find`] first.
    pub fn insert_at(&mut self, id: EntityId, entity: T) {
        let mut ptr = self.head.as_deref_mut();
        while let Some(node) = ptr {
            if node.inner.id() == id {
                self.next_id = self.next_id.max(entity.id() + 1);
                node.next = Some(Box::new(Node {
                    inner: entity,
                    next: node.next.take(),
                }));
                self.len += 1;
                return;
            }
            ptr = node.next.as_deref_mut();
        }
    }

    /// Replace the payload of the node matching `id` in place, keeping its
    /// position and links. Silent no-op if `id` is absent.
    pub fn replace_at(&mut self, id: EntityId, entity: T) {
        if let Some(slot) = self.find_mut(id) {
            *slot = entity;
        }
    }

    /// Iterate from the head (most recently pushed first).
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            ptr: self.head.as_deref(),
        }
    }
}

impl<T: Identified> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for HandleRegistry<T> {
    // The derived recursive drop can blow the stack on long chains.
    fn drop(&mut self) {
        let mut ptr = self.head.take();
        while let Some(mut node) = ptr {
            ptr = node.next.take();
        }
    }
}

pub struct Iter<'a, T> {
    ptr: Option<&'a Node<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let node = self.ptr?;
        self.ptr = node.next.as_deref();
        Some(&node.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq, Clone)]
    struct Entry {
        id: EntityId,
        label: &'static str,
    }

    impl Identified for Entry {
        fn id(&self) -> EntityId {
            self.id
        }
    }

    fn entry(id: EntityId, label: &'static str) -> Entry {
        Entry { id, label }
    }

    #[test]
    fn push_then_find_returns_the_pushed_entity() {
        let mut registry = HandleRegistry::new();
        registry.push(entry(0, "a"));
        registry.push(entry(1, "b"));
        registry.push(entry(2, "c"));

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.find(1).unwrap().label, "b");
        assert!(registry.find(9).is_none());
    }

    #[test]
    fn head_is_most_recent_and_pop_removes_it() {
        let mut registry = HandleRegistry::new();
        registry.push(entry(0, "a"));
        registry.push(entry(1, "b"));

        assert_eq!(registry.pop().unwrap().label, "b");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.pop().unwrap().label, "a");
        assert!(registry.pop().is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn insert_at_splices_after_the_match_without_breaking_the_chain() {
        let mut registry = HandleRegistry::new();
        registry.push(entry(0, "a"));
        registry.push(entry(1, "b"));
        registry.push(entry(2, "c"));

        registry.insert_at(1, entry(3, "x"));

        // Iteration order: head c, b, then the spliced x, then a.
        let order: Vec<_> = registry.iter().map(|e| e.label).collect();
        assert_eq!(order, vec!["c", "b", "x", "a"]);
        assert_eq!(registry.find(3).unwrap().label, "x");
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn insert_at_on_missing_id_is_a_silent_no_op() {
        let mut registry = HandleRegistry::new();
        registry.push(entry(0, "a"));
        registry.insert_at(42, entry(1, "x"));
        assert_eq!(registry.len(), 1);
        assert!(registry.find(1).is_none());
    }

    #[test]
    fn replace_at_keeps_position_and_swaps_payload() {
        let mut registry = HandleRegistry::new();
        registry.push(entry(0, "a"));
        registry.push(entry(1, "b"));
        registry.push(entry(2, "c"));

        registry.replace_at(1, entry(1, "swapped"));

        let order: Vec<_> = registry.iter().map(|e| e.label).collect();
        assert_eq!(order, vec!["c", "swapped", "a"]);
        assert_eq!(registry.len(), 3);

        // Missing id: silent no-op.
        registry.replace_at(42, entry(42, "ghost"));
        assert_eq!(registry.len(), 3);
        assert!(registry.find(42).is_none());
    }

    #[test]
    fn allocated_ids_are_monotone_and_skip_external_ids() {
        let mut registry = HandleRegistry::new();
        assert_eq!(registry.allocate_id(), 0);
        registry.push(entry(0, "a"));
        // An externally assigned id bumps the counter past itself.
        registry.push(entry(5, "b"));
        assert_eq!(registry.allocate_id(), 6);
        assert_eq!(registry.allocate_id(), 7);
    }

    #[test]
    fn id_tracks_entity_count_while_nothing_is_removed() {
        let mut registry = HandleRegistry::new();
        for expected in 0..10u64 {
            let id = registry.allocate_id();
            assert_eq!(id, expected);
            assert_eq!(id, registry.len() as u64);
            registry.push(entry(id, "e"));
        }
    }

    #[test]
    fn drop_handles_long_chains() {
        let mut registry = HandleRegistry::new();
        for i in 0..200_000u64 {
            registry.push(entry(i, "n"));
        }
        drop(registry);
    }
}
