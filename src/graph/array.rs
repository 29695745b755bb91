//! Element-indexed arrays that auto-resize with the graph.
//!
//! Avoids the intrusive back-pointer list the original uses by keeping an
//! owned registry instead: the graph holds an [`ArrayRegistry`] of weak,
//! type-erased handles to every live array; on every structural mutation the
//! graph calls `resize_to` on each surviving handle. Cloning an array
//! re-registers the clone with the graph.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use super::element_id::ElementId;

trait ResizableArray {
    fn resize_to(&self, new_len: usize);
}

impl<T: Clone + Default> ResizableArray for RefCell<Vec<T>> {
    fn resize_to(&self, new_len: usize) {
        self.borrow_mut().resize(new_len, T::default());
    }
}

/// Owned by a graph; tracks every array attached to it so they can be
/// resized in lockstep with node/edge/component growth.
#[derive(Default)]
pub struct ArrayRegistry {
    arrays: RefCell<Vec<Weak<dyn ResizableArray>>>,
}

impl ArrayRegistry {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    fn register(&self, handle: Weak<dyn ResizableArray>) {
        self.arrays.borrow_mut().push(handle);
    }

    /// Resize every still-live attached array to `new_len`, dropping
    /// references to arrays that have since been dropped.
    pub fn resize_all(&self, new_len: usize) {
        let mut arrays = self.arrays.borrow_mut();
        arrays.retain(|handle| handle.upgrade().is_some());
        for handle in arrays.iter() {
            if let Some(array) = handle.upgrade() {
                array.resize_to(new_len);
            }
        }
    }
}

/// A dense array indexed by `E`, automatically kept in sync with the owning
/// graph's element count.
pub struct ElementIdArray<E: ElementId, T: Clone + Default + 'static> {
    data: Rc<RefCell<Vec<T>>>,
    registry: Weak<ArrayRegistry>,
    _marker: PhantomData<E>,
}

impl<E: ElementId, T: Clone + Default + 'static> ElementIdArray<E, T> {
    pub fn new(registry: &Rc<ArrayRegistry>, len: usize) -> Self {
        let data = Rc::new(RefCell::new(vec![T::default(); len]));
        let dynable: Rc<dyn ResizableArray> = data.clone();
        registry.register(Rc::downgrade(&dynable));

        Self { data, registry: Rc::downgrade(registry), _marker: PhantomData }
    }

    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: E) -> T {
        self.data.borrow()[id.index()].clone()
    }

    pub fn set(&self, id: E, value: T) {
        self.data.borrow_mut()[id.index()] = value;
    }

    pub fn with_mut<R>(&self, id: E, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.data.borrow_mut()[id.index()])
    }

    pub fn fill(&self, value: T) {
        let mut data = self.data.borrow_mut();
        let len = data.len();
        *data = vec![value; len];
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.data.borrow().clone()
    }

    /// A cheap, *aliased* handle to the same backing storage — unlike
    /// [`Clone`] (which deep-copies and re-registers the copy with the
    /// graph), this shares the underlying `Rc` so later writes remain
    /// visible. Used internally to capture live storage inside attribute
    /// accessor closures.
    pub(crate) fn share(&self) -> Self {
        Self { data: self.data.clone(), registry: self.registry.clone(), _marker: PhantomData }
    }
}

impl<E: ElementId, T: Clone + Default + 'static> Clone for ElementIdArray<E, T> {
    fn clone(&self) -> Self {
        let data = Rc::new(RefCell::new(self.data.borrow().clone()));

        if let Some(registry) = self.registry.upgrade() {
            let dynable: Rc<dyn ResizableArray> = data.clone();
            registry.register(Rc::downgrade(&dynable));
        }

        Self { data, registry: self.registry.clone(), _marker: PhantomData }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ElementId, NodeId};

    #[test]
    fn resizes_with_registry() {
        let registry = ArrayRegistry::new();
        let array: ElementIdArray<NodeId, i32> = ElementIdArray::new(&registry, 2);
        assert_eq!(array.len(), 2);

        registry.resize_all(5);
        assert_eq!(array.len(), 5);
        assert_eq!(array.get(NodeId::new(4)), 0);
    }

    #[test]
    fn clone_is_independent_but_tracked() {
        let registry = ArrayRegistry::new();
        let array: ElementIdArray<NodeId, i32> = ElementIdArray::new(&registry, 2);
        array.set(NodeId::new(0), 42);

        let cloned = array.clone();
        array.set(NodeId::new(0), 7);

        assert_eq!(cloned.get(NodeId::new(0)), 42, "clone must not alias the original");

        registry.resize_all(10);
        assert_eq!(cloned.len(), 10, "clone must still track the same registry");
    }
}
