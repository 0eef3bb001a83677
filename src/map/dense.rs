use std::{
    fmt,
    marker::PhantomData,
    ops::{Index, IndexMut},
};

use stable_vec::StableVec;

use crate::handle::{hsize, Handle};


/// A map from handles to values that stores the values in a contiguous
/// vector, using the handle index as vector index.
///
/// This is the arena type of this crate: all elements (polygons, triangles,
/// corners, edges) live in a `DenseMap` and are identified by the handle
/// returned from [`DenseMap::push`]. Handles are handed out with
/// sequentially increasing indices and elements are never removed, so the
/// map is always densely filled.
///
/// The memory requirement grows with the highest handle index, not with the
/// number of elements. That is the right trade-off for data associated with
/// (almost) every element of an arena, which is the only way this map is
/// used.
#[derive(Clone)]
pub struct DenseMap<H: Handle, T> {
    vec: StableVec<T>,
    _dummy: PhantomData<H>,
}

impl<H: Handle, T> DenseMap<H, T> {
    /// Creates an empty `DenseMap`.
    pub fn new() -> Self {
        Self {
            vec: StableVec::new(),
            _dummy: PhantomData,
        }
    }

    /// Creates an empty `DenseMap` with space for `cap` elements.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            vec: StableVec::with_capacity(cap),
            _dummy: PhantomData,
        }
    }

    /// Adds an element and returns the handle referring to it.
    pub fn push(&mut self, elem: T) -> H {
        H::from_usize(self.vec.push(elem))
    }

    /// Returns the handle the next call to `push` will return.
    pub fn next_push_handle(&self) -> H {
        H::from_usize(self.vec.next_push_index())
    }

    pub fn num_elements(&self) -> hsize {
        self.vec.num_elements() as hsize
    }

    pub fn is_empty(&self) -> bool {
        self.vec.num_elements() == 0
    }

    pub fn contains_handle(&self, handle: H) -> bool {
        self.vec.has_element_at(handle.to_usize())
    }

    pub fn get(&self, handle: H) -> Option<&T> {
        self.vec.get(handle.to_usize())
    }

    pub fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        self.vec.get_mut(handle.to_usize())
    }

    /// Iterates over all handles and references to their values, in order
    /// of increasing handle index.
    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> + '_ {
        self.vec.indices().map(move |i| (H::from_usize(i), &self.vec[i]))
    }

    /// Iterates over all handles in order of increasing index.
    pub fn handles(&self) -> impl Iterator<Item = H> + '_ {
        self.vec.indices().map(H::from_usize)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.vec.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.vec.values_mut()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.vec.reserve(additional);
    }
}

impl<H: Handle, T: Clone> DenseMap<H, T> {
    /// Creates a map with `count` elements, all equal to `elem`. The handles
    /// `0..count` are valid afterwards.
    pub fn from_elem(elem: T, count: usize) -> Self {
        let mut v = StableVec::with_capacity(count);
        for _ in 0..count {
            v.push(elem.clone());
        }

        Self {
            vec: v,
            _dummy: PhantomData,
        }
    }
}

impl<H: Handle, T> Default for DenseMap<H, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Handle, T> Index<H> for DenseMap<H, T> {
    type Output = T;
    fn index(&self, handle: H) -> &Self::Output {
        match self.get(handle) {
            None => panic!("no element found for handle '{:?}'", handle),
            Some(r) => r,
        }
    }
}

impl<H: Handle, T> IndexMut<H> for DenseMap<H, T> {
    fn index_mut(&mut self, handle: H) -> &mut Self::Output {
        match self.get_mut(handle) {
            None => panic!("no element found for handle '{:?}'", handle),
            Some(r) => r,
        }
    }
}

impl<H: Handle, T: fmt::Debug> fmt::Debug for DenseMap<H, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<H: Handle, T> Extend<T> for DenseMap<H, T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for elem in iter {
            self.push(elem);
        }
    }
}
