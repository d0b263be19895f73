//! Typed indices for tfold arenas.
//!
//! Graph nodes, symbolic dimensions and other arena-allocated entities are
//! addressed by small `u32` newtypes rather than raw `usize`s, so an index
//! into one arena cannot be used to address another.
//!
//! ```ignore
//! tfold_index::define_index! {
//!     /// Index into the node arena.
//!     pub struct NodeId;
//! }
//!
//! let mut nodes: IndexVec<NodeId, &str> = IndexVec::new();
//! let id = nodes.push("add");
//! assert_eq!(nodes[id], "add");
//! ```

#![warn(missing_docs)]

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// A typed index into an arena.
pub trait Idx: Copy + Eq + std::hash::Hash + fmt::Debug + 'static {
    /// Creates an index from a raw `usize`.
    fn new(idx: usize) -> Self;

    /// Returns the raw `usize` value.
    fn index(self) -> usize;
}

/// Defines one or more `u32`-backed index newtypes implementing [`Idx`].
#[macro_export]
macro_rules! define_index {
    ($($(#[$attr:meta])* $vis:vis struct $name:ident;)*) => {
        $(
            $(#[$attr])*
            #[derive(
                Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
                ::serde::Serialize, ::serde::Deserialize,
            )]
            $vis struct $name(u32);

            impl $crate::Idx for $name {
                #[inline]
                fn new(idx: usize) -> Self {
                    assert!(idx <= u32::MAX as usize, "index overflow");
                    Self(idx as u32)
                }

                #[inline]
                fn index(self) -> usize {
                    self.0 as usize
                }
            }

            impl ::std::fmt::Debug for $name {
                fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                    write!(f, "{}({})", stringify!($name), self.0)
                }
            }
        )*
    };
}

/// A vector addressed by a typed index.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexVec<I: Idx, T> {
    raw: Vec<T>,
    #[serde(skip)]
    _marker: PhantomData<fn(&I)>,
}

impl<I: Idx, T> IndexVec<I, T> {
    /// Creates an empty vector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            raw: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Creates an empty vector with room for `capacity` elements.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            raw: Vec::with_capacity(capacity),
            _marker: PhantomData,
        }
    }

    /// Appends an element and returns its index.
    pub fn push(&mut self, value: T) -> I {
        let idx = I::new(self.raw.len());
        self.raw.push(value);
        idx
    }

    /// Returns the index the next pushed element will receive.
    #[must_use]
    pub fn next_index(&self) -> I {
        I::new(self.raw.len())
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns true if the vector is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Returns the element at `idx`, if in bounds.
    #[must_use]
    pub fn get(&self, idx: I) -> Option<&T> {
        self.raw.get(idx.index())
    }

    /// Drops every element at or past `len`.
    pub fn truncate(&mut self, len: usize) {
        self.raw.truncate(len);
    }

    /// Iterates over the elements.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.raw.iter()
    }

    /// Iterates over `(index, element)` pairs.
    pub fn iter_enumerated(&self) -> impl DoubleEndedIterator<Item = (I, &T)> + '_ {
        self.raw.iter().enumerate().map(|(i, t)| (I::new(i), t))
    }

    /// Iterates over all valid indices.
    pub fn indices(&self) -> impl DoubleEndedIterator<Item = I> + 'static {
        (0..self.raw.len()).map(I::new)
    }

    /// Returns the underlying slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.raw
    }
}

impl<I: Idx, T> Default for IndexVec<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Idx, T: fmt::Debug> fmt::Debug for IndexVec<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.raw.iter()).finish()
    }
}

impl<I: Idx, T> Index<I> for IndexVec<I, T> {
    type Output = T;

    #[inline]
    fn index(&self, idx: I) -> &T {
        &self.raw[idx.index()]
    }
}

impl<I: Idx, T> IndexMut<I> for IndexVec<I, T> {
    #[inline]
    fn index_mut(&mut self, idx: I) -> &mut T {
        &mut self.raw[idx.index()]
    }
}

impl<I: Idx, T> FromIterator<T> for IndexVec<I, T> {
    fn from_iter<It: IntoIterator<Item = T>>(iter: It) -> Self {
        Self {
            raw: iter.into_iter().collect(),
            _marker: PhantomData,
        }
    }
}

impl<'a, I: Idx, T> IntoIterator for &'a IndexVec<I, T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.raw.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    define_index! {
        /// Test index.
        pub struct TestId;
    }

    #[test]
    fn test_push_and_index() {
        let mut v: IndexVec<TestId, &str> = IndexVec::new();
        let a = v.push("a");
        let b = v.push("b");
        assert_eq!(v[a], "a");
        assert_eq!(v[b], "b");
        assert_eq!(b.index(), 1);
        assert_eq!(v.next_index(), TestId::new(2));
    }

    #[test]
    fn test_truncate_drops_tail() {
        let mut v: IndexVec<TestId, u8> = (0..5).collect();
        v.truncate(2);
        assert_eq!(v.as_slice(), &[0, 1]);
        assert!(v.get(TestId::new(3)).is_none());
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(format!("{:?}", TestId::new(7)), "TestId(7)");
    }
}
