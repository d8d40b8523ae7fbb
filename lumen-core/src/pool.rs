// Copyright (c) 2019-present Dmitry Stepanov and Fyrox Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! A generational arena - a contiguous growable array type which allows removing
//! from the middle without shifting and therefore without invalidating other indices.
//!
//! Pool is a contiguous block of memory with fixed-size entries, each entry can be
//! either vacant or occupied. When you put an object into the pool you get a handle to
//! that object. You can use that handle later on to borrow a reference to an object.
//! A handle can point to some object or be invalid, this may look similar to raw
//! pointers, but there is two major differences:
//!
//! 1) We can check if a handle is valid before accessing the object it might point to.
//! 2) We can ensure the handle we're using is still valid for the object it points to
//!    to make sure it hasn't been replaced with a different object on the same position.
//!    Each handle stores a special field called generation which is shared between the
//!    handle and the entry in the pool. If you put an object into the pool the generation
//!    of its entry is incremented, so an old handle will not match the new object.

use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
    marker::PhantomData,
    ops::{Index, IndexMut},
};

const INVALID_GENERATION: u32 = 0;

/// Handle is some sort of non-owning reference to content in a pool. It stores
/// index of object and additional information that allows to ensure that handle
/// is still valid (points to the same object as when handle was created).
#[derive(Serialize, Deserialize)]
pub struct Handle<T> {
    /// Index of object in pool.
    index: u32,
    /// Generation number, if it is same as generation of pool record at
    /// index of handle then this is valid handle.
    generation: u32,
    #[serde(skip)]
    type_marker: PhantomData<fn() -> T>,
}

impl<T> Copy for Handle<T> {}

impl<T> Clone for Handle<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Handle<T> {
    #[inline]
    fn eq(&self, other: &Handle<T>) -> bool {
        self.generation == other.generation && self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.index
            .cmp(&other.index)
            .then(self.generation.cmp(&other.generation))
    }
}

impl<T> Hash for Handle<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> Default for Handle<T> {
    #[inline]
    fn default() -> Self {
        Self::NONE
    }
}

impl<T> Debug for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[Idx: {}; Gen: {}]", self.index, self.generation)
    }
}

impl<T> Display for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.index, self.generation)
    }
}

impl<T> Handle<T> {
    /// A handle that does not point to anything.
    pub const NONE: Handle<T> = Handle {
        index: 0,
        generation: INVALID_GENERATION,
        type_marker: PhantomData,
    };

    #[inline(always)]
    pub fn is_none(self) -> bool {
        self.index == 0 && self.generation == INVALID_GENERATION
    }

    #[inline(always)]
    pub fn is_some(self) -> bool {
        !self.is_none()
    }

    #[inline(always)]
    pub fn index(self) -> u32 {
        self.index
    }

    #[inline(always)]
    pub fn generation(self) -> u32 {
        self.generation
    }

    #[inline(always)]
    pub fn new(index: u32, generation: u32) -> Self {
        Handle {
            index,
            generation,
            type_marker: PhantomData,
        }
    }
}

/// A single slot of a [`Pool`].
#[derive(Debug)]
pub struct PoolRecord<T> {
    generation: u32,
    payload: Option<T>,
}

impl<T> PoolRecord<T> {
    /// Returns a reference to the stored object, if any.
    #[inline]
    pub fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    /// Current generation of the slot.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Pool allows to create as many objects as you want in contiguous memory
/// block. It allows to create and delete objects much faster than if they'll
/// be allocated on heap. Also since objects stored in contiguous memory block
/// they can be effectively accessed because such memory layout is cache-friendly.
#[derive(Debug)]
pub struct Pool<T> {
    records: Vec<PoolRecord<T>>,
    free_stack: Vec<u32>,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Pool<T> {
    #[inline]
    pub fn new() -> Self {
        Pool {
            records: Vec::new(),
            free_stack: Vec::new(),
        }
    }

    /// Moves the object into the pool and returns a handle to it.
    #[must_use]
    pub fn spawn(&mut self, payload: T) -> Handle<T> {
        if let Some(free_index) = self.free_stack.pop() {
            let record = &mut self.records[free_index as usize];
            record.generation += 1;
            record.payload = Some(payload);
            Handle::new(free_index, record.generation)
        } else {
            // Generation starts from 1, zero is reserved for invalid handles.
            self.records.push(PoolRecord {
                generation: 1,
                payload: Some(payload),
            });
            Handle::new(self.records.len() as u32 - 1, 1)
        }
    }

    /// Removes the object pointed by the handle and returns it. Returns `None` if the handle is
    /// invalid.
    pub fn free(&mut self, handle: Handle<T>) -> Option<T> {
        let record = self.records.get_mut(handle.index as usize)?;
        if record.generation != handle.generation || record.payload.is_none() {
            return None;
        }
        self.free_stack.push(handle.index);
        record.payload.take()
    }

    #[inline]
    pub fn try_borrow(&self, handle: Handle<T>) -> Option<&T> {
        self.records
            .get(handle.index as usize)
            .filter(|r| r.generation == handle.generation)
            .and_then(|r| r.payload.as_ref())
    }

    #[inline]
    pub fn try_borrow_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.records
            .get_mut(handle.index as usize)
            .filter(|r| r.generation == handle.generation)
            .and_then(|r| r.payload.as_mut())
    }

    #[inline]
    pub fn is_valid_handle(&self, handle: Handle<T>) -> bool {
        self.try_borrow(handle).is_some()
    }

    /// Returns amount of objects in the pool.
    #[inline]
    pub fn alive_count(&self) -> usize {
        self.records.iter().filter(|r| r.payload.is_some()).count()
    }

    /// Raw access to the pool slots. Useful for parallel iteration, use [`Self::handle_of`] to
    /// create a handle for a slot.
    #[inline]
    pub fn records(&self) -> &[PoolRecord<T>] {
        &self.records
    }

    /// Creates a handle for the slot at the given index. Returns [`Handle::NONE`] if the slot is
    /// vacant.
    #[inline]
    pub fn handle_of(&self, index: usize) -> Handle<T> {
        match self.records.get(index) {
            Some(record) if record.payload.is_some() => {
                Handle::new(index as u32, record.generation)
            }
            _ => Handle::NONE,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.iter().filter_map(|r| r.payload.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.records.iter_mut().filter_map(|r| r.payload.as_mut())
    }

    pub fn pair_iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.records.iter().enumerate().filter_map(|(i, r)| {
            r.payload
                .as_ref()
                .map(|p| (Handle::new(i as u32, r.generation), p))
        })
    }

    pub fn pair_iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.records.iter_mut().enumerate().filter_map(|(i, r)| {
            let generation = r.generation;
            r.payload
                .as_mut()
                .map(|p| (Handle::new(i as u32, generation), p))
        })
    }
}

impl<T> Index<Handle<T>> for Pool<T> {
    type Output = T;

    #[track_caller]
    fn index(&self, index: Handle<T>) -> &Self::Output {
        match self.try_borrow(index) {
            Some(payload) => payload,
            None => panic!("Attempt to borrow an object using invalid handle {index:?}"),
        }
    }
}

impl<T> IndexMut<Handle<T>> for Pool<T> {
    #[track_caller]
    fn index_mut(&mut self, index: Handle<T>) -> &mut Self::Output {
        match self.try_borrow_mut(index) {
            Some(payload) => payload,
            None => panic!("Attempt to borrow an object using invalid handle {index:?}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pool_sanity_tests() {
        let mut pool: Pool<String> = Pool::new();
        let foobar_handle = pool.spawn(String::from("Foobar"));
        assert_eq!(foobar_handle.index, 0);
        assert_ne!(foobar_handle.generation, INVALID_GENERATION);
        let foobar_handle_copy = foobar_handle;
        assert_eq!(foobar_handle.index, foobar_handle_copy.index);
        assert_eq!(foobar_handle.generation, foobar_handle_copy.generation);
        let baz_handle = pool.spawn(String::from("Baz"));
        assert_eq!(pool[foobar_handle], "Foobar");
        assert_eq!(pool[baz_handle], "Baz");
        assert_eq!(pool.free(foobar_handle), Some(String::from("Foobar")));
        assert!(!pool.is_valid_handle(foobar_handle_copy));
        assert!(pool.is_valid_handle(baz_handle));
        let at_foobar_index = pool.spawn(String::from("AtFoobarIndex"));
        assert_eq!(at_foobar_index.index, 0);
        assert_ne!(at_foobar_index.generation, INVALID_GENERATION);
        assert_eq!(pool[at_foobar_index], "AtFoobarIndex");
        assert_eq!(pool.alive_count(), 2);
    }

    #[test]
    fn handle_of_matches_pair_iter() {
        let mut pool = Pool::new();
        let a = pool.spawn(1);
        let b = pool.spawn(2);
        let _ = pool.free(a);
        assert_eq!(pool.handle_of(0), Handle::NONE);
        assert_eq!(pool.handle_of(1), b);
        assert_eq!(pool.pair_iter().map(|(h, _)| h).collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn default_handle_is_none() {
        assert!(Handle::<u32>::default().is_none());
        assert!(Handle::<u32>::new(0, 1).is_some());
    }
}
