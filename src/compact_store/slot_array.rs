use std::iter::Zip;
use std::mem::{needs_drop, size_of, MaybeUninit};
use std::slice;

use crate::{Equivalent, ReserveError};

/// The metadata value of a slot that has never been occupied since the last rehash.
pub(crate) const EMPTY: u8 = 0;

/// The metadata value of a slot whose entry was removed.
pub(crate) const DELETED: u8 = 1;

/// The metadata bit of an occupied slot; the remaining seven bits hold a partial hash.
pub(crate) const OCCUPIED: u8 = 0x80;

/// [`SlotArray`] is a power-of-two sized array of entry slots with linear probing.
///
/// Each slot costs one metadata byte and one `(K, V)` cell; the metadata byte tells whether the
/// cell is initialized, and caches the upper seven bits of the hash of the key for fast
/// rejection of non-matching slots.
pub(crate) struct SlotArray<K, V> {
    metadata: Box<[u8]>,
    data_block: Box<[MaybeUninit<(K, V)>]>,
    mask: usize,
}

/// [`Iter`] traverses the occupied slots of a [`SlotArray`] in physical order.
pub(crate) struct Iter<'s, K, V> {
    inner: Zip<slice::Iter<'s, u8>, slice::Iter<'s, MaybeUninit<(K, V)>>>,
}

/// [`IterMut`] traverses the occupied slots of a [`SlotArray`] with mutable access to values.
pub(crate) struct IterMut<'s, K, V> {
    inner: Zip<slice::Iter<'s, u8>, slice::IterMut<'s, MaybeUninit<(K, V)>>>,
}

/// Returns the metadata byte of an occupied slot for the hash value.
#[allow(clippy::cast_possible_truncation)] // Intended truncation.
#[inline]
pub(crate) const fn partial_hash(hash: u64) -> u8 {
    OCCUPIED | (hash >> 57) as u8
}

#[inline]
const fn is_occupied(metadata: u8) -> bool {
    metadata & OCCUPIED != 0
}

impl<K, V> SlotArray<K, V> {
    /// Allocates a new [`SlotArray`] of the given power-of-two capacity.
    ///
    /// # Panics
    ///
    /// Panics if memory allocation fails.
    pub(crate) fn new(capacity: usize) -> Self {
        match Self::try_new(capacity) {
            Ok(slot_array) => slot_array,
            Err(e) => panic!("memory allocation failure: {e}"),
        }
    }

    /// Allocates a new [`SlotArray`] of the given power-of-two capacity.
    pub(crate) fn try_new(capacity: usize) -> Result<Self, ReserveError> {
        assert!(capacity.is_power_of_two());

        let mut metadata = Vec::new();
        metadata
            .try_reserve_exact(capacity)
            .map_err(|_| ReserveError::AllocError { bytes: capacity })?;
        metadata.resize(capacity, EMPTY);

        let mut data_block = Vec::new();
        data_block
            .try_reserve_exact(capacity)
            .map_err(|_| ReserveError::AllocError {
                bytes: capacity.saturating_mul(size_of::<(K, V)>()),
            })?;
        data_block.resize_with(capacity, MaybeUninit::uninit);

        Ok(Self {
            metadata: metadata.into_boxed_slice(),
            data_block: data_block.into_boxed_slice(),
            mask: capacity - 1,
        })
    }

    /// Returns the number of slots.
    #[inline]
    pub(crate) const fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Returns the index of the first slot of the probe sequence for the hash value.
    #[allow(clippy::cast_possible_truncation)] // Intended truncation.
    #[inline]
    pub(crate) const fn home_index(&self, hash: u64) -> usize {
        hash as usize & self.mask
    }

    /// Searches the probe sequence of the key.
    ///
    /// Returns `Ok(index)` if the key is found, or `Err(index)` pointing to the slot where the key
    /// should be inserted: the first [`DELETED`] slot of the probe sequence if any, or the
    /// terminating [`EMPTY`] slot.
    ///
    /// # Panics
    ///
    /// Panics if the probe sequence wraps around without reaching an [`EMPTY`] slot; the owner
    /// of the [`SlotArray`] guarantees that there is always at least one.
    #[inline]
    pub(crate) fn probe<Q>(&self, key: &Q, hash: u64) -> Result<usize, usize>
    where
        Q: Equivalent<K> + ?Sized,
    {
        let partial_hash = partial_hash(hash);
        let mut index = self.home_index(hash);
        let mut first_deleted = None;
        for _ in 0..=self.mask {
            match self.metadata[index] {
                EMPTY => return Err(first_deleted.unwrap_or(index)),
                DELETED => {
                    if first_deleted.is_none() {
                        first_deleted = Some(index);
                    }
                }
                metadata => {
                    if metadata == partial_hash && key.equivalent(&self.entry(index).0) {
                        return Ok(index);
                    }
                }
            }
            index = (index + 1) & self.mask;
        }
        panic!(
            "probe sequence exceeded the capacity of the slot array: {}",
            self.capacity()
        );
    }

    /// Returns `true` if the slot holds a tombstone.
    #[inline]
    pub(crate) fn is_deleted(&self, index: usize) -> bool {
        self.metadata[index] == DELETED
    }

    /// Returns a reference to the entry in the occupied slot.
    #[inline]
    pub(crate) fn entry(&self, index: usize) -> &(K, V) {
        debug_assert!(is_occupied(self.metadata[index]));
        unsafe { self.data_block[index].assume_init_ref() }
    }

    /// Returns a mutable reference to the entry in the occupied slot.
    #[inline]
    pub(crate) fn entry_mut(&mut self, index: usize) -> (&K, &mut V) {
        debug_assert!(is_occupied(self.metadata[index]));
        let (k, v) = unsafe { self.data_block[index].assume_init_mut() };
        (&*k, v)
    }

    /// Writes an entry into the vacant slot.
    #[inline]
    pub(crate) fn write(&mut self, index: usize, hash: u64, key: K, val: V) {
        assert!(!is_occupied(self.metadata[index]));
        self.data_block[index].write((key, val));
        self.metadata[index] = partial_hash(hash);
    }

    /// Writes an entry into the first vacant slot of its probe sequence without checking for an
    /// equivalent key.
    ///
    /// This is only used when relocating entries of which the keys are known to be distinct.
    #[inline]
    pub(crate) fn write_unique(&mut self, hash: u64, key: K, val: V) {
        let mut index = self.home_index(hash);
        for _ in 0..=self.mask {
            if !is_occupied(self.metadata[index]) {
                self.write(index, hash, key, val);
                return;
            }
            index = (index + 1) & self.mask;
        }
        panic!("no vacant slot in the slot array: {}", self.capacity());
    }

    /// Moves the entry out of the occupied slot and leaves a tombstone.
    #[inline]
    pub(crate) fn remove(&mut self, index: usize) -> (K, V) {
        assert!(is_occupied(self.metadata[index]));
        self.metadata[index] = DELETED;
        unsafe { self.data_block[index].assume_init_read() }
    }

    /// Moves the next occupied entry at or after `*cursor` out of the slot array.
    ///
    /// The slot becomes [`EMPTY`], therefore the slot array must not be searched afterwards
    /// unless it is cleared.
    #[inline]
    pub(crate) fn take_next(&mut self, cursor: &mut usize) -> Option<(K, V)> {
        while *cursor <= self.mask {
            let index = *cursor;
            *cursor += 1;
            if is_occupied(self.metadata[index]) {
                self.metadata[index] = EMPTY;
                return Some(unsafe { self.data_block[index].assume_init_read() });
            }
        }
        None
    }

    /// Removes every entry for which the predicate returns `false`, leaving a tombstone.
    ///
    /// `len` and `num_tombstones` are updated as each entry is removed, so they stay accurate
    /// if the predicate or a destructor panics.
    pub(crate) fn retain<F: FnMut(&K, &mut V) -> bool>(
        &mut self,
        mut pred: F,
        len: &mut usize,
        num_tombstones: &mut usize,
    ) {
        for index in 0..=self.mask {
            if is_occupied(self.metadata[index]) {
                let (k, v) = self.entry_mut(index);
                if !pred(k, v) {
                    let entry = self.remove(index);
                    *len -= 1;
                    *num_tombstones += 1;
                    drop(entry);
                }
            }
        }
    }

    /// Drops every entry and resets all the slots to [`EMPTY`].
    pub(crate) fn clear(&mut self) {
        if needs_drop::<(K, V)>() {
            let mut cursor = 0;
            while self.take_next(&mut cursor).is_some() {}
        }
        self.metadata.fill(EMPTY);
    }

    /// Returns an iterator over occupied slots.
    #[inline]
    pub(crate) fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.metadata.iter().zip(self.data_block.iter()),
        }
    }

    /// Returns an iterator over occupied slots with mutable access to values.
    #[inline]
    pub(crate) fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.metadata.iter().zip(self.data_block.iter_mut()),
        }
    }
}

impl<K: Clone, V: Clone> Clone for SlotArray<K, V> {
    /// Clones the slot array slot by slot, tombstones included, so that no entry is rehashed.
    fn clone(&self) -> Self {
        let mut cloned = Self::new(self.capacity());
        for (index, metadata) in self.metadata.iter().enumerate() {
            if is_occupied(*metadata) {
                let (k, v) = self.entry(index);
                cloned.data_block[index].write((k.clone(), v.clone()));
            }
            cloned.metadata[index] = *metadata;
        }
        cloned
    }
}

impl<K, V> Drop for SlotArray<K, V> {
    #[inline]
    fn drop(&mut self) {
        if needs_drop::<(K, V)>() {
            let mut cursor = 0;
            while self.take_next(&mut cursor).is_some() {}
        }
    }
}

impl<'s, K, V> Iterator for Iter<'s, K, V> {
    type Item = (&'s K, &'s V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        for (metadata, entry) in self.inner.by_ref() {
            if is_occupied(*metadata) {
                let (k, v) = unsafe { entry.assume_init_ref() };
                return Some((k, v));
            }
        }
        None
    }
}

impl<'s, K, V> Iterator for IterMut<'s, K, V> {
    type Item = (&'s K, &'s mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        for (metadata, entry) in self.inner.by_ref() {
            if is_occupied(*metadata) {
                let (k, v) = unsafe { entry.assume_init_mut() };
                return Some((&*k, v));
            }
        }
        None
    }
}
