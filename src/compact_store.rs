//! [`CompactStore`] is a compact open-addressed key-value store.

mod slot_array;

use std::collections::hash_map::RandomState;
use std::fmt::{self, Debug};
use std::hash::{BuildHasher, Hash, Hasher};
use std::iter::FusedIterator;
use std::mem::replace;
use std::ops::Index;

use crate::construction::{Construction, LoadFactor, StoreConfig, MAXIMUM_CAPACITY};
use crate::{DuplicateKeyError, Equivalent, ReserveError};
use slot_array::SlotArray;

/// Compact open-addressed key-value store.
///
/// [`CompactStore`] keeps every entry in a single power-of-two sized array of slots, resolving
/// collisions with linear probing. It is designed for very large, long-lived datasets such as
/// the nodes and edges of a regional road network, where the per-entry overhead and the cache
/// behavior of the container dominate.
///
/// ## The key features of [`CompactStore`]
///
/// * Flat storage: a slot is one metadata byte plus the `(K, V)` pair, without per-entry
///   allocation or enum tag padding.
/// * Tombstone deletion: removing an entry leaves a tombstone so that probe sequences of other
///   keys stay intact; tombstones are reused by later insertions and purged on rehash.
/// * Monotonic capacity: the slot array grows by doubling when the number of entries reaches
///   the [`LoadFactor`] threshold, and never shrinks.
/// * Pre-sizing: a store constructed with [`Construction::Prefilled`] accommodates the expected
///   number of entries without a single rehash.
///
/// ## Concurrency
///
/// [`CompactStore`] has no internal synchronization: every mutating method takes `&mut self`.
/// Wrap it in a lock, e.g., an `RwLock`, for shared access.
///
/// ## Unwind safety
///
/// [`CompactStore`] stays memory safe and its counters stay accurate if user-provided code
/// panics. If `K::hash` or the [`Hasher`] built by `H` panics while the store is rehashing,
/// the entries that were not relocated yet are dropped, and [`len`](Self::len) reports the
/// entries that remain.
pub struct CompactStore<K, V, H = RandomState>
where
    H: BuildHasher,
{
    slots: SlotArray<K, V>,
    len: usize,
    num_tombstones: usize,
    growth_threshold: usize,
    load_factor: LoadFactor,
    num_rehashes: usize,
    build_hasher: H,
}

/// The outcome of [`CompactStore::set`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SetResult<V> {
    /// The key was absent, and the entry was inserted.
    Inserted,

    /// The key was present, and the contained old value was replaced.
    Replaced(V),
}

/// An iterator over the entries of a [`CompactStore`].
pub struct Iter<'s, K, V> {
    inner: slot_array::Iter<'s, K, V>,
    remaining: usize,
}

/// A mutable iterator over the entries of a [`CompactStore`].
pub struct IterMut<'s, K, V> {
    inner: slot_array::IterMut<'s, K, V>,
    remaining: usize,
}

/// An owning iterator over the entries of a [`CompactStore`].
pub struct IntoIter<K, V> {
    slots: SlotArray<K, V>,
    cursor: usize,
    remaining: usize,
}

impl<K, V, H> CompactStore<K, V, H>
where
    H: BuildHasher,
{
    /// Creates an empty incrementally constructed [`CompactStore`] with the given
    /// [`BuildHasher`].
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    /// use std::collections::hash_map::RandomState;
    ///
    /// let store: CompactStore<u64, u32, RandomState> =
    ///     CompactStore::with_hasher(RandomState::new());
    ///
    /// assert_eq!(store.capacity(), 8);
    /// ```
    #[inline]
    pub fn with_hasher(build_hasher: H) -> Self {
        Self::with_config_and_hasher(StoreConfig::incremental(), build_hasher)
    }

    /// Creates an empty [`CompactStore`] that can hold `capacity` entries without rehashing,
    /// with the given [`BuildHasher`].
    ///
    /// # Panics
    ///
    /// Panics if the capacity cannot be represented or memory allocation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    /// use std::collections::hash_map::RandomState;
    ///
    /// let store: CompactStore<u64, u32, RandomState> =
    ///     CompactStore::with_capacity_and_hasher(1000, RandomState::new());
    ///
    /// assert_eq!(store.capacity(), 2048);
    /// ```
    #[inline]
    pub fn with_capacity_and_hasher(capacity: usize, build_hasher: H) -> Self {
        Self::with_config_and_hasher(StoreConfig::prefilled(capacity), build_hasher)
    }

    /// Creates an empty [`CompactStore`] from the [`StoreConfig`] with the given
    /// [`BuildHasher`].
    ///
    /// # Panics
    ///
    /// Panics if the pre-filled capacity cannot be represented or memory allocation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::{CompactStore, Construction, StoreConfig};
    /// use std::collections::hash_map::RandomState;
    ///
    /// let config = StoreConfig::default().construction(Construction::from(Some(12)));
    /// let store: CompactStore<u64, u32, RandomState> =
    ///     CompactStore::with_config_and_hasher(config, RandomState::new());
    ///
    /// assert_eq!(store.capacity(), 32);
    /// ```
    pub fn with_config_and_hasher(config: StoreConfig, build_hasher: H) -> Self {
        let load_factor = config.get_load_factor();
        let construction = config.get_construction();
        let Some(capacity) = construction.initial_capacity(load_factor) else {
            panic!("capacity overflow: {construction:?}");
        };

        #[cfg(feature = "logging")]
        if construction.is_prefilled() {
            log::trace!("pre-filled store: {construction:?}, {load_factor:?}, capacity {capacity}");
        }

        Self {
            slots: SlotArray::new(capacity),
            len: 0,
            num_tombstones: 0,
            growth_threshold: load_factor.growth_threshold(capacity),
            load_factor,
            num_rehashes: 0,
            build_hasher,
        }
    }

    /// Returns a reference to its [`BuildHasher`].
    #[inline]
    pub fn hasher(&self) -> &H {
        &self.build_hasher
    }

    /// Returns the number of entries in the [`CompactStore`].
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let mut store: CompactStore<u64, u32> = CompactStore::new();
    ///
    /// assert!(store.add(1, 0).is_ok());
    /// assert_eq!(store.len(), 1);
    /// ```
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the [`CompactStore`] is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let mut store: CompactStore<u64, u32> = CompactStore::new();
    ///
    /// assert!(store.is_empty());
    /// assert!(store.add(1, 0).is_ok());
    /// assert!(!store.is_empty());
    /// ```
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of slots of the [`CompactStore`].
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let mut store: CompactStore<u64, u32> = CompactStore::new();
    /// assert_eq!(store.capacity(), 8);
    ///
    /// for key in 0..6 {
    ///     assert!(store.add(key, 0).is_ok());
    /// }
    /// assert_eq!(store.capacity(), 16);
    /// ```
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Returns the [`LoadFactor`] of the [`CompactStore`].
    #[inline]
    pub const fn load_factor(&self) -> LoadFactor {
        self.load_factor
    }

    /// Returns the number of tombstones left by removed entries since the last rehash.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let mut store: CompactStore<u64, u32> = CompactStore::new();
    ///
    /// assert!(store.add(1, 0).is_ok());
    /// assert!(store.remove(&1).is_some());
    /// assert_eq!(store.num_tombstones(), 1);
    /// ```
    #[inline]
    pub const fn num_tombstones(&self) -> usize {
        self.num_tombstones
    }

    /// Returns the number of times the slot array has been rehashed.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let mut store: CompactStore<u64, u32> = CompactStore::with_capacity(100);
    ///
    /// for key in 0..100 {
    ///     assert!(store.add(key, 0).is_ok());
    /// }
    /// assert_eq!(store.num_rehashes(), 0);
    /// ```
    #[inline]
    pub const fn num_rehashes(&self) -> usize {
        self.num_rehashes
    }

    /// Returns an iterator over the entries in physical slot order.
    ///
    /// The order is neither the insertion order nor stable across rehashes.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let mut store: CompactStore<u64, u32> = CompactStore::new();
    ///
    /// assert!(store.add(1, 10).is_ok());
    /// assert!(store.add(2, 20).is_ok());
    ///
    /// let sum: u32 = store.iter().map(|(_, v)| *v).sum();
    /// assert_eq!(sum, 30);
    /// ```
    #[inline]
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.slots.iter(),
            remaining: self.len,
        }
    }

    /// Returns an iterator over the entries with mutable references to the values.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let mut store: CompactStore<u64, u32> = CompactStore::new();
    ///
    /// assert!(store.add(1, 10).is_ok());
    /// store.iter_mut().for_each(|(_, v)| *v += 1);
    /// assert_eq!(store.get(&1), Some(&11));
    /// ```
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.slots.iter_mut(),
            remaining: self.len,
        }
    }

    /// Returns an iterator over the keys.
    #[inline]
    pub fn keys(&self) -> impl ExactSizeIterator<Item = &K> + FusedIterator + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Returns an iterator over the values.
    #[inline]
    pub fn values(&self) -> impl ExactSizeIterator<Item = &V> + FusedIterator + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Removes every entry for which the predicate returns `false`.
    ///
    /// Each removed entry leaves a tombstone as [`remove`](Self::remove) does.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let mut store: CompactStore<u64, u32> = CompactStore::new();
    ///
    /// for key in 0..4 {
    ///     assert!(store.add(key, 0).is_ok());
    /// }
    /// store.retain(|k, _| k % 2 == 0);
    /// assert_eq!(store.len(), 2);
    /// assert_eq!(store.num_tombstones(), 2);
    /// ```
    #[inline]
    pub fn retain<F: FnMut(&K, &mut V) -> bool>(&mut self, pred: F) {
        self.slots.retain(pred, &mut self.len, &mut self.num_tombstones);
    }

    /// Removes all the entries and tombstones.
    ///
    /// The capacity is not released.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let mut store: CompactStore<u64, u32> = CompactStore::with_capacity(100);
    ///
    /// assert!(store.add(1, 0).is_ok());
    /// store.clear();
    ///
    /// assert!(store.is_empty());
    /// assert_eq!(store.capacity(), 256);
    /// ```
    #[inline]
    pub fn clear(&mut self) {
        self.slots.clear();
        self.len = 0;
        self.num_tombstones = 0;
    }
}

impl<K, V, H> CompactStore<K, V, H>
where
    K: Eq + Hash,
    H: BuildHasher,
{
    /// Inserts a key-value pair into the [`CompactStore`].
    ///
    /// The slot array is rehashed before the entry is placed if the insertion would make the
    /// number of used slots reach the growth threshold.
    ///
    /// # Errors
    ///
    /// Returns a [`DuplicateKeyError`] carrying the supplied key-value pair if the key exists.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let mut store: CompactStore<u64, u32> = CompactStore::new();
    ///
    /// assert!(store.add(1, 0).is_ok());
    /// assert_eq!(store.add(1, 1).unwrap_err().into_inner(), (1, 1));
    /// ```
    #[inline]
    pub fn add(&mut self, key: K, val: V) -> Result<(), DuplicateKeyError<K, V>> {
        let hash = self.hash(&key);
        match self.slots.probe(&key, hash) {
            Ok(_) => Err(DuplicateKeyError { key, value: val }),
            Err(vacant) => {
                self.insert_vacant(vacant, hash, key, val);
                Ok(())
            }
        }
    }

    /// Inserts or overwrites a key-value pair.
    ///
    /// Returns [`SetResult::Replaced`] with the old value if the key was present, and the key
    /// passed in is dropped in that case.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::{CompactStore, SetResult};
    ///
    /// let mut store: CompactStore<u64, u32> = CompactStore::new();
    ///
    /// assert_eq!(store.set(1, 0), SetResult::Inserted);
    /// assert_eq!(store.set(1, 1), SetResult::Replaced(0));
    /// assert_eq!(store.get(&1), Some(&1));
    /// ```
    #[inline]
    pub fn set(&mut self, key: K, val: V) -> SetResult<V> {
        let hash = self.hash(&key);
        match self.slots.probe(&key, hash) {
            Ok(index) => SetResult::Replaced(replace(self.slots.entry_mut(index).1, val)),
            Err(vacant) => {
                self.insert_vacant(vacant, hash, key, val);
                SetResult::Inserted
            }
        }
    }

    /// Returns a mutable reference to the value of the key, inserting the value returned by the
    /// constructor if the key is absent.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let mut store: CompactStore<u64, Vec<u64>> = CompactStore::new();
    ///
    /// store.get_or_insert_with(1, Vec::new).push(2);
    /// store.get_or_insert_with(1, Vec::new).push(3);
    /// assert_eq!(store.get(&1), Some(&vec![2, 3]));
    /// ```
    #[inline]
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, constructor: F) -> &mut V {
        let hash = self.hash(&key);
        let index = match self.slots.probe(&key, hash) {
            Ok(index) => index,
            Err(vacant) => self.insert_vacant(vacant, hash, key, constructor()),
        };
        self.slots.entry_mut(index).1
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// Returns `None` if the key does not exist. It never rehashes the slot array.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let mut store: CompactStore<u64, u32> = CompactStore::new();
    ///
    /// assert!(store.get(&1).is_none());
    /// assert!(store.add(1, 10).is_ok());
    /// assert_eq!(store.get(&1), Some(&10));
    /// ```
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        Q: Equivalent<K> + Hash + ?Sized,
    {
        self.get_key_value(key).map(|(_, v)| v)
    }

    /// Returns references to the key-value pair corresponding to the key.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let mut store: CompactStore<String, u32> = CompactStore::new();
    ///
    /// assert!(store.add("a".to_string(), 1).is_ok());
    /// assert_eq!(store.get_key_value("a"), Some((&"a".to_string(), &1)));
    /// ```
    #[inline]
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        Q: Equivalent<K> + Hash + ?Sized,
    {
        let index = self.slots.probe(key, self.hash(key)).ok()?;
        let (k, v) = self.slots.entry(index);
        Some((k, v))
    }

    /// Returns a mutable reference to the value corresponding to the key.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let mut store: CompactStore<u64, u32> = CompactStore::new();
    ///
    /// assert!(store.add(1, 10).is_ok());
    /// if let Some(v) = store.get_mut(&1) {
    ///     *v = 11;
    /// }
    /// assert_eq!(store.get(&1), Some(&11));
    /// ```
    #[inline]
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        Q: Equivalent<K> + Hash + ?Sized,
    {
        let index = self.slots.probe(key, self.hash(key)).ok()?;
        Some(self.slots.entry_mut(index).1)
    }

    /// Returns `true` if the [`CompactStore`] contains a value for the specified key.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let mut store: CompactStore<u64, u32> = CompactStore::new();
    ///
    /// assert!(!store.contains_key(&1));
    /// assert!(store.add(1, 0).is_ok());
    /// assert!(store.contains_key(&1));
    /// ```
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: Equivalent<K> + Hash + ?Sized,
    {
        self.slots.probe(key, self.hash(key)).is_ok()
    }

    /// Removes a key-value pair if the key exists.
    ///
    /// Returns `None` if the key does not exist. The slot is marked as a tombstone; the
    /// capacity is not reduced.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let mut store: CompactStore<u64, u32> = CompactStore::new();
    ///
    /// assert!(store.remove(&1).is_none());
    /// assert!(store.add(1, 0).is_ok());
    /// assert_eq!(store.remove(&1), Some((1, 0)));
    /// ```
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        Q: Equivalent<K> + Hash + ?Sized,
    {
        self.remove_if(key, |_| true)
    }

    /// Removes a key-value pair if the key exists and the given condition is met.
    ///
    /// Returns `None` if the key does not exist or the condition was not met.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let mut store: CompactStore<u64, u32> = CompactStore::new();
    ///
    /// assert!(store.add(1, 0).is_ok());
    /// assert!(store.remove_if(&1, |v| { *v += 1; false }).is_none());
    /// assert_eq!(store.remove_if(&1, |v| *v == 1), Some((1, 1)));
    /// ```
    #[inline]
    pub fn remove_if<Q, F: FnOnce(&mut V) -> bool>(
        &mut self,
        key: &Q,
        condition: F,
    ) -> Option<(K, V)>
    where
        Q: Equivalent<K> + Hash + ?Sized,
    {
        let index = self.slots.probe(key, self.hash(key)).ok()?;
        if !condition(self.slots.entry_mut(index).1) {
            return None;
        }
        self.len -= 1;
        self.num_tombstones += 1;
        Some(self.slots.remove(index))
    }

    /// Reserves room for at least `additional` more entries.
    ///
    /// # Panics
    ///
    /// Panics if the new capacity cannot be represented or memory allocation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let mut store: CompactStore<u64, u32> = CompactStore::new();
    ///
    /// store.reserve(1000);
    /// assert_eq!(store.capacity(), 2048);
    /// ```
    #[inline]
    pub fn reserve(&mut self, additional: usize) {
        if let Err(e) = self.try_reserve(additional) {
            panic!("{e}");
        }
    }

    /// Tries to reserve room for at least `additional` more entries.
    ///
    /// After a successful call, `additional` insertions of distinct new keys do not trigger a
    /// rehash. Tombstones are purged if the slot array is rehashed.
    ///
    /// # Errors
    ///
    /// Returns a [`ReserveError`] if the new capacity cannot be represented or memory allocation
    /// fails, in which case the [`CompactStore`] is left untouched.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::{CompactStore, ReserveError};
    ///
    /// let mut store: CompactStore<u64, u32> = CompactStore::new();
    ///
    /// assert!(store.try_reserve(10).is_ok());
    /// assert_eq!(store.try_reserve(usize::MAX), Err(ReserveError::CapacityOverflow));
    /// ```
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), ReserveError> {
        let required_len = self
            .len
            .checked_add(additional)
            .ok_or(ReserveError::CapacityOverflow)?;
        if required_len.saturating_add(self.num_tombstones) < self.growth_threshold {
            return Ok(());
        }
        let new_capacity = Construction::Prefilled(required_len)
            .initial_capacity(self.load_factor)
            .ok_or(ReserveError::CapacityOverflow)?
            .max(self.capacity());
        let new_slots = SlotArray::try_new(new_capacity)?;
        self.rehash(new_slots);
        Ok(())
    }

    /// Returns the hash value of the key.
    #[inline]
    fn hash<Q>(&self, key: &Q) -> u64
    where
        Q: Hash + ?Sized,
    {
        hash_key(&self.build_hasher, key)
    }

    /// Places a new entry into the vacant slot found by probing, and returns the index of the
    /// slot where the entry ended up.
    ///
    /// Reusing a tombstone never changes the number of used slots; otherwise the slot array is
    /// rehashed first if the new entry would make it reach the growth threshold.
    fn insert_vacant(&mut self, vacant: usize, hash: u64, key: K, val: V) -> usize {
        let index = if self.slots.is_deleted(vacant) {
            self.num_tombstones -= 1;
            vacant
        } else if self.len + self.num_tombstones + 1 >= self.growth_threshold {
            self.rehash(SlotArray::new(self.next_capacity()));
            match self.slots.probe(&key, hash) {
                Err(vacant) => vacant,
                Ok(_) => unreachable!("the key was absent before rehashing"),
            }
        } else {
            vacant
        };
        self.slots.write(index, hash, key, val);
        self.len += 1;
        index
    }

    /// Returns the capacity of the slot array that the next entry is inserted into.
    ///
    /// The capacity doubles unless tombstones account for most of the used slots, in which case
    /// the slot array is rehashed in place to purge them.
    fn next_capacity(&self) -> usize {
        let required_len = self.len + 1;
        let mut capacity = self.capacity();
        if required_len * 2 < self.growth_threshold {
            return capacity;
        }
        loop {
            if capacity >= MAXIMUM_CAPACITY {
                panic!("capacity overflow: {capacity}");
            }
            capacity <<= 1;
            if self.load_factor.growth_threshold(capacity) > required_len {
                return capacity;
            }
        }
    }

    /// Relocates every entry into the new slot array, dropping all the tombstones.
    ///
    /// The new slot array is installed first and `len` counts relocated entries, so a panicking
    /// hasher leaves the store consistent with the entries that made it across.
    fn rehash(&mut self, new_slots: SlotArray<K, V>) {
        let mut old_slots = replace(&mut self.slots, new_slots);

        #[cfg(feature = "logging")]
        let (old_capacity, old_len, purged_tombstones) =
            (old_slots.capacity(), self.len, self.num_tombstones);

        self.len = 0;
        self.num_tombstones = 0;
        self.growth_threshold = self.load_factor.growth_threshold(self.capacity());
        self.num_rehashes += 1;

        let mut cursor = 0;
        while let Some((k, v)) = old_slots.take_next(&mut cursor) {
            let hash = hash_key(&self.build_hasher, &k);
            self.slots.write_unique(hash, k, v);
            self.len += 1;
        }

        #[cfg(feature = "logging")]
        log::debug!(
            "rehashed {old_len} entries: capacity {old_capacity} -> {}, {purged_tombstones} tombstones purged",
            self.capacity()
        );
    }
}

impl<K, V> CompactStore<K, V, RandomState> {
    /// Creates an empty incrementally constructed [`CompactStore`].
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let store: CompactStore<u64, u32> = CompactStore::new();
    ///
    /// assert_eq!(store.capacity(), 8);
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty [`CompactStore`] that can hold `capacity` entries without rehashing.
    ///
    /// # Panics
    ///
    /// Panics if the capacity cannot be represented or memory allocation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::CompactStore;
    ///
    /// let store: CompactStore<u64, u32> = CompactStore::with_capacity(1000);
    ///
    /// assert_eq!(store.capacity(), 2048);
    /// ```
    #[inline]
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::new())
    }

    /// Creates an empty [`CompactStore`] from the [`StoreConfig`].
    ///
    /// # Panics
    ///
    /// Panics if the pre-filled capacity cannot be represented or memory allocation fails.
    #[inline]
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_config_and_hasher(config, RandomState::new())
    }
}

/// Returns the hash value of the key.
#[inline]
fn hash_key<H: BuildHasher, Q: Hash + ?Sized>(build_hasher: &H, key: &Q) -> u64 {
    let mut h = build_hasher.build_hasher();
    key.hash(&mut h);
    h.finish()
}

impl<K, V, H> Clone for CompactStore<K, V, H>
where
    K: Clone,
    V: Clone,
    H: BuildHasher + Clone,
{
    /// Clones the [`CompactStore`] slot by slot without rehashing.
    ///
    /// The rehash count of the clone starts at zero.
    #[inline]
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            len: self.len,
            num_tombstones: self.num_tombstones,
            growth_threshold: self.growth_threshold,
            load_factor: self.load_factor,
            num_rehashes: 0,
            build_hasher: self.build_hasher.clone(),
        }
    }
}

impl<K, V, H> Debug for CompactStore<K, V, H>
where
    K: Debug,
    V: Debug,
    H: BuildHasher,
{
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, H> Default for CompactStore<K, V, H>
where
    H: BuildHasher + Default,
{
    /// Creates an empty incrementally constructed [`CompactStore`].
    #[inline]
    fn default() -> Self {
        Self::with_hasher(H::default())
    }
}

impl<K, V, H> Extend<(K, V)> for CompactStore<K, V, H>
where
    K: Eq + Hash,
    H: BuildHasher,
{
    /// Overwrites existing keys with the supplied values.
    #[inline]
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        let into_iter = iter.into_iter();
        self.reserve(into_iter.size_hint().0);
        into_iter.for_each(|(k, v)| {
            self.set(k, v);
        });
    }
}

impl<K, V, H> FromIterator<(K, V)> for CompactStore<K, V, H>
where
    K: Eq + Hash,
    H: BuildHasher + Default,
{
    /// Builds a [`CompactStore`] pre-filled for the lower bound of the size hint.
    #[inline]
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let into_iter = iter.into_iter();
        let mut store = Self::with_capacity_and_hasher(into_iter.size_hint().0, H::default());
        into_iter.for_each(|(k, v)| {
            store.set(k, v);
        });
        store
    }
}

impl<K, Q, V, H> Index<&Q> for CompactStore<K, V, H>
where
    K: Eq + Hash,
    Q: Equivalent<K> + Hash + ?Sized,
    H: BuildHasher,
{
    type Output = V;

    /// Returns a reference to the value corresponding to the key.
    ///
    /// # Panics
    ///
    /// Panics if the key is not present in the [`CompactStore`].
    #[inline]
    fn index(&self, key: &Q) -> &V {
        match self.get(key) {
            Some(v) => v,
            None => panic!("key not found"),
        }
    }
}

impl<K, V, H> PartialEq for CompactStore<K, V, H>
where
    K: Eq + Hash,
    V: PartialEq,
    H: BuildHasher,
{
    /// Compares two [`CompactStore`] instances as unordered collections of entries.
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, H> Eq for CompactStore<K, V, H>
where
    K: Eq + Hash,
    V: Eq,
    H: BuildHasher,
{
}

impl<'s, K, V, H> IntoIterator for &'s CompactStore<K, V, H>
where
    H: BuildHasher,
{
    type Item = (&'s K, &'s V);
    type IntoIter = Iter<'s, K, V>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'s, K, V, H> IntoIterator for &'s mut CompactStore<K, V, H>
where
    H: BuildHasher,
{
    type Item = (&'s K, &'s mut V);
    type IntoIter = IterMut<'s, K, V>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, H> IntoIterator for CompactStore<K, V, H>
where
    H: BuildHasher,
{
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            slots: self.slots,
            cursor: 0,
            remaining: self.len,
        }
    }
}

impl<'s, K, V> Iterator for Iter<'s, K, V> {
    type Item = (&'s K, &'s V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.inner.next()?;
        self.remaining -= 1;
        Some(entry)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Debug for Iter<'_, K, V> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter")
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

impl<'s, K, V> Iterator for IterMut<'s, K, V> {
    type Item = (&'s K, &'s mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.inner.next()?;
        self.remaining -= 1;
        Some(entry)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

impl<K, V> FusedIterator for IterMut<'_, K, V> {}

impl<K, V> Debug for IterMut<'_, K, V> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterMut")
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.slots.take_next(&mut self.cursor)?;
        self.remaining -= 1;
        Some(entry)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}

impl<K, V> FusedIterator for IntoIter<K, V> {}

impl<K, V> Debug for IntoIter<K, V> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntoIter")
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}
