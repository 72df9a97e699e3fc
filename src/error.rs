use std::fmt;

/// The error returned by [`CompactStore::add`](crate::CompactStore::add) when the key is already
/// present.
///
/// The rejected key-value pair is handed back so that the caller can decide what to do with it,
/// for instance retrying with [`CompactStore::set`](crate::CompactStore::set).
#[derive(thiserror::Error, Clone, Eq, PartialEq)]
#[error("the key is already present in the store")]
pub struct DuplicateKeyError<K, V> {
    /// The key that was not inserted.
    pub key: K,
    /// The value that was not inserted.
    pub value: V,
}

impl<K, V> DuplicateKeyError<K, V> {
    /// Returns the rejected key-value pair.
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
    pub fn into_inner(self) -> (K, V) {
        (self.key, self.value)
    }
}

impl<K: fmt::Debug, V> fmt::Debug for DuplicateKeyError<K, V> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplicateKeyError")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Errors detected while building a [`StoreConfig`](crate::StoreConfig).
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq)]
pub enum ConfigError {
    /// The load factor must be at least `0.125` and less than `1.0`.
    #[error("load factor {0} is outside of [0.125, 1)")]
    InvalidLoadFactor(f64),
}

/// The error type for [`CompactStore::try_reserve`](crate::CompactStore::try_reserve).
#[derive(thiserror::Error, Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReserveError {
    /// The requested number of slots cannot be represented.
    #[error("the requested capacity exceeds the maximum capacity of the store")]
    CapacityOverflow,
    /// The allocator could not provide memory for the new slot array.
    #[error("memory allocation of {bytes} bytes failed")]
    AllocError {
        /// The size of the allocation that failed.
        bytes: usize,
    },
}
