//! [`Construction`] decides how the slot array of a [`CompactStore`](crate::CompactStore) starts.

use std::fmt;

use crate::ConfigError;

/// The capacity of an incrementally constructed store.
pub const MINIMUM_CAPACITY: usize = 8;

/// The largest capacity a store can reach.
pub const MAXIMUM_CAPACITY: usize = 1_usize << (usize::BITS - 1);

/// How the store allocates its first slot array.
///
/// Both strategies produce a store satisfying the same invariants; they only differ in the
/// initial capacity passed to the shared allocation path.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Construction {
    /// Starts at [`MINIMUM_CAPACITY`] and grows as entries accumulate.
    #[default]
    Incremental,

    /// Sized upfront so that the given number of distinct keys can be inserted without a
    /// rehash.
    Prefilled(usize),
}

impl Construction {
    /// Returns the number of slots to allocate for the given [`LoadFactor`].
    ///
    /// The result is always a power of two not smaller than [`MINIMUM_CAPACITY`]. `None` is
    /// returned if the expected number of entries cannot be accommodated.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::{Construction, LoadFactor};
    ///
    /// let load_factor = LoadFactor::default();
    ///
    /// assert_eq!(Construction::Incremental.initial_capacity(load_factor), Some(8));
    /// assert_eq!(Construction::Prefilled(5).initial_capacity(load_factor), Some(8));
    /// assert_eq!(Construction::Prefilled(6).initial_capacity(load_factor), Some(16));
    /// assert_eq!(Construction::Prefilled(1000).initial_capacity(load_factor), Some(2048));
    /// ```
    #[inline]
    #[must_use]
    pub fn initial_capacity(self, load_factor: LoadFactor) -> Option<usize> {
        match self {
            Construction::Incremental => Some(MINIMUM_CAPACITY),
            Construction::Prefilled(expected_len) => load_factor.capacity_for(expected_len),
        }
    }

    /// Returns `true` if the store is sized upfront.
    #[inline]
    #[must_use]
    pub const fn is_prefilled(self) -> bool {
        matches!(self, Construction::Prefilled(_))
    }
}

impl From<Option<usize>> for Construction {
    /// `None` selects [`Construction::Incremental`], and `Some(n)` selects
    /// [`Construction::Prefilled`].
    #[inline]
    fn from(expected_len: Option<usize>) -> Self {
        expected_len.map_or(Construction::Incremental, Construction::Prefilled)
    }
}

/// The ratio of occupied slots to capacity at which the store grows.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub struct LoadFactor(f64);

impl LoadFactor {
    /// The default load factor, `0.75`.
    pub const DEFAULT: LoadFactor = LoadFactor(0.75);

    /// The smallest accepted ratio, `1 / MINIMUM_CAPACITY`.
    ///
    /// Every capacity doubling at or above this ratio raises the growth threshold, so a store
    /// can always grow past its current length.
    #[allow(clippy::cast_precision_loss)]
    pub const MIN: f64 = 1.0 / MINIMUM_CAPACITY as f64;

    /// Creates a new [`LoadFactor`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLoadFactor`] unless `LoadFactor::MIN <= ratio < 1.0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use compact_store::LoadFactor;
    ///
    /// assert!(LoadFactor::new(0.5).is_ok());
    /// assert!(LoadFactor::new(LoadFactor::MIN).is_ok());
    /// assert!(LoadFactor::new(0.01).is_err());
    /// assert!(LoadFactor::new(1.0).is_err());
    /// assert!(LoadFactor::new(f64::NAN).is_err());
    /// ```
    #[inline]
    pub fn new(ratio: f64) -> Result<Self, ConfigError> {
        if (Self::MIN..1.0).contains(&ratio) {
            Ok(LoadFactor(ratio))
        } else {
            Err(ConfigError::InvalidLoadFactor(ratio))
        }
    }

    /// Returns the ratio.
    #[inline]
    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }

    /// Returns the number of slots in use at which a table of the given capacity is rehashed.
    ///
    /// The threshold is at least `1` and at most `capacity - 1`, so that a table always keeps an
    /// empty slot to terminate probing.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    #[inline]
    #[must_use]
    pub fn growth_threshold(self, capacity: usize) -> usize {
        let threshold = (capacity as f64 * self.0) as usize;
        threshold.clamp(1, capacity.saturating_sub(1).max(1))
    }

    /// Returns the smallest valid capacity whose growth threshold exceeds `len`.
    fn capacity_for(self, len: usize) -> Option<usize> {
        let mut capacity = MINIMUM_CAPACITY;
        while self.growth_threshold(capacity) <= len {
            if capacity == MAXIMUM_CAPACITY {
                return None;
            }
            capacity <<= 1;
        }
        Some(capacity)
    }
}

impl Default for LoadFactor {
    #[inline]
    fn default() -> Self {
        LoadFactor::DEFAULT
    }
}

impl fmt::Debug for LoadFactor {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoadFactor({})", self.0)
    }
}

impl TryFrom<f64> for LoadFactor {
    type Error = ConfigError;

    #[inline]
    fn try_from(ratio: f64) -> Result<Self, Self::Error> {
        LoadFactor::new(ratio)
    }
}

/// The configuration value handed to
/// [`CompactStore::with_config`](crate::CompactStore::with_config).
///
/// # Examples
///
/// ```
/// use compact_store::{CompactStore, Construction, LoadFactor, StoreConfig};
///
/// let config = StoreConfig::default()
///     .construction(Construction::Prefilled(100))
///     .load_factor(LoadFactor::new(0.5).unwrap());
/// let store: CompactStore<u64, u64> = CompactStore::with_config(config);
///
/// assert_eq!(store.capacity(), 256);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StoreConfig {
    construction: Construction,
    load_factor: LoadFactor,
}

impl StoreConfig {
    /// Returns the configuration of an incrementally constructed store.
    #[inline]
    #[must_use]
    pub fn incremental() -> Self {
        Self::default()
    }

    /// Returns the configuration of a store pre-sized for `expected_len` entries.
    #[inline]
    #[must_use]
    pub fn prefilled(expected_len: usize) -> Self {
        Self::default().construction(Construction::Prefilled(expected_len))
    }

    /// Sets the [`Construction`] strategy.
    #[inline]
    #[must_use]
    pub fn construction(mut self, construction: Construction) -> Self {
        self.construction = construction;
        self
    }

    /// Sets the [`LoadFactor`].
    #[inline]
    #[must_use]
    pub fn load_factor(mut self, load_factor: LoadFactor) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Returns the [`Construction`] strategy.
    #[inline]
    #[must_use]
    pub const fn get_construction(&self) -> Construction {
        self.construction
    }

    /// Returns the [`LoadFactor`].
    #[inline]
    #[must_use]
    pub const fn get_load_factor(&self) -> LoadFactor {
        self.load_factor
    }
}
