mod compact_store {
    use std::collections::BTreeMap;
    use std::hash::{BuildHasherDefault, Hash, Hasher};
    use std::panic::{catch_unwind, AssertUnwindSafe, RefUnwindSafe, UnwindSafe};
    use std::rc::Rc;
    use std::sync::atomic::{AtomicU64, AtomicUsize};
    use std::sync::atomic::Ordering::Relaxed;

    use crate::compact_store::{IntoIter, Iter, IterMut};
    use crate::{
        CompactStore, Construction, DuplicateKeyError, Equivalent, LoadFactor, SetResult,
        StoreConfig,
    };

    static_assertions::assert_impl_all!(CompactStore<String, String>: Send, Sync, RefUnwindSafe, UnwindSafe);
    static_assertions::assert_not_impl_any!(CompactStore<Rc<String>, Rc<String>>: Send, Sync);
    static_assertions::assert_not_impl_any!(CompactStore<String, *const String>: Send, Sync);
    static_assertions::assert_impl_all!(Iter<String, String>: Send, Sync);
    static_assertions::assert_impl_all!(IterMut<String, String>: Send, Sync);
    static_assertions::assert_impl_all!(IntoIter<String, String>: Send, Sync);
    static_assertions::assert_impl_all!(DuplicateKeyError<u64, u64>: std::error::Error);

    /// Uses the key itself as the hash value so that collisions can be crafted.
    #[derive(Default)]
    struct IdentityHasher(u64);

    impl Hasher for IdentityHasher {
        fn finish(&self) -> u64 {
            self.0
        }
        fn write(&mut self, bytes: &[u8]) {
            for b in bytes {
                self.0 = (self.0 << 8) | u64::from(*b);
            }
        }
        fn write_u64(&mut self, i: u64) {
            self.0 = i;
        }
    }

    type IdentityState = BuildHasherDefault<IdentityHasher>;

    struct R(&'static AtomicUsize);
    impl R {
        fn new(cnt: &'static AtomicUsize) -> R {
            cnt.fetch_add(1, Relaxed);
            R(cnt)
        }
    }
    impl Clone for R {
        fn clone(&self) -> Self {
            self.0.fetch_add(1, Relaxed);
            R(self.0)
        }
    }
    impl Drop for R {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Relaxed);
        }
    }

    /// The key whose hash computation panics; `u64::MAX` disables it.
    static FAILING_KEY: AtomicU64 = AtomicU64::new(u64::MAX);

    #[derive(Debug, Eq, PartialEq)]
    struct FragileKey(u64);

    impl Hash for FragileKey {
        fn hash<H: Hasher>(&self, state: &mut H) {
            assert_ne!(self.0, FAILING_KEY.load(Relaxed), "hash failure");
            self.0.hash(state);
        }
    }

    #[derive(Debug, Eq, PartialEq)]
    struct EqTest(String, usize);

    impl Equivalent<EqTest> for str {
        fn equivalent(&self, key: &EqTest) -> bool {
            key.0.eq(self)
        }
    }

    impl Hash for EqTest {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.0.hash(state);
        }
    }

    #[test]
    fn equivalent() {
        let mut store: CompactStore<EqTest, usize> = CompactStore::default();
        assert!(store.add(EqTest("HELLO".to_owned(), 1), 1).is_ok());
        assert!(!store.contains_key("NO"));
        assert!(store.contains_key("HELLO"));
        assert_eq!(store.remove("HELLO"), Some((EqTest("HELLO".to_owned(), 1), 1)));
        assert!(store.is_empty());
    }

    #[test]
    fn scenario() {
        let mut store: CompactStore<u64, u64> = CompactStore::new();
        assert_eq!(store.capacity(), 8);
        for key in 1..=5 {
            assert!(store.add(key, key * 10).is_ok());
        }
        assert_eq!(store.capacity(), 8);
        assert_eq!(store.num_rehashes(), 0);

        assert!(store.add(6, 60).is_ok());
        assert_eq!(store.capacity(), 16);
        assert_eq!(store.num_rehashes(), 1);

        assert_eq!(store.remove(&3), Some((3, 30)));
        assert!(store.get(&3).is_none());
        assert_eq!(store.get(&4), Some(&40));
        assert_eq!(store.len(), 5);
        assert_eq!(store.capacity(), 16);
    }

    #[test]
    fn add_set() {
        let mut store: CompactStore<u64, u64> = CompactStore::new();
        for key in 0..5 {
            assert!(store.add(key, key).is_ok());
        }
        let err = store.add(0, 7).unwrap_err();
        assert_eq!((err.key, err.value), (0, 7));
        assert_eq!(err.to_string(), "the key is already present in the store");
        assert_eq!(store.set(0, 7), SetResult::Replaced(0));
        assert_eq!(store.get(&0), Some(&7));

        // Neither a rejected nor an overwriting insertion grows the store.
        assert_eq!(store.capacity(), 8);
        assert_eq!(store.len(), 5);

        assert_eq!(store.set(5, 5), SetResult::Inserted);
        assert_eq!(store.capacity(), 16);
    }

    #[test]
    fn removal() {
        let workload_size = 1024;
        let mut store: CompactStore<u64, u64> = CompactStore::new();
        for key in 0..workload_size {
            assert!(store.add(key, key * 3).is_ok());
        }
        let capacity = store.capacity();
        for key in (0..workload_size).filter(|k| k % 2 == 0) {
            assert_eq!(store.remove(&key), Some((key, key * 3)));
            assert!(store.remove(&key).is_none());
        }
        assert_eq!(store.capacity(), capacity);
        assert_eq!(store.len(), workload_size as usize / 2);
        assert_eq!(store.num_tombstones(), workload_size as usize / 2);
        for key in 0..workload_size {
            if key % 2 == 0 {
                assert!(store.get(&key).is_none());
            } else {
                assert_eq!(store.get(&key), Some(&(key * 3)));
            }
        }
    }

    #[test]
    fn tombstone_reuse() {
        let mut store: CompactStore<u64, u64, IdentityState> = CompactStore::default();
        assert!(store.add(1, 1).is_ok());
        assert!(store.add(9, 9).is_ok());
        assert_eq!(store.remove(&1), Some((1, 1)));
        assert_eq!(store.num_tombstones(), 1);

        // `9` is still reachable through the tombstone, and `17` takes its place.
        assert_eq!(store.get(&9), Some(&9));
        assert!(store.add(17, 17).is_ok());
        assert_eq!(store.num_tombstones(), 0);
        assert_eq!(store.get(&9), Some(&9));
        assert_eq!(store.get(&17), Some(&17));
        assert!(store.add(9, 0).is_err());
        assert_eq!(store.num_rehashes(), 0);
    }

    #[test]
    fn tombstone_purge() {
        let mut store: CompactStore<u64, u64, IdentityState> = CompactStore::default();
        for key in 0..1024 {
            assert!(store.add(key, key).is_ok());
            assert_eq!(store.remove(&key), Some((key, key)));
            assert!(store.num_tombstones() < 6);
        }
        assert!(store.is_empty());
        assert_eq!(store.capacity(), 8);
        assert!(store.num_rehashes() > 0);
        assert!(store.get(&1023).is_none());
    }

    #[test]
    fn long_resizing() {
        let mut store: CompactStore<u64, u64, IdentityState> = CompactStore::default();
        let mut expected = BTreeMap::new();
        for round in 0..10_u64 {
            let capacity = store.capacity() as u64;
            let base = (round << 40) | 3;
            for i in 0..capacity / 2 {
                let key = base + capacity * i;
                assert!(store.add(key, !key).is_ok());
                expected.insert(key, !key);
            }
        }
        assert!(store.num_rehashes() >= 9);
        assert_eq!(store.len(), expected.len());
        for (key, val) in &expected {
            assert_eq!(store.get(key), Some(val));
        }
        assert_eq!(store.iter().count(), expected.len());
        assert!(store.iter().all(|(k, v)| expected.get(k) == Some(v)));
    }

    #[test]
    fn collision_across_resize() {
        let mut store: CompactStore<u64, u64, IdentityState> = CompactStore::default();
        let capacity = store.capacity() as u64;
        for i in 0..5 {
            assert!(store.add(7 + capacity * i, i).is_ok());
        }
        assert_eq!(store.capacity(), 8);
        for key in 1000..1100 {
            assert!(store.add(key, key).is_ok());
        }
        assert!(store.capacity() > 8);
        for i in 0..5 {
            assert_eq!(store.get(&(7 + capacity * i)), Some(&i));
        }
    }

    #[test]
    fn fill_prefilled() {
        let workload_size = 10_000;
        let mut prefilled: CompactStore<u64, u64> = CompactStore::with_capacity(workload_size);
        let capacity = prefilled.capacity();
        let mut incremental: CompactStore<u64, u64> = CompactStore::new();
        for key in 0..workload_size as u64 {
            assert!(prefilled.add(key, key + 1).is_ok());
            assert!(incremental.add(key, key + 1).is_ok());
        }
        assert_eq!(prefilled.num_rehashes(), 0);
        assert_eq!(prefilled.capacity(), capacity);
        assert!(incremental.num_rehashes() > 0);
        assert_eq!(prefilled, incremental);
    }

    #[test]
    fn config() {
        let config = StoreConfig::incremental().load_factor(LoadFactor::new(0.5).unwrap());
        let mut store: CompactStore<u64, u64> = CompactStore::with_config(config);
        assert_eq!(store.load_factor(), LoadFactor::new(0.5).unwrap());
        for key in 0..3 {
            assert!(store.add(key, key).is_ok());
        }
        assert_eq!(store.capacity(), 8);
        assert!(store.add(3, 3).is_ok());
        assert_eq!(store.capacity(), 16);

        let store: CompactStore<u64, u64> =
            CompactStore::with_config(StoreConfig::default().construction(Some(5).into()));
        assert_eq!(store.capacity(), 8);
        assert_eq!(
            StoreConfig::prefilled(5).get_construction(),
            Construction::Prefilled(5)
        );
    }

    #[test]
    fn minimum_load_factor() {
        assert!(LoadFactor::new(1e-300).is_err());
        assert!(LoadFactor::new(0.1).is_err());

        let load_factor = LoadFactor::new(LoadFactor::MIN).unwrap();
        let config = StoreConfig::incremental().load_factor(load_factor);
        let mut store: CompactStore<u64, u64> = CompactStore::with_config(config);
        assert!(store.add(1, 1).is_ok());
        assert_eq!(store.capacity(), 16);
        for key in 2..=100 {
            assert!(store.add(key, key).is_ok());
        }
        assert_eq!(store.len(), 100);
        assert!(store.len() * 8 <= store.capacity());
        assert!((1..=100).all(|k| store.get(&k) == Some(&k)));
    }

    #[test]
    #[should_panic(expected = "capacity overflow")]
    fn prefilled_overflow() {
        let _store: CompactStore<u64, u64> = CompactStore::with_capacity(usize::MAX);
    }

    #[test]
    fn reserve() {
        let mut store: CompactStore<u64, u64> = CompactStore::new();
        for key in 0..4 {
            assert!(store.add(key, key).is_ok());
        }
        assert!(store.remove(&0).is_some());
        store.reserve(1000);
        assert_eq!(store.num_rehashes(), 1);
        assert_eq!(store.num_tombstones(), 0);
        for key in 4..1003 {
            assert!(store.add(key, key).is_ok());
        }
        assert_eq!(store.num_rehashes(), 1);
        assert_eq!(store.len(), 1002);

        // Reserving room that is already there is a no-op.
        let capacity = store.capacity();
        assert!(store.try_reserve(1).is_ok());
        assert_eq!(store.capacity(), capacity);
        assert_eq!(store.num_rehashes(), 1);
    }

    #[test]
    fn retain_clear() {
        let mut store: CompactStore<u64, u64> = (0..100).map(|k| (k, k)).collect();
        store.retain(|k, v| {
            *v += 1;
            k % 3 == 0
        });
        assert_eq!(store.len(), 34);
        assert_eq!(store.num_tombstones(), 66);
        assert!(store.iter().all(|(k, v)| k % 3 == 0 && *v == k + 1));

        let capacity = store.capacity();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.num_tombstones(), 0);
        assert_eq!(store.capacity(), capacity);
        assert!(store.add(1, 1).is_ok());
        assert_eq!(store.iter().count(), 1);
    }

    #[test]
    fn retain_panic() {
        let mut store: CompactStore<u64, u64> = (0..10).map(|k| (k, k)).collect();
        let mut calls = 0;
        let result = catch_unwind(AssertUnwindSafe(|| {
            store.retain(|_, _| {
                calls += 1;
                assert!(calls < 6, "predicate failure");
                false
            });
        }));
        assert!(result.is_err());
        assert_eq!(store.len(), 5);
        assert_eq!(store.num_tombstones(), 5);
        assert_eq!(store.iter().len(), 5);
        assert_eq!(store.iter().count(), 5);

        store.retain(|_, _| false);
        assert!(store.is_empty());
        assert_eq!(store.num_tombstones(), 10);
    }

    #[test]
    fn rehash_panic() {
        let mut store: CompactStore<FragileKey, u64> = CompactStore::new();
        for key in 0..5 {
            assert!(store.add(FragileKey(key), key).is_ok());
        }
        assert_eq!(store.capacity(), 8);

        FAILING_KEY.store(2, Relaxed);
        let result = catch_unwind(AssertUnwindSafe(|| store.add(FragileKey(5), 5)));
        FAILING_KEY.store(u64::MAX, Relaxed);
        assert!(result.is_err());

        assert_eq!(store.capacity(), 16);
        assert!(store.len() < 5);
        assert_eq!(store.iter().count(), store.len());
        assert_eq!(store.num_tombstones(), 0);
        assert!(store.iter().all(|(k, v)| k.0 == *v && k.0 != 2));
        let remaining: Vec<u64> = store.keys().map(|k| k.0).collect();
        for key in remaining {
            assert_eq!(store.get(&FragileKey(key)), Some(&key));
        }

        assert!(store.add(FragileKey(2), 2).is_ok());
        assert!(store.add(FragileKey(5), 5).is_ok());
        assert_eq!(store.iter().count(), store.len());
    }

    #[test]
    fn get_or_insert_with() {
        let mut store: CompactStore<u64, Vec<u64>> = CompactStore::new();
        for key in 0..64 {
            store.get_or_insert_with(key % 8, Vec::new).push(key);
        }
        assert_eq!(store.len(), 8);
        assert_eq!(store.get(&3), Some(&(0..8).map(|i| i * 8 + 3).collect::<Vec<u64>>()));
        *store.get_mut(&3).unwrap() = Vec::new();
        assert_eq!(store[&3], Vec::<u64>::new());
    }

    #[test]
    #[should_panic(expected = "key not found")]
    fn index_absent() {
        let store: CompactStore<u64, u64> = CompactStore::new();
        let _v = store[&1];
    }

    #[test]
    fn string_key() {
        let mut store: CompactStore<String, u32> = CompactStore::new();
        for i in 0..256 {
            assert!(store.add(format!("node-{i}"), i).is_ok());
        }
        for i in 0..256 {
            let key = format!("node-{i}");
            assert_eq!(store.get(key.as_str()), Some(&i));
            assert_eq!(store.get_key_value(key.as_str()), Some((&key, &i)));
        }
        assert_eq!(store.remove("node-7"), Some(("node-7".to_owned(), 7)));
        assert!(!store.contains_key("node-7"));
    }

    #[test]
    fn iterators() {
        let mut store: CompactStore<u64, u64> = CompactStore::new();
        for key in 0..100 {
            assert!(store.add(key, key).is_ok());
        }
        for key in 0..50 {
            assert!(store.remove(&key).is_some());
        }

        let iter = store.iter();
        assert_eq!(iter.len(), 50);
        let mut keys: Vec<u64> = store.keys().copied().collect();
        keys.sort_unstable();
        assert_eq!(keys, (50..100).collect::<Vec<_>>());
        assert_eq!(store.values().sum::<u64>(), (50..100).sum());

        for (k, v) in &mut store {
            *v = k * 2;
        }
        assert!((&store).into_iter().all(|(k, v)| *v == k * 2));

        let mut into_iter = store.into_iter();
        assert_eq!(into_iter.len(), 50);
        assert!(into_iter.next().is_some());
        assert_eq!(into_iter.len(), 49);
        assert_eq!(into_iter.count(), 49);
    }

    #[test]
    fn clone_extend() {
        let mut store: CompactStore<u64, String> = CompactStore::new();
        for key in 0..32 {
            assert!(store.add(key, key.to_string()).is_ok());
        }
        assert!(store.remove(&0).is_some());

        let mut cloned = store.clone();
        assert_eq!(cloned, store);
        assert_eq!(cloned.num_tombstones(), store.num_tombstones());
        assert_eq!(cloned.capacity(), store.capacity());

        cloned.extend((0..64).map(|k| (k, String::new())));
        assert_eq!(cloned.len(), 64);
        assert_ne!(cloned, store);
        assert_eq!(store.get(&1), Some(&"1".to_owned()));
        assert_eq!(store.len(), 31);
    }

    #[test]
    fn debug() {
        let mut store: CompactStore<u64, u64> = CompactStore::new();
        assert!(store.add(1, 2).is_ok());
        assert_eq!(format!("{store:?}"), "{1: 2}");
        let err = store.add(1, 3).unwrap_err();
        assert_eq!(format!("{err:?}"), "DuplicateKeyError { key: 1, .. }");

        assert_eq!(format!("{:?}", store.iter()), "Iter { remaining: 1, .. }");
        assert_eq!(format!("{:?}", store.iter_mut()), "IterMut { remaining: 1, .. }");
        let opaque: CompactStore<u64, Rc<dyn Fn()>> = CompactStore::new();
        assert_eq!(format!("{:?}", opaque.into_iter()), "IntoIter { remaining: 0, .. }");
    }

    #[test]
    fn drop_accounting() {
        static INST_CNT: AtomicUsize = AtomicUsize::new(0);
        let workload_size = 1024;
        let mut store: CompactStore<usize, R> = CompactStore::new();
        for k in 0..workload_size {
            assert!(store.add(k, R::new(&INST_CNT)).is_ok());
        }
        assert_eq!(INST_CNT.load(Relaxed), workload_size);

        let rejected = store.add(0, R::new(&INST_CNT));
        assert!(rejected.is_err());
        drop(rejected);
        assert_eq!(INST_CNT.load(Relaxed), workload_size);

        assert!(matches!(store.set(0, R::new(&INST_CNT)), SetResult::Replaced(_)));
        assert_eq!(INST_CNT.load(Relaxed), workload_size);

        for k in 0..workload_size / 4 {
            assert!(store.remove(&k).is_some());
        }
        assert_eq!(INST_CNT.load(Relaxed), workload_size / 4 * 3);

        store.retain(|k, _| k % 2 == 0);
        assert_eq!(INST_CNT.load(Relaxed), store.len());

        let cloned = store.clone();
        assert_eq!(INST_CNT.load(Relaxed), store.len() * 2);
        drop(cloned);

        for k in workload_size..workload_size * 2 {
            assert!(store.add(k, R::new(&INST_CNT)).is_ok());
        }
        assert_eq!(INST_CNT.load(Relaxed), store.len());

        let mut into_iter = store.into_iter();
        assert!(into_iter.next().is_some());
        drop(into_iter);
        assert_eq!(INST_CNT.load(Relaxed), 0);

        let mut store: CompactStore<usize, R> = CompactStore::new();
        for k in 0..workload_size {
            assert!(store.add(k, R::new(&INST_CNT)).is_ok());
        }
        store.clear();
        assert_eq!(INST_CNT.load(Relaxed), 0);
        assert!(store.add(0, R::new(&INST_CNT)).is_ok());
        drop(store);
        assert_eq!(INST_CNT.load(Relaxed), 0);
    }
}
