// LockMap model tests.
//
// Every property drives a LockMap and a hashbrown::HashMap side by side and
// compares them after each step. Keys go through a hasher that throws most of
// the bits away so that long collision clusters, wrap-around and growth in the
// middle of a cluster all show up in small runs.
use hashbrown::HashMap;
use lockmap::{Action, KeyNotFound, LockMap};
use proptest::prelude::*;
use std::hash::{BuildHasherDefault, Hasher};

#[derive(Default)]
struct CrowdingHasher(u64);

impl Hasher for CrowdingHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = self.0.wrapping_mul(31).wrapping_add(b as u64);
        }
    }

    fn write_u16(&mut self, n: u16) {
        // Only eight distinct home slots for all keys.
        self.0 = (n % 8) as u64;
    }
}

type Crowded = BuildHasherDefault<CrowdingHasher>;

fn op_strategy() -> impl Strategy<Value = Vec<(u8, u16, u32)>> {
    proptest::collection::vec((0u8..6, 0u16..64, any::<u32>()), 1..400)
}

proptest! {
    #[test]
    fn prop_matches_hashmap(capacity_log2 in 0u32..5, ops in op_strategy()) {
        let map: LockMap<u16, u32, Crowded> =
            LockMap::with_capacity_and_hasher(1 << capacity_log2, Crowded::default());
        let mut model: HashMap<u16, u32> = HashMap::new();

        for (op, key, value) in ops {
            match op {
                0 => {
                    prop_assert_eq!(map.insert(key, value), model.insert(key, value));
                }
                1 => {
                    prop_assert_eq!(map.remove(&key), model.remove(&key));
                }
                2 => {
                    let expected = model.get(&key).copied().ok_or(KeyNotFound);
                    prop_assert_eq!(map.get_required(&key), expected);
                }
                3 => {
                    // Increment odd values, delete even ones, insert when absent.
                    let result = map.compute(key, |_, v| match v {
                        Some(v) if v % 2 == 0 => (None, Action::Delete),
                        Some(v) => (Some(v.wrapping_add(1)), Action::Keep),
                        None => (Some(value), Action::Keep),
                    });
                    let expected = match model.get(&key).copied() {
                        Some(v) if v % 2 == 0 => {
                            model.remove(&key);
                            None
                        }
                        Some(v) => {
                            model.insert(key, v.wrapping_add(1));
                            Some(v.wrapping_add(1))
                        }
                        None => {
                            model.insert(key, value);
                            Some(value)
                        }
                    };
                    prop_assert_eq!(result, expected);
                }
                4 => {
                    let present = model.contains_key(&key);
                    model.entry(key).or_insert(value);
                    prop_assert_eq!(map.contains_or_insert(key, value), present);
                }
                5 => {
                    let expected = model.get_mut(&key).map(|v| {
                        *v ^= value;
                        *v
                    });
                    prop_assert_eq!(map.with_value(&key, |v| { *v ^= value; *v }), expected);
                }
                _ => unreachable!(),
            }

            prop_assert_eq!(map.len(), model.len());
            prop_assert!(map.capacity().is_power_of_two());
            prop_assert!(map.len() < map.capacity());
        }

        for (key, value) in &model {
            prop_assert_eq!(map.get_required(key), Ok(*value));
        }
    }

    #[test]
    fn prop_add_counts_duplicates(ops in proptest::collection::vec((any::<bool>(), 0u16..16), 1..300)) {
        let map: LockMap<u16, (), Crowded> =
            LockMap::with_capacity_and_hasher(4, Crowded::default());
        let mut counts: HashMap<u16, usize> = HashMap::new();

        for (add, key) in ops {
            let count = counts.entry(key).or_default();
            if add {
                map.add(key, ());
                *count += 1;
            } else {
                prop_assert_eq!(map.remove(&key).is_some(), *count > 0);
                *count = count.saturating_sub(1);
            }

            prop_assert_eq!(map.contains_key(&key), *count > 0);
            prop_assert_eq!(map.len(), counts.values().sum::<usize>());
        }
    }

    #[test]
    fn prop_removal_keeps_other_keys(keys in proptest::collection::hash_set(0u16..512, 1..128)) {
        let map: LockMap<u16, u16, Crowded> =
            LockMap::with_capacity_and_hasher(2, Crowded::default());
        for &key in &keys {
            map.insert(key, key);
        }

        let mut remaining: Vec<u16> = keys.into_iter().collect();
        while let Some(victim) = remaining.pop() {
            prop_assert_eq!(map.remove(&victim), Some(victim));
            for key in &remaining {
                prop_assert_eq!(map.get_required(key), Ok(*key));
            }
        }

        prop_assert!(map.is_empty());
    }
}
