fn main() {
    tracing_subscriber::fmt::init();
    exchange(4).run::<LockMapTable<u64>>();
    read_heavy(4).run::<LockMapTable<u64>>();
}

use bustle::*;
use lockmap::LockMap;
use std::sync::Arc;

fn ex_mix() -> Mix {
    Mix {
        read: 5,
        insert: 45,
        remove: 45,
        update: 5,
        upsert: 0,
    }
}

fn read_mix() -> Mix {
    Mix {
        read: 94,
        insert: 2,
        remove: 1,
        update: 3,
        upsert: 0,
    }
}

fn exchange(n: usize) -> Workload {
    *Workload::new(n, ex_mix())
        .initial_capacity_log2(24)
        .prefill_fraction(0.6)
        .operations(200.0)
}

fn read_heavy(n: usize) -> Workload {
    *Workload::new(n, read_mix())
        .initial_capacity_log2(20)
        .prefill_fraction(0.6)
        .operations(20.0)
}

#[derive(Clone)]
pub struct LockMapTable<K>(Arc<LockMap<K, u32>>);

impl<K> Collection for LockMapTable<K>
where
    K: Send + Sync + From<u64> + Copy + 'static + std::hash::Hash + Eq + std::fmt::Debug,
{
    type Handle = Self;
    fn with_capacity(capacity: usize) -> Self {
        Self(Arc::new(LockMap::with_capacity(capacity.next_power_of_two())))
    }

    fn pin(&self) -> Self::Handle {
        self.clone()
    }
}

impl<K> CollectionHandle for LockMapTable<K>
where
    K: Send + Sync + From<u64> + Copy + 'static + std::hash::Hash + Eq + std::fmt::Debug,
{
    type Key = K;

    fn get(&mut self, key: &Self::Key) -> bool {
        self.0.with_value(key, |_| ()).is_some()
    }

    fn insert(&mut self, key: &Self::Key) -> bool {
        !self.0.contains_or_insert(*key, 0)
    }

    fn remove(&mut self, key: &Self::Key) -> bool {
        self.0.remove(key).is_some()
    }

    fn update(&mut self, key: &Self::Key) -> bool {
        self.0.with_value(key, |v| *v += 1).is_some()
    }
}
