use lockmap::LockMap;

#[test]
fn insert_once() {
    let map = LockMap::with_capacity(256);
    map.insert(3i32, 6i32);
    assert_eq!(map.get_required(&3), Ok(6));
}

#[test]
fn insert_many() {
    const ITER: i32 = 1024 * 1024;
    let map = LockMap::with_capacity((ITER as usize).next_power_of_two());

    for i in 0..ITER {
        map.insert(i, i + 7);
    }

    assert_eq!(map.len(), ITER as usize);
    assert_eq!(map.get_required(&(ITER - 1)), Ok(ITER + 6));
}

#[test]
fn insert_remove_interleaved() {
    let map = LockMap::with_capacity(16);

    for i in 0..4096u32 {
        map.insert(i, i);
        if i % 3 == 0 {
            assert_eq!(map.remove(&(i / 2)), Some(i / 2));
        }
    }

    for i in 0..4096u32 {
        let removed = [2 * i, 2 * i + 1].iter().any(|&j| j < 4096 && j % 3 == 0);
        assert_eq!(map.contains_key(&i), !removed, "key {i}");
    }
}
