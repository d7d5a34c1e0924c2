use lazyshard::ShardMap;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

fn snapshot(map: &ShardMap<u8, u16>) -> BTreeMap<u8, u16> {
    map.iter().map(|(k, v)| (k, *v)).collect()
}

#[test]
fn test_reject_set_on_absent_key() {
    let map = ShardMap::new();
    assert!(map.set_accept("k", 1, |_| false).is_none());
    assert!(map.get(&"k").is_none());
    assert_eq!(map.len(), 0);
}

#[test]
fn test_reject_set_on_existing_key() {
    let map = ShardMap::new();
    map.set("k", 1);
    assert!(map.set_accept("k", 2, |_| false).is_none());
    assert_eq!(*map.get(&"k").unwrap(), 1);
    assert_eq!(map.len(), 1);
}

#[test]
fn test_reject_delete_on_existing_key() {
    let map = ShardMap::new();
    map.set("k", 1);
    assert!(map.delete_accept(&"k", |_| false).is_none());
    assert_eq!(*map.get(&"k").unwrap(), 1);
}

#[test]
fn test_reject_delete_on_absent_key() {
    let map: ShardMap<&str, i32> = ShardMap::new();
    assert!(map.delete_accept(&"k", |_| false).is_none());
    assert!(map.is_empty());
}

#[test]
fn test_accept_behaves_like_plain_ops() {
    let map = ShardMap::new();

    assert!(map.set_accept("k", 1, |_| true).is_none());
    assert_eq!(*map.set_accept("k", 2, |_| true).unwrap(), 1);
    assert_eq!(*map.get(&"k").unwrap(), 2);

    assert_eq!(*map.delete_accept(&"k", |_| true).unwrap(), 2);
    assert!(map.get(&"k").is_none());
    assert!(map.delete_accept(&"k", |_| true).is_none());
}

#[test]
fn test_callback_sees_previous_value() {
    let map = ShardMap::new();

    let mut seen = Vec::new();
    map.set_accept("k", 1, |prev| {
        seen.push(prev.copied());
        true
    });
    map.set_accept("k", 2, |prev| {
        seen.push(prev.copied());
        true
    });
    map.delete_accept(&"k", |prev| {
        seen.push(prev.copied());
        false
    });
    map.delete_accept(&"missing", |prev| {
        seen.push(prev.copied());
        true
    });

    assert_eq!(seen, vec![None, Some(1), Some(2), None]);
}

#[test]
fn test_callback_runs_once() {
    let map = ShardMap::new();
    let mut calls = 0;
    map.set_accept(1u32, 1u32, |_| {
        calls += 1;
        false
    });
    map.delete_accept(&1u32, |_| {
        calls += 1;
        true
    });
    assert_eq!(calls, 2);
}

#[test]
fn test_rejection_keeps_original_arc() {
    let map = ShardMap::new();
    map.set("k", String::from("original"));
    let before = map.get(&"k").unwrap();

    map.set_accept("k", String::from("replacement"), |_| false);
    assert!(Arc::ptr_eq(&before, &map.get(&"k").unwrap()));

    map.delete_accept(&"k", |_| false);
    assert!(Arc::ptr_eq(&before, &map.get(&"k").unwrap()));
}

#[test]
fn test_rejection_leaves_other_keys_alone() {
    let map: ShardMap<u32, u32> = ShardMap::new();
    for i in 0..100 {
        map.set(i, i);
    }
    for i in 0..150 {
        map.set_accept(i, 1000 + i, |_| false);
        map.delete_accept(&i, |_| false);
    }
    assert_eq!(map.len(), 100);
    for i in 0..100 {
        assert_eq!(*map.get(&i).unwrap(), i);
    }
}

proptest! {
    #[test]
    fn rejected_set_restores_map(
        initial in proptest::collection::vec((any::<u8>(), any::<u16>()), 0..64),
        key in any::<u8>(),
        value in any::<u16>(),
    ) {
        let map = ShardMap::new();
        for (k, v) in &initial {
            map.set(*k, *v);
        }
        let before = snapshot(&map);

        let result = map.set_accept(key, value, |prev| {
            assert_eq!(prev.copied(), before.get(&key).copied());
            false
        });

        prop_assert!(result.is_none());
        prop_assert_eq!(snapshot(&map), before);
    }

    #[test]
    fn rejected_delete_restores_map(
        initial in proptest::collection::vec((any::<u8>(), any::<u16>()), 0..64),
        key in any::<u8>(),
    ) {
        let map = ShardMap::new();
        for (k, v) in &initial {
            map.set(*k, *v);
        }
        let before = snapshot(&map);

        let result = map.delete_accept(&key, |_| false);

        prop_assert!(result.is_none());
        prop_assert_eq!(snapshot(&map), before);
    }

    #[test]
    fn accepted_ops_match_plain_ops(
        ops in proptest::collection::vec((any::<bool>(), 0u8..16, any::<u16>()), 0..128),
    ) {
        let accepting = ShardMap::new();
        let plain = ShardMap::new();
        for (is_set, key, value) in ops {
            if is_set {
                let a = accepting.set_accept(key, value, |_| true).map(|v| *v);
                let p = plain.set(key, value).map(|v| *v);
                prop_assert_eq!(a, p);
            } else {
                let a = accepting.delete_accept(&key, |_| true).map(|v| *v);
                let p = plain.delete(&key).map(|v| *v);
                prop_assert_eq!(a, p);
            }
        }
        prop_assert_eq!(snapshot(&accepting), snapshot(&plain));
        prop_assert_eq!(accepting.len(), plain.len());
    }
}
