//! Concurrent sets, rejected updates and deletes, then verify state and introspection.

use lazyshard::ShardMap;
use std::sync::Arc;
use std::thread;

#[test]
fn test_under_load_then_introspect() {
    let map = Arc::new(ShardMap::new());
    let mut handles = vec![];

    for t in 0..4 {
        let map = Arc::clone(&map);
        handles.push(thread::spawn(move || {
            for i in 0..2000 {
                let key = format!("t{}_k{}", t, i);
                map.set(key, i);
            }
            for i in 0..2000 {
                let key = format!("t{}_k{}", t, i);
                // Rejected deletes must leave the entry in place.
                assert!(map.delete_accept(key.as_str(), |_| false).is_none());
                assert_eq!(*map.get(key.as_str()).unwrap(), i);
            }
            for i in 0..2000 {
                let key = format!("t{}_k{}", t, i);
                let _ = map.delete(key.as_str());
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(map.is_empty());
    assert_eq!(map.len(), 0);
    let loads = map.shard_loads();
    assert_eq!(loads.len(), map.shard_count());
    assert_eq!(loads.iter().sum::<usize>(), 0);
}
