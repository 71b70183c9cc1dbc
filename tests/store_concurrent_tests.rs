// Store concurrent access tests
// Readers, writers and savers sharing one store across threads.

use std::sync::Arc;
use std::thread;

use memodocs::{Document, Predicate, Store, Value};

// =============================================================================
// Test 1: Concurrent writers on disjoint keys lose nothing
// =============================================================================
#[test]
fn concurrent_writers_disjoint_keys() {
    let store = Arc::new(Store::in_memory());
    let mut handles = vec![];

    for t in 0..8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                let key = format!("t{t}-{i:03}");
                store
                    .insert(&key, Document::new().with("thread", t).with("i", i))
                    .unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(store.len(), 800);
    assert_eq!(store.sequence(), 800);
}

// =============================================================================
// Test 2: Only one insert of the same key wins
// =============================================================================
#[test]
fn racing_inserts_on_same_key() {
    let store = Arc::new(Store::in_memory());
    let mut handles = vec![];

    for t in 0..8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            store.insert("contested", Document::new().with("winner", t)).is_ok()
        }));
    }
    let wins = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();

    assert_eq!(wins, 1);
    assert_eq!(store.len(), 1);
}

// =============================================================================
// Test 3: Readers always see an index consistent with the data
// =============================================================================
#[test]
fn readers_see_consistent_index() {
    let store = Arc::new(Store::in_memory());
    store.create_index("status").unwrap();
    for i in 0..50 {
        store
            .insert(&format!("k{i:02}"), Document::new().with("status", "open"))
            .unwrap();
    }

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for round in 0..20 {
                let status = if round % 2 == 0 { "closed" } else { "open" };
                for i in 0..50 {
                    store
                        .update(&format!("k{i:02}"), Document::new().with("status", status))
                        .unwrap();
                }
            }
        })
    };

    let mut readers = vec![];
    for _ in 0..4 {
        let store = Arc::clone(&store);
        readers.push(thread::spawn(move || {
            for _ in 0..50 {
                for (_, doc) in store.query(&Predicate::eq("status", "open")).unwrap() {
                    assert_eq!(doc.get("status"), Some(&Value::from("open")));
                }
            }
        }));
    }

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(store.query(&Predicate::eq("status", "open")).unwrap().len(), 50);
}

// =============================================================================
// Test 4: Save during writes captures a consistent state
// =============================================================================
#[test]
fn save_while_writing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("live.snapshot");
    let store = Arc::new(Store::in_memory());

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..500 {
                store
                    .insert(&format!("k{i:03}"), Document::new().with("i", i))
                    .unwrap();
            }
        })
    };

    let saver = {
        let store = Arc::clone(&store);
        let path = path.clone();
        thread::spawn(move || {
            for _ in 0..5 {
                store.save(&path).unwrap();
            }
        })
    };

    writer.join().unwrap();
    saver.join().unwrap();

    // whatever was captured is a prefix of the insert order
    let loaded = Store::in_memory();
    loaded.load(&path).unwrap();
    let n = loaded.len();
    assert_eq!(loaded.sequence(), n as u64);
    let expected: Vec<String> = (0..n).map(|i| format!("k{i:03}")).collect();
    assert_eq!(loaded.keys(), expected);
}
