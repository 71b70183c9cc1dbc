// Store CRUD tests
// Insert, get, update, upsert, delete and conditional updates through the
// public Store API.

use memodocs::{Document, Error, Store, Value};

fn user(name: &str, age: i32) -> Document {
    Document::new().with("name", name).with("age", age)
}

// =============================================================================
// Test 1: Insert then get returns an equal document
// =============================================================================
#[test]
fn insert_then_get() {
    let store = Store::in_memory();
    let doc = user("Alice", 30)
        .with("tags", vec!["admin", "ops"])
        .with("address", Document::new().with("city", "Oslo"));

    let seq = store.insert("user1", doc.clone()).unwrap();
    assert_eq!(seq, 1);
    assert_eq!(store.get("user1").unwrap(), doc);
    assert_eq!(store.len(), 1);
    assert!(store.contains_key("user1"));
}

// =============================================================================
// Test 2: Insert on a live key fails and keeps the original
// =============================================================================
#[test]
fn insert_duplicate_key_fails() {
    let store = Store::in_memory();
    store.insert("user1", user("Alice", 30)).unwrap();

    let err = store.insert("user1", user("Mallory", 99)).unwrap_err();
    assert!(matches!(err, Error::DuplicateKey(ref k) if k == "user1"));
    assert_eq!(store.get("user1").unwrap(), user("Alice", 30));
    assert_eq!(store.sequence(), 1);
}

// =============================================================================
// Test 3: Missing keys are NotFound for get, update and delete
// =============================================================================
#[test]
fn missing_key_is_not_found() {
    let store = Store::in_memory();
    assert!(matches!(store.get("ghost"), Err(Error::NotFound(_))));
    assert!(matches!(store.update("ghost", user("x", 1)), Err(Error::NotFound(_))));
    assert!(matches!(store.delete("ghost"), Err(Error::NotFound(_))));
    assert_eq!(store.sequence(), 0);
}

// =============================================================================
// Test 4: Update replaces the whole document
// =============================================================================
#[test]
fn update_replaces_document() {
    let store = Store::in_memory();
    store.insert("user1", user("Alice", 30).with("temp", true)).unwrap();
    store.update("user1", user("Alice", 31)).unwrap();

    let doc = store.get("user1").unwrap();
    assert_eq!(doc.get("age"), Some(&Value::from(31)));
    assert!(!doc.contains_field("temp"));
}

// =============================================================================
// Test 5: Upsert inserts then replaces
// =============================================================================
#[test]
fn upsert_inserts_or_replaces() {
    let store = Store::in_memory();
    assert_eq!(store.upsert("k", user("A", 1)).unwrap(), 1);
    assert_eq!(store.upsert("k", user("B", 2)).unwrap(), 2);
    assert_eq!(store.get("k").unwrap(), user("B", 2));
    assert_eq!(store.len(), 1);
}

// =============================================================================
// Test 6: Delete returns the removed document and frees the key
// =============================================================================
#[test]
fn delete_returns_document() {
    let store = Store::in_memory();
    store.insert("user1", user("Alice", 30)).unwrap();

    let removed = store.delete("user1").unwrap();
    assert_eq!(removed, user("Alice", 30));
    assert!(store.is_empty());
    assert!(matches!(store.get("user1"), Err(Error::NotFound(_))));

    // the key can be reused after delete
    store.insert("user1", user("Bob", 40)).unwrap();
    assert_eq!(store.get("user1").unwrap(), user("Bob", 40));
}

// =============================================================================
// Test 7: Every mutation gets a strictly larger sequence
// =============================================================================
#[test]
fn sequences_are_monotonic() {
    let store = Store::in_memory();
    let a = store.insert("a", user("A", 1)).unwrap();
    let b = store.insert("b", user("B", 2)).unwrap();
    let c = store.update("a", user("A", 3)).unwrap();
    store.delete("b").unwrap();

    assert!(a < b && b < c);
    assert_eq!(store.sequence(), 4);
    assert_eq!(store.get_entry("a").unwrap().sequence, c);
}

// =============================================================================
// Test 8: Conditional update checks the entry sequence
// =============================================================================
#[test]
fn update_if_detects_concurrent_write() {
    let store = Store::in_memory();
    store.insert("k", user("A", 1)).unwrap();
    let seen = store.get_entry("k").unwrap().sequence;

    // someone else writes first
    store.update("k", user("B", 2)).unwrap();

    let err = store.update_if("k", seen, user("C", 3)).unwrap_err();
    match err {
        Error::SequenceMismatch { key, expected, actual } => {
            assert_eq!(key, "k");
            assert_eq!(expected, seen);
            assert_eq!(actual, 2);
        }
        other => panic!("unexpected error: {other}"),
    }

    let current = store.get_entry("k").unwrap().sequence;
    store.update_if("k", current, user("C", 3)).unwrap();
    assert_eq!(store.get("k").unwrap(), user("C", 3));
}

// =============================================================================
// Test 9: Non-finite numbers and over-deep documents are rejected
// =============================================================================
#[test]
fn invalid_documents_are_rejected() {
    let store = Store::in_memory();
    assert!(matches!(
        store.insert("nan", Document::new().with("x", f64::NAN)),
        Err(Error::Type(_))
    ));

    let mut deep = Document::new().with("leaf", 1);
    for _ in 0..memodocs::document::MAX_NESTING_DEPTH + 1 {
        deep = Document::new().with("inner", deep);
    }
    assert!(matches!(store.insert("deep", deep), Err(Error::Validation(_))));
    assert!(store.is_empty());
}

// =============================================================================
// Test 10: get returns a copy; mutating it does not touch the store
// =============================================================================
#[test]
fn get_returns_independent_copy() {
    let store = Store::in_memory();
    store.insert("k", user("A", 1)).unwrap();

    let mut copy = store.get("k").unwrap();
    copy.insert("age", 99);
    assert_eq!(store.get("k").unwrap(), user("A", 1));
}

// =============================================================================
// Test 11: get_all and keys are ordered by key
// =============================================================================
#[test]
fn get_all_is_key_ordered() {
    let store = Store::in_memory();
    for key in ["charlie", "alice", "bob"] {
        store.insert(key, user(key, 1)).unwrap();
    }

    assert_eq!(store.keys(), vec!["alice", "bob", "charlie"]);
    let all = store.get_all();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].0, "alice");
    assert_eq!(all[0].1, user("alice", 1));
}

// =============================================================================
// Test 12: Documents round-trip through JSON
// =============================================================================
#[test]
fn json_documents_store_and_return() {
    let store = Store::in_memory();
    let doc = Document::from_json_str(r#"{"name": "Alice", "age": 30, "tags": ["a", null]}"#).unwrap();
    store.insert("user1", doc).unwrap();

    let json = store.get("user1").unwrap().to_json();
    assert_eq!(json["name"], "Alice");
    assert_eq!(json["age"], 30);
    assert!(json["tags"][1].is_null());
}

// =============================================================================
// Test 13: Field order from a JSON literal survives storage
// =============================================================================
#[test]
fn json_field_order_is_kept() {
    let store = Store::in_memory();
    let doc = Document::from_json_str(r#"{"name": "Alice", "zeta": 1, "age": 30}"#).unwrap();
    store.insert("user1", doc).unwrap();

    let fetched = store.get("user1").unwrap();
    assert_eq!(fetched.fields().collect::<Vec<_>>(), vec!["name", "zeta", "age"]);
    let walked: Vec<String> = fetched.walk().iter().map(|(path, _)| path.to_string()).collect();
    assert_eq!(walked, vec!["name", "zeta", "age"]);
}
