// Query and secondary index tests
// Predicates through the Store, index maintenance across mutations, and the
// plans chosen for indexed and unindexed fields.

use memodocs::{Document, Error, Plan, Predicate, Store, Value};

fn user(name: &str, age: i32, city: &str) -> Document {
    Document::new()
        .with("name", name)
        .with("age", age)
        .with("address", Document::new().with("city", city))
}

fn populated() -> Store {
    let store = Store::in_memory();
    store.insert("u1", user("Alice", 30, "Oslo")).unwrap();
    store.insert("u2", user("Bob", 25, "Bergen")).unwrap();
    store.insert("u3", user("Carol", 30, "Bergen")).unwrap();
    store.insert("u4", user("Dave", 41, "Oslo")).unwrap();
    store
}

fn keys(store: &Store, predicate: &Predicate) -> Vec<String> {
    store.query(predicate).unwrap().keys()
}

// =============================================================================
// Test 1: Index follows an update (age 30 -> 31)
// =============================================================================
#[test]
fn index_follows_update() {
    let store = Store::in_memory();
    store
        .insert("user1", Document::new().with("name", "Alice").with("age", 30))
        .unwrap();
    assert!(store.create_index("age").unwrap());

    let hits: Vec<_> = store.query(&Predicate::eq("age", 30)).unwrap().collect();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "user1");
    assert_eq!(hits[0].1.get("name"), Some(&Value::from("Alice")));

    store
        .update("user1", Document::new().with("name", "Alice").with("age", 31))
        .unwrap();
    assert!(keys(&store, &Predicate::eq("age", 30)).is_empty());
    assert_eq!(keys(&store, &Predicate::eq("age", 31)), vec!["user1"]);
}

// =============================================================================
// Test 2: Delete removes the key from every index
// =============================================================================
#[test]
fn delete_clears_index_entries() {
    let store = populated();
    store.create_index("age").unwrap();
    store.create_index("address.city").unwrap();

    store.delete("u1").unwrap();
    assert_eq!(keys(&store, &Predicate::eq("age", 30)), vec!["u3"]);
    assert_eq!(keys(&store, &Predicate::eq("address.city", "Oslo")), vec!["u4"]);
}

// =============================================================================
// Test 3: Indexed and unindexed queries agree
// =============================================================================
#[test]
fn indexed_and_scanned_results_agree() {
    let predicates = [
        Predicate::eq("age", 30),
        Predicate::in_set("age", [25, 41]),
        Predicate::eq("age", 30).and(Predicate::eq("address.city", "Bergen")),
        Predicate::eq("age", 25).or(Predicate::eq("address.city", "Oslo")),
        Predicate::eq("age", 30).and(Predicate::gt("name", "B")),
        !Predicate::eq("age", 30),
    ];

    let plain = populated();
    let indexed = populated();
    indexed.create_index("age").unwrap();
    indexed.create_index("address.city").unwrap();

    for predicate in &predicates {
        assert_eq!(
            keys(&plain, predicate),
            keys(&indexed, predicate),
            "mismatch for {predicate:?}"
        );
    }
}

// =============================================================================
// Test 4: Comparisons and existence
// =============================================================================
#[test]
fn range_and_exists_predicates() {
    let store = populated();
    store
        .insert("u5", Document::new().with("name", "Eve").with("age", "unknown"))
        .unwrap();

    assert_eq!(keys(&store, &Predicate::gt("age", 29)), vec!["u1", "u3", "u4"]);
    assert_eq!(keys(&store, &Predicate::lte("age", 30)), vec!["u1", "u2", "u3"]);
    assert_eq!(keys(&store, &Predicate::exists("address.city")).len(), 4);
    // a string never compares with a number
    assert!(!keys(&store, &Predicate::gt("age", 0)).contains(&"u5".to_string()));
    assert_eq!(keys(&store, &Predicate::lt("age", "zzz")), vec!["u5"]);
}

// =============================================================================
// Test 5: Values of different kinds never match each other
// =============================================================================
#[test]
fn string_and_number_do_not_collide() {
    let store = Store::in_memory();
    store.create_index("v").unwrap();
    store.insert("num", Document::new().with("v", 30)).unwrap();
    store.insert("str", Document::new().with("v", "30")).unwrap();
    store.insert("bool", Document::new().with("v", true)).unwrap();

    assert_eq!(keys(&store, &Predicate::eq("v", 30)), vec!["num"]);
    assert_eq!(keys(&store, &Predicate::eq("v", "30")), vec!["str"]);
    assert_eq!(keys(&store, &Predicate::eq("v", true)), vec!["bool"]);
    assert_eq!(keys(&store, &Predicate::ne("v", 30)), vec!["bool", "str"]);
}

// =============================================================================
// Test 6: Nested paths through arrays
// =============================================================================
#[test]
fn array_index_paths() {
    let store = Store::in_memory();
    store
        .insert(
            "order1",
            Document::new().with(
                "items",
                Value::Array(vec![
                    Document::new().with("sku", "A-1").into(),
                    Document::new().with("sku", "B-2").into(),
                ]),
            ),
        )
        .unwrap();
    store.create_index("items.1.sku").unwrap();

    assert_eq!(keys(&store, &Predicate::eq("items.1.sku", "B-2")), vec!["order1"]);
    assert!(keys(&store, &Predicate::eq("items.1.sku", "A-1")).is_empty());
    // out-of-range index is a non-match, not an error
    assert!(keys(&store, &Predicate::exists("items.5.sku")).is_empty());
}

// =============================================================================
// Test 7: Plan selection
// =============================================================================
#[test]
fn explain_picks_index_when_available() {
    let store = populated();
    assert_eq!(store.explain(&Predicate::eq("age", 30)).unwrap(), Plan::FullScan);

    store.create_index("age").unwrap();
    store.create_index("address.city").unwrap();

    let plan = store.explain(&Predicate::eq("age", 30)).unwrap();
    assert!(matches!(plan, Plan::IndexLookup { estimate: 2, .. }));

    // smaller bucket first: one Dave (41) vs two in Oslo
    let plan = store
        .explain(&Predicate::eq("address.city", "Oslo").and(Predicate::eq("age", 41)))
        .unwrap();
    match plan {
        Plan::Intersect(children) => {
            assert_eq!(children[0].estimate(), Some(1));
            assert_eq!(children[1].estimate(), Some(2));
        }
        other => panic!("expected intersection, got {other}"),
    }

    // an OR with an unindexed branch has to scan
    let plan = store
        .explain(&Predicate::eq("age", 41).or(Predicate::eq("name", "Bob")))
        .unwrap();
    assert_eq!(plan, Plan::FullScan);
}

// =============================================================================
// Test 8: Index management
// =============================================================================
#[test]
fn create_and_drop_index() {
    let store = populated();
    assert!(store.create_index("age").unwrap());
    assert!(!store.create_index("age").unwrap());
    store.create_index("address.city").unwrap();
    assert_eq!(store.indexes(), vec!["address.city", "age"]);

    store.drop_index("age").unwrap();
    assert_eq!(store.indexes(), vec!["address.city"]);
    assert!(matches!(store.drop_index("age"), Err(Error::NotFound(_))));

    // queries still work without the index
    assert_eq!(keys(&store, &Predicate::eq("age", 30)), vec!["u1", "u3"]);
}

// =============================================================================
// Test 9: Results are a snapshot of the moment the query ran
// =============================================================================
#[test]
fn results_do_not_see_later_writes() {
    let store = populated();
    let results = store.query(&Predicate::eq("age", 30)).unwrap();
    store.delete("u1").unwrap();
    store.insert("u9", user("Zed", 30, "Oslo")).unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results.keys(), vec!["u1", "u3"]);
}

// =============================================================================
// Test 10: Malformed paths are errors, unresolvable ones are non-matches
// =============================================================================
#[test]
fn malformed_path_is_error() {
    let store = populated();
    assert!(matches!(
        store.query(&Predicate::eq("address..city", "Oslo")),
        Err(Error::Path(_))
    ));
    assert!(keys(&store, &Predicate::eq("address.city.zip", "0150")).is_empty());
    assert!(keys(&store, &Predicate::eq("nope", 1)).is_empty());
}
