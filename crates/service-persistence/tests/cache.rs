#![cfg(not(feature = "pg"))]
use indexmap::IndexMap;
use serde_json::{json, Value};
use service_core::{ExpiringCache, ManualClock};
use service_persistence::{DieselCache, Storage};
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::TempDb;

// The db guard comes first so it outlives the storage.
fn cache_at(start: i64) -> (TempDb, Storage, Arc<ManualClock>) {
  let db = TempDb::new("service_cache_test");
  let clock = Arc::new(ManualClock::new(start));
  let storage = Storage::open_with_clock(db.config(), clock.clone());
  (db, storage, clock)
}

#[test]
fn ttl_expiry_follows_the_clock() {
  let (_db, storage, clock) = cache_at(1_700_000_000);
  let cache: &DieselCache = &storage.cache;
  assert!(cache.set("some_test_key", &json!("some_test_value"), Some(Duration::from_secs(5))).unwrap());
  assert_eq!(cache.get("some_test_key", Value::Null).unwrap(), json!("some_test_value"));
  clock.advance(5);
  assert!(cache.has("some_test_key").unwrap());
  clock.advance(1);
  assert!(!cache.has("some_test_key").unwrap());
  assert_eq!(cache.get("some_test_key", json!(false)).unwrap(), json!(false));

  // upsert revives the key with a fresh expiry
  assert!(cache.set("some_test_key", &json!({"n": [1, 2]}), Some(Duration::from_secs(60))).unwrap());
  assert_eq!(cache.get("some_test_key", Value::Null).unwrap(), json!({"n": [1, 2]}));
}

#[test]
fn write_without_ttl_is_never_visible() {
  let (_db, storage, _) = cache_at(1_700_000_000);
  let cache = &storage.cache;
  assert!(cache.set("no_ttl", &json!(1), None).unwrap());
  assert!(!cache.has("no_ttl").unwrap());
  assert!(cache.get_multiple(&["no_ttl"]).unwrap().is_empty());
  assert!(cache.delete("no_ttl").unwrap());
  assert!(!cache.delete("no_ttl").unwrap());
}

#[test]
fn reserved_characters_are_rejected_without_error() {
  let (_db, storage, _) = cache_at(1_700_000_000);
  let cache = &storage.cache;
  for key in ["${bolVal}", "${result.value}", "a/b", "user@host"] {
    assert!(!cache.set(key, &json!(1), Some(Duration::from_secs(60))).unwrap());
    assert_eq!(cache.get(key, json!("dflt")).unwrap(), json!("dflt"));
    assert!(!cache.has(key).unwrap());
    assert!(!cache.delete(key).unwrap());
  }
}

#[test]
fn bulk_operations() {
  let (_db, storage, clock) = cache_at(1_700_000_000);
  let cache = &storage.cache;
  let mut values = IndexMap::new();
  values.insert("key_1".to_string(), json!("value_1"));
  values.insert("key_2".to_string(), json!({"deep": true}));
  values.insert("key_3".to_string(), json!(3));
  assert!(cache.set_multiple(&values, Some(Duration::from_secs(10))).unwrap());

  let hits = cache.get_multiple(&["key_2", "missing", "key_1", "${bad}"]).unwrap();
  assert_eq!(hits.keys().cloned().collect::<Vec<_>>(), vec!["key_2".to_string(), "key_1".to_string()]);
  assert_eq!(hits["key_2"], json!({"deep": true}));

  let mut mixed = IndexMap::new();
  mixed.insert("key_4".to_string(), json!(4));
  mixed.insert("bad:key".to_string(), json!(5));
  assert!(!cache.set_multiple(&mixed, Some(Duration::from_secs(10))).unwrap());
  assert!(!cache.has("key_4").unwrap());

  assert!(cache.delete_multiple(&["key_1", "key_9"]).unwrap());
  assert!(!cache.delete_multiple(&["key_1"]).unwrap());

  clock.advance(11);
  assert!(cache.get_multiple(&["key_2", "key_3"]).unwrap().is_empty());
  assert!(cache.clear().unwrap());
  assert!(!cache.delete_multiple(&["key_2", "key_3"]).unwrap());
}

#[test]
fn unbounded_ttl_is_readable() {
  let (_db, storage, clock) = cache_at(1_700_000_000);
  let cache = &storage.cache;
  assert!(cache.set("forever", &json!("v"), Some(Duration::MAX)).unwrap());
  assert_eq!(cache.get("forever", Value::Null).unwrap(), json!("v"));
  clock.advance(10 * 365 * 24 * 3600);
  assert!(cache.has("forever").unwrap());
}

#[test]
fn sub_second_ttl_rounds_up() {
  let (_db, storage, clock) = cache_at(1_700_000_000);
  let cache = &storage.cache;
  assert!(cache.set("half", &json!("v"), Some(Duration::from_millis(500))).unwrap());
  assert_eq!(cache.get("half", Value::Null).unwrap(), json!("v"));
  clock.advance(1);
  assert!(cache.has("half").unwrap());
  clock.advance(1);
  assert!(!cache.has("half").unwrap());
}
