#![cfg(not(feature = "pg"))]
use rayon::prelude::*;
use serde_json::json;
use service_core::sequence::format_id;
use service_core::{AdminUser, ServiceDataProvider};
use service_persistence::Storage;

mod common;
use common::TempDb;

#[test]
fn concurrent_versions_and_releases_get_dense_unique_ids() {
  let db = TempDb::new("service_store_stress");
  let config = db.config().with_busy_timeout_ms(30_000);
  let storage = Storage::open(config);
  let user = AdminUser::new(1, "test01", "Test 01", "test01@example.com");
  let sid = storage.store.create_new_service(&user, "Stress", vec![], false, &json!({})).unwrap();

  const N: i64 = 48;
  let pairs: Vec<(String, String)> = (0..N).into_par_iter()
                                           .map(|i| {
                                             let v = storage.store
                                                            .create_service_version(&user, &sid, &json!({"i": i}), &json!({}), None)
                                                            .expect("version");
                                             let r = storage.store
                                                            .create_release(&user, &sid, "web", "test", "dev", "a", &v)
                                                            .expect("release");
                                             (v, r)
                                           })
                                           .collect();

  let mut versions: Vec<String> = pairs.iter().map(|(v, _)| v.clone()).collect();
  let mut releases: Vec<String> = pairs.iter().map(|(_, r)| r.clone()).collect();
  versions.sort();
  releases.sort();
  let expected: Vec<String> = (1..=N).map(format_id).collect();
  assert_eq!(versions, expected);
  assert_eq!(releases, expected);
  assert_eq!(storage.store.get_all_service_versions(&user, &sid).unwrap(), expected);

  // every release still points at the version created alongside it
  for (v, r) in &pairs {
    assert_eq!(&storage.store.get_release_data(&user, &sid, r).unwrap().version_id, v);
  }
}
