use serde_json::json;
use service_core::{AdminUser, InMemoryServiceDataProvider, ManualClock, ServiceDataProvider, ServiceMeta, StoreError,
                   DEVELOP_VERSION};
use std::sync::Arc;

fn owner() -> AdminUser {
  AdminUser::new(1, "test01", "Test 01", "test01@example.com")
}

fn stranger() -> AdminUser {
  AdminUser::new(2, "test02", "Test 02", "test02@example.com")
}

#[test]
fn versions_and_releases_follow_dense_sequences() {
  let repo = InMemoryServiceDataProvider::new();
  let user = owner();
  let sid = repo.create_new_service(&user, "Demo", vec![], false, &json!({})).unwrap();
  assert_eq!(sid, "demo");

  let draft = repo.get_service_data(&user, &sid, DEVELOP_VERSION).unwrap();
  assert_eq!(draft["name"], "Demo");
  assert_eq!(draft["intents"], json!([]));

  let v1 = repo.create_service_version(&user, &sid, &json!({"blocks": [1]}), &json!({"a": 1}), None).unwrap();
  let v2 = repo.create_service_version(&user, &sid, &json!({"blocks": [2]}), &json!({"a": 2}), Some("second")).unwrap();
  assert_eq!(v1, "00000001");
  assert_eq!(v2, "00000002");

  let r1 = repo.create_release(&user, &sid, "amazon", "development", "dev", "a", &v1).unwrap();
  assert_eq!(r1, "00000001");
  repo.set_release_version(&user, &sid, &r1, &v2).unwrap();
  let rel = repo.get_release_data(&user, &sid, &r1).unwrap();
  assert_eq!(rel.version_id, v2);
  assert_eq!(rel.release_type, "development");
  let served = repo.get_service_data(&user, &sid, &rel.version_id).unwrap();
  assert_eq!(served["blocks"], json!([2]));
  // merge-on-read rellena lo que la versión no guardó
  assert_eq!(served["intents"], json!([]));
}

#[test]
fn promote_and_repoint_touch_disjoint_fields() {
  let clock = Arc::new(ManualClock::new(1_000));
  let repo = InMemoryServiceDataProvider::with_clock(clock.clone());
  let user = owner();
  let sid = repo.create_new_service(&user, "Promo", vec![], false, &json!({})).unwrap();
  let v1 = repo.create_service_version(&user, &sid, &json!({}), &json!({}), None).unwrap();
  let v2 = repo.create_service_version(&user, &sid, &json!({}), &json!({}), None).unwrap();
  let rid = repo.create_release(&user, &sid, "web", "test", "alpha", "main", &v1).unwrap();

  clock.advance(10);
  repo.promote_release(&user, &sid, &rid, "production", "live").unwrap();
  let rel = repo.get_release_data(&user, &sid, &rid).unwrap();
  assert_eq!(rel.version_id, v1);
  assert_eq!((rel.release_type.as_str(), rel.stage.as_str()), ("production", "live"));
  assert_eq!(rel.time_updated, 1_010);
  assert_eq!(rel.time_created, 1_000);

  clock.advance(10);
  repo.set_release_version(&user, &sid, &rid, &v2).unwrap();
  let rel = repo.get_release_data(&user, &sid, &rid).unwrap();
  assert_eq!(rel.version_id, v2);
  assert_eq!((rel.release_type.as_str(), rel.stage.as_str()), ("production", "live"));
  assert_eq!(rel.time_updated, 1_020);
}

#[test]
fn release_requires_existing_version() {
  let repo = InMemoryServiceDataProvider::new();
  let user = owner();
  let sid = repo.create_new_service(&user, "Refs", vec![], false, &json!({})).unwrap();
  match repo.create_release(&user, &sid, "web", "t", "s", "a", "00000001") {
    Err(StoreError::Reference(_)) => {}
    other => panic!("expected reference error, got {:?}", other),
  }
  match repo.create_release(&user, &sid, "web", "t", "s", "a", DEVELOP_VERSION) {
    Err(StoreError::Reference(_)) => {}
    other => panic!("expected reference error, got {:?}", other),
  }
  let v1 = repo.create_service_version(&user, &sid, &json!({}), &json!({}), None).unwrap();
  let rid = repo.create_release(&user, &sid, "web", "t", "s", "a", &v1).unwrap();
  assert!(matches!(repo.set_release_version(&user, &sid, &rid, "00000009"), Err(StoreError::Reference(_))));
  assert!(repo.get_release_data(&user, &sid, "00000099").unwrap_err().is_not_found());
}

#[test]
fn ownership_gate_on_read_and_delete() {
  let repo = InMemoryServiceDataProvider::new();
  let user = owner();
  let admin = AdminUser::new(3, "adm", "Adm", "adm@example.com");
  let sid = repo.create_new_service(&user, "Private", vec!["adm@example.com".into()], true, &json!({})).unwrap();

  assert!(matches!(repo.get_service_data(&stranger(), &sid, DEVELOP_VERSION), Err(StoreError::NotAuthorized(_))));
  assert!(repo.get_service_data(&admin, &sid, DEVELOP_VERSION).is_ok());
  assert!(matches!(repo.delete_service(&stranger(), &sid), Err(StoreError::NotAuthorized(_))));
  assert_eq!(repo.get_all_services(&stranger()).unwrap().len(), 0);
  assert_eq!(repo.get_all_services(&admin).unwrap().len(), 1);

  repo.delete_service(&admin, &sid).unwrap();
  assert!(repo.get_service_data(&user, &sid, DEVELOP_VERSION).unwrap_err().is_not_found());
  assert!(repo.get_all_service_versions(&user, &sid).unwrap().is_empty());
}

#[test]
fn duplicate_service_is_a_conflict() {
  let repo = InMemoryServiceDataProvider::new();
  let user = owner();
  repo.create_new_service(&user, "Twin", vec![], false, &json!({})).unwrap();
  assert!(matches!(repo.create_new_service(&user, "twin", vec![], false, &json!({})), Err(StoreError::Conflict(_))));
}

#[test]
fn meta_has_two_shapes() {
  let repo = InMemoryServiceDataProvider::new();
  let user = owner();
  let sid = repo.create_new_service(&user, "Meta", vec![], false, &json!({})).unwrap();
  let v1 = repo.create_service_version(&user, &sid, &json!({}), &json!({}), Some("tag-1")).unwrap();

  match repo.get_service_meta(&user, &sid, None).unwrap() {
    ServiceMeta::Draft(m) => assert_eq!(m.owner, "test01@example.com"),
    other => panic!("expected draft meta, got {:?}", other),
  }
  match repo.get_service_meta(&user, &sid, Some(DEVELOP_VERSION)).unwrap() {
    ServiceMeta::Draft(m) => assert_eq!(m.name, "Meta"),
    other => panic!("expected draft meta, got {:?}", other),
  }
  match repo.get_service_meta(&user, &sid, Some(&v1)).unwrap() {
    ServiceMeta::Version(m) => {
      assert_eq!(m.version_id, v1);
      assert_eq!(m.version_tag.as_deref(), Some("tag-1"));
      assert_eq!(m.release_id, None);
    }
    other => panic!("expected version meta, got {:?}", other),
  }
  let marked = repo.mark_version_as_release(&user, &sid, &v1, "00000001").unwrap();
  assert_eq!(marked.release_id.as_deref(), Some("00000001"));
}

#[test]
fn platform_config_draft_and_versions() {
  let repo = InMemoryServiceDataProvider::new();
  let user = owner();
  let sid = repo.create_new_service(&user, "Cfg", vec![], false, &json!({})).unwrap();
  assert_eq!(repo.get_service_platform_config(&user, &sid, DEVELOP_VERSION).unwrap(), json!({}));
  repo.update_service_platform_config(&user, &sid, &json!({"amazon": {"id": 1}})).unwrap();
  let cfg = repo.get_service_platform_config(&user, &sid, DEVELOP_VERSION).unwrap();
  let v1 = repo.create_service_version(&user, &sid, &json!({}), &cfg, None).unwrap();
  repo.update_service_platform_config(&user, &sid, &json!({})).unwrap();
  assert_eq!(repo.get_service_platform_config(&user, &sid, &v1).unwrap(), json!({"amazon": {"id": 1}}));
  assert!(repo.get_service_platform_config(&user, &sid, "00000007").unwrap_err().is_not_found());
}
