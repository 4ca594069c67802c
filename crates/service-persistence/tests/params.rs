#![cfg(not(feature = "pg"))]
use diesel::prelude::*;
use serde_json::json;
use service_core::{AdminUser, LevelType, ManualClock, ParamsScope, ScopeType, ServiceDataProvider, ServiceParams,
                   ServiceParamsFactory};
use service_persistence::schema::service_params::dsl;
use service_persistence::Storage;
use std::sync::Arc;

mod common;
use common::TempDb;

#[test]
fn persisted_scope_keeps_first_time_created() {
  let clock = Arc::new(ManualClock::new(1_000));
  let db = TempDb::new("service_params_test");
  let storage = Storage::open_with_clock(db.config(), clock.clone());
  let user = AdminUser::new(1, "test01", "Test 01", "test01@example.com");
  let sid = storage.store.create_new_service(&user, "Params", vec![], false, &json!({})).unwrap();
  let scope = ParamsScope::new(sid.clone(), ScopeType::User, LevelType::Block, "user-7");

  let params = storage.params.get_service_params(&scope);
  assert!(params.get_data().unwrap().is_empty());
  params.set_service_param("greeting", json!("hola")).unwrap();
  clock.advance(30);
  params.set_service_param("count", json!(2)).unwrap();

  // a fresh handle reads the same row
  let again = storage.params.get_service_params(&scope);
  assert_eq!(again.get_service_param("greeting").unwrap(), Some(json!("hola")));
  assert_eq!(again.get_data().unwrap().len(), 2);

  let mut conn = storage.provider().get_connection().unwrap();
  let (created, updated): (i64, i64) = dsl::service_params.filter(dsl::service_id.eq(&sid))
                                                         .select((dsl::time_created, dsl::time_updated))
                                                         .first(&mut *conn)
                                                         .unwrap();
  assert_eq!((created, updated), (1_000, 1_030));

  // other scopes of the same service are separate rows
  let other = ParamsScope::new(sid, ScopeType::Session, LevelType::Block, "user-7");
  assert!(storage.params.get_service_params(&other).get_data().unwrap().is_empty());
}

#[test]
fn request_scope_stays_in_memory() {
  let db = TempDb::new("service_params_test");
  let storage = Storage::open_with_clock(db.config(), Arc::new(ManualClock::new(1_000)));
  let scope = ParamsScope::new("svc", ScopeType::Request, LevelType::Component, "req-1");
  storage.params.get_service_params(&scope).set_service_param("x", json!(1)).unwrap();
  assert_eq!(storage.params.get_service_params(&scope).get_service_param("x").unwrap(), Some(json!(1)));

  let mut conn = storage.provider().get_connection().unwrap();
  let rows: i64 = dsl::service_params.count().get_result(&mut *conn).unwrap();
  assert_eq!(rows, 0);

  assert!(storage.params.release_request(&scope));
  assert!(storage.params.get_service_params(&scope).get_data().unwrap().is_empty());
}
