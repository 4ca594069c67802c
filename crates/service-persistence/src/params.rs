// Scoped service params. Request scope lives in process memory; every other
// scope is one JSON blob per row of `service_params`.
use crate::connection::{map_db_err, write_tx, ConnectionProvider};
use crate::schema::service_params::dsl;
use dashmap::DashMap;
use diesel::prelude::*;
use serde_json::{Map, Value as JsonValue};
use service_core::{Clock, ParamsScope, Result, ScopeType, ServiceParams, ServiceParamsFactory, SimpleParams, SystemClock};
use std::sync::Arc;

pub struct DieselServiceParams {
  scope: ParamsScope,
  provider: Arc<ConnectionProvider>,
  clock: Arc<dyn Clock>,
}

impl DieselServiceParams {
  pub fn new(scope: ParamsScope, provider: Arc<ConnectionProvider>, clock: Arc<dyn Clock>) -> Self {
    Self { scope,
           provider,
           clock }
  }
}

impl ServiceParams for DieselServiceParams {
  fn scope(&self) -> &ParamsScope {
    &self.scope
  }

  fn get_data(&self) -> Result<Map<String, JsonValue>> {
    let s = &self.scope;
    let mut conn = self.provider.get_connection()?;
    let raw = map_db_err(dsl::service_params.filter(dsl::service_id.eq(&s.service_id))
                                            .filter(dsl::scope_type.eq(s.scope_type.as_str()))
                                            .filter(dsl::level_type.eq(s.level_type.as_str()))
                                            .filter(dsl::key.eq(&s.key))
                                            .select(dsl::data)
                                            .first::<String>(&mut conn)
                                            .optional())?;
    match raw {
      Some(raw) => match serde_json::from_str::<JsonValue>(&raw)? {
        JsonValue::Object(m) => Ok(m),
        _ => Ok(Map::new()),
      },
      None => Ok(Map::new()),
    }
  }

  /// Replaces the blob; the row keeps its first `time_created`.
  fn store_data(&self, data: &Map<String, JsonValue>) -> Result<()> {
    let s = &self.scope;
    let raw = serde_json::to_string(data)?;
    let now = self.clock.now();
    let mut conn = self.provider.get_connection()?;
    write_tx(&mut conn, |c| {
      let target = dsl::service_params.filter(dsl::service_id.eq(&s.service_id))
                                      .filter(dsl::scope_type.eq(s.scope_type.as_str()))
                                      .filter(dsl::level_type.eq(s.level_type.as_str()))
                                      .filter(dsl::key.eq(&s.key));
      let updated = map_db_err(diesel::update(target).set((dsl::data.eq(&raw), dsl::time_updated.eq(now))).execute(c))?;
      if updated == 0 {
        map_db_err(diesel::insert_into(dsl::service_params).values((dsl::service_id.eq(&s.service_id),
                                                                    dsl::scope_type.eq(s.scope_type.as_str()),
                                                                    dsl::level_type.eq(s.level_type.as_str()),
                                                                    dsl::key.eq(&s.key),
                                                                    dsl::data.eq(&raw),
                                                                    dsl::time_created.eq(now),
                                                                    dsl::time_updated.eq(now)))
                                                           .execute(c))?;
      }
      Ok(())
    })?;
    log::debug!("params {} stored", s);
    Ok(())
  }
}

/// Hands out params per scope. Request-scoped params are shared per scope
/// for the lifetime of the factory.
pub struct DieselServiceParamsFactory {
  provider: Arc<ConnectionProvider>,
  clock: Arc<dyn Clock>,
  request_params: DashMap<ParamsScope, Arc<SimpleParams>>,
}

impl DieselServiceParamsFactory {
  pub fn new(provider: Arc<ConnectionProvider>) -> Self {
    Self::with_clock(provider, Arc::new(SystemClock))
  }

  pub fn with_clock(provider: Arc<ConnectionProvider>, clock: Arc<dyn Clock>) -> Self {
    Self { provider,
           clock,
           request_params: DashMap::new() }
  }

  /// Drops the in-memory params of a finished request.
  pub fn release_request(&self, scope: &ParamsScope) -> bool {
    self.request_params.remove(scope).is_some()
  }
}

impl ServiceParamsFactory for DieselServiceParamsFactory {
  fn get_service_params(&self, scope: &ParamsScope) -> Arc<dyn ServiceParams> {
    match scope.scope_type {
      ScopeType::Request => {
        let params: Arc<dyn ServiceParams> = self.request_params
                                                 .entry(scope.clone())
                                                 .or_insert_with(|| Arc::new(SimpleParams::new(scope.clone())))
                                                 .clone();
        params
      }
      _ => Arc::new(DieselServiceParams::new(scope.clone(), self.provider.clone(), self.clock.clone())),
    }
  }
}
