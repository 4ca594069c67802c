// Expiring key/value cache over the `cache` table.
//
// Keys with reserved characters are never stored: reads return the default
// and writes report `false`. Expiry is evaluated against the injected clock.
use crate::connection::{map_db_err, write_tx, ConnectionProvider, DbConn};
use crate::schema;
use crate::schema::cache::dsl;
use diesel::prelude::*;
use diesel::upsert::excluded;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use service_core::cache::{expires_at, is_live, is_valid_key};
use service_core::{Clock, ExpiringCache, Result, SystemClock};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::cache)]
struct CacheRow {
  pub key: String,
  pub value: String,
  pub time_created: i64,
  pub expires: i64,
}

// Upsert: a second write to the same key replaces value and expiry.
fn upsert(conn: &mut DbConn, row: &CacheRow) -> Result<usize> {
  map_db_err(diesel::insert_into(dsl::cache).values(row)
                                            .on_conflict(dsl::key)
                                            .do_update()
                                            .set((dsl::value.eq(excluded(dsl::value)),
                                                  dsl::time_created.eq(excluded(dsl::time_created)),
                                                  dsl::expires.eq(excluded(dsl::expires))))
                                            .execute(conn))
}

pub struct DieselCache {
  provider: Arc<ConnectionProvider>,
  clock: Arc<dyn Clock>,
}

impl DieselCache {
  pub fn new(provider: Arc<ConnectionProvider>) -> Self {
    Self::with_clock(provider, Arc::new(SystemClock))
  }

  pub fn with_clock(provider: Arc<ConnectionProvider>, clock: Arc<dyn Clock>) -> Self {
    Self { provider, clock }
  }

  fn row(&self, key: &str, value: &JsonValue, ttl: Option<Duration>) -> Result<CacheRow> {
    let now = self.clock.now();
    Ok(CacheRow { key: key.to_string(),
                  value: serde_json::to_string(value)?,
                  time_created: now,
                  expires: expires_at(now, ttl) })
  }

  fn live_value(&self, key: &str) -> Result<Option<JsonValue>> {
    let mut conn = self.provider.get_connection()?;
    let found = map_db_err(dsl::cache.filter(dsl::key.eq(key))
                                     .select((dsl::value, dsl::expires))
                                     .first::<(String, i64)>(&mut conn)
                                     .optional())?;
    match found {
      Some((raw, expires)) if is_live(expires, self.clock.now()) => Ok(Some(serde_json::from_str(&raw)?)),
      _ => Ok(None),
    }
  }
}

impl ExpiringCache for DieselCache {
  fn get(&self, key: &str, default: JsonValue) -> Result<JsonValue> {
    if !is_valid_key(key) {
      return Ok(default);
    }
    Ok(self.live_value(key)?.unwrap_or(default))
  }

  fn set(&self, key: &str, value: &JsonValue, ttl: Option<Duration>) -> Result<bool> {
    if !is_valid_key(key) {
      log::debug!("cache: rejected key [{}]", key);
      return Ok(false);
    }
    let row = self.row(key, value, ttl)?;
    let mut conn = self.provider.get_connection()?;
    Ok(upsert(&mut conn, &row)? > 0)
  }

  fn delete(&self, key: &str) -> Result<bool> {
    if !is_valid_key(key) {
      return Ok(false);
    }
    let mut conn = self.provider.get_connection()?;
    let deleted = map_db_err(diesel::delete(dsl::cache.filter(dsl::key.eq(key))).execute(&mut conn))?;
    Ok(deleted > 0)
  }

  fn clear(&self) -> Result<bool> {
    let mut conn = self.provider.get_connection()?;
    let deleted = map_db_err(diesel::delete(dsl::cache).execute(&mut conn))?;
    log::info!("cache cleared ({} entries)", deleted);
    Ok(true)
  }

  fn get_multiple(&self, keys: &[&str]) -> Result<IndexMap<String, JsonValue>> {
    let wanted: Vec<String> = keys.iter().filter(|k| is_valid_key(k)).map(|k| k.to_string()).collect();
    if wanted.is_empty() {
      return Ok(IndexMap::new());
    }
    let mut conn = self.provider.get_connection()?;
    let rows = map_db_err(dsl::cache.filter(dsl::key.eq_any(wanted.clone())).load::<CacheRow>(&mut conn))?;
    let now = self.clock.now();
    let mut live = std::collections::HashMap::with_capacity(rows.len());
    for r in rows {
      if is_live(r.expires, now) {
        live.insert(r.key, r.value);
      }
    }
    let mut out = IndexMap::new();
    for key in wanted {
      if let Some(raw) = live.get(&key) {
        let value: JsonValue = serde_json::from_str(raw)?;
        out.insert(key, value);
      }
    }
    Ok(out)
  }

  fn set_multiple(&self, values: &IndexMap<String, JsonValue>, ttl: Option<Duration>) -> Result<bool> {
    if let Some(bad) = values.keys().find(|k| !is_valid_key(k)) {
      log::debug!("cache: set_multiple rejected, invalid key [{}]", bad);
      return Ok(false);
    }
    if values.is_empty() {
      return Ok(true);
    }
    let rows = values.iter().map(|(k, v)| self.row(k, v, ttl)).collect::<Result<Vec<_>>>()?;
    let mut conn = self.provider.get_connection()?;
    write_tx(&mut conn, |c| {
      for row in &rows {
        upsert(c, row)?;
      }
      Ok(())
    })?;
    Ok(true)
  }

  fn delete_multiple(&self, keys: &[&str]) -> Result<bool> {
    let doomed: Vec<String> = keys.iter().filter(|k| is_valid_key(k)).map(|k| k.to_string()).collect();
    if doomed.is_empty() {
      return Ok(false);
    }
    let mut conn = self.provider.get_connection()?;
    let deleted = map_db_err(diesel::delete(dsl::cache.filter(dsl::key.eq_any(doomed))).execute(&mut conn))?;
    log::debug!("cache: {} entries deleted", deleted);
    Ok(deleted > 0)
  }

  fn has(&self, key: &str) -> Result<bool> {
    if !is_valid_key(key) {
      return Ok(false);
    }
    Ok(self.live_value(key)?.is_some())
  }
}
