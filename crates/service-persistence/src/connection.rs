//! Configuración y pool de conexiones compartido por el store, la cache y
//! los params. El pool se crea en la primera petición de conexión y las
//! migraciones embebidas se aplican en ese momento.
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use once_cell::sync::OnceCell;
use service_core::{Result, StoreError};
use std::str::FromStr;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

#[cfg(feature = "pg")]
pub type DbConn = PgConnection;
#[cfg(not(feature = "pg"))]
pub type DbConn = SqliteConnection;
pub type DbPool = Pool<ConnectionManager<DbConn>>;
pub type PooledConn = PooledConnection<ConnectionManager<DbConn>>;

/// Settings read from the environment (`.env` honoured).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
  pub database_url: String,
  pub pool_size: u32,
  pub busy_timeout_ms: u64,
}

impl StoreConfig {
  pub const DEFAULT_SQLITE_URL: &'static str = "service_store.db";
  pub const DEFAULT_POOL_SIZE: u32 = 4;
  pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

  pub fn new(database_url: impl Into<String>) -> Self {
    Self { database_url: database_url.into(),
           pool_size: Self::DEFAULT_POOL_SIZE,
           busy_timeout_ms: Self::DEFAULT_BUSY_TIMEOUT_MS }
  }

  pub fn with_pool_size(mut self, pool_size: u32) -> Self {
    self.pool_size = pool_size;
    self
  }

  pub fn with_busy_timeout_ms(mut self, busy_timeout_ms: u64) -> Self {
    self.busy_timeout_ms = busy_timeout_ms;
    self
  }

  /// SERVICE_DB_URL (fallback DATABASE_URL), SERVICE_DB_POOL_SIZE,
  /// SERVICE_DB_BUSY_TIMEOUT_MS.
  pub fn from_env() -> Result<Self> {
    dotenvy::dotenv().ok();
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  /// Same as [`StoreConfig::from_env`] over an arbitrary variable source.
  pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where F: Fn(&str) -> Option<String>
  {
    let url = lookup("SERVICE_DB_URL").or_else(|| lookup("DATABASE_URL"));
    let database_url = if cfg!(feature = "pg") {
      let url = url.ok_or_else(|| StoreError::InvalidInput("SERVICE_DB_URL / DATABASE_URL not set".into()))?;
      if !looks_like_postgres(&url) {
        return Err(StoreError::InvalidInput("SERVICE_DB_URL / DATABASE_URL does not look like Postgres URL".into()));
      }
      url
    } else {
      url.unwrap_or_else(|| Self::DEFAULT_SQLITE_URL.into())
    };
    let pool_size = parse_var(&lookup, "SERVICE_DB_POOL_SIZE", Self::DEFAULT_POOL_SIZE)?;
    if pool_size == 0 {
      return Err(StoreError::InvalidInput("SERVICE_DB_POOL_SIZE must be positive".into()));
    }
    let busy_timeout_ms = parse_var(&lookup, "SERVICE_DB_BUSY_TIMEOUT_MS", Self::DEFAULT_BUSY_TIMEOUT_MS)?;
    Ok(Self { database_url,
              pool_size,
              busy_timeout_ms })
  }
}

fn looks_like_postgres(url: &str) -> bool {
  let l = url.to_lowercase();
  l.starts_with("postgres://") || l.starts_with("postgresql://") || url.contains('@')
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
  where F: Fn(&str) -> Option<String>,
        T: FromStr,
        T::Err: std::fmt::Display
{
  match lookup(name) {
    None => Ok(default),
    Some(raw) => raw.trim()
                    .parse::<T>()
                    .map_err(|e| StoreError::InvalidInput(format!("{} = {:?}: {}", name, raw, e))),
  }
}

// Applied to every new pooled connection.
#[derive(Debug, Clone, Copy)]
struct ConnectionSetup {
  busy_timeout_ms: u64,
}

#[cfg(not(feature = "pg"))]
impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionSetup {
  fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
    // busy_timeout first so the journal switch itself waits on contention
    conn.batch_execute(&format!("PRAGMA busy_timeout = {};", self.busy_timeout_ms))
        .map_err(diesel::r2d2::Error::QueryError)?;
    conn.batch_execute("PRAGMA journal_mode = WAL;")
        .map_err(diesel::r2d2::Error::QueryError)
  }
}

#[cfg(feature = "pg")]
impl CustomizeConnection<PgConnection, diesel::r2d2::Error> for ConnectionSetup {}

/// Lazily built pool shared by every component of a store instance.
pub struct ConnectionProvider {
  config: StoreConfig,
  pool: OnceCell<DbPool>,
}

impl ConnectionProvider {
  pub fn new(config: StoreConfig) -> Self {
    Self { config,
           pool: OnceCell::new() }
  }

  pub fn from_env() -> Result<Self> {
    Ok(Self::new(StoreConfig::from_env()?))
  }

  pub fn config(&self) -> &StoreConfig {
    &self.config
  }

  fn pool(&self) -> Result<&DbPool> {
    self.pool.get_or_try_init(|| build_pool(&self.config))
  }

  pub fn get_connection(&self) -> Result<PooledConn> {
    self.pool()?.get().map_err(pool_err)
  }
}

fn build_pool(config: &StoreConfig) -> Result<DbPool> {
  let manager = ConnectionManager::<DbConn>::new(&config.database_url);
  let setup = ConnectionSetup { busy_timeout_ms: config.busy_timeout_ms };
  let pool = Pool::builder().max_size(config.pool_size)
                            .connection_customizer(Box::new(setup))
                            .build(manager)
                            .map_err(|e| StoreError::Pool(format!("no se pudo crear el pool de conexiones: {}", e)))?;
  let mut conn = pool.get().map_err(pool_err)?;
  let applied = conn.run_pending_migrations(MIGRATIONS).map_err(StoreError::Backend)?;
  log::info!("connection pool ready (size {}), {} migration(s) applied", config.pool_size, applied.len());
  Ok(pool)
}

fn pool_err(e: r2d2::Error) -> StoreError {
  StoreError::Pool(format!("pool: {}", e))
}

/// Driver error to store error. Unique violations become `Conflict`; the
/// rest keep the driver error as source.
pub(crate) fn db_err(e: DieselError) -> StoreError {
  match e {
    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
      StoreError::Conflict(info.message().to_string())
    }
    other => StoreError::backend(other),
  }
}

pub(crate) fn map_db_err<T>(res: std::result::Result<T, DieselError>) -> Result<T> {
  res.map_err(db_err)
}

// Lets a `StoreError` cross diesel's transaction boundary.
#[derive(Debug)]
struct TxError(StoreError);

impl From<DieselError> for TxError {
  fn from(e: DieselError) -> Self {
    TxError(db_err(e))
  }
}

/// Runs `f` in a write transaction. On SQLite the write lock is taken up
/// front (`BEGIN IMMEDIATE`) so concurrent writers queue on the busy
/// timeout instead of failing on lock upgrade.
pub fn write_tx<T, F>(conn: &mut DbConn, f: F) -> Result<T>
  where F: FnOnce(&mut DbConn) -> Result<T>
{
  #[cfg(not(feature = "pg"))]
  let res = conn.immediate_transaction(|c| f(c).map_err(TxError));
  #[cfg(feature = "pg")]
  let res = conn.transaction(|c| f(c).map_err(TxError));
  res.map_err(|e| e.0)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |name| map.get(name).cloned()
  }

  #[cfg(not(feature = "pg"))]
  #[test]
  fn defaults_without_env() {
    let cfg = StoreConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(cfg, StoreConfig::new(StoreConfig::DEFAULT_SQLITE_URL));
  }

  #[cfg(not(feature = "pg"))]
  #[test]
  fn service_url_wins_over_database_url() {
    let cfg = StoreConfig::from_lookup(lookup(&[("DATABASE_URL", "b.db"), ("SERVICE_DB_URL", "a.db")])).unwrap();
    assert_eq!(cfg.database_url, "a.db");
    let cfg = StoreConfig::from_lookup(lookup(&[("DATABASE_URL", "b.db")])).unwrap();
    assert_eq!(cfg.database_url, "b.db");
  }

  #[test]
  fn numeric_settings_are_validated() {
    let base = [("SERVICE_DB_URL", "postgres://u@h/db")];
    let cfg = StoreConfig::from_lookup(lookup(&[base[0],
                                                ("SERVICE_DB_POOL_SIZE", "8"),
                                                ("SERVICE_DB_BUSY_TIMEOUT_MS", "250")])).unwrap();
    assert_eq!(cfg.pool_size, 8);
    assert_eq!(cfg.busy_timeout_ms, 250);
    assert!(StoreConfig::from_lookup(lookup(&[base[0], ("SERVICE_DB_POOL_SIZE", "0")])).is_err());
    assert!(StoreConfig::from_lookup(lookup(&[base[0], ("SERVICE_DB_POOL_SIZE", "many")])).is_err());
  }
}
