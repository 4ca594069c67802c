//! Persistencia Diesel del almacén de servicios.
//! Expone el módulo `schema`, el pool compartido (`ConnectionProvider`) y las
//! implementaciones de `ServiceDataProvider`, `ExpiringCache` y
//! `ServiceParamsFactory`. SQLite por defecto; la feature `pg` cambia el
//! backend a Postgres.

mod cache;
pub mod connection;
mod params;
pub mod schema;
mod sequence;
mod service_store;

pub use cache::DieselCache;
pub use connection::{write_tx, ConnectionProvider, DbConn, DbPool, PooledConn, StoreConfig, MIGRATIONS};
pub use params::{DieselServiceParams, DieselServiceParamsFactory};
pub use service_store::DieselServiceStore;

use service_core::{Clock, Result, SystemClock};
use std::sync::Arc;

/// Store, cache and params over one connection pool.
pub struct Storage {
  pub store: DieselServiceStore,
  pub cache: DieselCache,
  pub params: DieselServiceParamsFactory,
  provider: Arc<ConnectionProvider>,
}

impl Storage {
  pub fn open(config: StoreConfig) -> Self {
    Self::open_with_clock(config, Arc::new(SystemClock))
  }

  pub fn open_with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
    let provider = Arc::new(ConnectionProvider::new(config));
    Self { store: DieselServiceStore::with_clock(provider.clone(), clock.clone()),
           cache: DieselCache::with_clock(provider.clone(), clock.clone()),
           params: DieselServiceParamsFactory::with_clock(provider.clone(), clock),
           provider }
  }

  pub fn provider(&self) -> &Arc<ConnectionProvider> {
    &self.provider
  }
}

/// Crear el almacenamiento desde las variables de entorno (`.env` incluido).
pub fn new_from_env() -> Result<Storage> {
  let config = StoreConfig::from_env()?;
  log::info!("service store backend: {}", if cfg!(feature = "pg") { "postgres" } else { "sqlite" });
  Ok(Storage::open(config))
}
