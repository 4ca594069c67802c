// Archivo: stubs.rs
// Propósito: implementaciones en memoria del proveedor de servicios y de la
// cache, para pruebas y wiring rápido. No son durables.
//
// Todo el estado vive detrás de un único `Mutex`, de modo que asignar un id
// e insertar la fila ocurre bajo el mismo lock.
use crate::cache::{expires_at, is_live, is_valid_key};
use crate::clock::{Clock, SystemClock};
use crate::document::{generate_service_id, initial_meta, initial_workflow, merge_over_defaults, stamp, VersionRef,
                      DEFAULT_WORKFLOW};
use crate::domain::{DraftMeta, ServiceMeta, ServiceRelease, ServiceVersion, VersionMeta};
use crate::errors::{Result, StoreError};
use crate::identity::AdminUser;
use crate::repository::{ensure_owner_or_admin, ExpiringCache, ServiceDataProvider};
use crate::sequence::{format_id, next_after, SequenceKind};
use indexmap::IndexMap;
use serde_json::{json, Value as JsonValue};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
struct ServiceRow {
    workflow: JsonValue,
    meta: JsonValue,
    config: JsonValue,
}

#[derive(Debug, Default)]
struct State {
    /// Borradores por `service_id`.
    services: BTreeMap<String, ServiceRow>,
    /// Versiones por (`service_id`, `version_id`).
    versions: BTreeMap<(String, String), ServiceVersion>,
    /// Releases por (`service_id`, `release_id`).
    releases: BTreeMap<(String, String), ServiceRelease>,
    /// Último id asignado por (`service_id`, secuencia).
    sequences: HashMap<(String, SequenceKind), i64>,
}

impl State {
    fn allocate(&mut self, service_id: &str, kind: SequenceKind) -> String {
        let last = self.sequences.entry((service_id.to_string(), kind)).or_insert(0);
        *last = next_after(Some(*last));
        format_id(*last)
    }

    fn draft_meta(&self, service_id: &str) -> Result<DraftMeta> {
        let row = self.services
                      .get(service_id)
                      .ok_or_else(|| StoreError::NotFound(format!("service meta [{}]", service_id)))?;
        DraftMeta::from_stored(&row.meta)
    }

    fn service_mut(&mut self, service_id: &str) -> Result<&mut ServiceRow> {
        self.services
            .get_mut(service_id)
            .ok_or_else(|| StoreError::NotFound(format!("service [{}]", service_id)))
    }

    fn version_exists(&self, service_id: &str, version_id: &str) -> bool {
        self.versions.contains_key(&(service_id.to_string(), version_id.to_string()))
    }
}

/// Proveedor de servicios en memoria.
pub struct InMemoryServiceDataProvider {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
}

impl InMemoryServiceDataProvider {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { state: Mutex::new(State::default()),
               clock }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| StoreError::Backend(format!("mutex poisoned: {:?}", e).into()))
    }
}

impl Default for InMemoryServiceDataProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceDataProvider for InMemoryServiceDataProvider {
    fn get_all_services(&self, user: &AdminUser) -> Result<Vec<DraftMeta>> {
        let state = self.lock()?;
        let mut out = Vec::new();
        for id in state.services.keys() {
            let meta = state.draft_meta(id)?;
            if user.is_owner_or_admin(&meta) {
                out.push(meta);
            }
        }
        Ok(out)
    }

    fn create_new_service(&self,
                          user: &AdminUser,
                          service_name: &str,
                          admins: Vec<String>,
                          is_private: bool,
                          workflow: &JsonValue)
                          -> Result<String> {
        let service_id = generate_service_id(service_name)?;
        let now = self.clock.now();
        let mut state = self.lock()?;
        if state.services.contains_key(&service_id) {
            return Err(StoreError::Conflict(format!("service [{}] already exists", service_id)));
        }
        let row = ServiceRow { workflow: initial_workflow(&service_id, service_name, workflow, now),
                               meta: initial_meta(user, &service_id, service_name, admins, is_private, now),
                               config: json!({}) };
        state.services.insert(service_id.clone(), row);
        for kind in SequenceKind::ALL {
            state.sequences.insert((service_id.clone(), kind), 0);
        }
        log::debug!("in-memory: service [{}] created by {}", service_id, user);
        Ok(service_id)
    }

    fn delete_service(&self, user: &AdminUser, service_id: &str) -> Result<()> {
        let mut state = self.lock()?;
        let meta = state.draft_meta(service_id)?;
        ensure_owner_or_admin(user, &meta, service_id, "delete")?;
        state.releases.retain(|(sid, _), _| sid != service_id);
        state.versions.retain(|(sid, _), _| sid != service_id);
        state.sequences.retain(|(sid, _), _| sid != service_id);
        state.services.remove(service_id);
        log::debug!("in-memory: service [{}] deleted by {}", service_id, user);
        Ok(())
    }

    fn get_service_data(&self, user: &AdminUser, service_id: &str, version_id: &str) -> Result<JsonValue> {
        let state = self.lock()?;
        let meta = state.draft_meta(service_id)?;
        ensure_owner_or_admin(user, &meta, service_id, "open")?;
        match VersionRef::parse(version_id) {
            VersionRef::Develop => {
                let row = state.services
                               .get(service_id)
                               .ok_or_else(|| StoreError::NotFound(format!("service data [{}][{}]", service_id, version_id)))?;
                Ok(merge_over_defaults(&DEFAULT_WORKFLOW, &row.workflow))
            }
            VersionRef::Version(v) => {
                let ver = state.versions
                               .get(&(service_id.to_string(), v.to_string()))
                               .ok_or_else(|| StoreError::NotFound(format!("service data [{}][{}]", service_id, version_id)))?;
                Ok(merge_over_defaults(&DEFAULT_WORKFLOW, &ver.workflow))
            }
        }
    }

    fn save_service_data(&self, _user: &AdminUser, service_id: &str, mut data: JsonValue) -> Result<JsonValue> {
        stamp(&mut data, "time_updated", self.clock.now());
        let mut state = self.lock()?;
        state.service_mut(service_id)?.workflow = data.clone();
        Ok(data)
    }

    fn get_service_meta(&self, _user: &AdminUser, service_id: &str, version_id: Option<&str>) -> Result<ServiceMeta> {
        let state = self.lock()?;
        match version_id.map(VersionRef::parse) {
            Some(VersionRef::Version(v)) => {
                let ver = state.versions
                               .get(&(service_id.to_string(), v.to_string()))
                               .ok_or_else(|| StoreError::NotFound(format!("service meta [{}][{}]", service_id, v)))?;
                Ok(ServiceMeta::Version(ver.meta()))
            }
            _ => Ok(ServiceMeta::Draft(state.draft_meta(service_id)?)),
        }
    }

    fn save_service_meta(&self, _user: &AdminUser, service_id: &str, mut meta: JsonValue) -> Result<JsonValue> {
        stamp(&mut meta, "time_updated", self.clock.now());
        let mut state = self.lock()?;
        state.service_mut(service_id)?.meta = meta.clone();
        Ok(meta)
    }

    fn mark_version_as_release(&self,
                               _user: &AdminUser,
                               service_id: &str,
                               version_id: &str,
                               release_id: &str)
                               -> Result<VersionMeta> {
        let mut state = self.lock()?;
        let ver = state.versions
                       .get_mut(&(service_id.to_string(), version_id.to_string()))
                       .ok_or_else(|| StoreError::NotFound(format!("service meta [{}][{}]", service_id, version_id)))?;
        ver.release_id = Some(release_id.to_string());
        Ok(ver.meta())
    }

    fn get_all_service_versions(&self, _user: &AdminUser, service_id: &str) -> Result<Vec<String>> {
        let state = self.lock()?;
        Ok(state.versions
                .keys()
                .filter(|(sid, _)| sid == service_id)
                .map(|(_, vid)| vid.clone())
                .collect())
    }

    fn create_service_version(&self,
                              _user: &AdminUser,
                              service_id: &str,
                              workflow: &JsonValue,
                              config: &JsonValue,
                              version_tag: Option<&str>)
                              -> Result<String> {
        let now = self.clock.now();
        let mut state = self.lock()?;
        if !state.services.contains_key(service_id) {
            return Err(StoreError::NotFound(format!("service [{}]", service_id)));
        }
        let version_id = state.allocate(service_id, SequenceKind::Version);
        let ver = ServiceVersion { service_id: service_id.to_string(),
                                   version_id: version_id.clone(),
                                   version_tag: version_tag.map(|s| s.to_string()),
                                   release_id: None,
                                   workflow: workflow.clone(),
                                   config: config.clone(),
                                   time_created: now,
                                   time_updated: now };
        state.versions.insert((service_id.to_string(), version_id.clone()), ver);
        Ok(version_id)
    }

    fn create_release(&self,
                      _user: &AdminUser,
                      service_id: &str,
                      platform_id: &str,
                      release_type: &str,
                      stage: &str,
                      alias: &str,
                      version_id: &str)
                      -> Result<String> {
        let now = self.clock.now();
        let mut state = self.lock()?;
        if !state.services.contains_key(service_id) {
            return Err(StoreError::NotFound(format!("service [{}]", service_id)));
        }
        if !state.version_exists(service_id, version_id) {
            return Err(StoreError::Reference(format!("version [{}][{}] does not exist", service_id, version_id)));
        }
        let release_id = state.allocate(service_id, SequenceKind::Release);
        let rel = ServiceRelease { service_id: service_id.to_string(),
                                   release_id: release_id.clone(),
                                   platform_id: platform_id.to_string(),
                                   version_id: version_id.to_string(),
                                   release_type: release_type.to_string(),
                                   stage: stage.to_string(),
                                   alias: alias.to_string(),
                                   time_created: now,
                                   time_updated: now };
        state.releases.insert((service_id.to_string(), release_id.clone()), rel);
        Ok(release_id)
    }

    fn get_release_data(&self, _user: &AdminUser, service_id: &str, release_id: &str) -> Result<ServiceRelease> {
        let state = self.lock()?;
        state.releases
             .get(&(service_id.to_string(), release_id.to_string()))
             .cloned()
             .ok_or_else(|| StoreError::NotFound(format!("service release [{}][{}]", service_id, release_id)))
    }

    fn get_all_releases(&self, _user: &AdminUser, service_id: &str) -> Result<Vec<ServiceRelease>> {
        let state = self.lock()?;
        Ok(state.releases
                .iter()
                .filter(|((sid, _), _)| sid == service_id)
                .map(|(_, r)| r.clone())
                .collect())
    }

    fn promote_release(&self,
                       _user: &AdminUser,
                       service_id: &str,
                       release_id: &str,
                       release_type: &str,
                       stage: &str)
                       -> Result<()> {
        let now = self.clock.now();
        let mut state = self.lock()?;
        let rel = state.releases
                       .get_mut(&(service_id.to_string(), release_id.to_string()))
                       .ok_or_else(|| StoreError::NotFound(format!("service release [{}][{}]", service_id, release_id)))?;
        rel.release_type = release_type.to_string();
        rel.stage = stage.to_string();
        rel.time_updated = now;
        Ok(())
    }

    fn set_release_version(&self, _user: &AdminUser, service_id: &str, release_id: &str, version_id: &str) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.lock()?;
        if !state.version_exists(service_id, version_id) {
            return Err(StoreError::Reference(format!("version [{}][{}] does not exist", service_id, version_id)));
        }
        let rel = state.releases
                       .get_mut(&(service_id.to_string(), release_id.to_string()))
                       .ok_or_else(|| StoreError::NotFound(format!("service release [{}][{}]", service_id, release_id)))?;
        rel.version_id = version_id.to_string();
        rel.time_updated = now;
        Ok(())
    }

    fn get_service_platform_config(&self, _user: &AdminUser, service_id: &str, version_id: &str) -> Result<JsonValue> {
        let state = self.lock()?;
        match VersionRef::parse(version_id) {
            VersionRef::Develop => Ok(state.services
                                           .get(service_id)
                                           .map(|r| r.config.clone())
                                           .filter(|c| !c.is_null())
                                           .unwrap_or_else(|| json!({}))),
            VersionRef::Version(v) => state.versions
                                           .get(&(service_id.to_string(), v.to_string()))
                                           .map(|ver| ver.config.clone())
                                           .ok_or_else(|| StoreError::NotFound(format!("service config [{}][{}]",
                                                                                       service_id, v))),
        }
    }

    fn update_service_platform_config(&self, _user: &AdminUser, service_id: &str, config: &JsonValue) -> Result<()> {
        let mut state = self.lock()?;
        state.service_mut(service_id)?.config = config.clone();
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct CacheRow {
    value: JsonValue,
    expires: i64,
}

/// Cache en memoria con las mismas reglas de claves y expiración que la
/// implementación persistente.
pub struct InMemoryCache {
    rows: Mutex<HashMap<String, CacheRow>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { rows: Mutex::new(HashMap::new()),
               clock }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, CacheRow>>> {
        self.rows
            .lock()
            .map_err(|e| StoreError::Backend(format!("mutex poisoned: {:?}", e).into()))
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpiringCache for InMemoryCache {
    fn get(&self, key: &str, default: JsonValue) -> Result<JsonValue> {
        if !is_valid_key(key) {
            return Ok(default);
        }
        let now = self.clock.now();
        let rows = self.lock()?;
        Ok(match rows.get(key) {
               Some(r) if is_live(r.expires, now) => r.value.clone(),
               _ => default,
           })
    }

    fn set(&self, key: &str, value: &JsonValue, ttl: Option<Duration>) -> Result<bool> {
        if !is_valid_key(key) {
            return Ok(false);
        }
        let now = self.clock.now();
        let row = CacheRow { value: value.clone(),
                             expires: expires_at(now, ttl) };
        self.lock()?.insert(key.to_string(), row);
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        if !is_valid_key(key) {
            return Ok(false);
        }
        Ok(self.lock()?.remove(key).is_some())
    }

    fn clear(&self) -> Result<bool> {
        self.lock()?.clear();
        Ok(true)
    }

    fn get_multiple(&self, keys: &[&str]) -> Result<IndexMap<String, JsonValue>> {
        let now = self.clock.now();
        let rows = self.lock()?;
        let mut out = IndexMap::new();
        for key in keys {
            if let Some(r) = rows.get(*key) {
                if is_live(r.expires, now) {
                    out.insert(key.to_string(), r.value.clone());
                }
            }
        }
        Ok(out)
    }

    fn set_multiple(&self, values: &IndexMap<String, JsonValue>, ttl: Option<Duration>) -> Result<bool> {
        if values.keys().any(|k| !is_valid_key(k)) {
            return Ok(false);
        }
        let expires = expires_at(self.clock.now(), ttl);
        let mut rows = self.lock()?;
        for (k, v) in values {
            rows.insert(k.clone(), CacheRow { value: v.clone(), expires });
        }
        Ok(true)
    }

    fn delete_multiple(&self, keys: &[&str]) -> Result<bool> {
        let mut rows = self.lock()?;
        let mut deleted = 0;
        for key in keys.iter().filter(|k| is_valid_key(k)) {
            if rows.remove(*key).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted > 0)
    }

    fn has(&self, key: &str) -> Result<bool> {
        if !is_valid_key(key) {
            return Ok(false);
        }
        let now = self.clock.now();
        let rows = self.lock()?;
        Ok(rows.get(key).map(|r| is_live(r.expires, now)).unwrap_or(false))
    }
}
