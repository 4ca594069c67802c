//! Repositorio Diesel que implementa `ServiceDataProvider`: borrador del
//! servicio, versiones inmutables y releases.
use crate::connection::{map_db_err, write_tx, ConnectionProvider, DbConn};
use crate::schema;
use crate::schema::service_data::dsl as data_dsl;
use crate::schema::service_params::dsl as params_dsl;
use crate::schema::service_releases::dsl as rel_dsl;
use crate::schema::service_versions::dsl as ver_dsl;
use crate::sequence::{allocate, drop_sequences, init_sequences};
use diesel::prelude::*;
use serde_json::{json, Value as JsonValue};
use service_core::document::{generate_service_id, initial_meta, initial_workflow, merge_over_defaults, stamp};
use service_core::{ensure_owner_or_admin, AdminUser, Clock, DraftMeta, Result, SequenceKind, ServiceDataProvider,
                   ServiceMeta, ServiceRelease, StoreError, SystemClock, VersionMeta, VersionRef, DEFAULT_WORKFLOW};
use std::sync::Arc;

// Diesel row structs; field order follows the column order in `schema.rs`.
#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::service_data)]
struct ServiceDataRow {
  pub service_id: String,
  pub workflow: String,
  pub meta: String,
  pub config: Option<String>,
}
#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::service_versions)]
struct VersionRow {
  pub service_id: String,
  pub version_id: String,
  pub version_tag: Option<String>,
  pub release_id: Option<String>,
  pub workflow: String,
  pub config: String,
  pub time_created: i64,
  pub time_updated: i64,
}
#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::service_releases)]
struct ReleaseRow {
  pub service_id: String,
  pub release_id: String,
  pub platform_id: String,
  pub version_id: String,
  pub release_type: String,
  pub stage: String,
  pub alias: String,
  pub time_created: i64,
  pub time_updated: i64,
}

impl VersionRow {
  fn meta(&self) -> VersionMeta {
    VersionMeta { service_id: self.service_id.clone(),
                  version_id: self.version_id.clone(),
                  release_id: self.release_id.clone(),
                  version_tag: self.version_tag.clone(),
                  time_created: self.time_created,
                  time_updated: self.time_updated }
  }
}

impl From<ReleaseRow> for ServiceRelease {
  fn from(r: ReleaseRow) -> Self {
    ServiceRelease { service_id: r.service_id,
                     release_id: r.release_id,
                     platform_id: r.platform_id,
                     version_id: r.version_id,
                     release_type: r.release_type,
                     stage: r.stage,
                     alias: r.alias,
                     time_created: r.time_created,
                     time_updated: r.time_updated }
  }
}

fn parse_json(raw: &str) -> Result<JsonValue> {
  Ok(serde_json::from_str(raw)?)
}

fn load_draft(conn: &mut DbConn, service_id: &str) -> Result<Option<ServiceDataRow>> {
  map_db_err(data_dsl::service_data.filter(data_dsl::service_id.eq(service_id))
                                   .first::<ServiceDataRow>(conn)
                                   .optional())
}

fn draft_meta(conn: &mut DbConn, service_id: &str) -> Result<DraftMeta> {
  let row = load_draft(conn, service_id)?.ok_or_else(|| StoreError::NotFound(format!("service meta [{}]", service_id)))?;
  DraftMeta::from_stored(&parse_json(&row.meta)?)
}

fn load_version(conn: &mut DbConn, service_id: &str, version_id: &str) -> Result<Option<VersionRow>> {
  map_db_err(ver_dsl::service_versions.filter(ver_dsl::service_id.eq(service_id))
                                      .filter(ver_dsl::version_id.eq(version_id))
                                      .first::<VersionRow>(conn)
                                      .optional())
}

fn ensure_version(conn: &mut DbConn, service_id: &str, version_id: &str) -> Result<()> {
  let exists = VersionRef::parse(version_id) != VersionRef::Develop && load_version(conn, service_id, version_id)?.is_some();
  if !exists {
    return Err(StoreError::Reference(format!("version [{}][{}] does not exist", service_id, version_id)));
  }
  Ok(())
}

/// Repo Diesel del almacén de servicios.
pub struct DieselServiceStore {
  provider: Arc<ConnectionProvider>,
  clock: Arc<dyn Clock>,
}

impl DieselServiceStore {
  pub fn new(provider: Arc<ConnectionProvider>) -> Self {
    Self::with_clock(provider, Arc::new(SystemClock))
  }

  pub fn with_clock(provider: Arc<ConnectionProvider>, clock: Arc<dyn Clock>) -> Self {
    Self { provider, clock }
  }

  /// Sobrescribe una columna JSON del borrador. `NotFound` si no existe.
  fn update_draft_column(&self, service_id: &str, column: DraftColumn, doc: &JsonValue) -> Result<()> {
    let raw = serde_json::to_string(doc)?;
    let mut conn = self.provider.get_connection()?;
    let target = data_dsl::service_data.filter(data_dsl::service_id.eq(service_id));
    let updated = match column {
      DraftColumn::Workflow => map_db_err(diesel::update(target).set(data_dsl::workflow.eq(&raw)).execute(&mut conn))?,
      DraftColumn::Meta => map_db_err(diesel::update(target).set(data_dsl::meta.eq(&raw)).execute(&mut conn))?,
      DraftColumn::Config => map_db_err(diesel::update(target).set(data_dsl::config.eq(Some(&raw))).execute(&mut conn))?,
    };
    if updated == 0 {
      return Err(StoreError::NotFound(format!("service [{}]", service_id)));
    }
    log::debug!("service [{}]: {:?} saved", service_id, column);
    Ok(())
  }
}

#[derive(Debug, Clone, Copy)]
enum DraftColumn {
  Workflow,
  Meta,
  Config,
}

impl ServiceDataProvider for DieselServiceStore {
  fn get_all_services(&self, user: &AdminUser) -> Result<Vec<DraftMeta>> {
    let mut conn = self.provider.get_connection()?;
    let rows = map_db_err(data_dsl::service_data.order(data_dsl::service_id.asc())
                                                .load::<ServiceDataRow>(&mut conn))?;
    let mut out = Vec::new();
    for row in rows {
      let meta = DraftMeta::from_stored(&parse_json(&row.meta)?)?;
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
    let row = ServiceDataRow { service_id: service_id.clone(),
                               workflow: serde_json::to_string(&initial_workflow(&service_id, service_name, workflow, now))?,
                               meta: serde_json::to_string(&initial_meta(user, &service_id, service_name, admins, is_private, now))?,
                               config: Some(json!({}).to_string()) };
    let mut conn = self.provider.get_connection()?;
    write_tx(&mut conn, |c| {
      map_db_err(diesel::insert_into(data_dsl::service_data).values(&row).execute(c))?;
      init_sequences(c, &service_id)
    }).map_err(|e| match e {
        StoreError::Conflict(_) => StoreError::Conflict(format!("service [{}] already exists", service_id)),
        other => other,
      })?;
    log::info!("service [{}] created by {}", service_id, user);
    Ok(service_id)
  }

  fn delete_service(&self, user: &AdminUser, service_id: &str) -> Result<()> {
    let mut conn = self.provider.get_connection()?;
    write_tx(&mut conn, |c| {
      let meta = draft_meta(c, service_id)?;
      ensure_owner_or_admin(user, &meta, service_id, "delete")?;
      let params = map_db_err(diesel::delete(params_dsl::service_params.filter(params_dsl::service_id.eq(service_id))).execute(c))?;
      let releases = map_db_err(diesel::delete(rel_dsl::service_releases.filter(rel_dsl::service_id.eq(service_id))).execute(c))?;
      let versions = map_db_err(diesel::delete(ver_dsl::service_versions.filter(ver_dsl::service_id.eq(service_id))).execute(c))?;
      drop_sequences(c, service_id)?;
      map_db_err(diesel::delete(data_dsl::service_data.filter(data_dsl::service_id.eq(service_id))).execute(c))?;
      log::info!("service [{}] deleted by {} ({} params, {} releases, {} versions)",
                 service_id,
                 user,
                 params,
                 releases,
                 versions);
      Ok(())
    })
  }

  fn get_service_data(&self, user: &AdminUser, service_id: &str, version_id: &str) -> Result<JsonValue> {
    let mut conn = self.provider.get_connection()?;
    let meta = draft_meta(&mut conn, service_id)?;
    ensure_owner_or_admin(user, &meta, service_id, "open")?;
    let stored = match VersionRef::parse(version_id) {
      VersionRef::Develop => load_draft(&mut conn, service_id)?.map(|r| r.workflow),
      VersionRef::Version(v) => load_version(&mut conn, service_id, v)?.map(|r| r.workflow),
    };
    let raw = stored.ok_or_else(|| StoreError::NotFound(format!("service data [{}][{}]", service_id, version_id)))?;
    log::debug!("service [{}][{}] loaded", service_id, version_id);
    Ok(merge_over_defaults(&DEFAULT_WORKFLOW, &parse_json(&raw)?))
  }

  fn save_service_data(&self, _user: &AdminUser, service_id: &str, mut data: JsonValue) -> Result<JsonValue> {
    stamp(&mut data, "time_updated", self.clock.now());
    self.update_draft_column(service_id, DraftColumn::Workflow, &data)?;
    Ok(data)
  }

  fn get_service_meta(&self, _user: &AdminUser, service_id: &str, version_id: Option<&str>) -> Result<ServiceMeta> {
    let mut conn = self.provider.get_connection()?;
    match version_id.map(VersionRef::parse) {
      Some(VersionRef::Version(v)) => {
        let row = load_version(&mut conn, service_id, v)?
          .ok_or_else(|| StoreError::NotFound(format!("service meta [{}][{}]", service_id, v)))?;
        Ok(ServiceMeta::Version(row.meta()))
      }
      _ => Ok(ServiceMeta::Draft(draft_meta(&mut conn, service_id)?)),
    }
  }

  fn save_service_meta(&self, _user: &AdminUser, service_id: &str, mut meta: JsonValue) -> Result<JsonValue> {
    stamp(&mut meta, "time_updated", self.clock.now());
    self.update_draft_column(service_id, DraftColumn::Meta, &meta)?;
    Ok(meta)
  }

  fn mark_version_as_release(&self,
                             _user: &AdminUser,
                             service_id: &str,
                             version_id: &str,
                             release_id: &str)
                             -> Result<VersionMeta> {
    let mut conn = self.provider.get_connection()?;
    write_tx(&mut conn, |c| {
      let target = ver_dsl::service_versions.filter(ver_dsl::service_id.eq(service_id))
                                            .filter(ver_dsl::version_id.eq(version_id));
      let updated = map_db_err(diesel::update(target).set(ver_dsl::release_id.eq(Some(release_id))).execute(c))?;
      if updated == 0 {
        return Err(StoreError::NotFound(format!("service meta [{}][{}]", service_id, version_id)));
      }
      let row = load_version(c, service_id, version_id)?
        .ok_or_else(|| StoreError::NotFound(format!("service meta [{}][{}]", service_id, version_id)))?;
      Ok(row.meta())
    })
  }

  fn get_all_service_versions(&self, _user: &AdminUser, service_id: &str) -> Result<Vec<String>> {
    let mut conn = self.provider.get_connection()?;
    map_db_err(ver_dsl::service_versions.filter(ver_dsl::service_id.eq(service_id))
                                        .select(ver_dsl::version_id)
                                        .order(ver_dsl::version_id.asc())
                                        .load::<String>(&mut conn))
  }

  fn create_service_version(&self,
                            _user: &AdminUser,
                            service_id: &str,
                            workflow: &JsonValue,
                            config: &JsonValue,
                            version_tag: Option<&str>)
                            -> Result<String> {
    let now = self.clock.now();
    let workflow = serde_json::to_string(workflow)?;
    let config = serde_json::to_string(config)?;
    let mut conn = self.provider.get_connection()?;
    let version_id = write_tx(&mut conn, |c| {
      let version_id = allocate(c, service_id, SequenceKind::Version)?;
      let row = VersionRow { service_id: service_id.to_string(),
                             version_id: version_id.clone(),
                             version_tag: version_tag.map(|s| s.to_string()),
                             release_id: None,
                             workflow,
                             config,
                             time_created: now,
                             time_updated: now };
      map_db_err(diesel::insert_into(ver_dsl::service_versions).values(&row).execute(c))?;
      Ok(version_id)
    })?;
    log::debug!("service [{}]: version {} created", service_id, version_id);
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
    let mut conn = self.provider.get_connection()?;
    let release_id = write_tx(&mut conn, |c| {
      if load_draft(c, service_id)?.is_none() {
        return Err(StoreError::NotFound(format!("service [{}]", service_id)));
      }
      ensure_version(c, service_id, version_id)?;
      let release_id = allocate(c, service_id, SequenceKind::Release)?;
      let row = ReleaseRow { service_id: service_id.to_string(),
                             release_id: release_id.clone(),
                             platform_id: platform_id.to_string(),
                             version_id: version_id.to_string(),
                             release_type: release_type.to_string(),
                             stage: stage.to_string(),
                             alias: alias.to_string(),
                             time_created: now,
                             time_updated: now };
      map_db_err(diesel::insert_into(rel_dsl::service_releases).values(&row).execute(c))?;
      Ok(release_id)
    })?;
    log::info!("service [{}]: release {} -> version {} ({}/{})",
               service_id,
               release_id,
               version_id,
               release_type,
               stage);
    Ok(release_id)
  }

  fn get_release_data(&self, _user: &AdminUser, service_id: &str, release_id: &str) -> Result<ServiceRelease> {
    let mut conn = self.provider.get_connection()?;
    let row = map_db_err(rel_dsl::service_releases.filter(rel_dsl::service_id.eq(service_id))
                                                  .filter(rel_dsl::release_id.eq(release_id))
                                                  .first::<ReleaseRow>(&mut conn)
                                                  .optional())?;
    row.map(ServiceRelease::from)
       .ok_or_else(|| StoreError::NotFound(format!("service release [{}][{}]", service_id, release_id)))
  }

  fn get_all_releases(&self, _user: &AdminUser, service_id: &str) -> Result<Vec<ServiceRelease>> {
    let mut conn = self.provider.get_connection()?;
    let rows = map_db_err(rel_dsl::service_releases.filter(rel_dsl::service_id.eq(service_id))
                                                   .order(rel_dsl::release_id.asc())
                                                   .load::<ReleaseRow>(&mut conn))?;
    Ok(rows.into_iter().map(ServiceRelease::from).collect())
  }

  fn promote_release(&self,
                     _user: &AdminUser,
                     service_id: &str,
                     release_id: &str,
                     release_type: &str,
                     stage: &str)
                     -> Result<()> {
    let now = self.clock.now();
    let mut conn = self.provider.get_connection()?;
    let target = rel_dsl::service_releases.filter(rel_dsl::service_id.eq(service_id))
                                          .filter(rel_dsl::release_id.eq(release_id));
    let updated = map_db_err(diesel::update(target).set((rel_dsl::release_type.eq(release_type),
                                                         rel_dsl::stage.eq(stage),
                                                         rel_dsl::time_updated.eq(now)))
                                                   .execute(&mut conn))?;
    if updated == 0 {
      return Err(StoreError::NotFound(format!("service release [{}][{}]", service_id, release_id)));
    }
    log::info!("service [{}]: release {} promoted to {}/{}", service_id, release_id, release_type, stage);
    Ok(())
  }

  fn set_release_version(&self, _user: &AdminUser, service_id: &str, release_id: &str, version_id: &str) -> Result<()> {
    let now = self.clock.now();
    let mut conn = self.provider.get_connection()?;
    write_tx(&mut conn, |c| {
      ensure_version(c, service_id, version_id)?;
      let target = rel_dsl::service_releases.filter(rel_dsl::service_id.eq(service_id))
                                            .filter(rel_dsl::release_id.eq(release_id));
      let updated = map_db_err(diesel::update(target).set((rel_dsl::version_id.eq(version_id),
                                                           rel_dsl::time_updated.eq(now)))
                                                     .execute(c))?;
      if updated == 0 {
        return Err(StoreError::NotFound(format!("service release [{}][{}]", service_id, release_id)));
      }
      Ok(())
    })?;
    log::info!("service [{}]: release {} now serves version {}", service_id, release_id, version_id);
    Ok(())
  }

  fn get_service_platform_config(&self, _user: &AdminUser, service_id: &str, version_id: &str) -> Result<JsonValue> {
    let mut conn = self.provider.get_connection()?;
    match VersionRef::parse(version_id) {
      VersionRef::Develop => {
        let stored = load_draft(&mut conn, service_id)?.and_then(|r| r.config);
        match stored {
          Some(raw) => {
            let cfg = parse_json(&raw)?;
            Ok(if cfg.is_null() { json!({}) } else { cfg })
          }
          None => Ok(json!({})),
        }
      }
      VersionRef::Version(v) => {
        let row = load_version(&mut conn, service_id, v)?
          .ok_or_else(|| StoreError::NotFound(format!("service config [{}][{}]", service_id, v)))?;
        parse_json(&row.config)
      }
    }
  }

  fn update_service_platform_config(&self, _user: &AdminUser, service_id: &str, config: &JsonValue) -> Result<()> {
    self.update_draft_column(service_id, DraftColumn::Config, config)
  }
}
