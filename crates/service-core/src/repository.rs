// Archivo: repository.rs
// Propósito: contratos que implementan los almacenes concretos (Diesel, en
// memoria): el proveedor de datos de servicios (borrador, versiones,
// releases) y la cache con expiración.
use crate::domain::{DraftMeta, ServiceMeta, ServiceRelease, VersionMeta};
use crate::errors::{Result, StoreError};
use crate::identity::AdminUser;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Almacén del documento de servicio, sus versiones inmutables y sus
/// releases.
///
/// Los fallos se reportan como `Err`: `NotFound`, `NotAuthorized`,
/// `Conflict`, `Reference` o el error del backend sin modificar.
pub trait ServiceDataProvider: Send + Sync {
    /// Metas de todos los servicios de los que `user` es owner o admin.
    fn get_all_services(&self, user: &AdminUser) -> Result<Vec<DraftMeta>>;

    /// Crea el borrador: deriva el id del nombre, fusiona `workflow` sobre la
    /// plantilla y deja `config` vacío. `Conflict` si el id ya existe.
    fn create_new_service(&self,
                          user: &AdminUser,
                          service_name: &str,
                          admins: Vec<String>,
                          is_private: bool,
                          workflow: &JsonValue)
                          -> Result<String>;

    /// Borra params, releases, versiones y el borrador en una transacción.
    /// Exige owner o admin.
    fn delete_service(&self, user: &AdminUser, service_id: &str) -> Result<()>;

    /// Workflow del borrador (`develop`) o de una versión, fusionado sobre la
    /// plantilla. Exige owner o admin.
    fn get_service_data(&self, user: &AdminUser, service_id: &str, version_id: &str) -> Result<JsonValue>;

    /// Sobrescribe el workflow del borrador, con `time_updated` actualizado.
    fn save_service_data(&self, user: &AdminUser, service_id: &str, data: JsonValue) -> Result<JsonValue>;

    /// Meta del borrador (sin versión o `develop`) o columnas de la versión.
    fn get_service_meta(&self, user: &AdminUser, service_id: &str, version_id: Option<&str>) -> Result<ServiceMeta>;

    /// Sobrescribe la meta del borrador, con `time_updated` actualizado.
    fn save_service_meta(&self, user: &AdminUser, service_id: &str, meta: JsonValue) -> Result<JsonValue>;

    /// Registra en la versión la release de la que forma parte.
    fn mark_version_as_release(&self,
                               user: &AdminUser,
                               service_id: &str,
                               version_id: &str,
                               release_id: &str)
                               -> Result<VersionMeta>;

    /// Ids de versión del servicio, ascendentes.
    fn get_all_service_versions(&self, user: &AdminUser, service_id: &str) -> Result<Vec<String>>;

    /// Crea una versión inmutable con el siguiente id de la secuencia. El
    /// workflow y la config se guardan tal cual, sin fusión.
    fn create_service_version(&self,
                              user: &AdminUser,
                              service_id: &str,
                              workflow: &JsonValue,
                              config: &JsonValue,
                              version_tag: Option<&str>)
                              -> Result<String>;

    /// Crea una release apuntando a una versión existente (`Reference` si no
    /// existe).
    #[allow(clippy::too_many_arguments)]
    fn create_release(&self,
                      user: &AdminUser,
                      service_id: &str,
                      platform_id: &str,
                      release_type: &str,
                      stage: &str,
                      alias: &str,
                      version_id: &str)
                      -> Result<String>;

    fn get_release_data(&self, user: &AdminUser, service_id: &str, release_id: &str) -> Result<ServiceRelease>;

    /// Releases del servicio, ascendentes por id.
    fn get_all_releases(&self, user: &AdminUser, service_id: &str) -> Result<Vec<ServiceRelease>>;

    /// Cambia sólo `type`/`stage`; la versión apuntada no cambia.
    fn promote_release(&self,
                       user: &AdminUser,
                       service_id: &str,
                       release_id: &str,
                       release_type: &str,
                       stage: &str)
                       -> Result<()>;

    /// Reapunta la release a otra versión existente; `type`/`stage` no
    /// cambian.
    fn set_release_version(&self, user: &AdminUser, service_id: &str, release_id: &str, version_id: &str) -> Result<()>;

    /// Config del borrador (`{}` si no tiene) o de una versión (`NotFound`
    /// si la versión no existe).
    fn get_service_platform_config(&self, user: &AdminUser, service_id: &str, version_id: &str) -> Result<JsonValue>;

    /// Sobrescribe sólo la config del borrador.
    fn update_service_platform_config(&self, user: &AdminUser, service_id: &str, config: &JsonValue) -> Result<()>;

    /// Atajo: meta del borrador ya tipada.
    fn get_draft_meta(&self, user: &AdminUser, service_id: &str) -> Result<DraftMeta> {
        match self.get_service_meta(user, service_id, None)? {
            ServiceMeta::Draft(m) => Ok(m),
            ServiceMeta::Version(v) => Err(StoreError::NotFound(format!("draft meta [{}] (got version [{}])",
                                                                        service_id, v.version_id))),
        }
    }
}

/// Control de propiedad compartido por las implementaciones.
pub fn ensure_owner_or_admin(user: &AdminUser, meta: &DraftMeta, service_id: &str, action: &str) -> Result<()> {
    if user.is_owner_or_admin(meta) {
        return Ok(());
    }
    Err(StoreError::NotAuthorized(format!("user {} is not allowed to {} service [{}]", user, action, service_id)))
}

/// Cache clave/valor con expiración absoluta por entrada.
///
/// Las claves inválidas no son errores: `get` devuelve el default y las
/// escrituras/borrados devuelven `false`. Sólo los fallos del backend llegan
/// como `Err`.
pub trait ExpiringCache: Send + Sync {
    fn get(&self, key: &str, default: JsonValue) -> Result<JsonValue>;

    /// Upsert. Sin TTL (o TTL cero) la entrada se escribe ya expirada.
    fn set(&self, key: &str, value: &JsonValue, ttl: Option<Duration>) -> Result<bool>;

    fn delete(&self, key: &str) -> Result<bool>;

    fn clear(&self) -> Result<bool>;

    /// Sólo las entradas vigentes, en el orden pedido.
    fn get_multiple(&self, keys: &[&str]) -> Result<IndexMap<String, JsonValue>>;

    /// Todo o nada: si alguna clave es inválida no se escribe ninguna.
    fn set_multiple(&self, values: &IndexMap<String, JsonValue>, ttl: Option<Duration>) -> Result<bool>;

    /// `true` si se borró al menos una fila.
    fn delete_multiple(&self, keys: &[&str]) -> Result<bool>;

    fn has(&self, key: &str) -> Result<bool>;
}
