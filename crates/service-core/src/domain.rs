// Archivo: domain.rs
// Propósito: registros del dominio (meta del borrador, versiones, releases)
// tal como los devuelve el almacén.
use crate::document::{merge_over_defaults, DEFAULT_META};
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Meta del borrador mutable. Los campos conocidos se tipan; el resto del
/// blob se conserva en `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftMeta {
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub time_created: i64,
    #[serde(default)]
    pub time_updated: i64,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl DraftMeta {
    /// Construye la meta a partir del blob almacenado, fusionado sobre la
    /// plantilla por defecto.
    pub fn from_stored(stored: &JsonValue) -> Result<Self> {
        let merged = merge_over_defaults(&DEFAULT_META, stored);
        Ok(serde_json::from_value(merged)?)
    }

    pub fn to_json(&self) -> Result<JsonValue> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Meta de una versión inmutable: sólo columnas de la fila.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMeta {
    pub service_id: String,
    pub version_id: String,
    pub release_id: Option<String>,
    pub version_tag: Option<String>,
    pub time_created: i64,
    pub time_updated: i64,
}

/// La meta tiene dos representaciones según el direccionamiento: el blob del
/// borrador o las columnas de la versión.
///
/// `Version` va primero: al deserializar, la meta del borrador acepta
/// cualquier objeto.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceMeta {
    Version(VersionMeta),
    Draft(DraftMeta),
}

/// Snapshot inmutable del borrador.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceVersion {
    pub service_id: String,
    pub version_id: String,
    pub version_tag: Option<String>,
    pub release_id: Option<String>,
    pub workflow: JsonValue,
    pub config: JsonValue,
    pub time_created: i64,
    pub time_updated: i64,
}

impl ServiceVersion {
    pub fn meta(&self) -> VersionMeta {
        VersionMeta { service_id: self.service_id.clone(),
                      version_id: self.version_id.clone(),
                      release_id: self.release_id.clone(),
                      version_tag: self.version_tag.clone(),
                      time_created: self.time_created,
                      time_updated: self.time_updated }
    }
}

/// Puntero mutable a una versión, con metadatos de despliegue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRelease {
    pub service_id: String,
    pub release_id: String,
    pub platform_id: String,
    pub version_id: String,
    #[serde(rename = "type")]
    pub release_type: String,
    pub stage: String,
    pub alias: String,
    pub time_created: i64,
    pub time_updated: i64,
}
