// Archivo: params.rs
// Propósito: parámetros por alcance (request, sesión, instalación, usuario)
// asociados a un servicio. El contrato es un blob JSON por alcance; los
// helpers de nombre/valor se construyen encima.
use crate::errors::{Result, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    Request,
    Session,
    Installation,
    User,
}

impl ScopeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::Request => "request",
            ScopeType::Session => "session",
            ScopeType::Installation => "installation",
            ScopeType::User => "user",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelType {
    Service,
    Block,
    Component,
}

impl LevelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LevelType::Service => "service",
            LevelType::Block => "block",
            LevelType::Component => "component",
        }
    }
}

/// Alcance completo de un blob de parámetros: clave compuesta de cuatro
/// columnas en `service_params`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamsScope {
    pub service_id: String,
    pub scope_type: ScopeType,
    pub level_type: LevelType,
    pub key: String,
}

impl ParamsScope {
    pub fn new(service_id: impl Into<String>, scope_type: ScopeType, level_type: LevelType, key: impl Into<String>) -> Self {
        Self { service_id: service_id.into(),
               scope_type,
               level_type,
               key: key.into() }
    }
}

impl std::fmt::Display for ParamsScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f,
               "[{}][{}][{}][{}]",
               self.service_id,
               self.scope_type.as_str(),
               self.level_type.as_str(),
               self.key)
    }
}

/// Parámetros de un alcance concreto.
pub trait ServiceParams: Send + Sync {
    fn scope(&self) -> &ParamsScope;

    /// Blob completo; objeto vacío si el alcance no tiene datos.
    fn get_data(&self) -> Result<Map<String, JsonValue>>;

    /// Reemplaza el blob completo.
    fn store_data(&self, data: &Map<String, JsonValue>) -> Result<()>;

    fn get_service_param(&self, name: &str) -> Result<Option<JsonValue>> {
        Ok(self.get_data()?.get(name).cloned())
    }

    fn set_service_param(&self, name: &str, value: JsonValue) -> Result<()> {
        let mut data = self.get_data()?;
        data.insert(name.to_string(), value);
        self.store_data(&data)
    }
}

/// Entrega los parámetros de un alcance. Las implementaciones mantienen los
/// de alcance `Request` en memoria del proceso.
pub trait ServiceParamsFactory: Send + Sync {
    fn get_service_params(&self, scope: &ParamsScope) -> Arc<dyn ServiceParams>;
}

/// Parámetros sólo en memoria (alcance request y pruebas).
#[derive(Debug)]
pub struct SimpleParams {
    scope: ParamsScope,
    data: Mutex<Map<String, JsonValue>>,
}

impl SimpleParams {
    pub fn new(scope: ParamsScope) -> Self {
        Self { scope,
               data: Mutex::new(Map::new()) }
    }
}

impl ServiceParams for SimpleParams {
    fn scope(&self) -> &ParamsScope {
        &self.scope
    }

    fn get_data(&self) -> Result<Map<String, JsonValue>> {
        let data = self.data
                       .lock()
                       .map_err(|e| StoreError::Backend(format!("mutex poisoned: {:?}", e).into()))?;
        Ok(data.clone())
    }

    fn store_data(&self, data: &Map<String, JsonValue>) -> Result<()> {
        let mut guard = self.data
                            .lock()
                            .map_err(|e| StoreError::Backend(format!("mutex poisoned: {:?}", e).into()))?;
        *guard = data.clone();
        Ok(())
    }
}
