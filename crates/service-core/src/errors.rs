// Archivo: errors.rs
// Propósito: definir los errores del almacén de servicios y el alias
// Result<T> usado por todas las APIs del workspace.
use thiserror::Error;

/// Errores del almacén de servicios, versiones, releases y cache.
///
/// - `NotFound`: servicio, versión, release, meta o config inexistente.
/// - `NotAuthorized`: el usuario no es owner ni admin del servicio.
/// - `InvalidInput`: datos de entrada mal formados.
/// - `Conflict`: el id ya existe (por ejemplo al crear un servicio).
/// - `Reference`: una release apunta a una versión inexistente.
/// - `Backend`: error del driver de base de datos, sin modificar.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Entidad no encontrada o expirada.
    #[error("No encontrado: {0}")]
    NotFound(String),
    /// El solicitante no es owner ni admin.
    #[error("No autorizado: {0}")]
    NotAuthorized(String),
    /// Entrada inválida (clave de cache, nombre de servicio vacío, ...).
    #[error("Entrada inválida: {0}")]
    InvalidInput(String),
    /// Colisión de identificadores.
    #[error("Conflicto: {0}")]
    Conflict(String),
    /// Referencia a una versión que no existe.
    #[error("Referencia inválida: {0}")]
    Reference(String),
    /// Documento JSON imposible de (de)serializar.
    #[error("Error de serialización: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Error del backend; se conserva el error original como `source`.
    #[error("Error de almacenamiento: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// No se pudo obtener una conexión del pool.
    #[error("Error de pool: {0}")]
    Pool(String),
}

impl StoreError {
    /// Envuelve un error del driver sin alterarlo.
    pub fn backend<E>(err: E) -> Self
        where E: std::error::Error + Send + Sync + 'static
    {
        StoreError::Backend(Box::new(err))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, StoreError>;
