//! Crate `service-core`: tipos y contratos del almacén de servicios
//!
//! Define el documento de servicio (borrador con workflow, meta y config),
//! sus versiones inmutables y las releases que apuntan a ellas, además de
//! las reglas de la cache con expiración. Las implementaciones concretas
//! viven en `service-persistence`; aquí hay además una implementación en
//! memoria útil para pruebas (`InMemoryServiceDataProvider`,
//! `InMemoryCache`).
//!
//! Diseño resumido:
//! - Fusión al leer: workflow y meta se fusionan sobre plantillas por
//!   defecto en cada lectura; lo almacenado nunca se reescribe.
//! - Secuencias densas por servicio (`00000001`, `00000002`, ...) asignadas
//!   en la misma transacción que la inserción.
//! - La meta tiene dos formas (`ServiceMeta::Draft` / `ServiceMeta::Version`)
//!   según se direccione el borrador o una versión.
//!
//! Ejemplo rápido:
//! ```rust
//! use service_core::{AdminUser, InMemoryServiceDataProvider, ServiceDataProvider, DEVELOP_VERSION};
//! use serde_json::json;
//! let store = InMemoryServiceDataProvider::new();
//! let user = AdminUser::new(1, "admin", "Admin", "admin@example.com");
//! let id = store.create_new_service(&user, "Demo", vec![], false, &json!({})).unwrap();
//! let wf = store.get_service_data(&user, &id, DEVELOP_VERSION).unwrap();
//! assert_eq!(wf["name"], "Demo");
//! ```
pub mod cache;
pub mod clock;
pub mod document;
pub mod domain;
pub mod errors;
pub mod identity;
pub mod params;
pub mod repository;
pub mod sequence;
pub mod stubs;

pub use cache::EXPIRES_TOMBSTONE;
pub use clock::{Clock, ManualClock, SystemClock};
pub use document::{VersionRef, DEFAULT_META, DEFAULT_WORKFLOW, DEVELOP_VERSION};
pub use domain::*;
pub use errors::*;
pub use identity::AdminUser;
pub use params::{LevelType, ParamsScope, ScopeType, ServiceParams, ServiceParamsFactory, SimpleParams};
pub use repository::*;
pub use sequence::SequenceKind;
pub use stubs::*;
