// Archivo: identity.rs
// Propósito: identidad del solicitante y el único control de propiedad que
// consume el almacén (owner por email o pertenencia a la lista de admins).
use crate::domain::DraftMeta;
use serde::{Deserialize, Serialize};

/// Usuario administrador que invoca las operaciones del almacén.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
}

impl AdminUser {
    pub fn new(id: i64, username: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { id,
               username: username.into(),
               name: name.into(),
               email: email.into() }
    }

    /// `true` si el email coincide con el owner del servicio.
    pub fn is_owner(&self, meta: &DraftMeta) -> bool {
        self.email == meta.owner
    }

    /// `true` si el email figura en la lista de admins del servicio.
    pub fn is_admin(&self, meta: &DraftMeta) -> bool {
        meta.admins.iter().any(|a| a == &self.email)
    }

    pub fn is_owner_or_admin(&self, meta: &DraftMeta) -> bool {
        self.is_owner(meta) || self.is_admin(meta)
    }
}

impl std::fmt::Display for AdminUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}][{}]", self.username, self.email)
    }
}
