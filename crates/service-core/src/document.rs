// Archivo: document.rs
// Propósito: plantillas por defecto del workflow y de la meta, la fusión
// aplicada en cada lectura, el centinela `develop` y la derivación del
// `service_id` a partir del nombre humano.
use crate::errors::{Result, StoreError};
use crate::identity::AdminUser;
use once_cell::sync::Lazy;
use serde_json::{json, Map, Value as JsonValue};

/// Identificador reservado que direcciona el borrador (draft) del servicio
/// en lugar de una versión almacenada. Nunca se persiste como versión.
pub const DEVELOP_VERSION: &str = "develop";

/// Plantilla por defecto del workflow. Los documentos antiguos que no tienen
/// campos nuevos los reciben al leer.
pub static DEFAULT_WORKFLOW: Lazy<Map<String, JsonValue>> = Lazy::new(|| {
    let v = json!({
        "service_id": "",
        "name": "",
        "variables": {},
        "preview_variables": {},
        "packages": [],
        "contexts": [],
        "entities": [],
        "intents": [],
        "blocks": [],
        "fragments": [],
        "configurations": {},
        "time_updated": 0,
        "intents_time_updated": 0
    });
    match v {
        JsonValue::Object(m) => m,
        _ => Map::new(),
    }
});

/// Plantilla por defecto de la meta del borrador.
pub static DEFAULT_META: Lazy<Map<String, JsonValue>> = Lazy::new(|| {
    let v = json!({
        "service_id": "",
        "name": "",
        "description": "",
        "owner": "",
        "admins": [],
        "is_private": false,
        "default_language": "en",
        "supported_locales": ["en-US"],
        "time_created": 0,
        "time_updated": 0
    });
    match v {
        JsonValue::Object(m) => m,
        _ => Map::new(),
    }
});

/// Direccionamiento de un documento: el borrador o una versión concreta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRef<'a> {
    Develop,
    Version(&'a str),
}

impl<'a> VersionRef<'a> {
    pub fn parse(version_id: &'a str) -> Self {
        if version_id == DEVELOP_VERSION {
            VersionRef::Develop
        } else {
            VersionRef::Version(version_id)
        }
    }

    pub fn is_develop(&self) -> bool {
        matches!(self, VersionRef::Develop)
    }
}

impl std::fmt::Display for VersionRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionRef::Develop => f.write_str(DEVELOP_VERSION),
            VersionRef::Version(v) => f.write_str(v),
        }
    }
}

/// Fusión superficial: las claves del documento almacenado pisan las de la
/// plantilla. Función pura; nunca modifica lo almacenado. Un documento que
/// no es un objeto no aporta claves.
pub fn merge_over_defaults(defaults: &Map<String, JsonValue>, stored: &JsonValue) -> JsonValue {
    let mut out = defaults.clone();
    if let JsonValue::Object(doc) = stored {
        for (k, v) in doc {
            out.insert(k.clone(), v.clone());
        }
    }
    JsonValue::Object(out)
}

/// Igual que [`merge_over_defaults`] pero para escrituras: los overrides del
/// llamador sobre la plantilla del workflow.
pub fn workflow_with_overrides(overrides: &JsonValue) -> Map<String, JsonValue> {
    match merge_over_defaults(&DEFAULT_WORKFLOW, overrides) {
        JsonValue::Object(m) => m,
        _ => Map::new(),
    }
}

/// Deriva el `service_id` del nombre: minúsculas, alfanuméricos conservados,
/// cualquier otro tramo se convierte en un único `-`.
pub fn generate_service_id(name: &str) -> Result<String> {
    let mut id = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !id.is_empty() {
                id.push('-');
            }
            pending_dash = false;
            id.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if id.is_empty() {
        return Err(StoreError::InvalidInput(format!("cannot derive service id from name [{}]", name)));
    }
    Ok(id)
}

/// Workflow inicial de un servicio nuevo: overrides del llamador sobre la
/// plantilla, con nombre, id y timestamps.
pub fn initial_workflow(service_id: &str, service_name: &str, overrides: &JsonValue, now: i64) -> JsonValue {
    let mut wf = workflow_with_overrides(overrides);
    wf.insert("name".into(), JsonValue::from(service_name));
    wf.insert("service_id".into(), JsonValue::from(service_id));
    wf.insert("time_updated".into(), JsonValue::from(now));
    wf.insert("intents_time_updated".into(), JsonValue::from(now));
    JsonValue::Object(wf)
}

/// Meta inicial de un servicio nuevo; `user` queda como owner.
pub fn initial_meta(user: &AdminUser,
                    service_id: &str,
                    service_name: &str,
                    admins: Vec<String>,
                    is_private: bool,
                    now: i64)
                    -> JsonValue {
    let mut meta = DEFAULT_META.clone();
    meta.insert("service_id".into(), JsonValue::from(service_id));
    meta.insert("name".into(), JsonValue::from(service_name));
    meta.insert("owner".into(), JsonValue::from(user.email.as_str()));
    meta.insert("admins".into(), JsonValue::from(admins));
    meta.insert("is_private".into(), JsonValue::from(is_private));
    meta.insert("time_created".into(), JsonValue::from(now));
    meta.insert("time_updated".into(), JsonValue::from(now));
    JsonValue::Object(meta)
}

/// Stamp de un campo entero en un documento objeto. Los documentos que no son
/// objetos se reemplazan por un objeto vacío antes del stamp.
pub fn stamp(doc: &mut JsonValue, field: &str, ts: i64) {
    if !doc.is_object() {
        *doc = JsonValue::Object(Map::new());
    }
    if let JsonValue::Object(m) = doc {
        m.insert(field.to_string(), JsonValue::from(ts));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_id_from_name() {
        assert_eq!(generate_service_id("Demo").unwrap(), "demo");
        assert_eq!(generate_service_id("  My  Cool Service!! ").unwrap(), "my-cool-service");
        assert_eq!(generate_service_id("a/b@c").unwrap(), "a-b-c");
        assert!(generate_service_id("!!!").is_err());
    }

    #[test]
    fn merge_keeps_stored_keys_and_fills_missing() {
        let stored = json!({"name": "x", "blocks": [1], "custom": true});
        let merged = merge_over_defaults(&DEFAULT_WORKFLOW, &stored);
        assert_eq!(merged["name"], "x");
        assert_eq!(merged["blocks"], json!([1]));
        assert_eq!(merged["custom"], true);
        assert_eq!(merged["intents"], json!([]));
        // la plantilla no cambia
        assert_eq!(DEFAULT_WORKFLOW["name"], "");
    }

    #[test]
    fn merge_of_non_object_yields_defaults() {
        let merged = merge_over_defaults(&DEFAULT_META, &json!("oops"));
        assert_eq!(merged, JsonValue::Object(DEFAULT_META.clone()));
    }

    #[test]
    fn initial_documents() {
        let user = AdminUser::new(1, "test01", "Test 01", "test01@example.com");
        let wf = initial_workflow("demo", "Demo", &json!({"blocks": ["b"], "name": "ignored"}), 42);
        assert_eq!(wf["name"], "Demo");
        assert_eq!(wf["service_id"], "demo");
        assert_eq!(wf["blocks"], json!(["b"]));
        assert_eq!(wf["intents_time_updated"], 42);
        let meta = initial_meta(&user, "demo", "Demo", vec!["x@example.com".into()], true, 42);
        assert_eq!(meta["owner"], "test01@example.com");
        assert_eq!(meta["admins"], json!(["x@example.com"]));
        assert_eq!(meta["is_private"], true);
        assert_eq!(meta["time_created"], 42);
    }

    #[test]
    fn develop_sentinel() {
        assert!(VersionRef::parse(DEVELOP_VERSION).is_develop());
        assert_eq!(VersionRef::parse("00000001"), VersionRef::Version("00000001"));
    }
}
