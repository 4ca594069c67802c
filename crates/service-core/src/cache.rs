// Archivo: cache.rs
// Propósito: reglas de la cache con expiración: formato de claves, cálculo
// de `expires` y evaluación de vigencia. Las implementaciones concretas
// (memoria, Diesel) comparten estas funciones.
use std::time::Duration;

/// Caracteres reservados por la sintaxis de plantillas del host.
pub const RESERVED_KEY_CHARS: [char; 8] = ['{', '}', '(', ')', '/', '\\', '@', ':'];

/// Valor de `expires` para escrituras sin TTL: la entrada queda expirada en
/// cualquier lectura posterior.
pub const EXPIRES_TOMBSTONE: i64 = 0;

/// Una clave es válida si no contiene ninguno de los caracteres reservados.
pub fn is_valid_key(key: &str) -> bool {
    !key.chars().any(|c| RESERVED_KEY_CHARS.contains(&c))
}

/// `expires` absoluto para una escritura en `now`. Sin TTL, o con TTL cero,
/// se escribe el tombstone. Las fracciones de segundo se redondean hacia
/// arriba y los TTL enormes saturan en `i64::MAX`.
pub fn expires_at(now: i64, ttl: Option<Duration>) -> i64 {
    match ttl {
        Some(d) if !d.is_zero() => {
            let secs = d.as_secs().saturating_add(u64::from(d.subsec_nanos() > 0));
            now.saturating_add(i64::try_from(secs).unwrap_or(i64::MAX))
        }
        _ => EXPIRES_TOMBSTONE,
    }
}

/// Una entrada es visible mientras `expires` no sea el tombstone y no haya
/// quedado atrás (`expires == now` todavía es visible).
pub fn is_live(expires: i64, now: i64) -> bool {
    expires != EXPIRES_TOMBSTONE && expires >= now
}
