// Archivo: sequence.rs
// Propósito: formato externo de los identificadores de versión y release.
//
// La asignación en sí ocurre en el repositorio concreto, dentro de la misma
// transacción que inserta la fila: dos llamadas concurrentes para el mismo
// servicio nunca obtienen el mismo id.

/// Ancho fijo de los ids: `00000001`.
pub const SEQUENCE_WIDTH: usize = 8;

/// Secuencias independientes por servicio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceKind {
    Version,
    Release,
}

impl SequenceKind {
    pub const ALL: [SequenceKind; 2] = [SequenceKind::Version, SequenceKind::Release];

    /// Nombre con el que se persiste el contador.
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceKind::Version => "version",
            SequenceKind::Release => "release",
        }
    }
}

impl std::fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `7` -> `"00000007"`.
pub fn format_id(n: i64) -> String {
    format!("{:0width$}", n, width = SEQUENCE_WIDTH)
}

/// Siguiente valor a partir del último asignado (`None` si no hay ninguno).
pub fn next_after(last: Option<i64>) -> i64 {
    last.unwrap_or(0) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_zero_padded() {
        assert_eq!(format_id(1), "00000001");
        assert_eq!(format_id(12345678), "12345678");
        assert_eq!(format_id(next_after(None)), "00000001");
        assert_eq!(format_id(next_after(Some(9))), "00000010");
    }
}
