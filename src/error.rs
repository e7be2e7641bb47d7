use thiserror::Error;

/// Errores que un comando puede devolver al usuario.
///
/// Todos se renderizan en la frontera de comandos (`bot::handlers`) como un
/// embed de error; ninguno debe tumbar el proceso.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    /// Posición fuera de `[1, len]`. La cola no se modifica.
    #[error("No existe la posición {index} en la cola (hay {len} canciones)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Rango inválido: `from < 1`, `to > len` o `from > to`. La cola no se modifica.
    #[error("El rango {from}-{to} no es válido para una cola de {len} canciones")]
    RangeOutOfBounds { from: usize, to: usize, len: usize },

    /// La búsqueda externa falló; se propaga tal cual al usuario.
    #[error("{0}")]
    Resolution(String),

    /// Comando contra una sesión inexistente o destruida.
    #[error("{0}")]
    InvalidState(String),

    /// Solo para logs y notificaciones: nunca se devuelve a un comando.
    #[error("No se pudo reconectar al canal de voz tras {attempts} intentos")]
    ReconnectExhausted { attempts: u32 },

    #[error("Error de transporte de voz: {0}")]
    Transport(String),
}

impl PlayerError {
    pub fn no_session() -> Self {
        Self::InvalidState("No estoy conectado a ningún canal de voz".to_string())
    }

    pub fn is_index_error(&self) -> bool {
        matches!(
            self,
            Self::IndexOutOfRange { .. } | Self::RangeOutOfBounds { .. }
        )
    }
}

pub type PlayerResult<T> = std::result::Result<T, PlayerError>;
