use thiserror::Error;

/// Errores del coordinador de reproducción.
///
/// Los mensajes en `Display` son aptos para mostrarse directamente al usuario;
/// el dispatcher decide con [`PlaybackError::is_user_error`] si responde con el
/// texto literal o con un mensaje genérico tras loguear el detalle.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("conéctate a un canal de voz primero")]
    NoVoiceChannel,

    #[error("falta la referencia de la canción")]
    MissingArgument,

    #[error("no hay una cola activa en este servidor")]
    NoActiveQueue,

    /// Pop sobre una cola vacía. Si los invariantes se mantienen, nunca llega
    /// al usuario: observarlo es un defecto.
    #[error("la cola está vacía")]
    EmptyQueue,

    #[error("la cola está llena (máximo {0} canciones)")]
    QueueFull(usize),

    #[error("no se pudo obtener el audio: {0}")]
    Resolution(String),

    #[error("no se pudo unir al canal de voz: {0}")]
    Join(String),

    #[error("error de reproducción: {0}")]
    Playback(String),
}

impl PlaybackError {
    /// Errores causados por la entrada del usuario: se responden tal cual y no
    /// mutan ninguna cola.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NoVoiceChannel
                | Self::MissingArgument
                | Self::NoActiveQueue
                | Self::QueueFull(_)
        )
    }
}
