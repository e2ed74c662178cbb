//! Núcleo de reproducción por servidor: cola FIFO, registro de colas y el
//! controlador que las orquesta.
//!
//! Los colaboradores externos (resolución de streams, transporte de voz,
//! notificaciones al usuario) entran por los traits de este módulo, de modo que
//! el controlador se puede ejercitar en tests con implementaciones falsas.

pub mod controller;
pub mod queue;
pub mod registry;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};

use crate::error::PlaybackError;

/// Identifica una reproducción concreta: el guild y la generación de la cola en
/// el momento de emitir `play`.
///
/// La generación avanza con cada pop/clear, así que un evento Idle que llegue
/// con un ticket viejo (por ejemplo, el que provoca el `stop` de un `!skip`) se
/// reconoce como obsoleto y se ignora en vez de avanzar la cola dos veces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayTicket {
    pub guild_id: GuildId,
    pub generation: u64,
}

/// Resuelve una referencia textual en un stream reproducible.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    type Stream: Send;

    async fn resolve(&self, reference: &str) -> Result<Self::Stream, PlaybackError>;
}

/// Sesión de voz viva para un guild.
///
/// Reúne lo que la capa de voz expone sobre una conexión: reproducir un stream,
/// detener la reproducción y destruir la sesión. El handle debe ser barato de
/// clonar porque el controlador lo saca del lock antes de cada `await`.
#[async_trait]
pub trait TransportHandle: Clone + Send + Sync + 'static {
    type Stream: Send;

    /// Reproduce el stream. El ticket viaja con el evento de fin de pista para
    /// que el controlador pueda descartar notificaciones obsoletas.
    async fn play(&self, stream: Self::Stream, ticket: PlayTicket) -> Result<(), PlaybackError>;

    /// Detiene la pista actual, si la hay.
    async fn stop(&self);

    /// Destruye la sesión de voz (desconecta del canal).
    async fn destroy(&self);
}

/// Establece sesiones de voz.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    type Transport: TransportHandle;

    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Self::Transport, PlaybackError>;
}

/// Sumidero de texto hacia quien pidió la canción (en producción, el canal de
/// Discord desde el que llegó el comando).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str);
}
