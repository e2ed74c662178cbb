//! Capa de voz sobre songbird.
//!
//! [`SongbirdGateway`] une canales de voz y entrega [`SongbirdTransport`], el
//! handle de sesión que el núcleo de reproducción posee mientras la cola del
//! guild exista. Los fines de pista se reenvían como tickets por un canal mpsc
//! que la bomba de eventos de `main` drena hacia el controlador.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::input::Input;
use songbird::{
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::PlaybackError;
use crate::playback::{PlayTicket, TransportHandle, VoiceGateway};

pub struct SongbirdGateway {
    manager: Arc<Songbird>,
    idle_tx: UnboundedSender<PlayTicket>,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>, idle_tx: UnboundedSender<PlayTicket>) -> Self {
        Self { manager, idle_tx }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    type Transport = SongbirdTransport;

    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<SongbirdTransport, PlaybackError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| PlaybackError::Join(e.to_string()))?;
        debug!("🔊 Unido al canal de voz {channel_id} en guild {guild_id}");

        Ok(SongbirdTransport {
            guild_id,
            manager: self.manager.clone(),
            call,
            idle_tx: self.idle_tx.clone(),
        })
    }
}

/// Sesión de voz viva de un guild: el `Call` de songbird más lo necesario para
/// destruirla y para reenviar sus fines de pista.
#[derive(Clone)]
pub struct SongbirdTransport {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<Mutex<Call>>,
    idle_tx: UnboundedSender<PlayTicket>,
}

#[async_trait]
impl TransportHandle for SongbirdTransport {
    type Stream = Input;

    async fn play(&self, stream: Input, ticket: PlayTicket) -> Result<(), PlaybackError> {
        let mut call = self.call.lock().await;
        let handle = call.play_input(stream);
        handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndNotifier {
                    ticket,
                    idle_tx: self.idle_tx.clone(),
                },
            )
            .map_err(|e| PlaybackError::Playback(e.to_string()))?;
        Ok(())
    }

    async fn stop(&self) {
        self.call.lock().await.stop();
    }

    async fn destroy(&self) {
        if let Err(e) = self.manager.remove(self.guild_id).await {
            warn!(
                "No se pudo cerrar la sesión de voz de guild {}: {e}",
                self.guild_id
            );
        }
    }
}

/// Handler de fin de pista: reenvía el ticket de la reproducción terminada
/// hacia el controlador.
struct TrackEndNotifier {
    ticket: PlayTicket,
    idle_tx: UnboundedSender<PlayTicket>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        debug!("🏁 Fin de pista en guild {}", self.ticket.guild_id);
        if self.idle_tx.send(self.ticket).is_err() {
            warn!("Bomba de eventos Idle cerrada; fin de pista descartado");
        }
        None
    }
}
