//! Despachador de comandos de texto.
//!
//! Capa fina entre Discord y el núcleo de reproducción: parsea el prefijo y el
//! comando, resuelve el canal de voz del autor desde la caché y traduce los
//! errores del controlador a respuestas. Toda la lógica de colas vive en
//! [`PlaybackController`]; aquí solo se formatea texto.

use std::sync::Arc;

use serenity::all::{Context, EventHandler, Message, Ready};
use serenity::async_trait;
use serenity::http::Http;
use serenity::model::id::ChannelId;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::PlaybackError;
use crate::playback::controller::PlaybackController;
use crate::playback::Notifier;
use crate::sources::YtdlResolver;
use crate::voice::SongbirdGateway;

/// Controlador concreto del binario.
pub type Controller = PlaybackController<SongbirdGateway, YtdlResolver>;

pub struct MusicBot {
    config: Arc<Config>,
    controller: Arc<Controller>,
}

impl MusicBot {
    pub fn new(config: Arc<Config>, controller: Arc<Controller>) -> Self {
        Self { config, controller }
    }

    /// Ejecuta un comando y devuelve la respuesta a enviar, si la hay.
    ///
    /// `play` no responde aquí: el notificador del solicitante ya informa al
    /// canal (encolado, reproduciendo, fallo de resolución).
    async fn dispatch(
        &self,
        ctx: &Context,
        msg: &Message,
        command: &str,
        arg: Option<&str>,
    ) -> Result<Option<String>, PlaybackError> {
        // Comandos solo en guilds; los mensajes directos se ignoran.
        let Some(guild_id) = msg.guild_id else {
            return Ok(None);
        };

        match command {
            "play" => {
                let reference = arg.ok_or(PlaybackError::MissingArgument)?;
                let voice_channel = msg.guild(&ctx.cache).and_then(|guild| {
                    guild
                        .voice_states
                        .get(&msg.author.id)
                        .and_then(|state| state.channel_id)
                });
                let notifier = Arc::new(ChannelNotifier {
                    http: ctx.http.clone(),
                    channel_id: msg.channel_id,
                });
                self.controller
                    .enqueue(guild_id, voice_channel, reference, notifier)
                    .await?;
                Ok(None)
            }
            "skip" => {
                let has_next = self.controller.skip(guild_id).await?;
                Ok(Some(if has_next {
                    "⏭️ Canción saltada.".to_string()
                } else {
                    "⏭️ Canción saltada. No quedan más canciones en la cola.".to_string()
                }))
            }
            "queue" => {
                let references = self.controller.list(guild_id);
                if references.is_empty() {
                    Ok(Some("📭 No hay canciones en la cola.".to_string()))
                } else {
                    let mut text = String::from("🎶 Canciones en la cola:\n");
                    for (index, reference) in references.iter().enumerate() {
                        text.push_str(&format!("{}. {}\n", index + 1, reference));
                    }
                    Ok(Some(text))
                }
            }
            "stop" => {
                self.controller.stop(guild_id).await?;
                Ok(Some("⏹️ Reproducción detenida y cola limpiada.".to_string()))
            }
            "help" => Ok(Some(help_text(&self.config.command_prefix))),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("✅ Conectado como {}", ready.user.name);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let content = msg.content.trim().to_string();
        let Some(rest) = content.strip_prefix(&self.config.command_prefix) else {
            return;
        };
        let mut parts = rest.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or("").to_string();
        let arg = parts.next().map(str::trim).filter(|s| !s.is_empty());

        let reply = match self.dispatch(&ctx, &msg, &command, arg).await {
            Ok(reply) => reply,
            Err(e) if e.is_user_error() => Some(format!("❌ {e}")),
            Err(e) => {
                // El fallo queda aislado a este comando y a este guild: se
                // loguea y se responde de forma genérica.
                error!(
                    "Error al procesar {command} en guild {:?}: {e}",
                    msg.guild_id
                );
                Some("⚠️ Ocurrió un error al procesar el comando.".to_string())
            }
        };

        if let Some(text) = reply {
            if let Err(e) = msg.channel_id.say(&ctx.http, text).await {
                warn!("No se pudo responder en el canal {}: {e}", msg.channel_id);
            }
        }
    }
}

fn help_text(prefix: &str) -> String {
    format!(
        "Comandos:\n\
         {prefix}play <enlace o búsqueda>\n\
         {prefix}skip\n\
         {prefix}queue\n\
         {prefix}stop\n\
         {prefix}help"
    )
}

/// Notificador del núcleo hacia el canal de texto desde el que llegó el
/// comando.
pub struct ChannelNotifier {
    http: Arc<Http>,
    channel_id: ChannelId,
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, text: &str) {
        if let Err(e) = self.channel_id.say(&self.http, text).await {
            warn!("No se pudo notificar en el canal {}: {e}", self.channel_id);
        }
    }
}
