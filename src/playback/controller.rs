use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::PlaybackError;
use crate::playback::queue::{GuildQueue, QueueItem};
use crate::playback::registry::QueueRegistry;
use crate::playback::{Notifier, PlayTicket, SourceResolver, TransportHandle, VoiceGateway};

/// Orquestador de reproducción por guild.
///
/// Atiende los comandos (`enqueue`, `skip`, `stop`, `list`) y la reacción al
/// fin de pista (`on_player_idle`), manteniendo los invariantes de la cola:
/// orden FIFO, a lo sumo una reproducción activa por guild, y desmontaje de la
/// sesión de voz en cuanto la cola queda vacía.
///
/// Todo el estado mutable vive en el [`QueueRegistry`]; los locks interiores
/// son síncronos y se sueltan antes de cada `.await`. Los cruces entre una
/// resolución en vuelo y un `skip`/`stop` concurrente se resuelven con la
/// generación de la cola: cualquier stream o evento que llegue con una
/// generación vieja se descarta.
pub struct PlaybackController<G: VoiceGateway, R> {
    registry: QueueRegistry<G::Transport>,
    gateway: G,
    resolver: R,
    max_queue_size: usize,
    resolve_timeout: Duration,
}

enum Advance {
    Stale,
    Next,
    Empty,
}

impl<G, R> PlaybackController<G, R>
where
    G: VoiceGateway,
    R: SourceResolver<Stream = <G::Transport as TransportHandle>::Stream>,
{
    pub fn new(gateway: G, resolver: R, max_queue_size: usize, resolve_timeout: Duration) -> Self {
        Self {
            registry: QueueRegistry::new(),
            gateway,
            resolver,
            max_queue_size,
            resolve_timeout,
        }
    }

    /// Encola una referencia y, si es la única, arranca su reproducción.
    ///
    /// Falla con [`PlaybackError::NoVoiceChannel`] antes de tocar el registro
    /// si el autor no está en un canal de voz. La primera petición de un guild
    /// une el transporte y crea la cola; las siguientes solo encolan y avisan
    /// al solicitante.
    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        voice_channel: Option<ChannelId>,
        reference: &str,
        requester: Arc<dyn Notifier>,
    ) -> Result<(), PlaybackError> {
        let channel_id = voice_channel.ok_or(PlaybackError::NoVoiceChannel)?;

        let should_start = loop {
            let queue = match self.registry.get(guild_id) {
                Some(queue) => queue,
                None => {
                    // Unirse antes de insertar: si dos primeros-enqueue
                    // compiten, el registro conserva una sola cola y songbird
                    // reutiliza la misma sesión de voz para el guild.
                    let transport = self.gateway.join(guild_id, channel_id).await?;
                    self.registry
                        .get_or_create(guild_id, || GuildQueue::new(transport))
                }
            };

            // Un desmontaje concurrente pudo retirar la entrada entre la
            // lectura y el push; el item habría caído en una cola huérfana y
            // se reintenta sobre la viva.
            if let Some(should_start) =
                self.push_item(&queue, guild_id, reference, &requester)?
            {
                break should_start;
            }
        };

        if should_start {
            self.start_head(guild_id).await?;
        } else {
            requester
                .notify(&format!("➕ Añadido a la cola: {reference}"))
                .await;
        }

        Ok(())
    }

    /// Salta la canción actual. Saltar la última equivale a dejarla terminar:
    /// pop y desmontaje, no "saltar a la nada".
    ///
    /// Devuelve si queda una siguiente canción, para que el dispatcher pueda
    /// redactar su respuesta.
    pub async fn skip(&self, guild_id: GuildId) -> Result<bool, PlaybackError> {
        let queue = self
            .registry
            .get(guild_id)
            .ok_or(PlaybackError::NoActiveQueue)?;

        // Pop antes del stop: el Idle que provoque el stop nace ya con una
        // generación vieja, llegue antes o después de que este skip retome el
        // control, y no puede avanzar la cola una segunda vez.
        let (transport, has_next) = {
            let mut q = queue.lock();
            let transport = q.transport().clone();
            q.pop_head()?;
            (transport, !q.is_empty())
        };
        transport.stop().await;

        if has_next {
            self.start_head(guild_id).await?;
        } else {
            self.teardown(guild_id).await;
        }

        Ok(has_next)
    }

    /// Detiene la reproducción, vacía la cola y desmonta la sesión de voz.
    ///
    /// La entrada se reclama del registro antes de nada: a partir de ahí
    /// ningún comando ni evento puede alcanzar esta cola, y el transporte se
    /// destruye exactamente una vez.
    pub async fn stop(&self, guild_id: GuildId) -> Result<(), PlaybackError> {
        let queue = self
            .registry
            .remove(guild_id)
            .ok_or(PlaybackError::NoActiveQueue)?;

        let transport = queue.lock().transport().clone();
        transport.stop().await;
        queue.lock().clear();
        transport.destroy().await;

        info!("⏹️ Reproducción detenida en guild {guild_id}");
        Ok(())
    }

    /// Referencias encoladas en orden de inserción. Vacío cubre tanto la cola
    /// sin items como el guild sin cola.
    pub fn list(&self, guild_id: GuildId) -> Vec<String> {
        self.registry
            .get(guild_id)
            .map(|queue| queue.lock().references())
            .unwrap_or_default()
    }

    /// Reacción al fin de pista del reproductor: desencola la canción recién
    /// terminada y arranca la siguiente, o desmonta si no queda ninguna.
    ///
    /// Un ticket con generación vieja (la pista la detuvo un `skip`/`stop` que
    /// ya avanzó la cola) se ignora.
    pub async fn on_player_idle(&self, ticket: PlayTicket) {
        let Some(queue) = self.registry.get(ticket.guild_id) else {
            debug!("Idle para guild {} sin cola, ignorado", ticket.guild_id);
            return;
        };

        let advance = {
            let mut q = queue.lock();
            if q.generation() != ticket.generation {
                debug!(
                    "Idle obsoleto en guild {} (gen {} ≠ {}), ignorado",
                    ticket.guild_id,
                    ticket.generation,
                    q.generation()
                );
                Advance::Stale
            } else {
                match q.pop_head() {
                    Ok(done) => {
                        debug!("🏁 Terminó: {}", done.reference);
                        if q.is_empty() {
                            Advance::Empty
                        } else {
                            Advance::Next
                        }
                    }
                    Err(_) => {
                        // Generación al día con cola vacía rompe el invariante
                        // de item activo; no debería ocurrir.
                        error!(
                            "Idle con cola vacía en guild {} (gen {})",
                            ticket.guild_id, ticket.generation
                        );
                        Advance::Stale
                    }
                }
            }
        };

        match advance {
            Advance::Stale => {}
            Advance::Next => {
                if let Err(e) = self.start_head(ticket.guild_id).await {
                    error!(
                        "Error al arrancar la siguiente canción en guild {}: {e}",
                        ticket.guild_id
                    );
                }
            }
            Advance::Empty => self.teardown(ticket.guild_id).await,
        }
    }

    /// Empuja un item en la cola dada y confirma que sigue siendo la entrada
    /// viva del registro.
    ///
    /// Devuelve `Some(arrancar)` si la cola sigue registrada; `None` si un
    /// desmontaje concurrente la retiró entre la lectura del Arc y el push:
    /// el item quedó en una cola huérfana y el llamador debe reintentar.
    fn push_item(
        &self,
        queue: &Arc<Mutex<GuildQueue<G::Transport>>>,
        guild_id: GuildId,
        reference: &str,
        requester: &Arc<dyn Notifier>,
    ) -> Result<Option<bool>, PlaybackError> {
        let should_start = {
            let mut q = queue.lock();
            if q.len() >= self.max_queue_size {
                return Err(PlaybackError::QueueFull(self.max_queue_size));
            }
            q.push(QueueItem::new(reference, requester.clone()));
            // Solo el primer item arranca reproducción; si hay una carga en
            // vuelo, el nuevo item espera su turno.
            q.len() == 1 && !q.is_loading()
        };

        match self.registry.get(guild_id) {
            Some(current) if Arc::ptr_eq(&current, queue) => Ok(Some(should_start)),
            _ => Ok(None),
        }
    }

    /// Resuelve y reproduce la cabeza de la cola sin desencolarla.
    ///
    /// Si la resolución falla (o agota el tiempo), descarta esa cabeza y lo
    /// intenta con la siguiente: una referencia mala nunca atasca la cola.
    /// Bucle iterativo en lugar de recursión para no encajonar el futuro.
    async fn start_head(&self, guild_id: GuildId) -> Result<(), PlaybackError> {
        loop {
            let Some(queue) = self.registry.get(guild_id) else {
                return Ok(());
            };

            let snapshot = {
                let mut q = queue.lock();
                let head = q
                    .head()
                    .map(|item| (item.reference.clone(), item.requester.clone()));
                head.map(|(reference, requester)| {
                    q.begin_load();
                    (reference, requester, q.generation(), q.transport().clone())
                })
            };
            let Some((reference, requester, generation, transport)) = snapshot else {
                self.teardown(guild_id).await;
                return Ok(());
            };

            debug!("🔎 Resolviendo stream para {reference}");
            let resolved = match timeout(self.resolve_timeout, self.resolver.resolve(&reference))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(PlaybackError::Resolution(format!(
                    "tiempo de espera agotado tras {:?}",
                    self.resolve_timeout
                ))),
            };

            // Un skip/stop concurrente avanzó la cola mientras resolvíamos: el
            // stream llega tarde y se descarta en lugar de reproducirse.
            {
                let q = queue.lock();
                if q.generation() != generation {
                    debug!("Resolución obsoleta para {reference}, descartada");
                    return Ok(());
                }
            }

            match resolved {
                Ok(stream) => {
                    queue.lock().finish_load();
                    transport
                        .play(stream, PlayTicket { guild_id, generation })
                        .await?;
                    info!("▶️ Reproduciendo en guild {guild_id}: {reference}");
                    requester
                        .notify(&format!("▶️ Reproduciendo ahora: {reference}"))
                        .await;
                    return Ok(());
                }
                Err(e) => {
                    warn!("❌ No se pudo resolver {reference} en guild {guild_id}: {e}");
                    requester
                        .notify(&format!("❌ No se pudo reproducir {reference}: {e}"))
                        .await;

                    let now_empty = {
                        let mut q = queue.lock();
                        q.pop_head()?;
                        let empty = q.is_empty();
                        if empty {
                            q.finish_load();
                        }
                        empty
                    };
                    if now_empty {
                        self.teardown(guild_id).await;
                        return Ok(());
                    }
                    // Sigue con la nueva cabeza.
                }
            }
        }
    }

    /// Desmonta la sesión de voz de un guild cuya cola quedó vacía: quita la
    /// entrada del registro y destruye el transporte, exactamente una vez.
    ///
    /// La entrada se reclama primero con un borrado condicionado a que la cola
    /// siga vacía; un `enqueue` que se cuele en medio la mantiene viva y el
    /// desmontaje se aborta.
    async fn teardown(&self, guild_id: GuildId) {
        let Some(queue) = self.registry.remove_if_empty(guild_id) else {
            return;
        };
        let transport = queue.lock().transport().clone();
        transport.destroy().await;
        debug!("🧹 Sesión de voz de guild {guild_id} desmontada");
    }
}
