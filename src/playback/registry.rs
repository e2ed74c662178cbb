use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use tracing::debug;

use crate::playback::queue::GuildQueue;

/// Mapa proceso-global de guild a su cola de reproducción.
///
/// Dueño exclusivo del ciclo de vida de cada [`GuildQueue`]: una cola no existe
/// fuera del registro. Las entradas nacen en el primer `enqueue` de un guild y
/// mueren cuando la cola se vacía o con `stop`.
///
/// Los locks interiores son síncronos y nunca se retienen a través de un
/// `.await`; quien necesite el transporte lo clona fuera del lock.
pub struct QueueRegistry<T> {
    queues: DashMap<GuildId, Arc<Mutex<GuildQueue<T>>>>,
}

impl<T> QueueRegistry<T> {
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
        }
    }

    /// Devuelve la cola del guild, creándola con `factory` si no existe.
    ///
    /// La comprobación de existencia y la inserción son atómicas (entry API):
    /// dos primeros-`enqueue` concurrentes para el mismo guild producen una
    /// única cola.
    pub fn get_or_create(
        &self,
        guild_id: GuildId,
        factory: impl FnOnce() -> GuildQueue<T>,
    ) -> Arc<Mutex<GuildQueue<T>>> {
        self.queues
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("🆕 Cola creada para guild {guild_id}");
                Arc::new(Mutex::new(factory()))
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Mutex<GuildQueue<T>>>> {
        self.queues.get(&guild_id).map(|entry| entry.clone())
    }

    /// Elimina la entrada del guild. Idempotente: sin entrada, no hace nada.
    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<Mutex<GuildQueue<T>>>> {
        self.queues.remove(&guild_id).map(|(_, queue)| queue)
    }

    /// Elimina la entrada solo si su cola sigue vacía.
    ///
    /// Comprobación y borrado atómicos respecto al mapa: un `enqueue` que se
    /// cuele justo antes mantiene la cola viva y el desmontaje se aborta.
    pub fn remove_if_empty(&self, guild_id: GuildId) -> Option<Arc<Mutex<GuildQueue<T>>>> {
        self.queues
            .remove_if(&guild_id, |_, queue| queue.lock().is_empty())
            .map(|(_, queue)| queue)
    }
}

impl<T> Default for QueueRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
