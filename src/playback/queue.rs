use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use crate::error::PlaybackError;
use crate::playback::Notifier;

/// Una petición encolada: la referencia textual y el sumidero al que avisar
/// sobre su destino. Inmutable una vez creada.
pub struct QueueItem {
    pub reference: String,
    pub requester: Arc<dyn Notifier>,
}

impl QueueItem {
    pub fn new(reference: impl Into<String>, requester: Arc<dyn Notifier>) -> Self {
        Self {
            reference: reference.into(),
            requester,
        }
    }
}

/// Cola de reproducción de un guild.
///
/// Posee el transporte de voz mientras la cola exista. `items` es estrictamente
/// FIFO: solo crece por la cola y solo se acorta por la cabeza. La cabeza, si
/// existe, es la canción cargada en el reproductor o en proceso de cargarse.
///
/// `generation` avanza con cada pop/clear; junto con el `loading` de una
/// resolución en vuelo, es lo que permite reconocer eventos y streams obsoletos
/// cuando un `skip`/`stop` se cruza con una carga pendiente.
pub struct GuildQueue<T> {
    transport: T,
    items: VecDeque<QueueItem>,
    generation: u64,
    loading: bool,
}

impl<T> GuildQueue<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            items: VecDeque::new(),
            generation: 0,
            loading: false,
        }
    }

    /// Añade al final de la cola.
    pub fn push(&mut self, item: QueueItem) {
        debug!("➕ Encolado: {}", item.reference);
        self.items.push_back(item);
    }

    /// Quita y devuelve la cabeza. Única mutación que acorta la cola por
    /// delante; avanza la generación.
    pub fn pop_head(&mut self) -> Result<QueueItem, PlaybackError> {
        let item = self.items.pop_front().ok_or(PlaybackError::EmptyQueue)?;
        self.generation += 1;
        debug!("➖ Desencolado: {}", item.reference);
        Ok(item)
    }

    /// Vacía la cola entera (usado por `stop`). Avanza la generación para
    /// invalidar cualquier carga o evento pendiente.
    pub fn clear(&mut self) {
        self.items.clear();
        self.generation += 1;
        debug!("🗑️ Cola limpiada");
    }

    pub fn head(&self) -> Option<&QueueItem> {
        self.items.front()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Referencias en orden de inserción, para `!queue`.
    pub fn references(&self) -> Vec<String> {
        self.items.iter().map(|item| item.reference.clone()).collect()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Marca que hay una resolución de stream en vuelo para la cabeza.
    pub fn begin_load(&mut self) {
        self.loading = true;
    }

    pub fn finish_load(&mut self) {
        self.loading = false;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct NullNotifier;

    #[async_trait]
    impl Notifier for NullNotifier {
        async fn notify(&self, _text: &str) {}
    }

    fn item(reference: &str) -> QueueItem {
        QueueItem::new(reference, Arc::new(NullNotifier))
    }

    #[test]
    fn conserva_orden_fifo() {
        let mut queue = GuildQueue::new(());
        queue.push(item("a"));
        queue.push(item("b"));
        queue.push(item("c"));

        assert_eq!(queue.references(), vec!["a", "b", "c"]);
        assert_eq!(queue.pop_head().unwrap().reference, "a");
        assert_eq!(queue.pop_head().unwrap().reference, "b");
        assert_eq!(queue.references(), vec!["c"]);
    }

    #[test]
    fn pop_sobre_vacia_falla() {
        let mut queue = GuildQueue::new(());
        assert!(matches!(queue.pop_head(), Err(PlaybackError::EmptyQueue)));
    }

    #[test]
    fn la_generacion_avanza_con_pop_y_clear() {
        let mut queue = GuildQueue::new(());
        assert_eq!(queue.generation(), 0);

        queue.push(item("a"));
        queue.push(item("b"));
        assert_eq!(queue.generation(), 0);

        queue.pop_head().unwrap();
        assert_eq!(queue.generation(), 1);

        queue.clear();
        assert_eq!(queue.generation(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn la_cabeza_no_se_consume_al_mirarla() {
        let mut queue = GuildQueue::new(());
        queue.push(item("a"));
        assert_eq!(queue.head().unwrap().reference, "a");
        assert_eq!(queue.len(), 1);
    }
}
