use async_trait::async_trait;
use reqwest::Client;
use songbird::input::{Compose, Input, YoutubeDl};
use tracing::debug;
use url::Url;

use crate::error::PlaybackError;
use crate::playback::SourceResolver;

/// Resolutor de streams respaldado por yt-dlp.
///
/// Un enlace http(s) se pasa tal cual; cualquier otra referencia se trata como
/// búsqueda. Los metadatos se consultan en el momento de resolver para que una
/// referencia mala falle aquí y no al arrancar la pista.
pub struct YtdlResolver {
    client: Client,
}

impl YtdlResolver {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for YtdlResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceResolver for YtdlResolver {
    type Stream = Input;

    async fn resolve(&self, reference: &str) -> Result<Input, PlaybackError> {
        let mut source = match Url::parse(reference) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                YoutubeDl::new(self.client.clone(), reference.to_string())
            }
            Ok(parsed) => {
                return Err(PlaybackError::Resolution(format!(
                    "esquema no soportado: {}",
                    parsed.scheme()
                )))
            }
            Err(_) => YoutubeDl::new_search(self.client.clone(), reference.to_string()),
        };

        let metadata = source
            .aux_metadata()
            .await
            .map_err(|e| PlaybackError::Resolution(e.to_string()))?;
        debug!("🎵 Resuelto {reference} → {:?}", metadata.title);

        Ok(source.into())
    }
}
