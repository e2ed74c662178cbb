use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use tracing::{error, info};

mod bot;
mod config;
mod error;
mod playback;
mod sources;
mod voice;

use crate::bot::MusicBot;
use crate::config::Config;
use crate::playback::controller::PlaybackController;
use crate::sources::YtdlResolver;
use crate::voice::SongbirdGateway;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fila_music=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando fila-music v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let manager = Songbird::serenity();
    let (idle_tx, mut idle_rx) = tokio::sync::mpsc::unbounded_channel();

    let controller = Arc::new(PlaybackController::new(
        SongbirdGateway::new(manager.clone(), idle_tx),
        YtdlResolver::new(),
        config.max_queue_size,
        Duration::from_secs(config.resolve_timeout_secs),
    ));

    // Bomba de eventos Idle: los fines de pista llegan por el canal y avanzan
    // la cola de su guild.
    {
        let controller = controller.clone();
        tokio::spawn(async move {
            while let Some(ticket) = idle_rx.recv().await {
                controller.on_player_idle(ticket).await;
            }
        });
    }

    let handler = MusicBot::new(config.clone(), controller);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(manager)
        .await?;

    // Apagado ordenado con Ctrl+C
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("No se pudo registrar Ctrl+C: {e}");
            return;
        }
        info!("⚠️ Señal de apagado recibida, cerrando...");
        std::process::exit(0);
    });

    info!("🚀 Bot iniciado");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar el cliente: {why:?}");
    }

    Ok(())
}
