use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod commands;
mod config;
mod sources;
mod user;

use crate::audio::{player::Player, queue::Queue};
use crate::bot::{Dispatcher, TrackDj};
use crate::commands::{CommandContext, CommandRegistry};
use crate::config::Config;
use crate::sources::{DirectUrlService, ServiceRegistry, YouTubeService};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("trackdj=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    info!("🎵 Iniciando TrackDJ v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    let queue = Arc::new(Queue::new(config.queue_limits()));

    // El orden de registro define la prioridad
    let mut services = ServiceRegistry::new(config.resolve_timeout()?);
    services.register(Arc::new(YouTubeService::new(config.max_playlist_size)));
    services.register(Arc::new(DirectUrlService::new()));

    let cache_dir = config.cache.enabled.then(|| config.cache.directory.clone());
    let player = Player::new(queue.clone(), cache_dir, config.default_volume);

    let ctx = Arc::new(CommandContext {
        queue,
        services: Arc::new(services),
        player: player.clone(),
    });

    // Un alias duplicado es un error fatal
    let registry = CommandRegistry::from_config(&config.commands, ctx)?;
    info!("📝 {} comandos registrados", registry.len());

    let dispatcher = Arc::new(Dispatcher::new(
        registry,
        config.admins.clone(),
        config.command_prefix.clone(),
    ));

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let handler = TrackDj::new(dispatcher, player, config.voice.clone());

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    // Verificar dependencias críticas
    let yt_dlp = async_process::Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await?;

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if yt_dlp.status.success() && ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Dependencias faltantes");
    }
}
