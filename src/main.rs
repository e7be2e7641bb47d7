use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

use voicequeue::{
    audio::{AudioManager, SessionConfig, SessionRegistry},
    bot::MusicBot,
    config::Config,
    sources::SmartResolver,
    transport::driver::SongbirdTransport,
    ui::DiscordNotifier,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("voicequeue=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando VoiceQueue v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("{}", config.summary());

    let resolver = Arc::new(SmartResolver::from_config(&config));

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&resolver).await;
    }

    // Transporte de voz y avisos
    let songbird = Songbird::serenity();
    let transport = Arc::new(SongbirdTransport::new(Arc::clone(&songbird)));
    let notifier = Arc::new(DiscordNotifier::new(
        Arc::new(Http::new(&config.discord_token)),
        config.notice_ttl(),
    ));

    let registry = Arc::new(SessionRegistry::new(
        transport,
        notifier.clone(),
        SessionConfig::from(&config),
    ));
    let audio = Arc::new(AudioManager::new(registry, resolver));

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;
    let handler = MusicBot::new(config.clone(), Arc::clone(&audio), notifier);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        audio.shutdown();
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(resolver: &SmartResolver) -> Result<()> {
    let version = resolver.ytdlp().verify().await?;
    println!("OK (yt-dlp {})", version);
    Ok(())
}
