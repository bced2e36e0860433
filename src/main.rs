use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod logger;
mod sources;

use crate::audio::player::PlayerService;
use crate::bot::VitrolaBot;
use crate::config::Config;
use crate::logger::CommandLogger;
use crate::sources::YtDlpResolver;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vitrola=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎶 Iniciando Vitrola v{}", env!("CARGO_PKG_VERSION"));

    // Modo health check: só verifica as dependências externas
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let songbird = Songbird::serenity();
    let logger = Arc::new(CommandLogger::new(config.logs_dir.clone()));
    let resolver = Arc::new(YtDlpResolver::new(&config));
    let (player, events) = PlayerService::new(songbird.clone(), resolver, logger.clone());

    let handler = VitrolaBot::new(config.clone(), player, logger, events);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Erro ao registrar Ctrl+C");
        info!("⚠️ Sinal de encerramento recebido, saindo...");
        std::process::exit(0);
    });

    info!("🚀 Bot iniciado");
    if let Err(why) = client.start().await {
        // Única condição fatal: não conseguir falar com o Discord
        error!("Erro ao executar cliente: {:?}", why);
        anyhow::bail!("falha ao conectar ao Discord: {why}");
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    YtDlpResolver::verify_dependencies().await?;
    println!("OK");
    Ok(())
}
