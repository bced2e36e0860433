use parking_lot::Mutex;
use serenity::{
    all::{Context, EventHandler, Message, Ready, VoiceState},
    async_trait,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tracing::{error, info};

pub mod commands;

use crate::{
    audio::{
        inactivity::InactivityMonitor,
        player::{PlayerEvent, PlayerService},
    },
    config::Config,
    logger::CommandLogger,
};

/// Handler principal do bot. O serviço de reprodução e o logger chegam
/// injetados; o receptor de eventos fica guardado até o gateway ficar
/// pronto, quando o laço de reprodução e o monitor de inatividade sobem.
pub struct VitrolaBot {
    pub config: Arc<Config>,
    pub player: Arc<PlayerService>,
    pub logger: Arc<CommandLogger>,
    events: Mutex<Option<mpsc::UnboundedReceiver<PlayerEvent>>>,
    started: AtomicBool,
}

impl VitrolaBot {
    pub fn new(
        config: Arc<Config>,
        player: Arc<PlayerService>,
        logger: Arc<CommandLogger>,
        events: mpsc::UnboundedReceiver<PlayerEvent>,
    ) -> Self {
        Self {
            config,
            player,
            logger,
            events: Mutex::new(Some(events)),
            started: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EventHandler for VitrolaBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está online!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        // Reconexões disparam `ready` de novo; as tarefas sobem uma vez só
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(events) = self.events.lock().take() {
            tokio::spawn(self.player.clone().run(ctx.http.clone(), events));
        }

        let monitor = InactivityMonitor::new(self.player.clone(), &self.config);
        tokio::spawn(monitor.run());
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let Some(body) = msg.content.strip_prefix(self.config.command_prefix) else {
            return;
        };

        if let Err(e) = commands::dispatch(&ctx, &msg, body, self).await {
            error!("Erro ao tratar comando '{}': {:?}", msg.content, e);
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        // Detectar o próprio bot sendo removido do canal de voz
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id == current_user_id && old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                info!("🔌 Bot removido do canal de voz na guild {}", guild_id);
                self.player.handle_forced_disconnect(guild_id).await;
            }
        }
    }
}
