use anyhow::Result;
use serenity::all::{ChannelId, Context, GuildId, Message, UserId};
use tracing::debug;

use crate::{audio::queue::QueuedRequest, bot::VitrolaBot, logger::CommandContext};

/// Comandos registrados, com as descrições exibidas por `commands`.
pub const COMMANDS: &[(&str, &str)] = &[
    ("play", "Toca uma música por URL ou busca"),
    ("skip", "Pula a música atual"),
    ("stop", "Para a reprodução e limpa a fila"),
    ("queue", "Mostra a fila atual"),
    ("commands", "Mostra todos os comandos disponíveis"),
];

const GUILD_ONLY: &str = "❌ Esse comando só funciona em servidores!";

pub async fn dispatch(ctx: &Context, msg: &Message, body: &str, bot: &VitrolaBot) -> Result<()> {
    let Some((name, args)) = parse_command(body) else {
        return Ok(());
    };

    let cmd_ctx = command_context(ctx, msg);

    match name {
        "play" => play(ctx, msg, args, bot, cmd_ctx).await,
        "skip" => skip(ctx, msg, bot, cmd_ctx).await,
        "stop" => stop(ctx, msg, bot, cmd_ctx).await,
        "queue" => queue(ctx, msg, bot, cmd_ctx).await,
        "commands" => command_list(ctx, bot, cmd_ctx).await,
        _ => {
            debug!("Comando desconhecido ignorado: {}", name);
            Ok(())
        }
    }
}

/// Toca uma música por URL ou busca.
async fn play(
    ctx: &Context,
    msg: &Message,
    args: &str,
    bot: &VitrolaBot,
    cmd_ctx: CommandContext,
) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return respond(ctx, bot, &cmd_ctx, GUILD_ONLY).await;
    };

    if args.is_empty() {
        let usage = format!("❌ Uso: {}play <url ou busca>", bot.config.command_prefix);
        return respond(ctx, bot, &cmd_ctx, &usage).await;
    }

    // Precondição: o autor precisa estar em um canal de voz. Nenhum
    // estado muda antes desta checagem.
    let Some(voice_channel) = user_voice_channel(ctx, guild_id, msg.author.id) else {
        return respond(ctx, bot, &cmd_ctx, "❌ Você precisa estar em um canal de voz!").await;
    };

    if let Err(err) = bot.player.connect(guild_id, voice_channel).await {
        return respond(ctx, bot, &cmd_ctx, &format!("❌ Erro: {err}")).await;
    }

    let request = QueuedRequest {
        query: args.to_string(),
        ctx: cmd_ctx.clone(),
    };

    if !bot.player.enqueue(guild_id, request) {
        // Já tocando: só enfileira. Quando a guild estava ociosa, a única
        // resposta deste comando é o "Tocando agora" emitido pelo avanço.
        let response = format!("📝 Adicionado à fila: {args}");
        return respond(ctx, bot, &cmd_ctx, &response).await;
    }

    Ok(())
}

/// Pula a música atual.
async fn skip(ctx: &Context, msg: &Message, bot: &VitrolaBot, cmd_ctx: CommandContext) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return respond(ctx, bot, &cmd_ctx, GUILD_ONLY).await;
    };

    let response = if bot.player.is_playing(guild_id) {
        match bot.player.skip(guild_id) {
            Ok(()) => "⏭️ Pulando para próxima música...".to_string(),
            Err(err) => format!("❌ Erro: {err}"),
        }
    } else {
        "❌ Nenhuma música tocando!".to_string()
    };

    respond(ctx, bot, &cmd_ctx, &response).await
}

/// Para a reprodução e limpa a fila.
async fn stop(ctx: &Context, msg: &Message, bot: &VitrolaBot, cmd_ctx: CommandContext) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return respond(ctx, bot, &cmd_ctx, GUILD_ONLY).await;
    };

    let response = if bot.player.has_session(guild_id) {
        bot.player.stop(guild_id).await;
        "⏹️ Reprodução parada e fila limpa.".to_string()
    } else {
        "❌ Bot não está em um canal de voz!".to_string()
    };

    respond(ctx, bot, &cmd_ctx, &response).await
}

/// Mostra a fila atual.
async fn queue(ctx: &Context, msg: &Message, bot: &VitrolaBot, cmd_ctx: CommandContext) -> Result<()> {
    let Some(guild_id) = msg.guild_id else {
        return respond(ctx, bot, &cmd_ctx, GUILD_ONLY).await;
    };

    let response = format_queue(&bot.player.queue_snapshot(guild_id));
    respond(ctx, bot, &cmd_ctx, &response).await
}

/// Mostra todos os comandos disponíveis (funciona também por DM).
async fn command_list(ctx: &Context, bot: &VitrolaBot, cmd_ctx: CommandContext) -> Result<()> {
    respond(ctx, bot, &cmd_ctx, &render_command_list()).await
}

/// Envia a resposta e grava o registro correspondente no histórico.
/// Todo comando produz exatamente uma resposta e um registro.
async fn respond(
    ctx: &Context,
    bot: &VitrolaBot,
    cmd_ctx: &CommandContext,
    text: &str,
) -> Result<()> {
    let sent = cmd_ctx.channel_id.say(&ctx.http, text).await;
    bot.logger.record(cmd_ctx, text).await;
    sent?;
    Ok(())
}

fn parse_command(body: &str) -> Option<(&str, &str)> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    match body.split_once(char::is_whitespace) {
        Some((name, rest)) => Some((name, rest.trim())),
        None => Some((body, "")),
    }
}

fn command_context(ctx: &Context, msg: &Message) -> CommandContext {
    let (guild_name, channel_name) = match msg
        .guild_id
        .and_then(|id| id.to_guild_cached(&ctx.cache))
    {
        Some(guild) => (
            Some(guild.name.clone()),
            guild
                .channels
                .get(&msg.channel_id)
                .map(|channel| channel.name.clone()),
        ),
        None => (None, None),
    };

    CommandContext {
        guild_name,
        channel_id: msg.channel_id,
        channel_name,
        user: msg.author.tag(),
        command: msg.content.clone(),
    }
}

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

fn format_queue(entries: &[String]) -> String {
    if entries.is_empty() {
        return "📝 Fila vazia!".to_string();
    }

    let list = entries
        .iter()
        .enumerate()
        .map(|(i, query)| format!("{}. {}", i + 1, query))
        .collect::<Vec<_>>()
        .join("\n");

    format!("📝 Fila atual:\n{list}")
}

fn render_command_list() -> String {
    let list = COMMANDS
        .iter()
        .map(|(name, description)| format!("{name} - {description}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!("📜 Comandos disponíveis:\n{list}")
}
