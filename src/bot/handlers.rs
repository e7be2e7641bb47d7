use anyhow::Result;
use serenity::{
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{debug, info, warn};

use super::MusicBot;
use crate::{
    audio::CommandSummary,
    error::{PlayerError, PlayerResult},
    ui::embeds,
};

/// Maneja comandos slash.
///
/// Todas las respuestas son efímeras; cualquier [`PlayerError`] se muestra
/// como embed rojo y nunca sale de aquí.
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &MusicBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    // Defer la respuesta ya que resolver puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new().ephemeral(true)),
        )
        .await?;

    bot.notifier.bind(guild_id, command.channel_id);

    let result = match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await,
        "remove" => handle_remove(ctx, &command, bot, guild_id).await,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await,
        "leave" => handle_leave(ctx, &command, bot, guild_id).await,
        "queue" => bot.audio.queue(guild_id).await,
        other => Err(PlayerError::InvalidState(format!(
            "Comando no reconocido: {}",
            other
        ))),
    };

    let embed = match &result {
        Ok(summary) => embeds::summary_embed(summary),
        Err(e) if e.is_index_error() => {
            debug!("/{} con posición inválida en guild {}: {}", command.data.name, guild_id, e);
            embeds::error_embed(e)
        }
        Err(e) => {
            warn!("⚠️ /{} falló en guild {}: {}", command.data.name, guild_id, e);
            embeds::error_embed(e)
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> PlayerResult<CommandSummary> {
    let query = string_option(command, "query")
        .ok_or_else(|| PlayerError::Resolution("Indica qué quieres reproducir".to_string()))?;

    let voice_channel = user_voice_channel(ctx, guild_id, command.user.id)
        .ok_or_else(|| PlayerError::InvalidState("Debes estar en un canal de voz".to_string()))?;

    bot.audio
        .play(guild_id, voice_channel, query, command.user.id)
        .await
}

async fn handle_remove(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> PlayerResult<CommandSummary> {
    require_same_channel(ctx, bot, guild_id, command.user.id)?;

    let from = integer_option(command, "from").map(to_position).unwrap_or(0);
    match integer_option(command, "to").map(to_position) {
        Some(to) => bot.audio.remove_range(guild_id, from, to).await,
        None => bot.audio.remove_one(guild_id, from).await,
    }
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> PlayerResult<CommandSummary> {
    require_same_channel(ctx, bot, guild_id, command.user.id)?;
    bot.audio.skip(guild_id).await
}

async fn handle_leave(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> PlayerResult<CommandSummary> {
    require_same_channel(ctx, bot, guild_id, command.user.id)?;
    bot.audio.leave(guild_id).await
}

/// Exige una sesión viva y que el usuario esté en su mismo canal de voz.
fn require_same_channel(
    ctx: &Context,
    bot: &MusicBot,
    guild_id: GuildId,
    user_id: UserId,
) -> PlayerResult<()> {
    let session = bot.audio.session(guild_id).ok_or_else(PlayerError::no_session)?;
    check_same_channel(user_voice_channel(ctx, guild_id, user_id), session.voice_channel())
}

fn check_same_channel(user_channel: Option<ChannelId>, session_channel: ChannelId) -> PlayerResult<()> {
    if user_channel == Some(session_channel) {
        Ok(())
    } else {
        Err(PlayerError::InvalidState(
            "Debemos estar en el mismo canal de voz para usar este comando".to_string(),
        ))
    }
}

/// Canal de voz del usuario según la caché; no se sostiene el guard entre awaits.
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn integer_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

/// Las posiciones negativas se vuelven 0, que la cola rechaza como fuera de rango.
fn to_position(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_same_channel_guard() {
        let channel = ChannelId::new(10);

        assert_eq!(check_same_channel(Some(channel), channel), Ok(()));
        assert!(matches!(
            check_same_channel(Some(ChannelId::new(11)), channel),
            Err(PlayerError::InvalidState(_))
        ));
        assert!(matches!(
            check_same_channel(None, channel),
            Err(PlayerError::InvalidState(_))
        ));
    }

    #[test]
    fn test_to_position() {
        assert_eq!(to_position(3), 3);
        assert_eq!(to_position(0), 0);
        assert_eq!(to_position(-4), 0);
    }
}
