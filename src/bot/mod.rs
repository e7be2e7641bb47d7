//! # Bot Module
//!
//! Discord front end for the voice queue.
//!
//! [`MusicBot`] implements Serenity's [`EventHandler`]: it registers the slash
//! commands on `ready` and routes every command interaction to
//! [`handlers::handle_command`], which talks to the [`AudioManager`].
//!
//! ## Commands
//!
//! | Command | Guard |
//! |---|---|
//! | `/play query` | caller must be in a voice channel |
//! | `/remove from [to]` | live session, same voice channel |
//! | `/skip` | live session, same voice channel |
//! | `/leave` | live session, same voice channel |
//! | `/queue` | live session |

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{audio::AudioManager, config::Config, ui::DiscordNotifier};

pub struct MusicBot {
    config: Arc<Config>,
    pub(crate) audio: Arc<AudioManager>,
    pub(crate) notifier: Arc<DiscordNotifier>,
}

impl MusicBot {
    pub fn new(config: Config, audio: Arc<AudioManager>, notifier: Arc<DiscordNotifier>) -> Self {
        Self {
            config: Arc::new(config),
            audio,
            notifier,
        }
    }

    /// Registra los comandos en la guild de desarrollo si hay una, o globalmente.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} conectado como bot", ready.user.name);

        if let Err(e) = self.register_commands(&ctx).await {
            error!("❌ Error registrando comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }
}
