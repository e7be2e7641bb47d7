use async_trait::async_trait;
use dashmap::DashMap;
use serenity::{
    builder::CreateMessage,
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::{sync::Arc, time::Duration};
use tracing::debug;

use super::embeds::notification_embed;
use crate::audio::{Notification, Notifier};

/// Publica los avisos de cada sesión en el canal de texto donde se usó el último comando.
pub struct DiscordNotifier {
    http: Arc<Http>,
    channels: DashMap<GuildId, ChannelId>,
    notice_ttl: Duration,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>, notice_ttl: Duration) -> Self {
        Self {
            http,
            channels: DashMap::new(),
            notice_ttl,
        }
    }

    /// Recuerda el canal de texto al que van los avisos de la guild.
    ///
    /// La asociación dura lo que dure la guild, no la sesión: el aviso de
    /// desconexión de una sesión vieja puede llegar después de que la nueva
    /// se asoció al mismo canal.
    pub fn bind(&self, room: GuildId, channel: ChannelId) {
        self.channels.insert(room, channel);
    }

    /// Canal al que va el aviso, o `None` si no hace falta publicarlo.
    fn target(&self, room: GuildId, notification: &Notification) -> Option<ChannelId> {
        // La cola cambia con cada comando y el comando ya respondió
        if matches!(notification, Notification::QueueModified { .. }) {
            return None;
        }
        self.channels.get(&room).map(|c| *c.value())
    }
}

/// Avisos de estado que no vale la pena dejar en el chat.
fn is_transient(notification: &Notification) -> bool {
    matches!(
        notification,
        Notification::Connected { .. } | Notification::Disconnected
    )
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, room: GuildId, notification: Notification) -> anyhow::Result<()> {
        let Some(channel) = self.target(room, &notification) else {
            debug!("Aviso sin canal de destino en guild {}: {:?}", room, notification);
            return Ok(());
        };

        let message = channel
            .send_message(
                &self.http,
                CreateMessage::new().embed(notification_embed(&notification)),
            )
            .await?;

        if is_transient(&notification) {
            let http = Arc::clone(&self.http);
            let ttl = self.notice_ttl;
            tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                if let Err(e) = channel.delete_message(&http, message.id).await {
                    debug!("No se pudo borrar el aviso {}: {}", message.id, e);
                }
            });
        }

        Ok(())
    }
}
