use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};

use super::track::Track;

/// Lo que una sesión le cuenta al mundo en cada transición observable.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Connected { channel: ChannelId },
    NowPlaying(Track),
    QueueModified { len: usize },
    Disconnected,
    ReconnectFailed { attempts: u32 },
    Error(String),
}

/// Destino de las notificaciones.
///
/// Es fire-and-forget: la sesión registra los errores devueltos y sigue, nunca
/// los propaga a quien ejecutó el comando.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, room: GuildId, notification: Notification) -> anyhow::Result<()>;
}
