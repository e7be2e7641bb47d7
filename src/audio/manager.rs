use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use tracing::{debug, info};

use super::session::{CommandSummary, SessionCommand, SessionHandle, SessionRegistry};
use crate::error::{PlayerError, PlayerResult};
use crate::sources::TrackResolver;

/// Superficie de comandos: lo único que usa la capa de Discord.
pub struct AudioManager {
    registry: Arc<SessionRegistry>,
    resolver: Arc<dyn TrackResolver>,
}

impl AudioManager {
    pub fn new(registry: Arc<SessionRegistry>, resolver: Arc<dyn TrackResolver>) -> Self {
        Self { registry, resolver }
    }

    /// Resuelve la consulta y encola el resultado, creando la sesión si hace falta.
    ///
    /// Si la resolución falla no se crea ni se toca ninguna sesión.
    pub async fn play(
        &self,
        room: GuildId,
        voice_channel: ChannelId,
        query: &str,
        requested_by: UserId,
    ) -> PlayerResult<CommandSummary> {
        let tracks = self.resolver.resolve(query, requested_by).await?;
        info!("🎵 {} canciones resueltas para guild {}", tracks.len(), room);

        let session = self.registry.get_or_create(room, voice_channel);
        match session.execute(SessionCommand::Enqueue(tracks.clone())).await {
            // La sesión se cerró entre la búsqueda y el envío
            Err(e) if e == PlayerError::no_session() && !session.is_alive() => {
                debug!("Sesión {} cerrada antes de encolar, creando otra", session.id());
                self.registry
                    .get_or_create(room, voice_channel)
                    .execute(SessionCommand::Enqueue(tracks))
                    .await
            }
            result => result,
        }
    }

    pub async fn remove_one(&self, room: GuildId, index: usize) -> PlayerResult<CommandSummary> {
        self.live_session(room)?
            .execute(SessionCommand::RemoveOne(index))
            .await
    }

    pub async fn remove_range(
        &self,
        room: GuildId,
        from: usize,
        to: usize,
    ) -> PlayerResult<CommandSummary> {
        self.live_session(room)?
            .execute(SessionCommand::RemoveRange(from, to))
            .await
    }

    pub async fn skip(&self, room: GuildId) -> PlayerResult<CommandSummary> {
        self.live_session(room)?.execute(SessionCommand::Skip).await
    }

    pub async fn leave(&self, room: GuildId) -> PlayerResult<CommandSummary> {
        self.live_session(room)?.execute(SessionCommand::Leave).await
    }

    pub async fn queue(&self, room: GuildId) -> PlayerResult<CommandSummary> {
        self.live_session(room)?
            .execute(SessionCommand::Snapshot)
            .await
    }

    pub fn session(&self, room: GuildId) -> Option<SessionHandle> {
        self.registry.get(room)
    }

    pub fn shutdown(&self) {
        self.registry.shutdown_all();
    }

    fn live_session(&self, room: GuildId) -> PlayerResult<SessionHandle> {
        self.registry.get(room).ok_or_else(PlayerError::no_session)
    }
}
