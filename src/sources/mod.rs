//! # Sources Module
//!
//! Turns what the user typed into [`Track`]s.
//!
//! [`SmartResolver`] is the entry point: direct audio links go to
//! [`DirectUrlResolver`], Spotify tracks, albums and playlists go to
//! [`SpotifyResolver`] (which looks each song up on YouTube), and everything
//! else (YouTube videos, playlists and free-text searches) goes through
//! [`YtDlpResolver`].

pub mod direct_url;
pub mod spotify;
pub mod ytdlp;

use async_trait::async_trait;
use serenity::model::id::UserId;
use std::sync::Arc;
use tracing::info;

pub use direct_url::DirectUrlResolver;
pub use spotify::{SpotifyCredentials, SpotifyResolver};
pub use ytdlp::YtDlpResolver;

use crate::audio::track::Track;
use crate::config::Config;
use crate::error::{PlayerError, PlayerResult};

/// Convierte una consulta en una lista ordenada de tracks.
///
/// Los errores siempre son [`PlayerError::Resolution`] y nunca se reintentan.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, query: &str, requested_by: UserId) -> PlayerResult<Vec<Track>>;
}

/// Elige el resolver según la forma de la consulta.
pub struct SmartResolver {
    direct: DirectUrlResolver,
    ytdlp: Arc<YtDlpResolver>,
    spotify: Option<SpotifyResolver>,
}

impl SmartResolver {
    pub fn new(ytdlp: Arc<YtDlpResolver>) -> Self {
        Self {
            direct: DirectUrlResolver,
            ytdlp,
            spotify: None,
        }
    }

    pub fn with_spotify(mut self, spotify: SpotifyResolver) -> Self {
        self.spotify = Some(spotify);
        self
    }

    /// Spotify queda habilitado solo si la configuración trae credenciales.
    pub fn from_config(config: &Config) -> Self {
        let ytdlp = Arc::new(YtDlpResolver::new(
            config.ytdlp_path.clone(),
            config.max_playlist_size,
        ));
        let resolver = Self::new(Arc::clone(&ytdlp));

        match config.spotify_credentials() {
            Some(credentials) => {
                info!("🟢 Enlaces de Spotify habilitados");
                resolver.with_spotify(SpotifyResolver::new(
                    credentials,
                    ytdlp,
                    config.max_playlist_size,
                ))
            }
            None => resolver,
        }
    }

    pub fn ytdlp(&self) -> &YtDlpResolver {
        &self.ytdlp
    }
}

#[async_trait]
impl TrackResolver for SmartResolver {
    async fn resolve(&self, query: &str, requested_by: UserId) -> PlayerResult<Vec<Track>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PlayerError::Resolution(
                "Indica qué quieres reproducir".to_string(),
            ));
        }

        info!("🔍 Resolviendo: {}", query);
        if DirectUrlResolver::accepts(query) {
            self.direct.resolve(query, requested_by).await
        } else if SpotifyResolver::accepts(query) {
            match &self.spotify {
                Some(spotify) => spotify.resolve(query, requested_by).await,
                None => Err(PlayerError::Resolution(
                    "Este bot no tiene habilitados los enlaces de Spotify".to_string(),
                )),
            }
        } else {
            self.ytdlp.resolve(query, requested_by).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::SourceKind;
    use crate::testing::{requester, track, FakeResolver};
    use pretty_assertions::assert_eq;

    fn resolver() -> SmartResolver {
        SmartResolver::new(Arc::new(YtDlpResolver::new("/nonexistent/yt-dlp-binary", 5)))
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected() {
        let err = resolver().resolve("   ", requester()).await.unwrap_err();
        assert!(matches!(err, PlayerError::Resolution(_)));
    }

    #[tokio::test]
    async fn test_direct_links_skip_ytdlp() {
        let tracks = resolver()
            .resolve("https://cdn.example.com/a.ogg", requester())
            .await
            .unwrap();
        assert_eq!(tracks[0].source(), SourceKind::DirectUrl);
    }

    #[tokio::test]
    async fn test_spotify_links_need_credentials() {
        let err = resolver()
            .resolve("https://open.spotify.com/track/abc", requester())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PlayerError::Resolution(
                "Este bot no tiene habilitados los enlaces de Spotify".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_spotify_links_go_to_spotify() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/api/token"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({ "access_token": "tok", "expires_in": 3600 }),
            ))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::path("/v1/tracks/abc"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({ "name": "Desde Spotify", "artists": [], "duration_ms": 0 }),
            ))
            .mount(&server)
            .await;

        let credentials = SpotifyCredentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
        };
        let lookup = Arc::new(FakeResolver::returning(vec![track("Video")]));
        let spotify = SpotifyResolver::new(credentials, lookup, 10).with_endpoints(
            format!("{}/api/token", server.uri()),
            format!("{}/v1", server.uri()),
        );

        let tracks = resolver()
            .with_spotify(spotify)
            .resolve("https://open.spotify.com/track/abc", requester())
            .await
            .unwrap();
        assert_eq!(tracks[0].title(), "Desde Spotify");
        assert_eq!(tracks[0].artist(), "Test Artist");
    }

    #[tokio::test]
    async fn test_search_goes_through_ytdlp() {
        // Sin binario, el error viene de yt-dlp y no del resolver directo
        let err = resolver().resolve("lofi beats", requester()).await.unwrap_err();
        match err {
            PlayerError::Resolution(message) => assert!(message.contains("yt-dlp-binary")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
