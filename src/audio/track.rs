use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::time::Duration;
use url::Url;

use crate::error::{PlayerError, PlayerResult};

/// De dónde salió el track; decide cómo lo abre el transporte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Cualquier cosa que yt-dlp sepa extraer (YouTube, YouTube Music...).
    YouTube,
    /// URL directa a un archivo de audio.
    DirectUrl,
}

/// Metadatos inmutables de una canción lista para reproducir.
///
/// Solo los resolvers construyen tracks. Una vez en la cola no se modifican;
/// el builder consume `self`, así que no hay forma de mutar un track compartido.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    title: String,
    artist: String,
    url: String,
    cover: Option<String>,
    duration: Option<Duration>,
    requested_by: UserId,
    source: SourceKind,
    requested_at: DateTime<Utc>,
}

impl Track {
    /// Crea un track validando que `url` sea una URL http(s) resoluble.
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        url: impl Into<String>,
        requested_by: UserId,
    ) -> PlayerResult<Self> {
        let url = url.into();
        let parsed = Url::parse(&url)
            .map_err(|_| PlayerError::Resolution(format!("URL inválida: {}", url)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PlayerError::Resolution(format!(
                "URL no reproducible: {}",
                url
            )));
        }

        Ok(Self {
            title: title.into(),
            artist: artist.into(),
            url,
            cover: None,
            duration: None,
            requested_by,
            source: SourceKind::YouTube,
            requested_at: Utc::now(),
        })
    }

    pub fn with_cover(mut self, cover: impl Into<String>) -> Self {
        self.cover = Some(cover.into());
        self
    }

    /// Una duración de cero se trata como desconocida (directos).
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = (!duration.is_zero()).then_some(duration);
        self
    }

    pub fn with_source(mut self, source: SourceKind) -> Self {
        self.source = source;
        self
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn artist(&self) -> &str {
        &self.artist
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn cover(&self) -> Option<&str> {
        self.cover.as_deref()
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn duration_ms(&self) -> Option<u64> {
        self.duration.map(|d| d.as_millis() as u64)
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }
    pub fn source(&self) -> SourceKind {
        self.source
    }
    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    /// "Título - Artista", tal como se muestra en las respuestas.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.title, self.artist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_urls() {
        let user = UserId::new(7);
        assert!(Track::new("a", "b", "not a url", user).is_err());
        assert!(Track::new("a", "b", "file:///tmp/song.mp3", user).is_err());
        assert!(Track::new("a", "b", "https://youtu.be/dQw4w9WgXcQ", user).is_ok());
    }

    #[test]
    fn test_zero_duration_is_unknown() {
        let track = Track::new("Live", "Radio", "https://example.com/live", UserId::new(1))
            .unwrap()
            .with_duration(Duration::ZERO);
        assert_eq!(track.duration(), None);

        let track = track.with_duration(Duration::from_millis(185_000));
        assert_eq!(track.duration_ms(), Some(185_000));
        assert_eq!(track.display_name(), "Live - Radio");
    }
}
