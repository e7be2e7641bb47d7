use async_trait::async_trait;
use serenity::model::id::UserId;
use url::Url;

use super::TrackResolver;
use crate::audio::track::{SourceKind, Track};
use crate::error::{PlayerError, PlayerResult};

const AUDIO_EXTENSIONS: [&str; 6] = [".mp3", ".wav", ".ogg", ".flac", ".m4a", ".opus"];

/// Enlaces directos a archivos de audio.
pub struct DirectUrlResolver;

impl DirectUrlResolver {
    /// http(s) con una extensión de audio conocida en el path.
    pub fn accepts(query: &str) -> bool {
        let Ok(url) = Url::parse(query) else {
            return false;
        };

        let path = url.path().to_lowercase();
        matches!(url.scheme(), "http" | "https")
            && AUDIO_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    }
}

#[async_trait]
impl TrackResolver for DirectUrlResolver {
    async fn resolve(&self, query: &str, requested_by: UserId) -> PlayerResult<Vec<Track>> {
        if !Self::accepts(query) {
            return Err(PlayerError::Resolution(format!(
                "No es un enlace de audio directo: {}",
                query
            )));
        }

        let title = Url::parse(query)
            .ok()
            .and_then(|url| {
                url.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| query.to_string());

        let track = Track::new(title, "Enlace directo", query, requested_by)?
            .with_source(SourceKind::DirectUrl);
        Ok(vec![track])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::requester;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_accepts_audio_links_only() {
        assert!(DirectUrlResolver::accepts("https://cdn.example.com/music/song.mp3"));
        assert!(DirectUrlResolver::accepts("http://example.com/a.FLAC?download=1"));
        assert!(!DirectUrlResolver::accepts("https://example.com/page.html"));
        assert!(!DirectUrlResolver::accepts("ftp://example.com/song.mp3"));
        assert!(!DirectUrlResolver::accepts("song.mp3"));
    }

    #[tokio::test]
    async fn test_resolves_file_name_as_title() {
        let tracks = DirectUrlResolver
            .resolve("https://cdn.example.com/music/song.mp3", requester())
            .await
            .unwrap();

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title(), "song.mp3");
        assert_eq!(tracks[0].source(), SourceKind::DirectUrl);
    }

    #[tokio::test]
    async fn test_rejects_non_audio_link() {
        let err = DirectUrlResolver
            .resolve("https://example.com/", requester())
            .await
            .unwrap_err();
        assert!(matches!(err, PlayerError::Resolution(_)));
    }
}
