use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serenity::model::id::UserId;
use std::{sync::LazyLock, time::Duration};
use tracing::{debug, info, warn};

use super::TrackResolver;
use crate::audio::track::{SourceKind, Track};
use crate::error::{PlayerError, PlayerResult};

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(https?://)?(www\.|m\.)?(youtube\.com/(watch\?|embed/|v/|shorts/|playlist\?)|youtu\.be/|music\.youtube\.com/)",
    )
    .expect("regex de YouTube válida")
});

/// Una línea de `--dump-json`. Con `--flat-playlist` vienen muchos campos vacíos.
#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
    webpage_url: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

/// Resuelve videos, playlists y búsquedas de YouTube con yt-dlp.
pub struct YtDlpResolver {
    binary: String,
    max_playlist: usize,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>, max_playlist: usize) -> Self {
        Self {
            binary: binary.into(),
            max_playlist,
        }
    }

    pub fn is_youtube_url(url: &str) -> bool {
        YOUTUBE_URL.is_match(url)
    }

    fn is_playlist(url: &str) -> bool {
        url.contains("list=")
    }

    /// Comprueba que yt-dlp se pueda ejecutar y devuelve su versión.
    pub async fn verify(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.binary).arg("--version").output().await?;
        if !output.status.success() {
            anyhow::bail!("{} --version terminó con {}", self.binary, output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run(&self, args: &[&str]) -> PlayerResult<String> {
        debug!("🔍 {} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                PlayerError::Resolution(format!("No se pudo ejecutar {}: {}", self.binary, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .find(|l| l.starts_with("ERROR"))
                .unwrap_or("yt-dlp terminó con error")
                .to_string();
            warn!("⚠️ yt-dlp falló: {}", reason);
            return Err(PlayerError::Resolution(reason));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn single(&self, url: &str, requested_by: UserId) -> PlayerResult<Vec<Track>> {
        let stdout = self
            .run(&["--no-playlist", "--dump-json", "--no-warnings", url])
            .await?;
        non_empty(parse_entries(&stdout, requested_by, 1), url)
    }

    async fn playlist(&self, url: &str, requested_by: UserId) -> PlayerResult<Vec<Track>> {
        info!("📋 Obteniendo playlist: {}", url);
        let limit = self.max_playlist.to_string();
        let stdout = self
            .run(&[
                "--flat-playlist",
                "--dump-json",
                "--playlist-end",
                &limit,
                "--no-warnings",
                url,
            ])
            .await?;

        let tracks = parse_entries(&stdout, requested_by, self.max_playlist);
        info!("📋 Playlist con {} canciones", tracks.len());
        non_empty(tracks, url)
    }

    async fn search(&self, query: &str, requested_by: UserId) -> PlayerResult<Vec<Track>> {
        let target = format!("ytsearch1:{}", query);
        let stdout = self
            .run(&["--dump-json", "--no-warnings", "--default-search", "ytsearch", &target])
            .await?;
        non_empty(parse_entries(&stdout, requested_by, 1), query)
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str, requested_by: UserId) -> PlayerResult<Vec<Track>> {
        if Self::is_youtube_url(query) {
            if Self::is_playlist(query) {
                self.playlist(query, requested_by).await
            } else {
                self.single(query, requested_by).await
            }
        } else {
            self.search(query, requested_by).await
        }
    }
}

fn non_empty(tracks: Vec<Track>, query: &str) -> PlayerResult<Vec<Track>> {
    if tracks.is_empty() {
        return Err(PlayerError::Resolution(format!(
            "No se encontraron resultados para: {}",
            query
        )));
    }
    Ok(tracks)
}

/// Convierte la salida de `--dump-json` (un objeto por línea) en tracks.
/// Las líneas que no parsean o no traen URL se descartan.
fn parse_entries(stdout: &str, requested_by: UserId, limit: usize) -> Vec<Track> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpEntry>(line) {
            Ok(entry) => entry_to_track(entry, requested_by),
            Err(e) => {
                debug!("Línea de yt-dlp ignorada: {}", e);
                None
            }
        })
        .take(limit)
        .collect()
}

fn entry_to_track(entry: YtDlpEntry, requested_by: UserId) -> Option<Track> {
    let url = entry
        .webpage_url
        .or_else(|| entry.url.filter(|u| u.starts_with("http")))
        .or_else(|| {
            entry
                .id
                .map(|id| format!("https://www.youtube.com/watch?v={}", id))
        })?;

    let artist = entry
        .uploader
        .or(entry.channel)
        .unwrap_or_else(|| "Desconocido".to_string());
    let title = entry.title.unwrap_or_else(|| "Sin título".to_string());

    let mut track = Track::new(title, artist, url, requested_by)
        .ok()?
        .with_source(SourceKind::YouTube);

    if let Some(seconds) = entry.duration.filter(|d| d.is_finite() && *d > 0.0) {
        track = track.with_duration(Duration::from_secs_f64(seconds));
    }

    let cover = entry
        .thumbnail
        .or_else(|| entry.thumbnails.into_iter().last().map(|t| t.url));
    if let Some(cover) = cover {
        track = track.with_cover(cover);
    }

    Some(track)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::requester;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_youtube_url_detection() {
        assert!(YtDlpResolver::is_youtube_url(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        ));
        assert!(YtDlpResolver::is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(YtDlpResolver::is_youtube_url(
            "https://music.youtube.com/watch?v=test"
        ));
        assert!(YtDlpResolver::is_youtube_url(
            "https://www.youtube.com/playlist?list=PL123"
        ));
        assert!(!YtDlpResolver::is_youtube_url("https://example.com/video"));
        assert!(!YtDlpResolver::is_youtube_url("never gonna give you up"));
    }

    #[test]
    fn test_playlist_detection() {
        assert!(YtDlpResolver::is_playlist(
            "https://www.youtube.com/playlist?list=PL123"
        ));
        assert!(!YtDlpResolver::is_playlist(
            "https://www.youtube.com/watch?v=abc"
        ));
    }

    #[test]
    fn test_parse_full_entry() {
        let line = r#"{"id":"abc","title":"Song","uploader":"Band","duration":215.0,"thumbnail":"https://i.ytimg.com/abc.jpg","webpage_url":"https://www.youtube.com/watch?v=abc"}"#;

        let tracks = parse_entries(line, requester(), 10);

        assert_eq!(tracks.len(), 1);
        let track = &tracks[0];
        assert_eq!(track.title(), "Song");
        assert_eq!(track.artist(), "Band");
        assert_eq!(track.url(), "https://www.youtube.com/watch?v=abc");
        assert_eq!(track.duration(), Some(Duration::from_secs(215)));
        assert_eq!(track.cover(), Some("https://i.ytimg.com/abc.jpg"));
        assert_eq!(track.source(), SourceKind::YouTube);
    }

    #[test]
    fn test_parse_flat_playlist_entries_and_limit() {
        let stdout = [
            r#"{"id":"a1","title":"Uno","channel":"Canal","url":"https://www.youtube.com/watch?v=a1","thumbnails":[{"url":"https://i/1.jpg"},{"url":"https://i/2.jpg"}]}"#,
            "esto no es json",
            r#"{"id":"a2","title":"Dos"}"#,
            r#"{"id":"a3","title":"Tres"}"#,
        ]
        .join("\n");

        let tracks = parse_entries(&stdout, requester(), 2);

        let titles: Vec<&str> = tracks.iter().map(Track::title).collect();
        assert_eq!(titles, vec!["Uno", "Dos"]);
        assert_eq!(tracks[0].artist(), "Canal");
        assert_eq!(tracks[0].cover(), Some("https://i/2.jpg"));
        assert_eq!(tracks[1].url(), "https://www.youtube.com/watch?v=a2");
        assert_eq!(tracks[1].artist(), "Desconocido");
    }

    #[test]
    fn test_entry_without_any_url_is_skipped() {
        let tracks = parse_entries(r#"{"title":"Fantasma"}"#, requester(), 5);
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_empty_result_is_resolution_error() {
        let err = non_empty(Vec::new(), "nada").unwrap_err();
        assert_eq!(
            err,
            PlayerError::Resolution("No se encontraron resultados para: nada".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_resolution_error() {
        let resolver = YtDlpResolver::new("/nonexistent/yt-dlp-binary", 10);
        let err = resolver.resolve("algo", requester()).await.unwrap_err();
        assert!(matches!(err, PlayerError::Resolution(_)));
        assert!(resolver.verify().await.is_err());
    }
}
