use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::join_all;
use regex::Regex;
use reqwest::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize};
use serenity::model::id::UserId;
use std::{
    sync::{Arc, LazyLock},
    time::Duration,
};
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info, warn};

use super::TrackResolver;
use crate::audio::track::Track;
use crate::error::{PlayerError, PlayerResult};

static SPOTIFY_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://)?open\.spotify\.com/(?:intl-[a-zA-Z-]+/)?(track|album|playlist)/([A-Za-z0-9]+)",
    )
    .expect("regex de Spotify válida")
});

const ACCOUNTS_URL: &str = "https://accounts.spotify.com/api/token";
const API_URL: &str = "https://api.spotify.com/v1";

/// Búsquedas simultáneas al convertir un álbum o una playlist.
const LOOKUP_CONCURRENCY: usize = 4;

/// Margen para no usar un token que vence en medio de una petición.
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotifyKind {
    Track,
    Album,
    Playlist,
}

/// Enlace de `open.spotify.com` ya desarmado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyLink {
    pub kind: SpotifyKind,
    pub id: String,
}

impl SpotifyLink {
    pub fn parse(url: &str) -> Option<Self> {
        let caps = SPOTIFY_URL.captures(url.trim())?;
        let kind = match &caps[1] {
            "track" => SpotifyKind::Track,
            "album" => SpotifyKind::Album,
            _ => SpotifyKind::Playlist,
        };
        Some(Self {
            kind,
            id: caps[2].to_string(),
        })
    }
}

/// Credenciales de una app de Spotify (flujo client credentials).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    #[serde(default)]
    duration_ms: u64,
    album: Option<SpotifyAlbum>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

/// Sirve para el álbum de una pista (solo portadas) y para `/albums/{id}`.
#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    #[serde(default)]
    images: Vec<SpotifyImage>,
    tracks: Option<Page<SpotifyTrack>>,
}

#[derive(Debug, Deserialize)]
struct SpotifyImage {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Page<T> {
    #[serde(default)]
    items: Vec<T>,
    next: Option<String>,
}

/// Las pistas locales y las que Spotify retiró vienen como `null`.
#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<SpotifyTrack>,
}

/// Resuelve enlaces de Spotify buscando cada canción en YouTube.
///
/// Spotify solo aporta metadatos: título, artistas, duración y portada salen
/// de su API, la URL reproducible sale de `lookup` (yt-dlp en producción).
/// Álbumes y playlists se cortan en `max_items` canciones.
pub struct SpotifyResolver {
    http: reqwest::Client,
    credentials: SpotifyCredentials,
    lookup: Arc<dyn TrackResolver>,
    max_items: usize,
    accounts_url: String,
    api_url: String,
    token: Mutex<Option<AccessToken>>,
}

impl SpotifyResolver {
    pub fn new(
        credentials: SpotifyCredentials,
        lookup: Arc<dyn TrackResolver>,
        max_items: usize,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            lookup,
            max_items,
            accounts_url: ACCOUNTS_URL.to_string(),
            api_url: API_URL.to_string(),
            token: Mutex::new(None),
        }
    }

    /// Cambia los endpoints de Spotify (servidores de prueba).
    pub fn with_endpoints(
        mut self,
        accounts_url: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Self {
        self.accounts_url = accounts_url.into();
        self.api_url = api_url.into();
        self
    }

    pub fn accepts(query: &str) -> bool {
        SpotifyLink::parse(query).is_some()
    }

    async fn access_token(&self) -> PlayerResult<String> {
        let mut token = self.token.lock().await;
        if let Some(current) = token.as_ref() {
            if current.expires_at > Instant::now() {
                return Ok(current.value.clone());
            }
        }

        debug!("🔑 Pidiendo token de Spotify");
        let basic = STANDARD.encode(format!(
            "{}:{}",
            self.credentials.client_id, self.credentials.client_secret
        ));
        let response = self
            .http
            .post(&self.accounts_url)
            .header(AUTHORIZATION, format!("Basic {}", basic))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(unreachable_api)?;

        if !response.status().is_success() {
            warn!("⚠️ Spotify rechazó las credenciales: {}", response.status());
            return Err(PlayerError::Resolution(
                "Spotify rechazó las credenciales del bot".to_string(),
            ));
        }

        let body: TokenResponse = response.json().await.map_err(unreachable_api)?;
        let ttl = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_MARGIN);
        *token = Some(AccessToken {
            value: body.access_token.clone(),
            expires_at: Instant::now() + ttl,
        });

        Ok(body.access_token)
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> PlayerResult<T> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(unreachable_api)?;

        match response.status() {
            status if status.is_success() => response.json().await.map_err(unreachable_api),
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Err(PlayerError::Resolution(
                "Ese enlace de Spotify no existe o es privado".to_string(),
            )),
            status => Err(PlayerError::Resolution(format!(
                "Spotify respondió {}",
                status
            ))),
        }
    }

    /// Recorre las páginas hasta juntar `max_items` pistas.
    async fn collect<T, F>(&self, mut page: Page<T>, mut pick: F) -> PlayerResult<Vec<SpotifyTrack>>
    where
        T: DeserializeOwned + Send,
        F: FnMut(T) -> Option<SpotifyTrack> + Send,
    {
        let mut tracks = Vec::new();
        loop {
            tracks.extend(page.items.into_iter().filter_map(&mut pick));
            match page.next {
                Some(next) if tracks.len() < self.max_items => page = self.get(&next).await?,
                _ => break,
            }
        }
        tracks.truncate(self.max_items);
        Ok(tracks)
    }

    /// Pistas del enlace y, para álbumes, la portada que comparten.
    async fn list(&self, link: &SpotifyLink) -> PlayerResult<(Vec<SpotifyTrack>, Option<String>)> {
        match link.kind {
            SpotifyKind::Track => {
                let track = self
                    .get(&format!("{}/tracks/{}", self.api_url, link.id))
                    .await?;
                Ok((vec![track], None))
            }
            SpotifyKind::Album => {
                let album: SpotifyAlbum = self
                    .get(&format!("{}/albums/{}", self.api_url, link.id))
                    .await?;
                let cover = album.images.into_iter().next().map(|image| image.url);
                let page = album.tracks.ok_or_else(|| {
                    PlayerError::Resolution("El álbum no tiene canciones".to_string())
                })?;
                Ok((self.collect(page, Some).await?, cover))
            }
            SpotifyKind::Playlist => {
                let page: Page<PlaylistItem> = self
                    .get(&format!(
                        "{}/playlists/{}/tracks?limit=100",
                        self.api_url, link.id
                    ))
                    .await?;
                Ok((self.collect(page, |item| item.track).await?, None))
            }
        }
    }

    /// Busca la canción en YouTube y le pone los metadatos de Spotify.
    async fn to_playable(
        &self,
        track: &SpotifyTrack,
        album_cover: Option<&str>,
        requested_by: UserId,
    ) -> PlayerResult<Track> {
        let artists: Vec<&str> = track.artists.iter().map(|a| a.name.as_str()).collect();
        let query = match artists.first() {
            Some(artist) => format!("{} {}", track.name, artist),
            None => track.name.clone(),
        };

        let found = self
            .lookup
            .resolve(&query, requested_by)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                PlayerError::Resolution(format!("No se encontró {} en YouTube", track.name))
            })?;

        let artist = if artists.is_empty() {
            found.artist().to_string()
        } else {
            artists.join(", ")
        };
        let mut playable =
            Track::new(&track.name, artist, found.url(), requested_by)?.with_source(found.source());

        let duration = Some(Duration::from_millis(track.duration_ms))
            .filter(|d| !d.is_zero())
            .or(found.duration());
        if let Some(duration) = duration {
            playable = playable.with_duration(duration);
        }

        let cover = track
            .album
            .as_ref()
            .and_then(|album| album.images.first())
            .map(|image| image.url.as_str())
            .or(album_cover)
            .or(found.cover());
        if let Some(cover) = cover {
            playable = playable.with_cover(cover);
        }

        Ok(playable)
    }
}

#[async_trait]
impl TrackResolver for SpotifyResolver {
    async fn resolve(&self, query: &str, requested_by: UserId) -> PlayerResult<Vec<Track>> {
        let link = SpotifyLink::parse(query)
            .ok_or_else(|| PlayerError::Resolution(format!("Enlace de Spotify inválido: {}", query)))?;

        let (tracks, album_cover) = self.list(&link).await?;
        if link.kind == SpotifyKind::Track {
            let track = tracks.first().ok_or_else(|| {
                PlayerError::Resolution("Spotify no devolvió la canción".to_string())
            })?;
            return Ok(vec![
                self.to_playable(track, album_cover.as_deref(), requested_by)
                    .await?,
            ]);
        }

        info!("📋 {} canciones de Spotify para buscar en YouTube", tracks.len());
        let mut playable = Vec::with_capacity(tracks.len());
        for chunk in tracks.chunks(LOOKUP_CONCURRENCY) {
            let lookups = chunk
                .iter()
                .map(|track| self.to_playable(track, album_cover.as_deref(), requested_by));
            for (track, result) in chunk.iter().zip(join_all(lookups).await) {
                match result {
                    Ok(found) => playable.push(found),
                    Err(e) => warn!("⚠️ Se omite {}: {}", track.name, e),
                }
            }
        }

        if playable.is_empty() {
            return Err(PlayerError::Resolution(
                "No se encontró en YouTube ninguna canción del enlace".to_string(),
            ));
        }
        Ok(playable)
    }
}

fn unreachable_api(e: reqwest::Error) -> PlayerError {
    warn!("⚠️ Error hablando con Spotify: {}", e);
    PlayerError::Resolution("No se pudo consultar Spotify".to_string())
}
