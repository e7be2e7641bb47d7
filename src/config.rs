use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};

use crate::audio::{connection::ReconnectPolicy, session::SessionConfig};
use crate::sources::SpotifyCredentials;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Sesiones
    pub idle_timeout_secs: u64,
    pub rejoin_attempts: u32,
    pub rejoin_window_ms: u64,

    // Fuentes
    pub max_playlist_size: usize,
    pub ytdlp_path: String,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,

    // UI
    pub notice_ttl_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construye la configuración leyendo cada variable con `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            // Discord
            discord_token: lookup("DISCORD_TOKEN").context("Falta DISCORD_TOKEN")?,
            application_id: lookup("APPLICATION_ID")
                .context("Falta APPLICATION_ID")?
                .parse()
                .context("APPLICATION_ID no es un número")?,
            guild_id: lookup("GUILD_ID").and_then(|s| s.parse().ok()),

            // Sesiones
            idle_timeout_secs: parse_or(&lookup, "IDLE_TIMEOUT", defaults.idle_timeout_secs)?,
            rejoin_attempts: parse_or(&lookup, "REJOIN_ATTEMPTS", defaults.rejoin_attempts)?,
            rejoin_window_ms: parse_or(&lookup, "REJOIN_WINDOW_MS", defaults.rejoin_window_ms)?,

            // Fuentes
            max_playlist_size: parse_or(
                &lookup,
                "MAX_PLAYLIST_SIZE",
                defaults.max_playlist_size,
            )?,
            ytdlp_path: lookup("YTDLP_PATH")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.ytdlp_path),
            spotify_client_id: lookup("SPOTIFY_CLIENT_ID").filter(|s| !s.trim().is_empty()),
            spotify_client_secret: lookup("SPOTIFY_CLIENT_SECRET")
                .filter(|s| !s.trim().is_empty()),

            // UI
            notice_ttl_secs: parse_or(&lookup, "NOTICE_TTL", defaults.notice_ttl_secs)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Rechaza valores que dejarían al bot en un estado sin sentido.
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN no puede estar vacío");
        }

        if self.idle_timeout_secs == 0 {
            anyhow::bail!("IDLE_TIMEOUT debe ser mayor que 0");
        }

        if self.rejoin_attempts == 0 {
            anyhow::bail!("REJOIN_ATTEMPTS debe ser mayor que 0");
        }

        if self.rejoin_window_ms == 0 {
            anyhow::bail!("REJOIN_WINDOW_MS debe ser mayor que 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("MAX_PLAYLIST_SIZE debe ser mayor que 0");
        }

        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            anyhow::bail!("SPOTIFY_CLIENT_ID y SPOTIFY_CLIENT_SECRET van juntos");
        }

        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn rejoin_window(&self) -> Duration {
        Duration::from_millis(self.rejoin_window_ms)
    }

    pub fn notice_ttl(&self) -> Duration {
        Duration::from_secs(self.notice_ttl_secs)
    }

    pub fn spotify_credentials(&self) -> Option<SpotifyCredentials> {
        Some(SpotifyCredentials {
            client_id: self.spotify_client_id.clone()?,
            client_secret: self.spotify_client_secret.clone()?,
        })
    }

    /// Resumen apto para logs (sin el token).
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Sesiones: salida tras {} inactivo, {} reintentos de {}\n  \
            Fuentes: {} (playlists hasta {} canciones), Spotify {}\n  \
            Avisos: visibles {}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            humantime::format_duration(self.idle_timeout()),
            self.rejoin_attempts,
            humantime::format_duration(self.rejoin_window()),
            self.ytdlp_path,
            self.max_playlist_size,
            if self.spotify_client_id.is_some() {
                "habilitado"
            } else {
                "deshabilitado"
            },
            humantime::format_duration(self.notice_ttl()),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (sin valores por defecto reales)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            idle_timeout_secs: 300,
            rejoin_attempts: 4,
            rejoin_window_ms: 5000,

            max_playlist_size: 100,
            ytdlp_path: "yt-dlp".to_string(),
            spotify_client_id: None,
            spotify_client_secret: None,

            notice_ttl_secs: 10,
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            idle_timeout: config.idle_timeout(),
            reconnect: ReconnectPolicy {
                max_attempts: config.rejoin_attempts,
                window: config.rejoin_window(),
            },
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .with_context(|| format!("{} tiene un valor inválido: {}", key, value)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [("DISCORD_TOKEN", "token"), ("APPLICATION_ID", "1234")];

    #[test]
    fn test_defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.application_id, 1234);
        assert_eq!(config.guild_id, None);
        assert_eq!(config.idle_timeout(), Duration::from_secs(300));
        assert_eq!(config.rejoin_attempts, 4);
        assert_eq!(config.rejoin_window(), Duration::from_millis(5000));
        assert_eq!(config.max_playlist_size, 100);
        assert_eq!(config.ytdlp_path, "yt-dlp");
        assert_eq!(config.notice_ttl(), Duration::from_secs(10));
    }

    #[test]
    fn test_overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("GUILD_ID", "99"),
            ("IDLE_TIMEOUT", "60"),
            ("REJOIN_ATTEMPTS", "2"),
            ("REJOIN_WINDOW_MS", "1500"),
            ("YTDLP_PATH", "/usr/local/bin/yt-dlp"),
        ]);

        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        let session = SessionConfig::from(&config);

        assert_eq!(config.guild_id, Some(99));
        assert_eq!(session.idle_timeout, Duration::from_secs(60));
        assert_eq!(session.reconnect.max_attempts, 2);
        assert_eq!(session.reconnect.window, Duration::from_millis(1500));
        assert_eq!(config.ytdlp_path, "/usr/local/bin/yt-dlp");
    }

    #[test]
    fn test_spotify_credentials_come_in_pairs() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.spotify_credentials(), None);

        let mut both = REQUIRED.to_vec();
        both.extend([("SPOTIFY_CLIENT_ID", "id"), ("SPOTIFY_CLIENT_SECRET", "secret")]);
        let config = Config::from_lookup(lookup(&both)).unwrap();
        assert_eq!(
            config.spotify_credentials(),
            Some(SpotifyCredentials {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
            })
        );
        assert!(!config.summary().contains("secret"));

        let mut half = REQUIRED.to_vec();
        half.push(("SPOTIFY_CLIENT_ID", "id"));
        assert!(Config::from_lookup(lookup(&half)).is_err());
    }

    #[test]
    fn test_missing_token_fails() {
        assert!(Config::from_lookup(lookup(&[("APPLICATION_ID", "1")])).is_err());
    }

    #[test]
    fn test_garbage_and_zero_values_fail() {
        let mut garbage = REQUIRED.to_vec();
        garbage.push(("IDLE_TIMEOUT", "cinco"));
        assert!(Config::from_lookup(lookup(&garbage)).is_err());

        let mut zero = REQUIRED.to_vec();
        zero.push(("REJOIN_ATTEMPTS", "0"));
        assert!(Config::from_lookup(lookup(&zero)).is_err());
    }

    #[test]
    fn test_default_session_config_matches_default_config() {
        assert_eq!(SessionConfig::from(&Config::default()), SessionConfig::default());
    }

    #[test]
    fn test_summary_hides_token() {
        let config = Config {
            discord_token: "super-secreto".to_string(),
            ..Config::default()
        };
        let summary = config.summary();
        assert!(!summary.contains("super-secreto"));
        assert!(summary.contains("5m"));
    }
}
