use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::{
    connection::ConnectionState, CommandSummary, Notification, QueueSnapshot, Track,
};
use crate::error::PlayerError;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "🎵 VoiceQueue";

/// Cuántas canciones pendientes muestra `/queue`.
const QUEUE_PREVIEW: usize = 10;

/// Embed de "reproduciendo ahora"; la hora es la del pedido, no la de ahora.
pub fn now_playing_embed(track: &Track) -> CreateEmbed {
    let requested_at = Timestamp::from_unix_timestamp(track.requested_at().timestamp())
        .unwrap_or_else(|_| Timestamp::now());

    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title()))
        .color(colors::MUSIC_PURPLE)
        .field("🎤 Artista", track.artist(), true)
        .field("⏱️ Duración", duration_label(track.duration()), true)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by()), true)
        .url(track.url())
        .timestamp(requested_at)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    if let Some(cover) = track.cover() {
        embed = embed.thumbnail(cover);
    }

    embed
}

/// Embed para cada aviso que emite una sesión.
pub fn notification_embed(notification: &Notification) -> CreateEmbed {
    match notification {
        Notification::Connected { channel } => info_embed(
            "🔊 Conectado",
            &format!("Listo para reproducir en <#{}>", channel),
        ),
        Notification::NowPlaying(track) => now_playing_embed(track),
        Notification::QueueModified { len } => info_embed(
            "📋 Cola actualizada",
            &format!("{} canciones pendientes", len),
        ),
        Notification::Disconnected => CreateEmbed::default()
            .title("👋 Desconectado")
            .description("Salí del canal de voz")
            .color(colors::NEUTRAL_GRAY)
            .timestamp(Timestamp::now())
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER)),
        Notification::ReconnectFailed { attempts } => CreateEmbed::default()
            .title("⚠️ Conexión perdida")
            .description(format!(
                "No pude volver al canal de voz tras {} intentos",
                attempts
            ))
            .color(colors::WARNING_ORANGE)
            .timestamp(Timestamp::now())
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER)),
        Notification::Error(message) => error_embed_text("Error de reproducción", message),
    }
}

/// Respuesta al comando que lo pidió.
pub fn summary_embed(summary: &CommandSummary) -> CreateEmbed {
    match summary {
        CommandSummary::Enqueued {
            first,
            added,
            position,
        } => {
            let description = match (added, position) {
                (1, 0) => format!("Reproduciendo **{}**", first.display_name()),
                (1, _) => format!(
                    "**{}** agregada en la posición {}",
                    first.display_name(),
                    position
                ),
                (n, _) => format!("Se agregaron **{}** canciones a la cola", n),
            };
            success_embed("Agregado a la cola", &description)
        }
        CommandSummary::Removed(tracks) => {
            let description = match tracks.as_slice() {
                [single] => format!("Eliminada **{}**", single.display_name()),
                many => format!("Eliminadas **{}** canciones", many.len()),
            };
            success_embed("Eliminado", &description)
        }
        CommandSummary::Skipped(track) => {
            success_embed("Saltada", &format!("**{}**", track.display_name()))
        }
        CommandSummary::Left => success_embed("Desconectado", "Salí del canal de voz"),
        CommandSummary::Queue(snapshot) => queue_embed(snapshot),
    }
}

pub fn queue_embed(snapshot: &QueueSnapshot) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    if snapshot.now_playing.is_none() && snapshot.upcoming.is_empty() {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY);
    }

    if let Some(current) = &snapshot.now_playing {
        embed = embed.field("▶️ Reproduciendo", format!("**{}**", current.display_name()), false);
    }

    if !snapshot.upcoming.is_empty() {
        let mut lines: Vec<String> = snapshot
            .upcoming
            .iter()
            .take(QUEUE_PREVIEW)
            .enumerate()
            .map(|(i, track)| {
                let duration = track
                    .duration()
                    .map(|d| format!(" `[{}]`", format_duration(d)))
                    .unwrap_or_default();
                format!("**{}**. {}{}", i + 1, track.display_name(), duration)
            })
            .collect();

        if snapshot.upcoming.len() > QUEUE_PREVIEW {
            lines.push(format!("... y {} más", snapshot.upcoming.len() - QUEUE_PREVIEW));
        }
        embed = embed.field("Próximas canciones", lines.join("\n"), false);
    }

    let mut info = format!("**Pendientes:** {}", snapshot.upcoming.len());
    if snapshot.total_duration > Duration::ZERO {
        info.push_str(&format!(
            " • **Duración:** {}",
            format_duration(snapshot.total_duration)
        ));
    }
    if let ConnectionState::Disconnected(_) = snapshot.state {
        info.push_str(" • 🔄 **Reconectando**");
    }

    embed.field("Información", info, false)
}

pub fn error_embed(err: &PlayerError) -> CreateEmbed {
    let title = match err {
        PlayerError::IndexOutOfRange { .. } | PlayerError::RangeOutOfBounds { .. } => {
            "Posición inválida"
        }
        PlayerError::Resolution(_) => "No se pudo encontrar la canción",
        PlayerError::InvalidState(_) => "No disponible",
        PlayerError::ReconnectExhausted { .. } | PlayerError::Transport(_) => "Error de voz",
    };
    error_embed_text(title, &err.to_string())
}

pub fn error_embed_text(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn info_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .description(description)
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

fn duration_label(duration: Option<Duration>) -> String {
    duration
        .map(format_duration)
        .unwrap_or_else(|| "🔴 En vivo".to_string())
}

/// Formatea una duración en formato legible
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
