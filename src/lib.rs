//! # VoiceQueue
//!
//! Discord music bot core: one playback session per guild, each owning its
//! queue and voice connection, driven by slash commands.
//!
//! - [`audio`]: sessions, queue, connection lifecycle, command surface
//! - [`transport`]: the voice transport seam and its Songbird implementation
//! - [`sources`]: query → track resolution (yt-dlp, direct links)
//! - [`ui`]: embeds and the Discord notifier
//! - [`bot`]: Serenity event handler and slash commands

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod sources;
pub mod transport;
pub mod ui;

#[cfg(test)]
mod testing;
