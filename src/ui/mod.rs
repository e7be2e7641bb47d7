//! # UI Module
//!
//! Discord-facing presentation: embeds for command replies and session
//! notifications, plus the [`notifier::DiscordNotifier`] that posts them.

pub mod embeds;
pub mod notifier;

pub use notifier::DiscordNotifier;
