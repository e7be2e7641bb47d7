//! # Audio Module
//!
//! Per-guild playback sessions for the bot.
//!
//! ## Architecture
//!
//! Each guild with an active voice connection owns exactly one session. A
//! session is a Tokio task ([`player::PlaybackController`]) that owns the
//! [`queue::Queue`] and the [`connection::ConnectionStateMachine`], and
//! processes commands, transport events and timers one at a time, in arrival
//! order.
//!
//! ### [`session`] - Registry and handles
//! - At most one live session per guild, created atomically on first `/play`
//! - Cheap clonable [`session::SessionHandle`]s that send commands and watch state
//! - Destroyed sessions remove themselves from the registry
//!
//! ### [`connection`] - Connection lifecycle
//! - Pure state machine: `Signalling → Ready → Disconnected → Destroyed`
//! - Bounded rejoin loop (4 attempts, 5 s window each by default)
//!
//! ### [`queue`] - Queue Management
//! - FIFO of pending tracks with 1-indexed removal
//!
//! ### [`manager`] - Command surface
//! - Resolves queries and routes commands to the right session
//!
//! ## Timers
//!
//! A session leaves the channel after the idle timeout once nothing is queued
//! and nothing is playing. Any enqueue cancels the timer.

pub mod connection;
pub mod manager;
pub mod notifier;
pub mod player;
pub mod queue;
pub mod session;
pub mod track;

pub use manager::AudioManager;
pub use notifier::{Notification, Notifier};
pub use session::{CommandSummary, QueueSnapshot, SessionConfig, SessionRegistry};
pub use track::Track;
