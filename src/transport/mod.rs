//! # Transport Module
//!
//! Boundary between the session core and whatever actually moves audio.
//!
//! The core never touches songbird directly: it talks to a [`Transport`] and
//! receives [`TransportEvent`]s through the [`EventSink`] carried by each
//! [`ConnectionHandle`]. The binary plugs in [`driver::SongbirdTransport`];
//! tests plug in an in-memory fake.

pub mod driver;

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{fmt, sync::Arc};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::audio::{connection::DisconnectReason, session::SessionMessage, track::Track};
use crate::error::PlayerError;

/// Eventos que el transporte reporta a la sesión.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Ready,
    Disconnected(DisconnectReason),
    FinishedTrack,
    Error(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("No se pudo unir al canal de voz: {0}")]
    Join(String),

    #[error("No hay llamada activa para la guild {0}")]
    NoCall(GuildId),

    #[error("Error de pista: {0}")]
    Track(String),
}

impl From<TransportError> for PlayerError {
    fn from(err: TransportError) -> Self {
        PlayerError::Transport(err.to_string())
    }
}

/// Canal por el que el transporte entrega eventos a la cola ordenada de la sesión.
///
/// `detach` es síncrono: después de llamarlo ningún evento llega a la sesión,
/// aunque el transporte siga disparando handlers mientras se libera.
#[derive(Clone)]
pub struct EventSink {
    tx: Arc<Mutex<Option<UnboundedSender<SessionMessage>>>>,
}

impl EventSink {
    pub(crate) fn new(tx: UnboundedSender<SessionMessage>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    pub fn emit(&self, event: TransportEvent) {
        let guard = self.tx.lock();
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(SessionMessage::Transport(event)).is_err() {
                    debug!("Sesión cerrada, evento de transporte descartado");
                }
            }
            None => debug!("Listener desregistrado, evento descartado: {:?}", event),
        }
    }

    pub fn detach(&self) {
        self.tx.lock().take();
    }

    pub fn is_attached(&self) -> bool {
        self.tx.lock().is_some()
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Identifica una conexión de voz: a qué guild y canal, y a dónde van sus eventos.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    room: GuildId,
    channel: ChannelId,
    events: EventSink,
}

impl ConnectionHandle {
    pub fn new(room: GuildId, channel: ChannelId, events: EventSink) -> Self {
        Self {
            room,
            channel,
            events,
        }
    }

    pub fn room(&self) -> GuildId {
        self.room
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }
}

/// Capacidad de transporte de voz.
///
/// `connect` y `rejoin` solo inician el handshake; el éxito llega después como
/// [`TransportEvent::Ready`]. `stop_track` termina la pista actual y el
/// transporte debe reportarlo con [`TransportEvent::FinishedTrack`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, handle: &ConnectionHandle) -> Result<(), TransportError>;

    async fn rejoin(&self, handle: &ConnectionHandle) -> Result<(), TransportError>;

    async fn destroy(&self, handle: &ConnectionHandle) -> Result<(), TransportError>;

    async fn stream_track(
        &self,
        handle: &ConnectionHandle,
        track: &Track,
    ) -> Result<(), TransportError>;

    async fn stop_track(&self, handle: &ConnectionHandle) -> Result<(), TransportError>;
}
