use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::{ChannelId, GuildId};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{
    connection::{ConnectionState, ReconnectPolicy},
    notifier::Notifier,
    player::PlaybackController,
    track::Track,
};
use crate::error::{PlayerError, PlayerResult};
use crate::transport::{Transport, TransportEvent};

/// Parámetros de cada sesión.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Tiempo sin nada pendiente ni sonando antes de salir del canal.
    pub idle_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Órdenes que acepta una sesión.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Enqueue(Vec<Track>),
    RemoveOne(usize),
    RemoveRange(usize, usize),
    Skip,
    Leave,
    Snapshot,
}

/// Resumen que el comando devuelve para que la capa de UI lo muestre.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandSummary {
    /// `position` es 0 si la primera canción empezó a sonar de inmediato.
    Enqueued {
        first: Track,
        added: usize,
        position: usize,
    },
    Removed(Vec<Track>),
    Skipped(Track),
    Left,
    Queue(QueueSnapshot),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    pub now_playing: Option<Track>,
    pub upcoming: Vec<Track>,
    pub total_duration: Duration,
    pub state: ConnectionState,
}

/// Todo lo que entra a la cola ordenada de una sesión.
pub(crate) enum SessionMessage {
    Command(SessionCommand, oneshot::Sender<PlayerResult<CommandSummary>>),
    Transport(TransportEvent),
    ConnectFailed(String),
}

struct SessionShared {
    id: u64,
    room: GuildId,
    voice_channel: ChannelId,
    inbox: mpsc::UnboundedSender<SessionMessage>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

/// Referencia clonable a una sesión viva. La sesión en sí (cola + conexión)
/// vive dentro de su tarea y solo se modifica a través de mensajes.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionShared>,
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn room(&self) -> GuildId {
        self.inner.room
    }

    pub fn voice_channel(&self) -> ChannelId {
        self.inner.voice_channel
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.clone()
    }

    pub fn is_alive(&self) -> bool {
        !self.inner.cancel.is_cancelled()
            && !self.inner.inbox.is_closed()
            && self.state() != ConnectionState::Destroyed
    }

    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Encola el comando y espera a que la sesión lo procese.
    pub async fn execute(&self, command: SessionCommand) -> PlayerResult<CommandSummary> {
        let (reply, response) = oneshot::channel();
        self.inner
            .inbox
            .send(SessionMessage::Command(command, reply))
            .map_err(|_| PlayerError::no_session())?;

        response.await.map_err(|_| PlayerError::no_session())?
    }

    /// Pide a la sesión que se destruya; no espera a que termine.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }
}

/// Sesión que ya salió del registro pero sigue liberando su conexión.
/// `done` se cancela cuando el transporte terminó de soltar la llamada.
#[derive(Clone)]
pub(crate) struct Release {
    pub session: u64,
    pub done: CancellationToken,
}

/// Dependencias compartidas por todas las sesiones.
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub transport: Arc<dyn Transport>,
    pub notifier: Arc<dyn Notifier>,
    pub config: SessionConfig,
    pub sessions: Arc<DashMap<GuildId, SessionHandle>>,
    pub releasing: Arc<DashMap<GuildId, Release>>,
}

/// Una sesión por guild como máximo.
///
/// El alta es atómica por guild: el `entry` de DashMap bloquea solo el shard
/// de esa guild, de modo que guilds distintas no se esperan entre sí.
pub struct SessionRegistry {
    context: SessionContext,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new(
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
        config: SessionConfig,
    ) -> Self {
        Self {
            context: SessionContext {
                transport,
                notifier,
                config,
                sessions: Arc::new(DashMap::new()),
                releasing: Arc::new(DashMap::new()),
            },
            next_id: AtomicU64::new(1),
        }
    }

    /// Devuelve la sesión viva de la guild o crea una nueva.
    ///
    /// Debe llamarse dentro de un runtime de Tokio: la sesión corre en su propia tarea.
    pub fn get_or_create(&self, room: GuildId, voice_channel: ChannelId) -> SessionHandle {
        match self.context.sessions.entry(room) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_alive() {
                    return entry.get().clone();
                }
                let handle = self.spawn_session(room, voice_channel);
                entry.insert(handle.clone());
                handle
            }
            Entry::Vacant(entry) => {
                let handle = self.spawn_session(room, voice_channel);
                entry.insert(handle.clone());
                handle
            }
        }
    }

    pub fn get(&self, room: GuildId) -> Option<SessionHandle> {
        self.context
            .sessions
            .get(&room)
            .map(|entry| entry.value().clone())
            .filter(SessionHandle::is_alive)
    }

    /// Saca la sesión del registro y la manda destruir.
    pub fn remove(&self, room: GuildId) -> Option<SessionHandle> {
        let (_, handle) = self.context.sessions.remove(&room)?;
        handle.shutdown();
        Some(handle)
    }

    pub fn len(&self) -> usize {
        self.context.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.context.sessions.is_empty()
    }

    pub fn shutdown_all(&self) {
        let handles: Vec<SessionHandle> = self
            .context
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        info!("⚠️ Cerrando {} sesiones de voz", handles.len());
        for handle in handles {
            self.remove(handle.room());
        }
    }

    fn spawn_session(&self, room: GuildId, voice_channel: ChannelId) -> SessionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Signalling);
        let cancel = CancellationToken::new();
        // Una sesión anterior de la misma guild puede estar soltando la llamada
        let previous = self
            .context
            .releasing
            .get(&room)
            .map(|release| release.done.clone());

        let handle = SessionHandle {
            inner: Arc::new(SessionShared {
                id,
                room,
                voice_channel,
                inbox: inbox_tx.clone(),
                state: state_rx,
                cancel: cancel.clone(),
            }),
        };

        let controller = PlaybackController::new(
            id,
            room,
            voice_channel,
            self.context.clone(),
            inbox_tx,
            state_tx,
            cancel,
            previous,
        );
        tokio::spawn(controller.run(inbox_rx));

        info!("🆕 Sesión {} creada para guild {}", id, room);
        handle
    }
}
