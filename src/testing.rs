//! Fakes and fixtures shared by the unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::audio::{
    connection::ConnectionState,
    notifier::{Notification, Notifier},
    session::SessionHandle,
    track::Track,
};
use crate::error::{PlayerError, PlayerResult};
use crate::sources::TrackResolver;
use crate::transport::{ConnectionHandle, Transport, TransportError, TransportEvent};

pub fn room() -> GuildId {
    GuildId::new(123_456_789)
}

pub fn voice() -> ChannelId {
    ChannelId::new(42)
}

pub fn requester() -> UserId {
    UserId::new(7)
}

pub fn track(title: &str) -> Track {
    Track::new(
        title,
        "Test Artist",
        format!("https://example.com/{}", title.to_lowercase()),
        requester(),
    )
    .expect("fixture url is valid")
}

/// Deja correr a las tareas listas sin avanzar el reloj.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub async fn wait_state(session: &SessionHandle, target: ConnectionState) {
    session
        .watch_state()
        .wait_for(|state| *state == target)
        .await
        .expect("session state channel closed before reaching target");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect,
    Rejoin,
    Destroy,
    Stream(String),
    Stop,
}

/// Transporte en memoria: registra llamadas y emite eventos a pedido.
pub struct FakeTransport {
    ready_on_connect: AtomicBool,
    ready_on_rejoin: AtomicBool,
    fail_connect: AtomicBool,
    destroy_delay: Mutex<Option<Duration>>,
    failing_titles: Mutex<HashSet<String>>,
    calls: Mutex<Vec<TransportCall>>,
    handles: Mutex<Vec<ConnectionHandle>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            ready_on_connect: AtomicBool::new(true),
            ready_on_rejoin: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            destroy_delay: Mutex::new(None),
            failing_titles: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
        })
    }

    pub fn set_ready_on_connect(&self, ready: bool) {
        self.ready_on_connect.store(ready, Ordering::SeqCst);
    }

    pub fn set_ready_on_rejoin(&self, ready: bool) {
        self.ready_on_rejoin.store(ready, Ordering::SeqCst);
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Hace que `destroy` tarde, como una llamada real que se está cerrando.
    pub fn set_destroy_delay(&self, delay: Duration) {
        *self.destroy_delay.lock() = Some(delay);
    }

    pub fn fail_stream_of(&self, title: &str) {
        self.failing_titles.lock().insert(title.to_string());
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &TransportCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn streamed(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                TransportCall::Stream(title) => Some(title.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_handle(&self, room: GuildId) -> Option<ConnectionHandle> {
        self.handles
            .lock()
            .iter()
            .rev()
            .find(|h| h.room() == room)
            .cloned()
    }

    /// Simula un evento del driver para la última conexión de `room`.
    pub fn emit(&self, room: GuildId, event: TransportEvent) {
        if let Some(handle) = self.last_handle(room) {
            handle.events().emit(event);
        }
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        self.record(TransportCall::Connect);
        self.handles.lock().push(handle.clone());

        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Join("canal lleno".to_string()));
        }
        if self.ready_on_connect.load(Ordering::SeqCst) {
            handle.events().emit(TransportEvent::Ready);
        }
        Ok(())
    }

    async fn rejoin(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        self.record(TransportCall::Rejoin);
        if self.ready_on_rejoin.load(Ordering::SeqCst) {
            handle.events().emit(TransportEvent::Ready);
        }
        Ok(())
    }

    async fn destroy(&self, _handle: &ConnectionHandle) -> Result<(), TransportError> {
        self.record(TransportCall::Destroy);
        let delay = *self.destroy_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn stream_track(
        &self,
        _handle: &ConnectionHandle,
        track: &Track,
    ) -> Result<(), TransportError> {
        if self.failing_titles.lock().contains(track.title()) {
            return Err(TransportError::Track(format!("{} no disponible", track.title())));
        }
        self.record(TransportCall::Stream(track.title().to_string()));
        Ok(())
    }

    async fn stop_track(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        self.record(TransportCall::Stop);
        handle.events().emit(TransportEvent::FinishedTrack);
        Ok(())
    }
}

/// Guarda todo lo notificado.
#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<(GuildId, Notification)>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().iter().map(|(_, n)| n.clone()).collect()
    }

    pub fn has(&self, predicate: impl Fn(&Notification) -> bool) -> bool {
        self.seen.lock().iter().any(|(_, n)| predicate(n))
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, room: GuildId, notification: Notification) -> anyhow::Result<()> {
        self.seen.lock().push((room, notification));
        Ok(())
    }
}

/// Resolver fijo: devuelve siempre la misma lista o el mismo error.
pub struct FakeResolver {
    result: PlayerResult<Vec<Track>>,
}

impl FakeResolver {
    pub fn returning(tracks: Vec<Track>) -> Self {
        Self { result: Ok(tracks) }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(PlayerError::Resolution(message.to_string())),
        }
    }
}

#[async_trait]
impl TrackResolver for FakeResolver {
    async fn resolve(&self, _query: &str, _requested_by: UserId) -> PlayerResult<Vec<Track>> {
        self.result.clone()
    }
}
