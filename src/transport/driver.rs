use async_trait::async_trait;
use serenity::model::id::GuildId;
use songbird::{
    error::JoinError,
    events::{CoreEvent, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent},
    input::{HttpRequest, Input, YoutubeDl},
    tracks::PlayMode,
    Songbird,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, info, warn};

use super::{ConnectionHandle, EventSink, Transport, TransportError, TransportEvent};
use crate::audio::{
    connection::DisconnectReason,
    track::{SourceKind, Track},
};

/// Transporte real: Songbird se encarga del gateway de voz, el driver y la
/// decodificación; aquí solo se traducen sus eventos a [`TransportEvent`].
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self {
            manager,
            http: reqwest::Client::new(),
        }
    }

    /// Registra los handlers globales antes del join para no perder el primer DriverConnect.
    async fn register_listeners(&self, handle: &ConnectionHandle) {
        let call = self.manager.get_or_insert(handle.room());
        let mut call = call.lock().await;

        call.remove_all_global_events();
        for event in [
            CoreEvent::DriverConnect,
            CoreEvent::DriverReconnect,
            CoreEvent::DriverDisconnect,
        ] {
            call.add_global_event(
                Event::Core(event),
                DriverListener {
                    guild_id: handle.room(),
                    sink: handle.events().clone(),
                },
            );
        }
    }

    fn input_for(&self, track: &Track) -> Input {
        match track.source() {
            SourceKind::YouTube => YoutubeDl::new(self.http.clone(), track.url().to_string()).into(),
            SourceKind::DirectUrl => {
                HttpRequest::new(self.http.clone(), track.url().to_string()).into()
            }
        }
    }
}

#[async_trait]
impl Transport for SongbirdTransport {
    async fn connect(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        self.register_listeners(handle).await;

        info!(
            "🔗 Conectando al canal {} en guild {}",
            handle.channel(),
            handle.room()
        );

        self.manager
            .join(handle.room(), handle.channel())
            .await
            .map_err(|e| TransportError::Join(format!("{:?}", e)))?;

        Ok(())
    }

    async fn rejoin(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        // El join bloquea hasta su propio timeout; la ventana de reconexión la
        // controla la sesión, así que se lanza en segundo plano.
        let manager = Arc::clone(&self.manager);
        let room = handle.room();
        let channel = handle.channel();
        let sink = handle.events().clone();

        tokio::spawn(async move {
            if let Err(e) = manager.join(room, channel).await {
                sink.emit(TransportEvent::Error(format!("rejoin falló: {:?}", e)));
            }
        });

        Ok(())
    }

    async fn destroy(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        if let Some(call) = self.manager.get(handle.room()) {
            call.lock().await.remove_all_global_events();
        }

        match self.manager.remove(handle.room()).await {
            Ok(()) | Err(JoinError::NoCall) => {
                info!("👋 Desconectado del guild {}", handle.room());
                Ok(())
            }
            Err(e) => Err(TransportError::Join(format!("{:?}", e))),
        }
    }

    async fn stream_track(
        &self,
        handle: &ConnectionHandle,
        track: &Track,
    ) -> Result<(), TransportError> {
        let call = self
            .manager
            .get(handle.room())
            .ok_or(TransportError::NoCall(handle.room()))?;

        let input = self.input_for(track);
        let track_handle = call.lock().await.play_input(input);

        // End y Error pueden llegar ambos para la misma pista; solo se reporta un final
        let finished = Arc::new(AtomicBool::new(false));
        for event in [TrackEvent::End, TrackEvent::Error] {
            track_handle
                .add_event(
                    Event::Track(event),
                    TrackListener {
                        guild_id: handle.room(),
                        sink: handle.events().clone(),
                        finished: Arc::clone(&finished),
                    },
                )
                .map_err(|e| TransportError::Track(format!("{:?}", e)))?;
        }

        debug!("🎵 Pista enviada al driver: {}", track.title());
        Ok(())
    }

    async fn stop_track(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        let call = self
            .manager
            .get(handle.room())
            .ok_or(TransportError::NoCall(handle.room()))?;

        call.lock().await.stop();
        Ok(())
    }
}

/// Traduce los eventos del driver de voz.
struct DriverListener {
    guild_id: GuildId,
    sink: EventSink,
}

#[async_trait]
impl VoiceEventHandler for DriverListener {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        match ctx {
            EventContext::DriverConnect(_) | EventContext::DriverReconnect(_) => {
                info!("✅ Driver de voz listo en guild {}", self.guild_id);
                self.sink.emit(TransportEvent::Ready);
            }
            EventContext::DriverDisconnect(data) => {
                // Sin razón = desconexión pedida (leave, kick del canal)
                let reason = match &data.reason {
                    None => DisconnectReason::Manual,
                    Some(cause) => {
                        warn!(
                            "🔌 Driver desconectado en guild {}: {:?}",
                            self.guild_id, cause
                        );
                        DisconnectReason::Abnormal
                    }
                };
                self.sink.emit(TransportEvent::Disconnected(reason));
            }
            _ => {}
        }

        None
    }
}

struct TrackListener {
    guild_id: GuildId,
    sink: EventSink,
    finished: Arc<AtomicBool>,
}

#[async_trait]
impl VoiceEventHandler for TrackListener {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                if let PlayMode::Errored(err) = &state.playing {
                    self.sink.emit(TransportEvent::Error(format!("{:?}", err)));
                }
            }
        }

        if !self.finished.swap(true, Ordering::SeqCst) {
            debug!("🎵 Track terminado en guild {}", self.guild_id);
            self.sink.emit(TransportEvent::FinishedTrack);
        }

        None
    }
}
