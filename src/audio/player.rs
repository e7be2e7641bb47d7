use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    connection::{
        ConnectionEffect, ConnectionEvent, ConnectionState, ConnectionStateMachine, TeardownCause,
    },
    notifier::Notification,
    queue::Queue,
    session::{
        CommandSummary, QueueSnapshot, Release, SessionCommand, SessionContext, SessionMessage,
    },
    track::Track,
};
use crate::error::{PlayerError, PlayerResult};
use crate::transport::{ConnectionHandle, EventSink, TransportEvent};

/// Dueño exclusivo de la cola y la conexión de una sesión.
///
/// Corre en su propia tarea y procesa comandos, eventos del transporte y
/// timers de a uno, en orden de llegada. Nada más toca su estado.
pub(crate) struct PlaybackController {
    id: u64,
    room: GuildId,
    handle: ConnectionHandle,
    queue: Queue,
    connection: ConnectionStateMachine,
    streaming: Option<Track>,
    /// Finales que el transporte todavía debe reportar por pistas ya saltadas.
    stale_finishes: usize,
    idle_timeout: Duration,
    idle_deadline: Option<Instant>,
    rejoin_deadline: Option<Instant>,
    connect_task: Option<JoinHandle<()>>,
    context: SessionContext,
    inbox: mpsc::UnboundedSender<SessionMessage>,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
    previous: Option<CancellationToken>,
    released: CancellationToken,
}

impl PlaybackController {
    pub(crate) fn new(
        id: u64,
        room: GuildId,
        voice_channel: ChannelId,
        context: SessionContext,
        inbox: mpsc::UnboundedSender<SessionMessage>,
        state_tx: watch::Sender<ConnectionState>,
        cancel: CancellationToken,
        previous: Option<CancellationToken>,
    ) -> Self {
        let handle = ConnectionHandle::new(room, voice_channel, EventSink::new(inbox.clone()));

        Self {
            id,
            room,
            handle,
            queue: Queue::new(),
            connection: ConnectionStateMachine::new(context.config.reconnect),
            streaming: None,
            stale_finishes: 0,
            idle_timeout: context.config.idle_timeout,
            idle_deadline: None,
            rejoin_deadline: None,
            connect_task: None,
            context,
            inbox,
            state_tx,
            cancel,
            previous,
            released: CancellationToken::new(),
        }
    }

    pub(crate) async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<SessionMessage>) {
        self.spawn_connect();

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("🛑 Sesión {} cancelada", self.id);
                    self.handle_connection_event(ConnectionEvent::Destroy).await;
                }
                message = inbox.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    // Imposible mientras el controlador guarde su propio sender
                    None => self.handle_connection_event(ConnectionEvent::Destroy).await,
                },
                _ = wait_until(self.rejoin_deadline) => {
                    self.rejoin_deadline = None;
                    self.handle_connection_event(ConnectionEvent::RejoinTimedOut).await;
                }
                _ = wait_until(self.idle_deadline) => {
                    self.idle_deadline = None;
                    self.on_idle_timeout().await;
                }
            }

            if self.connection.is_destroyed() {
                break;
            }
        }

        // Lo que quedó en la cola de mensajes ya no tiene sesión que lo atienda
        inbox.close();
        while let Ok(message) = inbox.try_recv() {
            if let SessionMessage::Command(_, reply) = message {
                let _ = reply.send(Err(PlayerError::no_session()));
            }
        }

        debug!("Sesión {} terminada (guild {})", self.id, self.room);
    }

    /// El handshake de voz puede tardar; se hace fuera del bucle y el
    /// resultado vuelve como mensaje.
    fn spawn_connect(&mut self) {
        let transport = Arc::clone(&self.context.transport);
        let handle = self.handle.clone();
        let inbox = self.inbox.clone();
        let previous = self.previous.take();

        self.connect_task = Some(tokio::spawn(async move {
            // La llamada de la sesión anterior tiene que estar cerrada antes del join
            if let Some(previous) = previous {
                debug!("Esperando a que se libere la llamada anterior de guild {}", handle.room());
                previous.cancelled().await;
            }
            if let Err(e) = transport.connect(&handle).await {
                let _ = inbox.send(SessionMessage::ConnectFailed(e.to_string()));
            }
        }));
    }

    async fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Command(command, reply) => {
                let result = self.execute(command).await;
                if reply.send(result).is_err() {
                    debug!("Quien envió el comando ya no espera respuesta");
                }
            }
            SessionMessage::Transport(event) => self.handle_transport_event(event).await,
            SessionMessage::ConnectFailed(reason) => {
                error!("❌ No se pudo conectar en guild {}: {}", self.room, reason);
                self.notify(Notification::Error(reason)).await;
                self.handle_connection_event(ConnectionEvent::Destroy).await;
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Ready => {
                self.handle_connection_event(ConnectionEvent::Ready).await;
            }
            TransportEvent::Disconnected(reason) => {
                self.handle_connection_event(ConnectionEvent::Disconnected(reason))
                    .await;
            }
            TransportEvent::FinishedTrack => self.on_track_finished().await,
            TransportEvent::Error(message) => {
                warn!("⚠️ Error de transporte en guild {}: {}", self.room, message);
            }
        }
    }

    /// Aplica el evento a la máquina de estados, ejecuta sus efectos y recién
    /// entonces publica el estado nuevo. `Destroyed` es la excepción: lo
    /// publica `teardown` antes de liberar la conexión.
    async fn handle_connection_event(&mut self, event: ConnectionEvent) {
        let effects = self.connection.apply(event);
        for effect in effects {
            self.run_effect(effect).await;
        }
        self.state_tx.send_replace(self.connection.state());
    }

    async fn run_effect(&mut self, effect: ConnectionEffect) {
        match effect {
            ConnectionEffect::Connected => {
                info!(
                    "🔊 Conectado al canal {} en guild {}",
                    self.handle.channel(),
                    self.room
                );
                self.notify(Notification::Connected {
                    channel: self.handle.channel(),
                })
                .await;
                self.play_next_if_idle().await;
            }
            ConnectionEffect::Rejoin { attempt, window } => {
                warn!(
                    "🔄 Reintento de conexión {}/{} en guild {}",
                    attempt, self.context.config.reconnect.max_attempts, self.room
                );
                self.rejoin_deadline = Some(Instant::now() + window);
                if let Err(e) = self.context.transport.rejoin(&self.handle).await {
                    warn!("⚠️ Reintento {} falló al iniciar: {}", attempt, e);
                }
            }
            ConnectionEffect::CancelRejoinWindow => {
                self.rejoin_deadline = None;
            }
            ConnectionEffect::Teardown { cause } => self.teardown(cause).await,
        }
    }

    async fn execute(&mut self, command: SessionCommand) -> PlayerResult<CommandSummary> {
        match command {
            SessionCommand::Enqueue(tracks) => {
                let first = tracks.first().cloned().ok_or_else(|| {
                    PlayerError::Resolution("No se encontró nada para reproducir".to_string())
                })?;

                let was_streaming = self.streaming.is_some();
                let added = self.queue.enqueue(tracks);
                self.notify(Notification::QueueModified {
                    len: self.queue.len(),
                })
                .await;
                self.play_next_if_idle().await;

                let started = !was_streaming && self.streaming.is_some();
                let position = if started {
                    0
                } else {
                    self.queue.len() + 1 - added
                };

                Ok(CommandSummary::Enqueued {
                    first,
                    added,
                    position,
                })
            }
            SessionCommand::RemoveOne(index) => {
                let removed = self.queue.remove_one(index)?;
                self.after_removal().await;
                Ok(CommandSummary::Removed(vec![removed]))
            }
            SessionCommand::RemoveRange(from, to) => {
                let removed = self.queue.remove_range(from, to)?;
                self.after_removal().await;
                Ok(CommandSummary::Removed(removed))
            }
            SessionCommand::Skip => {
                let current = self.streaming.clone().ok_or_else(|| {
                    PlayerError::InvalidState("No hay nada reproduciéndose".to_string())
                })?;

                self.context.transport.stop_track(&self.handle).await?;
                info!("⏭️ Saltado en guild {}: {}", self.room, current.title());

                // El FinishedTrack de la pista detenida llega después y se ignora
                self.streaming = None;
                self.stale_finishes += 1;
                self.play_next_if_idle().await;

                Ok(CommandSummary::Skipped(current))
            }
            SessionCommand::Leave => {
                self.handle_connection_event(ConnectionEvent::Destroy).await;
                Ok(CommandSummary::Left)
            }
            SessionCommand::Snapshot => {
                let current = self
                    .streaming
                    .as_ref()
                    .and_then(Track::duration)
                    .unwrap_or_default();

                Ok(CommandSummary::Queue(QueueSnapshot {
                    now_playing: self.streaming.clone(),
                    upcoming: self.queue.snapshot(),
                    total_duration: self.queue.total_duration() + current,
                    state: self.connection.state(),
                }))
            }
        }
    }

    async fn after_removal(&mut self) {
        self.notify(Notification::QueueModified {
            len: self.queue.len(),
        })
        .await;
        self.refresh_idle_timer();
    }

    /// Empieza la siguiente canción si la conexión está lista y no suena nada.
    async fn play_next_if_idle(&mut self) {
        if self.streaming.is_none() && self.connection.is_ready() {
            while let Some(track) = self.queue.advance() {
                match self
                    .context
                    .transport
                    .stream_track(&self.handle, &track)
                    .await
                {
                    Ok(()) => {
                        info!("🎵 Reproduciendo en guild {}: {}", self.room, track.title());
                        self.streaming = Some(track.clone());
                        self.notify(Notification::NowPlaying(track)).await;
                        break;
                    }
                    Err(e) => {
                        error!("❌ No se pudo reproducir {}: {}", track.title(), e);
                        self.notify(Notification::Error(format!(
                            "No se pudo reproducir {}: {}",
                            track.title(),
                            e
                        )))
                        .await;
                    }
                }
            }
        }

        self.refresh_idle_timer();
    }

    async fn on_track_finished(&mut self) {
        if self.stale_finishes > 0 {
            self.stale_finishes -= 1;
            debug!("FinishedTrack de una pista saltada en guild {}", self.room);
            return;
        }

        match self.streaming.take() {
            Some(track) => debug!("🏁 Terminó {} en guild {}", track.title(), self.room),
            None => debug!("FinishedTrack sin pista activa en guild {}", self.room),
        }
        self.play_next_if_idle().await;
    }

    async fn on_idle_timeout(&mut self) {
        if self.queue.is_empty() && self.streaming.is_none() {
            info!(
                "⏰ {} sin actividad en guild {}, saliendo del canal",
                humantime::format_duration(self.idle_timeout),
                self.room
            );
            self.handle_connection_event(ConnectionEvent::Destroy).await;
        }
    }

    /// El timer de inactividad corre solo con la conexión lista, la cola
    /// vacía y nada sonando.
    fn refresh_idle_timer(&mut self) {
        let idle =
            self.connection.is_ready() && self.streaming.is_none() && self.queue.is_empty();

        match (idle, self.idle_deadline) {
            (true, None) => {
                debug!("⏳ Timer de inactividad iniciado en guild {}", self.room);
                self.idle_deadline = Some(Instant::now() + self.idle_timeout);
            }
            (false, Some(_)) => {
                debug!("⏳ Timer de inactividad cancelado en guild {}", self.room);
                self.idle_deadline = None;
            }
            _ => {}
        }
    }

    async fn teardown(&mut self, cause: TeardownCause) {
        // Primero se cortan los eventos: nada de lo que sigue puede reentrar
        self.handle.events().detach();
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        self.idle_deadline = None;
        self.rejoin_deadline = None;
        self.streaming = None;

        // Antes de cualquier await: la sesión deja de estar viva y sale del
        // registro, así un /play concurrente crea una nueva.
        let id = self.id;
        self.context.releasing.insert(
            self.room,
            Release {
                session: id,
                done: self.released.clone(),
            },
        );
        self.state_tx.send_replace(ConnectionState::Destroyed);
        self.cancel.cancel();
        self.context
            .sessions
            .remove_if(&self.room, |_, handle| handle.id() == id);

        if let TeardownCause::ReconnectExhausted { attempts } = cause {
            error!(
                "❌ Guild {}: {}",
                self.room,
                PlayerError::ReconnectExhausted { attempts }
            );
            self.notify(Notification::ReconnectFailed { attempts }).await;
        }

        if let Err(e) = self.context.transport.destroy(&self.handle).await {
            warn!("⚠️ Error liberando la conexión de guild {}: {}", self.room, e);
        }

        self.released.cancel();
        self.context
            .releasing
            .remove_if(&self.room, |_, release| release.session == id);

        info!("👋 Sesión {} destruida ({:?}) en guild {}", self.id, cause, self.room);
        self.notify(Notification::Disconnected).await;
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.context.notifier.notify(self.room, notification).await {
            warn!("⚠️ No se pudo notificar en guild {}: {:?}", self.room, e);
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
