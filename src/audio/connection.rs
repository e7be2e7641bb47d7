//! Lifecycle of one voice connection.
//!
//! The machine is pure: [`ConnectionStateMachine::apply`] takes an event and
//! returns the effects the session task must carry out (notify, rejoin, arm or
//! cancel the rejoin window, tear down). No I/O happens here, which is what
//! lets the reconnection policy be tested without a transport.
//!
//! ```text
//! Signalling ──ready──▶ Ready ──drop(Abnormal)──▶ Disconnected(Abnormal)
//!      │                  │                           │   ▲
//!      │                  └──drop(Manual)──┐          │   └─ timed out, attempts left
//!      └──────────────────drop(Manual)─────┤          ├──ready──▶ Ready
//!                                          ▼          └─ attempts exhausted
//!                                      Destroyed ◀──────────────┘
//! ```

use std::time::Duration;
use tracing::{debug, info, warn};

/// Why the transport dropped the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Someone kicked the bot or the driver was asked to leave. Never retried.
    Manual,
    /// Network trouble, gateway hiccup, voice server change...
    Abnormal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Signalling,
    Ready,
    Disconnected(DisconnectReason),
    Destroyed,
}

/// Result of waiting on one rejoin attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejoinOutcome {
    Ready,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Transport handshake completed.
    Ready,
    /// Transport reported a drop.
    Disconnected(DisconnectReason),
    /// The window of the rejoin attempt in flight elapsed without `Ready`.
    RejoinTimedOut,
    /// Caller-initiated teardown.
    Destroy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownCause {
    Manual,
    Requested,
    ReconnectExhausted { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEffect {
    /// Entered `Ready`.
    Connected,
    /// Issue a rejoin and give it `window` to reach `Ready`.
    Rejoin { attempt: u32, window: Duration },
    CancelRejoinWindow,
    /// Detach listeners, then release the transport.
    Teardown { cause: TeardownCause },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub window: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            window: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
    rejoin_attempts: u32,
    policy: ReconnectPolicy,
}

impl ConnectionStateMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Signalling,
            rejoin_attempts: 0,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn rejoin_attempts(&self) -> u32 {
        self.rejoin_attempts
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == ConnectionState::Destroyed
    }

    pub fn apply(&mut self, event: ConnectionEvent) -> Vec<ConnectionEffect> {
        use ConnectionState as S;
        use DisconnectReason::{Abnormal, Manual};

        match (self.state, event) {
            (S::Destroyed, event) => {
                debug!("Conexión destruida, evento ignorado: {:?}", event);
                Vec::new()
            }

            (_, ConnectionEvent::Destroy) => self.destroy(TeardownCause::Requested),

            (S::Signalling, ConnectionEvent::Ready) => self.enter_ready(),
            (S::Ready, ConnectionEvent::Ready) => Vec::new(),
            (S::Disconnected(Abnormal), ConnectionEvent::Ready) => {
                self.resolve_rejoin(RejoinOutcome::Ready)
            }

            (S::Signalling | S::Ready, ConnectionEvent::Disconnected(Manual)) => {
                self.state = S::Disconnected(Manual);
                self.destroy(TeardownCause::Manual)
            }
            (S::Signalling | S::Ready, ConnectionEvent::Disconnected(Abnormal)) => {
                warn!("⚠️ Conexión de voz interrumpida, intentando reconectar");
                self.state = S::Disconnected(Abnormal);
                self.rejoin_attempts = 0;
                self.next_attempt()
            }

            (S::Disconnected(Abnormal), ConnectionEvent::Disconnected(Manual)) => {
                self.destroy(TeardownCause::Manual)
            }
            // El bucle de reconexión ya está en marcha
            (S::Disconnected(Abnormal), ConnectionEvent::Disconnected(Abnormal)) => Vec::new(),
            (S::Disconnected(Abnormal), ConnectionEvent::RejoinTimedOut) => {
                self.resolve_rejoin(RejoinOutcome::TimedOut)
            }
            (_, ConnectionEvent::RejoinTimedOut) => Vec::new(),

            // Disconnected(Manual) nunca persiste: pasa a Destroyed en la misma transición
            (S::Disconnected(Manual), _) => self.destroy(TeardownCause::Manual),
        }
    }

    fn resolve_rejoin(&mut self, outcome: RejoinOutcome) -> Vec<ConnectionEffect> {
        match outcome {
            RejoinOutcome::Ready => {
                info!(
                    "✅ Reconectado tras {} intento(s)",
                    self.rejoin_attempts
                );
                let mut effects = vec![ConnectionEffect::CancelRejoinWindow];
                effects.extend(self.enter_ready());
                effects
            }
            RejoinOutcome::TimedOut if self.rejoin_attempts < self.policy.max_attempts => {
                self.next_attempt()
            }
            RejoinOutcome::TimedOut => {
                let attempts = self.rejoin_attempts;
                self.destroy(TeardownCause::ReconnectExhausted { attempts })
            }
        }
    }

    fn next_attempt(&mut self) -> Vec<ConnectionEffect> {
        self.rejoin_attempts += 1;
        vec![ConnectionEffect::Rejoin {
            attempt: self.rejoin_attempts,
            window: self.policy.window,
        }]
    }

    fn enter_ready(&mut self) -> Vec<ConnectionEffect> {
        self.state = ConnectionState::Ready;
        self.rejoin_attempts = 0;
        vec![ConnectionEffect::Connected]
    }

    fn destroy(&mut self, cause: TeardownCause) -> Vec<ConnectionEffect> {
        let retrying = self.state == ConnectionState::Disconnected(DisconnectReason::Abnormal);
        self.state = ConnectionState::Destroyed;

        let mut effects = Vec::with_capacity(2);
        if retrying {
            effects.push(ConnectionEffect::CancelRejoinWindow);
        }
        effects.push(ConnectionEffect::Teardown { cause });
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ready_machine() -> ConnectionStateMachine {
        let mut machine = ConnectionStateMachine::new(ReconnectPolicy::default());
        assert_eq!(machine.apply(ConnectionEvent::Ready), vec![ConnectionEffect::Connected]);
        machine
    }

    fn rejoin(attempt: u32) -> ConnectionEffect {
        ConnectionEffect::Rejoin {
            attempt,
            window: Duration::from_millis(5000),
        }
    }

    #[test]
    fn test_starts_signalling() {
        let machine = ConnectionStateMachine::new(ReconnectPolicy::default());
        assert_eq!(machine.state(), ConnectionState::Signalling);
        assert_eq!(machine.rejoin_attempts(), 0);
    }

    #[test]
    fn test_manual_disconnect_destroys_without_retry() {
        let mut machine = ready_machine();

        let effects = machine.apply(ConnectionEvent::Disconnected(DisconnectReason::Manual));

        assert_eq!(
            effects,
            vec![ConnectionEffect::Teardown { cause: TeardownCause::Manual }]
        );
        assert!(machine.is_destroyed());
    }

    #[test]
    fn test_reconnect_gives_up_after_exactly_four_attempts() {
        let mut machine = ready_machine();

        let mut effects = machine.apply(ConnectionEvent::Disconnected(DisconnectReason::Abnormal));
        for _ in 0..4 {
            effects.extend(machine.apply(ConnectionEvent::RejoinTimedOut));
        }

        assert_eq!(
            effects,
            vec![
                rejoin(1),
                rejoin(2),
                rejoin(3),
                rejoin(4),
                ConnectionEffect::CancelRejoinWindow,
                ConnectionEffect::Teardown {
                    cause: TeardownCause::ReconnectExhausted { attempts: 4 }
                },
            ]
        );
        assert!(machine.is_destroyed());

        // Terminal: nada sale de Destroyed
        assert!(machine.apply(ConnectionEvent::Ready).is_empty());
        assert!(machine.apply(ConnectionEvent::RejoinTimedOut).is_empty());
        assert!(machine.apply(ConnectionEvent::Destroy).is_empty());
    }

    #[test]
    fn test_ready_during_retry_resets_counter() {
        let mut machine = ready_machine();
        machine.apply(ConnectionEvent::Disconnected(DisconnectReason::Abnormal));
        machine.apply(ConnectionEvent::RejoinTimedOut);
        assert_eq!(machine.rejoin_attempts(), 2);

        let effects = machine.apply(ConnectionEvent::Ready);

        assert_eq!(
            effects,
            vec![ConnectionEffect::CancelRejoinWindow, ConnectionEffect::Connected]
        );
        assert_eq!(machine.state(), ConnectionState::Ready);
        assert_eq!(machine.rejoin_attempts(), 0);

        // Un timeout rezagado ya no hace nada
        assert!(machine.apply(ConnectionEvent::RejoinTimedOut).is_empty());
    }

    #[test]
    fn test_second_abnormal_drop_does_not_restart_loop() {
        let mut machine = ready_machine();
        machine.apply(ConnectionEvent::Disconnected(DisconnectReason::Abnormal));

        let effects = machine.apply(ConnectionEvent::Disconnected(DisconnectReason::Abnormal));

        assert!(effects.is_empty());
        assert_eq!(machine.rejoin_attempts(), 1);
    }

    #[test]
    fn test_manual_drop_while_retrying_cancels_window() {
        let mut machine = ready_machine();
        machine.apply(ConnectionEvent::Disconnected(DisconnectReason::Abnormal));

        let effects = machine.apply(ConnectionEvent::Disconnected(DisconnectReason::Manual));

        assert_eq!(
            effects,
            vec![
                ConnectionEffect::CancelRejoinWindow,
                ConnectionEffect::Teardown { cause: TeardownCause::Manual },
            ]
        );
    }

    #[test]
    fn test_destroy_from_any_live_state() {
        let mut signalling = ConnectionStateMachine::new(ReconnectPolicy::default());
        assert_eq!(
            signalling.apply(ConnectionEvent::Destroy),
            vec![ConnectionEffect::Teardown { cause: TeardownCause::Requested }]
        );

        let mut ready = ready_machine();
        ready.apply(ConnectionEvent::Destroy);
        assert!(ready.is_destroyed());
    }

    #[test]
    fn test_custom_policy_is_respected() {
        let policy = ReconnectPolicy {
            max_attempts: 2,
            window: Duration::from_millis(250),
        };
        let mut machine = ConnectionStateMachine::new(policy);
        machine.apply(ConnectionEvent::Ready);

        let first = machine.apply(ConnectionEvent::Disconnected(DisconnectReason::Abnormal));
        assert_eq!(
            first,
            vec![ConnectionEffect::Rejoin { attempt: 1, window: Duration::from_millis(250) }]
        );
        machine.apply(ConnectionEvent::RejoinTimedOut);
        let last = machine.apply(ConnectionEvent::RejoinTimedOut);

        assert_eq!(
            last,
            vec![
                ConnectionEffect::CancelRejoinWindow,
                ConnectionEffect::Teardown {
                    cause: TeardownCause::ReconnectExhausted { attempts: 2 }
                },
            ]
        );
    }
}
