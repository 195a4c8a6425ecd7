use std::time::Duration;

use diary_models::AdvisorId;
use serde::Serialize;
use tracing::{debug, warn};

use crate::backoff::ReconnectPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Side effect requested by the machine. The driver performs them in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    CloseTransport,
    CancelReconnect,
    OpenTransport(AdvisorId),
    ScheduleReconnect(Duration),
    /// Retry ceiling reached; nothing further is scheduled.
    Exhausted,
}

/// Push-connection lifecycle without any transport attached.
///
/// Transitions:
/// - `Disconnected|Connecting|Connected --connect--> Connecting`
/// - `Connecting --open--> Connected`
/// - `Connecting|Connected --error|disconnect--> Disconnected`
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    attempts: u32,
    exhausted: bool,
    target: Option<AdvisorId>,
    policy: ReconnectPolicy,
}

impl ConnectionMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            exhausted: false,
            target: None,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reconnect counter: failures since the last successful open or forced reconnect.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn target(&self) -> Option<AdvisorId> {
        self.target
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn connect(&mut self, advisor: Option<AdvisorId>) -> Vec<Effect> {
        let Some(advisor) = advisor else {
            debug!("connect without advisor id ignored");
            return Vec::new();
        };
        self.target = Some(advisor);
        self.state = ConnectionState::Connecting;
        vec![
            Effect::CloseTransport,
            Effect::CancelReconnect,
            Effect::OpenTransport(advisor),
        ]
    }

    pub fn on_open(&mut self) -> Vec<Effect> {
        if self.state != ConnectionState::Connecting {
            debug!(state = ?self.state, "open signal outside of connecting ignored");
            return Vec::new();
        }
        self.state = ConnectionState::Connected;
        self.attempts = 0;
        self.exhausted = false;
        Vec::new()
    }

    pub fn on_error(&mut self) -> Vec<Effect> {
        if self.state == ConnectionState::Disconnected {
            debug!("error from a closed transport ignored");
            return Vec::new();
        }
        self.state = ConnectionState::Disconnected;

        let mut effects = vec![Effect::CloseTransport];
        match self.policy.delay_for(self.attempts) {
            Some(delay) => {
                self.attempts += 1;
                effects.push(Effect::ScheduleReconnect(delay));
            }
            None => {
                warn!(attempts = self.attempts, "reconnect attempts exhausted");
                self.exhausted = true;
                effects.push(Effect::Exhausted);
            }
        }
        effects
    }

    pub fn on_reconnect_due(&mut self) -> Vec<Effect> {
        self.connect(self.target)
    }

    pub fn disconnect(&mut self) -> Vec<Effect> {
        self.state = ConnectionState::Disconnected;
        vec![Effect::CloseTransport, Effect::CancelReconnect]
    }

    pub fn force_reconnect(&mut self) -> Vec<Effect> {
        self.attempts = 0;
        self.exhausted = false;
        self.connect(self.target)
    }
}
