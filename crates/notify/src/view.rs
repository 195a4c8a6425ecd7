use std::time::Duration;

use diary_models::Notification;
use serde::Serialize;

use crate::machine::ConnectionState;

/// Connection indicator colour shown next to the notification list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Green,
    Amber,
    Red,
}

impl From<ConnectionState> for Indicator {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Connected => Indicator::Green,
            ConnectionState::Connecting => Indicator::Amber,
            ConnectionState::Disconnected => Indicator::Red,
        }
    }
}

/// Connectivity message shown above the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Banner {
    /// Degraded: a reconnect is scheduled.
    Reconnecting { attempt: u32, delay: Duration },
    /// Health probe failed. Non-fatal and dismissable.
    ServerUnavailable,
    /// Retry ceiling reached; the user must reload or reconnect manually.
    Exhausted,
}

impl Banner {
    pub fn is_dismissable(&self) -> bool {
        !matches!(self, Banner::Exhausted)
    }

    pub fn message(&self) -> String {
        match self {
            Banner::Reconnecting { attempt, delay } => format!(
                "Connection lost, reconnecting in {}s (attempt {})",
                delay.as_secs_f32(),
                attempt
            ),
            Banner::ServerUnavailable => "Server unavailable, please try again later".to_string(),
            Banner::Exhausted => {
                "Unable to reach the notification service. Please reload the page.".to_string()
            }
        }
    }
}

/// Outcome of the initial bulk fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum LoadState {
    Loading,
    Ready,
    Failed(String),
}

/// Snapshot published after every handled event.
#[derive(Debug, Clone, Serialize)]
pub struct ViewState {
    pub connection: ConnectionState,
    pub indicator: Indicator,
    pub banner: Option<Banner>,
    pub load: LoadState,
    pub notifications: Vec<Notification>,
    pub unread: usize,
    pub reconnect_attempts: u32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            indicator: Indicator::Red,
            banner: None,
            load: LoadState::Loading,
            notifications: Vec::new(),
            unread: 0,
            reconnect_attempts: 0,
        }
    }
}

impl ViewState {
    /// The error page replaces content only when nothing was ever loaded.
    pub fn shows_full_page_error(&self) -> bool {
        matches!(self.load, LoadState::Failed(_)) && self.notifications.is_empty()
    }
}
