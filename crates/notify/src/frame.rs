use diary_models::{Notification, NotificationId};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// SSE event name carrying a read acknowledgement.
pub const NOTIFICATION_READ_EVENT: &str = "notification_read";

/// A decoded push frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Connected,
    Heartbeat,
    Notification(Box<Notification>),
    NotificationRead { notification_id: NotificationId },
    Unknown { event: Option<String>, data: Value },
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Malformed frame body: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct ReadAck {
    notification_id: NotificationId,
}

/// Decodes one SSE frame. `event` is the SSE event name (empty or `message`
/// for default frames).
pub fn parse(event: &str, data: &str) -> Result<Frame, FrameError> {
    let value: Value = serde_json::from_str(data)?;

    match event {
        "" | "message" => parse_message(value),
        NOTIFICATION_READ_EVENT => {
            let ack: ReadAck = serde_json::from_value(value)?;
            Ok(Frame::NotificationRead {
                notification_id: ack.notification_id,
            })
        }
        other => Ok(Frame::Unknown {
            event: Some(other.to_string()),
            data: value,
        }),
    }
}

fn parse_message(value: Value) -> Result<Frame, FrameError> {
    match value.get("type").and_then(Value::as_str) {
        Some("connected") => return Ok(Frame::Connected),
        Some("heartbeat") => return Ok(Frame::Heartbeat),
        _ => {}
    }

    if value.get("ID").is_some() && value.get("Type").is_some() {
        let notification: Notification = serde_json::from_value(value)?;
        return Ok(Frame::Notification(Box::new(notification)));
    }

    Ok(Frame::Unknown { event: None, data: value })
}
