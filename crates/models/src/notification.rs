use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque numeric notification identity assigned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Advisor account whose notifications are streamed. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct AdvisorId(u64);

impl AdvisorId {
    pub fn new(id: u64) -> Option<Self> {
        (id > 0).then_some(Self(id))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for AdvisorId {
    type Error = String;

    fn try_from(id: u64) -> Result<Self, Self::Error> {
        Self::new(id).ok_or_else(|| "advisor id must be positive".to_string())
    }
}

impl From<AdvisorId> for u64 {
    fn from(id: AdvisorId) -> Self {
        id.0
    }
}

impl fmt::Display for AdvisorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "ID", alias = "id")]
    pub id: NotificationId,
    #[serde(rename = "UserID", alias = "user_id", default)]
    pub user_id: u64,
    #[serde(rename = "DiaryID", alias = "diary_id", default)]
    pub diary_id: u64,
    #[serde(rename = "Type", alias = "type")]
    pub kind: NotificationKind,
    #[serde(rename = "Title", alias = "title", default)]
    pub title: String,
    #[serde(rename = "Message", alias = "message", default)]
    pub message: String,
    #[serde(rename = "Data", alias = "data", default)]
    pub data: NotificationPayload,
    #[serde(rename = "IsRead", alias = "is_read", default)]
    pub is_read: bool,
    #[serde(rename = "CreatedAt", alias = "created_at")]
    pub created_at: DateTime<Utc>,
}

/// Notification type tag. Unrecognised tags are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    NewDiary,
    Comment,
    Other(String),
}

impl NotificationKind {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationKind::NewDiary => "new_diary",
            NotificationKind::Comment => "comment",
            NotificationKind::Other(tag) => tag,
        }
    }
}

impl From<String> for NotificationKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "new_diary" => NotificationKind::NewDiary,
            "comment" => NotificationKind::Comment,
            _ => NotificationKind::Other(tag),
        }
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Small structured payload carried by a notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diary_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Response of the bulk notification listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationPage {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub data: Vec<Notification>,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub total: u64,
}
