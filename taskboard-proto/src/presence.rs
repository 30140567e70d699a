//! Presence status of users viewing a project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// Presence status of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    /// User is actively using the board.
    Online,
    /// User is idle.
    Away,
    /// User has left.
    Offline,
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Away => write!(f, "away"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Payload of `presence:changed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceMessage {
    /// The user whose presence changed.
    pub user_id: UserId,
    /// The new status.
    pub status: PresenceStatus,
    /// When the status changed.
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_status_display() {
        assert_eq!(PresenceStatus::Online.to_string(), "online");
        assert_eq!(PresenceStatus::Away.to_string(), "away");
        assert_eq!(PresenceStatus::Offline.to_string(), "offline");
    }

    #[test]
    fn presence_message_wire_shape() {
        let json = r#"{"userId":"u1","status":"away","timestamp":"2024-05-01T10:00:00Z"}"#;
        let msg: PresenceMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.user_id, UserId::new("u1"));
        assert_eq!(msg.status, PresenceStatus::Away);
    }
}
