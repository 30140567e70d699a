//! Project room membership.
//!
//! A connection joins the room of every project it watches; task events are
//! fanned out to the members of the event's project room. Membership is
//! ephemeral and dies with the connection.

use std::collections::{BTreeSet, HashMap};

use tokio::sync::RwLock;

use taskboard_proto::ProjectId;

/// Identifier of one WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(pub u64);

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Room membership per project.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<ProjectId, BTreeSet<ConnId>>>,
}

impl RoomRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `conn` to a project room. Returns `false` if it was already a member.
    pub async fn join(&self, project_id: &ProjectId, conn: ConnId) -> bool {
        self.rooms
            .write()
            .await
            .entry(project_id.clone())
            .or_default()
            .insert(conn)
    }

    /// Removes `conn` from a project room. Returns `false` if it was not a member.
    pub async fn leave(&self, project_id: &ProjectId, conn: ConnId) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(project_id) else {
            return false;
        };
        let removed = members.remove(&conn);
        if members.is_empty() {
            rooms.remove(project_id);
        }
        removed
    }

    /// Removes `conn` from every room.
    pub async fn remove_connection(&self, conn: ConnId) {
        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, members| {
            members.remove(&conn);
            !members.is_empty()
        });
    }

    /// Current members of a project room.
    pub async fn members(&self, project_id: &ProjectId) -> Vec<ConnId> {
        self.rooms
            .read()
            .await
            .get(project_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }
}
