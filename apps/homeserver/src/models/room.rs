use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a room is listed in the public directory and open to anyone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

/// Options accepted when creating a room.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    /// Local part of the alias to reserve, e.g. `lobby` for `#lobby:server`.
    #[serde(default)]
    pub room_alias_name: Option<String>,
    /// User ids to invite on creation.
    #[serde(default)]
    pub invite: Vec<String>,
}

/// Current state of a room, derived from its state events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Room {
    pub room_id: String,
    pub creator: String,
    /// Joined users in join order.
    pub members: Vec<String>,
    /// Users with a pending invite.
    pub invited: Vec<String>,
    pub alias: Option<String>,
    pub name: Option<String>,
    pub topic: Option<String>,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(room_id: String, creator: String) -> Self {
        Self {
            room_id,
            creator,
            members: Vec::new(),
            invited: Vec::new(),
            alias: None,
            name: None,
            topic: None,
            visibility: Visibility::default(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.room_id
    }

    pub fn creator(&self) -> &str {
        &self.creator
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// The local alias, without sigil or server suffix.
    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }

    pub fn is_invited(&self, user_id: &str) -> bool {
        self.invited.iter().any(|m| m == user_id)
    }

    /// Case-sensitive substring match against name, topic and alias.
    pub fn matches(&self, filter: &str) -> bool {
        [self.name(), self.topic(), self.alias_name()]
            .into_iter()
            .flatten()
            .any(|field| field.contains(filter))
            || filter.is_empty()
    }
}
