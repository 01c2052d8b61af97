//! Room events and their content.

use serde::{Deserialize, Serialize};

use super::room::Visibility;

/// Event type names as they appear on the wire and in filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "m.room.create")]
    Create,
    #[serde(rename = "m.room.member")]
    Member,
    #[serde(rename = "m.room.join_rules")]
    JoinRules,
    #[serde(rename = "m.room.name")]
    Name,
    #[serde(rename = "m.room.topic")]
    Topic,
    #[serde(rename = "m.room.canonical_alias")]
    CanonicalAlias,
    #[serde(rename = "m.room.message")]
    Message,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Create => "m.room.create",
            EventKind::Member => "m.room.member",
            EventKind::JoinRules => "m.room.join_rules",
            EventKind::Name => "m.room.name",
            EventKind::Topic => "m.room.topic",
            EventKind::CanonicalAlias => "m.room.canonical_alias",
            EventKind::Message => "m.room.message",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    Invite,
    Join,
    Leave,
}

/// Typed payload of an event. Serializes as `{"type": ..., "content": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "content")]
pub enum EventContent {
    #[serde(rename = "m.room.create")]
    Create { creator: String },
    #[serde(rename = "m.room.member")]
    Member { membership: Membership },
    #[serde(rename = "m.room.join_rules")]
    JoinRules { visibility: Visibility },
    #[serde(rename = "m.room.name")]
    Name { name: String },
    #[serde(rename = "m.room.topic")]
    Topic { topic: String },
    #[serde(rename = "m.room.canonical_alias")]
    CanonicalAlias { alias: String },
    #[serde(rename = "m.room.message")]
    Message { msgtype: String, body: String },
}

impl EventContent {
    pub fn kind(&self) -> EventKind {
        match self {
            EventContent::Create { .. } => EventKind::Create,
            EventContent::Member { .. } => EventKind::Member,
            EventContent::JoinRules { .. } => EventKind::JoinRules,
            EventContent::Name { .. } => EventKind::Name,
            EventContent::Topic { .. } => EventKind::Topic,
            EventContent::CanonicalAlias { .. } => EventKind::CanonicalAlias,
            EventContent::Message { .. } => EventKind::Message,
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        EventContent::Message {
            msgtype: "m.text".to_string(),
            body: body.into(),
        }
    }
}

/// An event waiting to be appended; the timeline assigns id, timestamp and position.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub room_id: String,
    pub sender: String,
    pub state_key: Option<String>,
    pub content: EventContent,
}

impl NewEvent {
    /// A room-level state event (empty state key).
    pub fn state(room_id: &str, sender: &str, content: EventContent) -> Self {
        Self {
            room_id: room_id.to_string(),
            sender: sender.to_string(),
            state_key: Some(String::new()),
            content,
        }
    }

    /// A membership transition of `target`.
    pub fn membership(room_id: &str, sender: &str, target: &str, membership: Membership) -> Self {
        Self {
            room_id: room_id.to_string(),
            sender: sender.to_string(),
            state_key: Some(target.to_string()),
            content: EventContent::Member { membership },
        }
    }

    pub fn message(room_id: &str, sender: &str, body: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            sender: sender.to_string(),
            state_key: None,
            content: EventContent::text(body),
        }
    }
}

/// An appended, immutable event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub event_id: String,
    pub room_id: String,
    pub sender: String,
    #[serde(flatten)]
    pub content: EventContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub origin_server_ts: i64,
    /// Global stream position, assigned at append time.
    pub stream_position: u64,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        self.content.kind()
    }

    pub fn is_state(&self) -> bool {
        self.state_key.is_some()
    }

    /// The membership this event sets, if it is a membership event.
    pub fn membership(&self) -> Option<Membership> {
        match self.content {
            EventContent::Member { membership } => Some(membership),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_serializes_with_type_tag() {
        let event = Event {
            event_id: "$1:localhost".to_string(),
            room_id: "!r:localhost".to_string(),
            sender: "@alice:localhost".to_string(),
            content: EventContent::text("hi"),
            state_key: None,
            origin_server_ts: 0,
            stream_position: 7,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "m.room.message");
        assert_eq!(json["content"]["body"], "hi");
        assert_eq!(json["content"]["msgtype"], "m.text");
        assert_eq!(json["stream_position"], 7);
        assert!(json.get("state_key").is_none());
    }

    #[test]
    fn membership_events_carry_target_as_state_key() {
        let new = NewEvent::membership("!r:localhost", "@a:localhost", "@b:localhost", Membership::Invite);
        assert_eq!(new.state_key.as_deref(), Some("@b:localhost"));
        assert_eq!(new.content.kind(), EventKind::Member);
    }

    #[test]
    fn kind_names_match_serde_names() {
        for kind in [EventKind::Create, EventKind::Member, EventKind::Topic, EventKind::Message] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
    }
}
