use serde::{Deserialize, Serialize};

use super::event::{Event, EventKind};

/// Restricts which rooms and event types a sync returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFilter {
    /// If set, only these rooms are included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_rooms: Vec<String>,
    /// If set, only these event types are included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<EventKind>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_types: Vec<EventKind>,
}

impl SyncFilter {
    pub fn allows_room(&self, room_id: &str) -> bool {
        if self.not_rooms.iter().any(|r| r == room_id) {
            return false;
        }
        match &self.rooms {
            Some(rooms) => rooms.iter().any(|r| r == room_id),
            None => true,
        }
    }

    pub fn allows_event(&self, event: &Event) -> bool {
        let kind = event.kind();
        if self.not_types.contains(&kind) {
            return false;
        }
        match &self.types {
            Some(types) => types.contains(&kind),
            None => true,
        }
    }

    /// Clones the events this filter lets through, keeping their order.
    pub fn select(&self, events: &[Event]) -> Vec<Event> {
        events
            .iter()
            .filter(|e| self.allows_event(e))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::EventContent;

    fn event(content: EventContent) -> Event {
        Event {
            event_id: "$e:localhost".to_string(),
            room_id: "!r:localhost".to_string(),
            sender: "@a:localhost".to_string(),
            content,
            state_key: None,
            origin_server_ts: 0,
            stream_position: 1,
        }
    }

    #[test]
    fn default_filter_allows_everything() {
        let filter = SyncFilter::default();
        assert!(filter.allows_room("!any:localhost"));
        assert!(filter.allows_event(&event(EventContent::text("x"))));
    }

    #[test]
    fn deny_lists_win_over_allow_lists() {
        let filter = SyncFilter {
            rooms: Some(vec!["!a:localhost".into(), "!b:localhost".into()]),
            not_rooms: vec!["!b:localhost".into()],
            ..Default::default()
        };
        assert!(filter.allows_room("!a:localhost"));
        assert!(!filter.allows_room("!b:localhost"));
        assert!(!filter.allows_room("!c:localhost"));
    }

    #[test]
    fn type_filters_parse_from_wire_names() {
        let filter: SyncFilter =
            serde_json::from_str(r#"{"types": ["m.room.message"]}"#).unwrap();
        assert!(filter.allows_event(&event(EventContent::text("x"))));
        assert!(!filter.allows_event(&event(EventContent::Topic { topic: "t".into() })));
    }
}
