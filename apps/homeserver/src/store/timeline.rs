//! Per-room append-only event logs sharing one global stream position.

use std::collections::HashMap;

use chrono::Utc;
use homeserver_common::id::{sigil, sigil_ulid};

use crate::models::event::{Event, EventKind, Membership, NewEvent};

#[derive(Debug, Default)]
pub struct EventTimeline {
    rooms: HashMap<String, Vec<Event>>,
    /// event id -> (room id, index in that room's log)
    index: HashMap<String, (String, usize)>,
    position: u64,
}

impl EventTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest position assigned so far; 0 before the first append.
    pub fn current_position(&self) -> u64 {
        self.position
    }

    /// Assigns the next stream position to `new` and stores it.
    ///
    /// Callers hold the store's write lock, which linearizes appends.
    pub fn append(&mut self, new: NewEvent, server_name: &str) -> &Event {
        self.position += 1;
        let event = Event {
            event_id: sigil_ulid(sigil::EVENT, server_name),
            room_id: new.room_id,
            sender: new.sender,
            content: new.content,
            state_key: new.state_key,
            origin_server_ts: Utc::now().timestamp_millis(),
            stream_position: self.position,
        };

        let log = self.rooms.entry(event.room_id.clone()).or_default();
        self.index
            .insert(event.event_id.clone(), (event.room_id.clone(), log.len()));
        log.push(event);
        &log[log.len() - 1]
    }

    /// Every event of a room, oldest first.
    pub fn room_events(&self, room_id: &str) -> &[Event] {
        self.rooms.get(room_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Events of a room with position strictly greater than `after`.
    pub fn events_since(&self, room_id: &str, after: u64) -> &[Event] {
        let events = self.room_events(room_id);
        let start = events.partition_point(|e| e.stream_position <= after);
        &events[start..]
    }

    /// Events with `after < position <= up_to`.
    pub fn events_between(&self, room_id: &str, after: u64, up_to: u64) -> &[Event] {
        let events = self.events_since(room_id, after);
        let end = events.partition_point(|e| e.stream_position <= up_to);
        &events[..end]
    }

    pub fn event_by_id(&self, event_id: &str) -> Option<&Event> {
        let (room_id, idx) = self.index.get(event_id)?;
        self.rooms.get(room_id)?.get(*idx)
    }

    /// The membership `user_id` held in the room right after position `at`.
    pub fn membership_at(&self, room_id: &str, user_id: &str, at: u64) -> Option<Membership> {
        let events = self.room_events(room_id);
        let end = events.partition_point(|e| e.stream_position <= at);
        events[..end]
            .iter()
            .rev()
            .find(|e| e.kind() == EventKind::Member && e.state_key.as_deref() == Some(user_id))
            .and_then(Event::membership)
    }

    /// Room state as of just before `before`: the latest event for each
    /// `(type, state_key)`, in stream order.
    pub fn state_before(&self, room_id: &str, before: u64) -> Vec<Event> {
        let events = self.room_events(room_id);
        let end = events.partition_point(|e| e.stream_position < before);

        let mut latest: HashMap<(EventKind, &str), usize> = HashMap::new();
        for (i, event) in events[..end].iter().enumerate() {
            if let Some(key) = event.state_key.as_deref() {
                latest.insert((event.kind(), key), i);
            }
        }

        let mut indices: Vec<usize> = latest.into_values().collect();
        indices.sort_unstable();
        indices.into_iter().map(|i| events[i].clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::{EventContent, Membership};

    const ROOM: &str = "!room:localhost";
    const OTHER: &str = "!other:localhost";

    fn message(timeline: &mut EventTimeline, room: &str, body: &str) -> u64 {
        timeline
            .append(NewEvent::message(room, "@alice:localhost", body), "localhost")
            .stream_position
    }

    #[test]
    fn positions_are_global_and_strictly_increasing() {
        let mut timeline = EventTimeline::new();
        assert_eq!(timeline.current_position(), 0);
        assert_eq!(message(&mut timeline, ROOM, "a"), 1);
        assert_eq!(message(&mut timeline, OTHER, "b"), 2);
        assert_eq!(message(&mut timeline, ROOM, "c"), 3);
        assert_eq!(timeline.current_position(), 3);

        let positions: Vec<u64> = timeline
            .room_events(ROOM)
            .iter()
            .map(|e| e.stream_position)
            .collect();
        assert_eq!(positions, vec![1, 3]);
    }

    #[test]
    fn events_since_is_exclusive_and_empty_at_the_boundary() {
        let mut timeline = EventTimeline::new();
        for body in ["a", "b", "c"] {
            message(&mut timeline, ROOM, body);
        }

        let all = timeline.events_since(ROOM, 0);
        assert_eq!(all.len(), 3);
        let last = all.last().unwrap().stream_position;
        assert!(timeline.events_since(ROOM, last).is_empty());

        let tail = timeline.events_since(ROOM, 1);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].stream_position, 2);
    }

    #[test]
    fn unknown_rooms_have_no_events() {
        let timeline = EventTimeline::new();
        assert!(timeline.events_since("!nope:localhost", 0).is_empty());
        assert!(timeline.state_before("!nope:localhost", 10).is_empty());
    }

    #[test]
    fn events_between_bounds_both_ends() {
        let mut timeline = EventTimeline::new();
        for body in ["a", "b", "c", "d"] {
            message(&mut timeline, ROOM, body);
        }
        let slice = timeline.events_between(ROOM, 1, 3);
        let positions: Vec<u64> = slice.iter().map(|e| e.stream_position).collect();
        assert_eq!(positions, vec![2, 3]);
    }

    #[test]
    fn lookup_by_event_id() {
        let mut timeline = EventTimeline::new();
        message(&mut timeline, ROOM, "a");
        let id = timeline
            .append(NewEvent::message(OTHER, "@bob:localhost", "b"), "localhost")
            .event_id
            .clone();

        let event = timeline.event_by_id(&id).unwrap();
        assert_eq!(event.room_id, OTHER);
        assert_eq!(event.content, EventContent::text("b"));
        assert!(timeline.event_by_id("$missing:localhost").is_none());
    }

    #[test]
    fn state_before_keeps_latest_per_key() {
        let mut timeline = EventTimeline::new();
        let alice = "@alice:localhost";
        let bob = "@bob:localhost";
        timeline.append(
            NewEvent::state(ROOM, alice, EventContent::Topic { topic: "old".into() }),
            "localhost",
        );
        timeline.append(NewEvent::membership(ROOM, alice, alice, Membership::Join), "localhost");
        message(&mut timeline, ROOM, "not state");
        timeline.append(
            NewEvent::state(ROOM, alice, EventContent::Topic { topic: "new".into() }),
            "localhost",
        );
        let bob_join = timeline
            .append(NewEvent::membership(ROOM, bob, bob, Membership::Join), "localhost")
            .stream_position;

        let state = timeline.state_before(ROOM, bob_join);
        assert_eq!(state.len(), 2);
        assert_eq!(state[0].membership(), Some(Membership::Join));
        assert_eq!(
            state[1].content,
            EventContent::Topic { topic: "new".into() }
        );

        // Including bob's join adds his membership.
        assert_eq!(timeline.state_before(ROOM, bob_join + 1).len(), 3);
    }

    #[test]
    fn membership_at_replays_the_users_own_transitions() {
        let mut timeline = EventTimeline::new();
        let bob = "@bob:localhost";
        assert_eq!(timeline.membership_at(ROOM, bob, 0), None);

        let join = timeline
            .append(NewEvent::membership(ROOM, bob, bob, Membership::Join), "localhost")
            .stream_position;
        message(&mut timeline, ROOM, "hello");
        let leave = timeline
            .append(NewEvent::membership(ROOM, bob, bob, Membership::Leave), "localhost")
            .stream_position;
        timeline.append(NewEvent::membership(ROOM, bob, bob, Membership::Join), "localhost");

        assert_eq!(timeline.membership_at(ROOM, bob, join - 1), None);
        assert_eq!(timeline.membership_at(ROOM, bob, join + 1), Some(Membership::Join));
        assert_eq!(timeline.membership_at(ROOM, bob, leave), Some(Membership::Leave));
        assert_eq!(timeline.membership_at(ROOM, "@alice:localhost", leave), None);
        assert_eq!(timeline.membership_at(OTHER, bob, leave), None);
    }
}
